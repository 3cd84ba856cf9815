//! Error types for the localization core.
//!
//! The decision core fails open: filter, evaluator and numerical problems are
//! absorbed and logged inside the pipeline. Only configuration, runtime and
//! upload failures surface to the host through these types.

use thiserror::Error;

/// Errors raised while building or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    /// The remote configuration document could not be parsed.
    #[error("malformed remote configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors reported by a [`FrameUploader`](crate::orchestrator::FrameUploader).
///
/// The orchestrator forwards these to the listener verbatim and never retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// Transport-level failure (no connectivity, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The localization service answered with an error status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The response could not be interpreted as a location.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The upload was abandoned before completing.
    #[error("upload cancelled")]
    Cancelled,
}

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },

    /// The log directory could not be prepared.
    #[error("failed to prepare log directory: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber is already installed.
    #[error("tracing subscriber already initialised")]
    AlreadyInitialised,
}

/// Top-level error type for the localization core.
#[derive(Debug, Error)]
pub enum LocalizerError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Uploading a frame failed.
    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    /// Logging could not be initialised.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// The orchestrator was started outside a Tokio runtime.
    #[error("no Tokio runtime available: {0}")]
    NoRuntime(String),

    /// A background task is no longer running.
    #[error("background worker '{0}' is unavailable")]
    WorkerUnavailable(&'static str),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, LocalizerError>;
