//! Tracing subscriber setup for hosts that do not install their own.
//!
//! The core only emits `tracing` events. Embedding applications with an
//! existing subscriber should skip this module entirely.

use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::LoggingError;

/// Install a global subscriber writing to stderr and optionally a log file.
///
/// `RUST_LOG` takes precedence over `config.filter`. When a log directory is
/// configured the returned guard must be kept alive to flush the file writer.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = build_filter(config)?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime::new(Rfc3339))
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.log_directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(LocalTime::new(Rfc3339))
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialised)?;

    tracing::debug!(filter = %config.filter, file = config.log_directory.is_some(), "Logging initialised");
    Ok(guard)
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter).map_err(|e| LoggingError::InvalidFilter {
        directive: config.filter.clone(),
        reason: e.to_string(),
    })
}
