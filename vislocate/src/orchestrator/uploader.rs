//! Upload collaborator interface.

use serde::{Deserialize, Serialize};

use crate::error::UploadError;
use crate::evaluator::BoxFuture;
use crate::frame::Frame;
use crate::fuser::{Coordinate, Zone};

/// Context sent with each uploaded frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetadata {
    /// Localization session the frame belongs to.
    pub session_id: u64,
    /// Position of this upload within the session, starting at 1.
    pub upload_index: u64,
    /// Coarse device location, if the host supplied one.
    pub approximate_location: Option<Coordinate>,
    /// Remote configuration in effect.
    pub remote_config_id: Option<String>,
}

/// Location returned by the localization service for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub coordinate: Coordinate,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

/// Sends a frame to the localization service.
///
/// Transport, request encoding, retries and timeouts all belong to the
/// implementation. Errors are reported to the listener as-is.
pub trait FrameUploader: Send + Sync {
    fn upload(
        &self,
        frame: Frame,
        metadata: SessionMetadata,
    ) -> BoxFuture<'_, Result<UploadResponse, UploadError>>;
}
