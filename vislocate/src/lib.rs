//! vislocate - decision core of a visual-localization SDK
//!
//! Given a stream of pose/image samples from a motion-tracking source, this
//! library decides which frames are worth sending to a visual positioning
//! service, coaches the user when frames keep getting rejected, and fuses the
//! returned coordinates into one robust, confidence-rated location.
//!
//! Frame capture, on-device scoring and network transport are supplied by
//! the host through the [`FrameEvaluator`] and [`FrameUploader`] traits.
//! Results are delivered through a [`LocationListener`].

pub mod behavior;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod frame;
pub mod fuser;
pub mod logging;
pub mod orchestrator;
pub mod rejection;
pub mod statistics;

pub use behavior::{BehaviorRequest, BehaviorRequester};
pub use config::{LocalizerConfig, RemoteConfig};
pub use error::{ConfigError, LocalizerError, LoggingError, Result, UploadError};
pub use evaluator::{
    BoxFuture, EvaluationOutcome, FrameEvaluator, FrameEvaluatorChain, ImageEnhancer, Window,
};
pub use filter::{
    FilterResult, FrameFilter, FrameFilterChain, ImageQualityEstimator, ImageQualityFilter,
};
pub use frame::{
    EulerAngles, EvaluationInfo, Frame, FrameEvaluation, Orientation, Pose, Position,
    TrackingFailureReason, TrackingState,
};
pub use fuser::{Confidence, Coordinate, FusedResult, LocationFuser, Zone, ZoneType};
pub use logging::init_logging;
pub use orchestrator::{
    FrameUploader, LocalizationOrchestrator, LocalizerState, LocationListener, SessionMetadata,
    UploadResponse,
};
pub use rejection::RejectionReason;
pub use statistics::{FrameEvaluationStatistics, MotionStatistics};
