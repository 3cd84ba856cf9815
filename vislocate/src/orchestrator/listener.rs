//! Host callback interface.

use super::{LocalizerState, SessionMetadata};
use crate::behavior::BehaviorRequest;
use crate::error::LocalizerError;
use crate::evaluator::EvaluationOutcome;
use crate::fuser::FusedResult;
use crate::rejection::RejectionReason;

/// Receives events from a [`LocalizationOrchestrator`](super::LocalizationOrchestrator).
///
/// Callbacks run on whichever thread produced the event: the caller of
/// `process_frame` for filter events, a runtime worker for evaluation and
/// upload events. They are never invoked while internal locks are held, so
/// calling back into the orchestrator is allowed.
pub trait LocationListener: Send + Sync {
    /// A new fused location is available.
    fn on_location_updated(&self, result: &FusedResult);

    /// An upload failed.
    fn on_error(&self, error: &LocalizerError);

    fn on_behavior_requested(&self, _behavior: BehaviorRequest) {}

    fn on_frame_rejected(&self, _reason: RejectionReason) {}

    fn on_frame_evaluated(&self, _outcome: EvaluationOutcome) {}

    fn on_state_changed(&self, _state: LocalizerState) {}

    fn on_upload_started(&self, _metadata: &SessionMetadata) {}
}
