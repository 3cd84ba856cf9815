//! Motion-tracking health rule.

use super::{FilterResult, FrameFilter};
use crate::frame::{Frame, TrackingFailureReason, TrackingState};
use crate::rejection::RejectionReason;

/// Rejects frames captured while motion tracking is degraded.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingStateFilter;

impl TrackingStateFilter {
    /// Rejection reason for a tracking state, or `None` when tracking.
    pub fn rejection_for(state: TrackingState) -> Option<RejectionReason> {
        match state {
            TrackingState::Tracking => None,
            TrackingState::Paused(reason) => Some(match reason {
                TrackingFailureReason::ExcessiveMotion | TrackingFailureReason::BadState => {
                    RejectionReason::MovingTooFast
                }
                TrackingFailureReason::InsufficientFeatures
                | TrackingFailureReason::InsufficientLight => {
                    RejectionReason::InsufficientFeatures
                }
                TrackingFailureReason::CameraUnavailable
                | TrackingFailureReason::Initializing
                | TrackingFailureReason::Relocalizing => RejectionReason::TrackingUnavailable,
            }),
            TrackingState::Stopped => Some(RejectionReason::TrackingUnavailable),
        }
    }
}

impl FrameFilter for TrackingStateFilter {
    fn name(&self) -> &'static str {
        "tracking_state"
    }

    fn accepts(&mut self, frame: &Frame) -> FilterResult {
        match Self::rejection_for(frame.tracking_state) {
            None => FilterResult::Accepted,
            Some(reason) => FilterResult::Rejected(reason),
        }
    }
}
