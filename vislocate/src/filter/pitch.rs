//! Camera pitch rule.

use super::{FilterResult, FrameFilter};
use crate::frame::Frame;
use crate::rejection::RejectionReason;

/// Rejects frames where the camera looks too far up or down.
///
/// Street-level localization needs facades in view; sky and pavement carry
/// few usable features.
#[derive(Debug, Clone, Copy)]
pub struct CameraPitchFilter {
    max_upward_tilt: f32,
    max_downward_tilt: f32,
}

impl CameraPitchFilter {
    /// Both limits are positive angles in radians.
    pub fn new(max_upward_tilt: f32, max_downward_tilt: f32) -> Self {
        Self {
            max_upward_tilt,
            max_downward_tilt,
        }
    }
}

impl FrameFilter for CameraPitchFilter {
    fn name(&self) -> &'static str {
        "camera_pitch"
    }

    fn accepts(&mut self, frame: &Frame) -> FilterResult {
        let pitch = frame.pose.orientation.pitch();
        if pitch < -self.max_downward_tilt {
            FilterResult::Rejected(RejectionReason::PitchTooLow)
        } else if pitch > self.max_upward_tilt {
            FilterResult::Rejected(RejectionReason::PitchTooHigh)
        } else {
            FilterResult::Accepted
        }
    }
}
