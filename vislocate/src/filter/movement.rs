//! Translation rule.

use super::{FilterResult, FrameFilter};
use crate::frame::{Frame, Position};
use crate::rejection::RejectionReason;

/// Rejects frames taken from (nearly) the same spot as the last one it let
/// through.
///
/// The reference position only advances when this rule accepts, so slow
/// drift eventually adds up to an accepted frame.
#[derive(Debug, Clone)]
pub struct MovementFilter {
    threshold: f32,
    last_position: Option<Position>,
}

impl MovementFilter {
    /// `threshold` is the per-axis delta in meters.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            last_position: None,
        }
    }

    fn has_moved(&self, from: Position, to: Position) -> bool {
        (to.x - from.x).abs() > self.threshold
            || (to.y - from.y).abs() > self.threshold
            || (to.z - from.z).abs() > self.threshold
    }
}

impl FrameFilter for MovementFilter {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn accepts(&mut self, frame: &Frame) -> FilterResult {
        let position = frame.pose.position;
        match self.last_position {
            Some(last) if !self.has_moved(last, position) => {
                FilterResult::Rejected(RejectionReason::MovingTooLittle)
            }
            _ => {
                self.last_position = Some(position);
                FilterResult::Accepted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Orientation, Pose, TrackingState};
    use std::time::Duration;

    fn frame_at(x: f32, y: f32, z: f32) -> Frame {
        Frame::new(
            Pose::new(Position::new(x, y, z), Orientation::IDENTITY),
            TrackingState::Tracking,
            Duration::ZERO,
        )
    }

    #[test]
    fn test_first_frame_accepted() {
        let mut filter = MovementFilter::new(0.01);
        assert!(filter.accepts(&frame_at(0.0, 0.0, 0.0)).is_accepted());
    }

    #[test]
    fn test_stationary_rejected() {
        let mut filter = MovementFilter::new(0.01);
        filter.accepts(&frame_at(0.0, 0.0, 0.0));
        assert_eq!(
            filter.accepts(&frame_at(0.005, 0.0, -0.005)),
            FilterResult::Rejected(RejectionReason::MovingTooLittle)
        );
    }

    #[test]
    fn test_any_axis_counts() {
        let mut filter = MovementFilter::new(0.01);
        filter.accepts(&frame_at(0.0, 0.0, 0.0));
        assert!(filter.accepts(&frame_at(0.0, 0.0, 0.02)).is_accepted());
        assert!(filter.accepts(&frame_at(0.0, -0.02, 0.02)).is_accepted());
    }

    #[test]
    fn test_reference_only_moves_on_accept() {
        let mut filter = MovementFilter::new(0.01);
        filter.accepts(&frame_at(0.0, 0.0, 0.0));
        // two small steps, each under threshold against the last accepted pose
        assert!(!filter.accepts(&frame_at(0.006, 0.0, 0.0)).is_accepted());
        // measured from the origin, not from 0.006
        assert!(filter.accepts(&frame_at(0.012, 0.0, 0.0)).is_accepted());
    }
}
