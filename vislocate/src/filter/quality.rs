//! Image quality gate backed by a host-supplied estimator.

use tracing::{debug, trace};

use super::{FilterResult, FrameFilter};
use crate::frame::Frame;
use crate::rejection::RejectionReason;

/// Scores frame images, typically with an on-device model.
///
/// Returns `None` when no estimate is available (model not loaded, no
/// image). Such frames pass the filter.
pub trait ImageQualityEstimator: Send {
    fn estimate(&mut self, frame: &Frame) -> Option<f32>;
}

/// Rejects frames whose estimated image quality is below a threshold.
pub struct ImageQualityFilter {
    estimator: Box<dyn ImageQualityEstimator>,
    score_threshold: f32,
    last_score: Option<f32>,
}

impl ImageQualityFilter {
    pub fn new(estimator: Box<dyn ImageQualityEstimator>, score_threshold: f32) -> Self {
        Self {
            estimator,
            score_threshold,
            last_score: None,
        }
    }

    /// Most recent estimate, if any.
    pub fn last_score(&self) -> Option<f32> {
        self.last_score
    }
}

impl FrameFilter for ImageQualityFilter {
    fn name(&self) -> &'static str {
        "image_quality"
    }

    fn accepts(&mut self, frame: &Frame) -> FilterResult {
        let Some(score) = self.estimator.estimate(frame).filter(|s| s.is_finite()) else {
            debug!("No image quality estimate, accepting frame");
            return FilterResult::Accepted;
        };
        self.last_score = Some(score);
        trace!(score, threshold = self.score_threshold, "Image quality estimated");

        if score >= self.score_threshold {
            FilterResult::Accepted
        } else {
            FilterResult::Rejected(RejectionReason::ImageQualityBelowThreshold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::test_support::ScriptedEstimator;
    use crate::frame::{Pose, TrackingState};
    use std::collections::VecDeque;
    use std::time::Duration;

    fn frame() -> Frame {
        Frame::new(Pose::default(), TrackingState::Tracking, Duration::ZERO)
    }

    #[test]
    fn test_threshold() {
        let estimates = VecDeque::from([Some(0.2), Some(0.5), Some(0.9)]);
        let mut filter = ImageQualityFilter::new(Box::new(ScriptedEstimator(estimates)), 0.5);

        assert_eq!(
            filter.accepts(&frame()),
            FilterResult::Rejected(RejectionReason::ImageQualityBelowThreshold)
        );
        assert_eq!(filter.last_score(), Some(0.2));
        assert!(filter.accepts(&frame()).is_accepted());
        assert!(filter.accepts(&frame()).is_accepted());
        assert_eq!(filter.last_score(), Some(0.9));
    }

    #[test]
    fn test_missing_or_invalid_estimate_passes() {
        let estimates = VecDeque::from([None, Some(f32::NAN)]);
        let mut filter = ImageQualityFilter::new(Box::new(ScriptedEstimator(estimates)), 0.5);
        assert!(filter.accepts(&frame()).is_accepted());
        assert!(filter.accepts(&frame()).is_accepted());
        assert_eq!(filter.last_score(), None);
    }
}
