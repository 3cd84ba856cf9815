//! Reasons a frame can be turned away by the pipeline.

use std::fmt;

use serde::Serialize;

/// Why a frame was not used.
///
/// The set is closed: filter rules produce the first seven variants, the
/// evaluator chain produces the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Camera is pointing too far down.
    PitchTooLow,
    /// Camera is pointing too far up.
    PitchTooHigh,
    /// Device is moving too fast for a sharp image.
    MovingTooFast,
    /// Device has not moved since the last useful frame.
    MovingTooLittle,
    /// Not enough visual features in view.
    InsufficientFeatures,
    /// Motion tracking is not available.
    TrackingUnavailable,
    /// Image is blurred or otherwise of poor quality.
    ImageQualityBelowThreshold,
    /// Another frame is already being evaluated.
    OtherEvaluationInProgress,
    /// The window already holds a better frame.
    ScoreBelowCurrentBest,
    /// The score is below the acceptance floor.
    ScoreBelowMinThreshold,
    /// The evaluator produced no score.
    EvaluatorError,
}

impl RejectionReason {
    /// All reasons, in declaration order.
    pub const ALL: [RejectionReason; 11] = [
        RejectionReason::PitchTooLow,
        RejectionReason::PitchTooHigh,
        RejectionReason::MovingTooFast,
        RejectionReason::MovingTooLittle,
        RejectionReason::InsufficientFeatures,
        RejectionReason::TrackingUnavailable,
        RejectionReason::ImageQualityBelowThreshold,
        RejectionReason::OtherEvaluationInProgress,
        RejectionReason::ScoreBelowCurrentBest,
        RejectionReason::ScoreBelowMinThreshold,
        RejectionReason::EvaluatorError,
    ];

    /// Short identifier for logs and statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::PitchTooLow => "pitch_too_low",
            RejectionReason::PitchTooHigh => "pitch_too_high",
            RejectionReason::MovingTooFast => "moving_too_fast",
            RejectionReason::MovingTooLittle => "moving_too_little",
            RejectionReason::InsufficientFeatures => "insufficient_features",
            RejectionReason::TrackingUnavailable => "tracking_unavailable",
            RejectionReason::ImageQualityBelowThreshold => "image_quality_below_threshold",
            RejectionReason::OtherEvaluationInProgress => "other_evaluation_in_progress",
            RejectionReason::ScoreBelowCurrentBest => "score_below_current_best",
            RejectionReason::ScoreBelowMinThreshold => "score_below_min_threshold",
            RejectionReason::EvaluatorError => "evaluator_error",
        }
    }

    /// True for reasons produced by the synchronous filter chain.
    pub fn is_filter_rejection(&self) -> bool {
        matches!(
            self,
            RejectionReason::PitchTooLow
                | RejectionReason::PitchTooHigh
                | RejectionReason::MovingTooFast
                | RejectionReason::MovingTooLittle
                | RejectionReason::InsufficientFeatures
                | RejectionReason::TrackingUnavailable
                | RejectionReason::ImageQualityBelowThreshold
        )
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_as_str_is_unique() {
        let names: HashSet<_> = RejectionReason::ALL.iter().map(|r| r.as_str()).collect();
        assert_eq!(names.len(), RejectionReason::ALL.len());
    }

    #[test]
    fn test_filter_rejections() {
        let filter_count = RejectionReason::ALL
            .iter()
            .filter(|r| r.is_filter_rejection())
            .count();
        assert_eq!(filter_count, 7);
        assert!(!RejectionReason::OtherEvaluationInProgress.is_filter_rejection());
        assert!(RejectionReason::PitchTooLow.is_filter_rejection());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", RejectionReason::MovingTooFast), "moving_too_fast");
    }
}
