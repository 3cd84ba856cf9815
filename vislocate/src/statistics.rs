//! Per-session frame evaluation statistics.
//!
//! The orchestrator records every window, evaluation and rejection here so
//! hosts can show diagnostics or report them alongside a location. Every
//! frame fed to the orchestrator while localizing also updates the
//! [`MotionStatistics`]: distance travelled, rotation spread and tracking
//! state counts.

use std::collections::{BTreeMap, VecDeque};
use std::f32::consts::TAU;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::frame::{EvaluationInfo, Frame, Position, TrackingFailureReason, TrackingState};
use crate::rejection::RejectionReason;

/// Number of window records kept per session.
pub const MAX_WINDOW_RECORDS: usize = 100;

/// Only every n-th tracked frame contributes to the travelled distance,
/// which keeps pose jitter from inflating it.
pub const TRANSLATION_DECIMATION_FACTOR: u32 = 10;

// =============================================================================
// Motion
// =============================================================================

/// Length of the device trajectory over a session (meters).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationAccumulator {
    decimation_factor: u32,
    total: f32,
    frames_seen: u32,
    next_frame: u32,
    previous: Option<Position>,
}

impl Default for TranslationAccumulator {
    fn default() -> Self {
        Self::new(TRANSLATION_DECIMATION_FACTOR)
    }
}

impl TranslationAccumulator {
    pub fn new(decimation_factor: u32) -> Self {
        Self {
            decimation_factor: decimation_factor.max(1),
            total: 0.0,
            frames_seen: 0,
            next_frame: 0,
            previous: None,
        }
    }

    /// Feed the next frame.
    ///
    /// When a sampled frame is not tracking, the next frame is sampled
    /// instead of waiting a full decimation period.
    pub fn update(&mut self, frame: &Frame) {
        let position = frame.pose.position;
        let previous = *self.previous.get_or_insert(position);

        if self.frames_seen >= self.next_frame {
            if frame.tracking_state.is_tracking() {
                self.total += distance(position, previous);
                self.previous = Some(position);
                self.next_frame += self.decimation_factor;
            } else {
                self.next_frame += 1;
            }
        }
        self.frames_seen += 1;
    }

    pub fn total(&self) -> f32 {
        self.total
    }
}

fn distance(a: Position, b: Position) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

/// Observed range of one rotation axis (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AxisRange {
    pub min: f32,
    pub max: f32,
}

impl AxisRange {
    fn include(&mut self, angle: f32) {
        self.min = self.min.min(angle);
        self.max = self.max.max(angle);
    }

    /// `max - min`, capped at a full turn.
    pub fn spread(&self) -> f32 {
        (self.max - self.min).clamp(0.0, TAU)
    }
}

/// Rotation ranges seen over a session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RotationAccumulator {
    pub yaw: AxisRange,
    pub pitch: AxisRange,
    pub roll: AxisRange,
    frames_seen: u32,
}

impl RotationAccumulator {
    pub fn update(&mut self, frame: &Frame) {
        let angles = frame.pose.orientation.euler_angles();
        if self.frames_seen == 0 {
            self.yaw = AxisRange { min: angles.yaw, max: angles.yaw };
            self.pitch = AxisRange { min: angles.pitch, max: angles.pitch };
            self.roll = AxisRange { min: angles.roll, max: angles.roll };
        } else {
            self.yaw.include(angles.yaw);
            self.pitch.include(angles.pitch);
            self.roll.include(angles.roll);
        }
        self.frames_seen += 1;
    }
}

/// Frame counts by tracking quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TrackingStateCounts {
    pub total: u32,
    /// Tracking normally, initializing, relocalizing or stopped.
    pub normal: u32,
    pub excessive_motion: u32,
    /// Bad state, too dark, too few features or camera unavailable.
    pub loss_of_tracking: u32,
}

impl TrackingStateCounts {
    pub fn update(&mut self, state: TrackingState) {
        self.total += 1;
        match state {
            TrackingState::Paused(TrackingFailureReason::ExcessiveMotion) => {
                self.excessive_motion += 1
            }
            TrackingState::Paused(
                TrackingFailureReason::BadState
                | TrackingFailureReason::InsufficientLight
                | TrackingFailureReason::InsufficientFeatures
                | TrackingFailureReason::CameraUnavailable,
            ) => self.loss_of_tracking += 1,
            _ => self.normal += 1,
        }
    }
}

/// Device motion and tracking quality over a session.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MotionStatistics {
    pub translation: TranslationAccumulator,
    pub rotation: RotationAccumulator,
    pub tracking: TrackingStateCounts,
}

impl MotionStatistics {
    pub fn update(&mut self, frame: &Frame) {
        self.translation.update(frame);
        self.rotation.update(frame);
        self.tracking.update(frame.tracking_state);
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Summary of one evaluator window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRecord {
    pub start: DateTime<Utc>,
    /// Score of the most recent evaluation.
    pub current_score: Option<f32>,
    pub current_best_score: Option<f32>,
    /// Most recent filter rejection seen while this window was open.
    pub last_filter_rejection: Option<RejectionReason>,
    pub evaluations: u32,
    pub rejections: u32,
}

impl WindowRecord {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            current_score: None,
            current_best_score: None,
            last_filter_rejection: None,
            evaluations: 0,
            rejections: 0,
        }
    }
}

/// Running totals for the current localization session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameEvaluationStatistics {
    windows: VecDeque<WindowRecord>,
    highest_score: Option<f32>,
    lowest_score: Option<f32>,
    sum_of_scores: f64,
    total_evaluation_time: Duration,
    total_evaluations: u32,
    rejection_counts: BTreeMap<RejectionReason, u32>,
    last_evaluation_info: Option<EvaluationInfo>,
    motion: MotionStatistics,
}

impl FrameEvaluationStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a record for a new window.
    pub fn start_window(&mut self, start: DateTime<Utc>) {
        if self.windows.len() == MAX_WINDOW_RECORDS {
            self.windows.pop_front();
        }
        self.windows.push_back(WindowRecord::new(start));
    }

    /// Record a completed evaluation.
    pub fn add_evaluation(&mut self, score: f32, duration: Duration) {
        self.total_evaluations += 1;
        self.total_evaluation_time += duration;
        self.sum_of_scores += score as f64;
        self.highest_score = Some(self.highest_score.map_or(score, |s| s.max(score)));
        self.lowest_score = Some(self.lowest_score.map_or(score, |s| s.min(score)));

        if let Some(window) = self.windows.back_mut() {
            window.evaluations += 1;
            window.current_score = Some(score);
        }
    }

    /// Remember the evaluator details reported with the latest evaluation.
    pub fn record_evaluation_info(&mut self, info: &EvaluationInfo) {
        self.last_evaluation_info = Some(info.clone());
    }

    /// Update the motion totals with a frame from the tracking source.
    pub fn record_frame(&mut self, frame: &Frame) {
        self.motion.update(frame);
    }

    /// Record a new best frame in the current window.
    pub fn set_current_best(&mut self, score: f32) {
        if let Some(window) = self.windows.back_mut() {
            window.current_best_score = Some(score);
        }
    }

    /// Record a rejection from either chain.
    pub fn add_rejection(&mut self, reason: RejectionReason) {
        *self.rejection_counts.entry(reason).or_insert(0) += 1;
        if let Some(window) = self.windows.back_mut() {
            window.rejections += 1;
            if reason.is_filter_rejection() {
                window.last_filter_rejection = Some(reason);
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn windows(&self) -> impl Iterator<Item = &WindowRecord> {
        self.windows.iter()
    }

    pub fn current_window(&self) -> Option<&WindowRecord> {
        self.windows.back()
    }

    pub fn highest_score(&self) -> Option<f32> {
        self.highest_score
    }

    pub fn lowest_score(&self) -> Option<f32> {
        self.lowest_score
    }

    pub fn total_evaluations(&self) -> u32 {
        self.total_evaluations
    }

    pub fn average_score(&self) -> Option<f64> {
        (self.total_evaluations > 0).then(|| self.sum_of_scores / self.total_evaluations as f64)
    }

    pub fn average_evaluation_time(&self) -> Option<Duration> {
        (self.total_evaluations > 0).then(|| self.total_evaluation_time / self.total_evaluations)
    }

    pub fn rejection_count(&self, reason: RejectionReason) -> u32 {
        self.rejection_counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_rejections(&self) -> u32 {
        self.rejection_counts.values().sum()
    }

    pub fn last_evaluation_info(&self) -> Option<&EvaluationInfo> {
        self.last_evaluation_info.as_ref()
    }

    pub fn motion(&self) -> &MotionStatistics {
        &self.motion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Orientation, Pose};

    #[test]
    fn test_empty_statistics() {
        let stats = FrameEvaluationStatistics::new();
        assert_eq!(stats.average_score(), None);
        assert_eq!(stats.average_evaluation_time(), None);
        assert_eq!(stats.total_rejections(), 0);
        assert!(stats.current_window().is_none());
    }

    #[test]
    fn test_evaluation_totals() {
        let mut stats = FrameEvaluationStatistics::new();
        stats.start_window(Utc::now());
        stats.add_evaluation(0.2, Duration::from_millis(10));
        stats.add_evaluation(0.8, Duration::from_millis(30));

        assert_eq!(stats.total_evaluations(), 2);
        assert_eq!(stats.highest_score(), Some(0.8));
        assert_eq!(stats.lowest_score(), Some(0.2));
        assert!((stats.average_score().unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(stats.average_evaluation_time(), Some(Duration::from_millis(20)));

        let window = stats.current_window().unwrap();
        assert_eq!(window.evaluations, 2);
        assert_eq!(window.current_score, Some(0.8));
    }

    #[test]
    fn test_rejections_by_reason() {
        let mut stats = FrameEvaluationStatistics::new();
        stats.start_window(Utc::now());
        stats.add_rejection(RejectionReason::PitchTooLow);
        stats.add_rejection(RejectionReason::PitchTooLow);
        stats.add_rejection(RejectionReason::OtherEvaluationInProgress);

        assert_eq!(stats.rejection_count(RejectionReason::PitchTooLow), 2);
        assert_eq!(stats.total_rejections(), 3);
        let window = stats.current_window().unwrap();
        assert_eq!(window.rejections, 3);
        assert_eq!(window.last_filter_rejection, Some(RejectionReason::PitchTooLow));
    }

    #[test]
    fn test_window_records_are_bounded() {
        let mut stats = FrameEvaluationStatistics::new();
        for _ in 0..MAX_WINDOW_RECORDS + 5 {
            stats.start_window(Utc::now());
        }
        assert_eq!(stats.windows().count(), MAX_WINDOW_RECORDS);
    }

    #[test]
    fn test_current_best_tracks_latest_window() {
        let mut stats = FrameEvaluationStatistics::new();
        stats.start_window(Utc::now());
        stats.set_current_best(0.4);
        stats.start_window(Utc::now());
        stats.set_current_best(0.9);

        let bests: Vec<_> = stats.windows().map(|w| w.current_best_score).collect();
        assert_eq!(bests, vec![Some(0.4), Some(0.9)]);
    }

    fn frame_at(x: f32, state: TrackingState) -> Frame {
        Frame::new(
            Pose::new(Position::new(x, 0.0, 0.0), Orientation::IDENTITY),
            state,
            Duration::ZERO,
        )
    }

    #[test]
    fn test_translation_is_decimated() {
        let mut translation = TranslationAccumulator::new(2);
        // frames 0, 2 and 4 are sampled
        for x in [0.0, 5.0, 1.0, 7.0, 3.0] {
            translation.update(&frame_at(x, TrackingState::Tracking));
        }
        assert!((translation.total() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_translation_resamples_after_untracked_frame() {
        let mut translation = TranslationAccumulator::new(10);
        let paused = TrackingState::Paused(TrackingFailureReason::InsufficientFeatures);
        translation.update(&frame_at(0.0, paused));
        translation.update(&frame_at(2.0, TrackingState::Tracking));
        assert!((translation.total() - 2.0).abs() < 1e-6);

        // next sample is ten frames later
        for _ in 0..9 {
            translation.update(&frame_at(100.0, TrackingState::Tracking));
        }
        assert!((translation.total() - 2.0).abs() < 1e-6);
        translation.update(&frame_at(3.0, TrackingState::Tracking));
        assert!((translation.total() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotation_spread() {
        let mut rotation = RotationAccumulator::default();
        for pitch in [0.1, -0.2, 0.3] {
            let mut frame = frame_at(0.0, TrackingState::Tracking);
            frame.pose.orientation = Orientation::from_pitch(pitch);
            rotation.update(&frame);
        }
        assert!((rotation.pitch.min + 0.2).abs() < 1e-5);
        assert!((rotation.pitch.max - 0.3).abs() < 1e-5);
        assert!((rotation.pitch.spread() - 0.5).abs() < 1e-5);
        assert!(rotation.yaw.spread() < 1e-5);
    }

    #[test]
    fn test_tracking_state_counts() {
        let mut counts = TrackingStateCounts::default();
        counts.update(TrackingState::Tracking);
        counts.update(TrackingState::Paused(TrackingFailureReason::Initializing));
        counts.update(TrackingState::Paused(TrackingFailureReason::ExcessiveMotion));
        counts.update(TrackingState::Paused(TrackingFailureReason::InsufficientLight));
        counts.update(TrackingState::Paused(TrackingFailureReason::CameraUnavailable));

        assert_eq!(
            counts,
            TrackingStateCounts {
                total: 5,
                normal: 2,
                excessive_motion: 1,
                loss_of_tracking: 2,
            }
        );
    }

    #[test]
    fn test_record_frame_updates_motion() {
        let mut stats = FrameEvaluationStatistics::new();
        stats.record_frame(&frame_at(0.0, TrackingState::Tracking));
        stats.record_frame(&frame_at(1.0, TrackingState::Stopped));
        assert_eq!(stats.motion().tracking.total, 2);
        assert_eq!(stats.motion().tracking.normal, 2);
    }

    #[test]
    fn test_evaluation_info_kept() {
        let mut stats = FrameEvaluationStatistics::new();
        assert!(stats.last_evaluation_info().is_none());
        stats.record_evaluation_info(&EvaluationInfo::new("2.0.1"));
        stats.record_evaluation_info(&EvaluationInfo::new("2.0.1").with_error("timeout"));
        let info = stats.last_evaluation_info().unwrap();
        assert_eq!(info.model_version, "2.0.1");
        assert_eq!(info.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_reset() {
        let mut stats = FrameEvaluationStatistics::new();
        stats.start_window(Utc::now());
        stats.add_evaluation(0.5, Duration::from_millis(5));
        stats.record_frame(&frame_at(1.0, TrackingState::Tracking));
        stats.reset();
        assert_eq!(stats, FrameEvaluationStatistics::default());
    }
}
