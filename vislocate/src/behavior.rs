//! Throttled user guidance derived from frame rejections.
//!
//! Every filter rejection is fed to the [`BehaviorRequester`]. Rather than
//! nagging the user on each frame, it waits until one reason has been seen
//! often enough and enough time has passed since the last request.
//!
//! # Timeline
//!
//! ```text
//! restart      first rejection          count > incidence && elapsed > throttle
//!    |  ------------> |  ----------------------------------------> |
//!    |           emit default                              emit mapped behavior,
//!    |                                                     clear counts, restart timer
//! ```

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::BehaviorConfig;
use crate::rejection::RejectionReason;

/// A suggestion shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorRequest {
    /// Point the camera at the surroundings.
    #[default]
    PointAtBuildings,
    TiltUp,
    TiltDown,
    PanAround,
    PanSlowly,
}

impl BehaviorRequest {
    /// Behavior that addresses a rejection reason.
    pub fn for_rejection(reason: RejectionReason) -> Self {
        match reason {
            RejectionReason::PitchTooLow => BehaviorRequest::TiltUp,
            RejectionReason::PitchTooHigh => BehaviorRequest::TiltDown,
            RejectionReason::MovingTooFast => BehaviorRequest::PanSlowly,
            RejectionReason::MovingTooLittle | RejectionReason::InsufficientFeatures => {
                BehaviorRequest::PanAround
            }
            _ => BehaviorRequest::default(),
        }
    }

    /// Text suitable for display.
    pub fn description(&self) -> &'static str {
        match self {
            BehaviorRequest::PointAtBuildings => {
                "Point at stores, signs and buildings around you to get a precise location"
            }
            BehaviorRequest::TiltUp => "Tilt your device up",
            BehaviorRequest::TiltDown => "Tilt your device down",
            BehaviorRequest::PanAround => "Pan around the scene",
            BehaviorRequest::PanSlowly => "Pan more slowly",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorRequest::PointAtBuildings => "point_at_buildings",
            BehaviorRequest::TiltUp => "tilt_up",
            BehaviorRequest::TiltDown => "tilt_down",
            BehaviorRequest::PanAround => "pan_around",
            BehaviorRequest::PanSlowly => "pan_slowly",
        }
    }
}

impl fmt::Display for BehaviorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session-scoped throttle bookkeeping.
#[derive(Debug)]
struct ThrottleState {
    rejection_counts: HashMap<RejectionReason, u32>,
    last_trigger_time: Instant,
    last_trigger_behavior: Option<BehaviorRequest>,
    did_request_initial_behavior: bool,
}

impl ThrottleState {
    fn new(now: Instant) -> Self {
        Self {
            rejection_counts: HashMap::new(),
            last_trigger_time: now,
            last_trigger_behavior: None,
            did_request_initial_behavior: false,
        }
    }
}

/// Turns a stream of rejections into occasional behavior requests.
#[derive(Debug)]
pub struct BehaviorRequester {
    incidence_threshold: u32,
    throttle_threshold: Duration,
    state: ThrottleState,
}

impl BehaviorRequester {
    pub fn new(config: &BehaviorConfig, now: Instant) -> Self {
        Self::with_params(config.incidence_threshold, config.throttle_threshold, now)
    }

    /// Create with explicit thresholds (useful for testing).
    pub fn with_params(incidence_threshold: u32, throttle_threshold: Duration, now: Instant) -> Self {
        Self {
            incidence_threshold,
            throttle_threshold,
            state: ThrottleState::new(now),
        }
    }

    /// Record a rejection and return a behavior to request, if any.
    ///
    /// The first rejection of a session always yields the default behavior.
    /// After that a behavior is only returned when some reason has been seen
    /// more than `incidence_threshold` times and more than
    /// `throttle_threshold` has passed since the last trigger. A behavior is
    /// never requested twice in a row.
    pub fn process_rejection(
        &mut self,
        reason: RejectionReason,
        now: Instant,
    ) -> Option<BehaviorRequest> {
        let state = &mut self.state;
        let count = state.rejection_counts.entry(reason).or_insert(0);
        *count += 1;
        let count = *count;

        if !state.did_request_initial_behavior {
            state.did_request_initial_behavior = true;
            state.last_trigger_behavior = Some(BehaviorRequest::default());
            tracing::debug!(reason = %reason, "Requesting initial behavior");
            return Some(BehaviorRequest::default());
        }

        let since_trigger = now.saturating_duration_since(state.last_trigger_time);
        if count <= self.incidence_threshold || since_trigger <= self.throttle_threshold {
            return None;
        }

        let mut behavior = BehaviorRequest::for_rejection(reason);
        if state.last_trigger_behavior == Some(behavior) {
            behavior = BehaviorRequest::default();
        }

        state.rejection_counts.clear();
        state.last_trigger_time = now;

        if state.last_trigger_behavior == Some(behavior) {
            tracing::debug!(
                reason = %reason,
                behavior = %behavior,
                "Suppressing repeated behavior request"
            );
            return None;
        }

        tracing::info!(
            reason = %reason,
            count,
            behavior = %behavior,
            "Requesting behavior"
        );
        state.last_trigger_behavior = Some(behavior);
        Some(behavior)
    }

    /// Clear all counters and the throttle timer for a new session.
    pub fn restart(&mut self, now: Instant) {
        self.state = ThrottleState::new(now);
    }

    /// How often `reason` has been seen since the last trigger.
    pub fn rejection_count(&self, reason: RejectionReason) -> u32 {
        self.state
            .rejection_counts
            .get(&reason)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester(now: Instant) -> BehaviorRequester {
        BehaviorRequester::new(&BehaviorConfig::default(), now)
    }

    /// Feed `n` rejections at `now`, collecting every emitted behavior.
    fn feed(
        requester: &mut BehaviorRequester,
        reason: RejectionReason,
        n: usize,
        now: Instant,
    ) -> Vec<(usize, BehaviorRequest)> {
        (1..=n)
            .filter_map(|i| requester.process_rejection(reason, now).map(|b| (i, b)))
            .collect()
    }

    #[test]
    fn test_mapping() {
        use BehaviorRequest::*;
        assert_eq!(BehaviorRequest::for_rejection(RejectionReason::PitchTooLow), TiltUp);
        assert_eq!(BehaviorRequest::for_rejection(RejectionReason::PitchTooHigh), TiltDown);
        assert_eq!(BehaviorRequest::for_rejection(RejectionReason::MovingTooFast), PanSlowly);
        assert_eq!(BehaviorRequest::for_rejection(RejectionReason::MovingTooLittle), PanAround);
        assert_eq!(
            BehaviorRequest::for_rejection(RejectionReason::InsufficientFeatures),
            PanAround
        );
        assert_eq!(
            BehaviorRequest::for_rejection(RejectionReason::TrackingUnavailable),
            PointAtBuildings
        );
    }

    #[test]
    fn test_description() {
        assert_eq!(BehaviorRequest::TiltUp.description(), "Tilt your device up");
        assert_eq!(BehaviorRequest::PanSlowly.description(), "Pan more slowly");
    }

    #[test]
    fn test_first_rejection_emits_default_once() {
        let start = Instant::now();
        let mut requester = requester(start);
        assert_eq!(
            requester.process_rejection(RejectionReason::MovingTooFast, start),
            Some(BehaviorRequest::PointAtBuildings)
        );
        assert_eq!(
            requester.process_rejection(RejectionReason::MovingTooFast, start),
            None
        );
    }

    #[test]
    fn test_thirty_first_rejection_triggers() {
        let start = Instant::now();
        let mut requester = requester(start);
        let later = start + Duration::from_secs(3);

        let emitted = feed(&mut requester, RejectionReason::PitchTooLow, 31, later);
        assert_eq!(
            emitted,
            vec![
                (1, BehaviorRequest::PointAtBuildings),
                (31, BehaviorRequest::TiltUp)
            ]
        );
        assert_eq!(requester.rejection_count(RejectionReason::PitchTooLow), 0);
    }

    #[test]
    fn test_no_trigger_inside_throttle_window() {
        let start = Instant::now();
        let mut requester = requester(start);

        // plenty of rejections, but the timer started at restart
        let emitted = feed(
            &mut requester,
            RejectionReason::PitchTooLow,
            100,
            start + Duration::from_secs(1),
        );
        assert_eq!(emitted, vec![(1, BehaviorRequest::PointAtBuildings)]);
    }

    #[test]
    fn test_no_refire_before_throttle_elapses() {
        let start = Instant::now();
        let mut requester = requester(start);
        let t1 = start + Duration::from_secs(3);
        feed(&mut requester, RejectionReason::PitchTooLow, 31, t1);

        let t2 = t1 + Duration::from_secs(1);
        let emitted = feed(&mut requester, RejectionReason::PitchTooHigh, 40, t2);
        assert!(emitted.is_empty());

        // once the throttle has passed the accumulated count fires
        let t3 = t1 + Duration::from_millis(2500);
        assert_eq!(
            requester.process_rejection(RejectionReason::PitchTooHigh, t3),
            Some(BehaviorRequest::TiltDown)
        );
    }

    #[test]
    fn test_never_same_behavior_twice_in_row() {
        let start = Instant::now();
        let mut requester = requester(start);
        let t1 = start + Duration::from_secs(3);
        let first = feed(&mut requester, RejectionReason::MovingTooLittle, 31, t1);
        assert_eq!(first.last(), Some(&(31, BehaviorRequest::PanAround)));

        let t2 = t1 + Duration::from_secs(3);
        let second = feed(&mut requester, RejectionReason::InsufficientFeatures, 31, t2);
        assert_eq!(second, vec![(31, BehaviorRequest::PointAtBuildings)]);
    }

    #[test]
    fn test_repeated_default_is_suppressed() {
        let start = Instant::now();
        let mut requester = requester(start);
        let t1 = start + Duration::from_secs(3);
        // initial default, then a default-mapped reason would repeat it
        let emitted = feed(&mut requester, RejectionReason::TrackingUnavailable, 31, t1);
        assert_eq!(emitted, vec![(1, BehaviorRequest::PointAtBuildings)]);
        assert_eq!(requester.rejection_count(RejectionReason::TrackingUnavailable), 0);
    }

    #[test]
    fn test_restart_clears_state() {
        let start = Instant::now();
        let mut requester = requester(start);
        feed(&mut requester, RejectionReason::PitchTooHigh, 10, start);
        assert_eq!(requester.rejection_count(RejectionReason::PitchTooHigh), 10);

        let restarted = start + Duration::from_secs(5);
        requester.restart(restarted);
        assert_eq!(requester.rejection_count(RejectionReason::PitchTooHigh), 0);
        assert_eq!(
            requester.process_rejection(RejectionReason::PitchTooHigh, restarted),
            Some(BehaviorRequest::PointAtBuildings)
        );
    }

    #[test]
    fn test_with_params() {
        let start = Instant::now();
        let mut requester = BehaviorRequester::with_params(2, Duration::from_millis(10), start);
        let later = start + Duration::from_millis(20);
        let emitted = feed(&mut requester, RejectionReason::MovingTooFast, 3, later);
        assert_eq!(
            emitted,
            vec![
                (1, BehaviorRequest::PointAtBuildings),
                (3, BehaviorRequest::PanSlowly)
            ]
        );
    }
}
