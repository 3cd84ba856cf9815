//! Synchronous frame filtering.
//!
//! The [`FrameFilterChain`] is the cheap first gate every frame passes
//! through on the producer's thread. Rules run in order and the first
//! rejection wins. A force-accept timeout guarantees forward progress: if no
//! frame has been accepted for `acceptance_threshold`, the next frame is
//! accepted without consulting the rules.
//!
//! # Architecture
//!
//! ```text
//! Frame ──► ┌──────────────────┐
//!           │ Force-accept     │──► elapsed > threshold ──► Accepted
//!           └────────┬─────────┘
//!                    ▼
//!           ┌──────────────────┐
//!           │ TrackingState    │──► Rejected(TrackingUnavailable | ...)
//!           ├──────────────────┤
//!           │ CameraPitch      │──► Rejected(PitchTooLow | PitchTooHigh)
//!           ├──────────────────┤
//!           │ Movement         │──► Rejected(MovingTooLittle)
//!           ├──────────────────┤
//!           │ Blur (optional)  │──► Rejected(ImageQualityBelowThreshold)
//!           ├──────────────────┤
//!           │ ImageQuality     │──► Rejected(ImageQualityBelowThreshold)
//!           │ (optional)       │
//!           └────────┬─────────┘
//!                    ▼
//!                 Accepted
//! ```
//!
//! The image quality rule needs a host-supplied [`ImageQualityEstimator`];
//! it joins the chain through
//! [`install_image_quality_estimator`](FrameFilterChain::install_image_quality_estimator)
//! when enabled in config.

mod blur;
mod movement;
mod pitch;
mod quality;
mod tracking;

pub use blur::{laplacian_variance, BlurFilter};
pub use movement::MovementFilter;
pub use pitch::CameraPitchFilter;
pub use quality::{ImageQualityEstimator, ImageQualityFilter};
pub use tracking::TrackingStateFilter;

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::{FilterChainConfig, ImageQualityFilterConfig};
use crate::frame::Frame;
use crate::rejection::RejectionReason;

/// Outcome of running a frame through a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Accepted,
    Rejected(RejectionReason),
}

impl FilterResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterResult::Accepted)
    }
}

/// A single accept/reject rule.
///
/// Rules may keep state (the movement rule remembers the last pose it
/// accepted), so `accepts` takes `&mut self`. Implementations must be cheap:
/// they run on the frame producer's thread.
pub trait FrameFilter: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Decide whether `frame` may proceed.
    fn accepts(&mut self, frame: &Frame) -> FilterResult;
}

/// Ordered list of filter rules with a force-accept timeout.
pub struct FrameFilterChain {
    filters: Vec<Box<dyn FrameFilter>>,
    acceptance_threshold: Duration,
    last_accept_time: Instant,
    image_quality: ImageQualityFilterConfig,
}

impl FrameFilterChain {
    /// Build the canonical chain from configuration.
    ///
    /// Disabled rules are left out entirely.
    pub fn new(config: &FilterChainConfig, now: Instant) -> Self {
        let mut filters: Vec<Box<dyn FrameFilter>> = Vec::new();
        if config.tracking_state_filter_enabled {
            filters.push(Box::new(TrackingStateFilter));
        }
        if config.pitch_filter_enabled {
            filters.push(Box::new(CameraPitchFilter::new(
                config.max_upward_tilt,
                config.max_downward_tilt,
            )));
        }
        if config.movement_filter_enabled {
            filters.push(Box::new(MovementFilter::new(config.movement_threshold)));
        }
        if config.blur_filter_enabled {
            filters.push(Box::new(BlurFilter::new(&config.blur)));
        }
        let mut chain = Self::with_filters(filters, config.acceptance_threshold, now);
        chain.image_quality = config.image_quality.clone();
        chain
    }

    /// Build a chain from explicit rules (useful for testing).
    pub fn with_filters(
        filters: Vec<Box<dyn FrameFilter>>,
        acceptance_threshold: Duration,
        now: Instant,
    ) -> Self {
        Self {
            filters,
            acceptance_threshold,
            last_accept_time: now,
            image_quality: ImageQualityFilterConfig::default(),
        }
    }

    /// Add the image quality rule at the end of the chain.
    ///
    /// Replaces a previously installed estimator. Does nothing and returns
    /// `false` when the rule is disabled in config.
    pub fn install_image_quality_estimator(
        &mut self,
        estimator: Box<dyn ImageQualityEstimator>,
    ) -> bool {
        if !self.image_quality.enabled {
            debug!("Image quality filter disabled, ignoring estimator");
            return false;
        }
        self.filters.retain(|f| f.name() != "image_quality");
        self.filters.push(Box::new(ImageQualityFilter::new(
            estimator,
            self.image_quality.score_threshold,
        )));
        true
    }

    /// Run `frame` through the chain.
    pub fn accepts(&mut self, frame: &Frame, now: Instant) -> FilterResult {
        let since_accept = now.saturating_duration_since(self.last_accept_time);
        if since_accept > self.acceptance_threshold {
            debug!(
                elapsed_ms = since_accept.as_millis() as u64,
                "Force-accepting frame after acceptance timeout"
            );
            self.last_accept_time = now;
            return FilterResult::Accepted;
        }

        for filter in self.filters.iter_mut() {
            if let FilterResult::Rejected(reason) = filter.accepts(frame) {
                trace!(filter = filter.name(), reason = %reason, "Frame rejected");
                return FilterResult::Rejected(reason);
            }
        }

        self.last_accept_time = now;
        FilterResult::Accepted
    }

    /// Restart the force-accept clock for a new session.
    pub fn restart(&mut self, now: Instant) {
        self.last_accept_time = now;
    }

    /// Names of the active rules, in order.
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

impl std::fmt::Debug for FrameFilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameFilterChain")
            .field("filters", &self.filter_names())
            .field("acceptance_threshold", &self.acceptance_threshold)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Rule that always rejects with a fixed reason.
    pub struct AlwaysReject(pub RejectionReason);

    impl FrameFilter for AlwaysReject {
        fn name(&self) -> &'static str {
            "always_reject"
        }

        fn accepts(&mut self, _frame: &Frame) -> FilterResult {
            FilterResult::Rejected(self.0)
        }
    }

    /// Rule that always accepts and counts calls.
    #[derive(Default)]
    pub struct CountingAccept {
        pub calls: usize,
    }

    impl FrameFilter for CountingAccept {
        fn name(&self) -> &'static str {
            "counting_accept"
        }

        fn accepts(&mut self, _frame: &Frame) -> FilterResult {
            self.calls += 1;
            FilterResult::Accepted
        }
    }

    /// Replays a fixed list of image quality estimates.
    pub struct ScriptedEstimator(pub std::collections::VecDeque<Option<f32>>);

    impl ImageQualityEstimator for ScriptedEstimator {
        fn estimate(&mut self, _frame: &Frame) -> Option<f32> {
            self.0.pop_front().flatten()
        }
    }
}
