//! Image sharpness rule.
//!
//! Sharpness is measured as the variance of the 4-neighbour Laplacian over
//! the grayscale image. A frame is blurred when the variance is below an
//! absolute floor or drops sharply against the recent average.
//!
//! In dim or featureless scenes every frame can look blurred. To keep the
//! pipeline moving, the rule tracks its own recent pass rate and stops
//! rejecting while that rate is below `average_throughput_threshold`.

use std::collections::VecDeque;

use image::GrayImage;
use tracing::trace;

use super::{FilterResult, FrameFilter};
use crate::config::BlurFilterConfig;
use crate::frame::Frame;
use crate::rejection::RejectionReason;

/// Number of recent frames both moving averages cover.
const AVERAGE_WINDOW: usize = 8;

/// Fixed-size moving average over the most recent samples.
#[derive(Debug, Clone)]
struct MovingAverage {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl MovingAverage {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }
}

/// Variance of the 4-neighbour Laplacian over the interior pixels.
///
/// Returns 0.0 for images too small to have an interior.
pub fn laplacian_variance(image: &GrayImage) -> f64 {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let width = width as usize;
    let height = height as usize;
    let pixels = image.as_raw();
    let at = |x: usize, y: usize| pixels[y * width + x] as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let laplacian =
                at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            sum += laplacian;
            sum_sq += laplacian * laplacian;
            count += 1;
        }
    }

    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}

/// Rejects blurred images.
///
/// Frames without an image pass.
#[derive(Debug, Clone)]
pub struct BlurFilter {
    variance_threshold: f64,
    sudden_drop_threshold: f64,
    average_throughput_threshold: f64,
    variances: MovingAverage,
    throughput: MovingAverage,
}

impl BlurFilter {
    pub fn new(config: &BlurFilterConfig) -> Self {
        Self {
            variance_threshold: config.variance_threshold,
            sudden_drop_threshold: config.sudden_drop_threshold,
            average_throughput_threshold: config.average_throughput_threshold,
            variances: MovingAverage::new(AVERAGE_WINDOW),
            throughput: MovingAverage::new(AVERAGE_WINDOW),
        }
    }

    /// Create with default thresholds.
    pub fn with_defaults() -> Self {
        Self::new(&BlurFilterConfig::default())
    }

    fn is_blurred(&self, variance: f64) -> bool {
        if variance < self.variance_threshold {
            return true;
        }
        match self.variances.average() {
            Some(average) => variance < average * (1.0 - self.sudden_drop_threshold),
            None => false,
        }
    }

    fn throughput_starved(&self) -> bool {
        self.throughput.is_full()
            && self
                .throughput
                .average()
                .is_some_and(|rate| rate < self.average_throughput_threshold)
    }
}

impl FrameFilter for BlurFilter {
    fn name(&self) -> &'static str {
        "blur"
    }

    fn accepts(&mut self, frame: &Frame) -> FilterResult {
        let Some(image) = frame.image.as_deref() else {
            return FilterResult::Accepted;
        };

        let variance = laplacian_variance(image);
        let blurred = self.is_blurred(variance);
        self.variances.push(variance);

        let passed = !blurred || self.throughput_starved();
        self.throughput.push(if passed { 1.0 } else { 0.0 });

        trace!(variance, blurred, passed, "Blur check");

        if passed {
            FilterResult::Accepted
        } else {
            FilterResult::Rejected(RejectionReason::ImageQualityBelowThreshold)
        }
    }
}
