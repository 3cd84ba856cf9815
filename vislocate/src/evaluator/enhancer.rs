//! Gamma correction for dark frames.
//!
//! A frame whose mean luminance is below the target brightness is brightened
//! with a gamma curve before it is scored, so the evaluator and the
//! positioning service both see the corrected image.
//!
//! The gamma is found by bisection over the luminance histogram: starting at
//! 1.0 with a step of 0.5, the gamma moves towards the target and the step
//! halves until the corrected mean lands within 1% of the target.

use std::sync::Arc;

use image::GrayImage;
use tracing::debug;

use crate::frame::Frame;

/// Bisection steps before giving up on hitting the target band.
const MAX_GAMMA_ITERATIONS: usize = 24;

/// Accepted distance from the target brightness, as a fraction of it.
const TARGET_TOLERANCE: f64 = 0.01;

/// Brightens dark frames towards a target mean luminance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageEnhancer {
    target_brightness: f64,
}

impl ImageEnhancer {
    /// `target_brightness` is a mean luminance in `0.0..=1.0`.
    pub fn new(target_brightness: f32) -> Self {
        Self {
            target_brightness: target_brightness as f64,
        }
    }

    pub fn target_brightness(&self) -> f32 {
        self.target_brightness as f32
    }

    /// Replace the frame's image with a corrected copy if it is too dark.
    ///
    /// Records the applied gamma on the frame. Returns whether the image
    /// changed.
    pub fn enhance_frame(&self, frame: &mut Frame) -> bool {
        let Some(image) = frame.image.as_deref() else {
            return false;
        };
        let Some((corrected, gamma)) = self.enhance(image) else {
            return false;
        };
        debug!(gamma, "Brightened dark frame");
        frame.image = Some(Arc::new(corrected));
        frame.enhanced_gamma = Some(gamma);
        true
    }

    /// Gamma-correct `image` towards the target brightness.
    ///
    /// Returns `None` when the image is already bright enough, empty or
    /// completely black.
    pub fn enhance(&self, image: &GrayImage) -> Option<(GrayImage, f32)> {
        let histogram = luminance_histogram(image);
        let total: u64 = histogram.iter().sum();
        if total == 0 {
            return None;
        }

        let target = self.target_brightness;
        let mut mean = mean_brightness(&histogram, total, 1.0);
        if mean > target || mean == 0.0 {
            return None;
        }

        let low = target - target * TARGET_TOLERANCE;
        let high = target + target * TARGET_TOLERANCE;
        let mut gamma = 1.0;
        let mut step = 0.5;
        for _ in 0..MAX_GAMMA_ITERATIONS {
            if (low..=high).contains(&mean) {
                break;
            }
            if mean < target {
                gamma -= step;
            } else {
                gamma += step;
            }
            step /= 2.0;
            mean = mean_brightness(&histogram, total, gamma);
        }

        if gamma == 1.0 {
            return None;
        }

        let lut = gamma_lut(gamma);
        let mut corrected = image.clone();
        for pixel in corrected.pixels_mut() {
            pixel.0[0] = lut[pixel.0[0] as usize];
        }
        Some((corrected, gamma as f32))
    }
}

fn luminance_histogram(image: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    histogram
}

/// Bin `i` stands for luminance `i / 256`.
fn bin_value(bin: usize) -> f64 {
    bin as f64 / 256.0
}

fn mean_brightness(histogram: &[u64; 256], total: u64, gamma: f64) -> f64 {
    histogram
        .iter()
        .enumerate()
        .map(|(bin, &count)| bin_value(bin).powf(gamma) * count as f64)
        .sum::<f64>()
        / total as f64
}

fn gamma_lut(gamma: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (bin, value) in lut.iter_mut().enumerate() {
        *value = (bin_value(bin).powf(gamma) * 256.0).min(255.0) as u8;
    }
    lut
}
