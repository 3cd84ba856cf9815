//! Fusion of per-frame location estimates.
//!
//! Each successful upload yields one coordinate. The [`LocationFuser`]
//! accumulates them for the session and reports the geometric median of the
//! inliers together with a [`Confidence`] that grows with agreement and
//! sample count.

pub mod robust;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Standard deviation (degrees) at or below which samples agree closely.
pub const HIGH_CONFIDENCE_SPREAD: f64 = 0.15;

/// Standard deviation (degrees) at or below which samples roughly agree.
pub const MEDIUM_CONFIDENCE_SPREAD: f64 = 0.5;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Marker for a failed computation.
    pub const NAN: Coordinate = Coordinate {
        latitude: f64::NAN,
        longitude: f64::NAN,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Kind of urban surface at the estimated location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Street,
    Sidewalk,
    Furniture,
    Crosswalk,
    AccessRamp,
    AutoParking,
    BusStop,
    Planter,
    Parking,
    #[serde(other)]
    Unknown,
}

/// A surface zone reported by the localization service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub zone_type: ZoneType,
    #[serde(default)]
    pub id: Option<String>,
}

/// Reliability of a fused location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Level implied by the spread of the samples alone.
    pub fn from_spread(std_dev: f64) -> Self {
        if std_dev <= HIGH_CONFIDENCE_SPREAD {
            Confidence::High
        } else if std_dev <= MEDIUM_CONFIDENCE_SPREAD {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Minimum level guaranteed by the number of samples.
    pub fn from_sample_count(count: usize) -> Self {
        match count {
            0..=2 => Confidence::Low,
            3..=4 => Confidence::Medium,
            _ => Confidence::High,
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Confidence::Low => "L",
            Confidence::Medium => "M",
            Confidence::High => "H",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        write!(f, "{}", text)
    }
}

/// One coordinate returned by the localization service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationSample {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
}

/// The session's best location estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub coordinate: Coordinate,
    pub confidence: Confidence,
    /// Zones from the most recent response.
    pub zones: Vec<Zone>,
    /// Samples accumulated this session.
    pub sample_count: usize,
    /// Samples that passed the outlier test.
    pub inlier_count: usize,
}

/// Accumulates location samples and fuses them.
#[derive(Debug, Default)]
pub struct LocationFuser {
    samples: Vec<LocationSample>,
}

impl LocationFuser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample and return the fused estimate over the session.
    pub fn fuse(&mut self, coordinate: Coordinate, zones: Vec<Zone>) -> FusedResult {
        self.samples.push(LocationSample {
            coordinate,
            timestamp: Utc::now(),
        });

        let points: Vec<Coordinate> = self.samples.iter().map(|s| s.coordinate).collect();
        let inliers: Vec<Coordinate> = points
            .iter()
            .zip(robust::classify_inliers(&points))
            .filter_map(|(p, inlier)| inlier.then_some(*p))
            .collect();

        let fused = Self::finite_location(robust::geometric_median(&inliers), &inliers, coordinate);
        let confidence = Self::confidence(&points);
        debug!(
            samples = points.len(),
            inliers = inliers.len(),
            location = %fused,
            confidence = %confidence,
            "Fused location"
        );

        FusedResult {
            coordinate: fused,
            confidence,
            zones,
            sample_count: points.len(),
            inlier_count: inliers.len(),
        }
    }

    /// `median` if finite, else the inlier mean, else the latest sample.
    fn finite_location(
        median: Coordinate,
        inliers: &[Coordinate],
        latest: Coordinate,
    ) -> Coordinate {
        if median.is_finite() {
            return median;
        }
        warn!(inliers = inliers.len(), "Falling back to mean of inliers");
        robust::mean(inliers)
            .filter(|mean| mean.is_finite())
            .unwrap_or(latest)
    }

    /// Confidence over all samples: the higher of the spread level and the
    /// sample-count floor. Spread only counts once there are two samples.
    pub fn confidence(points: &[Coordinate]) -> Confidence {
        let floor = Confidence::from_sample_count(points.len());
        if points.len() < 2 {
            return floor;
        }
        let spread = robust::population_variance(points)
            .filter(|v| v.is_finite())
            .map(|v| Confidence::from_spread(v.sqrt()))
            .unwrap_or(Confidence::Low);
        spread.max(floor)
    }

    /// Clear the samples for a new session.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn samples(&self) -> &[LocationSample] {
        &self.samples
    }
}
