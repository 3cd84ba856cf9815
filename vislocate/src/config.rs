//! Configuration for the localization core.
//!
//! Every tunable lives in a typed struct whose `Default` carries the values
//! the SDK ships with. Hosts that receive a remote configuration document can
//! overlay it with [`LocalizerConfig::from_remote_json`].
//!
//! # Configuration Levels
//!
//! 1. **Filter chain**: force-accept timeout and per-rule thresholds
//! 2. **Evaluator chain**: window timing, score floors and image enhancement
//! 3. **Behavior requester**: incidence and throttle thresholds
//! 4. **Logging**: subscriber filter and optional log file
//!
//! # Example Remote Configuration (JSON)
//!
//! ```json
//! {
//!   "remote_config_id": "2024-06-rollout",
//!   "frame_acceptance_threshold_timeout": 1.5,
//!   "is_blur_filter_enabled": true,
//!   "blur_filter_variance_threshold": 250.0
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

// =============================================================================
// Defaults
// =============================================================================

/// Default time after which the filter chain accepts any frame.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: Duration = Duration::from_secs(1);

/// Default maximum upward and downward camera tilt (radians, π/8).
pub const DEFAULT_MAX_TILT: f32 = std::f32::consts::FRAC_PI_8;

/// Default per-axis translation needed before a new frame is useful (meters).
pub const DEFAULT_MOVEMENT_THRESHOLD: f32 = 0.001;

/// Default Laplacian variance below which an image counts as blurred.
pub const DEFAULT_BLUR_VARIANCE_THRESHOLD: f64 = 275.0;

/// Default fractional drop against the recent average treated as sudden blur.
pub const DEFAULT_BLUR_SUDDEN_DROP_THRESHOLD: f64 = 0.4;

/// Default pass rate below which the blur filter stops rejecting.
pub const DEFAULT_BLUR_THROUGHPUT_THRESHOLD: f64 = 0.25;

/// Default image quality score below which a frame is rejected.
pub const DEFAULT_IMAGE_QUALITY_THRESHOLD: f32 = 0.0;

/// Default mean luminance the image enhancer brightens dark frames towards.
pub const DEFAULT_TARGET_BRIGHTNESS: f32 = 0.3;

/// Default minimum time a window stays open.
pub const DEFAULT_MIN_WINDOW_TIME: Duration = Duration::from_millis(400);

/// Default maximum time a window stays open.
pub const DEFAULT_MAX_WINDOW_TIME: Duration = Duration::from_millis(1200);

/// Default score floor.
pub const DEFAULT_MIN_SCORE: f32 = 0.0;

/// Default score at which a window may close early.
pub const DEFAULT_MIN_HIGH_QUALITY_SCORE: f32 = 0.9;

/// Default number of same-reason rejections before a behavior is requested.
pub const DEFAULT_INCIDENCE_THRESHOLD: u32 = 30;

/// Default minimum time between behavior requests.
pub const DEFAULT_THROTTLE_THRESHOLD: Duration = Duration::from_secs(2);

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "vislocate=info";

// =============================================================================
// Filter chain
// =============================================================================

/// Blur detection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurFilterConfig {
    /// Laplacian variance below which an image is blurred.
    pub variance_threshold: f64,

    /// Fraction below the recent variance average that counts as a sudden drop.
    ///
    /// Range: 0.0 - 1.0
    pub sudden_drop_threshold: f64,

    /// Minimum recent pass rate; below it every frame passes.
    ///
    /// Keeps a dim or low-texture scene from starving the pipeline.
    /// Range: 0.0 - 1.0
    pub average_throughput_threshold: f64,
}

impl Default for BlurFilterConfig {
    fn default() -> Self {
        Self {
            variance_threshold: DEFAULT_BLUR_VARIANCE_THRESHOLD,
            sudden_drop_threshold: DEFAULT_BLUR_SUDDEN_DROP_THRESHOLD,
            average_throughput_threshold: DEFAULT_BLUR_THROUGHPUT_THRESHOLD,
        }
    }
}

/// Image quality rule settings.
///
/// The rule only runs once the host installs an estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQualityFilterConfig {
    /// Off by default.
    pub enabled: bool,

    /// Estimates below this are rejected.
    ///
    /// Range: 0.0 - 1.0
    pub score_threshold: f32,
}

impl Default for ImageQualityFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            score_threshold: DEFAULT_IMAGE_QUALITY_THRESHOLD,
        }
    }
}

/// Settings for the synchronous frame filter chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChainConfig {
    /// Any frame arriving this long after the last accepted frame is
    /// accepted without running the rules.
    pub acceptance_threshold: Duration,

    /// Reject frames unless motion tracking is healthy.
    pub tracking_state_filter_enabled: bool,

    /// Reject frames whose camera pitch is outside the allowed band.
    pub pitch_filter_enabled: bool,

    /// Maximum upward tilt (radians).
    pub max_upward_tilt: f32,

    /// Maximum downward tilt (radians, positive).
    pub max_downward_tilt: f32,

    /// Reject frames until the device has moved.
    pub movement_filter_enabled: bool,

    /// Per-axis translation threshold (meters).
    pub movement_threshold: f32,

    /// Reject blurred images. Off by default.
    pub blur_filter_enabled: bool,

    pub blur: BlurFilterConfig,

    pub image_quality: ImageQualityFilterConfig,
}

impl Default for FilterChainConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            tracking_state_filter_enabled: true,
            pitch_filter_enabled: true,
            max_upward_tilt: DEFAULT_MAX_TILT,
            max_downward_tilt: DEFAULT_MAX_TILT,
            movement_filter_enabled: true,
            movement_threshold: DEFAULT_MOVEMENT_THRESHOLD,
            blur_filter_enabled: false,
            blur: BlurFilterConfig::default(),
            image_quality: ImageQualityFilterConfig::default(),
        }
    }
}

// =============================================================================
// Evaluator chain
// =============================================================================

/// Settings for windowed best-frame selection.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorChainConfig {
    /// A window never closes before this.
    pub min_window_time: Duration,

    /// A window with any best frame closes at this point regardless of score.
    pub max_window_time: Duration,

    /// Scores below this are discarded.
    pub min_score_threshold: f32,

    /// A best frame at or above this closes the window once
    /// `min_window_time` has passed.
    pub min_high_quality_score: f32,

    /// Brighten dark frames before scoring them. Off by default.
    pub image_enhancer_enabled: bool,

    /// Mean luminance the enhancer aims for.
    ///
    /// Range: 0.0 - 1.0
    pub target_brightness: f32,
}

impl Default for EvaluatorChainConfig {
    fn default() -> Self {
        Self {
            min_window_time: DEFAULT_MIN_WINDOW_TIME,
            max_window_time: DEFAULT_MAX_WINDOW_TIME,
            min_score_threshold: DEFAULT_MIN_SCORE,
            min_high_quality_score: DEFAULT_MIN_HIGH_QUALITY_SCORE,
            image_enhancer_enabled: false,
            target_brightness: DEFAULT_TARGET_BRIGHTNESS,
        }
    }
}

// =============================================================================
// Behavior requester
// =============================================================================

/// Settings for rejection-driven user guidance.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorConfig {
    pub enabled: bool,

    /// A reason must be seen more than this many times to trigger.
    pub incidence_threshold: u32,

    /// Minimum time between two requests.
    pub throttle_threshold: Duration,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            incidence_threshold: DEFAULT_INCIDENCE_THRESHOLD,
            throttle_threshold: DEFAULT_THROTTLE_THRESHOLD,
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Settings for [`init_logging`](crate::logging::init_logging).
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub filter: String,

    /// Write a daily-rolling log file into this directory as well as stderr.
    pub log_directory: Option<PathBuf>,

    /// File name prefix for rolled log files.
    pub file_prefix: String,

    /// Emit ANSI colours on stderr.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            log_directory: None,
            file_prefix: "vislocate.log".to_string(),
            ansi: true,
        }
    }
}

// =============================================================================
// Top level
// =============================================================================

/// Complete configuration for a [`LocalizationOrchestrator`](crate::orchestrator::LocalizationOrchestrator).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalizerConfig {
    pub filters: FilterChainConfig,
    pub evaluator: EvaluatorChainConfig,
    pub behavior: BehaviorConfig,
    pub logging: LoggingConfig,

    /// Identifier of the remote configuration in effect, passed to the uploader.
    pub remote_config_id: Option<String>,
}

impl LocalizerConfig {
    /// Check that every setting is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let filters = &self.filters;
        if filters.acceptance_threshold.is_zero() {
            return Err(ConfigError::invalid(
                "acceptance_threshold",
                "must be greater than zero",
            ));
        }
        check_finite_non_negative("max_upward_tilt", filters.max_upward_tilt as f64)?;
        check_finite_non_negative("max_downward_tilt", filters.max_downward_tilt as f64)?;
        check_finite_non_negative("movement_threshold", filters.movement_threshold as f64)?;
        check_finite_non_negative("blur_variance_threshold", filters.blur.variance_threshold)?;
        check_fraction("blur_sudden_drop_threshold", filters.blur.sudden_drop_threshold)?;
        check_fraction(
            "blur_average_throughput_threshold",
            filters.blur.average_throughput_threshold,
        )?;
        check_fraction(
            "image_quality_score_threshold",
            filters.image_quality.score_threshold as f64,
        )?;

        let evaluator = &self.evaluator;
        if evaluator.max_window_time.is_zero() {
            return Err(ConfigError::invalid(
                "max_window_time",
                "must be greater than zero",
            ));
        }
        if evaluator.min_window_time > evaluator.max_window_time {
            return Err(ConfigError::invalid(
                "min_window_time",
                format!(
                    "{:?} exceeds max_window_time {:?}",
                    evaluator.min_window_time, evaluator.max_window_time
                ),
            ));
        }
        if !evaluator.min_score_threshold.is_finite() {
            return Err(ConfigError::invalid("min_score_threshold", "must be finite"));
        }
        if !evaluator.min_high_quality_score.is_finite() {
            return Err(ConfigError::invalid(
                "min_high_quality_score",
                "must be finite",
            ));
        }
        check_fraction("target_brightness", evaluator.target_brightness as f64)?;

        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::invalid("logging.filter", "must not be empty"));
        }

        Ok(())
    }

    /// Build a configuration from a remote configuration document.
    ///
    /// Keys missing from the document keep their defaults.
    pub fn from_remote_json(json: &str) -> Result<Self, ConfigError> {
        let remote: RemoteConfig = serde_json::from_str(json)?;
        let mut config = Self::default();
        remote.apply_to(&mut config)?;
        config.validate()?;
        Ok(config)
    }
}

fn check_finite_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            field,
            format!("{} must be finite and non-negative", value),
        ));
    }
    Ok(())
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{} must be within 0.0 - 1.0", value),
        ));
    }
    Ok(())
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConfigError::invalid(field, format!("{} seconds: {}", value, e)))
}

// =============================================================================
// Remote configuration
// =============================================================================

/// Remote configuration document as delivered by the localization service.
///
/// Times are in seconds and angles in radians. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub remote_config_id: Option<String>,
    pub frame_acceptance_threshold_timeout: Option<f64>,
    pub is_behavior_requester_enabled: Option<bool>,
    pub is_tracking_state_filter_enabled: Option<bool>,
    pub is_movement_filter_enabled: Option<bool>,
    pub movement_filter_threshold: Option<f32>,
    pub is_blur_filter_enabled: Option<bool>,
    pub blur_filter_variance_threshold: Option<f64>,
    pub blur_filter_sudden_drop_threshold: Option<f64>,
    pub blur_filter_average_throughput_threshold: Option<f64>,
    pub is_camera_pitch_filter_enabled: Option<bool>,
    pub camera_pitch_filter_max_upward_tilt: Option<f32>,
    pub camera_pitch_filter_max_downward_tilt: Option<f32>,
    pub is_image_quality_filter_enabled: Option<bool>,
    pub image_quality_filter_score_threshold: Option<f32>,
    pub is_image_enhancer_enabled: Option<bool>,
    pub image_enhancer_target_brightness: Option<f32>,
    pub min_localization_window_time: Option<f64>,
    pub max_localization_window_time: Option<f64>,
    pub min_frame_evaluation_score: Option<f32>,
    pub min_frame_evaluation_high_quality_score: Option<f32>,
}

impl RemoteConfig {
    /// Overlay the keys present in this document onto `config`.
    pub fn apply_to(&self, config: &mut LocalizerConfig) -> Result<(), ConfigError> {
        let filters = &mut config.filters;
        if let Some(secs) = self.frame_acceptance_threshold_timeout {
            filters.acceptance_threshold = seconds("frame_acceptance_threshold_timeout", secs)?;
        }
        if let Some(enabled) = self.is_tracking_state_filter_enabled {
            filters.tracking_state_filter_enabled = enabled;
        }
        if let Some(enabled) = self.is_movement_filter_enabled {
            filters.movement_filter_enabled = enabled;
        }
        if let Some(threshold) = self.movement_filter_threshold {
            filters.movement_threshold = threshold;
        }
        if let Some(enabled) = self.is_blur_filter_enabled {
            filters.blur_filter_enabled = enabled;
        }
        if let Some(threshold) = self.blur_filter_variance_threshold {
            filters.blur.variance_threshold = threshold;
        }
        if let Some(threshold) = self.blur_filter_sudden_drop_threshold {
            filters.blur.sudden_drop_threshold = threshold;
        }
        if let Some(threshold) = self.blur_filter_average_throughput_threshold {
            filters.blur.average_throughput_threshold = threshold;
        }
        if let Some(enabled) = self.is_camera_pitch_filter_enabled {
            filters.pitch_filter_enabled = enabled;
        }
        if let Some(tilt) = self.camera_pitch_filter_max_upward_tilt {
            filters.max_upward_tilt = tilt;
        }
        if let Some(tilt) = self.camera_pitch_filter_max_downward_tilt {
            filters.max_downward_tilt = tilt;
        }
        if let Some(enabled) = self.is_image_quality_filter_enabled {
            filters.image_quality.enabled = enabled;
        }
        if let Some(threshold) = self.image_quality_filter_score_threshold {
            filters.image_quality.score_threshold = threshold;
        }

        let evaluator = &mut config.evaluator;
        if let Some(secs) = self.min_localization_window_time {
            evaluator.min_window_time = seconds("min_localization_window_time", secs)?;
        }
        if let Some(secs) = self.max_localization_window_time {
            evaluator.max_window_time = seconds("max_localization_window_time", secs)?;
        }
        if let Some(score) = self.min_frame_evaluation_score {
            evaluator.min_score_threshold = score;
        }
        if let Some(score) = self.min_frame_evaluation_high_quality_score {
            evaluator.min_high_quality_score = score;
        }
        if let Some(enabled) = self.is_image_enhancer_enabled {
            evaluator.image_enhancer_enabled = enabled;
        }
        if let Some(brightness) = self.image_enhancer_target_brightness {
            evaluator.target_brightness = brightness;
        }

        if let Some(enabled) = self.is_behavior_requester_enabled {
            config.behavior.enabled = enabled;
        }
        if self.remote_config_id.is_some() {
            config.remote_config_id = self.remote_config_id.clone();
        }

        Ok(())
    }
}
