//! Frame samples produced by the motion-tracking source.
//!
//! A [`Frame`] is a single pose/image sample. The filter chain inspects the
//! pose and tracking state; the evaluator chain attaches a
//! [`FrameEvaluation`] once a score is available.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use image::GrayImage;
use serde::Serialize;

/// Device position in the tracking session's world space (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Device orientation as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Orientation {
    /// No rotation: camera looking straight ahead along -Z.
    pub const IDENTITY: Orientation = Orientation {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians around the X axis.
    ///
    /// Positive angles tilt the camera up.
    pub fn from_pitch(angle: f32) -> Self {
        let half = angle / 2.0;
        Self {
            x: half.sin(),
            y: 0.0,
            z: 0.0,
            w: half.cos(),
        }
    }

    /// Elevation of the camera's forward axis in radians.
    ///
    /// The forward axis is -Z rotated by this quaternion. Its vertical
    /// component is `2(wx - yz)`; positive values look above the horizon.
    pub fn pitch(&self) -> f32 {
        let sin_pitch = 2.0 * (self.w * self.x - self.y * self.z);
        sin_pitch.clamp(-1.0, 1.0).asin()
    }

    /// Yaw, pitch and roll in radians, applied in that order.
    ///
    /// Yaw turns about the vertical Y axis, pitch about X and roll about Z.
    /// The pitch matches [`pitch`](Self::pitch).
    pub fn euler_angles(&self) -> EulerAngles {
        let Self { x, y, z, w } = *self;
        EulerAngles {
            yaw: (2.0 * (w * y + x * z)).atan2(1.0 - 2.0 * (x * x + y * y)),
            pitch: self.pitch(),
            roll: (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (x * x + z * z)),
        }
    }
}

/// Orientation split into per-axis angles (radians).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

/// Position and orientation of the device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Position,
    pub orientation: Orientation,
}

impl Pose {
    pub fn new(position: Position, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// Why motion tracking is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingFailureReason {
    /// Tracking is starting up.
    Initializing,
    /// Tracking is recovering after an interruption.
    Relocalizing,
    /// The tracker reports an internal bad state.
    BadState,
    /// Not enough light to track.
    InsufficientLight,
    /// The device is moving too fast to track.
    ExcessiveMotion,
    /// Not enough texture in view to track.
    InsufficientFeatures,
    /// The camera is in use elsewhere or unavailable.
    CameraUnavailable,
}

/// Motion-tracking quality reported with each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackingState {
    /// Tracking normally.
    Tracking,
    /// Tracking temporarily degraded.
    Paused(TrackingFailureReason),
    /// Tracking has stopped.
    Stopped,
}

impl TrackingState {
    pub fn is_tracking(&self) -> bool {
        matches!(self, TrackingState::Tracking)
    }
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingState::Tracking => write!(f, "tracking"),
            TrackingState::Paused(reason) => write!(f, "paused({:?})", reason),
            TrackingState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Evaluator-specific details reported alongside a score.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EvaluationInfo {
    /// Version of the scoring model, empty if unknown.
    pub model_version: String,
    /// Why the evaluator could not produce a real score.
    pub error: Option<String>,
}

impl EvaluationInfo {
    pub fn new(model_version: impl Into<String>) -> Self {
        Self {
            model_version: model_version.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Score attached to a frame by the evaluator chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEvaluation {
    /// Quality score, higher is better. Nominally in `0.0..=1.0`.
    pub score: f32,
    /// How long the evaluator took.
    pub duration: Duration,
    pub user_info: Option<EvaluationInfo>,
}

impl FrameEvaluation {
    /// Score used when the evaluator failed but the frame was kept anyway.
    pub const SENTINEL_SCORE: f32 = 0.0;

    pub fn new(score: f32, duration: Duration) -> Self {
        Self {
            score,
            duration,
            user_info: None,
        }
    }

    pub fn with_user_info(mut self, user_info: EvaluationInfo) -> Self {
        self.user_info = Some(user_info);
        self
    }

    /// Stand-in for a failed evaluation. Keeps whatever details the
    /// evaluator reported.
    pub(crate) fn sentinel(user_info: Option<EvaluationInfo>) -> Self {
        Self {
            score: Self::SENTINEL_SCORE,
            duration: Duration::ZERO,
            user_info,
        }
    }
}

/// A single pose/image sample.
///
/// Cloning is cheap: the image buffer is shared.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pose: Pose,
    pub tracking_state: TrackingState,
    /// Capture time on the source clock.
    pub timestamp: Duration,
    /// Grayscale camera image, when the source provides one.
    pub image: Option<Arc<GrayImage>>,
    /// Gamma applied by the image enhancer, if it brightened the image.
    pub enhanced_gamma: Option<f32>,
    /// Set by the evaluator chain once scored.
    pub evaluation: Option<FrameEvaluation>,
}

impl Frame {
    pub fn new(pose: Pose, tracking_state: TrackingState, timestamp: Duration) -> Self {
        Self {
            pose,
            tracking_state,
            timestamp,
            image: None,
            enhanced_gamma: None,
            evaluation: None,
        }
    }

    /// Attach a grayscale image.
    pub fn with_image(mut self, image: GrayImage) -> Self {
        self.image = Some(Arc::new(image));
        self
    }

    /// Score of the attached evaluation, if any.
    pub fn score(&self) -> Option<f32> {
        self.evaluation.as_ref().map(|e| e.score)
    }
}
