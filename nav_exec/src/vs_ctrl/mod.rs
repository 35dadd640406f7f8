//! # Visual servoing control module
//!
//! Visual servoing steers the robot from what the camera sees rather than from a position
//! estimate. The feature extractor reduces the crop row in the image to three image features,
//! the lateral position `x` of the row's reference point, its forward (depth) image coordinate
//! `y` and the heading `theta` of the row line.
//!
//! The interaction matrix relates the camera frame velocity to the rate of change of those
//! features, and a fixed transform maps the robot's (forward velocity, yaw rate) pair onto the
//! camera frame. Composing the two gives a Jacobian from the robot's controls to the features.
//! Only the yaw rate is actually controlled, the forward velocity is held by the navigation
//! state machine, so the feedback law inverts the yaw rate column of the Jacobian and treats the
//! forward velocity column as a known disturbance to compensate for.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod camera;
mod controller;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use camera::*;
pub use controller::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while validating configuration for the navigation modules.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Camera model value {0} must be finite, got {1}")]
    NonFiniteCameraValue(&'static str, f64),

    #[error("The camera height offset must be non-zero")]
    ZeroHeightOffset,

    #[error("Invalid navigation mode {0}, expected a value between 1 and 4")]
    InvalidNavMode(u8),

    #[error("Invalid limits for {0}: minimum {1} is greater than maximum {2}")]
    InvalidLimits(&'static str, f64, f64),

    #[error("Parameter {0} must be finite and positive, got {1}")]
    NonPositive(&'static str, f64),

    #[error("The angular command history must hold at least one command")]
    EmptyHistory,

    #[error("The lateral search direction must be +1 or -1, got {0}")]
    InvalidSearchDir(i8),

    #[error("Region of interest is enabled but point {0} is outside the unit square")]
    InvalidRoiPoint(usize),

    #[error("Invalid window properties: {0}")]
    InvalidWindow(String),

    #[error("Invalid matching thresholds: {0}")]
    InvalidMatching(String),
}

/// Invalid input passed to the control law.
#[derive(Debug, thiserror::Error)]
pub enum InvalidInputError {
    #[error("The {0} pose contains a non-finite value: {1:?}")]
    NonFinitePose(&'static str, PoseError),

    #[error("The desired linear velocity must be finite, got {0}")]
    NonFiniteVelocity(f64),

    #[error("The observed pose {0:?} overflows the control law")]
    NonFiniteCommand(PoseError),
}
