//! # Navigation control module
//!
//! Navigation control is the state machine which drives the robot up and down the crop rows of
//! a field. It owns the navigation mode, which camera is active, the direction of travel, and
//! whether the robot is following a row or turning onto the next one.
//!
//! Each cycle is fed the image of the active camera. While following a row the feature
//! extractor's row pose is turned into a yaw rate by the visual servoing control law. When the
//! row is lost the mode advances:
//!
//! - Entering an exiting mode (2 or 4) hands over to the other camera and immediately reruns the
//!   cycle on that camera's image, there is no turn to make.
//! - Entering a following mode (1 or 3) stops the robot and starts an end of row turn. The robot
//!   crawls sideways until the feature extractor reports the tracked features have converged on
//!   the next row, then reverses its direction of travel and follows that row.
//!
//! If mode confirmation is required every mode change waits in an explicit confirmation phase,
//! holding the robot still, until an operator confirms the new mode.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod confirm;
mod mode;
mod params;
mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use confirm::*;
pub use mode::*;
pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors that can occur during NavCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum NavCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid configuration: {0}")]
    ConfigError(crate::vs_ctrl::ConfigurationError),

    #[error("The feature extractor failed to initialise {0} times in a row")]
    InitAttemptsExceeded(u32),

    #[error("No new row was found after {0} cycles of searching")]
    TurnSearchExceeded(u64),
}
