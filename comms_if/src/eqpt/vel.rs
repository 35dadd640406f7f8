//! # Base Velocity Commands
//!
//! Velocity demands sent from navigation to the robot base controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A velocity command for the robot base, expressed in the robot body frame.
///
/// One command is produced per navigation cycle. The base never acknowledges commands.
#[derive(Debug, Default, Serialize, Deserialize, Copy, Clone, PartialEq)]
pub struct ControlCommand {
    /// Forward velocity along the robot's X+ axis.
    ///
    /// Units: meters/second, positive forwards
    pub linear_ms: f64,

    /// Sideways velocity along the robot's Y+ axis, used while searching for the next row.
    ///
    /// Units: meters/second, positive to the left
    pub lateral_ms: f64,

    /// Yaw rate about the robot's Z+ axis.
    ///
    /// Units: radians/second, right hand rule about Z+ (upwards)
    pub angular_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlCommand {
    /// A command bringing the base to a full stop.
    pub fn stop() -> Self {
        Self::default()
    }

    /// Returns true if every component of the command is zero.
    pub fn is_stop(&self) -> bool {
        self.linear_ms == 0.0 && self.lateral_ms == 0.0 && self.angular_rads == 0.0
    }
}
