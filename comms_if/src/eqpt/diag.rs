//! # Navigation Diagnostics
//!
//! Packets published once per navigation cycle for display and offline inspection. Publishing is
//! best-effort, nothing in the control path waits on a subscriber.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

use super::{
    cam::{CamFrame, CamId},
    vel::ControlCommand
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A diagnostics packet describing a single navigation cycle.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiagPacket {
    /// Session time at which the cycle was run
    pub time_s: f64,

    /// Navigation mode index (1 to 4)
    pub nav_mode: u8,

    /// Name of the navigation phase after the cycle
    pub phase: String,

    /// Camera which was active at the end of the cycle
    pub active_cam: CamId,

    /// The command produced by the cycle, if any
    pub cmd: Option<ControlCommand>,

    /// The overlay graphic drawn by the feature extractor
    pub graphic: Option<CamFrame>,

    /// The binary crop mask
    pub mask: Option<CamFrame>,

    /// The excess green vegetation index image
    pub exg: Option<CamFrame>,
}
