//! Navigation modes

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::convert::TryFrom;
use std::fmt::Display;

use serde::{Serialize, Deserialize};

use comms_if::eqpt::cam::CamId;

use crate::vs_ctrl::ConfigurationError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The four navigation modes the robot cycles through while working a field.
///
/// Each mode pairs a direction of travel with the camera used to see the row. Modes advance
/// strictly in the order 1, 2, 3, 4, 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NavMode {
    /// Driving forward, following the row with the front camera
    ForwardFront = 1,

    /// Driving forward, leaving the row with the back camera
    ForwardBack = 2,

    /// Driving backward, following the row with the back camera
    BackwardBack = 3,

    /// Driving backward, leaving the row with the front camera
    BackwardFront = 4,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavMode {
    /// All modes in cycle order.
    pub const ALL: [NavMode; 4] = [
        NavMode::ForwardFront,
        NavMode::ForwardBack,
        NavMode::BackwardBack,
        NavMode::BackwardFront
    ];

    /// The mode which follows this one.
    pub fn next(self) -> Self {
        match self {
            NavMode::ForwardFront => NavMode::ForwardBack,
            NavMode::ForwardBack => NavMode::BackwardBack,
            NavMode::BackwardBack => NavMode::BackwardFront,
            NavMode::BackwardFront => NavMode::ForwardFront,
        }
    }

    /// Mode index between 1 and 4
    pub fn index(self) -> u8 {
        self as u8
    }

    /// True in the modes where a full row is followed (1 and 3).
    pub fn is_following(self) -> bool {
        matches!(self, NavMode::ForwardFront | NavMode::BackwardBack)
    }

    /// True in the short hop modes which only hand over to the other camera (2 and 4).
    pub fn is_exiting(self) -> bool {
        !self.is_following()
    }

    pub fn uses_front_camera(self) -> bool {
        matches!(self, NavMode::ForwardFront | NavMode::BackwardFront)
    }

    pub fn uses_back_camera(self) -> bool {
        matches!(self, NavMode::ForwardBack | NavMode::BackwardBack)
    }

    /// The camera this mode looks through.
    pub fn camera(self) -> CamId {
        CamId::from_front_flag(self.uses_front_camera())
    }

    /// Direction of travel, `+1` forward and `-1` backward.
    pub fn travel_direction(self) -> i8 {
        match self {
            NavMode::ForwardFront | NavMode::ForwardBack => 1,
            NavMode::BackwardBack | NavMode::BackwardFront => -1,
        }
    }
}

impl TryFrom<u8> for NavMode {
    type Error = ConfigurationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NavMode::ForwardFront),
            2 => Ok(NavMode::ForwardBack),
            3 => Ok(NavMode::BackwardBack),
            4 => Ok(NavMode::BackwardFront),
            v => Err(ConfigurationError::InvalidNavMode(v))
        }
    }
}

impl From<NavMode> for u8 {
    fn from(mode: NavMode) -> Self {
        mode.index()
    }
}

impl Display for NavMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
