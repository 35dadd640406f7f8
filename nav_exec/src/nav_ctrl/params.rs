//! Parameters structure for NavCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

use super::NavMode;
use crate::vs_ctrl::{CameraParams, ConfigurationError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for navigation control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {

    // ---- MODES ----

    /// Mode to start navigating in
    pub initial_mode: NavMode,

    /// If true every mode change waits for an operator confirmation before it takes effect.
    #[serde(default)]
    pub require_mode_confirmation: bool,

    // ---- LIMITS ----

    /// Minimum commanded forward velocity
    ///
    /// Units: meters/second
    pub min_linear_vel_ms: f64,

    /// Maximum commanded forward velocity
    ///
    /// Units: meters/second
    pub max_linear_vel_ms: f64,

    /// Minimum commanded yaw rate
    ///
    /// Units: radians/second
    pub min_angular_vel_rads: f64,

    /// Maximum commanded yaw rate
    ///
    /// Units: radians/second
    pub max_angular_vel_rads: f64,

    // ---- ROW FOLLOWING ----

    /// Factor applied to the raw control law output before limiting
    pub omega_scaler: f64,

    /// Forward speed while following a row, signed by the direction of travel
    ///
    /// Units: meters/second
    pub base_forward_speed_ms: f64,

    /// Forward speed the control law compensates for
    ///
    /// Units: meters/second
    pub desired_linear_vel_ms: f64,

    /// Number of past angular commands kept as a last known good fallback
    pub omega_history_len: usize,

    // ---- TURNING ----

    /// Speed of the sideways crawl while searching for the next row
    ///
    /// Units: meters/second
    pub lateral_search_speed_ms: f64,

    /// Direction of the sideways crawl, `+1` to the left and `-1` to the right
    pub lateral_search_dir: i8,

    /// Forward speed of the nudge given once the next row has been found
    ///
    /// Units: meters/second
    pub exit_nudge_speed_ms: f64,

    // ---- RETRY BOUNDS ----

    /// Maximum number of consecutive failed extractor initialisations, unbounded if not set
    #[serde(default)]
    pub max_init_attempts: Option<u32>,

    /// Maximum number of cycles spent searching for the next row, unbounded if not set
    #[serde(default)]
    pub max_turn_search_cycles: Option<u64>,

    // ---- CAMERA ----

    /// Mount geometry shared by both cameras
    #[serde(default)]
    pub camera: CameraParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters are consistent.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_limits("linear velocity", self.min_linear_vel_ms, self.max_linear_vel_ms)?;
        check_limits("angular velocity", self.min_angular_vel_rads, self.max_angular_vel_rads)?;

        check_positive("omega_scaler", self.omega_scaler)?;
        check_positive("base_forward_speed_ms", self.base_forward_speed_ms)?;
        check_positive("lateral_search_speed_ms", self.lateral_search_speed_ms)?;
        check_positive("exit_nudge_speed_ms", self.exit_nudge_speed_ms)?;

        if !self.desired_linear_vel_ms.is_finite() {
            return Err(ConfigurationError::NonPositive(
                "desired_linear_vel_ms", self.desired_linear_vel_ms
            ))
        }

        if self.omega_history_len == 0 {
            return Err(ConfigurationError::EmptyHistory)
        }

        if self.lateral_search_dir != 1 && self.lateral_search_dir != -1 {
            return Err(ConfigurationError::InvalidSearchDir(self.lateral_search_dir))
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            initial_mode: NavMode::ForwardFront,
            require_mode_confirmation: false,
            min_linear_vel_ms: -0.3,
            max_linear_vel_ms: 0.3,
            min_angular_vel_rads: -0.3,
            max_angular_vel_rads: 0.3,
            omega_scaler: 0.1,
            base_forward_speed_ms: 0.2,
            desired_linear_vel_ms: 0.3,
            omega_history_len: 20,
            lateral_search_speed_ms: 0.08,
            lateral_search_dir: -1,
            exit_nudge_speed_ms: 0.07,
            max_init_attempts: None,
            max_turn_search_cycles: None,
            camera: CameraParams::default()
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_limits(name: &'static str, min: f64, max: f64) -> Result<(), ConfigurationError> {
    if !min.is_finite() || !max.is_finite() || min > max {
        Err(ConfigurationError::InvalidLimits(name, min, max))
    }
    else {
        Ok(())
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    }
    else {
        Err(ConfigurationError::NonPositive(name, value))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_from_toml() {
        let params: Params = util::params::from_str(r#"
            initial_mode = 3
            min_linear_vel_ms = -0.3
            max_linear_vel_ms = 0.3
            min_angular_vel_rads = -0.3
            max_angular_vel_rads = 0.3
            omega_scaler = 0.1
            base_forward_speed_ms = 0.2
            desired_linear_vel_ms = 0.3
            omega_history_len = 20
            lateral_search_speed_ms = 0.08
            lateral_search_dir = -1
            exit_nudge_speed_ms = 0.07
            max_turn_search_cycles = 600

            [camera]
            tilt_angle_rad = -1.3962634
            lateral_offset_m = 0.0
            height_offset_m = 1.0
        "#).unwrap();

        assert_eq!(params.initial_mode, NavMode::BackwardBack);
        assert!(!params.require_mode_confirmation);
        assert_eq!(params.max_init_attempts, None);
        assert_eq!(params.max_turn_search_cycles, Some(600));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let res: Result<Params, _> = util::params::from_str(r#"
            initial_mode = 5
            min_linear_vel_ms = -0.3
            max_linear_vel_ms = 0.3
            min_angular_vel_rads = -0.3
            max_angular_vel_rads = 0.3
            omega_scaler = 0.1
            base_forward_speed_ms = 0.2
            desired_linear_vel_ms = 0.3
            omega_history_len = 20
            lateral_search_speed_ms = 0.08
            lateral_search_dir = -1
            exit_nudge_speed_ms = 0.07
        "#);

        assert!(res.is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Params::default().validate().is_ok());

        let mut p = Params::default();
        p.min_angular_vel_rads = 1.0;
        assert!(matches!(p.validate(), Err(ConfigurationError::InvalidLimits(_, _, _))));

        let mut p = Params::default();
        p.omega_history_len = 0;
        assert!(matches!(p.validate(), Err(ConfigurationError::EmptyHistory)));

        let mut p = Params::default();
        p.lateral_search_dir = 0;
        assert!(matches!(p.validate(), Err(ConfigurationError::InvalidSearchDir(0))));

        let mut p = Params::default();
        p.base_forward_speed_ms = std::f64::NAN;
        assert!(matches!(p.validate(), Err(ConfigurationError::NonPositive(_, _))));
    }
}
