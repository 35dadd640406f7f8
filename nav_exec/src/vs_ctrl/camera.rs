//! Camera mount model

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

use super::ConfigurationError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Geometry of a camera mount relative to the robot base.
///
/// Both cameras share the same model, the back camera is mounted as a mirror image of the front
/// one. Built once at startup through [`CameraModel::new`] and never changed afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct CameraModel {
    tilt_angle_rad: f64,
    lateral_offset_m: f64,
    height_offset_m: f64,
}

/// Camera mount parameters as they appear in a parameter file.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct CameraParams {
    /// Tilt of the optical axis about the camera X axis.
    ///
    /// Units: radians, negative when looking down at the ground
    pub tilt_angle_rad: f64,

    /// Offset of the camera from the robot's centre of rotation along the robot Y axis.
    ///
    /// Units: meters
    pub lateral_offset_m: f64,

    /// Height of the camera above the ground plane.
    ///
    /// Units: meters
    pub height_offset_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CameraModel {
    /// Create a new camera model.
    ///
    /// All values must be finite and the height offset must be non-zero since it divides the
    /// image feature rates.
    pub fn new(
        tilt_angle_rad: f64, 
        lateral_offset_m: f64, 
        height_offset_m: f64
    ) -> Result<Self, ConfigurationError> {
        if !tilt_angle_rad.is_finite() {
            return Err(ConfigurationError::NonFiniteCameraValue("tilt_angle_rad", tilt_angle_rad))
        }
        if !lateral_offset_m.is_finite() {
            return Err(ConfigurationError::NonFiniteCameraValue(
                "lateral_offset_m", lateral_offset_m
            ))
        }
        if !height_offset_m.is_finite() {
            return Err(ConfigurationError::NonFiniteCameraValue(
                "height_offset_m", height_offset_m
            ))
        }
        if height_offset_m == 0.0 {
            return Err(ConfigurationError::ZeroHeightOffset)
        }

        Ok(Self {
            tilt_angle_rad,
            lateral_offset_m,
            height_offset_m
        })
    }

    /// Build a model from its parameters.
    pub fn from_params(params: &CameraParams) -> Result<Self, ConfigurationError> {
        Self::new(params.tilt_angle_rad, params.lateral_offset_m, params.height_offset_m)
    }

    /// Tilt of the optical axis.
    ///
    /// Units: radians
    pub fn tilt_angle_rad(&self) -> f64 {
        self.tilt_angle_rad
    }

    /// Lateral offset of the camera.
    ///
    /// Units: meters
    pub fn lateral_offset_m(&self) -> f64 {
        self.lateral_offset_m
    }

    /// Height of the camera, never zero.
    ///
    /// Units: meters
    pub fn height_offset_m(&self) -> f64 {
        self.height_offset_m
    }
}

impl Default for CameraParams {
    fn default() -> Self {
        // Camera looking 80 degrees down, mounted on the robot's centreline one meter up
        Self {
            tilt_angle_rad: -80f64.to_radians(),
            lateral_offset_m: 0.0,
            height_offset_m: 1.0
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_camera_validation() {
        let cam = CameraModel::from_params(&CameraParams::default()).unwrap();
        assert_eq!(cam.height_offset_m(), 1.0);
        assert_eq!(cam.lateral_offset_m(), 0.0);

        assert!(matches!(
            CameraModel::new(-1.0, 0.0, 0.0),
            Err(ConfigurationError::ZeroHeightOffset)
        ));
        assert!(matches!(
            CameraModel::new(std::f64::NAN, 0.0, 1.0),
            Err(ConfigurationError::NonFiniteCameraValue("tilt_angle_rad", _))
        ));
        assert!(matches!(
            CameraModel::new(-1.0, std::f64::INFINITY, 1.0),
            Err(ConfigurationError::NonFiniteCameraValue("lateral_offset_m", _))
        ));
        assert!(matches!(
            CameraModel::new(-1.0, 0.0, std::f64::NEG_INFINITY),
            Err(ConfigurationError::NonFiniteCameraValue("height_offset_m", _))
        ));

        // Negative heights are unusual but not degenerate
        assert!(CameraModel::new(-1.0, 0.1, -0.5).is_ok());
    }
}
