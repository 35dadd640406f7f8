//! # Navigation Executable Parameters
//!
//! This module provide parameters for the navigation executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

use comms_if::net::NetParams;

use crate::vs_ctrl::ConfigurationError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavExecParams {
    /// Network endpoints
    pub net: NetParams,

    /// Target period of one acquisition cycle
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// If true no velocity commands are sent, everything else runs as normal
    #[serde(default)]
    pub debug: bool,

    /// Ratio images are resized by before processing
    pub image_resize_ratio: f64,

    /// JPEG quality of the diagnostic images, between 1 and 100
    pub diag_jpeg_quality: u8,

    /// Recorded extractor results to replay, relative to the software root
    #[serde(default)]
    pub replay_path: Option<String>,

    /// NavCtrl parameter file, relative to the params directory
    pub nav_ctrl_params: String,

    /// Feature extraction parameter file, relative to the params directory
    pub feature_params: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavExecParams {
    /// Check the parameters are consistent.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.cycle_period_s.is_finite() && self.cycle_period_s > 0.0) {
            return Err(ConfigurationError::NonPositive("cycle_period_s", self.cycle_period_s))
        }
        if !(self.image_resize_ratio.is_finite() && self.image_resize_ratio > 0.0) {
            return Err(ConfigurationError::NonPositive(
                "image_resize_ratio", self.image_resize_ratio
            ))
        }
        if self.diag_jpeg_quality == 0 || self.diag_jpeg_quality > 100 {
            return Err(ConfigurationError::NonPositive(
                "diag_jpeg_quality", self.diag_jpeg_quality as f64
            ))
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exec_params() {
        let params: NavExecParams = util::params::from_str(r#"
            cycle_period_s = 0.1
            image_resize_ratio = 0.5
            diag_jpeg_quality = 50
            nav_ctrl_params = "nav_ctrl.toml"
            feature_params = "feature.toml"

            [net]
            cam_endpoint = "tcp://localhost:5030"
            vel_endpoint = "tcp://*:5040"
            diag_endpoint = "tcp://*:5050"
        "#).unwrap();

        assert!(!params.debug);
        assert!(params.replay_path.is_none());
        assert!(params.validate().is_ok());

        let mut bad = params.clone();
        bad.image_resize_ratio = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = params;
        bad.diag_jpeg_quality = 101;
        assert!(bad.validate().is_err());
    }
}
