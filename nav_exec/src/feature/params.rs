//! Parameters structure for feature extraction

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use image::{GrayImage, Luma};
use imageproc::{drawing::draw_polygon_mut, point::Point};
use serde::{Serialize, Deserialize};

use crate::vs_ctrl::ConfigurationError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of points in the region of interest polygon.
pub const NUM_ROI_POINTS: usize = 8;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for feature extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureParams {
    /// Sliding window properties
    pub window: WindowParams,

    /// Region of interest within the image
    pub roi: RoiParams,

    // ---- CONTOURS ----

    /// Smallest vegetation contour kept as part of a row
    ///
    /// Units: pixels^2
    pub min_contour_area: f64,

    /// Tallest vegetation contour kept as part of a row
    ///
    /// Units: pixels
    pub max_contour_height: f64,

    // ---- TURN TRACKING ----

    /// Number of rows passed during a turn before the next row is followed
    pub lines_to_pass: u32,

    /// Below this difference in matched features the robot is considered to be on a new row
    pub min_matching_dif_features: u32,

    /// Above this difference in matched features the robot is considered to be between rows
    pub max_matching_dif_features: u32,

    /// Minimum number of keypoints needed for a valid match
    pub matching_keypoints_th: u32,
}

/// Sliding window properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowParams {
    /// Start of the window sweep across the image
    ///
    /// Units: pixels
    pub sweep_start: u32,

    /// End of the window sweep across the image
    ///
    /// Units: pixels
    pub sweep_end: u32,

    /// Minimum width of a window
    ///
    /// Units: pixels
    pub min_width: u32,

    /// Window size
    ///
    /// Units: pixels
    pub size: u32,
}

/// Region of interest polygon.
///
/// Points are given as fractions of the image width and height, `[0, 0]` is the top left
/// corner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiParams {
    /// If false the whole image is used
    pub enabled: bool,

    /// Polygon vertices in order
    pub points: [[f64; 2]; NUM_ROI_POINTS],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FeatureParams {
    /// Check the parameters are consistent.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.window.validate()?;
        self.roi.validate()?;

        if !(self.min_contour_area.is_finite() && self.min_contour_area >= 0.0) {
            return Err(ConfigurationError::NonPositive("min_contour_area", self.min_contour_area))
        }
        if !(self.max_contour_height.is_finite() && self.max_contour_height > 0.0) {
            return Err(ConfigurationError::NonPositive(
                "max_contour_height", self.max_contour_height
            ))
        }

        if self.min_matching_dif_features > self.max_matching_dif_features {
            return Err(ConfigurationError::InvalidMatching(format!(
                "min difference {} is greater than max difference {}",
                self.min_matching_dif_features,
                self.max_matching_dif_features
            )))
        }

        Ok(())
    }
}

impl WindowParams {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.sweep_start >= self.sweep_end {
            return Err(ConfigurationError::InvalidWindow(format!(
                "sweep start {} is not before sweep end {}", self.sweep_start, self.sweep_end
            )))
        }
        if self.size == 0 || self.min_width == 0 {
            return Err(ConfigurationError::InvalidWindow(
                "window size and minimum width must be non-zero".into()
            ))
        }

        Ok(())
    }
}

impl RoiParams {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.enabled {
            return Ok(())
        }

        for (i, p) in self.points.iter().enumerate() {
            let inside = p.iter().all(|v| v.is_finite() && *v >= 0.0 && *v <= 1.0);
            if !inside {
                return Err(ConfigurationError::InvalidRoiPoint(i + 1))
            }
        }

        Ok(())
    }

    /// Mask of the region of interest for an image of the given size, 255 inside.
    ///
    /// Returns `None` if the region is disabled. A polygon which collapses to fewer than three
    /// distinct pixels gives an empty mask.
    pub fn mask(&self, width: u32, height: u32) -> Option<GrayImage> {
        if !self.enabled {
            return None
        }

        let mut mask = GrayImage::new(width, height);
        if width == 0 || height == 0 {
            return Some(mask)
        }

        let mut poly: Vec<Point<i32>> = Vec::with_capacity(NUM_ROI_POINTS);
        for [x, y] in self.points.iter() {
            let p = Point::new(
                (x * (width - 1) as f64).round() as i32,
                (y * (height - 1) as f64).round() as i32
            );
            if poly.last() != Some(&p) {
                poly.push(p);
            }
        }

        // The polygon is closed implicitly and must not repeat its first point
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }

        if poly.len() >= 3 {
            draw_polygon_mut(&mut mask, &poly, Luma([255]));
        }

        Some(mask)
    }
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            window: WindowParams {
                sweep_start: 0,
                sweep_end: 600,
                min_width: 80,
                size: 80,
            },
            roi: RoiParams {
                enabled: false,
                points: [
                    [0.0, 0.0], [0.5, 0.0], [1.0, 0.0], [1.0, 0.5],
                    [1.0, 1.0], [0.5, 1.0], [0.0, 1.0], [0.0, 0.5]
                ]
            },
            min_contour_area: 10.0,
            max_contour_height: 120.0,
            lines_to_pass: 1,
            min_matching_dif_features: 0,
            max_matching_dif_features: 100,
            matching_keypoints_th: 10,
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
    fn test_roi_mask() {
        let mut roi = FeatureParams::default().roi;

        // Disabled region masks nothing out
        assert!(roi.mask(10, 10).is_none());

        // Trapezoid narrowing towards the top of the image
        roi.enabled = true;
        roi.points = [
            [0.4, 0.0], [0.5, 0.0], [0.6, 0.0], [0.8, 0.5],
            [1.0, 1.0], [0.5, 1.0], [0.0, 1.0], [0.2, 0.5]
        ];
        assert!(roi.validate().is_ok());

        let mask = roi.mask(100, 100).unwrap();
        assert_eq!(mask.dimensions(), (100, 100));
        assert_eq!(mask.get_pixel(50, 5).0[0], 255);
        assert_eq!(mask.get_pixel(5, 95).0[0], 255);
        assert_eq!(mask.get_pixel(5, 5).0[0], 0);
        assert_eq!(mask.get_pixel(95, 5).0[0], 0);

        // Repeated vertices, including a closing point, are accepted
        roi.points = [
            [0.0, 0.0], [0.0, 0.0], [1.0, 0.0], [1.0, 1.0],
            [1.0, 1.0], [0.0, 1.0], [0.0, 1.0], [0.0, 0.0]
        ];
        let mask = roi.mask(10, 10).unwrap();
        assert!(mask.pixels().all(|p| p.0[0] == 255));

        // Collapsed polygon keeps nothing
        roi.points = [[0.5, 0.5]; NUM_ROI_POINTS];
        let mask = roi.mask(10, 10).unwrap();
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_validate() {
        assert!(FeatureParams::default().validate().is_ok());

        let mut p = FeatureParams::default();
        p.roi.enabled = true;
        p.roi.points[3] = [1.5, 0.5];
        assert!(matches!(p.validate(), Err(ConfigurationError::InvalidRoiPoint(4))));

        let mut p = FeatureParams::default();
        p.window.sweep_end = 0;
        assert!(matches!(p.validate(), Err(ConfigurationError::InvalidWindow(_))));

        let mut p = FeatureParams::default();
        p.min_matching_dif_features = 200;
        assert!(matches!(p.validate(), Err(ConfigurationError::InvalidMatching(_))));
    }
}
