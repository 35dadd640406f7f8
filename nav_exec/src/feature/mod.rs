//! # Feature extraction module
//!
//! Navigation does not look at images itself. It drives a [`FeatureExtractor`] which turns the
//! active camera's image into a crop row pose and a vegetation mask, and which tracks a set of
//! features through an end of row turn to tell when the next row has been reached.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod exg;
mod params;
pub mod replay;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use image::{GrayImage, RgbImage};

use crate::{nav_ctrl::NavMode, vs_ctrl::PoseError};

pub use params::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Result of looking for the crop row in the current image.
#[derive(Debug, Clone, Default)]
pub struct RowDetection {
    /// True if a row was found in the image
    pub found: bool,

    /// Pose of the row in the image, only meaningful if `found` is set
    pub pose: PoseError,

    /// Binary vegetation mask of the image
    pub mask: Option<GrayImage>,
}

/// Result of matching the tracked features during a turn.
#[derive(Debug, Clone, Default)]
pub struct TrackingMatch {
    /// True once the tracked features show the robot has reached the next row
    pub converged: bool,

    /// Image with the matched features drawn on it
    pub overlay: Option<RgbImage>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by feature extractors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractorError {
    #[error("No image has been set on the extractor")]
    NoImage,

    #[error("Could not open the replay file: {0}")]
    ReplayOpenError(csv::Error),

    #[error("Could not parse replay record {0}: {1}")]
    ReplayRecordError(usize, csv::Error),

    #[error("The replay file contains no records")]
    EmptyReplay,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A source of crop row detections and turn tracking results.
pub trait FeatureExtractor {
    /// True once [`FeatureExtractor::initialise`] has succeeded.
    fn is_initialised(&self) -> bool;

    /// Prepare the extractor for the current image.
    ///
    /// Failure is not fatal, navigation switches camera and tries again on the next frame.
    fn initialise(&mut self) -> Result<(), ExtractorError>;

    /// Set the image the next detection or matching call works on.
    fn set_image(&mut self, image: &RgbImage);

    /// Look for the crop row in the current image.
    fn update_lines_at_windows(&mut self) -> RowDetection;

    /// Start tracking features ahead of an end of row turn into the given mode.
    fn detect_tracking_features(&mut self, mode: NavMode);

    /// Match the tracked features against the current image.
    fn match_tracking_features(&mut self, mode: NavMode) -> TrackingMatch;

    /// Drop all detection and tracking state, as if the extractor had just been created.
    fn reset(&mut self);

    /// Overlay graphic of the most recent detection, if any.
    fn graphic(&self) -> Option<RgbImage>;
}
