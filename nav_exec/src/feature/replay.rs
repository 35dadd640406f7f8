//! Replay feature extractor
//!
//! Plays back a recorded stream of extractor results from a CSV file with the header
//! `found,lateral,depth,heading,converged`. Each call to
//! [`FeatureExtractor::update_lines_at_windows`] or [`FeatureExtractor::match_tracking_features`]
//! consumes one record. Once the records run out the extractor reports no row and no
//! convergence.
//!
//! The vegetation mask is still computed from the real image so the diagnostics stay
//! meaningful during a dry run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{io::Read, path::Path};

use image::{GrayImage, Luma, Rgb, RgbImage};
use log::{debug, info};
use serde::{Serialize, Deserialize};

use super::{
    exg, ExtractorError, FeatureExtractor, FeatureParams, RowDetection, TrackingMatch
};
use crate::{nav_ctrl::NavMode, vs_ctrl::PoseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single recorded extractor result.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub found: bool,
    pub lateral: f64,
    pub depth: f64,
    pub heading: f64,
    pub converged: bool,
}

/// Feature extractor replaying recorded results.
pub struct ReplayExtractor {
    params: FeatureParams,

    records: Vec<ReplayRecord>,
    cursor: usize,

    initialised: bool,

    /// Mode tracking features were detected for, `None` outside of a turn
    tracking_mode: Option<NavMode>,

    image: Option<RgbImage>,
    graphic: Option<RgbImage>,

    /// Region of interest mask, rebuilt only when the image size changes
    roi_mask: Option<GrayImage>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReplayExtractor {
    /// Load a replay from a CSV file.
    pub fn from_path<P: AsRef<Path>>(
        path: P, 
        params: FeatureParams
    ) -> Result<Self, ExtractorError> {
        let reader = csv::Reader::from_path(path)
            .map_err(ExtractorError::ReplayOpenError)?;

        Self::from_csv(reader, params)
    }

    /// Load a replay from any reader providing CSV data.
    pub fn from_reader<R: Read>(reader: R, params: FeatureParams) -> Result<Self, ExtractorError> {
        Self::from_csv(csv::Reader::from_reader(reader), params)
    }

    /// Create a replay directly from records.
    pub fn from_records(records: Vec<ReplayRecord>, params: FeatureParams) -> Self {
        Self {
            params,
            records,
            cursor: 0,
            initialised: false,
            tracking_mode: None,
            image: None,
            graphic: None,
            roi_mask: None
        }
    }

    /// Number of records not yet consumed.
    pub fn remaining(&self) -> usize {
        self.records.len() - self.cursor
    }

    fn from_csv<R: Read>(
        mut reader: csv::Reader<R>, 
        params: FeatureParams
    ) -> Result<Self, ExtractorError> {
        let mut records = Vec::new();

        for (i, result) in reader.deserialize().enumerate() {
            records.push(result.map_err(|e| ExtractorError::ReplayRecordError(i + 1, e))?);
        }

        info!("Loaded {} replay records", records.len());

        Ok(Self::from_records(records, params))
    }

    fn next_record(&mut self) -> Option<ReplayRecord> {
        let record = self.records.get(self.cursor).copied();

        if record.is_some() {
            self.cursor += 1;
        }

        record
    }

    /// Vegetation mask of the current image limited to the region of interest.
    fn mask(&self) -> Option<GrayImage> {
        let image = self.image.as_ref()?;
        let mut mask = exg::vegetation_mask(&exg::excess_green(image));

        if let Some(roi) = &self.roi_mask {
            for (px, r) in mask.pixels_mut().zip(roi.pixels()) {
                if r.0[0] == 0 {
                    *px = Luma([0]);
                }
            }
        }

        Some(mask)
    }
}

impl FeatureExtractor for ReplayExtractor {
    fn is_initialised(&self) -> bool {
        self.initialised
    }

    fn initialise(&mut self) -> Result<(), ExtractorError> {
        if self.records.is_empty() {
            return Err(ExtractorError::EmptyReplay)
        }

        self.initialised = true;

        Ok(())
    }

    fn set_image(&mut self, image: &RgbImage) {
        let stale = match &self.roi_mask {
            Some(m) => m.dimensions() != image.dimensions(),
            None => self.params.roi.enabled
        };
        if stale {
            self.roi_mask = self.params.roi.mask(image.width(), image.height());
        }

        self.image = Some(image.clone());
    }

    fn update_lines_at_windows(&mut self) -> RowDetection {
        let mask = self.mask();

        let record = match self.next_record() {
            Some(r) => r,
            None => {
                debug!("Replay exhausted, reporting no row");
                return RowDetection {
                    found: false,
                    pose: PoseError::default(),
                    mask
                }
            }
        };

        // Tint the vegetation on the graphic
        self.graphic = match (&self.image, &mask) {
            (Some(img), Some(m)) => {
                let mut g = img.clone();
                for (px, mp) in g.pixels_mut().zip(m.pixels()) {
                    if mp.0[0] > 0 {
                        *px = Rgb([px.0[0] / 2, 255, px.0[2] / 2]);
                    }
                }
                Some(g)
            },
            _ => None
        };

        RowDetection {
            found: record.found,
            pose: PoseError::new(record.lateral, record.depth, record.heading),
            mask
        }
    }

    fn detect_tracking_features(&mut self, mode: NavMode) {
        debug!("Tracking features for mode {}", mode);
        self.tracking_mode = Some(mode);
    }

    fn match_tracking_features(&mut self, mode: NavMode) -> TrackingMatch {
        if self.tracking_mode != Some(mode) {
            debug!("Matching features for mode {} without tracking them first", mode);
        }

        let converged = self.next_record()
            .map(|r| r.converged)
            .unwrap_or(false);

        if converged {
            self.tracking_mode = None;
        }

        TrackingMatch {
            converged,
            overlay: self.image.clone()
        }
    }

    fn reset(&mut self) {
        self.initialised = false;
        self.tracking_mode = None;
        self.graphic = None;
    }

    fn graphic(&self) -> Option<RgbImage> {
        self.graphic.clone()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const REPLAY_CSV: &str = "\
found,lateral,depth,heading,converged
true,0.1,160.0,0.02,false
false,0.0,0.0,0.0,false
false,0.0,0.0,0.0,true
";

    #[test]
    fn test_replay_sequence() {
        let mut ext = ReplayExtractor::from_reader(
            REPLAY_CSV.as_bytes(), 
            FeatureParams::default()
        ).unwrap();

        assert!(!ext.is_initialised());
        ext.initialise().unwrap();
        assert!(ext.is_initialised());
        assert_eq!(ext.remaining(), 3);

        let det = ext.update_lines_at_windows();
        assert!(det.found);
        assert_eq!(det.pose, PoseError::new(0.1, 160.0, 0.02));
        assert!(det.mask.is_none());

        let det = ext.update_lines_at_windows();
        assert!(!det.found);

        ext.detect_tracking_features(NavMode::BackwardBack);
        assert!(ext.match_tracking_features(NavMode::BackwardBack).converged);

        // Exhausted
        assert_eq!(ext.remaining(), 0);
        assert!(!ext.update_lines_at_windows().found);
        assert!(!ext.match_tracking_features(NavMode::BackwardBack).converged);

        ext.reset();
        assert!(!ext.is_initialised());
    }

    #[test]
    fn test_empty_replay_fails_init() {
        let mut ext = ReplayExtractor::from_reader(
            "found,lateral,depth,heading,converged\n".as_bytes(),
            FeatureParams::default()
        ).unwrap();

        assert!(matches!(ext.initialise(), Err(ExtractorError::EmptyReplay)));
        assert!(!ext.is_initialised());
    }

    #[test]
    fn test_bad_record() {
        let res = ReplayExtractor::from_reader(
            "found,lateral,depth,heading,converged\ntrue,abc,0,0,false\n".as_bytes(),
            FeatureParams::default()
        );

        assert!(matches!(res, Err(ExtractorError::ReplayRecordError(1, _))));
    }

    #[test]
    fn test_mask_and_graphic_from_image() {
        let mut ext = ReplayExtractor::from_records(
            vec![ReplayRecord {
                found: true, lateral: 0.0, depth: 2.0, heading: 0.0, converged: false
            }],
            FeatureParams::default()
        );

        let mut img = RgbImage::from_pixel(4, 2, Rgb([120, 90, 60]));
        img.put_pixel(1, 0, Rgb([30, 200, 30]));
        img.put_pixel(1, 1, Rgb([30, 200, 30]));
        ext.set_image(&img);

        let det = ext.update_lines_at_windows();
        let mask = det.mask.unwrap();
        assert_eq!(mask.get_pixel(1, 0).0[0], 255);
        assert_eq!(mask.get_pixel(3, 1).0[0], 0);

        let graphic = ext.graphic().unwrap();
        assert_eq!(graphic.get_pixel(1, 1).0[1], 255);
        assert_eq!(*graphic.get_pixel(3, 0), Rgb([120, 90, 60]));
    }

    #[test]
    fn test_mask_limited_to_roi() {
        let mut params = FeatureParams::default();
        params.roi.enabled = true;
        // Left half of the image only
        params.roi.points = [
            [0.0, 0.0], [0.25, 0.0], [0.5, 0.0], [0.5, 0.5],
            [0.5, 1.0], [0.25, 1.0], [0.0, 1.0], [0.0, 0.5]
        ];
        let records = vec![
            ReplayRecord { found: true, lateral: 0.0, depth: 4.0, heading: 0.0, converged: false };
            2
        ];
        let mut ext = ReplayExtractor::from_records(records, params);

        // Green columns at x = 1 and x = 8
        let mut img = RgbImage::from_pixel(10, 4, Rgb([120, 90, 60]));
        for y in 0..4 {
            img.put_pixel(1, y, Rgb([30, 200, 30]));
            img.put_pixel(8, y, Rgb([30, 200, 30]));
        }
        ext.set_image(&img);

        let mask = ext.update_lines_at_windows().mask.unwrap();
        for y in 0..4 {
            assert_eq!(mask.get_pixel(1, y).0[0], 255);
            assert_eq!(mask.get_pixel(8, y).0[0], 0);
        }

        // A new image size rebuilds the region
        let mut img = RgbImage::from_pixel(20, 2, Rgb([120, 90, 60]));
        for y in 0..2 {
            img.put_pixel(3, y, Rgb([30, 200, 30]));
            img.put_pixel(15, y, Rgb([30, 200, 30]));
        }
        ext.set_image(&img);
        let mask = ext.update_lines_at_windows().mask.unwrap();
        assert_eq!(mask.dimensions(), (20, 2));
        assert_eq!(mask.get_pixel(3, 1).0[0], 255);
        assert_eq!(mask.get_pixel(15, 1).0[0], 0);
    }
}
