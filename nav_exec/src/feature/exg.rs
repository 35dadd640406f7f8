//! Excess green vegetation index
//!
//! Plants are separated from soil using the excess green index `2g - r - b`, computed on the
//! chromatic coordinates of each pixel so that it does not depend on the scene brightness.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast;

use util::maths::lin_map;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the excess green index of an image.
///
/// The index is stretched so the least green pixel maps to 0 and the most green to 255. A flat
/// image maps to all zeros.
pub fn excess_green(image: &RgbImage) -> GrayImage {
    let index: Vec<f64> = image.pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            let sum = r as f64 + g as f64 + b as f64;

            // Black pixels have no chromaticity
            if sum == 0.0 {
                return 0.0
            }

            (2.0 * g as f64 - r as f64 - b as f64) / sum
        })
        .collect();

    let min = index.iter().cloned().fold(std::f64::INFINITY, f64::min);
    let max = index.iter().cloned().fold(std::f64::NEG_INFINITY, f64::max);

    let mut out = GrayImage::new(image.width(), image.height());

    if index.is_empty() || max <= min {
        return out
    }

    for (px, v) in out.pixels_mut().zip(index.iter()) {
        *px = Luma([lin_map((min, max), (0.0, 255.0), *v).round() as u8]);
    }

    out
}

/// Binary vegetation mask of an excess green image.
///
/// The threshold is picked with Otsu's method, pixels above it are set to 255.
pub fn vegetation_mask(exg: &GrayImage) -> GrayImage {
    contrast::threshold(exg, contrast::otsu_level(exg))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgb;

    /// Soil coloured image with a single green column at x = 2
    fn row_image() -> RgbImage {
        let mut img = RgbImage::from_pixel(5, 4, Rgb([120, 90, 60]));
        for y in 0..4 {
            img.put_pixel(2, y, Rgb([40, 160, 30]));
        }
        img
    }

    #[test]
    fn test_excess_green() {
        let exg = excess_green(&row_image());

        assert_eq!(exg.dimensions(), (5, 4));
        assert_eq!(exg.get_pixel(2, 1).0[0], 255);
        assert_eq!(exg.get_pixel(0, 1).0[0], 0);

        // Flat images have no contrast to stretch
        let flat = excess_green(&RgbImage::from_pixel(3, 3, Rgb([10, 10, 10])));
        assert!(flat.pixels().all(|p| p.0[0] == 0));

        // Brightness does not change the index
        let dark = excess_green(&RgbImage::from_pixel(1, 1, Rgb([0, 0, 0])));
        assert_eq!(dark.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn test_vegetation_mask() {
        let mask = vegetation_mask(&excess_green(&row_image()));

        for y in 0..4 {
            for x in 0..5 {
                let expected = if x == 2 { 255 } else { 0 };
                assert_eq!(mask.get_pixel(x, y).0[0], expected);
            }
        }

        // Two well separated levels split between them
        let mut exg = GrayImage::from_pixel(4, 4, Luma([20]));
        for x in 0..4 {
            exg.put_pixel(x, 0, Luma([200]));
            exg.put_pixel(x, 1, Luma([210]));
        }
        let mask = vegetation_mask(&exg);
        assert_eq!(mask.get_pixel(0, 0).0[0], 255);
        assert_eq!(mask.get_pixel(3, 1).0[0], 255);
        assert_eq!(mask.get_pixel(0, 2).0[0], 0);
        assert_eq!(mask.get_pixel(3, 3).0[0], 0);
    }
}
