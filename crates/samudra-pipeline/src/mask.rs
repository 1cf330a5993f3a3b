//! Binary segmentation masks.
//!
//! Every mask is a [`GrayImage`] of the same size as its source where
//! 255 marks pixels that pass the segmentation predicate and 0 marks
//! the rest. Masks never leave the detectors; they are consumed by
//! contour extraction.

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;

use crate::color::hsv_from_rgb;
use crate::types::HueBand;

/// Mask value for pixels that pass the predicate.
pub const FOREGROUND: u8 = 255;

/// Select pixels whose HSV hue falls in any of `bands` and whose
/// saturation and value reach the given minimums.
///
/// Hue is circular, so a color such as red that straddles the wrap
/// point is expressed as two bands; the result is their union.
#[must_use = "returns the hue mask"]
pub fn hue_band_mask(
    image: &RgbImage,
    bands: &[HueBand],
    min_saturation: u8,
    min_value: u8,
) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [h, s, v] = hsv_from_rgb(image.get_pixel(x, y).0);
        let hit = s >= min_saturation && v >= min_value && bands.iter().any(|b| b.contains(h));
        Luma([if hit { FOREGROUND } else { 0 }])
    })
}

/// Binarize with an automatically chosen global threshold.
///
/// The level maximizes between-class intensity variance (Otsu);
/// pixels strictly above it become foreground. Returns the mask and
/// the level, or `None` for the level when the image holds a single
/// intensity: there is nothing to separate, so the mask is empty.
#[must_use = "returns the threshold mask"]
pub fn otsu_mask(gray: &GrayImage) -> (GrayImage, Option<u8>) {
    let mut pixels = gray.pixels().map(|p| p.0[0]);
    let Some(first) = pixels.next() else {
        return (gray.clone(), None);
    };
    if pixels.all(|v| v == first) {
        return (GrayImage::new(gray.width(), gray.height()), None);
    }

    let level = imageproc::contrast::otsu_level(gray);
    let mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([if gray.get_pixel(x, y).0[0] > level {
            FOREGROUND
        } else {
            0
        }])
    });
    (mask, Some(level))
}

/// Morphological opening with a square structuring element.
///
/// Erodes `iterations` times, then dilates `iterations` times, each
/// pass using a `kernel_size x kernel_size` square (`kernel_size` odd).
/// Blobs narrower than the combined element vanish; larger blobs keep
/// approximately their shape. Pixels outside the image never erode
/// the foreground.
#[must_use = "returns the opened mask"]
#[allow(clippy::cast_possible_truncation)]
pub fn open(mask: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    // Chebyshev radius of the square; validated configs keep this
    // within u8.
    let radius = (kernel_size / 2).min(u32::from(u8::MAX)) as u8;
    if radius == 0 || iterations == 0 {
        return mask.clone();
    }

    let mut out = mask.clone();
    for _ in 0..iterations {
        out = imageproc::morphology::erode(&out, Norm::LInf, radius);
    }
    for _ in 0..iterations {
        out = imageproc::morphology::dilate(&out, Norm::LInf, radius);
    }
    out
}

/// Number of foreground pixels in a mask.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] == FOREGROUND)).sum()
}
