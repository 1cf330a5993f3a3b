//! Fish detection by global intensity thresholding.
//!
//! Fish in clear water tend to stand out from the background as
//! compact regions brighter than their surroundings. The detector
//! converts to grayscale, smooths with a small Gaussian, splits the
//! histogram with Otsu's method, and keeps the external contours whose
//! enclosed area lies strictly inside `(fish_min_area, fish_max_area)`.
//! The band rejects both noise and background-sized regions.

use image::RgbImage;

use crate::blur::gaussian_blur_kernel;
use crate::color::grayscale;
use crate::contour::boxes_with_area;
use crate::mask::otsu_mask;
use crate::types::{BoundingBox, GrayImage, PipelineConfig};

/// Threshold the smoothed grayscale image. Returns the mask and the
/// Otsu level (`None` when the smoothed image is a single intensity).
#[must_use = "returns the fish mask"]
pub fn fish_mask(image: &RgbImage, config: &PipelineConfig) -> (GrayImage, Option<u8>) {
    let gray = grayscale(image);
    let blurred = gaussian_blur_kernel(&gray, config.fish_blur_kernel);
    otsu_mask(&blurred)
}

/// Detect likely fish regions in an (enhanced) RGB image.
///
/// Returns one box per external contour of [`fish_mask`] whose
/// contour area lies strictly between `config.fish_min_area` and
/// `config.fish_max_area`, in contour-scan order.
#[must_use = "returns the fish boxes"]
pub fn detect_fish(image: &RgbImage, config: &PipelineConfig) -> Vec<BoundingBox> {
    detect_fish_with_level(image, config).0
}

/// Like [`detect_fish`], also returning the Otsu level the mask was
/// cut at.
#[must_use = "returns the fish boxes"]
pub fn detect_fish_with_level(
    image: &RgbImage,
    config: &PipelineConfig,
) -> (Vec<BoundingBox>, Option<u8>) {
    let (mask, level) = fish_mask(image, config);
    let (min_area, max_area) = (config.fish_min_area, config.fish_max_area);
    let boxes = boxes_with_area(&mask, |area| area > min_area && area < max_area);
    tracing::debug!(?level, count = boxes.len(), "fish regions");
    (boxes, level)
}
