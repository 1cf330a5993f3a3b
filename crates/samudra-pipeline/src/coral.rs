//! Coral detection by red hue segmentation.
//!
//! Many reef corals read as saturated red-to-magenta once the image
//! has been color corrected. The detector selects pixels whose hue
//! falls in either end of the red range (hue wraps at 180), cleans
//! the mask with a morphological opening, and boxes every external
//! contour that encloses more than `coral_min_area` square pixels.

use image::RgbImage;

use crate::contour::boxes_with_area;
use crate::mask::{count_foreground, hue_band_mask, open};
use crate::types::{BoundingBox, GrayImage, PipelineConfig};

/// Segment the red coral mask: hue in either red band, saturation and
/// value at or above the configured minimums, then opened to remove
/// speckle.
#[must_use = "returns the coral mask"]
pub fn coral_mask(image: &RgbImage, config: &PipelineConfig) -> GrayImage {
    let raw = hue_band_mask(
        image,
        &[config.coral_hue_low, config.coral_hue_high],
        config.coral_min_saturation,
        config.coral_min_value,
    );
    open(
        &raw,
        config.coral_opening_kernel,
        config.coral_opening_iterations,
    )
}

/// Detect likely coral regions in an (enhanced) RGB image.
///
/// Returns one box per external contour of [`coral_mask`] whose
/// contour area is strictly greater than `config.coral_min_area`, in
/// contour-scan order.
#[must_use = "returns the coral boxes"]
pub fn detect_coral(image: &RgbImage, config: &PipelineConfig) -> Vec<BoundingBox> {
    detect_coral_with_coverage(image, config).0
}

/// Like [`detect_coral`], also returning how many pixels survived in
/// the opened mask.
#[must_use = "returns the coral boxes"]
pub fn detect_coral_with_coverage(
    image: &RgbImage,
    config: &PipelineConfig,
) -> (Vec<BoundingBox>, u64) {
    let mask = coral_mask(image, config);
    let coverage = count_foreground(&mask);
    let min_area = config.coral_min_area;
    let boxes = boxes_with_area(&mask, |area| area > min_area);
    tracing::debug!(coverage, count = boxes.len(), "coral regions");
    (boxes, coverage)
}
