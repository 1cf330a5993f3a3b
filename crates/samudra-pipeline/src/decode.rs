//! Image decoding and channel normalization.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the
//! 8-bit RGB buffer every downstream stage expects. Grayscale sources
//! are expanded to three equal channels, alpha is dropped, and wide
//! (16-bit or float) samples are narrowed to 8 bits.

use image::{DynamicImage, RgbImage};

use crate::types::PipelineError;

/// Decode raw image bytes into a [`DynamicImage`].
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Normalize a decoded image to 8-bit RGB.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyImage`] if either dimension is zero.
/// Returns [`PipelineError::UnsupportedColor`] for color layouts added
/// to `image` that have no defined mapping onto RGB.
pub fn normalize(image: &DynamicImage) -> Result<RgbImage, PipelineError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyImage { width, height });
    }

    match image {
        DynamicImage::ImageRgb8(rgb) => Ok(rgb.clone()),
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_)
        | DynamicImage::ImageRgb32F(_)
        | DynamicImage::ImageRgba32F(_) => Ok(image.to_rgb8()),
        other => Err(PipelineError::UnsupportedColor(format!(
            "{:?}",
            other.color()
        ))),
    }
}

/// Decode raw bytes and normalize to 8-bit RGB in one step.
///
/// # Errors
///
/// See [`decode`] and [`normalize`].
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    normalize(&decode(bytes)?)
}
