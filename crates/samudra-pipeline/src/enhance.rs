//! Underwater color and contrast correction.
//!
//! Water absorbs red light first and scatters the rest, so raw
//! underwater photographs are low-contrast and tinted blue-green.
//! [`enhance`] runs a fixed sequence:
//!
//! 1. CLAHE on the Lab lightness channel (chroma untouched).
//! 2. White balance anchored on the brightest pixels.
//! 3. A 3x3 sharpening convolution.
//!
//! Equalization runs before white balance so the highlight estimate
//! sees corrected lightness; sharpening runs last so nothing smooths
//! it away.

use image::RgbImage;
use imageproc::filter::filter_clamped;
use imageproc::kernel::Kernel;

use crate::clahe::clahe;
use crate::color::{lab_to_rgb, luma, rgb_to_lab};
use crate::types::PipelineConfig;

/// 3x3 sharpening kernel, row-major: center 5, four-neighbours -1,
/// corners 0. Weights sum to 1, so flat regions are unchanged.
pub const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// Per-channel gains estimated by [`white_balance_gains`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelGains {
    /// Red, green and blue multipliers.
    pub rgb: [f64; 3],
}

/// Run the full enhancement sequence. Output dimensions match the
/// input.
#[must_use = "returns the enhanced image"]
pub fn enhance(image: &RgbImage, config: &PipelineConfig) -> RgbImage {
    enhance_with_gains(image, config).0
}

/// Like [`enhance`], also returning the white-balance gains that were
/// applied.
#[must_use = "returns the enhanced image"]
pub fn enhance_with_gains(image: &RgbImage, config: &PipelineConfig) -> (RgbImage, ChannelGains) {
    let equalized = equalize_lightness(image, config.clahe_clip_limit, config.clahe_tile_grid);
    let gains = white_balance_gains(
        &equalized,
        config.white_balance_fraction,
        config.white_balance_max_gain,
    );
    tracing::debug!(gains = ?gains.rgb, "white balance gains");
    let balanced = apply_gains(&equalized, gains);
    (sharpen(&balanced), gains)
}

/// CLAHE on the Lab lightness channel; `a` and `b` pass through.
#[must_use = "returns the equalized image"]
pub fn equalize_lightness(image: &RgbImage, clip_limit: f32, tile_grid: u32) -> RgbImage {
    let mut lab = rgb_to_lab(image);
    lab.l = clahe(&lab.l, clip_limit, tile_grid);
    lab_to_rgb(&lab)
}

/// Estimate white-balance gains from the brightest pixels.
///
/// The brightest `fraction` of pixels by luma is selected (all pixels
/// tied at the cut-off level are included). Each channel gain brings
/// that channel's highlight mean to the mean of all three, so the
/// highlights become neutral gray at roughly their original
/// brightness. Gains are clamped to `[1 / max_gain, max_gain]`; a
/// channel that is essentially absent from the highlights keeps gain
/// 1.0.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn white_balance_gains(image: &RgbImage, fraction: f64, max_gain: f64) -> ChannelGains {
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return ChannelGains { rgb: [1.0; 3] };
    }

    let mut hist = [0u64; 256];
    for px in image.pixels() {
        hist[usize::from(luma(px.0))] += 1;
    }

    let wanted = ((total as f64 * fraction).ceil() as u64).clamp(1, total);
    let mut cutoff = 0u8;
    let mut selected = 0u64;
    for level in (0..=255u8).rev() {
        selected += hist[usize::from(level)];
        if selected >= wanted {
            cutoff = level;
            break;
        }
    }

    let mut sums = [0u64; 3];
    let mut count = 0u64;
    for px in image.pixels().filter(|px| luma(px.0) >= cutoff) {
        for (sum, &v) in sums.iter_mut().zip(&px.0) {
            *sum += u64::from(v);
        }
        count += 1;
    }

    let means = sums.map(|s| s as f64 / count as f64);
    let gray = means.iter().sum::<f64>() / 3.0;
    let max_gain = max_gain.max(1.0);
    let rgb = means.map(|m| {
        if m < 1.0 {
            1.0
        } else {
            (gray / m).clamp(1.0 / max_gain, max_gain)
        }
    });
    ChannelGains { rgb }
}

/// Multiply each channel by its gain, rounding and saturating.
#[must_use = "returns the balanced image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn apply_gains(image: &RgbImage, gains: ChannelGains) -> RgbImage {
    let luts: [[u8; 256]; 3] = std::array::from_fn(|c| {
        std::array::from_fn(|v| (v as f64 * gains.rgb[c]).round().clamp(0.0, 255.0) as u8)
    });

    let mut out = image.clone();
    for px in out.pixels_mut() {
        for (c, v) in px.0.iter_mut().enumerate() {
            *v = luts[c][usize::from(*v)];
        }
    }
    out
}

/// Apply [`SHARPEN_KERNEL`] to every channel, saturating to `0..=255`.
/// Samples past the border repeat the edge pixel.
#[must_use = "returns the sharpened image"]
pub fn sharpen(image: &RgbImage) -> RgbImage {
    filter_clamped::<_, i32, u8>(image, Kernel::new(&SHARPEN_KERNEL, 3, 3))
}
