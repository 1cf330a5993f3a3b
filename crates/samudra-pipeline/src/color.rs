//! Color-space conversions on 8-bit pixels.
//!
//! All encodings follow the common 8-bit conventions used by
//! computer-vision toolkits, so thresholds expressed on those scales
//! carry over unchanged:
//!
//! - **L\*a\*b\*** (sRGB, D65 white): `L` scaled from `0..=100` to
//!   `0..=255`, `a` and `b` offset by 128.
//! - **HSV**: hue in `0..180` (two degrees per step), saturation and
//!   value in `0..=255`.
//! - **Luma**: Rec. 601 weights `0.299 R + 0.587 G + 0.114 B`.
//!
//! The colorimetry itself is `palette`'s; this module only maps its
//! floating-point channels onto those 8-bit ranges.

use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::white_point::D65;
use palette::{FromColor, Hsv, Lab, Srgb};

/// A Lab image stored as three planar 8-bit channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabImage {
    /// Lightness, `0..=255`.
    pub l: GrayImage,
    /// Green-red axis, offset by 128.
    pub a: GrayImage,
    /// Blue-yellow axis, offset by 128.
    pub b: GrayImage,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn srgb(rgb: [u8; 3]) -> Srgb<f32> {
    Srgb::from(rgb).into_format()
}

/// Convert one 8-bit sRGB pixel to 8-bit Lab.
#[must_use]
pub fn lab_from_rgb(rgb: [u8; 3]) -> [u8; 3] {
    let lab: Lab<D65, f32> = Lab::from_color(srgb(rgb));
    [
        to_u8(lab.l * 255.0 / 100.0),
        to_u8(lab.a + 128.0),
        to_u8(lab.b + 128.0),
    ]
}

/// Convert one 8-bit Lab pixel back to 8-bit sRGB.
///
/// Out-of-gamut colors are clamped per channel.
#[must_use]
pub fn rgb_from_lab(lab: [u8; 3]) -> [u8; 3] {
    let lab = Lab::<D65, f32>::new(
        f32::from(lab[0]) * 100.0 / 255.0,
        f32::from(lab[1]) - 128.0,
        f32::from(lab[2]) - 128.0,
    );
    let rgb: Srgb<f32> = Srgb::from_color(lab);
    [
        to_u8(rgb.red * 255.0),
        to_u8(rgb.green * 255.0),
        to_u8(rgb.blue * 255.0),
    ]
}

/// Split an RGB image into planar Lab channels.
#[must_use = "returns the Lab channels"]
pub fn rgb_to_lab(image: &RgbImage) -> LabImage {
    let (w, h) = image.dimensions();
    let mut l = GrayImage::new(w, h);
    let mut a = GrayImage::new(w, h);
    let mut b = GrayImage::new(w, h);
    for (x, y, px) in image.enumerate_pixels() {
        let [lv, av, bv] = lab_from_rgb(px.0);
        l.put_pixel(x, y, Luma([lv]));
        a.put_pixel(x, y, Luma([av]));
        b.put_pixel(x, y, Luma([bv]));
    }
    LabImage { l, a, b }
}

/// Merge planar Lab channels back into an RGB image.
///
/// All three channels must share the same dimensions.
#[must_use = "returns the RGB image"]
pub fn lab_to_rgb(lab: &LabImage) -> RgbImage {
    debug_assert_eq!(lab.l.dimensions(), lab.a.dimensions());
    debug_assert_eq!(lab.l.dimensions(), lab.b.dimensions());

    RgbImage::from_fn(lab.l.width(), lab.l.height(), |x, y| {
        Rgb(rgb_from_lab([
            lab.l.get_pixel(x, y).0[0],
            lab.a.get_pixel(x, y).0[0],
            lab.b.get_pixel(x, y).0[0],
        ]))
    })
}

/// Convert one 8-bit RGB pixel to 8-bit HSV (hue halved onto
/// `0..180`).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn hsv_from_rgb(rgb: [u8; 3]) -> [u8; 3] {
    let hsv: Hsv = Hsv::from_color(srgb(rgb));

    // 359.5 degrees and up round onto 180, which is red again.
    let mut hue = (hsv.hue.into_positive_degrees() / 2.0).round() as u32;
    if hue >= 180 {
        hue -= 180;
    }

    [hue as u8, to_u8(hsv.saturation * 255.0), to_u8(hsv.value * 255.0)]
}

/// Rec. 601 luma of one RGB pixel, rounded to the nearest integer.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn luma(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb.map(u32::from);
    // Max is (299 + 587 + 114) * 255 + 500, well inside u32; the
    // quotient is at most 255.
    ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
}

/// Convert an RGB image to Rec. 601 grayscale.
#[must_use = "returns the grayscale image"]
pub fn grayscale(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([luma(image.get_pixel(x, y).0)])
    })
}
