//! Draw detection boxes onto a copy of the enhanced image.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::types::{BoundingBox, PipelineConfig};

/// Outline color for fish boxes.
pub const FISH_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Outline color for coral boxes.
pub const CORAL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Return a copy of `image` with every fish box and then every coral
/// box outlined, `config.box_thickness` pixels wide. Where outlines
/// overlap, coral wins.
///
/// Each outline runs from `(x, y)` to `(x + width, y + height)`
/// inclusive and thickens inward. Parts falling outside the image are
/// clipped. The input is never modified.
#[must_use = "returns the annotated copy"]
pub fn annotate(
    image: &RgbImage,
    fish: &[BoundingBox],
    coral: &[BoundingBox],
    config: &PipelineConfig,
) -> RgbImage {
    let mut out = image.clone();
    for bbox in fish {
        draw_box(&mut out, *bbox, config.box_thickness, FISH_COLOR);
    }
    for bbox in coral {
        draw_box(&mut out, *bbox, config.box_thickness, CORAL_COLOR);
    }
    out
}

/// Outline one box with `thickness` nested one-pixel rectangles.
pub fn draw_box(image: &mut RgbImage, bbox: BoundingBox, thickness: u32, color: Rgb<u8>) {
    for inset in 0..thickness {
        let (Some(w), Some(h)) = (
            (bbox.width + 1).checked_sub(2 * inset),
            (bbox.height + 1).checked_sub(2 * inset),
        ) else {
            break;
        };
        if w == 0 || h == 0 {
            break;
        }
        let (Ok(x), Ok(y)) = (i32::try_from(bbox.x + inset), i32::try_from(bbox.y + inset)) else {
            break;
        };
        draw_hollow_rect_mut(image, Rect::at(x, y).of_size(w, h), color);
    }
}
