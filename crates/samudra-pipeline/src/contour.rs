//! Contour extraction: outer boundaries of connected mask regions.
//!
//! Both detectors end the same way: trace the borders of a binary
//! mask, keep only the outermost ones, measure the area each encloses,
//! and report the bounding box of those whose area passes a filter.
//!
//! Area is the polygon area of the traced border (pixel centers as
//! vertices), not the area of the bounding box. For non-rectangular
//! shapes the box can be much larger than the region it outlines, so
//! the filters deliberately look at the contour.

use geo::{Area, LineString, Polygon};
use image::GrayImage;
use imageproc::contours::{BorderType, Contour};

use crate::types::BoundingBox;

/// An outer border together with its measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Border pixels in tracing order.
    pub points: Vec<imageproc::point::Point<u32>>,
    /// Polygon area enclosed by the border, in square pixels.
    pub area: f64,
    /// Inclusive bounding box of the border.
    pub bbox: BoundingBox,
}

/// Trace the external contours of a binary mask.
///
/// Only top-level outer borders are returned: holes, and regions
/// nested inside holes, are ignored. Order follows the raster scan
/// that discovers each border.
#[must_use = "returns the external contours"]
pub fn external_contours(mask: &GrayImage) -> Vec<Contour<u32>> {
    imageproc::contours::find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect()
}

/// Polygon area enclosed by a traced border (shoelace formula).
///
/// Degenerate borders (a single pixel, or a one-pixel-wide line) have
/// zero area.
#[must_use]
pub fn contour_area(points: &[imageproc::point::Point<u32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let ring: LineString<f64> = points
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect::<Vec<_>>()
        .into();
    Polygon::new(ring, vec![]).unsigned_area()
}

/// Measure every external contour of `mask`.
#[must_use = "returns the measured regions"]
pub fn regions(mask: &GrayImage) -> Vec<Region> {
    external_contours(mask)
        .into_iter()
        .filter_map(|c| {
            let bbox = BoundingBox::from_points(&c.points)?;
            let area = contour_area(&c.points);
            Some(Region {
                points: c.points,
                area,
                bbox,
            })
        })
        .collect()
}

/// Bounding boxes of the external contours whose area satisfies
/// `keep`, in scan order.
#[must_use = "returns the filtered bounding boxes"]
pub fn boxes_with_area(mask: &GrayImage, keep: impl Fn(f64) -> bool) -> Vec<BoundingBox> {
    regions(mask)
        .into_iter()
        .filter(|r| keep(r.area))
        .map(|r| r.bbox)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::point::Point;

    fn filled_rect(mask: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
    }

    #[test]
    fn empty_mask_has_no_contours() {
        let mask = GrayImage::new(10, 10);
        assert!(external_contours(&mask).is_empty());
        assert!(boxes_with_area(&mask, |_| true).is_empty());
    }

    #[test]
    fn square_area_uses_pixel_centers() {
        let points = vec![
            Point::new(0, 0),
            Point::new(9, 0),
            Point::new(9, 9),
            Point::new(0, 9),
        ];
        assert!((contour_area(&points) - 81.0).abs() < 1e-9);
        assert!(contour_area(&points[..2]).abs() < 1e-9);
    }

    #[test]
    fn filled_rectangle_yields_one_region() {
        let mut mask = GrayImage::new(40, 30);
        filled_rect(&mut mask, 5, 4, 20, 10);
        let found = regions(&mask);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bbox, BoundingBox::new(5, 4, 20, 10));
        assert!((found[0].area - 19.0 * 9.0).abs() < 1e-9);
    }

    #[test]
    fn holes_and_nested_regions_are_ignored() {
        // Ring with a blob inside its hole.
        let mut mask = GrayImage::new(50, 50);
        filled_rect(&mut mask, 5, 5, 40, 40);
        for y in 10..40 {
            for x in 10..40 {
                mask.put_pixel(x, y, image::Luma([0]));
            }
        }
        filled_rect(&mut mask, 20, 20, 10, 10);

        let found = regions(&mask);
        assert_eq!(found.len(), 1, "only the outer ring border should remain");
        assert_eq!(found[0].bbox, BoundingBox::new(5, 5, 40, 40));
    }

    #[test]
    fn area_filter_uses_contour_area_not_box_area() {
        // A diagonal staircase: its bounding box is large but it
        // encloses almost nothing.
        let mut mask = GrayImage::new(40, 40);
        for i in 0..30 {
            filled_rect(&mut mask, i + 2, i + 2, 2, 2);
        }
        let found = regions(&mask);
        assert_eq!(found.len(), 1);
        assert!(found[0].bbox.width * found[0].bbox.height >= 900);
        assert!(found[0].area < 100.0, "contour area was {}", found[0].area);
        assert!(boxes_with_area(&mask, |a| a > 500.0).is_empty());
    }

    #[test]
    fn separate_blobs_keep_scan_order() {
        let mut mask = GrayImage::new(60, 20);
        filled_rect(&mut mask, 40, 2, 10, 10);
        filled_rect(&mut mask, 5, 8, 10, 10);
        let boxes = boxes_with_area(&mask, |_| true);
        assert_eq!(boxes.len(), 2);
        // Raster scan meets the blob starting on row 2 first.
        assert_eq!(boxes[0], BoundingBox::new(40, 2, 10, 10));
        assert_eq!(boxes[1], BoundingBox::new(5, 8, 10, 10));
    }
}
