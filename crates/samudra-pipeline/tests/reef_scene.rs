//! Integration test: run a synthetic reef photograph through the full
//! pipeline and check the outputs against each other.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{Rgb, RgbImage};
use samudra_pipeline::{BoundingBox, PipelineConfig, ProcessResult};

const WIDTH: u32 = 480;
const HEIGHT: u32 = 360;

/// Red coral heads: (center x, center y, radius).
const CORAL: [(f64, f64, f64); 2] = [(90.0, 270.0, 38.0), (380.0, 80.0, 30.0)];

/// Pale fish bodies: (center x, center y, semi-axis x, semi-axis y).
const FISH: [(f64, f64, f64, f64); 3] = [
    (200.0, 110.0, 28.0, 12.0),
    (300.0, 230.0, 22.0, 11.0),
    (150.0, 190.0, 25.0, 13.0),
];

/// Blue-green water darkening with depth, with red coral heads and
/// pale fish.
fn reef() -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let (fx, fy) = (f64::from(x), f64::from(y));
        if CORAL
            .iter()
            .any(|&(cx, cy, r)| (fx - cx).hypot(fy - cy) <= r)
        {
            return Rgb([200, 35, 40]);
        }
        if FISH.iter().any(|&(cx, cy, ax, ay)| {
            let (dx, dy) = ((fx - cx) / ax, (fy - cy) / ay);
            dx * dx + dy * dy <= 1.0
        }) {
            return Rgb([215, 220, 210]);
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let depth = (y * 40 / HEIGHT) as u8;
        Rgb([12, 90 - depth, 120 - depth])
    })
}

fn encode(img: &RgbImage, format: image::ImageFormat) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Whether `(x, y)` lies on or inside the outline drawn for `b`
/// (which spans `x..=x + width`, `y..=y + height`).
fn touched_by(b: BoundingBox, x: u32, y: u32) -> bool {
    x >= b.x && x <= b.right() && y >= b.y && y <= b.bottom()
}

fn run(format: image::ImageFormat) -> ProcessResult {
    let bytes = encode(&reef(), format);
    samudra_pipeline::process(&bytes, &PipelineConfig::default())
        .expect("pipeline should succeed")
}

#[test]
fn reef_scene_boxes_are_valid() {
    let result = run(image::ImageFormat::Png);
    eprintln!(
        "fish {:?}\ncoral {:?}",
        result.detections.fish, result.detections.coral
    );

    assert_eq!(result.dimensions.width, WIDTH);
    assert_eq!(result.dimensions.height, HEIGHT);
    for b in result
        .detections
        .fish
        .iter()
        .chain(&result.detections.coral)
    {
        assert!(b.fits_within(result.dimensions), "{b:?}");
    }
}

#[test]
fn every_coral_head_is_found() {
    let result = run(image::ImageFormat::Png);
    for &(cx, cy, r) in &CORAL {
        let found = result.detections.coral.iter().any(|b| {
            let (bx, by) = b.center();
            (bx - cx).abs() <= r / 4.0 && (by - cy).abs() <= r / 4.0
        });
        assert!(
            found,
            "no coral box near ({cx}, {cy}): {:?}",
            result.detections.coral
        );
    }
}

#[test]
fn fish_boxes_come_from_contours_inside_the_area_band() {
    let config = PipelineConfig::default();
    let result = run(image::ImageFormat::Png);
    assert!(result.fish_count() >= 1, "{:?}", result.detections);

    let (mask, level) = samudra_pipeline::fish::fish_mask(&result.enhanced, &config);
    assert!(level.is_some());

    let in_band: Vec<BoundingBox> = samudra_pipeline::contour::regions(&mask)
        .into_iter()
        .filter(|r| r.area > config.fish_min_area && r.area < config.fish_max_area)
        .map(|r| r.bbox)
        .collect();
    assert_eq!(in_band, result.detections.fish);
}

#[test]
fn annotation_only_touches_box_outlines() {
    let result = run(image::ImageFormat::Png);
    let boxes: Vec<BoundingBox> = result
        .detections
        .fish
        .iter()
        .chain(&result.detections.coral)
        .copied()
        .collect();
    assert!(!boxes.is_empty());

    let mut changed = 0_usize;
    for (x, y, pixel) in result.annotated.enumerate_pixels() {
        if boxes.iter().any(|&b| touched_by(b, x, y)) {
            if pixel != result.enhanced.get_pixel(x, y) {
                changed += 1;
            }
        } else {
            assert_eq!(pixel, result.enhanced.get_pixel(x, y), "({x}, {y})");
        }
    }
    assert!(changed > 0);
}

#[test]
fn jpeg_input_runs_end_to_end() {
    let result = run(image::ImageFormat::Jpeg);
    assert_eq!(result.enhanced.dimensions(), (WIDTH, HEIGHT));
    assert_eq!(result.annotated.dimensions(), (WIDTH, HEIGHT));
    assert!(result.coral_count() >= 1, "{:?}", result.detections);
}

#[test]
fn staged_pipeline_matches_process() {
    let bytes = encode(&reef(), image::ImageFormat::Png);
    let config = PipelineConfig::default();

    let staged = samudra_pipeline::Pipeline::new(bytes.clone(), config.clone())
        .decode()
        .unwrap()
        .enhance()
        .detect()
        .annotate()
        .into_result();

    assert_eq!(staged, samudra_pipeline::process(&bytes, &config).unwrap());
}
