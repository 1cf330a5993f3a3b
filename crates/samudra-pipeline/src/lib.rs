//! samudra-pipeline: underwater image enhancement and fish/coral
//! region detection (sans-IO).
//!
//! One photograph goes in; three same-sized RGB images and two sets of
//! bounding boxes come out:
//!
//! ```text
//! bytes -> decode -> enhance -> { fish detector, coral detector } -> annotate
//! ```
//!
//! - **Enhance**: CLAHE on Lab lightness, highlight-anchored white
//!   balance, 3x3 sharpening.
//! - **Coral**: saturated red hue bands, morphological opening,
//!   external contours above an area floor.
//! - **Fish**: grayscale, Gaussian blur, Otsu threshold, external
//!   contours inside an area band.
//! - **Annotate**: fish boxes then coral boxes outlined on a copy of
//!   the enhanced image.
//!
//! Everything is deterministic and classical; there is no learned
//! model. This crate has **no I/O dependencies**: it operates on
//! in-memory byte slices and buffers. Reading files, writing outputs
//! and reading clocks live in the `samudra` binary.

pub mod annotate;
pub mod blur;
pub mod clahe;
pub mod color;
pub mod contour;
pub mod coral;
pub mod decode;
pub mod diagnostics;
pub mod enhance;
pub mod fish;
pub mod mask;
pub mod pipeline;
pub mod types;

pub use pipeline::Pipeline;
pub use types::{
    BoundingBox, Detections, Dimensions, HueBand, PipelineConfig, PipelineError, ProcessResult,
};

/// Run the full pipeline on encoded image bytes.
///
/// Accepts PNG, JPEG, BMP and WebP. The decoded image is normalized to
/// 8-bit RGB (gray expanded, alpha dropped, deeper samples scaled)
/// before any processing.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`PipelineConfig::validate`], [`PipelineError::EmptyInput`] if
/// `image_bytes` is empty, [`PipelineError::ImageDecode`] if the bytes
/// cannot be decoded, and [`PipelineError::EmptyImage`] or
/// [`PipelineError::UnsupportedColor`] if the decoded image cannot be
/// normalized. Nothing after decoding can fail.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<ProcessResult, PipelineError> {
    config.validate()?;
    let original = decode::decode_rgb(image_bytes)?;
    Ok(process_image(original, config))
}

/// Run enhancement, both detectors and annotation on an already
/// decoded RGB image.
///
/// Total for any buffer and any config; invalid config values degrade
/// (e.g. a zero tile grid acts as one tile) rather than fail. Use
/// [`process`] to have the config checked first.
#[must_use = "returns the pipeline outputs"]
pub fn process_image(original: types::RgbImage, config: &PipelineConfig) -> ProcessResult {
    let dimensions = Dimensions::of(&original);
    let span = tracing::debug_span!("process", width = dimensions.width, height = dimensions.height);
    let _guard = span.enter();

    let enhanced = enhance::enhance(&original, config);
    let fish = fish::detect_fish(&enhanced, config);
    let coral = coral::detect_coral(&enhanced, config);
    let annotated = annotate::annotate(&enhanced, &fish, &coral, config);

    ProcessResult {
        original,
        enhanced,
        annotated,
        detections: Detections { fish, coral },
        dimensions,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    /// 400x300 blue water, red disk (r = 40) at (100, 100), mid-gray
    /// 30x20 blob centred at (300, 250).
    fn reef_scene() -> RgbImage {
        RgbImage::from_fn(400, 300, |x, y| {
            let (dx, dy) = (f64::from(x) - 100.0, f64::from(y) - 100.0);
            if dx.hypot(dy) <= 40.0 {
                Rgb([255, 0, 0])
            } else if (285..315).contains(&x) && (240..260).contains(&y) {
                Rgb([128, 128, 128])
            } else {
                Rgb([0, 0, 255])
            }
        })
    }

    fn near(b: BoundingBox, (cx, cy): (f64, f64), tolerance: f64) -> bool {
        let (bx, by) = b.center();
        (bx - cx).abs() <= tolerance && (by - cy).abs() <= tolerance
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn process_validates_config_first() {
        let config = PipelineConfig {
            clahe_tile_grid: 0,
            ..PipelineConfig::default()
        };
        let result = process(&png(&reef_scene()), &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn process_rejects_oversized_tile_grid_before_enhancing() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"clahe_tile_grid": 70000}"#).unwrap();
        let img = RgbImage::from_pixel(16, 12, Rgb([40, 90, 120]));
        let result = process(&png(&img), &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn reef_scene_finds_disk_and_blob() {
        let result = process(&png(&reef_scene()), &PipelineConfig::default()).unwrap();

        assert!(result.coral_count() >= 1, "{:?}", result.detections);
        let disk = result
            .detections
            .coral
            .iter()
            .find(|b| near(**b, (100.0, 100.0), 6.0))
            .copied();
        assert!(disk.is_some(), "no coral box near the disk: {:?}", result.detections);
        let disk = disk.unwrap();
        assert!(disk.x.abs_diff(60) <= 6 && disk.y.abs_diff(60) <= 6, "{disk:?}");
        assert!(disk.right().abs_diff(141) <= 6 && disk.bottom().abs_diff(141) <= 6, "{disk:?}");

        assert!(result.fish_count() >= 1, "{:?}", result.detections);
        assert!(
            result
                .detections
                .fish
                .iter()
                .any(|b| near(*b, (300.0, 250.0), 4.0)),
            "no fish box near the blob: {:?}",
            result.detections
        );
    }

    #[test]
    fn uniform_gray_yields_no_detections() {
        let img = RgbImage::from_pixel(120, 90, Rgb([128, 128, 128]));
        let result = process(&png(&img), &PipelineConfig::default()).unwrap();
        assert_eq!(result.fish_count(), 0);
        assert_eq!(result.coral_count(), 0);
        assert_eq!(result.annotated, result.enhanced);
    }

    #[test]
    fn solid_red_is_one_frame_sized_coral() {
        let img = RgbImage::from_pixel(64, 48, Rgb([255, 0, 0]));
        let result = process(&png(&img), &PipelineConfig::default()).unwrap();
        assert_eq!(result.detections.coral, vec![BoundingBox::new(0, 0, 64, 48)]);
    }

    #[test]
    fn solid_green_and_blue_have_no_coral() {
        for color in [Rgb([0, 255, 0]), Rgb([0, 0, 255])] {
            let img = RgbImage::from_pixel(64, 48, color);
            let result = process(&png(&img), &PipelineConfig::default()).unwrap();
            assert_eq!(result.coral_count(), 0, "{color:?}");
        }
    }

    #[test]
    fn dimensions_are_preserved() {
        let result = process(&png(&reef_scene()), &PipelineConfig::default()).unwrap();
        assert_eq!(result.dimensions, Dimensions { width: 400, height: 300 });
        assert_eq!(result.original.dimensions(), (400, 300));
        assert_eq!(result.enhanced.dimensions(), (400, 300));
        assert_eq!(result.annotated.dimensions(), (400, 300));
    }

    #[test]
    fn process_is_deterministic() {
        let bytes = png(&reef_scene());
        let config = PipelineConfig::default();
        let first = process(&bytes, &config).unwrap();
        let second = process(&bytes, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn process_image_matches_process() {
        let scene = reef_scene();
        let config = PipelineConfig::default();
        let from_bytes = process(&png(&scene), &config).unwrap();
        assert_eq!(process_image(scene, &config), from_bytes);
    }

    #[test]
    fn result_round_trips_through_json() {
        let img = RgbImage::from_pixel(8, 6, Rgb([40, 90, 120]));
        let result = process(&png(&img), &PipelineConfig::default()).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: ProcessResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
