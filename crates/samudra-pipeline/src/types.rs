//! Shared types for the samudra image processing pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data (masks, grayscale) without depending on
/// `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage`, the pixel buffer every stage consumes and
/// produces.
pub use image::RgbImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an existing image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// An axis-aligned rectangle in pixel coordinates, origin at top-left.
///
/// Boxes produced by the detectors always satisfy `width > 0`,
/// `height > 0`, `x + width <= image width` and
/// `y + height <= image height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge (pixels from left).
    pub x: u32,
    /// Top edge (pixels from top).
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl BoundingBox {
    /// Create a new bounding box.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box enclosing every point, with inclusive pixel extent
    /// (a single point yields a 1x1 box).
    ///
    /// Returns `None` for an empty point set.
    #[must_use]
    pub fn from_points(points: &[imageproc::point::Point<u32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }

    /// Exclusive right edge (`x + width`).
    #[must_use]
    pub const fn right(self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge (`y + height`).
    #[must_use]
    pub const fn bottom(self) -> u32 {
        self.y + self.height
    }

    /// Center of the box in (fractional) pixel coordinates.
    #[must_use]
    pub fn center(self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.width) / 2.0,
            f64::from(self.y) + f64::from(self.height) / 2.0,
        )
    }

    /// Whether the box lies entirely within an image of `dimensions`.
    #[must_use]
    pub const fn fits_within(self, dimensions: Dimensions) -> bool {
        self.width > 0
            && self.height > 0
            && self.right() <= dimensions.width
            && self.bottom() <= dimensions.height
    }
}

/// Bounding boxes for both object classes, in contour-scan order.
///
/// Ordering carries no ranking: boxes are neither sorted by size nor
/// by any confidence measure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detections {
    /// Likely fish regions.
    pub fish: Vec<BoundingBox>,
    /// Likely coral regions.
    pub coral: Vec<BoundingBox>,
}

/// An inclusive hue interval on the 8-bit hue scale (`0..180`, two
/// degrees per step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HueBand {
    /// Lowest accepted hue.
    pub min: u8,
    /// Highest accepted hue.
    pub max: u8,
}

impl HueBand {
    /// Create a new hue band.
    #[must_use]
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Whether `hue` lies in the band (inclusive on both ends).
    #[must_use]
    pub const fn contains(self, hue: u8) -> bool {
        hue >= self.min && hue <= self.max
    }
}

/// Tuning constants for every pipeline stage.
///
/// Defaults reproduce the fixed heuristics the pipeline was designed
/// around. Use [`validate`](Self::validate) before running a
/// hand-built config; [`crate::process`] does this for you.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CLAHE contrast limit, relative to a flat histogram.
    pub clahe_clip_limit: f32,

    /// CLAHE tile count along each axis.
    pub clahe_tile_grid: u32,

    /// Fraction of pixels (brightest by luma) used to estimate the
    /// white-balance gains.
    pub white_balance_fraction: f64,

    /// Upper bound on any white-balance channel gain. The lower bound
    /// is its reciprocal.
    pub white_balance_max_gain: f64,

    /// Low red hue band for coral segmentation.
    pub coral_hue_low: HueBand,

    /// High (wrapped) red hue band for coral segmentation.
    pub coral_hue_high: HueBand,

    /// Minimum HSV saturation for a coral pixel.
    pub coral_min_saturation: u8,

    /// Minimum HSV value for a coral pixel.
    pub coral_min_value: u8,

    /// Side length of the square structuring element used to open the
    /// coral mask. Must be odd.
    pub coral_opening_kernel: u32,

    /// Number of erosions (then the same number of dilations) in the
    /// coral mask opening.
    pub coral_opening_iterations: u32,

    /// Coral contours must enclose strictly more than this area (px²).
    pub coral_min_area: f64,

    /// Gaussian kernel size for the fish detector. Must be odd. Sigma
    /// is derived from it.
    pub fish_blur_kernel: u32,

    /// Fish contours must enclose strictly more than this area (px²).
    pub fish_min_area: f64,

    /// Fish contours must enclose strictly less than this area (px²).
    pub fish_max_area: f64,

    /// Outline thickness for annotation rectangles, in pixels.
    pub box_thickness: u32,
}

impl PipelineConfig {
    /// Default CLAHE clip limit.
    pub const DEFAULT_CLAHE_CLIP_LIMIT: f32 = 2.0;
    /// Default CLAHE tile grid (8x8 tiles).
    pub const DEFAULT_CLAHE_TILE_GRID: u32 = 8;
    /// Default highlight fraction for white balance.
    pub const DEFAULT_WHITE_BALANCE_FRACTION: f64 = 0.02;
    /// Default maximum white-balance gain. Kept low so a highlight set
    /// dominated by one saturated color cannot swing its hue.
    pub const DEFAULT_WHITE_BALANCE_MAX_GAIN: f64 = 2.0;
    /// Default low red band.
    pub const DEFAULT_CORAL_HUE_LOW: HueBand = HueBand::new(0, 10);
    /// Default high red band.
    pub const DEFAULT_CORAL_HUE_HIGH: HueBand = HueBand::new(160, 179);
    /// Default minimum saturation for coral pixels.
    pub const DEFAULT_CORAL_MIN_SATURATION: u8 = 50;
    /// Default minimum value for coral pixels.
    pub const DEFAULT_CORAL_MIN_VALUE: u8 = 50;
    /// Default opening structuring element size.
    pub const DEFAULT_CORAL_OPENING_KERNEL: u32 = 5;
    /// Default opening iteration count.
    pub const DEFAULT_CORAL_OPENING_ITERATIONS: u32 = 2;
    /// Default minimum coral contour area.
    pub const DEFAULT_CORAL_MIN_AREA: f64 = 800.0;
    /// Default fish blur kernel size.
    pub const DEFAULT_FISH_BLUR_KERNEL: u32 = 5;
    /// Default lower bound of the fish area band.
    pub const DEFAULT_FISH_MIN_AREA: f64 = 500.0;
    /// Default upper bound of the fish area band.
    pub const DEFAULT_FISH_MAX_AREA: f64 = 50_000.0;
    /// Default outline thickness.
    pub const DEFAULT_BOX_THICKNESS: u32 = 2;

    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(self.clahe_clip_limit.is_finite() && self.clahe_clip_limit > 0.0) {
            return invalid(format!(
                "clahe_clip_limit must be positive, got {}",
                self.clahe_clip_limit
            ));
        }
        if !(1..=crate::clahe::MAX_TILE_GRID).contains(&self.clahe_tile_grid) {
            return invalid(format!(
                "clahe_tile_grid must be in 1..={}, got {}",
                crate::clahe::MAX_TILE_GRID,
                self.clahe_tile_grid
            ));
        }
        if !(self.white_balance_fraction > 0.0 && self.white_balance_fraction <= 1.0) {
            return invalid(format!(
                "white_balance_fraction must be in (0, 1], got {}",
                self.white_balance_fraction
            ));
        }
        if !(self.white_balance_max_gain.is_finite() && self.white_balance_max_gain >= 1.0) {
            return invalid(format!(
                "white_balance_max_gain must be at least 1.0, got {}",
                self.white_balance_max_gain
            ));
        }
        for (name, band) in [
            ("coral_hue_low", self.coral_hue_low),
            ("coral_hue_high", self.coral_hue_high),
        ] {
            if band.min > band.max || band.max >= 180 {
                return invalid(format!(
                    "{name} must satisfy min <= max < 180, got {}..={}",
                    band.min, band.max
                ));
            }
        }
        if self.coral_opening_kernel == 0 || self.coral_opening_kernel % 2 == 0 {
            return invalid(format!(
                "coral_opening_kernel must be odd, got {}",
                self.coral_opening_kernel
            ));
        }
        if self.coral_opening_kernel > 511 {
            return invalid(format!(
                "coral_opening_kernel must be at most 511, got {}",
                self.coral_opening_kernel
            ));
        }
        if self.fish_blur_kernel == 0 || self.fish_blur_kernel % 2 == 0 {
            return invalid(format!(
                "fish_blur_kernel must be odd, got {}",
                self.fish_blur_kernel
            ));
        }
        if self.fish_blur_kernel > 511 {
            return invalid(format!(
                "fish_blur_kernel must be at most 511, got {}",
                self.fish_blur_kernel
            ));
        }
        if !(self.coral_min_area >= 0.0) {
            return invalid(format!(
                "coral_min_area must be non-negative, got {}",
                self.coral_min_area
            ));
        }
        if !(self.fish_min_area >= 0.0 && self.fish_min_area < self.fish_max_area) {
            return invalid(format!(
                "fish area band must satisfy 0 <= min < max, got {}..{}",
                self.fish_min_area, self.fish_max_area
            ));
        }
        if self.box_thickness == 0 {
            return invalid("box_thickness must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: Self::DEFAULT_CLAHE_CLIP_LIMIT,
            clahe_tile_grid: Self::DEFAULT_CLAHE_TILE_GRID,
            white_balance_fraction: Self::DEFAULT_WHITE_BALANCE_FRACTION,
            white_balance_max_gain: Self::DEFAULT_WHITE_BALANCE_MAX_GAIN,
            coral_hue_low: Self::DEFAULT_CORAL_HUE_LOW,
            coral_hue_high: Self::DEFAULT_CORAL_HUE_HIGH,
            coral_min_saturation: Self::DEFAULT_CORAL_MIN_SATURATION,
            coral_min_value: Self::DEFAULT_CORAL_MIN_VALUE,
            coral_opening_kernel: Self::DEFAULT_CORAL_OPENING_KERNEL,
            coral_opening_iterations: Self::DEFAULT_CORAL_OPENING_ITERATIONS,
            coral_min_area: Self::DEFAULT_CORAL_MIN_AREA,
            fish_blur_kernel: Self::DEFAULT_FISH_BLUR_KERNEL,
            fish_min_area: Self::DEFAULT_FISH_MIN_AREA,
            fish_max_area: Self::DEFAULT_FISH_MAX_AREA,
            box_thickness: Self::DEFAULT_BOX_THICKNESS,
        }
    }
}

/// Result of running the full pipeline on one image.
///
/// All three rasters share the same dimensions.
///
/// Uses custom `Serialize`/`Deserialize` implementations because
/// `RgbImage` (from the `image` crate) does not implement serde traits.
/// Raster images are serialized as `(width, height, raw_pixels)` tuples.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    /// The decoded input, normalized to 8-bit RGB.
    pub original: RgbImage,
    /// Color-corrected, contrast-enhanced, sharpened image.
    pub enhanced: RgbImage,
    /// Copy of `enhanced` with fish and coral boxes drawn on it.
    pub annotated: RgbImage,
    /// Detected regions per class.
    pub detections: Detections,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl ProcessResult {
    /// Number of fish boxes.
    #[must_use]
    pub const fn fish_count(&self) -> usize {
        self.detections.fish.len()
    }

    /// Number of coral boxes.
    #[must_use]
    pub const fn coral_count(&self) -> usize {
        self.detections.coral.len()
    }
}

/// Serde-compatible proxy for `ProcessResult`.
#[derive(Serialize, Deserialize)]
struct ProcessResultProxy {
    original: (u32, u32, Vec<u8>),
    enhanced: (u32, u32, Vec<u8>),
    annotated: (u32, u32, Vec<u8>),
    detections: Detections,
    dimensions: Dimensions,
}

fn raster(image: &RgbImage) -> (u32, u32, Vec<u8>) {
    (image.width(), image.height(), image.as_raw().clone())
}

impl Serialize for ProcessResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = ProcessResultProxy {
            original: raster(&self.original),
            enhanced: raster(&self.enhanced),
            annotated: raster(&self.annotated),
            detections: self.detections.clone(),
            dimensions: self.dimensions,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProcessResult {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = ProcessResultProxy::deserialize(deserializer)?;

        let unraster = |(w, h, raw): (u32, u32, Vec<u8>), name: &str| {
            RgbImage::from_raw(w, h, raw).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid {name} image dimensions"))
            })
        };

        Ok(Self {
            original: unraster(proxy.original, "original")?,
            enhanced: unraster(proxy.enhanced, "enhanced")?,
            annotated: unraster(proxy.annotated, "annotated")?,
            detections: proxy.detections,
            dimensions: proxy.dimensions,
        })
    }
}

/// Errors that can occur during pipeline processing.
///
/// Only decoding, normalization and configuration can fail. Once a
/// valid RGB buffer exists every stage is total.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image has no pixels.
    #[error("decoded image has zero area ({width}x{height})")]
    EmptyImage {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// The decoded image uses a channel layout that cannot be mapped
    /// onto RGB.
    #[error("unsupported color layout: {0}")]
    UnsupportedColor(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

/// Serde-compatible proxy for `PipelineError`.
///
/// `image::ImageError` does not implement serde, so the `ImageDecode`
/// variant stores its `Display` string instead. A deserialized
/// `ImageDecode` carries the message inside an
/// [`image::error::ImageError::IoError`].
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    ImageDecode(String),
    EmptyInput,
    EmptyImage { width: u32, height: u32 },
    UnsupportedColor(String),
    InvalidConfig(String),
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => PipelineErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
            Self::EmptyImage { width, height } => PipelineErrorProxy::EmptyImage {
                width: *width,
                height: *height,
            },
            Self::UnsupportedColor(s) => PipelineErrorProxy::UnsupportedColor(s.clone()),
            Self::InvalidConfig(s) => PipelineErrorProxy::InvalidConfig(s.clone()),
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::ImageDecode(msg) => Self::ImageDecode(image::ImageError::IoError(
                std::io::Error::other(msg),
            )),
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
            PipelineErrorProxy::EmptyImage { width, height } => Self::EmptyImage { width, height },
            PipelineErrorProxy::UnsupportedColor(s) => Self::UnsupportedColor(s),
            PipelineErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use imageproc::point::Point;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn default_config_matches_documented_constants() {
        let config = PipelineConfig::default();
        assert!((config.clahe_clip_limit - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.clahe_tile_grid, 8);
        assert_eq!(config.coral_hue_low, HueBand::new(0, 10));
        assert_eq!(config.coral_hue_high, HueBand::new(160, 179));
        assert_eq!(config.coral_opening_kernel, 5);
        assert_eq!(config.coral_opening_iterations, 2);
        assert_eq!(config.box_thickness, 2);
    }

    #[test]
    fn validate_rejects_even_blur_kernel() {
        let config = PipelineConfig {
            fish_blur_kernel: 4,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref m) if m.contains("fish_blur_kernel")));
    }

    #[test]
    fn validate_rejects_inverted_area_band() {
        let config = PipelineConfig {
            fish_min_area: 1000.0,
            fish_max_area: 10.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_inverted_hue_band() {
        let config = PipelineConfig {
            coral_hue_high: HueBand::new(179, 160),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(ref m)) if m.contains("coral_hue_high")
        ));
    }

    #[test]
    fn validate_rejects_zero_tile_grid_and_thickness() {
        let grid = PipelineConfig {
            clahe_tile_grid: 0,
            ..PipelineConfig::default()
        };
        assert!(grid.validate().is_err());

        let thickness = PipelineConfig {
            box_thickness: 0,
            ..PipelineConfig::default()
        };
        assert!(thickness.validate().is_err());
    }

    #[test]
    fn validate_rejects_huge_tile_grid() {
        let huge: PipelineConfig = serde_json::from_str(r#"{"clahe_tile_grid": 70000}"#).unwrap();
        assert!(matches!(huge.validate(), Err(PipelineError::InvalidConfig(_))));

        let largest = PipelineConfig {
            clahe_tile_grid: crate::clahe::MAX_TILE_GRID,
            ..PipelineConfig::default()
        };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn validate_rejects_huge_blur_kernel() {
        let config = PipelineConfig {
            fish_blur_kernel: 1_000_001,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nan_clip_limit() {
        let config = PipelineConfig {
            clahe_clip_limit: f32::NAN,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"coral_min_area": 1200.0}"#).unwrap();
        assert!((config.coral_min_area - 1200.0).abs() < f64::EPSILON);
        assert_eq!(config.fish_blur_kernel, PipelineConfig::DEFAULT_FISH_BLUR_KERNEL);
    }

    #[test]
    fn bounding_box_from_points_is_inclusive() {
        let points = vec![Point::new(3, 4), Point::new(7, 4), Point::new(7, 9), Point::new(3, 9)];
        let bbox = BoundingBox::from_points(&points).unwrap();
        assert_eq!(bbox, BoundingBox::new(3, 4, 5, 6));
        assert_eq!(bbox.right(), 8);
        assert_eq!(bbox.bottom(), 10);
    }

    #[test]
    fn bounding_box_single_point_is_one_pixel() {
        let bbox = BoundingBox::from_points(&[Point::new(2, 2)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(2, 2, 1, 1));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn bounding_box_fits_within() {
        let dims = Dimensions {
            width: 10,
            height: 10,
        };
        assert!(BoundingBox::new(0, 0, 10, 10).fits_within(dims));
        assert!(!BoundingBox::new(1, 0, 10, 10).fits_within(dims));
        assert!(!BoundingBox::new(0, 0, 0, 5).fits_within(dims));
    }

    #[test]
    fn hue_band_is_inclusive() {
        let band = HueBand::new(160, 179);
        assert!(band.contains(160));
        assert!(band.contains(179));
        assert!(!band.contains(159));
    }

    #[test]
    fn error_proxy_preserves_message() {
        let err = PipelineError::InvalidConfig("bad".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), err.to_string());
    }
}
