//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs everything in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use samudra_pipeline::{Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let annotated = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .enhance()
//!     .detect()
//!     .annotate();
//!
//! println!("{} fish", annotated.detections().fish.len());
//! let result = annotated.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline
//! state, carrying all previously computed intermediates. The caller
//! can inspect the current stage's output via accessor methods at any
//! point. Only [`Pending::decode`] can fail; every later transition is
//! total.

use crate::diagnostics::StageMetrics;
use crate::enhance::ChannelGains;
use crate::types::{
    BoundingBox, Detections, Dimensions, PipelineConfig, PipelineError, ProcessResult, RgbImage,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// The source image bytes and config are stored but not yet touched.
/// Call [`decode`](Self::decode) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the config, decode the source image and advance to the
    /// [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config is
    /// unusable, [`PipelineError::EmptyInput`] if the source bytes are
    /// empty, [`PipelineError::ImageDecode`] if the data is corrupt or
    /// in an unsupported format, and [`PipelineError::EmptyImage`] or
    /// [`PipelineError::UnsupportedColor`] if the decoded image cannot
    /// be normalized to RGB.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        self.config.validate()?;
        let original = crate::decode::decode_rgb(&self.source)?;
        Ok(Decoded {
            config: self.config,
            dimensions: Dimensions::of(&original),
            original,
            source_len: self.source.len(),
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding and normalizing to 8-bit RGB.
///
/// Call [`enhance`](Self::enhance) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .enhance() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    original: RgbImage,
    dimensions: Dimensions,
    source_len: usize,
}

impl Decoded {
    /// The decoded RGB image.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Image dimensions, fixed for the rest of the pipeline.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Advance to the enhancement stage.
    pub fn enhance(self) -> Enhanced {
        let (enhanced, gains) = crate::enhance::enhance_with_gains(&self.original, &self.config);
        Enhanced {
            config: self.config,
            original: self.original,
            enhanced,
            gains,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 2: Enhanced ─────────────────────────

/// Pipeline state after CLAHE, white balance and sharpening.
///
/// Call [`detect`](Self::detect) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .detect() to continue"]
pub struct Enhanced {
    config: PipelineConfig,
    original: RgbImage,
    enhanced: RgbImage,
    gains: ChannelGains,
    dimensions: Dimensions,
}

impl Enhanced {
    /// The enhanced image.
    #[must_use]
    pub const fn enhanced(&self) -> &RgbImage {
        &self.enhanced
    }

    /// White-balance gains applied during enhancement.
    #[must_use]
    pub const fn gains(&self) -> ChannelGains {
        self.gains
    }

    /// Advance to the detection stage.
    ///
    /// Runs the fish detector, then the coral detector, on the enhanced
    /// image. The two are independent; neither sees the other's output.
    pub fn detect(self) -> Detected {
        let (fish, fish_level) = crate::fish::detect_fish_with_level(&self.enhanced, &self.config);
        let (coral, coral_pixels) =
            crate::coral::detect_coral_with_coverage(&self.enhanced, &self.config);
        Detected {
            config: self.config,
            original: self.original,
            enhanced: self.enhanced,
            detections: Detections { fish, coral },
            fish_level,
            coral_pixels,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 3: Detected ─────────────────────────

/// Pipeline state after fish and coral detection.
///
/// Call [`annotate`](Self::annotate) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing; call .annotate() to continue"]
pub struct Detected {
    config: PipelineConfig,
    original: RgbImage,
    enhanced: RgbImage,
    detections: Detections,
    fish_level: Option<u8>,
    coral_pixels: u64,
    dimensions: Dimensions,
}

impl Detected {
    /// Boxes found by both detectors.
    #[must_use]
    pub const fn detections(&self) -> &Detections {
        &self.detections
    }

    /// Fish boxes.
    #[must_use]
    pub fn fish(&self) -> &[BoundingBox] {
        &self.detections.fish
    }

    /// Coral boxes.
    #[must_use]
    pub fn coral(&self) -> &[BoundingBox] {
        &self.detections.coral
    }

    /// Otsu level used by the fish detector, `None` if the image gave
    /// it nothing to separate.
    #[must_use]
    pub const fn fish_threshold(&self) -> Option<u8> {
        self.fish_level
    }

    /// Foreground pixels left in the opened coral mask.
    #[must_use]
    pub const fn coral_pixels(&self) -> u64 {
        self.coral_pixels
    }

    /// Advance to the annotation stage.
    pub fn annotate(self) -> Annotated {
        let annotated = crate::annotate::annotate(
            &self.enhanced,
            &self.detections.fish,
            &self.detections.coral,
            &self.config,
        );
        Annotated {
            config: self.config,
            original: self.original,
            enhanced: self.enhanced,
            annotated,
            detections: self.detections,
            dimensions: self.dimensions,
        }
    }
}

// ───────────────────────── Stage 4: Annotated ────────────────────────

/// Final pipeline state: every output is available.
///
/// Call [`into_result`](Self::into_result) to take ownership of the
/// [`ProcessResult`].
#[must_use = "call .into_result() to take the outputs"]
pub struct Annotated {
    config: PipelineConfig,
    original: RgbImage,
    enhanced: RgbImage,
    annotated: RgbImage,
    detections: Detections,
    dimensions: Dimensions,
}

impl Annotated {
    /// The enhanced image with boxes drawn on it.
    #[must_use]
    pub const fn annotated(&self) -> &RgbImage {
        &self.annotated
    }

    /// Boxes found by both detectors.
    #[must_use]
    pub const fn detections(&self) -> &Detections {
        &self.detections
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Consume the pipeline and return all outputs.
    #[must_use]
    pub fn into_result(self) -> ProcessResult {
        ProcessResult {
            original: self.original,
            enhanced: self.enhanced,
            annotated: self.annotated,
            detections: self.detections,
            dimensions: self.dimensions,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 5;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// Source image bytes (not yet decoded).
    Source {
        /// The raw image bytes.
        bytes: &'a [u8],
    },
    /// Decoded RGB image.
    Decoded {
        /// The original image.
        original: &'a RgbImage,
    },
    /// Enhancement result.
    Enhanced {
        /// The enhanced image.
        enhanced: &'a RgbImage,
    },
    /// Detection result.
    Detected {
        /// Boxes for both classes.
        detections: &'a Detections,
    },
    /// Annotation result.
    Annotated {
        /// The annotated image.
        annotated: &'a RgbImage,
        /// Image dimensions.
        dimensions: Dimensions,
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Both the typed API (individual stage structs) and the dynamic API
/// ([`Stage`] enum) are available. This trait bridges the two.
pub trait PipelineStage: Sized {
    /// Human-readable name of this stage (e.g. `"source"`, `"enhance"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `4` for
    /// Annotated).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// Returns `None` for the initial [`Pending`] stage which has not
    /// yet performed any processing.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success, `Ok(None)` if already at
    /// the final stage, or `Err` if the stage transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when decoding fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages to completion and return the final
    /// [`ProcessResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if decoding has not happened yet and
    /// fails.
    fn complete(self) -> Result<ProcessResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            bytes: &self.source,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Decoded(self.decode()?)))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.decode()?.complete()
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Decoded {
            original: &self.original,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Decode {
            input_bytes: self.source_len,
            width: self.dimensions.width,
            height: self.dimensions.height,
            pixel_count: self.dimensions.pixel_count(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Enhanced(self.enhance())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.enhance().complete()
    }
}

impl PipelineStage for Enhanced {
    const NAME: &str = "enhance";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Enhanced {
            enhanced: &self.enhanced,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Enhance {
            clip_limit: self.config.clahe_clip_limit,
            tile_grid: self.config.clahe_tile_grid,
            gains: self.gains.rgb,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Detected(self.detect())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.detect().complete()
    }
}

impl PipelineStage for Detected {
    const NAME: &str = "detect";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Detected {
            detections: &self.detections,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Detect {
            fish_threshold: self.fish_level,
            fish_count: self.detections.fish.len(),
            coral_pixels: self.coral_pixels,
            coral_count: self.detections.coral.len(),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Annotated(self.annotate())))
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        self.annotate().complete()
    }
}

impl PipelineStage for Annotated {
    const NAME: &str = "annotate";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Annotated {
            annotated: &self.annotated,
            dimensions: self.dimensions,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Annotate {
            box_count: self.detections.fish.len() + self.detections.coral.len(),
            thickness: self.config.box_thickness,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<ProcessResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// ```rust
/// # use samudra_pipeline::{Pipeline, PipelineConfig, PipelineError};
/// # use samudra_pipeline::pipeline::{Stage, Advance};
/// # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(png, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Decoded`].
    Decoded(Decoded),
    /// See [`Enhanced`].
    Enhanced(Enhanced),
    /// See [`Detected`].
    Detected(Detected),
    /// See [`Annotated`].
    Annotated(Annotated),
}

/// Compile-time guard: if a [`Stage`] variant is added, this match becomes
/// non-exhaustive and the build fails, reminding you to bump [`STAGE_COUNT`].
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Decoded(_)
        | Stage::Enhanced(_)
        | Stage::Detected(_)
        | Stage::Annotated(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage; returned unchanged.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Decoded(s) => s.$method($($arg),*),
            Self::Enhanced(s) => s.$method($($arg),*),
            Self::Detected(s) => s.$method($($arg),*),
            Self::Annotated(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Human-readable name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics (`None` for `Pending`).
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Annotated(_))
    }

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(next_stage))` on success, `Ok(None)` if
    /// already complete (the `Annotated` value is consumed), or `Err`
    /// if the transition fails.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        // The is_complete() guard above ensures next() yields Some.
        #[allow(clippy::unreachable)]
        let next = self
            .next()?
            .unwrap_or_else(|| unreachable!("non-complete stage returned None from next()"));
        Ok(Advance::Next(next))
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<ProcessResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Lets the macro call `.name()` and `.index()` on `&self`; associated
// constants aren't reachable as `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

impl From<Pending> for Stage {
    fn from(s: Pending) -> Self {
        Self::Pending(s)
    }
}

impl From<Decoded> for Stage {
    fn from(s: Decoded) -> Self {
        Self::Decoded(s)
    }
}

impl From<Enhanced> for Stage {
    fn from(s: Enhanced) -> Self {
        Self::Enhanced(s)
    }
}

impl From<Detected> for Stage {
    fn from(s: Detected) -> Self {
        Self::Detected(s)
    }
}

impl From<Annotated> for Stage {
    fn from(s: Annotated) -> Self {
        Self::Annotated(s)
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental image processing pipeline.
///
/// Created via [`Pipeline::new`], which stores the source image and
/// config without doing any processing. Each stage method consumes the
/// current state and returns the next, making it a compile-time error
/// to skip stages or call them out of order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from source image bytes and config.
    ///
    /// No processing is performed. The config is validated when
    /// [`.decode()`](Pending::decode) runs.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }
}
