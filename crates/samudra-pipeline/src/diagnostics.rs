//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! Diagnostics are collected by [`process_with_diagnostics`], which
//! runs exactly the same stages as [`crate::process`] and records how
//! long each took and what it produced. They exist for tuning the
//! heuristics against real footage.
//!
//! The pipeline stays sans-IO: time is read through a caller-supplied
//! [`Clock`], so this crate never touches a platform timer itself.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Detections, Dimensions, PipelineConfig, PipelineError, ProcessResult};

/// Source of monotonic timestamps.
///
/// Native callers implement this over `std::time::Instant`; tests can
/// supply a fake.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Decoding and RGB normalization.
    pub decode: StageDiagnostics,
    /// CLAHE, white balance and sharpening.
    pub enhance: StageDiagnostics,
    /// Fish and coral detectors.
    pub detect: StageDiagnostics,
    /// Box drawing.
    pub annotate: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Enhancement metrics.
    Enhance {
        /// CLAHE clip limit.
        clip_limit: f32,
        /// CLAHE tiles per axis.
        tile_grid: u32,
        /// Red, green and blue white-balance gains.
        gains: [f64; 3],
    },
    /// Metrics from both detectors.
    Detect {
        /// Otsu level used by the fish detector, `None` when the image
        /// had a single intensity.
        fish_threshold: Option<u8>,
        /// Number of fish boxes.
        fish_count: usize,
        /// Foreground pixels left in the opened coral mask.
        coral_pixels: u64,
        /// Number of coral boxes.
        coral_count: usize,
    },
    /// Annotation metrics.
    Annotate {
        /// Boxes drawn (fish plus coral).
        box_count: usize,
        /// Outline thickness in pixels.
        thickness: u32,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of fish boxes.
    pub fish_count: usize,
    /// Number of coral boxes.
    pub coral_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Enhance", &self.enhance),
            ("Detect", &self.detect),
            ("Annotate", &self.annotate),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Fish: {}  |  Coral: {}",
            self.summary.fish_count, self.summary.coral_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    let level = |t: Option<u8>| t.map_or_else(|| "none".to_string(), |t| t.to_string());
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Enhance {
            clip_limit,
            tile_grid,
            gains,
        } => format!(
            "clip={clip_limit:.1} grid={tile_grid}x{tile_grid} gains=({:.2}, {:.2}, {:.2})",
            gains[0], gains[1], gains[2],
        ),
        StageMetrics::Detect {
            fish_threshold,
            fish_count,
            coral_pixels,
            coral_count,
        } => format!(
            "otsu={} fish={fish_count} coral={coral_count} ({coral_pixels} px)",
            level(*fish_threshold)
        ),
        StageMetrics::Annotate {
            box_count,
            thickness,
        } => format!("{box_count} boxes, {thickness}px"),
    }
}

/// Time `f` with `clock`.
fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

/// Run the full pipeline, collecting per-stage diagnostics.
///
/// Produces the same [`ProcessResult`] as [`crate::process`].
///
/// # Errors
///
/// Same as [`crate::process`].
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(ProcessResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let run_start = clock.now();

    let (original, decode_time) = timed(clock, || crate::decode::decode_rgb(image_bytes));
    let original = original?;
    let dimensions = Dimensions::of(&original);

    let ((enhanced, gains), enhance_time) = timed(clock, || {
        crate::enhance::enhance_with_gains(&original, config)
    });

    let ((fish, fish_threshold, coral, coral_pixels), detect_time) = timed(clock, || {
        let (fish, threshold) = crate::fish::detect_fish_with_level(&enhanced, config);
        let (coral, pixels) = crate::coral::detect_coral_with_coverage(&enhanced, config);
        (fish, threshold, coral, pixels)
    });

    let (annotated, annotate_time) = timed(clock, || {
        crate::annotate::annotate(&enhanced, &fish, &coral, config)
    });

    let total_duration = clock.elapsed(&run_start);

    let diagnostics = PipelineDiagnostics {
        decode: StageDiagnostics {
            duration: decode_time,
            metrics: StageMetrics::Decode {
                input_bytes: image_bytes.len(),
                width: dimensions.width,
                height: dimensions.height,
                pixel_count: dimensions.pixel_count(),
            },
        },
        enhance: StageDiagnostics {
            duration: enhance_time,
            metrics: StageMetrics::Enhance {
                clip_limit: config.clahe_clip_limit,
                tile_grid: config.clahe_tile_grid,
                gains: gains.rgb,
            },
        },
        detect: StageDiagnostics {
            duration: detect_time,
            metrics: StageMetrics::Detect {
                fish_threshold,
                fish_count: fish.len(),
                coral_pixels,
                coral_count: coral.len(),
            },
        },
        annotate: StageDiagnostics {
            duration: annotate_time,
            metrics: StageMetrics::Annotate {
                box_count: fish.len() + coral.len(),
                thickness: config.box_thickness,
            },
        },
        total_duration,
        summary: PipelineSummary {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
            fish_count: fish.len(),
            coral_count: coral.len(),
        },
    };

    let result = ProcessResult {
        original,
        enhanced,
        annotated,
        detections: Detections { fish, coral },
        dimensions,
    };
    Ok((result, diagnostics))
}
