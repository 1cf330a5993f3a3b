//! samudra: enhance an underwater photograph and outline likely fish
//! and coral regions.
//!
//! Reads one image file, runs the full pipeline, and writes the three
//! output images (`original.png`, `enhanced.png`, `annotated.png`) into
//! the output directory. The detection counts go to stdout followed by
//! the per-stage diagnostics report (or its JSON form with `--json`).
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin samudra -- [OPTIONS] <IMAGE>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use samudra_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use samudra_pipeline::{PipelineConfig, PipelineError, ProcessResult};

/// Largest input file accepted, in bytes.
const MAX_INPUT_BYTES: u64 = 200 * 1024 * 1024;

/// Enhance an underwater photograph and outline fish and coral.
#[derive(Parser)]
#[command(name = "samudra", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    /// Directory to write `original.png`, `enhanced.png` and
    /// `annotated.png` into. Created if missing.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output diagnostics as JSON instead of the human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error parsing --config-json: {0}")]
    Config(#[source] serde_json::Error),

    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is {size} bytes; the limit is {}", path.display(), MAX_INPUT_BYTES)]
    TooLarge { path: PathBuf, size: u64 },

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("error creating {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("error serializing diagnostics: {0}")]
    Json(#[source] serde_json::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = config_from_cli(cli)?;
    let image_bytes = read_image(&cli.image)?;
    tracing::info!(
        image = %cli.image.display(),
        bytes = image_bytes.len(),
        "processing"
    );

    let (result, diagnostics) =
        samudra_pipeline::diagnostics::process_with_diagnostics(&image_bytes, &config, &StdClock)?;

    write_outputs(&result, &cli.out_dir)?;

    println!(
        "Fish detected: {} \u{2022} Coral regions: {}",
        result.fish_count(),
        result.coral_count(),
    );
    print_diagnostics(&diagnostics, cli.json)
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// `--config-json` is parsed as a (possibly partial) serialized config;
/// without it the defaults are used. Validation happens inside the
/// pipeline.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, CliError> {
    cli.config_json.as_deref().map_or_else(
        || Ok(PipelineConfig::default()),
        |json| serde_json::from_str(json).map_err(CliError::Config),
    )
}

/// Read the input file, refusing anything above [`MAX_INPUT_BYTES`]
/// before loading it.
fn read_image(path: &Path) -> Result<Vec<u8>, CliError> {
    let read_error = |source| CliError::Read {
        path: path.to_path_buf(),
        source,
    };
    let size = std::fs::metadata(path).map_err(read_error)?.len();
    check_size(path, size)?;
    std::fs::read(path).map_err(read_error)
}

fn check_size(path: &Path, size: u64) -> Result<(), CliError> {
    if size > MAX_INPUT_BYTES {
        return Err(CliError::TooLarge {
            path: path.to_path_buf(),
            size,
        });
    }
    Ok(())
}

/// Write the three output images as PNG into `out_dir`.
fn write_outputs(result: &ProcessResult, out_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(out_dir).map_err(|source| CliError::CreateDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    for (name, image) in [
        ("original.png", &result.original),
        ("enhanced.png", &result.enhanced),
        ("annotated.png", &result.annotated),
    ] {
        let path = out_dir.join(name);
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|source| CliError::Write {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), "wrote");
    }
    Ok(())
}

fn print_diagnostics(diagnostics: &PipelineDiagnostics, json: bool) -> Result<(), CliError> {
    if json {
        let json = serde_json::to_string_pretty(diagnostics).map_err(CliError::Json)?;
        println!("{json}");
    } else {
        println!();
        println!("{}", diagnostics.report());
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("samudra").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = parse(&["reef.jpg"]);
        assert_eq!(cli.image, PathBuf::from("reef.jpg"));
        assert_eq!(cli.out_dir, PathBuf::from("."));
        assert!(!cli.json);
        assert_eq!(config_from_cli(&cli).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn image_is_required() {
        assert!(Cli::try_parse_from(["samudra"]).is_err());
    }

    #[test]
    fn partial_config_json_keeps_other_defaults() {
        let cli = parse(&["reef.jpg", "--config-json", r#"{"fish_min_area": 300.0}"#]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.fish_min_area - 300.0).abs() < f64::EPSILON);
        assert_eq!(config.box_thickness, PipelineConfig::DEFAULT_BOX_THICKNESS);
    }

    #[test]
    fn malformed_config_json_is_an_error() {
        let cli = parse(&["reef.jpg", "--config-json", "{not json"]);
        assert!(matches!(config_from_cli(&cli), Err(CliError::Config(_))));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let path = Path::new("reef.jpg");
        assert!(check_size(path, MAX_INPUT_BYTES).is_ok());
        assert!(matches!(
            check_size(path, MAX_INPUT_BYTES + 1),
            Err(CliError::TooLarge { size, .. }) if size == MAX_INPUT_BYTES + 1
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = read_image(Path::new("/nonexistent/samudra/reef.jpg"));
        assert!(matches!(result, Err(CliError::Read { .. })));
    }
}
