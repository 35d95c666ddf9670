//! hibla-count: CLI tool for counting fabric threads in a swatch photo.
//!
//! Runs the thread counting pipeline on a given image file, prints the
//! per-stage diagnostics, and optionally grades the weave and writes the
//! intermediate images. Useful for:
//!
//! - Counting a swatch and grading it against its declared materials
//! - Tuning the threshold, footprint length, and sampling grid
//! - Comparing aggregation strategies on the same image
//! - Inspecting the binarized, isolated, and annotated images
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin hibla-count -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use hibla_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use hibla_pipeline::sweep::SweepCandidate;
use hibla_pipeline::{
    AggregationKind, Classification, Count, CountConfig, CountResult, MaterialSelection,
    MedianIndex, PipelineError, WidthRange,
};
use hibla_pipeline::types::DynamicImage;
use serde::Serialize;

/// Fabric thread counting and weave grading.
///
/// Counts the vertical and horizontal threads of a swatch photograph and
/// prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "hibla-count", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Gray level at or below which a pixel is outer border.
    #[arg(long, default_value_t = CountConfig::DEFAULT_BORDER_THRESHOLD)]
    border_threshold: u8,

    /// Binarization threshold.
    #[arg(long, default_value_t = CountConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Which side of the threshold the threads are on.
    #[arg(long, value_enum, default_value_t = PolarityArg::Dark)]
    polarity: PolarityArg,

    /// Contrast gain applied before binarization.
    #[arg(long, default_value_t = CountConfig::DEFAULT_CONTRAST)]
    contrast: f32,

    /// Sample line spacing in percent of the cross dimension.
    #[arg(long, default_value_t = CountConfig::DEFAULT_SAMPLE_STEP_PERCENT)]
    sample_step_percent: f64,

    /// Sample lines closer than this to an edge are skipped.
    #[arg(long, default_value_t = CountConfig::DEFAULT_SCAN_MARGIN)]
    scan_margin: u32,

    /// Line isolation footprint length in pixels.
    #[arg(
        long,
        default_value_t = CountConfig::DEFAULT_FOOTPRINT_LENGTH,
        value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(1..=255),
    )]
    footprint_length: u8,

    /// Annotation marker length in pixels.
    #[arg(long, default_value_t = CountConfig::DEFAULT_MARKER_LENGTH)]
    marker_length: u32,

    /// Aggregation strategy.
    #[arg(long, value_enum, default_value_t = Aggregation::Max)]
    aggregation: Aggregation,

    /// Even-length median convention for mode-or-median aggregation.
    #[arg(long, value_enum, default_value_t = Median::Legacy)]
    median_index: Median,

    /// Only count segments at least this wide.
    #[arg(long)]
    min_segment_width: Option<u32>,

    /// Only count segments at most this wide.
    #[arg(long)]
    max_segment_width: Option<u32>,

    /// Warp material; grading needs both --warp and --weft.
    #[arg(long, value_enum)]
    warp: Option<MaterialArg>,

    /// Weft material.
    #[arg(long, value_enum)]
    weft: Option<MaterialArg>,

    /// Direction the weft threads run in the photo.
    #[arg(long, value_enum, default_value_t = Orientation::Horizontal)]
    weft_orientation: Orientation,

    /// Try thresholds 250 down to 100 and keep the highest count.
    #[arg(long)]
    sweep: bool,

    /// Write the intermediate and annotated images to this directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Output results as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full count config as a JSON string.
    ///
    /// When provided, all other config flags are ignored. The JSON must
    /// be a valid `CountConfig` serialization; missing fields take their
    /// defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Thread polarity selection.
#[derive(Clone, Copy, ValueEnum)]
enum PolarityArg {
    /// Threads darker than the ground.
    Dark,
    /// Threads lighter than the ground.
    Light,
    /// Decide from the image corner.
    Auto,
}

/// Aggregation strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Aggregation {
    /// Largest per-sample count.
    Max,
    /// Unique mode, otherwise a median.
    ModeOrMedian,
}

/// Even-length median convention.
#[derive(Clone, Copy, ValueEnum)]
enum Median {
    /// Index n/2 + 1.
    Legacy,
    /// Index n/2.
    Upper,
}

/// Thread material selection.
#[derive(Clone, Copy, ValueEnum)]
enum MaterialArg {
    /// Piña Liniwan.
    PinaLiniwan,
    /// Piña Washed.
    PinaWashed,
    /// Silk.
    Silk,
}

/// Weft direction selection.
#[derive(Clone, Copy, ValueEnum)]
enum Orientation {
    /// Weft runs left to right.
    Horizontal,
    /// Weft runs top to bottom.
    Vertical,
}

const fn material(arg: MaterialArg) -> hibla_pipeline::Material {
    match arg {
        MaterialArg::PinaLiniwan => hibla_pipeline::Material::PinaLiniwan,
        MaterialArg::PinaWashed => hibla_pipeline::Material::PinaWashed,
        MaterialArg::Silk => hibla_pipeline::Material::Silk,
    }
}

/// Build a [`CountConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual config flags are ignored. Otherwise, a config is assembled
/// from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<CountConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let segment_width = match (cli.min_segment_width, cli.max_segment_width) {
        (None, None) => None,
        (min, max) => Some(WidthRange {
            min: min.unwrap_or(0),
            max: max.unwrap_or(u32::MAX),
        }),
    };

    Ok(CountConfig {
        border_threshold: cli.border_threshold,
        threshold: cli.threshold,
        polarity: match cli.polarity {
            PolarityArg::Dark => hibla_pipeline::Polarity::DarkThreads,
            PolarityArg::Light => hibla_pipeline::Polarity::LightThreads,
            PolarityArg::Auto => hibla_pipeline::Polarity::Auto,
        },
        contrast: cli.contrast,
        sample_step_percent: cli.sample_step_percent,
        scan_margin: cli.scan_margin,
        footprint_length: cli.footprint_length,
        marker_length: cli.marker_length,
        aggregation: match cli.aggregation {
            Aggregation::Max => AggregationKind::Max,
            Aggregation::ModeOrMedian => AggregationKind::ModeOrMedian {
                median_index: match cli.median_index {
                    Median::Legacy => MedianIndex::Legacy,
                    Median::Upper => MedianIndex::Upper,
                },
            },
        },
        segment_width,
    })
}

/// Material selection from `--warp`/`--weft`, if both were given.
fn selection_from_cli(cli: &Cli) -> Result<Option<MaterialSelection>, String> {
    match (cli.warp, cli.weft) {
        (Some(warp), Some(weft)) => Ok(Some(MaterialSelection {
            warp: material(warp),
            weft: material(weft),
            weft_orientation: match cli.weft_orientation {
                Orientation::Horizontal => hibla_pipeline::Axis::Horizontal,
                Orientation::Vertical => hibla_pipeline::Axis::Vertical,
            },
        })),
        (None, None) => Ok(None),
        _ => Err("--warp and --weft must be given together".to_string()),
    }
}

/// Everything `--json` prints.
#[derive(Serialize)]
struct Report<'a> {
    count: Count,
    threshold: u8,
    classification: Option<&'a Classification>,
    sweep: Option<&'a [SweepCandidate]>,
    diagnostics: &'a PipelineDiagnostics,
}

/// Count once at `config.threshold`, or sweep the legacy thresholds.
fn count(
    image: &DynamicImage,
    config: &CountConfig,
    sweep: bool,
) -> Result<(CountResult, PipelineDiagnostics, Option<Vec<SweepCandidate>>), PipelineError> {
    if sweep {
        let (sweep, diagnostics) = hibla_pipeline::sweep_thresholds_with_diagnostics(
            image,
            config,
            &hibla_pipeline::ThresholdSweep::LEGACY,
            &StdClock,
        )?;
        Ok((sweep.best, diagnostics, Some(sweep.candidates)))
    } else {
        let (result, diagnostics) =
            hibla_pipeline::count_threads_with_diagnostics(image, config, &StdClock)?;
        Ok((result, diagnostics, None))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let selection = match selection_from_cli(&cli) {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );

    let image = match hibla_pipeline::grayscale::decode(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Config: {config:#?}");
    eprintln!();

    let (result, diagnostics, candidates) = match count(&image, &config, cli.sweep) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(ref candidates) = candidates {
        for candidate in candidates {
            match candidate.count {
                Some(count) => eprintln!(
                    "Threshold {:>3}: vertical {} horizontal {}",
                    candidate.threshold, count.vertical, count.horizontal
                ),
                None => eprintln!("Threshold {:>3}: skipped", candidate.threshold),
            }
        }
    }

    let classification = selection.map(|s| hibla_pipeline::classify(result.count, &s));

    if cli.json {
        let report = Report {
            count: result.count,
            threshold: result.threshold,
            classification: classification.as_ref(),
            sweep: candidates.as_deref(),
            diagnostics: &diagnostics,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", diagnostics.report());
        println!();
        println!("Thread count: {}", result.count);
        if let Some(ref c) = classification {
            println!("{}", c.orientation_spec);
            println!("{}", c.warp_spec);
            println!("{}", c.weft_spec);
            println!("Grade: {}", c.grade);
        }
    }

    if let Some(ref out_dir) = cli.out_dir {
        let stem = cli
            .image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("swatch");
        if let Err(e) = write_images(out_dir, stem, &result) {
            eprintln!("Error writing images to {}: {e}", out_dir.display());
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

/// Write every intermediate image as `<stem>-<stage>.png` under `out_dir`.
fn write_images(out_dir: &Path, stem: &str, result: &CountResult) -> image::ImageResult<()> {
    std::fs::create_dir_all(out_dir)?;
    for (name, mask) in result.images.masks() {
        let path = out_dir.join(format!("{stem}-{name}.png"));
        mask.save(&path)?;
        eprintln!("Wrote {}", path.display());
    }
    for (name, image) in result.images.colored() {
        let path = out_dir.join(format!("{stem}-{name}.png"));
        image.save(&path)?;
        eprintln!("Wrote {}", path.display());
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
        Cli::try_parse_from(std::iter::once("hibla-count").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn default_flags_match_default_config() {
        let cli = parse(&["swatch.png"]);
        assert_eq!(config_from_cli(&cli).unwrap(), CountConfig::default());
        assert_eq!(selection_from_cli(&cli).unwrap(), None);
    }

    #[test]
    fn flags_reach_the_config() {
        let cli = parse(&[
            "swatch.png",
            "--threshold",
            "200",
            "--polarity",
            "light",
            "--aggregation",
            "mode-or-median",
            "--median-index",
            "upper",
            "--min-segment-width",
            "3",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.threshold, 200);
        assert_eq!(config.polarity, hibla_pipeline::Polarity::LightThreads);
        assert_eq!(
            config.aggregation,
            AggregationKind::ModeOrMedian {
                median_index: MedianIndex::Upper
            }
        );
        assert_eq!(
            config.segment_width,
            Some(WidthRange {
                min: 3,
                max: u32::MAX
            })
        );
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "swatch.png",
            "--threshold",
            "10",
            "--config-json",
            r#"{"threshold": 175}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.threshold, 175);
        assert_eq!(config.scan_margin, CountConfig::DEFAULT_SCAN_MARGIN);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = parse(&["swatch.png", "--config-json", "{not json"]);
        assert!(config_from_cli(&cli).is_err());
    }

    #[test]
    fn materials_need_both_sides() {
        let cli = parse(&["swatch.png", "--warp", "silk"]);
        assert!(selection_from_cli(&cli).is_err());

        let cli = parse(&[
            "swatch.png",
            "--warp",
            "silk",
            "--weft",
            "pina-washed",
            "--weft-orientation",
            "vertical",
        ]);
        let selection = selection_from_cli(&cli).unwrap().unwrap();
        assert_eq!(selection.warp, hibla_pipeline::Material::Silk);
        assert_eq!(selection.weft, hibla_pipeline::Material::PinaWashed);
        assert_eq!(selection.weft_orientation, hibla_pipeline::Axis::Vertical);
    }

    #[test]
    fn zero_footprint_is_rejected_by_the_parser() {
        let args = ["hibla-count", "swatch.png", "--footprint-length", "0"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    /// Stripes at gray 40 and gray 160 alternating on white.
    fn two_tone() -> DynamicImage {
        DynamicImage::ImageLuma8(image::GrayImage::from_fn(200, 200, |x, _| {
            let level = match x % 40 {
                10..20 => 40,
                30..40 => 160,
                _ => 255,
            };
            image::Luma([level])
        }))
    }

    #[test]
    fn sweep_reports_the_winning_threshold() {
        let (result, diagnostics, candidates) =
            count(&two_tone(), &CountConfig::default(), true).unwrap();
        let candidates = candidates.unwrap();
        assert_eq!(candidates.len(), hibla_pipeline::ThresholdSweep::LEGACY.len());
        assert_eq!(diagnostics.summary.threshold, result.threshold);
        assert_eq!(diagnostics.summary.vertical, result.count.vertical);
        assert_eq!(result.count.vertical, 10);
    }

    #[test]
    fn single_run_has_no_candidates() {
        let (result, diagnostics, candidates) =
            count(&two_tone(), &CountConfig::default(), false).unwrap();
        assert!(candidates.is_none());
        assert_eq!(result.threshold, CountConfig::DEFAULT_THRESHOLD);
        assert_eq!(diagnostics.summary.threshold, CountConfig::DEFAULT_THRESHOLD);
    }
}
