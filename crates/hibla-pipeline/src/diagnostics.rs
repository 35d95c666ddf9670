//! Pipeline diagnostics: timing and metrics for each stage.
//!
//! [`count_threads_with_diagnostics`] runs the same stages as
//! [`crate::count_threads`] and additionally records how long each took
//! and what it produced. Time is read through the [`Clock`] trait so this
//! crate stays free of platform clocks; pass [`NoClock`] when durations
//! are not wanted.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline;
use crate::types::{
    Axis, CountConfig, CountResult, Dimensions, DynamicImage, PipelineError, Polarity,
};

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

/// Source of timestamps for stage durations.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time passed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances; every duration is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, (): &()) -> Duration {
        Duration::ZERO
    }
}

/// Diagnostics collected from a single counting run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Border cropping.
    pub crop: StageDiagnostics,
    /// Grayscale conversion and contrast gain.
    pub grayscale: StageDiagnostics,
    /// Binarization.
    pub binarize: StageDiagnostics,
    /// Vertical line isolation.
    pub isolate_vertical: StageDiagnostics,
    /// Horizontal line isolation.
    pub isolate_horizontal: StageDiagnostics,
    /// Vertical thread scan.
    pub scan_vertical: StageDiagnostics,
    /// Horizontal thread scan.
    pub scan_horizontal: StageDiagnostics,
    /// Aggregation of both axes.
    pub aggregate: StageDiagnostics,
    /// Annotation of both axes.
    pub annotate: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the run's outcome.
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

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Border cropping.
    Crop {
        /// Input size.
        input: Dimensions,
        /// Size after cropping.
        output: Dimensions,
        /// Whether a border was removed.
        cropped: bool,
    },
    /// Grayscale conversion.
    Grayscale {
        /// Image size.
        dimensions: Dimensions,
        /// Contrast gain applied.
        contrast: f32,
    },
    /// Binarization.
    Binarize {
        /// Threshold used.
        threshold: u8,
        /// Polarity requested.
        polarity: Polarity,
        /// Thread pixels in the mask.
        foreground_pixels: u64,
        /// Total pixel count for computing density.
        total_pixel_count: u64,
    },
    /// Line isolation.
    Isolate {
        /// Axis isolated.
        axis: Axis,
        /// Footprint length in pixels.
        footprint_length: u8,
        /// Thread pixels that survived.
        foreground_pixels: u64,
    },
    /// Line scanning.
    Scan {
        /// Axis scanned.
        axis: Axis,
        /// Valid samples.
        samples: usize,
        /// Empty samples skipped.
        skipped: usize,
        /// Segments seen.
        segments_seen: usize,
        /// Segments dropped by the width filter.
        segments_rejected: usize,
        /// Narrowest segment.
        min_width: Option<u32>,
        /// Widest segment.
        max_width: Option<u32>,
    },
    /// Aggregation.
    Aggregate {
        /// Strategy name.
        strategy: String,
        /// Vertical count.
        vertical: u32,
        /// Horizontal count.
        horizontal: u32,
    },
    /// Annotation.
    Annotate {
        /// Marker length in pixels.
        marker_length: u32,
        /// Markers drawn across both axes.
        markers: usize,
    },
}

/// High-level summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Input image size.
    pub input: Dimensions,
    /// Size after cropping.
    pub cropped: Dimensions,
    /// Binarization threshold.
    pub threshold: u8,
    /// Aggregated vertical count.
    pub vertical: u32,
    /// Aggregated horizontal count.
    pub horizontal: u32,
    /// Per-sample vertical counts.
    pub vertical_counts: Vec<u32>,
    /// Per-sample horizontal counts.
    pub horizontal_counts: Vec<u32>,
}

impl PipelineSummary {
    fn new(input: Dimensions, result: &CountResult) -> Self {
        Self {
            input,
            cropped: Dimensions::of(&result.images.original),
            threshold: result.threshold,
            vertical: result.count.vertical,
            horizontal: result.count.horizontal,
            vertical_counts: result.vertical.counts(),
            horizontal_counts: result.horizontal.counts(),
        }
    }
}

/// Count threads and collect per-stage diagnostics.
///
/// # Errors
///
/// Same as [`crate::count_threads`].
pub fn count_threads_with_diagnostics<C: Clock>(
    image: &DynamicImage,
    config: &CountConfig,
    clock: &C,
) -> Result<(CountResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;

    let start = clock.now();
    let (cropped, crop) = pipeline::crop_stage(image, config, clock)?;
    let (result, stages) = pipeline::count_stages(&cropped.image, config.threshold, config, clock)?;
    let total_duration = clock.elapsed(&start);

    let diagnostics =
        PipelineDiagnostics::assemble(Dimensions::of(image), crop, stages, total_duration, &result);
    Ok((result, diagnostics))
}

impl PipelineDiagnostics {
    pub(crate) fn assemble(
        input: Dimensions,
        crop: StageDiagnostics,
        stages: pipeline::CountStages,
        total_duration: Duration,
        result: &CountResult,
    ) -> Self {
        Self {
            crop,
            grayscale: stages.grayscale,
            binarize: stages.binarize,
            isolate_vertical: stages.isolate_vertical,
            isolate_horizontal: stages.isolate_horizontal,
            scan_vertical: stages.scan_vertical,
            scan_horizontal: stages.scan_horizontal,
            aggregate: stages.aggregate,
            annotate: stages.annotate,
            total_duration,
            summary: PipelineSummary::new(input, result),
        }
    }

    /// Stages in execution order, paired with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 9] {
        [
            ("Crop", &self.crop),
            ("Grayscale", &self.grayscale),
            ("Binarize", &self.binarize),
            ("Isolate Vertical", &self.isolate_vertical),
            ("Isolate Horizontal", &self.isolate_horizontal),
            ("Scan Vertical", &self.scan_vertical),
            ("Scan Horizontal", &self.scan_horizontal),
            ("Aggregate", &self.aggregate),
            ("Annotate", &self.annotate),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Thread Count Diagnostics\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} -> {}x{} after crop",
            self.summary.input.width,
            self.summary.input.height,
            self.summary.cropped.width,
            self.summary.cropped.height,
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
        for (name, diag) in self.stages() {
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
            "Vertical samples:   {:?}",
            self.summary.vertical_counts
        ));
        lines.push(format!(
            "Horizontal samples: {:?}",
            self.summary.horizontal_counts
        ));
        lines.push(format!(
            "Threshold: {}  |  Vertical: {}  |  Horizontal: {}",
            self.summary.threshold, self.summary.vertical, self.summary.horizontal,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_width(width: Option<u32>) -> String {
    width.map_or_else(|| "-".to_string(), |w| w.to_string())
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Crop {
            input,
            output,
            cropped,
        } => {
            if *cropped {
                format!(
                    "{}x{} -> {}x{}",
                    input.width, input.height, output.width, output.height
                )
            } else {
                format!("{}x{} (no border)", input.width, input.height)
            }
        }
        StageMetrics::Grayscale {
            dimensions,
            contrast,
        } => format!(
            "{}x{} contrast={contrast:.2}",
            dimensions.width, dimensions.height
        ),
        StageMetrics::Binarize {
            threshold,
            polarity,
            foreground_pixels,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *foreground_pixels as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("t={threshold} {polarity:?} fg={foreground_pixels} ({density:.1}%)")
        }
        StageMetrics::Isolate {
            axis,
            footprint_length,
            foreground_pixels,
        } => format!("{axis} L={footprint_length} fg={foreground_pixels}"),
        StageMetrics::Scan {
            axis,
            samples,
            skipped,
            segments_seen,
            segments_rejected,
            min_width,
            max_width,
        } => format!(
            "{axis} {samples} samples ({skipped} skipped), \
             {segments_seen} segs ({segments_rejected} rejected) w={}..{}",
            format_width(*min_width),
            format_width(*max_width),
        ),
        StageMetrics::Aggregate {
            strategy,
            vertical,
            horizontal,
        } => format!("{strategy} v={vertical} h={horizontal}"),
        StageMetrics::Annotate {
            marker_length,
            markers,
        } => format!("{markers} markers, L={marker_length}"),
    }
}
