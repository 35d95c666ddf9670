//! Stage sequencing shared by the single-threshold and sweep entry points.
//!
//! Cropping is split from the rest so a threshold sweep can crop once and
//! re-run everything downstream per threshold.

use std::time::Duration;

use crate::aggregate::Aggregator;
use crate::crop::Cropped;
use crate::diagnostics::{Clock, StageDiagnostics, StageMetrics};
use crate::scan::{AxisScan, ScanParams};
use crate::types::{
    Axis, Count, CountConfig, CountResult, Dimensions, DynamicImage, InvalidImage, PipelineError,
    ThreadImages,
};
use crate::{annotate, binarize, crop, grayscale, isolate, scan};

/// Diagnostics for every stage after cropping.
pub struct CountStages {
    pub grayscale: StageDiagnostics,
    pub binarize: StageDiagnostics,
    pub isolate_vertical: StageDiagnostics,
    pub isolate_horizontal: StageDiagnostics,
    pub scan_vertical: StageDiagnostics,
    pub scan_horizontal: StageDiagnostics,
    pub aggregate: StageDiagnostics,
    pub annotate: StageDiagnostics,
}

fn timed<C: Clock, T>(clock: &C, f: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = f();
    (value, clock.elapsed(&start))
}

pub fn crop_stage<C: Clock>(
    image: &DynamicImage,
    config: &CountConfig,
    clock: &C,
) -> Result<(Cropped, StageDiagnostics), PipelineError> {
    let (cropped, duration) = timed(clock, || crop::crop_border(image, config.border_threshold));
    let cropped = cropped?;
    let metrics = StageMetrics::Crop {
        input: Dimensions::of(image),
        output: Dimensions::of(&cropped.image),
        cropped: cropped.rect.is_some(),
    };
    Ok((cropped, StageDiagnostics { duration, metrics }))
}

fn isolate_stage<C: Clock>(
    binarized: &image::GrayImage,
    axis: Axis,
    config: &CountConfig,
    clock: &C,
) -> (image::GrayImage, StageDiagnostics) {
    let (isolated, duration) = timed(clock, || {
        isolate::isolate_lines(binarized, axis, config.footprint_length)
    });
    let metrics = StageMetrics::Isolate {
        axis,
        footprint_length: config.footprint_length,
        foreground_pixels: binarize::foreground_pixels(&isolated),
    };
    (isolated, StageDiagnostics { duration, metrics })
}

fn scan_stage<C: Clock>(
    isolated: &image::GrayImage,
    coverage: &image::GrayImage,
    axis: Axis,
    params: &ScanParams,
    clock: &C,
) -> (AxisScan, StageDiagnostics) {
    let (scan, duration) = timed(clock, || scan::scan_axis(isolated, coverage, axis, params));
    let metrics = StageMetrics::Scan {
        axis,
        samples: scan.samples.len(),
        skipped: scan.skipped,
        segments_seen: scan.stats.segments_seen,
        segments_rejected: scan.stats.segments_rejected,
        min_width: scan.stats.min_width,
        max_width: scan.stats.max_width,
    };
    (scan, StageDiagnostics { duration, metrics })
}

fn aggregate_axis(config: &CountConfig, scan: &AxisScan) -> Result<u32, InvalidImage> {
    config.aggregation.aggregate(&scan.counts()).ok_or_else(|| {
        log::warn!("no analyzable {} sample lines", scan.axis);
        InvalidImage::NoAnalyzableSamples(scan.axis)
    })
}

/// Run everything downstream of cropping at `threshold`.
pub fn count_stages<C: Clock>(
    cropped: &DynamicImage,
    threshold: u8,
    config: &CountConfig,
    clock: &C,
) -> Result<(CountResult, CountStages), PipelineError> {
    let ((original, gray), duration) = timed(clock, || {
        let original = grayscale::to_rgba(cropped);
        let gray = grayscale::apply_contrast(&grayscale::to_gray(cropped), config.contrast);
        (original, gray)
    });
    let grayscale_stage = StageDiagnostics {
        duration,
        metrics: StageMetrics::Grayscale {
            dimensions: Dimensions::of(&gray),
            contrast: config.contrast,
        },
    };

    let (binarized, duration) =
        timed(clock, || binarize::binarize(&gray, threshold, config.polarity));
    let foreground_pixels = binarize::foreground_pixels(&binarized);
    let total_pixel_count = Dimensions::of(&binarized).pixel_count();
    if foreground_pixels == 0 || foreground_pixels == total_pixel_count {
        log::warn!("threshold {threshold}: binarized swatch holds a single level");
        return Err(InvalidImage::SingleLevel.into());
    }
    let binarize_stage = StageDiagnostics {
        duration,
        metrics: StageMetrics::Binarize {
            threshold,
            polarity: config.polarity,
            foreground_pixels,
            total_pixel_count,
        },
    };

    let (vertical_isolated, isolate_vertical) =
        isolate_stage(&binarized, Axis::Vertical, config, clock);
    let (horizontal_isolated, isolate_horizontal) =
        isolate_stage(&binarized, Axis::Horizontal, config, clock);

    let params = ScanParams {
        step_percent: config.sample_step_percent,
        margin: config.scan_margin,
        width_filter: config.segment_width,
    };
    let (vertical, scan_vertical) =
        scan_stage(&vertical_isolated, &binarized, Axis::Vertical, &params, clock);
    let (horizontal, scan_horizontal) = scan_stage(
        &horizontal_isolated,
        &binarized,
        Axis::Horizontal,
        &params,
        clock,
    );

    let (aggregated, duration) = timed(clock, || {
        Ok::<_, InvalidImage>(Count {
            vertical: aggregate_axis(config, &vertical)?,
            horizontal: aggregate_axis(config, &horizontal)?,
        })
    });
    let count = aggregated?;
    let aggregate_stage = StageDiagnostics {
        duration,
        metrics: StageMetrics::Aggregate {
            strategy: config.aggregation.to_string(),
            vertical: count.vertical,
            horizontal: count.horizontal,
        },
    };

    let ((vertical_annotated, horizontal_annotated), duration) = timed(clock, || {
        (
            annotate::annotate(&original, &vertical, config.marker_length),
            annotate::annotate(&original, &horizontal, config.marker_length),
        )
    });
    let markers = vertical
        .samples
        .iter()
        .chain(&horizontal.samples)
        .map(|s| s.segments.len())
        .sum();
    let annotate_stage = StageDiagnostics {
        duration,
        metrics: StageMetrics::Annotate {
            marker_length: config.marker_length,
            markers,
        },
    };

    log::debug!(
        "threshold {threshold}: vertical {} horizontal {}",
        count.vertical,
        count.horizontal
    );

    let result = CountResult {
        count,
        threshold,
        vertical,
        horizontal,
        images: ThreadImages {
            original,
            grayscale: gray,
            binarized,
            vertical_isolated,
            vertical_annotated,
            horizontal_isolated,
            horizontal_annotated,
        },
    };
    let stages = CountStages {
        grayscale: grayscale_stage,
        binarize: binarize_stage,
        isolate_vertical,
        isolate_horizontal,
        scan_vertical,
        scan_horizontal,
        aggregate: aggregate_stage,
        annotate: annotate_stage,
    };
    Ok((result, stages))
}
