//! Line scanning: count thread crossings along evenly spaced sample lines.
//!
//! One routine serves both axes. For [`Axis::Vertical`] the sample lines
//! are image rows; for [`Axis::Horizontal`] they are columns. Every
//! maximal run of foreground along a sample line is one [`Segment`], i.e.
//! one thread crossing.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::{Axis, CountConfig, Dimensions, FOREGROUND, Segment, WidthRange};

/// Where to sample and which segments to count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanParams {
    /// Spacing between sample lines in percent of the cross dimension.
    pub step_percent: f64,
    /// Positions closer than this to either edge are skipped.
    pub margin: u32,
    /// Only segments within this width range are counted.
    pub width_filter: Option<WidthRange>,
}

/// Segments found on one sample line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleScan {
    /// Row (vertical axis) or column (horizontal axis) index.
    pub position: u32,
    /// Counted segments, ordered by start.
    pub segments: Vec<Segment>,
}

impl SampleScan {
    /// Number of thread crossings on this line.
    #[must_use]
    pub fn count(&self) -> u32 {
        u32::try_from(self.segments.len()).unwrap_or(u32::MAX)
    }
}

/// Segment width statistics gathered during a scan.
///
/// Widths are recorded for every segment seen, including those the width
/// filter later rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Narrowest segment seen.
    pub min_width: Option<u32>,
    /// Widest segment seen.
    pub max_width: Option<u32>,
    /// Segments seen across all valid samples.
    pub segments_seen: usize,
    /// Segments dropped by the width filter.
    pub segments_rejected: usize,
}

impl ScanStats {
    fn record(&mut self, width: u32) {
        self.min_width = Some(self.min_width.map_or(width, |w| w.min(width)));
        self.max_width = Some(self.max_width.map_or(width, |w| w.max(width)));
        self.segments_seen += 1;
    }
}

/// Scan of one axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisScan {
    /// Which threads were counted.
    pub axis: Axis,
    /// Samples whose line intersected the fabric.
    pub samples: Vec<SampleScan>,
    /// Sample positions skipped because the line held no foreground.
    pub skipped: usize,
    /// Width statistics.
    pub stats: ScanStats,
}

impl AxisScan {
    /// Per-sample crossing counts, in sample order.
    #[must_use]
    pub fn counts(&self) -> Vec<u32> {
        self.samples.iter().map(SampleScan::count).collect()
    }
}

/// Evenly spaced sample positions across a dimension of `extent` pixels.
///
/// Position `k` lies at `floor(extent * k * step / 100)` for every `k >= 1`
/// with `k * step < 100`; positions within `margin` of either edge are
/// dropped and duplicates collapse. Steps below
/// [`CountConfig::MIN_SAMPLE_STEP_PERCENT`] are raised to it.
#[must_use]
pub fn sample_positions(extent: u32, step_percent: f64, margin: u32) -> Vec<u32> {
    let mut positions: Vec<u32> = Vec::new();
    if step_percent.is_nan() || step_percent <= 0.0 {
        return positions;
    }
    let step = step_percent.max(CountConfig::MIN_SAMPLE_STEP_PERCENT);

    let upper = extent.saturating_sub(margin);
    let percents = (1..=u32::MAX)
        .map(|k| f64::from(k) * step)
        .take_while(|&percent| percent < 100.0);
    for percent in percents {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let position = (f64::from(extent) * percent / 100.0).floor() as u32;
        if position >= margin && position < upper && positions.last() != Some(&position) {
            positions.push(position);
        }
    }
    positions
}

/// Split a line into maximal foreground runs.
///
/// A run opens only on a background-to-foreground transition, so a wide
/// thread is never counted twice. The returned segments are disjoint and
/// ordered by start.
pub fn find_segments(line: impl IntoIterator<Item = bool>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut open: Option<u32> = None;
    let mut offset = 0_u32;

    for on in line {
        match (open, on) {
            (None, true) => open = Some(offset),
            (Some(start), false) => {
                segments.push(Segment::new(start, offset - 1));
                open = None;
            }
            _ => {}
        }
        offset += 1;
    }
    if let Some(start) = open {
        segments.push(Segment::new(start, offset - 1));
    }
    segments
}

/// Foreground flags of the sample line at `position`.
fn line(mask: &GrayImage, axis: Axis, position: u32) -> impl Iterator<Item = bool> + '_ {
    let length = axis.line_length(Dimensions::of(mask));
    (0..length).map(move |offset| {
        let (x, y) = axis.pixel_at(position, offset);
        mask.get_pixel(x, y).0[0] == FOREGROUND
    })
}

/// Count crossings of `axis` threads in `isolated`.
///
/// `coverage` is the pre-isolation mask: a sample line with no foreground
/// there does not cover fabric and is skipped rather than counted as
/// zero. Both masks must have the same dimensions.
#[must_use]
pub fn scan_axis(
    isolated: &GrayImage,
    coverage: &GrayImage,
    axis: Axis,
    params: &ScanParams,
) -> AxisScan {
    debug_assert_eq!(isolated.dimensions(), coverage.dimensions());

    let dims = Dimensions::of(isolated);
    let mut stats = ScanStats::default();
    let mut samples = Vec::new();
    let mut skipped = 0;

    let positions = sample_positions(axis.sample_extent(dims), params.step_percent, params.margin);
    for position in positions {
        if !line(coverage, axis, position).any(|on| on) {
            skipped += 1;
            continue;
        }

        let mut segments = find_segments(line(isolated, axis, position));
        for segment in &segments {
            stats.record(segment.width());
        }
        if let Some(range) = params.width_filter {
            let before = segments.len();
            segments.retain(|s| range.contains(s.width()));
            stats.segments_rejected += before - segments.len();
        }
        samples.push(SampleScan { position, segments });
    }

    log::debug!(
        "scan {axis}: {} samples ({} skipped), counts {:?}",
        samples.len(),
        skipped,
        samples.iter().map(SampleScan::count).collect::<Vec<_>>()
    );

    AxisScan {
        axis,
        samples,
        skipped,
        stats,
    }
}
