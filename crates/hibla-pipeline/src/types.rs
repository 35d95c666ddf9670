//! Shared types for the hibla thread-counting pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationKind;
use crate::scan::AxisScan;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` for the cropped original and annotated images.
pub use image::RgbaImage;

/// Re-export `DynamicImage`, the pipeline's input type.
pub use image::DynamicImage;

/// Mask value for background pixels.
pub const BACKGROUND: u8 = 0;

/// Mask value for thread (foreground) pixels.
pub const FOREGROUND: u8 = 255;

/// Which family of threads is being counted.
///
/// [`Vertical`](Self::Vertical) threads run top to bottom, so they are
/// counted by walking image rows. [`Horizontal`](Self::Horizontal) is the
/// transpose: threads run left to right and are counted along columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Threads running left to right.
    Horizontal,
    /// Threads running top to bottom.
    Vertical,
}

impl Axis {
    /// Both axes, in the order the pipeline processes them.
    pub const ALL: [Self; 2] = [Self::Vertical, Self::Horizontal];

    /// Footprint `(width, height)` for isolating threads along this axis.
    ///
    /// Long along the thread direction, one pixel across it.
    #[must_use]
    pub const fn footprint(self, length: u32) -> (u32, u32) {
        match self {
            Self::Vertical => (1, length),
            Self::Horizontal => (length, 1),
        }
    }

    /// Extent of the dimension that sample positions are spread over.
    #[must_use]
    pub const fn sample_extent(self, dimensions: Dimensions) -> u32 {
        match self {
            Self::Vertical => dimensions.height,
            Self::Horizontal => dimensions.width,
        }
    }

    /// Length of a single sample line.
    #[must_use]
    pub const fn line_length(self, dimensions: Dimensions) -> u32 {
        match self {
            Self::Vertical => dimensions.width,
            Self::Horizontal => dimensions.height,
        }
    }

    /// Image `(x, y)` of the pixel at `offset` along the sample line at
    /// `position`.
    #[must_use]
    pub const fn pixel_at(self, position: u32, offset: u32) -> (u32, u32) {
        match self {
            Self::Vertical => (offset, position),
            Self::Horizontal => (position, offset),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horizontal => write!(f, "horizontal"),
            Self::Vertical => write!(f, "vertical"),
        }
    }
}

/// A contiguous run of foreground pixels along one sample line.
///
/// Both ends are inclusive, so a one-pixel run has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First foreground offset.
    pub start: u32,
    /// Last foreground offset.
    pub end: u32,
}

impl Segment {
    /// Create a segment. `start` must not exceed `end`.
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Width of the run in pixels.
    #[must_use]
    pub const fn width(self) -> u32 {
        self.end - self.start + 1
    }

    /// Offset of the run's centre, rounded down.
    #[must_use]
    pub const fn midpoint(self) -> u32 {
        self.start + (self.end - self.start) / 2
    }
}

/// Thread counts per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Count {
    /// Number of horizontal threads.
    pub horizontal: u32,
    /// Number of vertical threads.
    pub vertical: u32,
}

impl Count {
    /// Count along one axis.
    #[must_use]
    pub const fn get(self, axis: Axis) -> u32 {
        match axis {
            Axis::Horizontal => self.horizontal,
            Axis::Vertical => self.vertical,
        }
    }

    /// Sum of both axes.
    #[must_use]
    pub const fn total(self) -> u32 {
        self.horizontal.saturating_add(self.vertical)
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.total())
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Which intensity the threads have in the photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Polarity {
    /// Threads darker than the threshold are foreground.
    #[default]
    DarkThreads,
    /// Threads brighter than the threshold are foreground.
    LightThreads,
    /// Decide from the background: if the corner pixel comes out as a
    /// dark thread, the background itself is dark and the polarity flips.
    Auto,
}

/// Inclusive range of accepted segment widths, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidthRange {
    /// Narrowest accepted segment.
    pub min: u32,
    /// Widest accepted segment.
    pub max: u32,
}

impl WidthRange {
    /// Whether a segment of `width` pixels falls within the range.
    #[must_use]
    pub const fn contains(self, width: u32) -> bool {
        width >= self.min && width <= self.max
    }
}

/// Configuration for one counting invocation.
///
/// Every field has a `DEFAULT_*` associated constant so that CLI flags
/// and the [`Default`] impl cannot drift apart. Call
/// [`validate`](Self::validate) before trusting externally supplied
/// values; [`crate::count_threads`] does so itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountConfig {
    /// Gray level at or below which a pixel counts as outer border
    /// during cropping.
    pub border_threshold: u8,

    /// Global binarization threshold.
    pub threshold: u8,

    /// Thread polarity used by the binarizer.
    pub polarity: Polarity,

    /// Gain applied to gray values before binarization. `1.0` is identity.
    pub contrast: f32,

    /// Spacing between sample lines as a percentage of the cross dimension.
    pub sample_step_percent: f64,

    /// Sample positions closer than this to either edge are skipped.
    pub scan_margin: u32,

    /// Length of the line isolation footprint in pixels (1 to 255).
    pub footprint_length: u8,

    /// Length of the annotation markers in pixels.
    pub marker_length: u32,

    /// How per-sample counts are reduced to one count per axis.
    pub aggregation: AggregationKind,

    /// Only count segments whose width falls within this range.
    pub segment_width: Option<WidthRange>,
}

impl CountConfig {
    /// Default border cutoff: only near-black pixels are border.
    pub const DEFAULT_BORDER_THRESHOLD: u8 = 1;
    /// Default binarization threshold.
    pub const DEFAULT_THRESHOLD: u8 = 128;
    /// Default contrast gain.
    pub const DEFAULT_CONTRAST: f32 = 1.0;
    /// Default sample spacing in percent.
    pub const DEFAULT_SAMPLE_STEP_PERCENT: f64 = 3.0;
    /// Finest sample spacing in percent; at most 10 000 sample lines.
    pub const MIN_SAMPLE_STEP_PERCENT: f64 = 0.01;
    /// Default scan margin in pixels.
    pub const DEFAULT_SCAN_MARGIN: u32 = 10;
    /// Default isolation footprint length in pixels.
    pub const DEFAULT_FOOTPRINT_LENGTH: u8 = 20;
    /// Default annotation marker length in pixels.
    pub const DEFAULT_MARKER_LENGTH: u32 = 10;

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.sample_step_percent >= Self::MIN_SAMPLE_STEP_PERCENT
            && self.sample_step_percent <= 100.0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "sample_step_percent must be in [{}, 100], got {}",
                Self::MIN_SAMPLE_STEP_PERCENT,
                self.sample_step_percent
            )));
        }
        if self.footprint_length == 0 {
            return Err(PipelineError::InvalidConfig(
                "footprint_length must be at least 1".to_string(),
            ));
        }
        if !self.contrast.is_finite() || self.contrast < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "contrast must be finite and non-negative, got {}",
                self.contrast
            )));
        }
        if let Some(range) = self.segment_width
            && range.min > range.max
        {
            return Err(PipelineError::InvalidConfig(format!(
                "segment_width min ({}) exceeds max ({})",
                range.min, range.max
            )));
        }
        Ok(())
    }
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            border_threshold: Self::DEFAULT_BORDER_THRESHOLD,
            threshold: Self::DEFAULT_THRESHOLD,
            polarity: Polarity::default(),
            contrast: Self::DEFAULT_CONTRAST,
            sample_step_percent: Self::DEFAULT_SAMPLE_STEP_PERCENT,
            scan_margin: Self::DEFAULT_SCAN_MARGIN,
            footprint_length: Self::DEFAULT_FOOTPRINT_LENGTH,
            marker_length: Self::DEFAULT_MARKER_LENGTH,
            aggregation: AggregationKind::default(),
            segment_width: None,
        }
    }
}

/// Intermediate images kept for visual verification.
///
/// Note: does not derive `PartialEq` on purpose; compare the fields you
/// care about, which are all plain `image` buffers.
#[derive(Debug, Clone)]
pub struct ThreadImages {
    /// The cropped input image.
    pub original: RgbaImage,
    /// Grayscale of the cropped image, after contrast gain.
    pub grayscale: GrayImage,
    /// Two-level mask of the grayscale image.
    pub binarized: GrayImage,
    /// Mask with only vertical structures left.
    pub vertical_isolated: GrayImage,
    /// Cropped image with vertical crossings marked.
    pub vertical_annotated: RgbaImage,
    /// Mask with only horizontal structures left.
    pub horizontal_isolated: GrayImage,
    /// Cropped image with horizontal crossings marked.
    pub horizontal_annotated: RgbaImage,
}

impl ThreadImages {
    /// Grayscale stages paired with a short file-friendly name.
    #[must_use]
    pub fn masks(&self) -> [(&'static str, &GrayImage); 4] {
        [
            ("grayscale", &self.grayscale),
            ("binarized", &self.binarized),
            ("vertical-isolated", &self.vertical_isolated),
            ("horizontal-isolated", &self.horizontal_isolated),
        ]
    }

    /// Color stages paired with a short file-friendly name.
    #[must_use]
    pub fn colored(&self) -> [(&'static str, &RgbaImage); 3] {
        [
            ("original", &self.original),
            ("vertical-annotated", &self.vertical_annotated),
            ("horizontal-annotated", &self.horizontal_annotated),
        ]
    }
}

/// Result of one counting invocation.
#[derive(Debug, Clone)]
pub struct CountResult {
    /// Aggregated thread counts.
    pub count: Count,
    /// Binarization threshold that produced this result.
    pub threshold: u8,
    /// Per-sample scan of the vertical threads.
    pub vertical: AxisScan,
    /// Per-sample scan of the horizontal threads.
    pub horizontal: AxisScan,
    /// Diagnostic images.
    pub images: ThreadImages,
}

impl CountResult {
    /// Scan for one axis.
    #[must_use]
    pub const fn scan(&self, axis: Axis) -> &AxisScan {
        match axis {
            Axis::Horizontal => &self.horizontal,
            Axis::Vertical => &self.vertical,
        }
    }
}

/// Why an image cannot be analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum InvalidImage {
    /// Width or height is zero.
    #[error("image has zero area")]
    ZeroArea,

    /// The border cropper found no swatch region.
    #[error("no foreground region found inside the border")]
    NoForeground,

    /// The binarized swatch is all thread or all background.
    #[error("binarized swatch holds a single level")]
    SingleLevel,

    /// Every sample line of an axis was empty.
    #[error("no analyzable {0} sample lines")]
    NoAnalyzableSamples(Axis),
}

/// Errors that can occur while counting threads.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The image cannot be analysed. Retrying with the same image
    /// cannot succeed.
    #[error("invalid image: {0}")]
    InvalidImage(#[from] InvalidImage),

    /// Failed to decode the input bytes.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
