//! hibla-pipeline: Fabric thread counting from swatch photographs (sans-IO).
//!
//! Counts the vertical and horizontal threads visible in a photo of a
//! woven swatch through:
//! border crop -> grayscale -> binarize -> line isolation (per axis) ->
//! line scanning -> aggregation -> annotation.
//!
//! The counts can then be graded against the declared warp and weft
//! materials with [`classify::classify`].
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices and returns structured data. Reading files and
//! writing the diagnostic images lives in `hibla-count`.

pub mod aggregate;
pub mod annotate;
pub mod binarize;
pub mod classify;
pub mod crop;
pub mod diagnostics;
pub mod grayscale;
pub mod isolate;
mod pipeline;
pub mod scan;
pub mod sweep;
pub mod types;

pub use aggregate::{AggregationKind, Aggregator, MedianIndex};
pub use classify::{Classification, Grade, Material, MaterialSelection, SubGrade, classify};
pub use diagnostics::{Clock, NoClock, PipelineDiagnostics, count_threads_with_diagnostics};
pub use sweep::{SweepResult, ThresholdSweep, sweep_thresholds, sweep_thresholds_with_diagnostics};
pub use types::{
    Axis, Count, CountConfig, CountResult, Dimensions, InvalidImage, PipelineError, Polarity,
    WidthRange,
};

use types::DynamicImage;

/// Count the threads of a swatch image.
///
/// # Pipeline steps
///
/// 1. Crop the outer dark border
/// 2. Grayscale conversion and optional contrast gain
/// 3. Global binarization (threads become foreground)
/// 4. Morphological opening per axis to isolate thread lines
/// 5. Scan evenly spaced sample lines for crossings
/// 6. Aggregate per-sample counts into one count per axis
/// 7. Annotate the detected crossings
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation,
/// and [`PipelineError::InvalidImage`] if the image has zero area, holds
/// no foreground inside its border, binarizes to a single level, or has
/// an axis whose sample lines are all empty.
pub fn count_threads(
    image: &DynamicImage,
    config: &CountConfig,
) -> Result<CountResult, PipelineError> {
    count_threads_with_diagnostics(image, config, &NoClock).map(|(result, _)| result)
}

/// Decode image bytes and count their threads.
///
/// Accepts PNG, JPEG, BMP, and WebP.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::ImageDecode`] if the format is unrecognized, and any
/// error of [`count_threads`].
pub fn count_threads_from_bytes(
    image_bytes: &[u8],
    config: &CountConfig,
) -> Result<CountResult, PipelineError> {
    let image = grayscale::decode(image_bytes)?;
    count_threads(&image, config)
}
