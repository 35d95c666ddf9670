//! Threshold sweep: count at several binarization thresholds and keep the
//! densest result.
//!
//! A single global threshold rarely suits every lighting condition. The
//! sweep crops once, then re-runs binarization and everything after it
//! for each candidate threshold.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Clock, NoClock, PipelineDiagnostics};
use crate::pipeline::{self, CountStages};
use crate::types::{
    Count, CountConfig, CountResult, Dimensions, DynamicImage, InvalidImage, PipelineError,
};

/// Named threshold sequences.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdSweep;

impl ThresholdSweep {
    /// 250 down to 100 in steps of 25.
    pub const LEGACY: [u8; 7] = [250, 225, 200, 175, 150, 125, 100];
}

/// Outcome of one threshold in a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepCandidate {
    /// Threshold tried.
    pub threshold: u8,
    /// Counts, or `None` when the threshold was skipped.
    pub count: Option<Count>,
}

/// Result of [`sweep_thresholds`].
#[derive(Debug, Clone)]
pub struct SweepResult {
    /// The candidate with the highest total count.
    pub best: CountResult,
    /// Every threshold tried, in the order given.
    pub candidates: Vec<SweepCandidate>,
}

/// Count at each of `thresholds` and keep the highest total.
///
/// Ties keep the earliest threshold in `thresholds`. Thresholds at which
/// the mask holds a single level, or an axis has no analyzable sample
/// lines, are skipped. `config.threshold` is ignored.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for an empty `thresholds`
/// list or an invalid `config`, any cropping error, and the last
/// skipped threshold's [`InvalidImage`] if no threshold succeeded.
pub fn sweep_thresholds(
    image: &DynamicImage,
    config: &CountConfig,
    thresholds: &[u8],
) -> Result<SweepResult, PipelineError> {
    sweep_thresholds_with_diagnostics(image, config, thresholds, &NoClock).map(|(sweep, _)| sweep)
}

/// [`sweep_thresholds`], also returning the stage diagnostics of the
/// winning threshold.
///
/// The crop stage is shared by every candidate. `total_duration` covers
/// the whole sweep.
///
/// # Errors
///
/// Same as [`sweep_thresholds`].
pub fn sweep_thresholds_with_diagnostics<C: Clock>(
    image: &DynamicImage,
    config: &CountConfig,
    thresholds: &[u8],
    clock: &C,
) -> Result<(SweepResult, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    if thresholds.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "threshold sweep needs at least one threshold".to_string(),
        ));
    }

    let start = clock.now();
    let (cropped, crop) = pipeline::crop_stage(image, config, clock)?;

    let mut best: Option<(CountResult, CountStages)> = None;
    let mut last_error = None;
    let mut candidates = Vec::with_capacity(thresholds.len());

    for &threshold in thresholds {
        match pipeline::count_stages(&cropped.image, threshold, config, clock) {
            Ok((result, stages)) => {
                candidates.push(SweepCandidate {
                    threshold,
                    count: Some(result.count),
                });
                let better = best
                    .as_ref()
                    .is_none_or(|(b, _)| result.count.total() > b.count.total());
                if better {
                    best = Some((result, stages));
                }
            }
            Err(PipelineError::InvalidImage(
                err @ (InvalidImage::NoAnalyzableSamples(_) | InvalidImage::SingleLevel),
            )) => {
                log::debug!("sweep: threshold {threshold} skipped: {err}");
                candidates.push(SweepCandidate {
                    threshold,
                    count: None,
                });
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    let total_duration = clock.elapsed(&start);

    match best {
        Some((best, stages)) => {
            log::info!(
                "sweep: best threshold {} with {} threads",
                best.threshold,
                best.count
            );
            let diagnostics = PipelineDiagnostics::assemble(
                Dimensions::of(image),
                crop,
                stages,
                total_duration,
                &best,
            );
            Ok((SweepResult { best, candidates }, diagnostics))
        }
        None => Err(last_error.map_or_else(
            || PipelineError::InvalidConfig("threshold sweep produced no result".to_string()),
            PipelineError::from,
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Stripes of two darkness levels: 10 px at gray 40 and 10 px at gray
    /// 160, on white. A low threshold only sees the darker set.
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
    fn legacy_sequence() {
        assert_eq!(ThresholdSweep::LEGACY.first(), Some(&250));
        assert_eq!(ThresholdSweep::LEGACY.last(), Some(&100));
        assert!(ThresholdSweep::LEGACY.windows(2).all(|w| w[0] - w[1] == 25));
    }

    #[test]
    fn empty_threshold_list_is_rejected() {
        let err = sweep_thresholds(&two_tone(), &CountConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn best_threshold_sees_both_tones() {
        let sweep = sweep_thresholds(&two_tone(), &CountConfig::default(), &[100, 200]).unwrap();
        assert_eq!(sweep.best.threshold, 200);
        assert_eq!(sweep.best.count.vertical, 10);
        assert_eq!(sweep.candidates.len(), 2);
        assert_eq!(sweep.candidates[0].count.map(|c| c.vertical), Some(5));
    }

    #[test]
    fn ties_keep_the_earliest_threshold() {
        let sweep = sweep_thresholds(&two_tone(), &CountConfig::default(), &[200, 180]).unwrap();
        assert_eq!(sweep.best.threshold, 200);
        let sweep = sweep_thresholds(&two_tone(), &CountConfig::default(), &[180, 200]).unwrap();
        assert_eq!(sweep.best.threshold, 180);
    }

    #[test]
    fn thresholds_without_samples_are_skipped() {
        // Nothing is at or below 10, so that threshold yields an all-background mask.
        let sweep = sweep_thresholds(&two_tone(), &CountConfig::default(), &[10, 100]).unwrap();
        assert_eq!(sweep.best.threshold, 100);
        assert_eq!(sweep.candidates[0].count, None);
    }

    #[test]
    fn all_thresholds_failing_returns_last_error() {
        let err = sweep_thresholds(&two_tone(), &CountConfig::default(), &[5, 10]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidImage(InvalidImage::SingleLevel)
        ));
    }

    #[test]
    fn diagnostics_describe_the_winning_threshold() {
        let (sweep, diag) = sweep_thresholds_with_diagnostics(
            &two_tone(),
            &CountConfig::default(),
            &[100, 200],
            &NoClock,
        )
        .unwrap();
        assert_eq!(diag.summary.threshold, 200);
        assert_eq!(diag.summary.vertical, sweep.best.count.vertical);
        assert_eq!(diag.summary.vertical_counts, sweep.best.vertical.counts());
        assert!(matches!(
            diag.binarize.metrics,
            crate::diagnostics::StageMetrics::Binarize { threshold: 200, .. }
        ));
    }

    #[test]
    fn sweep_matches_single_run_at_best_threshold() {
        let config = CountConfig::default();
        let sweep = sweep_thresholds(&two_tone(), &config, &ThresholdSweep::LEGACY).unwrap();
        let single = crate::count_threads(
            &two_tone(),
            &CountConfig {
                threshold: sweep.best.threshold,
                ..config
            },
        )
        .unwrap();
        assert_eq!(single.count, sweep.best.count);
    }
}
