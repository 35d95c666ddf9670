//! Aggregation: reduce per-sample crossing counts to one count per axis.
//!
//! This module defines the [`Aggregator`] trait and the
//! [`AggregationKind`] enum for selecting a strategy at runtime.
//!
//! A sample line that passes through a gap between threads can only
//! undercount, which is why [`Max`](AggregationKind::Max) is the default.
//! [`ModeOrMedian`](AggregationKind::ModeOrMedian) is the statistics-based
//! reduction used with sparse sampling grids.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which element of an even-length sorted list is taken as the median.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MedianIndex {
    /// Index `n/2 + 1`.
    ///
    /// For a zero-based list this skips the upper median and runs past
    /// the end when `n == 2`; in that case the smallest candidate is
    /// returned. Kept as the default until the intended tie-break is
    /// confirmed.
    #[default]
    Legacy,
    /// Index `n/2`, the upper median.
    Upper,
}

impl MedianIndex {
    const fn even(self, n: usize) -> usize {
        match self {
            Self::Legacy => n / 2 + 1,
            Self::Upper => n / 2,
        }
    }
}

/// Selects how per-sample counts are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AggregationKind {
    /// The largest per-sample count.
    #[default]
    Max,

    /// The unique mode when one exists, otherwise a median.
    ///
    /// When several values share the highest frequency (> 1), the median
    /// of those modes is taken; when no value repeats, the median of all
    /// counts. Ties on even-length lists follow `median_index`.
    ModeOrMedian {
        /// Even-length median convention.
        median_index: MedianIndex,
    },
}

/// Trait for aggregation strategies.
pub trait Aggregator {
    /// Combine per-sample counts. Returns `None` for an empty slice.
    fn aggregate(&self, counts: &[u32]) -> Option<u32>;
}

impl Aggregator for AggregationKind {
    fn aggregate(&self, counts: &[u32]) -> Option<u32> {
        match *self {
            Self::Max => counts.iter().copied().max(),
            Self::ModeOrMedian { median_index } => mode_or_median(counts, median_index),
        }
    }
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Max => write!(f, "max"),
            Self::ModeOrMedian {
                median_index: MedianIndex::Legacy,
            } => write!(f, "mode-or-median (legacy index)"),
            Self::ModeOrMedian {
                median_index: MedianIndex::Upper,
            } => write!(f, "mode-or-median (upper median)"),
        }
    }
}

fn mode_or_median(counts: &[u32], median_index: MedianIndex) -> Option<u32> {
    let mut frequency: BTreeMap<u32, usize> = BTreeMap::new();
    for &count in counts {
        *frequency.entry(count).or_default() += 1;
    }

    let max_frequency = frequency.values().copied().max()?;
    let modes: Vec<u32> = frequency
        .iter()
        .filter(|&(_, &f)| f == max_frequency)
        .map(|(&value, _)| value)
        .collect();

    if max_frequency > 1 && modes.len() == 1 {
        return modes.first().copied();
    }

    // BTreeMap keys are already ascending; the all-distinct case needs a sort.
    let mut candidates = if max_frequency > 1 {
        modes
    } else {
        counts.to_vec()
    };
    candidates.sort_unstable();

    let n = candidates.len();
    let index = if n % 2 == 0 {
        median_index.even(n)
    } else {
        n / 2
    };
    candidates.get(index).or_else(|| candidates.first()).copied()
}
