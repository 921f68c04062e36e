//! Independent statistical detectors that vote on each point of a series.
//!
//! ## Architecture
//!
//! Every detector implements [`Detector`] and returns a [`DetectorOutcome`]:
//! either a [`Verdict`] aligned index-for-index with the series, or an
//! abstention carrying the [`FitError`] that stopped it. A detector never
//! fails the request; the engine treats an abstention as an all-false vote.
//!
//! - [`ForecastIntervalDetector`]: piecewise-linear trend with a prediction
//!   interval, flags points outside the interval.
//! - [`SeasonalResidualDetector`]: STL decomposition, flags large residuals.
//! - [`IsolationOutlierDetector`]: isolation forest over the value
//!   distribution, flags the contamination tail.
//!
//! ## Example
//!
//! ```rust
//! use argus_detect::detectors::{Detector, IsolationOutlierDetector};
//! use argus_detect::config::IsolationConfig;
//! use argus_detect::series::ObservedSeries;
//!
//! let mut values = vec![10.0; 30];
//! values[12] = 250.0;
//! let series = ObservedSeries::evenly_spaced(0, 60, values);
//!
//! let detector = IsolationOutlierDetector::new(IsolationConfig::default());
//! let verdict = detector.detect(&series).verdict().cloned().unwrap();
//! assert_eq!(verdict.flagged_indices(), vec![12]);
//! ```

use crate::error::FitError;
use crate::series::ObservedSeries;

mod forecast;
mod isolation;
mod seasonal;
pub mod stl;

pub use forecast::{ForecastIntervalDetector, IntervalFit};
pub use isolation::{IsolationForest, IsolationOutlierDetector};
pub use seasonal::SeasonalResidualDetector;

/// Per-point verdict of one detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    flags: Vec<bool>,
    scores: Option<Vec<f64>>,
}

impl Verdict {
    /// A verdict of booleans only.
    pub fn from_flags(flags: Vec<bool>) -> Self {
        Self {
            flags,
            scores: None,
        }
    }

    /// A verdict with a non-negative anomaly score per point.
    pub fn with_scores(flags: Vec<bool>, scores: Vec<f64>) -> Self {
        Self {
            flags,
            scores: Some(scores),
        }
    }

    /// A verdict flagging nothing.
    pub fn all_clear(len: usize) -> Self {
        Self::from_flags(vec![false; len])
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn is_flagged(&self, index: usize) -> bool {
        self.flags.get(index).copied().unwrap_or(false)
    }

    pub fn score(&self, index: usize) -> Option<f64> {
        self.scores.as_ref().and_then(|s| s.get(index).copied())
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn scores(&self) -> Option<&[f64]> {
        self.scores.as_deref()
    }

    pub fn flagged_count(&self) -> usize {
        self.flags.iter().filter(|f| **f).count()
    }

    pub fn flagged_indices(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.then_some(i))
            .collect()
    }

    /// True when the verdict covers exactly `len` points, scores included.
    pub fn is_aligned(&self, len: usize) -> bool {
        self.flags.len() == len && self.scores.as_ref().map_or(true, |s| s.len() == len)
    }
}

/// What a detector produced for one series.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutcome {
    /// The detector fitted and voted on every point.
    Voted(Verdict),
    /// The detector could not fit; it votes false everywhere.
    Abstained(FitError),
}

impl DetectorOutcome {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            DetectorOutcome::Voted(v) => Some(v),
            DetectorOutcome::Abstained(_) => None,
        }
    }

    pub fn is_abstained(&self) -> bool {
        matches!(self, DetectorOutcome::Abstained(_))
    }

    pub fn is_flagged(&self, index: usize) -> bool {
        self.verdict().is_some_and(|v| v.is_flagged(index))
    }

    pub fn score(&self, index: usize) -> Option<f64> {
        self.verdict().and_then(|v| v.score(index))
    }

    pub fn abstain_reason(&self) -> Option<&FitError> {
        match self {
            DetectorOutcome::Voted(_) => None,
            DetectorOutcome::Abstained(e) => Some(e),
        }
    }
}

impl From<Result<Verdict, FitError>> for DetectorOutcome {
    fn from(result: Result<Verdict, FitError>) -> Self {
        match result {
            Ok(verdict) => DetectorOutcome::Voted(verdict),
            Err(e) => DetectorOutcome::Abstained(e),
        }
    }
}

/// A statistical detector voting on every point of a series.
///
/// Implementations are stateless between calls: each call fits a fresh model
/// on the series it is given.
pub trait Detector: Send + Sync {
    /// Runs the detector over the whole series.
    fn detect(&self, series: &ObservedSeries) -> DetectorOutcome;

    /// Returns the name of this detector.
    fn name(&self) -> &str;

    /// Returns a description of this detector.
    fn description(&self) -> &str;
}

/// Returns the index of the first non-finite value, if any.
pub(crate) fn first_non_finite(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_finite())
}
