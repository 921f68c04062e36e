//! The observed series and the length check that gates every detection.

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Minimum series length when the isolation detector runs alone.
pub const SINGLE_MODE_MIN_POINTS: usize = 10;

/// Minimum series length when all three detectors vote.
pub const ENSEMBLE_MODE_MIN_POINTS: usize = 20;

/// An ordered univariate series of `(timestamp, value)` observations.
///
/// Timestamps are epoch seconds. The order is taken as given; the series is
/// never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedSeries {
    timestamps: Vec<i64>,
    values: Vec<f64>,
}

impl ObservedSeries {
    /// Creates a series from aligned timestamp and value sequences.
    ///
    /// # Errors
    /// Returns [`DetectionError::InvalidSeries`] when the lengths differ.
    pub fn new(timestamps: Vec<i64>, values: Vec<f64>) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(DetectionError::InvalidSeries(format!(
                "timestamps has {} entries but values has {}",
                timestamps.len(),
                values.len()
            )));
        }
        Ok(Self { timestamps, values })
    }

    /// Creates a series whose timestamps start at `start` and advance by `step` seconds.
    pub fn evenly_spaced(start: i64, step: i64, values: Vec<f64>) -> Self {
        let timestamps = (0..values.len() as i64).map(|i| start + i * step).collect();
        Self { timestamps, values }
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(timestamp, value)` pairs in series order.
    pub fn points(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }
}

/// Rejects series that are too short for the active detection mode.
///
/// No other screening happens here; NaN or infinite values are left to the
/// detectors, which abstain on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesValidator {
    min_points: usize,
}

impl SeriesValidator {
    pub fn new(min_points: usize) -> Self {
        Self { min_points }
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    /// Checks a raw value count against the minimum.
    pub fn check_len(&self, len: usize) -> Result<()> {
        if len < self.min_points {
            return Err(DetectionError::insufficient_data(self.min_points, len));
        }
        Ok(())
    }

    /// Checks a series against the minimum.
    pub fn validate(&self, series: &ObservedSeries) -> Result<()> {
        self.check_len(series.len())
    }
}
