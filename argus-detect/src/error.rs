//! Error types for the argus anomaly detection engine.
//!
//! Two layers of errors exist. [`DetectionError`] is what a caller of the
//! engine can observe: bad input, bad configuration, or a fault in the
//! aggregation path. [`FitError`] is what a single detector produces when its
//! model cannot be fitted; it never leaves the engine and is downgraded to an
//! abstention instead.

use thiserror::Error;

/// The main error type returned by the detection engine.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// The series is shorter than the active mode requires.
    #[error("Need at least {required} data points")]
    InsufficientData {
        /// Minimum number of points for the active mode
        required: usize,
        /// Number of points that were supplied
        actual: usize,
    },

    /// The timestamps and values of a series are not aligned.
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    /// Weights, thresholds or detector parameters are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A fault in validation or aggregation itself.
    #[error("Detection failed: {0}")]
    DetectionFailure(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A type alias for `Result<T, DetectionError>`.
pub type Result<T> = std::result::Result<T, DetectionError>;

impl DetectionError {
    /// Creates an insufficient data error.
    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    /// Creates an invalid configuration error with the given message.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a detection failure with the given message.
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::DetectionFailure(msg.into())
    }

    /// Returns true when the caller can correct the error by changing its input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::InvalidSeries(_)
        )
    }
}

impl From<serde_json::Error> for DetectionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Reasons a single detector could not produce a verdict.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// The series is shorter than the detector's own minimum.
    #[error("requires at least {required} points, got {actual}")]
    TooShort { required: usize, actual: usize },

    /// A value or timestamp is NaN or infinite.
    #[error("non-finite input at index {index}")]
    NonFinite { index: usize },

    /// The input carries no usable variation for this model.
    #[error("degenerate input: {0}")]
    Degenerate(String),

    /// A numerical step (solve, decomposition) broke down.
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// The detector panicked while fitting.
    #[error("detector panicked: {0}")]
    Panicked(String),

    /// The detector did not finish within the configured deadline.
    #[error("timed out after {0} ms")]
    TimedOut(u128),
}

impl FitError {
    /// Returns true for abstentions that are part of normal operation
    /// rather than a fault worth a warning.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::TooShort { .. })
    }
}

/// Result type for a single detector's fitting step.
pub type FitResult<T> = std::result::Result<T, FitError>;
