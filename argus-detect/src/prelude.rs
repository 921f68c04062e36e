//! Prelude for commonly used types and traits in argus-detect.

pub use crate::config::{DetectionConfig, DetectionMode, DetectorKind, Scoring, VoterConfig};
pub use crate::detectors::{Detector, DetectorOutcome, Verdict};
pub use crate::engine::AnomalyEngine;
pub use crate::error::{DetectionError, FitError, Result};
pub use crate::formatters::{FormatterConfig, ResultFormatter};
pub use crate::series::ObservedSeries;
pub use crate::types::{AnomalyRecord, DetectionRequest, DetectionResult, Severity};
