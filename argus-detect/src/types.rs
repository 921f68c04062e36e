//! Request, record and result types exchanged with the detection engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point the ensemble judged anomalous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Epoch seconds of the flagged observation.
    pub timestamp: i64,

    /// The observed value.
    pub value: f64,

    /// Confidence, non-negative, higher is more anomalous.
    pub score: f64,

    /// Names of the detectors that flagged this point.
    pub methods: Vec<String>,
}

impl AnomalyRecord {
    pub fn new(timestamp: i64, value: f64, score: f64, methods: Vec<String>) -> Self {
        Self {
            timestamp,
            value,
            score,
            methods,
        }
    }

    /// Severity bucket for alerting on this record.
    pub fn severity(&self) -> Severity {
        Severity::from_score(self.score)
    }
}

/// Alert severity derived from an anomaly score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Buckets a score: critical from 0.8, high from 0.65, medium from 0.5.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Severity::Critical
        } else if score >= 0.65 {
            Severity::High
        } else if score >= 0.5 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detection request as handed over by the request boundary.
///
/// `metric_id` and `metric_name` are passed through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionRequest {
    #[serde(default)]
    pub metric_id: serde_json::Value,

    #[serde(default)]
    pub metric_name: Option<String>,

    #[serde(default)]
    pub timestamps: Vec<i64>,

    #[serde(default)]
    pub values: Vec<f64>,
}

impl DetectionRequest {
    pub fn new(metric_name: impl Into<String>, timestamps: Vec<i64>, values: Vec<f64>) -> Self {
        Self {
            metric_id: serde_json::Value::Null,
            metric_name: Some(metric_name.into()),
            timestamps,
            values,
        }
    }

    pub fn with_metric_id(mut self, id: impl Into<serde_json::Value>) -> Self {
        self.metric_id = id.into();
        self
    }
}

/// Whether a detector took part in the vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorStatus {
    Voted,
    Abstained,
}

/// Per-detector outcome summary attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSummary {
    /// Method name the detector votes under.
    pub method: String,

    pub status: DetectorStatus,

    /// Points this detector flagged on its own.
    pub flagged: usize,

    /// Why the detector abstained, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The outcome of one detection request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub metric_id: serde_json::Value,
    pub metric_name: Option<String>,
    pub anomalies: Vec<AnomalyRecord>,
    pub total_points: usize,
    pub anomaly_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detectors: Vec<DetectorSummary>,
}

impl DetectionResult {
    /// Anomalies grouped by severity, most severe first.
    pub fn by_severity(&self) -> Vec<(Severity, Vec<&AnomalyRecord>)> {
        let mut buckets: Vec<(Severity, Vec<&AnomalyRecord>)> = [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ]
        .into_iter()
        .map(|s| (s, Vec::new()))
        .collect();

        for record in &self.anomalies {
            let severity = record.severity();
            if let Some((_, bucket)) = buckets.iter_mut().find(|(s, _)| *s == severity) {
                bucket.push(record);
            }
        }

        buckets.retain(|(_, records)| !records.is_empty());
        buckets
    }

    /// Summaries of detectors that abstained.
    pub fn abstentions(&self) -> impl Iterator<Item = &DetectorSummary> {
        self.detectors
            .iter()
            .filter(|d| d.status == DetectorStatus::Abstained)
    }
}
