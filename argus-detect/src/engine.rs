//! The detection engine: validation, detector fan-out and aggregation.
//!
//! ```rust,no_run
//! use argus_detect::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let engine = AnomalyEngine::new(DetectionConfig::ensemble())?;
//!
//! let mut values = vec![10.0; 30];
//! values[12] = 250.0;
//! let timestamps = (0..30).map(|i| 1_700_000_000 + i * 60).collect();
//!
//! let result = engine
//!     .detect(DetectionRequest::new("cpu_usage", timestamps, values))
//!     .await?;
//! for anomaly in &result.anomalies {
//!     println!("{} {} {:?}", anomaly.timestamp, anomaly.score, anomaly.methods);
//! }
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::config::{DetectionConfig, DetectionMode, DetectorKind};
use crate::detectors::{
    Detector, DetectorOutcome, ForecastIntervalDetector, IsolationOutlierDetector,
    SeasonalResidualDetector,
};
use crate::ensemble::{Ballot, EnsembleAggregator};
use crate::error::{DetectionError, FitError, Result};
use crate::logging::truncate_field;
use crate::series::{ObservedSeries, SeriesValidator};
use crate::types::{
    AnomalyRecord, DetectionRequest, DetectionResult, DetectorStatus, DetectorSummary,
};

/// A detector together with the name and weight it votes under.
#[derive(Clone)]
struct Voter {
    method: String,
    weight: f64,
    detector: Arc<dyn Detector>,
}

impl std::fmt::Debug for Voter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voter")
            .field("method", &self.method)
            .field("weight", &self.weight)
            .field("detector", &self.detector.name())
            .finish()
    }
}

/// Runs the configured detectors over a series and aggregates their votes.
///
/// The engine holds no per-request state and can be shared across tasks
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AnomalyEngine {
    config: DetectionConfig,
    validator: SeriesValidator,
    aggregator: EnsembleAggregator,
    voters: Vec<Voter>,
}

impl AnomalyEngine {
    /// Creates an engine with the built-in detectors named in `config`.
    pub fn new(config: DetectionConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Creates an engine with the preset for `mode`.
    pub fn for_mode(mode: DetectionMode) -> Result<Self> {
        Self::new(DetectionConfig::for_mode(mode))
    }

    /// Creates a new builder for the engine.
    pub fn builder() -> AnomalyEngineBuilder {
        AnomalyEngineBuilder::default()
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn mode(&self) -> DetectionMode {
        self.config.mode
    }

    pub fn min_points(&self) -> usize {
        self.validator.min_points()
    }

    /// Method names in voting order.
    pub fn methods(&self) -> Vec<&str> {
        self.voters.iter().map(|v| v.method.as_str()).collect()
    }

    /// Detects anomalies for one request.
    ///
    /// Detectors run on the blocking thread pool. A detector that fails,
    /// panics or misses the configured deadline abstains; it never fails the
    /// request.
    ///
    /// # Errors
    /// - [`DetectionError::InsufficientData`] when the series is shorter than
    ///   the mode minimum.
    /// - [`DetectionError::InvalidSeries`] when timestamps and values differ
    ///   in length.
    /// - [`DetectionError::DetectionFailure`] when a detector returns a
    ///   verdict that does not cover the series.
    #[instrument(
        skip(self, request),
        fields(
            metric = %request.metric_id,
            name = %truncate_field(request.metric_name.as_deref().unwrap_or_default(), 128),
            points = request.values.len()
        )
    )]
    pub async fn detect(&self, request: DetectionRequest) -> Result<DetectionResult> {
        let DetectionRequest {
            metric_id,
            metric_name,
            timestamps,
            values,
        } = request;

        self.validator.check_len(values.len())?;
        let series = Arc::new(ObservedSeries::new(timestamps, values)?);

        let timeout = self.config.detector_timeout();
        let outcomes = if self.config.parallel {
            join_all(self.voters.iter().map(|voter| {
                run_voter(Arc::clone(&voter.detector), Arc::clone(&series), timeout)
            }))
            .await
        } else {
            let mut outcomes = Vec::with_capacity(self.voters.len());
            for voter in &self.voters {
                outcomes.push(
                    run_voter(Arc::clone(&voter.detector), Arc::clone(&series), timeout).await,
                );
            }
            outcomes
        };

        let (anomalies, detectors) = self.tally(&series, &outcomes)?;

        info!(
            metric = %metric_id,
            total = series.len(),
            count = anomalies.len(),
            "Detected {} anomalies",
            anomalies.len()
        );

        Ok(DetectionResult {
            metric_id,
            metric_name,
            anomaly_count: anomalies.len(),
            total_points: series.len(),
            anomalies,
            detectors,
        })
    }

    /// Detects anomalies on the calling thread, one detector after another.
    pub fn detect_series(&self, series: &ObservedSeries) -> Result<Vec<AnomalyRecord>> {
        self.validator.validate(series)?;

        let outcomes: Vec<DetectorOutcome> = self
            .voters
            .iter()
            .map(|voter| {
                catch_unwind(AssertUnwindSafe(|| voter.detector.detect(series))).unwrap_or_else(
                    |payload| DetectorOutcome::Abstained(FitError::Panicked(panic_message(payload))),
                )
            })
            .collect();

        let (anomalies, _) = self.tally(series, &outcomes)?;
        Ok(anomalies)
    }

    /// Checks every verdict against the series, logs abstentions and runs
    /// the aggregator.
    fn tally(
        &self,
        series: &ObservedSeries,
        outcomes: &[DetectorOutcome],
    ) -> Result<(Vec<AnomalyRecord>, Vec<DetectorSummary>)> {
        let mut summaries = Vec::with_capacity(outcomes.len());

        for (voter, outcome) in self.voters.iter().zip(outcomes) {
            match outcome {
                DetectorOutcome::Voted(verdict) => {
                    if !verdict.is_aligned(series.len()) {
                        return Err(DetectionError::failure(format!(
                            "detector '{}' returned {} flags for {} points",
                            voter.method,
                            verdict.len(),
                            series.len()
                        )));
                    }
                    debug!(
                        detector = voter.detector.name(),
                        method = %voter.method,
                        flagged = verdict.flagged_count(),
                        "Detector voted"
                    );
                    summaries.push(DetectorSummary {
                        method: voter.method.clone(),
                        status: DetectorStatus::Voted,
                        flagged: verdict.flagged_count(),
                        reason: None,
                    });
                }
                DetectorOutcome::Abstained(reason) => {
                    if reason.is_expected() {
                        debug!(
                            detector = voter.detector.name(),
                            reason = %reason,
                            "Detector abstained"
                        );
                    } else {
                        warn!(
                            detector = voter.detector.name(),
                            error = %reason,
                            "Detector abstained"
                        );
                    }
                    summaries.push(DetectorSummary {
                        method: voter.method.clone(),
                        status: DetectorStatus::Abstained,
                        flagged: 0,
                        reason: Some(reason.to_string()),
                    });
                }
            }
        }

        let ballots: Vec<Ballot<'_>> = self
            .voters
            .iter()
            .zip(outcomes)
            .map(|(voter, outcome)| Ballot::new(&voter.method, voter.weight, outcome))
            .collect();

        Ok((self.aggregator.aggregate(series, &ballots), summaries))
    }
}

/// Runs one detector on the blocking pool.
///
/// A timeout abandons the detector rather than cancelling it: the blocking
/// task runs to completion in the background and holds its pool thread until
/// then, but its verdict is discarded and the request proceeds without it.
async fn run_voter(
    detector: Arc<dyn Detector>,
    series: Arc<ObservedSeries>,
    timeout: Option<Duration>,
) -> DetectorOutcome {
    let task = tokio::task::spawn_blocking(move || detector.detect(&series));

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => return DetectorOutcome::Abstained(FitError::TimedOut(limit.as_millis())),
        },
        None => task.await,
    };

    joined.unwrap_or_else(|e| {
        let message = if e.is_panic() {
            panic_message(e.into_panic())
        } else {
            e.to_string()
        };
        DetectorOutcome::Abstained(FitError::Panicked(message))
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Builder for [`AnomalyEngine`].
#[derive(Default)]
pub struct AnomalyEngineBuilder {
    config: Option<DetectionConfig>,
    custom: Vec<Voter>,
}

impl AnomalyEngineBuilder {
    /// Sets the configuration. Defaults to the ensemble preset.
    pub fn config(mut self, config: DetectionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a detector that votes alongside the configured ones.
    ///
    /// # Arguments
    /// * `method` - Name recorded in `methods` when this detector flags a point
    /// * `weight` - Weight of its vote
    /// * `detector` - The detector to run
    pub fn add_detector(
        mut self,
        method: impl Into<String>,
        weight: f64,
        detector: Arc<dyn Detector>,
    ) -> Self {
        self.custom.push(Voter {
            method: method.into(),
            weight,
            detector,
        });
        self
    }

    /// Builds the engine, validating the configuration.
    pub fn build(self) -> Result<AnomalyEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let mut voters: Vec<Voter> = config
            .voters
            .iter()
            .map(|vc| Voter {
                method: vc.method.clone(),
                weight: vc.weight,
                detector: builtin(vc.detector, &config),
            })
            .collect();

        for voter in self.custom {
            if !voter.weight.is_finite() || voter.weight < 0.0 {
                return Err(DetectionError::invalid_config(format!(
                    "weight of '{}' must be finite and non-negative, got: {}",
                    voter.method, voter.weight
                )));
            }
            if voter.method.is_empty() {
                return Err(DetectionError::invalid_config("voter method name is empty"));
            }
            voters.push(voter);
        }

        for (i, voter) in voters.iter().enumerate() {
            if voters[..i].iter().any(|v| v.method == voter.method) {
                return Err(DetectionError::invalid_config(format!(
                    "method '{}' is used by more than one detector",
                    voter.method
                )));
            }
        }

        debug!(
            mode = %config.mode,
            voters = voters.len(),
            threshold = config.threshold,
            "Built detection engine"
        );

        Ok(AnomalyEngine {
            validator: SeriesValidator::new(config.min_points),
            aggregator: EnsembleAggregator::new(config.threshold, config.scoring),
            voters,
            config,
        })
    }
}

fn builtin(kind: DetectorKind, config: &DetectionConfig) -> Arc<dyn Detector> {
    match kind {
        DetectorKind::Forecast => Arc::new(ForecastIntervalDetector::new(config.forecast.clone())),
        DetectorKind::Seasonal => Arc::new(SeasonalResidualDetector::new(config.seasonal.clone())),
        DetectorKind::Isolation => {
            Arc::new(IsolationOutlierDetector::new(config.isolation.clone()))
        }
    }
}
