//! Configuration for the detection engine and its detectors.
//!
//! Every knob travels inside [`DetectionConfig`], which is handed to the engine
//! at construction. Nothing here is process-wide.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{DetectionError, Result};
use crate::series::{ENSEMBLE_MODE_MIN_POINTS, SINGLE_MODE_MIN_POINTS};

/// The built-in detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Forecast,
    Seasonal,
    Isolation,
}

impl DetectorKind {
    /// Method name the detector votes under in ensemble mode.
    pub fn method_name(&self) -> &'static str {
        match self {
            DetectorKind::Forecast => "forecast",
            DetectorKind::Seasonal => "seasonal",
            DetectorKind::Isolation => "isolation",
        }
    }
}

/// Which detector set runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Isolation forest alone.
    Single,
    /// Forecast, seasonal and isolation detectors with weighted voting.
    #[default]
    Ensemble,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Single => f.write_str("single"),
            DetectionMode::Ensemble => f.write_str("ensemble"),
        }
    }
}

impl FromStr for DetectionMode {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "isolation" => Ok(DetectionMode::Single),
            "ensemble" => Ok(DetectionMode::Ensemble),
            other => Err(DetectionError::invalid_config(format!(
                "unknown detection mode '{other}', expected 'single' or 'ensemble'"
            ))),
        }
    }
}

/// How the score of an emitted record is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Sum of the weights of every detector that flagged the point.
    CombinedWeight,
    /// The strongest per-point score reported by a flagging detector.
    DetectorScore,
}

/// One weighted vote in the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterConfig {
    pub detector: DetectorKind,
    pub method: String,
    pub weight: f64,
}

impl VoterConfig {
    pub fn new(detector: DetectorKind, weight: f64) -> Self {
        Self {
            detector,
            method: detector.method_name().to_string(),
            weight,
        }
    }

    /// Overrides the method name reported in anomaly records.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }
}

/// Settings for the forecast-interval detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Width of the prediction interval, e.g. 0.95.
    pub interval_width: f64,
    /// Upper bound on potential trend changepoints.
    pub n_changepoints: usize,
    /// Leading fraction of the series in which changepoints may sit.
    pub changepoint_range: f64,
    /// Prior scale on changepoint slope adjustments; smaller is stiffer.
    pub changepoint_prior_scale: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            interval_width: 0.95,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
        }
    }
}

/// Settings for the seasonal-residual detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    /// Seasonal period in observations.
    pub period: usize,
    /// Below this length the detector abstains without decomposing.
    pub min_points: usize,
    /// Residuals beyond this many standard deviations are flagged.
    pub sigma_multiplier: f64,
    /// Enables robustness reweighting between decomposition passes.
    pub robust: bool,
    /// Span of the seasonal smoother, odd and at least 3.
    pub seasonal_smoother: usize,
    /// Passes of the inner loop; 2 when robust, 5 otherwise if unset.
    pub inner_iterations: Option<usize>,
    /// Robustness passes; 15 when robust, 0 otherwise if unset.
    pub outer_iterations: Option<usize>,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            period: 13,
            min_points: 24,
            sigma_multiplier: 2.5,
            robust: true,
            seasonal_smoother: 7,
            inner_iterations: None,
            outer_iterations: None,
        }
    }
}

/// Settings for the isolation-forest detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    pub n_estimators: usize,
    /// Subsample size per tree, capped at the series length.
    pub max_samples: usize,
    /// Expected outlier fraction.
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

/// Full configuration of a detection engine.
///
/// When deserialized, fields left out of the document are taken from the
/// preset of the document's `mode` (ensemble when `mode` is absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigDocument")]
pub struct DetectionConfig {
    pub mode: DetectionMode,
    pub min_points: usize,
    /// Combined weight a point needs to be reported.
    pub threshold: f64,
    pub scoring: Scoring,
    pub voters: Vec<VoterConfig>,
    pub forecast: ForecastConfig,
    pub seasonal: SeasonalConfig,
    pub isolation: IsolationConfig,
    /// Deadline per detector; a detector that misses it abstains.
    pub detector_timeout_ms: Option<u64>,
    /// Run detectors concurrently on the blocking pool.
    pub parallel: bool,
}

/// A configuration document as written: every field optional.
#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    mode: DetectionMode,
    min_points: Option<usize>,
    threshold: Option<f64>,
    scoring: Option<Scoring>,
    voters: Option<Vec<VoterConfig>>,
    forecast: Option<ForecastConfig>,
    seasonal: Option<SeasonalConfig>,
    isolation: Option<IsolationConfig>,
    detector_timeout_ms: Option<u64>,
    parallel: Option<bool>,
}

impl From<ConfigDocument> for DetectionConfig {
    fn from(doc: ConfigDocument) -> Self {
        let preset = DetectionConfig::for_mode(doc.mode);
        Self {
            mode: doc.mode,
            min_points: doc.min_points.unwrap_or(preset.min_points),
            threshold: doc.threshold.unwrap_or(preset.threshold),
            scoring: doc.scoring.unwrap_or(preset.scoring),
            voters: doc.voters.unwrap_or(preset.voters),
            forecast: doc.forecast.unwrap_or(preset.forecast),
            seasonal: doc.seasonal.unwrap_or(preset.seasonal),
            isolation: doc.isolation.unwrap_or(preset.isolation),
            detector_timeout_ms: doc.detector_timeout_ms.or(preset.detector_timeout_ms),
            parallel: doc.parallel.unwrap_or(preset.parallel),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self::ensemble()
    }
}

impl DetectionConfig {
    /// Three-way weighted vote: forecast 0.4, seasonal 0.3, isolation 0.3,
    /// threshold 0.6. No single detector can reach the threshold alone.
    pub fn ensemble() -> Self {
        Self {
            mode: DetectionMode::Ensemble,
            min_points: ENSEMBLE_MODE_MIN_POINTS,
            threshold: 0.6,
            scoring: Scoring::CombinedWeight,
            voters: vec![
                VoterConfig::new(DetectorKind::Forecast, 0.4),
                VoterConfig::new(DetectorKind::Seasonal, 0.3),
                VoterConfig::new(DetectorKind::Isolation, 0.3),
            ],
            forecast: ForecastConfig::default(),
            seasonal: SeasonalConfig::default(),
            isolation: IsolationConfig::default(),
            detector_timeout_ms: None,
            parallel: true,
        }
    }

    /// Isolation forest alone; its verdict is the final answer and records
    /// carry its absolute sample score.
    pub fn single_detector() -> Self {
        Self {
            mode: DetectionMode::Single,
            min_points: SINGLE_MODE_MIN_POINTS,
            threshold: 1.0,
            scoring: Scoring::DetectorScore,
            voters: vec![
                VoterConfig::new(DetectorKind::Isolation, 1.0).with_method("isolation_forest")
            ],
            parallel: false,
            ..Self::ensemble()
        }
    }

    pub fn for_mode(mode: DetectionMode) -> Self {
        match mode {
            DetectionMode::Single => Self::single_detector(),
            DetectionMode::Ensemble => Self::ensemble(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    pub fn with_voters(mut self, voters: Vec<VoterConfig>) -> Self {
        self.voters = voters;
        self
    }

    pub fn with_detector_timeout(mut self, timeout: Duration) -> Self {
        self.detector_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_isolation(mut self, isolation: IsolationConfig) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn with_seasonal(mut self, seasonal: SeasonalConfig) -> Self {
        self.seasonal = seasonal;
        self
    }

    pub fn with_forecast(mut self, forecast: ForecastConfig) -> Self {
        self.forecast = forecast;
        self
    }

    pub fn detector_timeout(&self) -> Option<Duration> {
        self.detector_timeout_ms.map(Duration::from_millis)
    }

    /// Loads a configuration from a JSON document. Missing fields take the
    /// defaults of the document's mode.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every parameter for range errors.
    pub fn validate(&self) -> Result<()> {
        if self.voters.is_empty() {
            return Err(DetectionError::invalid_config("at least one voter is required"));
        }
        for (i, voter) in self.voters.iter().enumerate() {
            check_non_negative(voter.weight, &format!("weight of '{}'", voter.method))?;
            if voter.method.is_empty() {
                return Err(DetectionError::invalid_config("voter method name is empty"));
            }
            if self.voters[..i].iter().any(|v| v.detector == voter.detector) {
                return Err(DetectionError::invalid_config(format!(
                    "detector {:?} is listed more than once",
                    voter.detector
                )));
            }
        }
        check_non_negative(self.threshold, "threshold")?;

        let f = &self.forecast;
        check_open_unit(f.interval_width, "forecast.interval_width")?;
        if !(f.changepoint_range > 0.0 && f.changepoint_range <= 1.0) {
            return Err(DetectionError::invalid_config(format!(
                "forecast.changepoint_range must be in (0, 1], got {}",
                f.changepoint_range
            )));
        }
        check_positive(f.changepoint_prior_scale, "forecast.changepoint_prior_scale")?;

        let s = &self.seasonal;
        if s.period < 2 {
            return Err(DetectionError::invalid_config(format!(
                "seasonal.period must be at least 2, got {}",
                s.period
            )));
        }
        if s.seasonal_smoother < 3 || s.seasonal_smoother % 2 == 0 {
            return Err(DetectionError::invalid_config(format!(
                "seasonal.seasonal_smoother must be odd and at least 3, got {}",
                s.seasonal_smoother
            )));
        }
        check_positive(s.sigma_multiplier, "seasonal.sigma_multiplier")?;
        if s.inner_iterations == Some(0) {
            return Err(DetectionError::invalid_config(
                "seasonal.inner_iterations must be at least 1",
            ));
        }

        let iso = &self.isolation;
        if iso.n_estimators == 0 || iso.max_samples == 0 {
            return Err(DetectionError::invalid_config(
                "isolation.n_estimators and isolation.max_samples must be positive",
            ));
        }
        if !(iso.contamination > 0.0 && iso.contamination <= 0.5) {
            return Err(DetectionError::invalid_config(format!(
                "isolation.contamination must be in (0, 0.5], got {}",
                iso.contamination
            )));
        }

        Ok(())
    }
}

fn check_non_negative(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DetectionError::invalid_config(format!(
            "{name} must be finite and non-negative, got: {value}"
        )));
    }
    Ok(())
}

fn check_positive(value: f64, name: &str) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DetectionError::invalid_config(format!(
            "{name} must be finite and positive, got: {value}"
        )));
    }
    Ok(())
}

fn check_open_unit(value: f64, name: &str) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        return Err(DetectionError::invalid_config(format!(
            "{name} must be in (0, 1), got: {value}"
        )));
    }
    Ok(())
}
