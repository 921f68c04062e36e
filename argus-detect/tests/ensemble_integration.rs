//! End-to-end detection scenarios through the public engine API.

use std::sync::Arc;

use argus_detect::detectors::{
    Detector, DetectorOutcome, ForecastIntervalDetector, IsolationOutlierDetector,
    SeasonalResidualDetector, Verdict,
};
use argus_detect::prelude::*;
use argus_detect::types::DetectorStatus;

const START: i64 = 1_700_000_000;

fn request(values: Vec<f64>) -> DetectionRequest {
    let timestamps = (0..values.len() as i64).map(|i| START + i * 60).collect();
    DetectionRequest::new("cpu_usage", timestamps, values).with_metric_id(7)
}

fn spike_series(len: usize, at: usize) -> Vec<f64> {
    let mut values = vec![10.0; len];
    values[at] = 250.0;
    values
}

/// Daily-like pattern with period 13, mild trend and deterministic jitter.
fn seasonal_series(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * (i % 13) as f64 / 13.0;
            let jitter = (((i * 7919) % 17) as f64 - 8.0) * 0.05;
            50.0 + 0.02 * i as f64 + 6.0 * phase.sin() + jitter
        })
        .collect()
}

#[tokio::test]
async fn test_constant_series_with_spike() {
    let engine = AnomalyEngine::new(DetectionConfig::ensemble()).unwrap();
    let result = engine.detect(request(spike_series(30, 12))).await.unwrap();

    assert_eq!(result.anomaly_count, 1);
    assert_eq!(result.anomalies.len(), 1);
    let record = &result.anomalies[0];
    assert_eq!(record.timestamp, START + 12 * 60);
    assert_eq!(record.value, 250.0);
    assert!(record.methods.contains(&"isolation".to_string()));
    assert!(record.score >= 0.6 && record.score <= 1.0 + 1e-9);
    assert_eq!(result.metric_id, serde_json::json!(7));
    assert_eq!(result.metric_name.as_deref(), Some("cpu_usage"));
}

#[tokio::test]
async fn test_flat_series_has_no_anomalies() {
    let engine = AnomalyEngine::new(DetectionConfig::ensemble()).unwrap();
    let result = engine.detect(request(vec![42.0; 25])).await.unwrap();

    assert_eq!(result.anomaly_count, 0);
    assert!(result.anomalies.is_empty());
    assert_eq!(result.total_points, 25);
}

#[tokio::test]
async fn test_minimum_lengths_per_mode() {
    let ensemble = AnomalyEngine::for_mode(DetectionMode::Ensemble).unwrap();
    let err = ensemble.detect(request(vec![1.0; 19])).await.unwrap_err();
    assert!(matches!(
        err,
        DetectionError::InsufficientData {
            required: 20,
            actual: 19
        }
    ));
    assert!(ensemble.detect(request(vec![1.0; 20])).await.is_ok());

    let single = AnomalyEngine::for_mode(DetectionMode::Single).unwrap();
    let err = single.detect(request(vec![1.0; 9])).await.unwrap_err();
    assert_eq!(err.to_string(), "Need at least 10 data points");
    assert!(single.detect(request(vec![1.0; 10])).await.is_ok());
}

#[tokio::test]
async fn test_single_mode_flags_extreme_finite_values() {
    let engine = AnomalyEngine::for_mode(DetectionMode::Single).unwrap();
    let mut values = vec![1.0; 20];
    values.insert(5, 1.7e308);
    values.insert(12, -1.7e308);

    let result = engine.detect(request(values)).await.unwrap();
    let flagged: Vec<i64> = result.anomalies.iter().map(|a| a.timestamp).collect();
    assert_eq!(flagged, vec![START + 5 * 60, START + 12 * 60]);
    assert!(result.abstentions().next().is_none());
}

#[tokio::test]
async fn test_single_mode_reports_isolation_forest() {
    let engine = AnomalyEngine::for_mode(DetectionMode::Single).unwrap();
    let result = engine.detect(request(spike_series(15, 4))).await.unwrap();

    assert_eq!(result.anomaly_count, 1);
    let record = &result.anomalies[0];
    assert_eq!(record.methods, vec!["isolation_forest"]);
    assert_eq!(record.timestamp, START + 4 * 60);
    // absolute isolation score, not a vote weight
    assert!(record.score > 0.5 && record.score <= 1.0);
}

#[tokio::test]
async fn test_short_series_seasonal_abstains_but_others_vote() {
    let engine = AnomalyEngine::new(DetectionConfig::ensemble()).unwrap();
    let result = engine.detect(request(spike_series(22, 15))).await.unwrap();

    let seasonal = result
        .detectors
        .iter()
        .find(|d| d.method == "seasonal")
        .unwrap();
    assert_eq!(seasonal.status, DetectorStatus::Abstained);
    assert_eq!(result.anomaly_count, 1);
    assert_eq!(result.anomalies[0].methods, vec!["forecast", "isolation"]);
}

#[tokio::test]
async fn test_ensemble_records_never_have_one_method() {
    let engine = AnomalyEngine::new(DetectionConfig::ensemble()).unwrap();
    let mut values = seasonal_series(78);
    values[20] += 40.0;
    values[51] -= 35.0;
    values[66] += 3.0;

    let result = engine.detect(request(values)).await.unwrap();
    for record in &result.anomalies {
        assert!(record.methods.len() >= 2, "record {record:?}");
        assert!(record.score + 1e-9 >= 0.6);
    }
    assert!(result.anomalies.iter().any(|r| r.timestamp == START + 20 * 60));
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let engine = AnomalyEngine::new(DetectionConfig::ensemble()).unwrap();
    let mut values = seasonal_series(60);
    values[33] += 25.0;

    let first = engine.detect(request(values.clone())).await.unwrap();
    let second = engine.detect(request(values)).await.unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_isolation_detector_is_deterministic() {
    let mut values = seasonal_series(40);
    values[9] = 500.0;
    let series = ObservedSeries::evenly_spaced(START, 60, values);

    let detector = IsolationOutlierDetector::new(Default::default());
    assert_eq!(detector.detect(&series), detector.detect(&series));
}

#[test]
fn test_non_finite_values_make_every_detector_abstain() {
    let mut values = seasonal_series(30);
    values[5] = f64::NAN;
    let series = ObservedSeries::evenly_spaced(START, 60, values);

    let detectors: Vec<Box<dyn Detector>> = vec![
        Box::new(ForecastIntervalDetector::new(Default::default())),
        Box::new(SeasonalResidualDetector::new(Default::default())),
        Box::new(IsolationOutlierDetector::new(Default::default())),
    ];
    for detector in &detectors {
        assert_eq!(
            detector.detect(&series).abstain_reason(),
            Some(&FitError::NonFinite { index: 5 }),
            "{}",
            detector.name()
        );
    }

    let engine = AnomalyEngine::new(DetectionConfig::ensemble()).unwrap();
    assert!(engine.detect_series(&series).unwrap().is_empty());
}

/// Flags every point, standing in for a detector gone haywire.
struct FlagEverything;

impl Detector for FlagEverything {
    fn detect(&self, series: &ObservedSeries) -> DetectorOutcome {
        DetectorOutcome::Voted(Verdict::from_flags(vec![true; series.len()]))
    }

    fn name(&self) -> &str {
        "FlagEverything"
    }

    fn description(&self) -> &str {
        "flags every point"
    }
}

#[tokio::test]
async fn test_lone_detector_cannot_reach_threshold() {
    let config = DetectionConfig::ensemble().with_voters(vec![
        VoterConfig::new(DetectorKind::Seasonal, 0.3),
        VoterConfig::new(DetectorKind::Isolation, 0.3),
    ]);
    let engine = AnomalyEngine::builder()
        .config(config)
        .add_detector("noisy", 0.4, Arc::new(FlagEverything))
        .build()
        .unwrap();

    let result = engine.detect(request(seasonal_series(40))).await.unwrap();
    // noisy (0.4) needs a second voter everywhere it is reported
    for record in &result.anomalies {
        assert!(record.methods.len() >= 2);
        assert!(record.methods.contains(&"noisy".to_string()));
    }
}

#[tokio::test]
async fn test_config_from_json() {
    let config = DetectionConfig::from_json(
        r#"{"mode": "single", "min_points": 10, "threshold": 1.0,
            "scoring": "detector_score",
            "voters": [{"detector": "isolation", "method": "isolation_forest", "weight": 1.0}]}"#,
    )
    .unwrap();
    let engine = AnomalyEngine::new(config).unwrap();
    assert_eq!(engine.methods(), vec!["isolation_forest"]);

    let bad = DetectionConfig::from_json(r#"{"isolation": {"contamination": 0.9}}"#);
    assert!(matches!(bad, Err(DetectionError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_config_mode_alone_selects_single_detector() {
    let config = DetectionConfig::from_json(r#"{"mode": "single"}"#).unwrap();
    let engine = AnomalyEngine::new(config).unwrap();
    assert_eq!(engine.mode(), DetectionMode::Single);
    assert_eq!(engine.min_points(), 10);
    assert_eq!(engine.methods(), vec!["isolation_forest"]);

    let mut values = vec![10.0; 12];
    values[4] = 90.0;
    let result = engine.detect(request(values)).await.unwrap();
    assert_eq!(result.anomaly_count, 1);
    assert_eq!(result.anomalies[0].methods, vec!["isolation_forest"]);
}
