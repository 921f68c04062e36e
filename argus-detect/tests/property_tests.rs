//! Property-based tests for the detection engine and the vote aggregator.
//!
//! ## Properties
//!
//! - Ensemble records always carry at least two methods and a combined
//!   weight at or above the threshold.
//! - Records are a subsequence of the input points, in input order.
//! - Adding a flag to any ballot never removes a record.
//! - Series below the mode minimum are rejected with `InsufficientData`.
//! - Detection is deterministic for a fixed input.

use argus_detect::config::Scoring;
use argus_detect::detectors::{Detector, DetectorOutcome, IsolationOutlierDetector, Verdict};
use argus_detect::ensemble::{Ballot, EnsembleAggregator};
use argus_detect::prelude::*;
use proptest::prelude::*;

const WEIGHTS: [(&str, f64); 3] = [("forecast", 0.4), ("seasonal", 0.3), ("isolation", 0.3)];

fn arb_values(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1_000.0..1_000.0f64, min..max)
}

/// Three flag vectors of equal length.
fn arb_ballots(max_len: usize) -> impl Strategy<Value = Vec<Vec<bool>>> {
    (1..max_len).prop_flat_map(|len| {
        prop::collection::vec(prop::collection::vec(any::<bool>(), len), 3)
    })
}

fn outcomes(flags: &[Vec<bool>]) -> Vec<DetectorOutcome> {
    flags
        .iter()
        .map(|f| DetectorOutcome::Voted(Verdict::from_flags(f.clone())))
        .collect()
}

fn aggregate(flags: &[Vec<bool>]) -> Vec<AnomalyRecord> {
    let len = flags[0].len();
    let series = ObservedSeries::evenly_spaced(0, 1, (0..len).map(|i| i as f64).collect());
    let outcomes = outcomes(flags);
    let ballots: Vec<Ballot<'_>> = WEIGHTS
        .iter()
        .zip(&outcomes)
        .map(|((method, weight), outcome)| Ballot::new(method, *weight, outcome))
        .collect();
    EnsembleAggregator::new(0.6, Scoring::CombinedWeight).aggregate(&series, &ballots)
}

proptest! {
    #[test]
    fn test_records_need_two_methods(flags in arb_ballots(64)) {
        for record in aggregate(&flags) {
            prop_assert!(record.methods.len() >= 2);
            prop_assert!(record.score + 1e-9 >= 0.6);
        }
    }

    #[test]
    fn test_records_match_vote_count(flags in arb_ballots(64)) {
        let records = aggregate(&flags);
        let expected: Vec<i64> = (0..flags[0].len())
            .filter(|&i| flags.iter().filter(|f| f[i]).count() >= 2)
            .map(|i| i as i64)
            .collect();
        let actual: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn test_extra_flag_never_removes_records(
        flags in arb_ballots(64),
        voter in 0usize..3,
        index in any::<prop::sample::Index>(),
    ) {
        let before = aggregate(&flags);

        let mut more = flags.clone();
        let i = index.index(more[voter].len());
        more[voter][i] = true;
        let after = aggregate(&more);

        for record in &before {
            prop_assert!(after.iter().any(|r| r.timestamp == record.timestamp));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_engine_output_is_ordered_subset(values in arb_values(20, 60)) {
        let engine = AnomalyEngine::new(DetectionConfig::ensemble()).unwrap();
        let series = ObservedSeries::evenly_spaced(1_000, 60, values.clone());
        let records = engine.detect_series(&series).unwrap();

        let mut last = i64::MIN;
        for record in &records {
            prop_assert!(record.timestamp > last);
            last = record.timestamp;
            let index = ((record.timestamp - 1_000) / 60) as usize;
            prop_assert_eq!(values[index], record.value);
            prop_assert!(record.methods.len() >= 2);
        }
    }

    #[test]
    fn test_short_series_rejected(values in arb_values(0, 20)) {
        let engine = AnomalyEngine::new(DetectionConfig::ensemble()).unwrap();
        let series = ObservedSeries::evenly_spaced(0, 60, values.clone());
        let err = engine.detect_series(&series).unwrap_err();
        let is_insufficient = matches!(
            err,
            DetectionError::InsufficientData { required: 20, actual } if actual == values.len()
        );
        prop_assert!(is_insufficient);
    }

    #[test]
    fn test_isolation_is_deterministic(values in arb_values(10, 80)) {
        let series = ObservedSeries::evenly_spaced(0, 60, values);
        let detector = IsolationOutlierDetector::new(Default::default());
        let first = detector.detect(&series);
        let second = detector.detect(&series);
        prop_assert_eq!(&first, &second);

        if let Some(verdict) = first.verdict() {
            // at most the contamination share can sit below the percentile
            prop_assert!(verdict.flagged_count() as f64 <= 0.1 * verdict.len() as f64 + 1.0);
        }
    }
}
