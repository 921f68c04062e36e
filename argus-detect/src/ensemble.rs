//! Weighted voting across detector outcomes.

use crate::config::Scoring;
use crate::detectors::DetectorOutcome;
use crate::series::ObservedSeries;
use crate::stats::EPSILON;
use crate::types::AnomalyRecord;

/// One detector's vote, as seen by the aggregator.
#[derive(Debug, Clone, Copy)]
pub struct Ballot<'a> {
    pub method: &'a str,
    pub weight: f64,
    pub outcome: &'a DetectorOutcome,
}

impl<'a> Ballot<'a> {
    pub fn new(method: &'a str, weight: f64, outcome: &'a DetectorOutcome) -> Self {
        Self {
            method,
            weight,
            outcome,
        }
    }
}

/// Combines ballots into anomaly records.
///
/// A point is reported when the summed weight of the detectors that flagged
/// it reaches `threshold`. Abstaining detectors contribute nothing. The
/// aggregation is pure: the same ballots always give the same records, in
/// series order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleAggregator {
    threshold: f64,
    scoring: Scoring,
}

impl EnsembleAggregator {
    pub fn new(threshold: f64, scoring: Scoring) -> Self {
        Self { threshold, scoring }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn aggregate(&self, series: &ObservedSeries, ballots: &[Ballot<'_>]) -> Vec<AnomalyRecord> {
        series
            .points()
            .enumerate()
            .filter_map(|(i, (timestamp, value))| {
                let flagging: Vec<&Ballot<'_>> =
                    ballots.iter().filter(|b| b.outcome.is_flagged(i)).collect();

                let combined: f64 = flagging.iter().map(|b| b.weight).sum();
                // Tolerance keeps 0.3 + 0.3 at a 0.6 threshold.
                if combined <= 0.0 || combined + EPSILON < self.threshold {
                    return None;
                }

                let score = match self.scoring {
                    Scoring::CombinedWeight => combined,
                    Scoring::DetectorScore => flagging
                        .iter()
                        .filter_map(|b| b.outcome.score(i))
                        .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
                        .unwrap_or(combined),
                };
                let methods = flagging.iter().map(|b| b.method.to_string()).collect();

                Some(AnomalyRecord::new(timestamp, value, score, methods))
            })
            .collect()
    }
}
