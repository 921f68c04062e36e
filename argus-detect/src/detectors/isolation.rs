//! Isolation-forest outlier detection.
//!
//! Each tree recursively splits a random subsample at uniformly drawn
//! thresholds until every point is isolated or the depth limit is hit.
//! Outliers are isolated early, so their average path length is short. The
//! score of a sample is `-2^(-E[h(x)] / c(m))`, which is close to `-1` for
//! clear outliers and close to `-0.5` for ordinary points. Points whose score
//! falls below the `contamination` percentile of the training scores are
//! flagged.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{first_non_finite, Detector, DetectorOutcome, Verdict};
use crate::config::IsolationConfig;
use crate::error::{FitError, FitResult};
use crate::series::ObservedSeries;
use crate::stats::percentile;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
enum IsolationTree {
    Split {
        feature: usize,
        threshold: f64,
        /// Samples with `x[feature] <= threshold`.
        left: Box<IsolationTree>,
        right: Box<IsolationTree>,
    },
    Leaf {
        size: usize,
    },
}

impl IsolationTree {
    fn grow(
        x: &Array2<f64>,
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        let size = indices.len();
        if depth >= max_depth || size <= 1 {
            return IsolationTree::Leaf { size };
        }

        // Try features in random order until one still varies here.
        let mut candidates: Vec<usize> = (0..x.ncols()).collect();
        while !candidates.is_empty() {
            let pick = rng.random_range(0..candidates.len());
            let feature = candidates.swap_remove(pick);

            let (min, max) = indices
                .iter()
                .map(|&i| x[[i, feature]])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            if max <= min {
                continue;
            }

            // `max - min` overflows for far-apart finite values, so blend the
            // endpoints instead of offsetting from `min`.
            let u: f64 = rng.random();
            let mut threshold = min * (1.0 - u) + max * u;
            if !(threshold >= min && threshold < max) {
                threshold = min;
            }
            let (left, right): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .copied()
                .partition(|&i| x[[i, feature]] <= threshold);

            return IsolationTree::Split {
                feature,
                threshold,
                left: Box::new(Self::grow(x, &left, depth + 1, max_depth, rng)),
                right: Box::new(Self::grow(x, &right, depth + 1, max_depth, rng)),
            };
        }

        IsolationTree::Leaf { size }
    }

    fn path_length(&self, sample: ArrayView1<'_, f64>) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                IsolationTree::Leaf { size } => return depth + average_path_length(*size),
                IsolationTree::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful binary-search-tree lookup among
/// `n` items, used to normalise depths.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// A fitted isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fits the forest on the rows of `x` and sets the decision offset from
    /// the training scores.
    pub fn fit(x: &Array2<f64>, config: &IsolationConfig) -> FitResult<Self> {
        let n = x.nrows();
        if n < 2 {
            return Err(FitError::TooShort {
                required: 2,
                actual: n,
            });
        }

        let sample_size = config.max_samples.clamp(1, n);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.n_estimators.max(1))
            .map(|_| {
                let subsample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::grow(x, &subsample, 0, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };
        let scores = forest.score_samples(x);
        forest.offset = percentile(&scores, 100.0 * config.contamination);

        debug!(
            trees = forest.trees.len(),
            sample_size,
            max_depth,
            offset = forest.offset,
            "Fitted isolation forest"
        );
        Ok(forest)
    }

    /// Opposite of the anomaly score: lower is more anomalous.
    pub fn score_samples(&self, x: &Array2<f64>) -> Vec<f64> {
        let norm = average_path_length(self.sample_size).max(f64::MIN_POSITIVE);
        x.rows()
            .into_iter()
            .map(|row| {
                let mean_path = self
                    .trees
                    .iter()
                    .map(|tree| tree.path_length(row))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                -(2.0_f64).powf(-mean_path / norm)
            })
            .collect()
    }

    /// Decision offset; samples scoring below it are outliers.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// True for every row scoring below the offset.
    pub fn predict(&self, x: &Array2<f64>) -> Vec<bool> {
        self.score_samples(x)
            .into_iter()
            .map(|s| s < self.offset)
            .collect()
    }
}

/// Flags the contamination tail of the value distribution. Reported scores
/// are the absolute sample scores, in `(0, 1]`.
#[derive(Debug, Clone)]
pub struct IsolationOutlierDetector {
    config: IsolationConfig,
}

impl IsolationOutlierDetector {
    pub fn new(config: IsolationConfig) -> Self {
        Self { config }
    }

    fn run(&self, series: &ObservedSeries) -> FitResult<Verdict> {
        if let Some(index) = first_non_finite(series.values()) {
            return Err(FitError::NonFinite { index });
        }

        let x = Array2::from_shape_vec((series.len(), 1), series.values().to_vec())
            .map_err(|e| FitError::Numerical(e.to_string()))?;
        let forest = IsolationForest::fit(&x, &self.config)?;

        let scores = forest.score_samples(&x);
        let flags = scores.iter().map(|&s| s < forest.offset()).collect();
        let magnitudes = scores.iter().map(|s| s.abs()).collect();

        Ok(Verdict::with_scores(flags, magnitudes))
    }
}

impl Detector for IsolationOutlierDetector {
    fn detect(&self, series: &ObservedSeries) -> DetectorOutcome {
        self.run(series).into()
    }

    fn name(&self) -> &str {
        "IsolationForest"
    }

    fn description(&self) -> &str {
        "Flags points an isolation forest separates unusually quickly"
    }
}
