//! Forecast-interval detection.
//!
//! An additive trend model with no seasonal terms is fitted to the whole
//! series and evaluated in-sample. The trend is piecewise linear: a base
//! slope plus hinge terms `max(0, t - s_j)` at candidate changepoints `s_j`
//! spread over the leading part of the series. Changepoint slope adjustments
//! carry a Gaussian prior, which turns the fit into a ridge regression whose
//! penalty is `sigma^2 / prior_scale^2` on the hinge coefficients. The
//! observation noise `sigma` gives the prediction interval.

use ndarray::{s, Array1, Array2};
use tracing::debug;

use super::{first_non_finite, Detector, DetectorOutcome, Verdict};
use crate::config::ForecastConfig;
use crate::error::{FitError, FitResult};
use crate::series::ObservedSeries;
use crate::stats::{cholesky_solve, normal_quantile, EPSILON};

/// In-sample prediction of the trend model.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalFit {
    pub yhat: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// Observation noise in the original units.
    pub sigma: f64,
    /// Changepoint locations on the scaled `[0, 1]` time axis.
    pub changepoints: Vec<f64>,
}

/// Flags points outside the fitted prediction interval.
#[derive(Debug, Clone)]
pub struct ForecastIntervalDetector {
    config: ForecastConfig,
}

impl ForecastIntervalDetector {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// Fits the trend model and returns the in-sample interval.
    pub fn fit(&self, series: &ObservedSeries) -> FitResult<IntervalFit> {
        let n = series.len();
        if n < 3 {
            return Err(FitError::TooShort {
                required: 3,
                actual: n,
            });
        }
        if let Some(index) = first_non_finite(series.values()) {
            return Err(FitError::NonFinite { index });
        }

        let t = scaled_time(series.timestamps())?;

        let y_scale = series
            .values()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let y_scale = if y_scale < EPSILON { 1.0 } else { y_scale };
        let y = Array1::from_iter(series.values().iter().map(|v| v / y_scale));

        let changepoints = self.changepoints(&t);
        let x = design_matrix(&t, &changepoints);

        // Noise estimate from a straight line sets the prior strength.
        let base = x.slice(s![.., 0..2]).to_owned();
        let base_beta = ridge_solve(&base, &y, 0.0)?;
        let sigma0 = rms(&(&y - &base.dot(&base_beta)));
        if sigma0 <= EPSILON {
            return Err(FitError::Degenerate(
                "series is an exact straight line; residual scale is zero".to_string(),
            ));
        }

        let lambda = sigma0.powi(2) / self.config.changepoint_prior_scale.powi(2);
        let beta = ridge_solve(&x, &y, lambda)?;
        let fitted = x.dot(&beta);
        let sigma = rms(&(&y - &fitted));
        if sigma <= EPSILON || !sigma.is_finite() {
            return Err(FitError::Degenerate(format!(
                "fitted residual scale is {sigma:e}"
            )));
        }

        debug!(
            points = n,
            changepoints = changepoints.len(),
            sigma0,
            sigma,
            lambda,
            "Fitted trend model"
        );

        let z = normal_quantile(0.5 + self.config.interval_width / 2.0);
        let half_width = z * sigma * y_scale;
        let yhat: Vec<f64> = fitted.iter().map(|f| f * y_scale).collect();
        let lower = yhat.iter().map(|f| f - half_width).collect();
        let upper = yhat.iter().map(|f| f + half_width).collect();

        Ok(IntervalFit {
            yhat,
            lower,
            upper,
            sigma: sigma * y_scale,
            changepoints,
        })
    }

    /// Candidate changepoints: up to `n_changepoints` evenly spaced over the
    /// first `changepoint_range` of the history, never at the first point.
    fn changepoints(&self, t: &[f64]) -> Vec<f64> {
        let mut sorted = t.to_vec();
        sorted.sort_by(f64::total_cmp);

        let hist_size = (t.len() as f64 * self.config.changepoint_range).floor() as usize;
        let k = self
            .config
            .n_changepoints
            .min(hist_size.saturating_sub(1));
        if k == 0 {
            return Vec::new();
        }

        let last = (hist_size - 1) as f64;
        (1..=k)
            .map(|i| {
                let idx = (i as f64 * last / k as f64).round() as usize;
                sorted[idx.min(sorted.len() - 1)]
            })
            .collect()
    }

    fn run(&self, series: &ObservedSeries) -> FitResult<Verdict> {
        let fit = self.fit(series)?;

        let (flags, scores): (Vec<bool>, Vec<f64>) = series
            .values()
            .iter()
            .zip(fit.yhat.iter().zip(fit.lower.iter().zip(fit.upper.iter())))
            .map(|(&y, (&yhat, (&lo, &hi)))| {
                let half_width = hi - yhat;
                (y < lo || y > hi, (y - yhat).abs() / half_width)
            })
            .unzip();

        Ok(Verdict::with_scores(flags, scores))
    }
}

impl Detector for ForecastIntervalDetector {
    fn detect(&self, series: &ObservedSeries) -> DetectorOutcome {
        self.run(series).into()
    }

    fn name(&self) -> &str {
        "ForecastInterval"
    }

    fn description(&self) -> &str {
        "Flags points outside the prediction interval of a piecewise-linear trend model"
    }
}

/// Maps timestamps onto `[0, 1]`.
fn scaled_time(timestamps: &[i64]) -> FitResult<Vec<f64>> {
    let (min, max) = timestamps
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), &t| (lo.min(t), hi.max(t)));
    let span = max.saturating_sub(min);
    if span <= 0 {
        return Err(FitError::Degenerate(
            "all timestamps are equal; the time axis has zero span".to_string(),
        ));
    }
    Ok(timestamps
        .iter()
        .map(|&ts| (ts - min) as f64 / span as f64)
        .collect())
}

/// Columns: intercept, slope, one hinge per changepoint.
fn design_matrix(t: &[f64], changepoints: &[f64]) -> Array2<f64> {
    let mut x = Array2::<f64>::zeros((t.len(), 2 + changepoints.len()));
    for (i, &ti) in t.iter().enumerate() {
        x[[i, 0]] = 1.0;
        x[[i, 1]] = ti;
        for (j, &cp) in changepoints.iter().enumerate() {
            x[[i, 2 + j]] = (ti - cp).max(0.0);
        }
    }
    x
}

/// Least squares with `lambda` added to the diagonal of every hinge column.
fn ridge_solve(x: &Array2<f64>, y: &Array1<f64>, lambda: f64) -> FitResult<Array1<f64>> {
    let xt = x.t();
    let mut a = xt.dot(x);
    let b = xt.dot(y);
    for j in 2..a.nrows() {
        a[[j, j]] += lambda;
    }
    cholesky_solve(&a, &b)
        .ok_or_else(|| FitError::Numerical("normal equations are not positive definite".into()))
}

fn rms(residuals: &Array1<f64>) -> f64 {
    (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spiked(len: usize, at: usize) -> ObservedSeries {
        let mut values = vec![10.0; len];
        // gentle wobble so the baseline is not an exact line
        for (i, v) in values.iter_mut().enumerate() {
            *v += if i % 2 == 0 { 0.1 } else { -0.1 };
        }
        values[at] = 100.0;
        ObservedSeries::evenly_spaced(1_700_000_000, 60, values)
    }

    #[test]
    fn test_spike_outside_interval() {
        let detector = ForecastIntervalDetector::new(ForecastConfig::default());
        let verdict = detector.run(&spiked(30, 17)).unwrap();
        assert_eq!(verdict.flagged_indices(), vec![17]);
        assert!(verdict.score(17).unwrap() > 1.0);
    }

    #[test]
    fn test_interval_contains_fit() {
        let detector = ForecastIntervalDetector::new(ForecastConfig::default());
        let fit = detector.fit(&spiked(40, 5)).unwrap();
        for i in 0..40 {
            assert!(fit.lower[i] < fit.yhat[i]);
            assert!(fit.yhat[i] < fit.upper[i]);
        }
        assert!(fit.sigma > 0.0);
    }

    #[test]
    fn test_changepoints_in_leading_range() {
        let detector = ForecastIntervalDetector::new(ForecastConfig::default());
        let fit = detector.fit(&spiked(30, 3)).unwrap();
        // 80% of 30 points is 24, which leaves room for 23 changepoints
        assert_eq!(fit.changepoints.len(), 23);
        assert!(fit.changepoints.iter().all(|&c| c > 0.0 && c <= 23.0 / 29.0 + 1e-12));
    }

    #[test]
    fn test_flat_series_abstains() {
        let detector = ForecastIntervalDetector::new(ForecastConfig::default());
        let series = ObservedSeries::evenly_spaced(0, 60, vec![5.0; 25]);
        let outcome = detector.detect(&series);
        assert!(matches!(
            outcome,
            DetectorOutcome::Abstained(FitError::Degenerate(_))
        ));
    }

    #[test]
    fn test_equal_timestamps_abstain() {
        let detector = ForecastIntervalDetector::new(ForecastConfig::default());
        let series = ObservedSeries::new(vec![100; 20], (0..20).map(|i| i as f64).collect()).unwrap();
        assert!(detector.detect(&series).is_abstained());
    }

    #[test]
    fn test_non_finite_abstains() {
        let detector = ForecastIntervalDetector::new(ForecastConfig::default());
        let mut values: Vec<f64> = (0..20).map(|i| (i % 3) as f64).collect();
        values[4] = f64::INFINITY;
        let series = ObservedSeries::evenly_spaced(0, 60, values);
        assert_eq!(
            detector.detect(&series).abstain_reason(),
            Some(&FitError::NonFinite { index: 4 })
        );
    }
}
