//! Seasonal-trend decomposition by loess (STL).
//!
//! The inner loop alternates cycle-subseries smoothing (seasonal) with a
//! loess trend fit; the optional outer loop downweights points with large
//! residuals using bisquare robustness weights. Positions inside the loess
//! routines are 1-based so that window arithmetic reads like the published
//! algorithm.

use crate::error::{FitError, FitResult};
use crate::stats::median;

/// Trend, seasonal and remainder components of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    /// Final robustness weights; all ones for a non-robust fit.
    pub weights: Vec<f64>,
}

/// STL parameters. Smoother spans are odd.
#[derive(Debug, Clone, PartialEq)]
pub struct Stl {
    period: usize,
    seasonal: usize,
    trend: usize,
    low_pass: usize,
    inner_iter: usize,
    outer_iter: usize,
}

impl Stl {
    /// Creates a decomposition with linear smoothers and the usual derived
    /// spans: the trend span is the smallest odd integer at least
    /// `1.5 * period / (1 - 1.5 / seasonal)`, the low-pass span the smallest
    /// odd integer above `period`.
    pub fn new(period: usize, seasonal: usize, robust: bool) -> Self {
        let trend = (1.5 * period as f64 / (1.0 - 1.5 / seasonal as f64)).ceil() as usize;
        let low_pass = period + 1;
        Self {
            period,
            seasonal,
            trend: make_odd(trend),
            low_pass: make_odd(low_pass),
            inner_iter: if robust { 2 } else { 5 },
            outer_iter: if robust { 15 } else { 0 },
        }
    }

    /// Overrides the inner and outer pass counts.
    pub fn with_iterations(mut self, inner: usize, outer: usize) -> Self {
        self.inner_iter = inner.max(1);
        self.outer_iter = outer;
        self
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn trend_span(&self) -> usize {
        self.trend
    }

    pub fn low_pass_span(&self) -> usize {
        self.low_pass
    }

    pub fn inner_iterations(&self) -> usize {
        self.inner_iter
    }

    pub fn outer_iterations(&self) -> usize {
        self.outer_iter
    }

    /// Decomposes `y`. Needs more than one full period of finite values.
    pub fn fit(&self, y: &[f64]) -> FitResult<Decomposition> {
        let n = y.len();
        if self.period < 2 {
            return Err(FitError::Degenerate(format!(
                "period must be at least 2, got {}",
                self.period
            )));
        }
        if n <= self.period {
            return Err(FitError::TooShort {
                required: self.period + 1,
                actual: n,
            });
        }
        if let Some(index) = y.iter().position(|v| !v.is_finite()) {
            return Err(FitError::NonFinite { index });
        }

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut weights: Option<Vec<f64>> = None;

        let mut pass = 0;
        loop {
            self.inner_loop(y, &mut trend, &mut seasonal, weights.as_deref());
            pass += 1;
            if pass > self.outer_iter {
                break;
            }
            let fit: Vec<f64> = trend.iter().zip(&seasonal).map(|(t, s)| t + s).collect();
            weights = Some(robustness_weights(y, &fit));
        }

        let residual: Vec<f64> = y
            .iter()
            .zip(trend.iter().zip(&seasonal))
            .map(|(v, (t, s))| v - t - s)
            .collect();

        if residual.iter().any(|r| !r.is_finite()) {
            return Err(FitError::Numerical(
                "decomposition produced non-finite components".to_string(),
            ));
        }

        Ok(Decomposition {
            trend,
            seasonal,
            residual,
            weights: weights.unwrap_or_else(|| vec![1.0; n]),
        })
    }

    fn inner_loop(&self, y: &[f64], trend: &mut [f64], seasonal: &mut [f64], rw: Option<&[f64]>) {
        let n = y.len();
        let np = self.period;

        for _ in 0..self.inner_iter {
            let detrended: Vec<f64> = y.iter().zip(trend.iter()).map(|(v, t)| v - t).collect();
            let cycle = cycle_subseries(&detrended, np, self.seasonal, rw);

            let filtered = moving_average(
                &moving_average(&moving_average(&cycle, np), np),
                3,
            );
            let low_pass = loess_smooth(&filtered, self.low_pass, None);

            for i in 0..n {
                seasonal[i] = cycle[np + i] - low_pass[i];
            }

            let deseasonalized: Vec<f64> =
                y.iter().zip(seasonal.iter()).map(|(v, s)| v - s).collect();
            let smoothed = loess_smooth(&deseasonalized, self.trend, rw);
            trend.copy_from_slice(&smoothed);
        }
    }
}

fn make_odd(span: usize) -> usize {
    if span % 2 == 0 {
        span + 1
    } else {
        span
    }
}

/// Smooths each cycle-subseries and extends it by one period on both ends.
/// The result has `n + 2 * period` entries.
fn cycle_subseries(y: &[f64], period: usize, span: usize, rw: Option<&[f64]>) -> Vec<f64> {
    let n = y.len();
    let mut out = vec![0.0; n + 2 * period];

    for j in 1..=period.min(n) {
        let k = (n - j) / period + 1;
        let sub: Vec<f64> = (0..k).map(|i| y[i * period + j - 1]).collect();
        let sub_rw: Option<Vec<f64>> =
            rw.map(|w| (0..k).map(|i| w[i * period + j - 1]).collect());
        let sub_rw = sub_rw.as_deref();

        let smoothed = loess_smooth(&sub, span, sub_rw);

        let right_edge = span.min(k);
        let before = loess_estimate(&sub, span, 0.0, 1, right_edge, sub_rw).unwrap_or(smoothed[0]);
        let left_edge = if k >= span { k - span + 1 } else { 1 };
        let after = loess_estimate(&sub, span, (k + 1) as f64, left_edge, k, sub_rw)
            .unwrap_or(smoothed[k - 1]);

        out[j - 1] = before;
        for (m, value) in smoothed.iter().enumerate() {
            out[(m + 1) * period + j - 1] = *value;
        }
        out[(k + 1) * period + j - 1] = after;
    }
    out
}

fn moving_average(x: &[f64], len: usize) -> Vec<f64> {
    if x.len() < len || len == 0 {
        return Vec::new();
    }
    let width = len as f64;
    let mut window: f64 = x[..len].iter().sum();
    let mut out = Vec::with_capacity(x.len() - len + 1);
    out.push(window / width);
    for j in 1..=(x.len() - len) {
        window += x[j + len - 1] - x[j - 1];
        out.push(window / width);
    }
    out
}

/// Degree-one loess at every position with a sliding window of `span` points.
fn loess_smooth(y: &[f64], span: usize, rw: Option<&[f64]>) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return y.to_vec();
    }

    let mut ys = vec![0.0; n];
    if span >= n {
        for i in 1..=n {
            ys[i - 1] = loess_estimate(y, span, i as f64, 1, n, rw).unwrap_or(y[i - 1]);
        }
    } else {
        let half = (span + 1) / 2;
        let (mut left, mut right) = (1, span);
        for i in 1..=n {
            if i > half && right != n {
                left += 1;
                right += 1;
            }
            ys[i - 1] = loess_estimate(y, span, i as f64, left, right, rw).unwrap_or(y[i - 1]);
        }
    }
    ys
}

/// Tricube-weighted local linear fit at `xs` over positions `left..=right`.
/// Returns `None` when every weight in the window is zero.
fn loess_estimate(
    y: &[f64],
    span: usize,
    xs: f64,
    left: usize,
    right: usize,
    rw: Option<&[f64]>,
) -> Option<f64> {
    let n = y.len();
    let range = n as f64 - 1.0;

    let mut h = (xs - left as f64).max(right as f64 - xs);
    if span > n {
        h += ((span - n) / 2) as f64;
    }
    let h9 = 0.999 * h;
    let h1 = 0.001 * h;

    let mut w = vec![0.0; right - left + 1];
    let mut total = 0.0;
    for j in left..=right {
        let r = (j as f64 - xs).abs();
        if r <= h9 {
            let mut wj = if r <= h1 {
                1.0
            } else {
                (1.0 - (r / h).powi(3)).powi(3)
            };
            if let Some(rw) = rw {
                wj *= rw[j - 1];
            }
            w[j - left] = wj;
            total += wj;
        }
    }
    if total <= 0.0 {
        return None;
    }
    w.iter_mut().for_each(|wj| *wj /= total);

    if h > 0.0 {
        let center: f64 = (left..=right).map(|j| w[j - left] * j as f64).sum();
        let spread: f64 = (left..=right)
            .map(|j| w[j - left] * (j as f64 - center).powi(2))
            .sum();
        if spread.sqrt() > 0.001 * range {
            let slope = (xs - center) / spread;
            for j in left..=right {
                w[j - left] *= slope * (j as f64 - center) + 1.0;
            }
        }
    }

    Some((left..=right).map(|j| w[j - left] * y[j - 1]).sum())
}

/// Bisquare weights on `|y - fit|` scaled by six median absolute residuals.
fn robustness_weights(y: &[f64], fit: &[f64]) -> Vec<f64> {
    let r: Vec<f64> = y.iter().zip(fit).map(|(v, f)| (v - f).abs()).collect();
    let cmad = 6.0 * median(&r);
    let c9 = 0.999 * cmad;
    let c1 = 0.001 * cmad;

    r.iter()
        .map(|&ri| {
            if ri <= c1 {
                1.0
            } else if ri <= c9 {
                (1.0 - (ri / cmad).powi(2)).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * (i % period) as f64 / period as f64;
                50.0 + 0.05 * i as f64 + 3.0 * phase.sin()
            })
            .collect()
    }

    #[test]
    fn test_derived_spans() {
        let stl = Stl::new(13, 7, true);
        assert_eq!(stl.trend_span(), 25);
        assert_eq!(stl.low_pass_span(), 15);

        let stl = Stl::new(12, 7, false);
        assert_eq!(stl.trend_span(), 23);
        assert_eq!(stl.low_pass_span(), 13);
    }

    #[test]
    fn test_components_sum_to_series() {
        let y = wave(52, 13);
        let d = Stl::new(13, 7, true).fit(&y).unwrap();
        for i in 0..y.len() {
            let rebuilt = d.trend[i] + d.seasonal[i] + d.residual[i];
            assert!((rebuilt - y[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_periodic_signal_goes_to_seasonal() {
        let y = wave(65, 13);
        let d = Stl::new(13, 7, false).fit(&y).unwrap();
        let max_residual = d.residual.iter().fold(0.0_f64, |m, r| m.max(r.abs()));
        let seasonal_range = d
            .seasonal
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), s| (lo.min(*s), hi.max(*s)));
        assert!(seasonal_range.1 - seasonal_range.0 > 4.0);
        assert!(max_residual < 1.0, "max residual {max_residual}");
    }

    #[test]
    fn test_too_short_series() {
        let err = Stl::new(13, 7, true).fit(&[1.0; 13]).unwrap_err();
        assert_eq!(
            err,
            FitError::TooShort {
                required: 14,
                actual: 13
            }
        );
    }

    #[test]
    fn test_moving_average() {
        let out = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_robustness_weights_zero_for_outlier() {
        let y = [1.0, 1.1, 0.9, 1.0, 1.05, 0.95, 9.0];
        let fit = [1.0; 7];
        let w = robustness_weights(&y, &fit);
        assert_eq!(w[6], 0.0);
        assert!(w[..6].iter().all(|&wi| wi > 0.5));
    }
}
