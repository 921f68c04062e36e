//! Seasonal-residual detection on top of [`Stl`].

use tracing::debug;

use super::stl::Stl;
use super::{first_non_finite, Detector, DetectorOutcome, Verdict};
use crate::config::SeasonalConfig;
use crate::error::{FitError, FitResult};
use crate::series::ObservedSeries;
use crate::stats::{std_dev, EPSILON};

/// Decomposes the series and flags points whose remainder exceeds
/// `sigma_multiplier` standard deviations of all remainders.
#[derive(Debug, Clone)]
pub struct SeasonalResidualDetector {
    config: SeasonalConfig,
}

impl SeasonalResidualDetector {
    pub fn new(config: SeasonalConfig) -> Self {
        Self { config }
    }

    fn run(&self, series: &ObservedSeries) -> FitResult<Verdict> {
        let n = series.len();
        if n < self.config.min_points {
            return Err(FitError::TooShort {
                required: self.config.min_points,
                actual: n,
            });
        }
        let values = series.values();
        if let Some(index) = first_non_finite(values) {
            return Err(FitError::NonFinite { index });
        }

        let stl = Stl::new(
            self.config.period,
            self.config.seasonal_smoother,
            self.config.robust,
        );
        let inner = self.config.inner_iterations.unwrap_or(stl.inner_iterations());
        let outer = self.config.outer_iterations.unwrap_or(stl.outer_iterations());
        let stl = stl.with_iterations(inner, outer);
        let decomposition = stl.fit(values)?;
        let residual = &decomposition.residual;

        let sd = std_dev(residual);
        let scale = values.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
        if sd <= EPSILON * scale {
            return Err(FitError::Degenerate(
                "decomposition left no residual variation".to_string(),
            ));
        }

        let limit = self.config.sigma_multiplier * sd;
        let flags: Vec<bool> = residual.iter().map(|r| r.abs() > limit).collect();
        let scores = residual.iter().map(|r| r.abs() / sd).collect();

        debug!(
            points = n,
            period = self.config.period,
            residual_std = sd,
            flagged = flags.iter().filter(|f| **f).count(),
            "Decomposed series"
        );

        Ok(Verdict::with_scores(flags, scores))
    }
}

impl Detector for SeasonalResidualDetector {
    fn detect(&self, series: &ObservedSeries) -> DetectorOutcome {
        self.run(series).into()
    }

    fn name(&self) -> &str {
        "SeasonalResidual"
    }

    fn description(&self) -> &str {
        "Flags points whose STL remainder is unusually large"
    }
}
