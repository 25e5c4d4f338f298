//! Pluggable univariate forecasting strategy.
//!
//! The reconciliation logic only needs `weekly series -> horizon -> points`,
//! so the model behind it can be swapped (an in-process smoother here, an
//! out-of-process fit elsewhere) without touching the Forecaster.

use thiserror::Error;

/// One future week of the univariate forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub expected: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Errors from fitting the univariate model.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("series too short to fit: {0} points")]
    TooShort(usize),

    #[error("degenerate all-zero series")]
    DegenerateSeries,
}

/// Strategy interface for the weekly count forecast.
pub trait WeeklyForecastModel {
    /// Projects `horizon` weeks past the end of `series`.
    ///
    /// # Errors
    ///
    /// Returns an error when the series cannot support a fit; callers
    /// degrade to a flat baseline rather than failing the whole response.
    fn forecast(&self, series: &[f64], horizon: usize) -> Result<Vec<ForecastPoint>, ForecastError>;
}

/// Holt double exponential smoothing (level + trend) with uncertainty bounds
/// derived from one-step-ahead residuals.
#[derive(Debug, Clone, Copy)]
pub struct HoltForecaster {
    /// Level smoothing factor.
    pub alpha: f64,
    /// Trend smoothing factor.
    pub beta: f64,
}

impl Default for HoltForecaster {
    fn default() -> Self {
        Self {
            alpha: 0.4,
            beta: 0.1,
        }
    }
}

impl WeeklyForecastModel for HoltForecaster {
    fn forecast(&self, series: &[f64], horizon: usize) -> Result<Vec<ForecastPoint>, ForecastError> {
        if series.len() < 2 {
            return Err(ForecastError::TooShort(series.len()));
        }
        if series.iter().all(|value| *value == 0.0) {
            return Err(ForecastError::DegenerateSeries);
        }

        let mut level = series[0];
        let mut trend = series[1] - series[0];
        let mut squared_residuals = 0.0;
        let mut residual_count = 0usize;

        for &observation in &series[1..] {
            let one_step = level + trend;
            let residual = observation - one_step;
            squared_residuals += residual * residual;
            residual_count += 1;

            let next_level = self
                .alpha
                .mul_add(observation, (1.0 - self.alpha) * (level + trend));
            trend = self
                .beta
                .mul_add(next_level - level, (1.0 - self.beta) * trend);
            level = next_level;
        }

        let sigma = (squared_residuals / residual_count.max(1) as f64).sqrt();

        Ok((1..=horizon)
            .map(|step| {
                let expected = trend.mul_add(step as f64, level).max(0.0);
                let band = 1.96 * sigma * (step as f64).sqrt();
                ForecastPoint {
                    expected,
                    lower: (expected - band).max(0.0),
                    upper: expected + band,
                }
            })
            .collect())
    }
}
