//! Naive rolling-mean model
//!
//! Each forecast week is the mean of the most recent `window` weeks, nudged
//! by a uniform random offset of at most `variation` times that mean.
//! Predictions feed back into the window, so noise introduced early in the
//! horizon carries forward and errors compound over long horizons.

use crate::error::{ForecastError, Result};
use crate::models::{
    FamilyHistory, ForecastModel, ForecastPoint, ForecastResult, ModelKind, PredictionContext,
    TrainedForecastModel,
};
use crate::projector::future_weeks;
use chrono::NaiveDate;
use demand_math::moving_averages::{lagged_rolling_mean, SimpleMovingAverage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Rolling mean model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingMeanModel {
    /// Number of trailing weeks averaged
    pub window: usize,
    /// Maximum relative perturbation
    pub variation: f64,
}

impl Default for RollingMeanModel {
    fn default() -> Self {
        Self {
            window: 3,
            variation: 0.05,
        }
    }
}

/// Trained rolling mean model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedRollingMean {
    family: String,
    window: usize,
    variation: f64,
    /// `(week_start, quantity)` for every training week
    history: Vec<(NaiveDate, f64)>,
}

impl RollingMeanModel {
    /// Create a new rolling mean model
    pub fn new(window: usize, variation: f64) -> Result<Self> {
        let model = Self { window, variation };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ForecastError::InvalidParameter(
                "Window size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.variation) {
            return Err(ForecastError::InvalidParameter(
                "Variation must be in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

impl ForecastModel for RollingMeanModel {
    type Trained = TrainedRollingMean;

    fn fit(&self, history: &FamilyHistory) -> Result<Self::Trained> {
        self.validate()?;

        Ok(TrainedRollingMean {
            family: history.family().to_string(),
            window: self.window,
            variation: self.variation,
            history: history.quantity_series(),
        })
    }

    fn kind(&self) -> ModelKind {
        ModelKind::RollingMean
    }

    fn name(&self) -> &str {
        "Rolling Mean"
    }
}

impl TrainedRollingMean {
    pub fn window(&self) -> usize {
        self.window
    }

    pub fn variation(&self) -> f64 {
        self.variation
    }

    pub fn history(&self) -> &[(NaiveDate, f64)] {
        &self.history
    }

    /// One-step-ahead rolling means over the training weeks, without noise
    pub fn fitted_values(&self) -> Result<Vec<(NaiveDate, Option<f64>)>> {
        let quantities: Vec<f64> = self.history.iter().map(|(_, q)| *q).collect();
        let means = lagged_rolling_mean(&quantities, self.window)?;
        Ok(self
            .history
            .iter()
            .map(|(d, _)| *d)
            .zip(means)
            .collect())
    }
}

impl TrainedForecastModel for TrainedRollingMean {
    fn predict(&self, horizon: usize, context: &PredictionContext<'_>) -> Result<ForecastResult> {
        let mut rng = match context.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Trailing window over history, then over our own predictions
        let mut recent = SimpleMovingAverage::new(self.window)?;
        let start = self.history.len().saturating_sub(self.window);
        for (_, quantity) in &self.history[start..] {
            recent.update(*quantity);
        }

        let dates = future_weeks(self.last_week(), horizon)?;
        let mut points = Vec::with_capacity(dates.len());

        for date in dates {
            let mean = recent.partial_value().map_err(|_| {
                ForecastError::EmptyInput(format!("no history for family '{}'", self.family))
            })?;
            let offset = if self.variation > 0.0 {
                rng.gen_range(-self.variation..=self.variation)
            } else {
                0.0
            };
            let predicted_quantity = mean + offset * mean;

            points.push(ForecastPoint {
                date,
                predicted_quantity,
            });
            recent.update(predicted_quantity);
        }

        ForecastResult::new(self.family.clone(), ModelKind::RollingMean, points)
    }

    fn family(&self) -> &str {
        &self.family
    }

    fn kind(&self) -> ModelKind {
        ModelKind::RollingMean
    }

    fn last_week(&self) -> NaiveDate {
        self.history
            .last()
            .map(|(d, _)| *d)
            .unwrap_or(NaiveDate::MIN)
    }
}
