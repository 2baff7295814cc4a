//! Forecast evaluation against held-out weekly truth

use crate::aggregate::WeeklyAggregate;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastResult, ModelKind};
use chrono::NaiveDate;
use demand_math::stats::accuracy_metrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Accuracy of one forecast over the weeks it shares with the truth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub family: String,
    pub kind: ModelKind,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub n_matched_weeks: usize,
    /// Forecast weeks with no truth row
    pub n_forecast_only: usize,
    /// Truth weeks the forecast does not cover
    pub n_truth_only: usize,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation for {} ({}):", self.family, self.kind)?;
        writeln!(f, "  RMSE: {:.4}", self.rmse)?;
        writeln!(f, "  MAE: {:.4}", self.mae)?;
        writeln!(f, "  R2: {:.4}", self.r2)?;
        write!(
            f,
            "  Weeks matched: {} (forecast only: {}, truth only: {})",
            self.n_matched_weeks, self.n_forecast_only, self.n_truth_only
        )
    }
}

/// `(date, actual, predicted)` for every week present on both sides
pub fn matched_weeks(
    forecast: &ForecastResult,
    truth: &[WeeklyAggregate],
) -> Vec<(NaiveDate, f64, f64)> {
    let actual: BTreeMap<NaiveDate, f64> = truth
        .iter()
        .filter(|w| w.family == forecast.family())
        .map(|w| (w.week_start, w.total_quantity as f64))
        .collect();

    forecast
        .points()
        .iter()
        .filter_map(|p| actual.get(&p.date).map(|&a| (p.date, a, p.predicted_quantity)))
        .collect()
}

/// Inner-join a forecast with the truth rows of its family and score it
pub fn evaluate(forecast: &ForecastResult, truth: &[WeeklyAggregate]) -> Result<EvaluationReport> {
    let matched = matched_weeks(forecast, truth);
    if matched.is_empty() {
        return Err(ForecastError::NoOverlap {
            family: forecast.family().to_string(),
        });
    }

    let n_truth = truth
        .iter()
        .filter(|w| w.family == forecast.family())
        .count();
    let n_forecast_only = forecast.horizons() - matched.len();
    let n_truth_only = n_truth.saturating_sub(matched.len());

    if n_forecast_only > 0 || n_truth_only > 0 {
        warn!(
            family = forecast.family(),
            model = %forecast.kind(),
            forecast_only = n_forecast_only,
            truth_only = n_truth_only,
            "Dropped unmatched weeks from evaluation"
        );
    }

    let actual: Vec<f64> = matched.iter().map(|(_, a, _)| *a).collect();
    let predicted: Vec<f64> = matched.iter().map(|(_, _, p)| *p).collect();
    let metrics = accuracy_metrics(&actual, &predicted)?;

    Ok(EvaluationReport {
        family: forecast.family().to_string(),
        kind: forecast.kind(),
        rmse: metrics.rmse,
        mae: metrics.mae,
        r2: metrics.r2,
        n_matched_weeks: matched.len(),
        n_forecast_only,
        n_truth_only,
    })
}
