//! Trend plus Fourier seasonality model
//!
//! A piecewise-linear trend with evenly spaced changepoint candidates is
//! combined with yearly and weekly Fourier terms. In multiplicative mode the
//! expectation is `trend * (1 + seasonal)`, in additive mode
//! `trend + seasonal`. Trend and seasonal coefficients are estimated by
//! alternating ridge regressions on the max-scaled series; the ridge penalty
//! on each block is the inverse square of its prior scale.

use crate::error::{ForecastError, Result};
use crate::models::{
    FamilyHistory, ForecastModel, ForecastPoint, ForecastResult, ModelKind, PredictionContext,
    TrainedForecastModel,
};
use crate::projector::future_weeks;
use chrono::NaiveDate;
use demand_math::linear::{dot, ridge_solve};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

const YEARLY_PERIOD: f64 = 365.25;
const WEEKLY_PERIOD: f64 = 7.0;
/// Near-free penalty for the trend intercept and base slope
const TREND_PENALTY: f64 = 1e-6;
const FIT_PASSES: usize = 3;
const EPSILON: f64 = 1e-9;

/// How the seasonal component combines with the trend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalityMode {
    Additive,
    #[default]
    Multiplicative,
}

/// Seasonal model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalAdditiveModel {
    pub n_changepoints: usize,
    /// Share of history in which changepoints may be placed
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    /// Yearly Fourier order, 0 disables
    pub yearly_order: usize,
    /// Weekly Fourier order, 0 disables
    pub weekly_order: usize,
    pub mode: SeasonalityMode,
}

impl Default for SeasonalAdditiveModel {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            // Retail demand shifts quickly, so the trend is allowed to bend
            changepoint_prior_scale: 0.5,
            seasonality_prior_scale: 20.0,
            yearly_order: 10,
            weekly_order: 3,
            mode: SeasonalityMode::Multiplicative,
        }
    }
}

impl SeasonalAdditiveModel {
    pub fn new(changepoint_prior_scale: f64, mode: SeasonalityMode) -> Result<Self> {
        let model = Self {
            changepoint_prior_scale,
            mode,
            ..Self::default()
        };
        model.validate()?;
        Ok(model)
    }

    pub fn with_changepoints(mut self, n: usize) -> Self {
        self.n_changepoints = n;
        self
    }

    pub fn with_orders(mut self, yearly: usize, weekly: usize) -> Self {
        self.yearly_order = yearly;
        self.weekly_order = weekly;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "Changepoint range must be in (0, 1]".to_string(),
            ));
        }
        if !(self.changepoint_prior_scale > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Changepoint prior scale must be positive".to_string(),
            ));
        }
        if !(self.seasonality_prior_scale > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Seasonality prior scale must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn blocks(&self) -> Vec<FourierBlock> {
        [
            ("yearly", YEARLY_PERIOD, self.yearly_order),
            ("weekly", WEEKLY_PERIOD, self.weekly_order),
        ]
        .into_iter()
        .filter(|(_, _, order)| *order > 0)
        .map(|(name, period, order)| FourierBlock {
            name: name.to_string(),
            period,
            order,
        })
        .collect()
    }
}

/// One seasonal component expanded into sine/cosine pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FourierBlock {
    pub name: String,
    /// Period in days
    pub period: f64,
    pub order: usize,
}

impl FourierBlock {
    fn extend_row(&self, days: f64, row: &mut Vec<f64>) {
        for k in 1..=self.order {
            let angle = 2.0 * PI * k as f64 * days / self.period;
            row.push(angle.sin());
            row.push(angle.cos());
        }
    }
}

fn fourier_row(days: f64, blocks: &[FourierBlock]) -> Vec<f64> {
    let mut row = Vec::with_capacity(blocks.iter().map(|b| 2 * b.order).sum());
    for block in blocks {
        block.extend_row(days, &mut row);
    }
    row
}

/// `[1, t, (t - c_1)+, ..., (t - c_n)+]`
fn trend_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len());
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|&c| (t - c).max(0.0)));
    row
}

/// Evenly spaced changepoints over the first `range` share of `t`
fn select_changepoints(t: &[f64], n_changepoints: usize, range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * range).floor() as usize;
    let n = n_changepoints.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    let mut points: Vec<f64> = (1..=n)
        .map(|i| t[(i as f64 * last / n as f64).round() as usize])
        .collect();
    points.dedup();
    points
}

/// Trained seasonal model for one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedSeasonalAdditive {
    family: String,
    mode: SeasonalityMode,
    /// First training week; time origin
    start: NaiveDate,
    last_week: NaiveDate,
    /// Days spanned by the training history
    t_scale: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    /// Intercept, base slope, then one slope change per changepoint
    trend_coefficients: Vec<f64>,
    seasonalities: Vec<FourierBlock>,
    seasonal_coefficients: Vec<f64>,
}

impl ForecastModel for SeasonalAdditiveModel {
    type Trained = TrainedSeasonalAdditive;

    fn fit(&self, history: &FamilyHistory) -> Result<Self::Trained> {
        self.validate()?;

        let series = history.quantity_series();
        let start = series[0].0;
        let days: Vec<f64> = series
            .iter()
            .map(|(d, _)| (*d - start).num_days() as f64)
            .collect();
        let span = days.last().copied().unwrap_or(0.0);
        let t_scale = if span > 0.0 { span } else { 1.0 };
        let t: Vec<f64> = days.iter().map(|d| d / t_scale).collect();

        let max_abs = series.iter().map(|(_, q)| q.abs()).fold(0.0, f64::max);
        let y_scale = if max_abs > 0.0 { max_abs } else { 1.0 };
        let y: Vec<f64> = series.iter().map(|(_, q)| q / y_scale).collect();

        let changepoints = select_changepoints(&t, self.n_changepoints, self.changepoint_range);
        let seasonalities = self.blocks();

        let trend_rows: Vec<Vec<f64>> = t.iter().map(|&ti| trend_row(ti, &changepoints)).collect();
        let season_rows: Vec<Vec<f64>> = days.iter().map(|&d| fourier_row(d, &seasonalities)).collect();

        let mut trend_penalties = vec![TREND_PENALTY; 2];
        trend_penalties.extend(
            std::iter::repeat(1.0 / self.changepoint_prior_scale.powi(2)).take(changepoints.len()),
        );
        let season_penalty = 1.0 / self.seasonality_prior_scale.powi(2);
        let season_penalties = vec![season_penalty; season_rows.first().map(Vec::len).unwrap_or(0)];

        let mut seasonal = vec![0.0; y.len()];
        let mut trend_coefficients = Vec::new();
        let mut seasonal_coefficients = Vec::new();

        for _ in 0..FIT_PASSES {
            let trend_target: Vec<f64> = y
                .iter()
                .zip(seasonal.iter())
                .map(|(&yi, &si)| match self.mode {
                    SeasonalityMode::Additive => yi - si,
                    SeasonalityMode::Multiplicative if (1.0 + si).abs() > EPSILON => yi / (1.0 + si),
                    SeasonalityMode::Multiplicative => yi,
                })
                .collect();
            trend_coefficients = ridge_solve(&trend_rows, &trend_target, &trend_penalties)?;
            let trend: Vec<f64> = trend_rows.iter().map(|r| dot(r, &trend_coefficients)).collect();

            if season_penalties.is_empty() {
                break;
            }

            let season_target: Vec<f64> = y
                .iter()
                .zip(trend.iter())
                .map(|(&yi, &ti)| match self.mode {
                    SeasonalityMode::Additive => yi - ti,
                    SeasonalityMode::Multiplicative if ti.abs() > EPSILON => yi / ti - 1.0,
                    SeasonalityMode::Multiplicative => 0.0,
                })
                .collect();
            seasonal_coefficients = ridge_solve(&season_rows, &season_target, &season_penalties)?;
            seasonal = season_rows.iter().map(|r| dot(r, &seasonal_coefficients)).collect();
        }

        debug!(
            family = history.family(),
            weeks = series.len(),
            changepoints = changepoints.len(),
            "Fitted seasonal model"
        );

        Ok(TrainedSeasonalAdditive {
            family: history.family().to_string(),
            mode: self.mode,
            start,
            last_week: history.last_week(),
            t_scale,
            y_scale,
            changepoints,
            trend_coefficients,
            seasonalities,
            seasonal_coefficients,
        })
    }

    fn kind(&self) -> ModelKind {
        ModelKind::SeasonalAdditive
    }

    fn name(&self) -> &str {
        "Seasonal Additive"
    }
}

impl TrainedSeasonalAdditive {
    fn days_since_start(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64
    }

    /// Trend component on the original quantity scale
    pub fn trend_at(&self, date: NaiveDate) -> f64 {
        let t = self.days_since_start(date) / self.t_scale;
        dot(&trend_row(t, &self.changepoints), &self.trend_coefficients) * self.y_scale
    }

    /// Seasonal component: relative in multiplicative mode, scaled otherwise
    pub fn seasonal_at(&self, date: NaiveDate) -> f64 {
        if self.seasonal_coefficients.is_empty() {
            return 0.0;
        }
        let row = fourier_row(self.days_since_start(date), &self.seasonalities);
        dot(&row, &self.seasonal_coefficients)
    }

    /// Expected quantity for the week starting `date`
    pub fn expectation(&self, date: NaiveDate) -> f64 {
        let trend = self.trend_at(date);
        let seasonal = self.seasonal_at(date);
        match self.mode {
            SeasonalityMode::Additive => trend + seasonal * self.y_scale,
            SeasonalityMode::Multiplicative => trend * (1.0 + seasonal),
        }
    }

    pub fn mode(&self) -> SeasonalityMode {
        self.mode
    }

    /// Changepoint dates inside the training history
    pub fn changepoint_dates(&self) -> Vec<NaiveDate> {
        self.changepoints
            .iter()
            .map(|c| self.start + chrono::Duration::days((c * self.t_scale).round() as i64))
            .collect()
    }

    /// Serialize the fitted parameters as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl TrainedForecastModel for TrainedSeasonalAdditive {
    fn predict(&self, horizon: usize, _context: &PredictionContext<'_>) -> Result<ForecastResult> {
        let points = future_weeks(self.last_week, horizon)?
            .into_iter()
            .map(|date| ForecastPoint {
                date,
                predicted_quantity: self.expectation(date),
            })
            .collect();

        ForecastResult::new(self.family.clone(), ModelKind::SeasonalAdditive, points)
    }

    fn family(&self) -> &str {
        &self.family
    }

    fn kind(&self) -> ModelKind {
        ModelKind::SeasonalAdditive
    }

    fn last_week(&self) -> NaiveDate {
        self.last_week
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::WeeklyAggregate;
    use crate::promotion::PromotionLookup;
    use approx::assert_relative_eq;
    use chrono::{Datelike, Duration};

    fn history<F: Fn(usize, f64) -> f64>(weeks: usize, quantity: F) -> FamilyHistory {
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let weekly = (0..weeks)
            .map(|i| {
                let monday = start + Duration::weeks(i as i64);
                let days = (monday - start).num_days() as f64;
                let q = quantity(i, days).round() as i64;
                WeeklyAggregate {
                    family: "Activewear".to_string(),
                    year: monday.iso_week().year(),
                    iso_week: monday.iso_week().week(),
                    month: monday.month(),
                    week_start: monday,
                    mean_price_initial: 40.0,
                    mean_price_sold: 35.0,
                    total_revenue: 35.0 * q as f64,
                    total_discount: 5.0 * q as f64,
                    total_quantity: q,
                }
            })
            .collect();
        FamilyHistory::new(weekly, Vec::new()).unwrap()
    }

    #[test]
    fn test_constant_series() {
        let trained = SeasonalAdditiveModel::default()
            .fit(&history(60, |_, _| 50.0))
            .unwrap();
        let lookup = PromotionLookup::empty();
        let forecast = trained.predict(4, &PredictionContext::new(&lookup)).unwrap();

        assert_eq!(forecast.horizons(), 4);
        for value in forecast.values() {
            assert_relative_eq!(value, 50.0, epsilon = 0.5);
        }
    }

    #[test]
    fn test_linear_growth_is_extrapolated() {
        let trained = SeasonalAdditiveModel::default()
            .fit(&history(104, |i, _| 100.0 + 2.0 * i as f64))
            .unwrap();
        let lookup = PromotionLookup::empty();
        let forecast = trained.predict(4, &PredictionContext::new(&lookup)).unwrap();

        for (k, value) in forecast.values().into_iter().enumerate() {
            let expected = 100.0 + 2.0 * (104 + k) as f64;
            assert!((value - expected).abs() / expected < 0.05, "{} vs {}", value, expected);
        }
    }

    #[test]
    fn test_yearly_cycle_is_captured() {
        let trained = SeasonalAdditiveModel::default()
            .fit(&history(156, |_, d| 100.0 * (1.0 + 0.3 * (2.0 * PI * d / YEARLY_PERIOD).sin())))
            .unwrap();

        // Origin is 2021-01-04: the cycle peaks about 13 weeks in and bottoms out 39 weeks in
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let peak = start + Duration::weeks(156 + 13);
        let trough = start + Duration::weeks(156 + 39);
        assert!(trained.expectation(peak) > trained.expectation(trough) + 20.0);
        assert!(trained.seasonal_at(peak) > 0.0);
    }

    #[test]
    fn test_dates_strictly_after_cutoff() {
        let trained = SeasonalAdditiveModel::default()
            .fit(&history(30, |i, _| 20.0 + i as f64))
            .unwrap();
        let lookup = PromotionLookup::empty();
        let forecast = trained.predict(3, &PredictionContext::new(&lookup)).unwrap();

        assert_eq!(forecast.dates()[0], trained.last_week() + Duration::weeks(1));
        assert!(forecast.dates().iter().all(|d| d.weekday() == chrono::Weekday::Mon));
    }

    #[test]
    fn test_json_round_trip_predicts_same() {
        let trained = SeasonalAdditiveModel::new(0.5, SeasonalityMode::Additive)
            .unwrap()
            .fit(&history(40, |i, _| 30.0 + (i % 5) as f64))
            .unwrap();
        let restored = TrainedSeasonalAdditive::from_json(&trained.to_json().unwrap()).unwrap();

        let date = trained.last_week() + Duration::weeks(2);
        assert_relative_eq!(trained.expectation(date), restored.expectation(date), epsilon = 1e-9);
        assert_eq!(restored.mode(), SeasonalityMode::Additive);
    }

    #[test]
    fn test_changepoints_inside_range() {
        let trained = SeasonalAdditiveModel::default()
            .fit(&history(100, |i, _| 10.0 + i as f64))
            .unwrap();
        let dates = trained.changepoint_dates();

        assert_eq!(dates.len(), 25);
        let cutoff = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap() + Duration::weeks(80);
        assert!(dates.iter().all(|d| *d < cutoff));
    }

    #[test]
    fn test_short_history_without_changepoints() {
        let trained = SeasonalAdditiveModel::default()
            .with_changepoints(0)
            .with_orders(0, 0)
            .fit(&history(1, |_, _| 7.0))
            .unwrap();
        assert_relative_eq!(trained.expectation(trained.last_week()), 7.0, epsilon = 1e-3);
    }

    #[test]
    fn test_parameter_validation() {
        assert!(SeasonalAdditiveModel::new(0.0, SeasonalityMode::Additive).is_err());
        let bad_range = SeasonalAdditiveModel {
            changepoint_range: 1.5,
            ..SeasonalAdditiveModel::default()
        };
        assert!(bad_range.validate().is_err());
    }
}
