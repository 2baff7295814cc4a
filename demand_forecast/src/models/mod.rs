//! Forecasting models for weekly family demand
//!
//! Each model comes as a pair: an untrained configuration implementing
//! [`ForecastModel`] and the fitted state it produces, implementing
//! [`TrainedForecastModel`]. [`TrainedModel`] tags the three fitted variants
//! so callers can select one by [`ModelKind`] at runtime.

use crate::aggregate::WeeklyAggregate;
use crate::error::{ForecastError, Result};
use crate::features::FeatureRow;
use crate::promotion::PromotionLookup;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

pub mod rolling_mean;
pub mod seasonal;
pub mod tree;

pub use rolling_mean::{RollingMeanModel, TrainedRollingMean};
pub use seasonal::{SeasonalAdditiveModel, TrainedSeasonalAdditive};
pub use tree::{TrainedTreeRegression, TreeRegressionModel};

/// Which forecasting backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RollingMean,
    TreeRegression,
    SeasonalAdditive,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RollingMean,
        ModelKind::TreeRegression,
        ModelKind::SeasonalAdditive,
    ];

    /// Short tag used in artifact names and tables
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RollingMean => "rolling_mean",
            ModelKind::TreeRegression => "tree",
            ModelKind::SeasonalAdditive => "seasonal",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rolling_mean" | "rolling-mean" | "naive" => Ok(ModelKind::RollingMean),
            "tree" | "tree_regression" | "gbt" | "xgboost" => Ok(ModelKind::TreeRegression),
            "seasonal" | "seasonal_additive" | "prophet" => Ok(ModelKind::SeasonalAdditive),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown model kind: {}",
                other
            ))),
        }
    }
}

/// One forecast week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_quantity: f64,
}

/// Forecast result: one point per requested week, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    family: String,
    kind: ModelKind,
    points: Vec<ForecastPoint>,
}

#[derive(Serialize)]
struct ForecastCsvRow<'a> {
    date: NaiveDate,
    family: &'a str,
    model: &'a str,
    prediction: f64,
}

impl ForecastResult {
    /// Create a new forecast result; dates must advance by exactly one week
    pub fn new(family: impl Into<String>, kind: ModelKind, points: Vec<ForecastPoint>) -> Result<Self> {
        for pair in points.windows(2) {
            if pair[1].date - pair[0].date != Duration::weeks(1) {
                return Err(ForecastError::ValidationError(format!(
                    "Forecast dates {} and {} are not one week apart",
                    pair[0].date, pair[1].date
                )));
            }
        }

        Ok(Self {
            family: family.into(),
            kind,
            points,
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Get the forecasted values
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted_quantity).collect()
    }

    /// Get the forecast dates
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Serialize the forecast as JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write `date,family,model,prediction` rows
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_writer(BufWriter::new(File::create(path)?));
        for point in &self.points {
            writer.serialize(ForecastCsvRow {
                date: point.date,
                family: &self.family,
                model: self.kind.as_str(),
                prediction: point.predicted_quantity,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Training input for one family: its weekly series and feature rows
#[derive(Debug, Clone)]
pub struct FamilyHistory {
    family: String,
    weekly: Vec<WeeklyAggregate>,
    features: Vec<FeatureRow>,
}

impl FamilyHistory {
    /// Bundle a family's weekly rows with the features built from them
    pub fn new(weekly: Vec<WeeklyAggregate>, features: Vec<FeatureRow>) -> Result<Self> {
        let family = weekly
            .first()
            .map(|w| w.family.clone())
            .ok_or_else(|| ForecastError::EmptyInput("family history has no weeks".to_string()))?;

        if weekly.iter().any(|w| w.family != family)
            || features.iter().any(|f| f.aggregate.family != family)
        {
            return Err(ForecastError::DataError(format!(
                "History for '{}' contains rows of another family",
                family
            )));
        }
        if weekly.windows(2).any(|p| p[1].week_start <= p[0].week_start) {
            return Err(ForecastError::DataError(format!(
                "History for '{}' is not in strictly increasing week order",
                family
            )));
        }

        Ok(Self {
            family,
            weekly,
            features,
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn weekly(&self) -> &[WeeklyAggregate] {
        &self.weekly
    }

    pub fn features(&self) -> &[FeatureRow] {
        &self.features
    }

    /// Monday of the most recent week
    pub fn last_week(&self) -> NaiveDate {
        // non-empty by construction
        self.weekly[self.weekly.len() - 1].week_start
    }

    /// `(week_start, total_quantity)` pairs
    pub fn quantity_series(&self) -> Vec<(NaiveDate, f64)> {
        self.weekly
            .iter()
            .map(|w| (w.week_start, w.total_quantity as f64))
            .collect()
    }
}

/// Inference-time inputs shared by all models
#[derive(Debug, Clone, Copy)]
pub struct PredictionContext<'a> {
    pub promotions: &'a PromotionLookup,
    /// Seed for models that draw random perturbations
    pub seed: Option<u64>,
}

impl<'a> PredictionContext<'a> {
    pub fn new(promotions: &'a PromotionLookup) -> Self {
        Self {
            promotions,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Trained forecast model for a single family
pub trait TrainedForecastModel: fmt::Debug + Send + Sync {
    /// Forecast the `horizon` weeks following the training data
    fn predict(&self, horizon: usize, context: &PredictionContext<'_>) -> Result<ForecastResult>;

    /// Family the model was fitted on
    fn family(&self) -> &str;

    fn kind(&self) -> ModelKind;

    /// Last week seen during training
    fn last_week(&self) -> NaiveDate;
}

/// Forecast model that can be trained on one family's history
pub trait ForecastModel: fmt::Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a family's history
    fn fit(&self, history: &FamilyHistory) -> Result<Self::Trained>;

    fn kind(&self) -> ModelKind;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// A fitted model of any kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    RollingMean(TrainedRollingMean),
    TreeRegression(TrainedTreeRegression),
    SeasonalAdditive(TrainedSeasonalAdditive),
}

impl TrainedModel {
    fn inner(&self) -> &dyn TrainedForecastModel {
        match self {
            TrainedModel::RollingMean(m) => m,
            TrainedModel::TreeRegression(m) => m,
            TrainedModel::SeasonalAdditive(m) => m,
        }
    }
}

impl TrainedForecastModel for TrainedModel {
    fn predict(&self, horizon: usize, context: &PredictionContext<'_>) -> Result<ForecastResult> {
        self.inner().predict(horizon, context)
    }

    fn family(&self) -> &str {
        self.inner().family()
    }

    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }

    fn last_week(&self) -> NaiveDate {
        self.inner().last_week()
    }
}

impl From<TrainedRollingMean> for TrainedModel {
    fn from(model: TrainedRollingMean) -> Self {
        TrainedModel::RollingMean(model)
    }
}

impl From<TrainedTreeRegression> for TrainedModel {
    fn from(model: TrainedTreeRegression) -> Self {
        TrainedModel::TreeRegression(model)
    }
}

impl From<TrainedSeasonalAdditive> for TrainedModel {
    fn from(model: TrainedSeasonalAdditive) -> Self {
        TrainedModel::SeasonalAdditive(model)
    }
}

/// Configuration for all three model kinds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub rolling_mean: RollingMeanModel,
    pub tree: TreeRegressionModel,
    pub seasonal: SeasonalAdditiveModel,
}

impl ModelSettings {
    pub fn validate(&self) -> Result<()> {
        self.rolling_mean.validate()?;
        self.tree.validate()?;
        self.seasonal.validate()
    }

    /// Fit the model of the requested kind
    pub fn fit(&self, kind: ModelKind, history: &FamilyHistory) -> Result<TrainedModel> {
        Ok(match kind {
            ModelKind::RollingMean => self.rolling_mean.fit(history)?.into(),
            ModelKind::TreeRegression => self.tree.fit(history)?.into(),
            ModelKind::SeasonalAdditive => self.seasonal.fit(history)?.into(),
        })
    }
}
