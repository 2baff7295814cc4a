//! Training loop and forecast service
//!
//! Training runs the full chain per family: weekly aggregation, feature
//! construction and one fit per model kind. Families share nothing but the
//! read-only promotion calendar, so they train in parallel.

use crate::aggregate::{aggregate_weekly, family_series, WeeklyAggregate};
use crate::config::PipelineConfig;
use crate::data::{self, TransactionRecord};
use crate::error::{ForecastError, Result};
use crate::evaluation::{evaluate, EvaluationReport};
use crate::features::FeatureBuilder;
use crate::models::{
    FamilyHistory, ForecastResult, ModelKind, ModelSettings, PredictionContext,
    TrainedForecastModel, TrainedModel,
};
use crate::promotion::PromotionLookup;
use crate::store::ModelStore;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Build the training input for one family from the weekly table
pub fn family_history(
    weekly: &[WeeklyAggregate],
    family: &str,
    builder: &FeatureBuilder,
    promotions: &PromotionLookup,
) -> Result<FamilyHistory> {
    let series: Vec<WeeklyAggregate> = family_series(weekly, family).into_iter().cloned().collect();
    if series.is_empty() {
        return Err(ForecastError::EmptyInput(format!(
            "no weekly rows for family '{}'",
            family
        )));
    }
    let features = builder.build(&series, promotions)?;
    FamilyHistory::new(series, features)
}

/// Fit every model kind on one family's history
pub fn fit_all_kinds(history: &FamilyHistory, settings: &ModelSettings) -> Result<Vec<TrainedModel>> {
    ModelKind::ALL
        .iter()
        .map(|&kind| settings.fit(kind, history))
        .collect()
}

/// Aggregate, featurize and fit all three models for one family
pub fn train_family(
    records: &[TransactionRecord],
    family: &str,
    config: &PipelineConfig,
    promotions: &PromotionLookup,
) -> Result<Vec<TrainedModel>> {
    let weekly = aggregate_weekly(records, &[family])?;
    let builder = FeatureBuilder::new(config.features.clone())?;
    let history = family_history(&weekly, family, &builder, promotions)?;
    let models = fit_all_kinds(&history, &config.models)?;

    info!(
        family,
        weeks = history.weekly().len(),
        last_week = %history.last_week(),
        "Trained family models"
    );
    Ok(models)
}

/// Outcome of a multi-family training run
#[derive(Debug, Default)]
pub struct TrainingSummary {
    /// Family and the artifacts written for it
    pub trained: Vec<(String, Vec<PathBuf>)>,
    /// Family and the error that stopped it
    pub failed: Vec<(String, ForecastError)>,
}

impl TrainingSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Train and save models for every configured family in parallel
///
/// A failure in one family is recorded and does not stop the others.
pub fn train_all(
    records: &[TransactionRecord],
    config: &PipelineConfig,
    promotions: &PromotionLookup,
    store: &ModelStore,
) -> Result<TrainingSummary> {
    config.validate()?;
    let families = if config.families.is_empty() {
        data::families(records)
    } else {
        config.families.clone()
    };
    if families.is_empty() {
        return Err(ForecastError::EmptyInput("no families to train".to_string()));
    }

    let filter: Vec<&str> = families.iter().map(String::as_str).collect();
    let weekly = aggregate_weekly(records, &filter)?;
    let builder = FeatureBuilder::new(config.features.clone())?;

    let results: Vec<(String, Result<Vec<PathBuf>>)> = families
        .par_iter()
        .map(|family| {
            let outcome = family_history(&weekly, family, &builder, promotions)
                .and_then(|history| fit_all_kinds(&history, &config.models))
                .and_then(|models| models.iter().map(|m| store.save(m)).collect());
            (family.clone(), outcome)
        })
        .collect();

    let mut summary = TrainingSummary::default();
    for (family, outcome) in results {
        match outcome {
            Ok(paths) => {
                info!(family = %family, artifacts = paths.len(), "Family trained");
                summary.trained.push((family, paths));
            }
            Err(e) => {
                error!(family = %family, error = %e, "Family training failed");
                summary.failed.push((family, e));
            }
        }
    }
    Ok(summary)
}

/// Serves forecasts and evaluations from stored artifacts
#[derive(Debug, Clone)]
pub struct ForecastService {
    store: ModelStore,
    promotions: Arc<PromotionLookup>,
    seed: Option<u64>,
}

impl ForecastService {
    pub fn new(store: ModelStore, promotions: Arc<PromotionLookup>) -> Self {
        Self {
            store,
            promotions,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    fn context(&self) -> PredictionContext<'_> {
        let context = PredictionContext::new(&self.promotions);
        match self.seed {
            Some(seed) => context.with_seed(seed),
            None => context,
        }
    }

    /// Forecast `horizon` weeks for a family with a stored model
    pub fn predict(&self, family: &str, kind: ModelKind, horizon: usize) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be at least one week".to_string(),
            ));
        }
        let model = self.store.load(kind, family)?;
        model.predict(horizon, &self.context())
    }

    /// Forecast and score against weekly ground truth
    pub fn evaluate(
        &self,
        family: &str,
        kind: ModelKind,
        horizon: usize,
        ground_truth: &[WeeklyAggregate],
    ) -> Result<EvaluationReport> {
        let forecast = self.predict(family, kind, horizon)?;
        evaluate(&forecast, ground_truth)
    }

    /// Like [`ForecastService::evaluate`] with raw test transactions as truth
    pub fn evaluate_transactions(
        &self,
        family: &str,
        kind: ModelKind,
        horizon: usize,
        transactions: &[TransactionRecord],
    ) -> Result<EvaluationReport> {
        let truth = aggregate_weekly(transactions, &[family])?;
        self.evaluate(family, kind, horizon, &truth)
    }
}
