//! Gradient-boosted regression trees
//!
//! Squared-loss boosting over the covariates that are known for future weeks
//! (calendar fields, discount rate and promotion channel). Training uses the
//! same covariate layout the horizon projector produces at inference time.

use crate::error::{ForecastError, Result};
use crate::features::{drop_incomplete, KnownCovariates};
use crate::models::{
    FamilyHistory, ForecastModel, ForecastPoint, ForecastResult, ModelKind, PredictionContext,
    TrainedForecastModel,
};
use crate::projector::HorizonProjector;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

const MIN_GAIN: f64 = 1e-12;

/// Boosted tree ensemble configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeRegressionModel {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeRegressionModel {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 5,
            min_samples_leaf: 1,
        }
    }
}

impl TreeRegressionModel {
    pub fn new(
        n_estimators: usize,
        learning_rate: f64,
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Result<Self> {
        let model = Self {
            n_estimators,
            learning_rate,
            max_depth,
            min_samples_leaf,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "Number of estimators must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ForecastError::InvalidParameter(
                "Learning rate must be in (0, 1]".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ForecastError::InvalidParameter(
                "Max depth must be positive".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForecastError::InvalidParameter(
                "Minimum samples per leaf must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single regression tree in flat array form
///
/// Children are node indices when non-negative and `-(leaf + 1)` otherwise.
/// A tree with no internal nodes is a single leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    split_features: Vec<usize>,
    thresholds: Vec<f64>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_values: Vec<f64>,
}

struct Split {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl RegressionTree {
    fn fit(
        rows: &[Vec<f64>],
        residuals: &[f64],
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self {
        let mut tree = Self {
            split_features: Vec::new(),
            thresholds: Vec::new(),
            left_child: Vec::new(),
            right_child: Vec::new(),
            leaf_values: Vec::new(),
        };
        let indices: Vec<usize> = (0..rows.len()).collect();
        tree.grow(rows, residuals, indices, 0, max_depth, min_samples_leaf);
        tree
    }

    /// Grow a subtree and return its child code
    fn grow(
        &mut self,
        rows: &[Vec<f64>],
        residuals: &[f64],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> i32 {
        let split = if depth < max_depth {
            best_split(rows, residuals, &indices, min_samples_leaf)
        } else {
            None
        };

        match split {
            None => {
                let sum: f64 = indices.iter().map(|&i| residuals[i]).sum();
                let value = if indices.is_empty() {
                    0.0
                } else {
                    sum / indices.len() as f64
                };
                self.leaf_values.push(value);
                -(self.leaf_values.len() as i32)
            }
            Some(split) => {
                // Pre-order allocation keeps the root at node 0
                let node = self.split_features.len();
                self.split_features.push(split.feature);
                self.thresholds.push(split.threshold);
                self.left_child.push(-1);
                self.right_child.push(-1);

                let left = self.grow(rows, residuals, split.left, depth + 1, max_depth, min_samples_leaf);
                let right = self.grow(rows, residuals, split.right, depth + 1, max_depth, min_samples_leaf);
                self.left_child[node] = left;
                self.right_child[node] = right;
                node as i32
            }
        }
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        if self.split_features.is_empty() {
            return self.leaf_values.first().copied().unwrap_or_default();
        }

        let mut node_idx = 0usize;
        loop {
            let feature_value = features
                .get(self.split_features[node_idx])
                .copied()
                .unwrap_or(0.0);
            let child = if feature_value <= self.thresholds[node_idx] {
                self.left_child[node_idx]
            } else {
                self.right_child[node_idx]
            };

            if child < 0 {
                let leaf_idx = (-child - 1) as usize;
                return self.leaf_values.get(leaf_idx).copied().unwrap_or_default();
            }

            node_idx = child as usize;
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.leaf_values.len()
    }

    pub fn split_features(&self) -> &[usize] {
        &self.split_features
    }
}

/// Exact greedy search for the split with the largest variance reduction
fn best_split(
    rows: &[Vec<f64>],
    residuals: &[f64],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<Split> {
    let n = indices.len();
    if n < 2 * min_samples_leaf {
        return None;
    }

    let total: f64 = indices.iter().map(|&i| residuals[i]).sum();
    let parent_score = total * total / n as f64;
    let n_features = rows.first().map(Vec::len).unwrap_or(0);

    let mut best: Option<(f64, usize, f64)> = None;
    let mut sorted = indices.to_vec();

    for feature in 0..n_features {
        sorted.sort_by(|&a, &b| {
            rows[a][feature]
                .partial_cmp(&rows[b][feature])
                .unwrap_or(Ordering::Equal)
        });

        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += residuals[sorted[pos]];
            let left_n = pos + 1;
            let right_n = n - left_n;
            if left_n < min_samples_leaf || right_n < min_samples_leaf {
                continue;
            }

            let here = rows[sorted[pos]][feature];
            let next = rows[sorted[pos + 1]][feature];
            if next <= here {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64
                - parent_score;
            if gain > MIN_GAIN && best.map_or(true, |(g, _, _)| gain > g) {
                best = Some((gain, feature, (here + next) / 2.0));
            }
        }
    }

    let (_, feature, threshold) = best?;
    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| rows[i][feature] <= threshold);

    Some(Split {
        feature,
        threshold,
        left,
        right,
    })
}

/// Trained boosted ensemble for one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedTreeRegression {
    family: String,
    last_week: NaiveDate,
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
}

impl ForecastModel for TreeRegressionModel {
    type Trained = TrainedTreeRegression;

    fn fit(&self, history: &FamilyHistory) -> Result<Self::Trained> {
        self.validate()?;

        let complete = drop_incomplete(history.features().to_vec());
        if complete.is_empty() {
            return Err(ForecastError::ModelError(format!(
                "No complete feature rows to train on for family '{}'",
                history.family()
            )));
        }

        let rows: Vec<Vec<f64>> = complete.iter().map(|r| r.covariates.values()).collect();
        let targets: Vec<f64> = complete.iter().map(|r| r.target()).collect();

        let base = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut current = vec![base; targets.len()];
        let mut trees = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(current.iter())
                .map(|(y, f)| y - f)
                .collect();

            let tree = RegressionTree::fit(&rows, &residuals, self.max_depth, self.min_samples_leaf);
            for (value, row) in current.iter_mut().zip(rows.iter()) {
                *value += self.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        debug!(
            family = history.family(),
            rows = rows.len(),
            trees = trees.len(),
            "Fitted boosted trees"
        );

        Ok(TrainedTreeRegression {
            family: history.family().to_string(),
            last_week: history.last_week(),
            base,
            learning_rate: self.learning_rate,
            trees,
            feature_names: KnownCovariates::NAMES.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn kind(&self) -> ModelKind {
        ModelKind::TreeRegression
    }

    fn name(&self) -> &str {
        "Gradient Boosted Trees"
    }
}

impl TrainedTreeRegression {
    /// Score a single covariate vector
    pub fn predict_row(&self, features: &[f64]) -> f64 {
        self.base
            + self
                .trees
                .iter()
                .map(|tree| self.learning_rate * tree.predict(features))
                .sum::<f64>()
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of splits made on each feature across the ensemble
    pub fn feature_importance(&self) -> Vec<(String, usize)> {
        let mut counts = vec![0usize; self.feature_names.len()];
        for feature in self.trees.iter().flat_map(|t| t.split_features().iter()) {
            if let Some(count) = counts.get_mut(*feature) {
                *count += 1;
            }
        }
        self.feature_names.iter().cloned().zip(counts).collect()
    }
}

impl TrainedForecastModel for TrainedTreeRegression {
    fn predict(&self, horizon: usize, context: &PredictionContext<'_>) -> Result<ForecastResult> {
        let rows = HorizonProjector::new(context.promotions).project(
            &self.family,
            self.last_week,
            horizon,
        )?;

        let points = rows
            .iter()
            .map(|row| ForecastPoint {
                date: row.week_start,
                predicted_quantity: self.predict_row(&row.covariates.values()),
            })
            .collect();

        ForecastResult::new(self.family.clone(), ModelKind::TreeRegression, points)
    }

    fn family(&self) -> &str {
        &self.family
    }

    fn kind(&self) -> ModelKind {
        ModelKind::TreeRegression
    }

    fn last_week(&self) -> NaiveDate {
        self.last_week
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::WeeklyAggregate;
    use crate::features::FeatureBuilder;
    use crate::promotion::{PromotionChannel, PromotionEntry, PromotionLookup};
    use approx::assert_relative_eq;
    use chrono::{Datelike, Duration};

    fn weekly(quantities: &[i64]) -> Vec<WeeklyAggregate> {
        let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        quantities
            .iter()
            .enumerate()
            .map(|(i, &q)| {
                let monday = start + Duration::weeks(i as i64);
                WeeklyAggregate {
                    family: "Hoodie".to_string(),
                    year: monday.iso_week().year(),
                    iso_week: monday.iso_week().week(),
                    month: monday.month(),
                    week_start: monday,
                    mean_price_initial: 60.0,
                    mean_price_sold: 50.0,
                    total_revenue: 50.0 * q as f64,
                    total_discount: 10.0 * q as f64,
                    total_quantity: q,
                }
            })
            .collect()
    }

    fn history(quantities: &[i64], promotions: &PromotionLookup) -> FamilyHistory {
        let weekly = weekly(quantities);
        let features = FeatureBuilder::default().build(&weekly, promotions).unwrap();
        FamilyHistory::new(weekly, features).unwrap()
    }

    #[test]
    fn test_constant_series_predicts_constant() {
        let lookup = PromotionLookup::empty();
        let model = TreeRegressionModel::default()
            .fit(&history(&[10; 52], &lookup))
            .unwrap();

        let forecast = model.predict(4, &PredictionContext::new(&lookup)).unwrap();
        assert_eq!(forecast.horizons(), 4);
        for value in forecast.values() {
            assert_relative_eq!(value, 10.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_learns_promotion_effect() {
        // Promoted weeks sell 40, the rest sell 10
        let mut entries = Vec::new();
        let mut quantities = Vec::new();
        for i in 0..60 {
            let week = (i % 52) as u32 + 1;
            let year = 2022 + (i / 52) as i32;
            if i % 4 == 0 {
                entries.push((
                    ("Hoodie".to_string(), year, week),
                    PromotionEntry {
                        avg_discount: 0.3,
                        channel: PromotionChannel::Both,
                    },
                ));
                quantities.push(40);
            } else {
                quantities.push(10);
            }
        }
        let lookup = PromotionLookup::from_entries(entries).unwrap();
        let trained = TreeRegressionModel::default()
            .fit(&history(&quantities, &lookup))
            .unwrap();

        let promoted = KnownCovariates {
            month: 6,
            year: 2023,
            iso_week: 30,
            avg_discount: 0.3,
            promotion: PromotionChannel::Both,
        };
        let plain = KnownCovariates {
            avg_discount: 0.0,
            promotion: PromotionChannel::None,
            ..promoted
        };
        assert!(trained.predict_row(&promoted.values()) > 30.0);
        assert!(trained.predict_row(&plain.values()) < 20.0);

        let importance = trained.feature_importance();
        assert!(importance.iter().map(|(_, c)| c).sum::<usize>() > 0);
    }

    #[test]
    fn test_single_split_tree() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let residuals = vec![-1.0, -1.0, 1.0, 1.0];
        let tree = RegressionTree::fit(&rows, &residuals, 3, 1);

        assert_eq!(tree.num_leaves(), 2);
        assert_eq!(tree.predict(&[0.5]), -1.0);
        assert_eq!(tree.predict(&[2.5]), 1.0);
    }

    #[test]
    fn test_min_samples_leaf_blocks_split() {
        let rows = vec![vec![0.0], vec![1.0]];
        let residuals = vec![-1.0, 1.0];
        let tree = RegressionTree::fit(&rows, &residuals, 3, 2);

        assert_eq!(tree.num_leaves(), 1);
        assert_eq!(tree.predict(&[5.0]), 0.0);
    }

    #[test]
    fn test_requires_complete_rows() {
        let lookup = PromotionLookup::empty();
        let err = TreeRegressionModel::default()
            .fit(&history(&[1, 2, 3], &lookup))
            .unwrap_err();
        assert!(matches!(err, ForecastError::ModelError(_)));
    }

    #[test]
    fn test_parameter_validation() {
        assert!(TreeRegressionModel::new(0, 0.1, 5, 1).is_err());
        assert!(TreeRegressionModel::new(10, 0.0, 5, 1).is_err());
        assert!(TreeRegressionModel::new(10, 0.1, 0, 1).is_err());
        assert!(TreeRegressionModel::new(10, 0.1, 5, 0).is_err());
        assert!(TreeRegressionModel::new(10, 0.1, 5, 1).is_ok());
    }
}
