//! Feature construction over a weekly series
//!
//! Every derived feature at week `t` is computed from weeks strictly before
//! `t`. Calendar fields and promotion covariates are known in advance and are
//! attached as-is.

use crate::aggregate::WeeklyAggregate;
use crate::error::{ForecastError, Result};
use crate::promotion::{PromotionChannel, PromotionEntry, PromotionLookup};
use chrono::{Datelike, NaiveDate};
use demand_math::moving_averages::{lagged, lagged_ewma, lagged_rolling_mean};
use serde::{Deserialize, Serialize};

/// Lag offsets and window sizes used by the feature builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub lags: Vec<usize>,
    pub windows: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1],
            windows: vec![3],
        }
    }
}

impl FeatureConfig {
    pub fn new(lags: Vec<usize>, windows: Vec<usize>) -> Result<Self> {
        let config = Self { lags, windows };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lags.iter().chain(self.windows.iter()).any(|&v| v == 0) {
            return Err(ForecastError::InvalidParameter(
                "Lags and windows must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of leading rows that lack full look-back history
    pub fn warmup(&self) -> usize {
        self.lags
            .iter()
            .chain(self.windows.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }
}

/// Covariates that are known ahead of time for any week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnownCovariates {
    pub month: u32,
    pub year: i32,
    pub iso_week: u32,
    pub avg_discount: f64,
    pub promotion: PromotionChannel,
}

impl KnownCovariates {
    /// Column names matching [`KnownCovariates::values`]
    pub const NAMES: [&'static str; 8] = [
        "month",
        "year",
        "week",
        "avg_discount",
        "promo_online",
        "promo_store",
        "promo_both",
        "promo_none",
    ];

    /// Covariates for the ISO week starting on `week_start`
    pub fn for_week(family: &str, week_start: NaiveDate, promotions: &PromotionLookup) -> Self {
        let iso = week_start.iso_week();
        let PromotionEntry {
            avg_discount,
            channel,
        } = promotions.get(family, iso.year(), iso.week());

        Self {
            month: week_start.month(),
            year: iso.year(),
            iso_week: iso.week(),
            avg_discount,
            promotion: channel,
        }
    }

    /// Numeric encoding fed to regression models
    pub fn values(&self) -> Vec<f64> {
        let mut out = vec![
            self.month as f64,
            self.year as f64,
            self.iso_week as f64,
            self.avg_discount,
        ];
        out.extend_from_slice(&self.promotion.indicators());
        out
    }
}

/// A weekly aggregate with its look-back and calendar features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub aggregate: WeeklyAggregate,
    /// `(k, lag_k)`
    pub lags: Vec<(usize, Option<f64>)>,
    /// `(w, rolling_mean_w)`
    pub rolling_means: Vec<(usize, Option<f64>)>,
    /// `(w, ewma_w)`
    pub ewmas: Vec<(usize, Option<f64>)>,
    pub covariates: KnownCovariates,
}

impl FeatureRow {
    pub fn week_start(&self) -> NaiveDate {
        self.aggregate.week_start
    }

    /// Training target
    pub fn target(&self) -> f64 {
        self.aggregate.total_quantity as f64
    }

    pub fn lag(&self, k: usize) -> Option<f64> {
        lookup(&self.lags, k)
    }

    pub fn rolling_mean(&self, window: usize) -> Option<f64> {
        lookup(&self.rolling_means, window)
    }

    pub fn ewma(&self, window: usize) -> Option<f64> {
        lookup(&self.ewmas, window)
    }

    /// Whether every look-back feature is present
    pub fn is_complete(&self) -> bool {
        self.lags
            .iter()
            .chain(self.rolling_means.iter())
            .chain(self.ewmas.iter())
            .all(|(_, v)| v.is_some())
    }
}

fn lookup(values: &[(usize, Option<f64>)], key: usize) -> Option<f64> {
    values.iter().find(|(k, _)| *k == key).and_then(|(_, v)| *v)
}

/// Rows with full look-back history, ready for fitting
pub fn drop_incomplete(rows: Vec<FeatureRow>) -> Vec<FeatureRow> {
    rows.into_iter().filter(FeatureRow::is_complete).collect()
}

/// Builds feature rows for a single family's weekly series
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Derive features for every week of a sorted, single-family series
    pub fn build(
        &self,
        weekly: &[WeeklyAggregate],
        promotions: &PromotionLookup,
    ) -> Result<Vec<FeatureRow>> {
        let first = weekly.first().ok_or_else(|| {
            ForecastError::EmptyInput("no weekly rows to build features from".to_string())
        })?;
        let family = first.family.as_str();

        for pair in weekly.windows(2) {
            if pair[1].family != family {
                return Err(ForecastError::DataError(format!(
                    "Feature input mixes families '{}' and '{}'",
                    family, pair[1].family
                )));
            }
            if pair[1].week_start <= pair[0].week_start {
                return Err(ForecastError::DataError(format!(
                    "Weekly rows for '{}' are not strictly increasing at {}",
                    family, pair[1].week_start
                )));
            }
        }

        let quantities: Vec<f64> = weekly.iter().map(|w| w.total_quantity as f64).collect();

        let lag_columns: Vec<(usize, Vec<Option<f64>>)> = self
            .config
            .lags
            .iter()
            .map(|&k| (k, lagged(&quantities, k)))
            .collect();
        let rolling_columns = self
            .config
            .windows
            .iter()
            .map(|&w| -> Result<(usize, Vec<Option<f64>>)> {
                Ok((w, lagged_rolling_mean(&quantities, w)?))
            })
            .collect::<Result<Vec<_>>>()?;
        let ewma_columns = self
            .config
            .windows
            .iter()
            .map(|&w| -> Result<(usize, Vec<Option<f64>>)> {
                Ok((w, lagged_ewma(&quantities, w)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let pick = |columns: &[(usize, Vec<Option<f64>>)], t: usize| -> Vec<(usize, Option<f64>)> {
            columns.iter().map(|(k, col)| (*k, col[t])).collect()
        };

        Ok(weekly
            .iter()
            .enumerate()
            .map(|(t, aggregate)| FeatureRow {
                aggregate: aggregate.clone(),
                lags: pick(&lag_columns, t),
                rolling_means: pick(&rolling_columns, t),
                ewmas: pick(&ewma_columns, t),
                covariates: KnownCovariates::for_week(family, aggregate.week_start, promotions),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn weekly(family: &str, quantities: &[i64]) -> Vec<WeeklyAggregate> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        quantities
            .iter()
            .enumerate()
            .map(|(i, &q)| {
                let monday = start + Duration::weeks(i as i64);
                WeeklyAggregate {
                    family: family.to_string(),
                    year: monday.iso_week().year(),
                    iso_week: monday.iso_week().week(),
                    month: monday.month(),
                    week_start: monday,
                    mean_price_initial: 50.0,
                    mean_price_sold: 40.0,
                    total_revenue: 40.0 * q as f64,
                    total_discount: 10.0 * q as f64,
                    total_quantity: q,
                }
            })
            .collect()
    }

    #[test]
    fn test_lag_one_is_previous_quantity() {
        let rows = FeatureBuilder::default()
            .build(&weekly("Shirt", &[5, 7, 9, 11, 13]), &PromotionLookup::empty())
            .unwrap();

        assert_eq!(rows[0].lag(1), None);
        for t in 1..rows.len() {
            assert_eq!(rows[t].lag(1), Some(rows[t - 1].target()));
        }
    }

    #[test]
    fn test_rolling_features_exclude_current_week() {
        let rows = FeatureBuilder::default()
            .build(&weekly("Shirt", &[3, 6, 9, 100]), &PromotionLookup::empty())
            .unwrap();

        assert!(rows[..3].iter().all(|r| r.rolling_mean(3).is_none()));
        assert_eq!(rows[3].rolling_mean(3), Some(6.0));
        assert!(rows[3].ewma(3).unwrap() < 100.0);
        assert!(rows[3].is_complete());
        assert_eq!(drop_incomplete(rows).len(), 1);
    }

    #[test]
    fn test_promotion_covariates_attached() {
        let promotions = PromotionLookup::from_entries(vec![(
            ("Hoodie".to_string(), 2023, 2),
            PromotionEntry {
                avg_discount: 0.2,
                channel: PromotionChannel::Both,
            },
        )])
        .unwrap();

        let rows = FeatureBuilder::default()
            .build(&weekly("Hoodie", &[1, 2, 3]), &promotions)
            .unwrap();

        assert_eq!(rows[0].covariates.avg_discount, 0.0);
        assert_eq!(rows[0].covariates.promotion, PromotionChannel::None);
        assert_eq!(rows[1].covariates.avg_discount, 0.2);
        assert_eq!(rows[1].covariates.promotion, PromotionChannel::Both);
        assert_eq!(rows[1].covariates.values().len(), KnownCovariates::NAMES.len());
    }

    #[test]
    fn test_rejects_bad_input() {
        let builder = FeatureBuilder::default();
        let lookup = PromotionLookup::empty();

        assert!(matches!(
            builder.build(&[], &lookup),
            Err(ForecastError::EmptyInput(_))
        ));

        let mut mixed = weekly("Shirt", &[1, 2]);
        mixed[1].family = "Hoodie".to_string();
        assert!(builder.build(&mixed, &lookup).is_err());

        let mut unsorted = weekly("Shirt", &[1, 2]);
        unsorted.reverse();
        assert!(builder.build(&unsorted, &lookup).is_err());

        assert!(FeatureConfig::new(vec![0], vec![3]).is_err());
    }

    #[test]
    fn test_deterministic() {
        let series = weekly("Activewear", &[4, 8, 15, 16, 23, 42]);
        let builder = FeatureBuilder::new(FeatureConfig::new(vec![1, 2], vec![2, 3]).unwrap()).unwrap();
        let lookup = PromotionLookup::empty();

        assert_eq!(builder.config().warmup(), 3);
        assert_eq!(
            builder.build(&series, &lookup).unwrap(),
            builder.build(&series, &lookup).unwrap()
        );
    }
}
