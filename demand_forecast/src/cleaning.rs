//! Quantity outlier removal

use crate::data::TransactionRecord;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{info, warn};

/// Outcome of a cleaning pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub outliers_removed: usize,
    pub kept_rows: usize,
    pub quantity_mean: f64,
    /// Sample standard deviation of quantity before filtering
    pub quantity_std_dev: f64,
    pub threshold: f64,
}

/// Drops transactions whose quantity z-score exceeds a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierFilter {
    threshold: f64,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self { threshold: 3.0 }
    }
}

impl OutlierFilter {
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Z-score threshold must be positive".to_string(),
            ));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Keep rows with `|quantity - mean| / std <= threshold`
    ///
    /// With fewer than two rows or a constant quantity nothing is removed.
    pub fn apply(&self, records: Vec<TransactionRecord>) -> (Vec<TransactionRecord>, CleaningReport) {
        let input_rows = records.len();
        let quantities: Vec<f64> = records.iter().map(|r| r.quantity as f64).collect();

        let (mean, std_dev) = if input_rows >= 2 {
            (quantities.iter().mean(), quantities.iter().std_dev())
        } else {
            (quantities.first().copied().unwrap_or(0.0), 0.0)
        };

        let kept: Vec<TransactionRecord> = if std_dev > 0.0 && std_dev.is_finite() {
            records
                .into_iter()
                .filter(|r| ((r.quantity as f64 - mean) / std_dev).abs() <= self.threshold)
                .collect()
        } else {
            records
        };

        let report = CleaningReport {
            input_rows,
            outliers_removed: input_rows - kept.len(),
            kept_rows: kept.len(),
            quantity_mean: mean,
            quantity_std_dev: std_dev,
            threshold: self.threshold,
        };

        if report.outliers_removed > 0 {
            warn!(
                removed = report.outliers_removed,
                threshold = self.threshold,
                "Removed quantity outliers"
            );
        }
        info!(kept = report.kept_rows, "Cleaned transaction table");

        (kept, report)
    }
}
