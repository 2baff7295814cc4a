//! Pipeline configuration
//!
//! Every field has a default, so a JSON file only needs the keys it changes.

use crate::error::{ForecastError, Result};
use crate::features::FeatureConfig;
use crate::models::ModelSettings;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Locations of the input tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub transactions: PathBuf,
    pub avg_discount: PathBuf,
    pub promotion_type: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            transactions: PathBuf::from("data/raw/transactions.csv"),
            avg_discount: PathBuf::from("data/avg_discount.csv"),
            promotion_type: PathBuf::from("data/promotion_type.csv"),
        }
    }
}

/// Settings for training and forecasting runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataPaths,
    pub model_dir: PathBuf,
    /// Families to train; empty means every family in the data
    pub families: Vec<String>,
    pub features: FeatureConfig,
    pub models: ModelSettings,
    /// Quantity z-score above which a transaction is dropped
    pub outlier_threshold: f64,
    /// Seed for stochastic forecasts
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataPaths::default(),
            model_dir: PathBuf::from("models"),
            families: Vec::new(),
            features: FeatureConfig::default(),
            models: ModelSettings::default(),
            outlier_threshold: 3.0,
            seed: None,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.models.validate()?;
        if !(self.outlier_threshold > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "Outlier threshold must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "model_dir": "out", "models": { "tree": { "max_depth": 3 } }, "seed": 7 }"#,
        )
        .unwrap();

        assert_eq!(config.model_dir, PathBuf::from("out"));
        assert_eq!(config.models.tree.max_depth, 3);
        assert_eq!(config.models.tree.n_estimators, 100);
        assert_eq!(config.models.rolling_mean.window, 3);
        assert_eq!(config.features, FeatureConfig::default());
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig {
            families: vec!["Shirt".to_string()],
            ..PipelineConfig::default()
        };

        config.to_json_file(&path).unwrap();
        assert_eq!(PipelineConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = PipelineConfig {
            outlier_threshold: -1.0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.models.rolling_mean.window = 0;
        assert!(config.validate().is_err());
    }
}
