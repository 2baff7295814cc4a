//! # Demand Forecast
//!
//! Weekly product-family demand forecasting from transaction-level sales
//! records.
//!
//! ## Features
//!
//! - Transaction loading (polars) and quantity outlier cleaning
//! - Monday-anchored weekly aggregation per product family
//! - Leakage-free lag, rolling-mean and EWMA features with promotion covariates
//! - Three forecasting models behind one trait: rolling mean, gradient-boosted
//!   trees and a trend plus Fourier seasonality model
//! - Future covariate rows for multi-week horizons
//! - Evaluation against held-out weeks (RMSE, MAE, R²)
//! - Model artifacts on disk and parallel per-family training
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demand_forecast::aggregate::aggregate_weekly;
//! use demand_forecast::data::TransactionLoader;
//! use demand_forecast::features::FeatureBuilder;
//! use demand_forecast::models::{
//!     FamilyHistory, ForecastModel, PredictionContext, TrainedForecastModel, TreeRegressionModel,
//! };
//! use demand_forecast::promotion::PromotionLookup;
//!
//! # fn main() -> demand_forecast::Result<()> {
//! let records = TransactionLoader::from_csv("data/raw/transactions.csv")?;
//! let promotions = PromotionLookup::from_csv("data/avg_discount.csv", "data/promotion_type.csv")?;
//!
//! let weekly = aggregate_weekly(&records, &["Hoodie"])?;
//! let features = FeatureBuilder::default().build(&weekly, &promotions)?;
//! let history = FamilyHistory::new(weekly, features)?;
//!
//! let model = TreeRegressionModel::default().fit(&history)?;
//! let forecast = model.predict(12, &PredictionContext::new(&promotions))?;
//! for point in forecast.points() {
//!     println!("{}: {:.1}", point.date, point.predicted_quantity);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod cleaning;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod projector;
pub mod promotion;
pub mod store;
pub mod summary;
pub mod synthetic;

// Re-export commonly used types
pub use crate::aggregate::{aggregate_weekly, WeeklyAggregate};
pub use crate::config::PipelineConfig;
pub use crate::data::{TransactionLoader, TransactionRecord};
pub use crate::error::{ForecastError, Result};
pub use crate::evaluation::{evaluate, EvaluationReport};
pub use crate::features::{FeatureBuilder, FeatureConfig, FeatureRow};
pub use crate::models::{
    ForecastModel, ForecastResult, ModelKind, TrainedForecastModel, TrainedModel,
};
pub use crate::pipeline::{train_all, train_family, ForecastService};
pub use crate::projector::HorizonProjector;
pub use crate::promotion::PromotionLookup;
pub use crate::store::ModelStore;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
