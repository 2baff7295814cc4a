//! # Demand Workspace
//!
//! Umbrella crate for the demand forecasting workspace. It re-exports the
//! numeric primitives and the forecasting pipeline so downstream code can
//! depend on a single crate.
//!
//! ## Example
//!
//! ```
//! use demand_workspace::forecast::models::ModelKind;
//! use demand_workspace::math::moving_averages::lagged_rolling_mean;
//!
//! let kind: ModelKind = "xgboost".parse().unwrap();
//! assert_eq!(kind, ModelKind::TreeRegression);
//!
//! let means = lagged_rolling_mean(&[2.0, 4.0, 6.0, 8.0], 3).unwrap();
//! assert_eq!(means, vec![None, None, None, Some(4.0)]);
//! ```

pub use demand_forecast as forecast;
pub use demand_math as math;

/// Version of the workspace crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
