//! # Demand Math
//!
//! Numeric building blocks for the weekly demand forecasting pipeline.
//! This crate provides windowed averages that only look backwards in time,
//! descriptive statistics, accuracy metrics and a small regularized
//! least-squares solver.

use thiserror::Error;

pub mod linear;
pub mod moving_averages;
pub mod stats;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
