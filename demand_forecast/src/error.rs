//! Error types for the demand_forecast crate

use crate::models::ModelKind;
use demand_math::MathError;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A transaction or calendar date could not be parsed
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Nothing left to work on after filtering
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// No trained artifact exists for the requested model and family
    #[error("Model artifact not found for {kind} / {family}: {}", path.display())]
    ModelArtifactNotFound {
        kind: ModelKind,
        family: String,
        path: PathBuf,
    },

    /// Forecast and ground truth share no dates
    #[error("No overlapping weeks between forecast and ground truth for family '{family}'")]
    NoOverlap { family: String },

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to parameter or result validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error raised while fitting or evaluating a model
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from numeric routines
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV operations
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error while encoding or decoding artifacts and configuration
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<polars::prelude::PolarsError> for ForecastError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(err: bincode::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}
