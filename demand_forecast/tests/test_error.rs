use demand_forecast::models::ModelKind;
use demand_forecast::ForecastError;
use demand_math::MathError;
use std::io;
use std::path::PathBuf;

#[test]
fn test_io_error_conversion() {
    let err: ForecastError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, ForecastError::IoError(_)));
    assert!(err.to_string().contains("gone"));
}

#[test]
fn test_math_error_conversion() {
    let err: ForecastError = MathError::InsufficientData("need 3 points".to_string()).into();
    assert!(matches!(err, ForecastError::Math(_)));
    assert!(err.to_string().contains("need 3 points"));
}

#[test]
fn test_json_error_conversion() {
    let parse = serde_json::from_str::<Vec<f64>>("[1.0,").unwrap_err();
    let err: ForecastError = parse.into();
    assert!(matches!(err, ForecastError::SerializationError(_)));
}

#[test]
fn test_missing_artifact_message() {
    let err = ForecastError::ModelArtifactNotFound {
        kind: ModelKind::TreeRegression,
        family: "Shirt".to_string(),
        path: PathBuf::from("models/model_tree_Shirt.bin"),
    };
    let message = err.to_string();
    assert!(message.contains("Shirt"));
    assert!(message.contains("model_tree_Shirt.bin"));
}

#[test]
fn test_no_overlap_message() {
    let err = ForecastError::NoOverlap {
        family: "Hoodie".to_string(),
    };
    assert!(err.to_string().contains("Hoodie"));
}
