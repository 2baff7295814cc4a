//! Descriptive statistics and forecast accuracy metrics

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Accuracy of a set of predictions against observed values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

/// Calculate accuracy metrics for predictions vs actual values
///
/// R² uses the mean of `actual` for the total sum of squares. A constant
/// `actual` series scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn accuracy_metrics(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(MathError::InvalidInput(
            "Predicted and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = actual.len() as f64;
    let errors: Vec<f64> = actual
        .iter()
        .zip(predicted.iter())
        .map(|(&a, &p)| a - p)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let ss_res = errors.iter().map(|e| e.powi(2)).sum::<f64>();
    let mse = ss_res / n;
    let rmse = mse.sqrt();

    let actual_mean = actual.iter().sum::<f64>() / n;
    let ss_tot = actual
        .iter()
        .map(|a| (a - actual_mean).powi(2))
        .sum::<f64>();

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(AccuracyMetrics { mae, mse, rmse, r2 })
}

impl std::fmt::Display for AccuracyMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Accuracy Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  MSE:   {:.4}", self.mse)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  R2:    {:.4}", self.r2)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0, 6.0]), Some(4.0));
    }

    #[test]
    fn test_accuracy_metrics() {
        let actual = [10.0, 20.0, 30.0, 40.0, 50.0];
        let predicted = [12.0, 18.0, 33.0, 37.0, 52.0];

        let m = accuracy_metrics(&actual, &predicted).unwrap();
        assert!((m.mae - 2.4).abs() < 1e-9);
        assert!((m.mse - 6.0).abs() < 1e-9);
        assert!((m.rmse - 6.0_f64.sqrt()).abs() < 1e-9);
        // SS_tot = 1000, SS_res = 30
        assert!((m.r2 - 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_constant_actuals() {
        let exact = accuracy_metrics(&[5.0, 5.0], &[5.0, 5.0]).unwrap();
        assert_eq!(exact.r2, 1.0);

        let off = accuracy_metrics(&[5.0, 5.0], &[4.0, 6.0]).unwrap();
        assert_eq!(off.r2, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(accuracy_metrics(&[1.0, 2.0], &[1.0]).is_err());
        assert!(accuracy_metrics(&[], &[]).is_err());
    }
}
