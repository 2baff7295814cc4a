//! Regularized least squares
//!
//! Solves `(X'X + diag(penalties)) beta = X'y` with a Cholesky
//! factorization. Every penalty must be strictly positive, which keeps the
//! system positive definite even for collinear designs.

use crate::{MathError, Result};

/// Fit ridge coefficients for a row-major design matrix
pub fn ridge_solve(design: &[Vec<f64>], target: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    if design.len() != target.len() {
        return Err(MathError::InvalidInput(format!(
            "Design has {} rows but target has {} values",
            design.len(),
            target.len()
        )));
    }
    if design.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot fit a regression on zero rows".to_string(),
        ));
    }

    let p = penalties.len();
    if let Some(row) = design.iter().find(|row| row.len() != p) {
        return Err(MathError::InvalidInput(format!(
            "Design row has {} columns, expected {}",
            row.len(),
            p
        )));
    }
    if penalties.iter().any(|&l| !(l > 0.0)) {
        return Err(MathError::InvalidInput(
            "Ridge penalties must be strictly positive".to_string(),
        ));
    }

    let mut gram = vec![vec![0.0; p]; p];
    let mut rhs = vec![0.0; p];
    for (row, &y) in design.iter().zip(target.iter()) {
        for i in 0..p {
            rhs[i] += row[i] * y;
            for j in 0..=i {
                gram[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..p {
        gram[i][i] += penalties[i];
        for j in 0..i {
            gram[j][i] = gram[i][j];
        }
    }

    solve_symmetric(&gram, &rhs).ok_or_else(|| {
        MathError::CalculationError("Normal equations are not positive definite".to_string())
    })
}

/// Dot product of a design row with coefficients
pub fn dot(row: &[f64], coefficients: &[f64]) -> f64 {
    row.iter().zip(coefficients.iter()).map(|(x, b)| x * b).sum()
}

fn solve_symmetric(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    // A = L L'
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_line_with_tiny_penalty() {
        // y = 2 + 3x
        let design: Vec<Vec<f64>> = (0..10).map(|x| vec![1.0, x as f64]).collect();
        let target: Vec<f64> = (0..10).map(|x| 2.0 + 3.0 * x as f64).collect();

        let beta = ridge_solve(&design, &target, &[1e-9, 1e-9]).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-6);
        assert!((beta[1] - 3.0).abs() < 1e-6);
        assert!((dot(&design[4], &beta) - 14.0).abs() < 1e-6);
    }

    #[test]
    fn test_collinear_columns_stay_solvable() {
        let design: Vec<Vec<f64>> = (0..5).map(|_| vec![1.0, 1.0]).collect();
        let target = vec![4.0; 5];

        let beta = ridge_solve(&design, &target, &[1e-3, 1e-3]).unwrap();
        assert!((beta[0] + beta[1] - 4.0).abs() < 1e-2);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(ridge_solve(&[], &[], &[1.0]).is_err());
        assert!(ridge_solve(&[vec![1.0]], &[1.0, 2.0], &[1.0]).is_err());
        assert!(ridge_solve(&[vec![1.0, 2.0]], &[1.0], &[1.0]).is_err());
        assert!(ridge_solve(&[vec![1.0]], &[1.0], &[0.0]).is_err());
    }
}
