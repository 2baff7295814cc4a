//! Moving average calculation implementations
//!
//! Contains streaming moving averages and their look-back series helpers:
//! - Simple Moving Average (SMA)
//! - Exponential Moving Average (EMA, span parameterised, no bias adjustment)
//!
//! The `lagged_*` helpers shift before windowing, so the value emitted for
//! position `t` is computed from positions `< t` only.

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) implementation
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Update the SMA with a new value
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Get the current SMA value
    pub fn value(&self) -> Result<f64> {
        if self.values.len() < self.period {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for SMA calculation. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }

        Ok(self.sum / self.period as f64)
    }

    /// Mean of the values currently held, even if fewer than `period`
    pub fn partial_value(&self) -> Result<f64> {
        if self.values.is_empty() {
            return Err(MathError::InsufficientData(
                "No values in the SMA window".to_string(),
            ));
        }

        Ok(self.sum / self.values.len() as f64)
    }

    /// Number of values currently in the window
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }
}

/// Exponential Moving Average (EMA) implementation
///
/// Seeded with the first observation and updated recursively with
/// `alpha = 2 / (span + 1)`. A value is reported once `span` observations
/// have been seen.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    span: usize,
    alpha: f64,
    current_ema: Option<f64>,
    values_seen: usize,
}

impl ExponentialMovingAverage {
    /// Create a new Exponential Moving Average with the specified span
    pub fn new(span: usize) -> Result<Self> {
        if span == 0 {
            return Err(MathError::InvalidInput(
                "Span must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            span,
            alpha: 2.0 / (span as f64 + 1.0),
            current_ema: None,
            values_seen: 0,
        })
    }

    /// Update the EMA with a new value
    pub fn update(&mut self, value: f64) {
        self.values_seen += 1;
        self.current_ema = Some(match self.current_ema {
            None => value,
            Some(current) => self.alpha * value + (1.0 - self.alpha) * current,
        });
    }

    /// Get the current EMA value
    pub fn value(&self) -> Result<f64> {
        match self.current_ema {
            Some(ema) if self.values_seen >= self.span => Ok(ema),
            _ => Err(MathError::InsufficientData(format!(
                "Not enough data for EMA calculation. Need at least {} values.",
                self.span
            ))),
        }
    }

    /// Smoothing factor derived from the span
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Get the current span
    pub fn span(&self) -> usize {
        self.span
    }
}

/// Value `k` positions back, `None` for the first `k` positions
pub fn lagged(series: &[f64], k: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|t| if t >= k { Some(series[t - k]) } else { None })
        .collect()
}

/// Mean of the `window` values strictly before each position
pub fn lagged_rolling_mean(series: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)?;
    let mut out = Vec::with_capacity(series.len());

    for &value in series {
        out.push(sma.value().ok());
        sma.update(value);
    }

    Ok(out)
}

/// EMA of the values strictly before each position
pub fn lagged_ewma(series: &[f64], span: usize) -> Result<Vec<Option<f64>>> {
    let mut ema = ExponentialMovingAverage::new(span)?;
    let mut out = Vec::with_capacity(series.len());

    for &value in series {
        out.push(ema.value().ok());
        ema.update(value);
    }

    Ok(out)
}
