//! # Sensor Math
//!
//! Numerical building blocks for sensor time series.
//! This crate provides the per-feature transforms and small solvers used by the
//! forecasting pipeline:
//!
//! - Min-max scaling with an exact inverse
//! - Trailing rolling means with a minimum-periods rule
//! - Linear gap interpolation
//! - Ridge regression with multiple outputs

use thiserror::Error;

pub mod interpolation;
pub mod moving_averages;
pub mod regression;
pub mod scaling;

/// Errors that can occur in numerical calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Arithmetic mean of a slice, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
