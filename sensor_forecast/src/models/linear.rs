//! Linear autoregressive regressor
//!
//! Every output channel is a ridge-regularised linear function of the whole
//! flattened window.

use crate::data::{FeatureRow, Window, FEATURE_COUNT};
use crate::error::{ForecastError, Result};
use crate::models::{FittedRegressor, SequenceRegressor};
use chrono::{DateTime, Utc};
use sensor_math::regression::{RidgeFit, RidgeRegression};
use serde::{Deserialize, Serialize};

/// Ridge regression over flattened windows
#[derive(Debug, Clone)]
pub struct LinearSequenceRegressor {
    /// Name of the regressor
    name: String,
    /// Estimator
    ridge: RidgeRegression,
}

/// Fitted linear sequence model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSequenceModel {
    name: String,
    seq_len: usize,
    samples: usize,
    trained_at: DateTime<Utc>,
    coefficients: RidgeFit,
}

impl LinearSequenceRegressor {
    /// Create a regressor with the given L2 penalty
    pub fn new(lambda: f64) -> Result<Self> {
        let ridge = RidgeRegression::new(lambda)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;

        Ok(Self {
            name: format!("Linear Sequence Regressor (lambda={})", lambda),
            ridge,
        })
    }
}

impl SequenceRegressor for LinearSequenceRegressor {
    type Fitted = LinearSequenceModel;

    fn fit(&self, windows: &[Window], labels: &[FeatureRow]) -> Result<Self::Fitted> {
        let seq_len = windows.first().map(Window::len).ok_or_else(|| {
            ForecastError::ModelError("Cannot fit on zero windows".to_string())
        })?;
        if windows.iter().any(|w| w.len() != seq_len) {
            return Err(ForecastError::ModelError(
                "Windows must all have the same length".to_string(),
            ));
        }

        let inputs: Vec<Vec<f64>> = windows.iter().map(Window::flatten).collect();
        let coefficients = self
            .ridge
            .fit(&inputs, labels)
            .map_err(|e| ForecastError::ModelError(format!("Ridge fit failed: {}", e)))?;

        Ok(LinearSequenceModel {
            name: self.name.clone(),
            seq_len,
            samples: windows.len(),
            trained_at: Utc::now(),
            coefficients,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl LinearSequenceModel {
    /// Number of pairs the model was fitted on
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Time the model was fitted
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }
}

impl FittedRegressor for LinearSequenceModel {
    fn infer(&self, window: &Window) -> Result<FeatureRow> {
        if window.len() != self.seq_len {
            return Err(ForecastError::ModelError(format!(
                "Model expects windows of {} rows, got {}",
                self.seq_len,
                window.len()
            )));
        }

        let output = self
            .coefficients
            .predict(&window.flatten())
            .map_err(|e| ForecastError::ModelError(e.to_string()))?;
        output.try_into().map_err(|v: Vec<f64>| {
            ForecastError::ModelError(format!(
                "Model produced {} outputs, expected {}",
                v.len(),
                FEATURE_COUNT
            ))
        })
    }

    fn seq_len(&self) -> usize {
        self.seq_len
    }

    fn name(&self) -> &str {
        &self.name
    }
}
