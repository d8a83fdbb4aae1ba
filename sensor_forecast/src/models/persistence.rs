//! Persistence baseline: the next row equals the newest row of the window

use crate::data::{FeatureRow, Window};
use crate::error::{ForecastError, Result};
use crate::models::{FittedRegressor, SequenceRegressor};
use serde::{Deserialize, Serialize};

/// Baseline regressor that repeats the last observation
#[derive(Debug, Clone, Default)]
pub struct PersistenceRegressor;

/// Fitted persistence model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceModel {
    seq_len: usize,
}

impl PersistenceModel {
    /// Create a model for windows of `seq_len` rows
    pub fn new(seq_len: usize) -> Self {
        Self { seq_len }
    }
}

impl SequenceRegressor for PersistenceRegressor {
    type Fitted = PersistenceModel;

    fn fit(&self, windows: &[Window], _labels: &[FeatureRow]) -> Result<Self::Fitted> {
        let seq_len = windows.first().map(Window::len).ok_or_else(|| {
            ForecastError::ModelError("Cannot fit on zero windows".to_string())
        })?;
        Ok(PersistenceModel { seq_len })
    }

    fn name(&self) -> &str {
        "Persistence"
    }
}

impl FittedRegressor for PersistenceModel {
    fn infer(&self, window: &Window) -> Result<FeatureRow> {
        Ok(*window.last())
    }

    fn seq_len(&self) -> usize {
        self.seq_len
    }

    fn name(&self) -> &str {
        "Persistence"
    }
}
