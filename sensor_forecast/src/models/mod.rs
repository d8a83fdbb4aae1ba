//! Sequence regressors
//!
//! A regressor learns to map a window of scaled rows to the scaled row that follows
//! it. Fitting produces a serializable model so the training stage can persist it and
//! the forecast stage can reload it.

use crate::data::{FeatureRow, Window};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Fitted sequence model
pub trait FittedRegressor: Debug + Send + Sync + Serialize + DeserializeOwned {
    /// Predict the next scaled row from a window
    fn infer(&self, window: &Window) -> Result<FeatureRow>;

    /// Window length the model was fitted with
    fn seq_len(&self) -> usize;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Sequence regressor that can be fitted on window/label pairs
pub trait SequenceRegressor: Debug + Send + Sync {
    /// The type of fitted model produced
    type Fitted: FittedRegressor;

    /// Fit on windows and the scaled rows that follow them
    fn fit(&self, windows: &[Window], labels: &[FeatureRow]) -> Result<Self::Fitted>;

    /// Get the name of the regressor
    fn name(&self) -> &str;
}

pub mod linear;
pub mod persistence;

pub use linear::{LinearSequenceModel, LinearSequenceRegressor};
pub use persistence::{PersistenceModel, PersistenceRegressor};
