//! Metrics for evaluating a fitted regressor

use crate::data::{FEATURE_COUNT, FEATURE_NAMES};
use crate::error::{ForecastError, Result};
use crate::models::FittedRegressor;
use crate::sequence::SequenceSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error metrics of one sensor channel, in original units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAccuracy {
    /// Channel name
    pub feature: String,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// `100 · (1 − MAE / range)`, undefined for a constant channel
    pub accuracy: Option<f64>,
}

/// In-sample evaluation written next to every fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Model name
    pub model: String,
    /// Window length
    pub seq_len: usize,
    /// Number of training pairs
    pub samples: usize,
    /// Time of evaluation
    pub evaluated_at: DateTime<Utc>,
    /// Per-channel metrics in feature order
    pub features: Vec<FeatureAccuracy>,
    /// Mean of the defined per-channel accuracies
    pub overall_accuracy: Option<f64>,
}

/// Compare predicted and actual values of one channel
pub fn feature_accuracy(feature: &str, predicted: &[f64], actual: &[f64]) -> Result<FeatureAccuracy> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "Predicted and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = predicted.len() as f64;
    let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

    // Mean Absolute Error
    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

    // Root Mean Squared Error
    let rmse = (errors.iter().map(|e| e.powi(2)).sum::<f64>() / n).sqrt();

    let max = actual.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = actual.iter().copied().fold(f64::INFINITY, f64::min);
    let range = max - min;
    let accuracy = (range > 0.0).then(|| 100.0 * (1.0 - mae / range));

    Ok(FeatureAccuracy {
        feature: feature.to_string(),
        rmse,
        mae,
        accuracy,
    })
}

/// Evaluate one-step predictions over the training pairs in original units
pub fn evaluate_in_sample<M: FittedRegressor>(model: &M, set: &SequenceSet) -> Result<TrainingReport> {
    let mut predicted: Vec<Vec<f64>> = vec![Vec::with_capacity(set.len()); FEATURE_COUNT];
    let mut actual: Vec<Vec<f64>> = vec![Vec::with_capacity(set.len()); FEATURE_COUNT];

    for (window, label) in set.windows.iter().zip(&set.labels) {
        let mut prediction = model.infer(window)?;
        set.scaler.inverse_transform_in_place(&mut prediction)?;
        let mut truth = *label;
        set.scaler.inverse_transform_in_place(&mut truth)?;

        for f in 0..FEATURE_COUNT {
            predicted[f].push(prediction[f]);
            actual[f].push(truth[f]);
        }
    }

    let features = FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(f, name)| feature_accuracy(name, &predicted[f], &actual[f]))
        .collect::<Result<Vec<_>>>()?;

    let defined: Vec<f64> = features.iter().filter_map(|f| f.accuracy).collect();
    let overall_accuracy = sensor_math::mean(&defined);

    Ok(TrainingReport {
        model: model.name().to_string(),
        seq_len: model.seq_len(),
        samples: set.len(),
        evaluated_at: Utc::now(),
        features,
        overall_accuracy,
    })
}

impl std::fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Training Metrics ({}, {} pairs):", self.model, self.samples)?;
        for feature in &self.features {
            write!(
                f,
                "  {:<12} RMSE = {:.3}, MAE = {:.3}",
                feature.feature, feature.rmse, feature.mae
            )?;
            match feature.accuracy {
                Some(acc) => writeln!(f, ", Accuracy = {:.2}%", acc)?,
                None => writeln!(f)?,
            }
        }
        if let Some(overall) = self.overall_accuracy {
            writeln!(f, "  Overall Accuracy: {:.2}%", overall)?;
        }
        Ok(())
    }
}
