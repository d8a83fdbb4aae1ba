//! Error types for the sensor_forecast crate

use crate::stages::Stage;
use sensor_math::MathError;
use thiserror::Error;

/// Custom error types for the sensor_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The reading source produced no usable rows
    #[error("No data: {0}")]
    NoData(String),

    /// Too few window/label pairs to train on
    #[error("Insufficient data: need at least {required} training pairs, found {found}")]
    InsufficientData { required: usize, found: usize },

    /// A pipeline stage failed unexpectedly
    #[error("{stage} stage failed: {reason}")]
    StageFailure { stage: Stage, reason: String },

    /// No published generation or artifact is available
    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    /// Error from the sequence regressor
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from the reading source
    #[error("Source error: {0}")]
    SourceError(String),

    /// Error in the configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from numerical operations
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV encoding or decoding
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON encoding or decoding
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    /// Attribute an unexpected fault to the stage it happened in.
    ///
    /// Expected pipeline outcomes (`NoData`, `InsufficientData`) and errors that
    /// already name a stage are returned unchanged.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            ForecastError::NoData(_)
            | ForecastError::InsufficientData { .. }
            | ForecastError::StageFailure { .. } => self,
            other => ForecastError::StageFailure {
                stage,
                reason: other.to_string(),
            },
        }
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ForecastError {
    fn from(err: reqwest::Error) -> Self {
        ForecastError::SourceError(err.to_string())
    }
}
