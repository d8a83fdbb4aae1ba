//! # Sensor Forecast
//!
//! Ingest, train and forecast pipeline for environmental sensor readings
//! (temperature, humidity and two gas sensors).
//!
//! ## Pipeline
//!
//! - **Ingest**: raw readings from a [`source::ReadingSource`] are resampled onto a
//!   one-minute grid by the [`normalizer::Normalizer`], gaps are interpolated.
//! - **Train**: the [`sequence::SequenceBuilder`] averages the clean series into hours,
//!   smooths humidity, fits a min-max scaler and cuts window/label pairs that a
//!   [`models::SequenceRegressor`] is fitted on.
//! - **Forecast**: the [`forecaster::AutoregressiveForecaster`] feeds each prediction
//!   back into the window to forecast several hours ahead.
//!
//! Stages hand over only through an [`store::ArtifactStore`]. The
//! [`scheduler::PipelineScheduler`] runs them periodically and publishes each run's
//! artifacts as one generation, which [`publisher::latest_predictions`] serves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensor_forecast::config::PipelineConfig;
//! use sensor_forecast::models::LinearSequenceRegressor;
//! use sensor_forecast::scheduler::PipelineScheduler;
//! use sensor_forecast::source::JsonFileSource;
//! use sensor_forecast::store::FsArtifactStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> sensor_forecast::Result<()> {
//! let config = PipelineConfig::default();
//! let store = Arc::new(FsArtifactStore::open(&config.artifact_dir, config.retained_generations)?);
//! let source = Arc::new(JsonFileSource::new("data/sensordatas.json"));
//! let regressor = LinearSequenceRegressor::new(config.ridge_lambda)?;
//!
//! let mut scheduler = PipelineScheduler::new(config, source, regressor, store.clone())?;
//! let report = scheduler.run_once().await;
//! println!("{:?}", report.outcome);
//!
//! let view = sensor_forecast::publisher::latest_predictions(store.as_ref());
//! println!("{} hours forecast", view.next_10_hours.len());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod data;
pub mod error;
pub mod forecaster;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod publisher;
pub mod scheduler;
pub mod sequence;
pub mod source;
pub mod stages;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{PipelineConfig, SourceConfig};
pub use crate::data::{RawReading, Reading, UniformSeries, Window};
pub use crate::error::{ForecastError, Result};
pub use crate::forecaster::{AutoregressiveForecaster, Forecast};
pub use crate::models::{FittedRegressor, SequenceRegressor};
pub use crate::scheduler::{PipelineScheduler, RunReport, SchedulerState, SchedulerStatus};
pub use crate::stages::Stage;
pub use crate::store::{ArtifactKind, ArtifactStore, FsArtifactStore, GenerationId, MemoryArtifactStore};

/// Build the reading source described by the configuration
pub fn source_from_config(config: &SourceConfig) -> std::sync::Arc<dyn source::ReadingSource> {
    match config {
        SourceConfig::JsonFile { path } => std::sync::Arc::new(source::JsonFileSource::new(path)),
        SourceConfig::Http { url } => std::sync::Arc::new(source::HttpSource::new(url.clone())),
    }
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
