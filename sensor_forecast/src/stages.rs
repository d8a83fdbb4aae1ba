//! The three pipeline stages
//!
//! Each stage reads what the previous stage staged for the same generation and
//! stages its own output. Stages share no in-memory state, so any of them can run in
//! its own blocking task.

use crate::codec;
use crate::config::PipelineConfig;
use crate::data::{Granularity, UniformSeries};
use crate::error::{ForecastError, Result};
use crate::forecaster::{initial_window, AutoregressiveForecaster};
use crate::metrics::{evaluate_in_sample, TrainingReport};
use crate::models::{FittedRegressor, SequenceRegressor};
use crate::normalizer::Normalizer;
use crate::sequence::{aggregate_hourly, scale_rows, SequenceBuilder};
use crate::source::{ReadingFilter, ReadingSource};
use crate::store::{ArtifactKind, ArtifactStore, GenerationId};
use chrono::{DateTime, Duration, Utc};
use sensor_math::scaling::MinMaxScaler;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// A stage of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetch and normalize readings
    Ingest,
    /// Fit scaler and model
    Train,
    /// Produce the short and long forecasts
    Forecast,
}

impl Stage {
    /// Stages in execution order
    pub const ALL: [Stage; 3] = [Stage::Ingest, Stage::Train, Stage::Forecast];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Stage::Ingest => "ingest",
            Stage::Train => "train",
            Stage::Forecast => "forecast",
        })
    }
}

/// Outcome of the ingest stage
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub raw_readings: usize,
    pub rows: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// Outcome of the train stage
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub pairs: usize,
    pub report: TrainingReport,
}

/// Outcome of the forecast stage
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSummary {
    pub short_steps: usize,
    pub long_steps: usize,
    pub origin: DateTime<Utc>,
}

fn load_series(store: &dyn ArtifactStore, generation: GenerationId) -> Result<UniformSeries> {
    let bytes = store.read_staged(generation, ArtifactKind::CleanSeries)?;
    UniformSeries::new(Granularity::Minute, codec::readings_from_csv(&bytes)?)
}

/// Fetch readings, normalize them and stage the clean series
pub fn ingest(
    source: &dyn ReadingSource,
    store: &dyn ArtifactStore,
    generation: GenerationId,
    config: &PipelineConfig,
) -> Result<IngestSummary> {
    let filter = ReadingFilter {
        since: config
            .history_hours
            .map(|hours| Utc::now() - Duration::hours(hours as i64)),
    };
    let raw = source.find(&filter)?;
    let series = Normalizer::default().normalize(&raw)?;

    store.write_staged(
        generation,
        ArtifactKind::CleanSeries,
        &codec::readings_to_csv(series.readings())?,
    )?;

    let summary = IngestSummary {
        raw_readings: raw.len(),
        rows: series.len(),
        first: series.first_timestamp(),
        last: series.last_timestamp(),
    };
    info!(
        source = %source.describe(),
        raw = summary.raw_readings,
        rows = summary.rows,
        "clean series staged"
    );
    Ok(summary)
}

/// Build training pairs, fit the regressor and stage scaler, model and report
pub fn train<R: SequenceRegressor>(
    regressor: &R,
    store: &dyn ArtifactStore,
    generation: GenerationId,
    config: &PipelineConfig,
) -> Result<TrainSummary> {
    let series = load_series(store, generation)?;
    let builder = SequenceBuilder::new(
        config.seq_len,
        config.min_training_pairs,
        config.humidity_smoothing_window,
    )?;
    let set = builder.build(&series)?;

    let model = regressor.fit(&set.windows, &set.labels)?;
    let report = evaluate_in_sample(&model, &set)?;

    store.write_staged(generation, ArtifactKind::Scaler, &codec::to_json(&set.scaler)?)?;
    store.write_staged(generation, ArtifactKind::Model, &codec::to_json(&model)?)?;
    store.write_staged(generation, ArtifactKind::TrainingReport, &codec::to_json(&report)?)?;

    info!(
        model = regressor.name(),
        pairs = set.len(),
        accuracy = report.overall_accuracy,
        "model staged"
    );
    Ok(TrainSummary {
        pairs: set.len(),
        report,
    })
}

/// Reload the staged model and scaler and stage both forecasts.
///
/// The aggregated series is rebuilt the same way as for training and scaled with
/// the persisted scaler, which is never refit here.
pub fn forecast<M: FittedRegressor>(
    store: &dyn ArtifactStore,
    generation: GenerationId,
    config: &PipelineConfig,
) -> Result<ForecastSummary> {
    let series = load_series(store, generation)?;
    let model: M = codec::from_json(&store.read_staged(generation, ArtifactKind::Model)?)?;
    let scaler: MinMaxScaler = codec::from_json(&store.read_staged(generation, ArtifactKind::Scaler)?)?;

    let aggregated = aggregate_hourly(&series, config.humidity_smoothing_window)?;
    let origin = aggregated
        .last_timestamp()
        .ok_or_else(|| ForecastError::NoData("aggregated series is empty".to_string()))?;
    let rows = scale_rows(&scaler, &aggregated.feature_rows())?;
    let window = initial_window(&rows, model.seq_len())?;

    let forecaster = AutoregressiveForecaster::new(&model, &scaler);
    let short = forecaster.forecast(&window, config.short_horizon, origin)?;
    let long = forecaster.forecast(&window, config.long_horizon, origin)?;

    store.write_staged(
        generation,
        ArtifactKind::ShortForecast,
        &codec::readings_to_csv(&short.readings)?,
    )?;
    store.write_staged(
        generation,
        ArtifactKind::LongForecast,
        &codec::readings_to_csv(&long.readings)?,
    )?;

    info!(%origin, short = short.len(), long = long.len(), "forecasts staged");
    Ok(ForecastSummary {
        short_steps: short.len(),
        long_steps: long.len(),
        origin,
    })
}
