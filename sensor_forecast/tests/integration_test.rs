mod common;

use chrono::Duration;
use common::{create_test_readings, test_config};
use sensor_forecast::codec;
use sensor_forecast::models::LinearSequenceRegressor;
use sensor_forecast::publisher::{latest_predictions, latest_training_report};
use sensor_forecast::source::JsonFileSource;
use sensor_forecast::store::{ArtifactKind, ArtifactStore, FsArtifactStore};
use sensor_forecast::{source_from_config, PipelineScheduler, SourceConfig};
use sensor_math::scaling::MinMaxScaler;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

fn write_export(dir: &TempDir, hours: usize) -> std::path::PathBuf {
    let path = dir.path().join("sensordatas.json");
    let mut file = std::fs::File::create(&path).unwrap();
    // One document per line, with an extra id field and string-typed numbers
    for reading in create_test_readings(hours) {
        writeln!(
            file,
            r#"{{"_id": "x", "timestamp": "{}", "temperature": {}, "humidity": "{}", "mq2": {}, "mq135": {}}}"#,
            reading.timestamp.format("%Y-%m-%d %H:%M:%S"),
            reading.temperature,
            reading.humidity,
            reading.mq2,
            reading.mq135
        )
        .unwrap();
    }
    path
}

#[tokio::test]
async fn test_end_to_end_with_file_store() {
    let dir = TempDir::new().unwrap();
    let export = write_export(&dir, 72);
    let config = test_config();

    let store = Arc::new(FsArtifactStore::open(dir.path().join("artifacts"), 3).unwrap());
    let mut scheduler = PipelineScheduler::new(
        config.clone(),
        Arc::new(JsonFileSource::new(&export)),
        LinearSequenceRegressor::new(config.ridge_lambda).unwrap(),
        store.clone(),
    )
    .unwrap();

    let report = scheduler.run_once().await;
    assert!(report.succeeded(), "{:?}", report.outcome);
    assert_eq!(report.stages.len(), 3);

    let manifest = store.current().unwrap().unwrap();
    let series = codec::readings_from_csv(
        &store
            .read_published(manifest.generation, ArtifactKind::CleanSeries)
            .unwrap(),
    )
    .unwrap();
    assert_eq!(series.len(), 72 * 60);

    let scaler: MinMaxScaler = codec::from_json(
        &store
            .read_published(manifest.generation, ArtifactKind::Scaler)
            .unwrap(),
    )
    .unwrap();
    assert_eq!(scaler.n_features(), 4);

    let view = latest_predictions(store.as_ref());
    assert_eq!(view.generation, Some(manifest.generation));
    assert_eq!(view.next_1_hour.len(), 1);
    assert_eq!(view.next_10_hours.len(), 10);
    let last_hour = series.last().unwrap().timestamp - Duration::minutes(59);
    for (k, reading) in view.next_10_hours.iter().enumerate() {
        assert_eq!(reading.timestamp, last_hour + Duration::hours(k as i64 + 1));
        assert!(reading.features().iter().all(|v| *v >= 0.0));
    }

    let training = latest_training_report(store.as_ref()).unwrap();
    assert_eq!(training.samples, 60);
    assert_eq!(training.features.len(), 4);

    // A second process sees the same generation
    let reopened = FsArtifactStore::open(dir.path().join("artifacts"), 3).unwrap();
    assert_eq!(latest_predictions(&reopened), view);
}

#[tokio::test]
async fn test_history_window_limits_ingest() {
    let dir = TempDir::new().unwrap();
    let export = write_export(&dir, 30);
    let mut config = test_config();
    // Test readings are from 2024, far outside a one hour window
    config.history_hours = Some(1);

    let source = source_from_config(&SourceConfig::JsonFile { path: export });
    let store = Arc::new(FsArtifactStore::open(dir.path().join("artifacts"), 3).unwrap());
    let mut scheduler = PipelineScheduler::new(
        config,
        source,
        LinearSequenceRegressor::new(1e-3).unwrap(),
        store.clone(),
    )
    .unwrap();

    let report = scheduler.run_once().await;
    assert!(!report.succeeded());
    assert!(store.current().unwrap().is_none());
    assert!(latest_predictions(store.as_ref()).next_10_hours.is_empty());
}
