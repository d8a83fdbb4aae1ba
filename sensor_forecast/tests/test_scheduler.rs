mod common;

use chrono::{DateTime, Utc};
use common::{create_test_readings, create_test_source, test_config};
use sensor_forecast::data::{FeatureRow, RawReading, Window};
use sensor_forecast::models::{PersistenceModel, PersistenceRegressor, SequenceRegressor};
use sensor_forecast::publisher::latest_predictions;
use sensor_forecast::scheduler::{RunOutcome, SchedulerState, StageStatus};
use sensor_forecast::source::{MemorySource, ReadingFilter, ReadingSource};
use sensor_forecast::store::{ArtifactStore, MemoryArtifactStore};
use sensor_forecast::{ForecastError, PipelineScheduler, Result, Stage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// Regressor misbehaving in a configurable way
#[derive(Debug)]
enum BrokenRegressor {
    Fails,
    Panics,
    Stalls(Duration),
}

impl SequenceRegressor for BrokenRegressor {
    type Fitted = PersistenceModel;

    fn fit(&self, windows: &[Window], labels: &[FeatureRow]) -> Result<Self::Fitted> {
        match self {
            BrokenRegressor::Fails => Err(ForecastError::ModelError("diverged".to_string())),
            BrokenRegressor::Panics => panic!("regressor blew up"),
            BrokenRegressor::Stalls(delay) => {
                std::thread::sleep(*delay);
                PersistenceRegressor.fit(windows, labels)
            }
        }
    }

    fn name(&self) -> &str {
        "Broken"
    }
}

/// Source recording when it is queried and how many queries overlap
struct RecordingSource {
    inner: MemorySource,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: Mutex<Vec<DateTime<Utc>>>,
}

impl RecordingSource {
    fn new(hours: usize) -> Self {
        Self {
            inner: create_test_source(hours),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ReadingSource for RecordingSource {
    fn find(&self, filter: &ReadingFilter) -> Result<Vec<RawReading>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Utc::now());
        std::thread::sleep(Duration::from_millis(5));
        let found = self.inner.find(filter);
        self.active.fetch_sub(1, Ordering::SeqCst);
        found
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

async fn publish_first_generation(store: Arc<MemoryArtifactStore>) {
    let mut scheduler = PipelineScheduler::new(
        test_config(),
        Arc::new(create_test_source(30)),
        PersistenceRegressor,
        store,
    )
    .unwrap();
    let report = scheduler.run_once().await;
    assert!(report.succeeded(), "{:?}", report.outcome);
    assert!(matches!(scheduler.state(), SchedulerState::Succeeded { .. }));
}

#[tokio::test]
async fn test_successful_run_publishes() {
    let store = Arc::new(MemoryArtifactStore::default());
    publish_first_generation(store.clone()).await;

    let view = latest_predictions(store.as_ref());
    assert!(view.generation.is_some());
    assert_eq!(view.next_1_hour.len(), 1);
    assert_eq!(view.next_10_hours.len(), 10);
    assert_eq!(view.next_1_hour[0], view.next_10_hours[0]);
    assert_eq!(store.staged_count(), 0);
}

#[tokio::test]
async fn test_five_readings_keep_previous_forecasts() {
    let store = Arc::new(MemoryArtifactStore::default());
    publish_first_generation(store.clone()).await;
    let before = latest_predictions(store.as_ref());

    let five = MemorySource::from_readings(&create_test_readings(1)[..5]).unwrap();
    let mut scheduler =
        PipelineScheduler::new(test_config(), Arc::new(five), PersistenceRegressor, store.clone())
            .unwrap();
    let report = scheduler.run_once().await;

    match &report.outcome {
        RunOutcome::Failed { stage, error } => {
            assert_eq!(*stage, Stage::Train);
            assert!(error.contains("Insufficient data"), "{}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(report.stages[0].status, StageStatus::Succeeded);
    assert_eq!(report.stages[1].status, StageStatus::Failed);
    assert_eq!(latest_predictions(store.as_ref()), before);
    assert_eq!(store.staged_count(), 0);
}

#[tokio::test]
async fn test_train_failure_keeps_previous_forecasts() {
    let store = Arc::new(MemoryArtifactStore::default());
    publish_first_generation(store.clone()).await;
    let before = latest_predictions(store.as_ref());
    let generation = store.current().unwrap().unwrap().generation;

    let mut scheduler = PipelineScheduler::new(
        test_config(),
        Arc::new(create_test_source(30)),
        BrokenRegressor::Fails,
        store.clone(),
    )
    .unwrap();
    let report = scheduler.run_once().await;

    assert!(matches!(
        report.outcome,
        RunOutcome::Failed { stage: Stage::Train, .. }
    ));
    assert_eq!(scheduler.state(), SchedulerState::Failed { stage: Stage::Train });
    assert_eq!(store.current().unwrap().unwrap().generation, generation);
    assert_eq!(latest_predictions(store.as_ref()), before);
}

#[tokio::test]
async fn test_panicking_stage_is_contained() {
    let store = Arc::new(MemoryArtifactStore::default());
    let mut scheduler = PipelineScheduler::new(
        test_config(),
        Arc::new(create_test_source(30)),
        BrokenRegressor::Panics,
        store.clone(),
    )
    .unwrap();

    let report = scheduler.run_once().await;
    match &report.outcome {
        RunOutcome::Failed { stage, error } => {
            assert_eq!(*stage, Stage::Train);
            assert!(error.contains("regressor blew up"), "{}", error);
        }
        other => panic!("expected failure, got {:?}", other),
    }

    // The scheduler stays usable after a panic
    let report = scheduler.run_once().await;
    assert!(!report.succeeded());
    assert_eq!(scheduler.status().runs_failed, 2);
    assert_eq!(store.current().unwrap(), None);
}

#[tokio::test]
async fn test_stage_timeout_fails_run() {
    let store = Arc::new(MemoryArtifactStore::default());
    let mut config = test_config();
    config.stage_timeout_secs = 0.1;
    let mut scheduler = PipelineScheduler::new(
        config,
        Arc::new(create_test_source(30)),
        BrokenRegressor::Stalls(Duration::from_millis(600)),
        store.clone(),
    )
    .unwrap();

    let report = scheduler.run_once().await;
    match &report.outcome {
        RunOutcome::Failed { stage, error } => {
            assert_eq!(*stage, Stage::Train);
            assert!(error.contains("timed out"), "{}", error);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(store.staged_count(), 0);
    assert_eq!(store.current().unwrap(), None);
}

#[tokio::test]
async fn test_runs_never_overlap() {
    let store = Arc::new(MemoryArtifactStore::default());
    let source = Arc::new(RecordingSource::new(30));
    let config = test_config();
    let interval = config.retrain_interval();
    let scheduler =
        PipelineScheduler::new(config, source.clone(), PersistenceRegressor, store.clone()).unwrap();
    let mut status = scheduler.subscribe();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run_forever(shutdown_rx));

    tokio::time::timeout(
        Duration::from_secs(10),
        status.wait_for(|s| s.runs_succeeded >= 3),
    )
    .await
    .unwrap()
    .unwrap();
    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
    let calls = source.calls.lock().unwrap().clone();
    assert!(calls.len() >= 3);
    let min_gap = chrono::Duration::from_std(interval).unwrap();
    for pair in calls.windows(2) {
        assert!(pair[1] - pair[0] >= min_gap);
    }
    assert_eq!(status.borrow().state, SchedulerState::Stopped);
}

#[tokio::test]
async fn test_shutdown_abandons_running_stage() {
    let store = Arc::new(MemoryArtifactStore::default());
    let scheduler = PipelineScheduler::new(
        test_config(),
        Arc::new(create_test_source(30)),
        BrokenRegressor::Stalls(Duration::from_millis(500)),
        store.clone(),
    )
    .unwrap();
    let mut status = scheduler.subscribe();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(scheduler.run_forever(shutdown_rx));

    status
        .wait_for(|s| {
            matches!(
                s.state,
                SchedulerState::Running {
                    stage: Stage::Train,
                    ..
                }
            )
        })
        .await
        .unwrap();
    shutdown_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_millis(300), handle)
        .await
        .unwrap()
        .unwrap();

    let status = status.borrow().clone();
    assert_eq!(status.state, SchedulerState::Stopped);
    assert_eq!(status.last_run.unwrap().outcome, RunOutcome::Cancelled);
    assert_eq!(status.runs_started, 1);
    assert_eq!(store.current().unwrap(), None);
    assert_eq!(store.staged_count(), 0);
}
