//! Periodic ingest, train and forecast runs
//!
//! The scheduler owns the run loop. A run opens a staging generation, executes the
//! stages strictly in order on the blocking pool, and publishes the generation only
//! when all of them succeed. Anything else discards the staging area, so readers
//! keep the last good generation. Runs never overlap: `run_once` borrows the
//! scheduler mutably and `run_forever` consumes it.

use crate::config::PipelineConfig;
use crate::error::{ForecastError, Result};
use crate::models::SequenceRegressor;
use crate::source::ReadingSource;
use crate::stages::{self, Stage};
use crate::store::{ArtifactStore, GenerationId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Where the scheduler currently is
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SchedulerState {
    /// Created, no run started yet
    Idle,
    /// A stage of a run is executing
    Running { generation: GenerationId, stage: Stage },
    /// The last run published its generation
    Succeeded { generation: GenerationId },
    /// The last run was abandoned in a stage
    Failed { stage: Stage },
    /// Waiting for the next run
    Sleeping { next_run_at: DateTime<Utc> },
    /// The loop has exited
    Stopped,
}

/// Final status of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Timing and outcome of one stage of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// All stages succeeded and the generation was published
    Succeeded,
    /// The run was abandoned in `stage`
    Failed { stage: Stage, error: String },
    /// Shutdown was requested mid-run; nothing was published
    Cancelled,
}

/// Record of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub generation: Option<GenerationId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    /// Whether the run published a generation
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }
}

/// Observable scheduler state and run counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub last_run: Option<RunReport>,
    pub last_success: Option<DateTime<Utc>>,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Idle,
            last_run: None,
            last_success: None,
            runs_started: 0,
            runs_succeeded: 0,
            runs_failed: 0,
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Single-owner driver of the pipeline loop
pub struct PipelineScheduler<R: SequenceRegressor + 'static> {
    config: Arc<PipelineConfig>,
    source: Arc<dyn ReadingSource>,
    regressor: Arc<R>,
    store: Arc<dyn ArtifactStore>,
    status: watch::Sender<SchedulerStatus>,
}

impl<R: SequenceRegressor + 'static> PipelineScheduler<R> {
    /// Create a scheduler after validating the configuration
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn ReadingSource>,
        regressor: R,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<Self> {
        config.validate()?;
        let (status, _) = watch::channel(SchedulerStatus::default());

        Ok(Self {
            config: Arc::new(config),
            source,
            regressor: Arc::new(regressor),
            store,
            status,
        })
    }

    /// Receive every status change
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.subscribe()
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        self.status.borrow().state.clone()
    }

    /// Current status snapshot
    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    fn set_state(&self, state: SchedulerState) {
        self.status.send_modify(|status| status.state = state);
    }

    /// Execute one complete run
    pub async fn run_once(&mut self) -> RunReport {
        let (_keep_open, mut never) = watch::channel(false);
        self.execute(&mut never).await
    }

    /// Run immediately, then every retrain interval until `shutdown` turns true.
    ///
    /// A shutdown during a run abandons it without publishing.
    pub async fn run_forever(mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.retrain_interval();
        info!(interval_secs = interval.as_secs_f64(), "pipeline scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.execute(&mut shutdown).await;
            if report.outcome == RunOutcome::Cancelled {
                break;
            }

            let next_run_at = chrono::Duration::from_std(interval)
                .ok()
                .and_then(|step| Utc::now().checked_add_signed(step))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.set_state(SchedulerState::Sleeping { next_run_at });

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        self.set_state(SchedulerState::Stopped);
        info!("pipeline scheduler stopped");
    }

    async fn execute(&mut self, shutdown: &mut watch::Receiver<bool>) -> RunReport {
        let started_at = Utc::now();
        self.status.send_modify(|status| status.runs_started += 1);

        let mut stage_reports = Vec::with_capacity(Stage::ALL.len());
        let (generation, outcome) = match self.store.open_staging() {
            Ok(generation) => {
                info!(%generation, "pipeline run started");
                let outcome = match self.run_stages(generation, shutdown, &mut stage_reports).await {
                    Ok(()) => RunOutcome::Succeeded,
                    Err(outcome) => outcome,
                };
                if outcome != RunOutcome::Succeeded {
                    if let Err(e) = self.store.discard(generation) {
                        warn!(%generation, error = %e, "cannot discard staged generation");
                    }
                }
                (Some(generation), outcome)
            }
            Err(e) => {
                error!(error = %e, "cannot open a staging generation");
                let error = e.in_stage(Stage::Ingest).to_string();
                (None, RunOutcome::Failed { stage: Stage::Ingest, error })
            }
        };

        let report = RunReport {
            generation,
            started_at,
            finished_at: Utc::now(),
            outcome,
            stages: stage_reports,
        };
        self.finish(&report);
        report
    }

    fn finish(&self, report: &RunReport) {
        let elapsed = (report.finished_at - report.started_at).num_milliseconds();
        match (&report.outcome, report.generation) {
            (RunOutcome::Succeeded, Some(generation)) => {
                info!(%generation, elapsed_ms = elapsed, "pipeline run succeeded");
            }
            (RunOutcome::Failed { stage, error }, _) => {
                error!(%stage, %error, elapsed_ms = elapsed, "pipeline run failed, keeping previous generation");
            }
            _ => info!(elapsed_ms = elapsed, "pipeline run cancelled"),
        }

        self.status.send_modify(|status| {
            match (&report.outcome, report.generation) {
                (RunOutcome::Succeeded, Some(generation)) => {
                    status.runs_succeeded += 1;
                    status.last_success = Some(report.finished_at);
                    status.state = SchedulerState::Succeeded { generation };
                }
                (RunOutcome::Failed { stage, .. }, _) => {
                    status.runs_failed += 1;
                    status.state = SchedulerState::Failed { stage: *stage };
                }
                _ => {}
            }
            status.last_run = Some(report.clone());
        });
    }

    async fn run_stages(
        &self,
        generation: GenerationId,
        shutdown: &mut watch::Receiver<bool>,
        reports: &mut Vec<StageReport>,
    ) -> std::result::Result<(), RunOutcome> {
        let (source, store, config) = (self.source.clone(), self.store.clone(), self.config.clone());
        self.run_stage(Stage::Ingest, generation, shutdown, reports, move || {
            stages::ingest(source.as_ref(), store.as_ref(), generation, &config)
        })
        .await?;

        let (regressor, store, config) = (self.regressor.clone(), self.store.clone(), self.config.clone());
        self.run_stage(Stage::Train, generation, shutdown, reports, move || {
            stages::train(regressor.as_ref(), store.as_ref(), generation, &config)
        })
        .await?;

        let (store, config) = (self.store.clone(), self.config.clone());
        self.run_stage(Stage::Forecast, generation, shutdown, reports, move || {
            stages::forecast::<R::Fitted>(store.as_ref(), generation, &config)
        })
        .await?;

        if *shutdown.borrow() {
            return Err(RunOutcome::Cancelled);
        }
        self.store.publish(generation).map_err(|e| RunOutcome::Failed {
            stage: Stage::Forecast,
            error: e.in_stage(Stage::Forecast).to_string(),
        })?;
        Ok(())
    }

    /// Run one stage on the blocking pool, bounded by the stage timeout
    async fn run_stage<T, F>(
        &self,
        stage: Stage,
        generation: GenerationId,
        shutdown: &mut watch::Receiver<bool>,
        reports: &mut Vec<StageReport>,
        work: F,
    ) -> std::result::Result<T, RunOutcome>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.set_state(SchedulerState::Running { generation, stage });
        info!(%generation, %stage, "stage started");

        let timeout = self.config.stage_timeout();
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(work);

        let result = tokio::select! {
            _ = shutdown_requested(shutdown) => None,
            joined = tokio::time::timeout(timeout, task) => Some(match joined {
                Err(_) => Err(ForecastError::StageFailure {
                    stage,
                    reason: format!("timed out after {:.1}s", timeout.as_secs_f64()),
                }),
                Ok(Err(join_error)) if join_error.is_panic() => Err(ForecastError::StageFailure {
                    stage,
                    reason: format!("panicked: {}", panic_message(join_error.into_panic())),
                }),
                Ok(Err(join_error)) => Err(ForecastError::StageFailure {
                    stage,
                    reason: join_error.to_string(),
                }),
                Ok(Ok(outcome)) => outcome.map_err(|e| e.in_stage(stage)),
            }),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let (status, error, outcome) = match result {
            Some(Ok(value)) => {
                info!(%stage, elapsed_ms, "stage succeeded");
                (StageStatus::Succeeded, None, Ok(value))
            }
            Some(Err(e)) => {
                match &e {
                    ForecastError::NoData(_) | ForecastError::InsufficientData { .. } => {
                        warn!(%stage, error = %e, "stage could not complete")
                    }
                    _ => error!(%stage, error = %e, "stage failed"),
                }
                let message = e.to_string();
                (
                    StageStatus::Failed,
                    Some(message.clone()),
                    Err(RunOutcome::Failed { stage, error: message }),
                )
            }
            None => {
                warn!(%stage, "shutdown requested, abandoning run");
                (StageStatus::Cancelled, None, Err(RunOutcome::Cancelled))
            }
        };

        reports.push(StageReport {
            stage,
            status,
            elapsed_ms,
            error,
        });
        outcome
    }
}
