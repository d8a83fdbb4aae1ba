//! # forecast_server
//!
//! Serves the latest sensor forecasts over HTTP while the pipeline scheduler
//! retrains in the background.

use anyhow::Context;
use sensor_forecast::models::LinearSequenceRegressor;
use sensor_forecast::store::FsArtifactStore;
use sensor_forecast::{source_from_config, PipelineConfig, PipelineScheduler};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (optional - won't fail if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "forecast_server=info,sensor_forecast=info,tower_http=info".into()
            }),
        )
        .init();

    let config = PipelineConfig::load().context("loading pipeline configuration")?;
    let store = Arc::new(
        FsArtifactStore::open(&config.artifact_dir, config.retained_generations)
            .with_context(|| format!("opening artifact store at {}", config.artifact_dir.display()))?,
    );
    let source = source_from_config(&config.source);
    let regressor = LinearSequenceRegressor::new(config.ridge_lambda)?;
    let addr = config.bind_addr;

    tracing::info!(source = %source.describe(), store = %store.root().display(), "pipeline configured");

    let scheduler = PipelineScheduler::new(config, source, regressor, store.clone())?;
    let state = routes::AppState {
        store,
        status: scheduler.subscribe(),
    };

    // The first run starts immediately; requests are served from the previous
    // generation, if any, until it publishes.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline = tokio::spawn(scheduler.run_forever(shutdown_rx));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("forecast_server v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Abandon any run in progress and wait for the loop to exit
    shutdown_tx.send(true).ok();
    pipeline.await.context("pipeline scheduler task")?;

    Ok(())
}
