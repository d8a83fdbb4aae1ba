//! API route handlers

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use sensor_forecast::publisher::{latest_predictions, PredictionsView};
use sensor_forecast::scheduler::SchedulerStatus;
use sensor_forecast::store::ArtifactStore;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArtifactStore>,
    pub status: watch::Receiver<SchedulerStatus>,
}

/// Build the router with middleware
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(liveness))
        .route("/predictions", get(predictions))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Liveness probe
pub async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Forecasts of the last published generation, empty before the first one
pub async fn predictions(State(state): State<AppState>) -> Json<PredictionsView> {
    let store = state.store.clone();
    let view = tokio::task::spawn_blocking(move || latest_predictions(store.as_ref()))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "prediction lookup did not complete");
            PredictionsView::default()
        });
    Json(view)
}

/// Scheduler state and the report of the last run
pub async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.status.borrow().clone())
}
