//! Read side of the artifact store for the serving layer

use crate::codec;
use crate::data::Reading;
use crate::error::Result;
use crate::metrics::TrainingReport;
use crate::store::{ArtifactKind, ArtifactStore, GenerationId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Forecasts of the current generation as served to clients
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionsView {
    /// Generation the forecasts belong to, none before the first publication
    pub generation: Option<GenerationId>,
    /// When that generation was published
    pub published_at: Option<DateTime<Utc>>,
    /// Short-horizon forecast
    pub next_1_hour: Vec<Reading>,
    /// Long-horizon forecast
    pub next_10_hours: Vec<Reading>,
}

fn read_current(store: &dyn ArtifactStore) -> Result<PredictionsView> {
    let Some(manifest) = store.current()? else {
        return Ok(PredictionsView::default());
    };
    let generation = manifest.generation;

    Ok(PredictionsView {
        generation: Some(generation),
        published_at: Some(manifest.published_at),
        next_1_hour: codec::readings_from_csv(
            &store.read_published(generation, ArtifactKind::ShortForecast)?,
        )?,
        next_10_hours: codec::readings_from_csv(
            &store.read_published(generation, ArtifactKind::LongForecast)?,
        )?,
    })
}

/// Forecasts of the current generation.
///
/// Never fails: a missing or unreadable generation yields empty forecasts. Both
/// lists always come from the same generation.
pub fn latest_predictions(store: &dyn ArtifactStore) -> PredictionsView {
    match read_current(store) {
        Ok(view) => {
            if view.generation.is_none() {
                warn!("no published generation yet, serving empty predictions");
            }
            view
        }
        Err(e) => {
            warn!(error = %e, "cannot read published forecasts, serving empty predictions");
            PredictionsView::default()
        }
    }
}

/// Training report of the current generation, if any
pub fn latest_training_report(store: &dyn ArtifactStore) -> Option<TrainingReport> {
    let read = || -> Result<Option<TrainingReport>> {
        let Some(manifest) = store.current()? else {
            return Ok(None);
        };
        let bytes = store.read_published(manifest.generation, ArtifactKind::TrainingReport)?;
        Ok(Some(codec::from_json(&bytes)?))
    };

    read().unwrap_or_else(|e| {
        warn!(error = %e, "cannot read training report");
        None
    })
}
