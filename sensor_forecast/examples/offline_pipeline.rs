//! Run one pipeline pass over synthetic readings and print the forecasts.
//!
//! ```text
//! cargo run -p sensor_forecast --example offline_pipeline
//! ```

use chrono::{Duration, TimeZone, Utc};
use sensor_forecast::models::LinearSequenceRegressor;
use sensor_forecast::publisher::{latest_predictions, latest_training_report};
use sensor_forecast::source::MemorySource;
use sensor_forecast::store::MemoryArtifactStore;
use sensor_forecast::utils::generate_readings;
use sensor_forecast::{PipelineConfig, PipelineScheduler};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut readings = generate_readings(start, 3 * 24 * 60, 7)?;

    // Knock out two hours of readings to exercise interpolation
    let gap = start + Duration::hours(36)..start + Duration::hours(38);
    readings.retain(|r| !gap.contains(&r.timestamp));
    println!("Generated {} readings", readings.len());

    let config = PipelineConfig::default();
    let store = Arc::new(MemoryArtifactStore::default());
    let mut scheduler = PipelineScheduler::new(
        config.clone(),
        Arc::new(MemorySource::from_readings(&readings)?),
        LinearSequenceRegressor::new(config.ridge_lambda)?,
        store.clone(),
    )?;

    let report = scheduler.run_once().await;
    for stage in &report.stages {
        println!("{:>8}: {:?} in {} ms", stage.stage, stage.status, stage.elapsed_ms);
    }

    if let Some(training) = latest_training_report(store.as_ref()) {
        println!("\n{}", training);
    }

    let view = latest_predictions(store.as_ref());
    println!("Next 10 hours:");
    for reading in &view.next_10_hours {
        println!(
            "  {}  temp {:6.2}  hum {:6.2}  mq2 {:7.2}  mq135 {:7.2}",
            reading.timestamp.format("%Y-%m-%d %H:%M"),
            reading.temperature,
            reading.humidity,
            reading.mq2,
            reading.mq135
        );
    }

    Ok(())
}
