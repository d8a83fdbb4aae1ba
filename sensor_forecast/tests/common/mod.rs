#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sensor_forecast::config::PipelineConfig;
use sensor_forecast::data::Reading;
use sensor_forecast::source::MemorySource;
use sensor_forecast::utils::generate_readings;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

pub fn create_test_readings(hours: usize) -> Vec<Reading> {
    generate_readings(start(), hours * 60, 42).unwrap()
}

pub fn create_test_source(hours: usize) -> MemorySource {
    MemorySource::from_readings(&create_test_readings(hours)).unwrap()
}

/// Settings small enough for fast runs
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        retrain_interval_secs: 0.05,
        stage_timeout_secs: 5.0,
        ..PipelineConfig::default()
    }
}
