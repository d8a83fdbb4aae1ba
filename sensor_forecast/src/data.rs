//! Sensor readings and uniformly spaced series

use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Number of sensor channels in a reading
pub const FEATURE_COUNT: usize = 4;

/// Field names of the sensor channels, in feature order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["temperature", "humidity", "mq2", "mq135"];

/// Feature index of the humidity channel
pub const HUMIDITY: usize = 1;

/// One row of sensor values in feature order
pub type FeatureRow = [f64; FEATURE_COUNT];

/// A complete, timestamped sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Time of the reading
    pub timestamp: DateTime<Utc>,
    /// Air temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
    /// MQ-2 combustible gas concentration
    pub mq2: f64,
    /// MQ-135 air quality concentration
    pub mq135: f64,
}

impl Reading {
    /// Build a reading from a feature row
    pub fn from_features(timestamp: DateTime<Utc>, features: FeatureRow) -> Self {
        let [temperature, humidity, mq2, mq135] = features;
        Self {
            timestamp,
            temperature,
            humidity,
            mq2,
            mq135,
        }
    }

    /// Sensor values in feature order
    pub fn features(&self) -> FeatureRow {
        [self.temperature, self.humidity, self.mq2, self.mq135]
    }

    /// Whether every sensor value is a finite number
    pub fn is_finite(&self) -> bool {
        self.features().iter().all(|v| v.is_finite())
    }
}

/// A reading as delivered by a source, with every field optional
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReading {
    pub timestamp: Option<DateTime<Utc>>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub mq2: Option<f64>,
    pub mq135: Option<f64>,
}

impl RawReading {
    /// Project a source document onto the reading fields.
    ///
    /// Unknown fields are ignored. Values of the wrong type count as missing.
    pub fn from_document(document: &Value) -> Self {
        let number = |name: &str| document.get(name).and_then(parse_number);
        Self {
            timestamp: document.get("timestamp").and_then(parse_timestamp_value),
            temperature: number("temperature"),
            humidity: number("humidity"),
            mq2: number("mq2"),
            mq135: number("mq135"),
        }
    }

    /// The complete reading, if the timestamp and all four values are present
    pub fn complete(&self) -> Option<Reading> {
        let reading = Reading {
            timestamp: self.timestamp?,
            temperature: self.temperature?,
            humidity: self.humidity?,
            mq2: self.mq2?,
            mq135: self.mq135?,
        };
        reading.is_finite().then_some(reading)
    }
}

impl From<Reading> for RawReading {
    fn from(reading: Reading) -> Self {
        Self {
            timestamp: Some(reading.timestamp),
            temperature: Some(reading.temperature),
            humidity: Some(reading.humidity),
            mq2: Some(reading.mq2),
            mq135: Some(reading.mq135),
        }
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn parse_timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_timestamp)
}

/// Parse a reading timestamp.
///
/// Accepts RFC 3339 and naive `YYYY-MM-DD HH:MM:SS[.fff]` (with either a space or a
/// `T` separator), the latter interpreted as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Spacing of a uniform series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    /// One row per minute (the clean series)
    Minute,
    /// One row per hour (the aggregated series)
    Hour,
}

impl Granularity {
    /// Distance between consecutive rows
    pub fn duration(&self) -> Duration {
        match self {
            Granularity::Minute => Duration::minutes(1),
            Granularity::Hour => Duration::hours(1),
        }
    }

    /// Start of the bucket containing `timestamp`
    pub fn floor(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let excess = timestamp
            .timestamp()
            .rem_euclid(self.duration().num_seconds());
        timestamp
            .checked_sub_signed(Duration::seconds(excess))
            .and_then(|ts| ts.with_nanosecond(0))
            .unwrap_or(timestamp)
    }
}

/// Readings strictly increasing at a fixed interval with no missing values
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSeries {
    granularity: Granularity,
    readings: Vec<Reading>,
}

impl UniformSeries {
    /// Validate and wrap readings.
    ///
    /// Fails unless consecutive timestamps differ by exactly one interval and every
    /// value is finite.
    pub fn new(granularity: Granularity, readings: Vec<Reading>) -> Result<Self> {
        let step = granularity.duration();
        if let Some(bad) = readings.iter().position(|r| !r.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "Reading {} has a non-finite value",
                bad
            )));
        }
        if let Some(gap) = readings
            .windows(2)
            .position(|pair| pair[1].timestamp - pair[0].timestamp != step)
        {
            return Err(ForecastError::InvalidParameter(format!(
                "Readings {} and {} are not {:?} apart",
                gap,
                gap + 1,
                granularity
            )));
        }

        Ok(Self {
            granularity,
            readings,
        })
    }

    /// Row spacing
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// The readings
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Feature rows in time order
    pub fn feature_rows(&self) -> Vec<FeatureRow> {
        self.readings.iter().map(Reading::features).collect()
    }

    /// First timestamp, if any
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.readings.first().map(|r| r.timestamp)
    }

    /// Last timestamp, if any
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.readings.last().map(|r| r.timestamp)
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Get the length of the series
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Consume the series, returning its readings
    pub fn into_readings(self) -> Vec<Reading> {
        self.readings
    }
}

/// A fixed-length history of scaled feature rows fed to the regressor
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    rows: VecDeque<FeatureRow>,
}

impl Window {
    /// Build a window from rows, oldest first
    pub fn new(rows: Vec<FeatureRow>) -> Result<Self> {
        if rows.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "A window needs at least one row".to_string(),
            ));
        }
        Ok(Self { rows: rows.into() })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false; windows hold at least one row
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows, oldest first
    pub fn rows(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter()
    }

    /// Newest row
    pub fn last(&self) -> &FeatureRow {
        // A window is never empty, see `new`.
        &self.rows[self.rows.len() - 1]
    }

    /// All values flattened row by row, oldest first
    pub fn flatten(&self) -> Vec<f64> {
        self.rows.iter().flat_map(|row| row.iter().copied()).collect()
    }

    /// Drop the oldest row and append `row` as the newest
    pub fn slide(&mut self, row: FeatureRow) {
        self.rows.pop_front();
        self.rows.push_back(row);
    }
}
