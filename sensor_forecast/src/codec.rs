//! Encoding of pipeline artifacts
//!
//! Tabular artifacts (series and forecasts) are CSV with a header row
//! `timestamp,temperature,humidity,mq2,mq135`; fitted objects are JSON.

use crate::data::Reading;
use crate::error::{ForecastError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode readings as CSV
pub fn readings_to_csv(readings: &[Reading]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for reading in readings {
        writer.serialize(reading)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| ForecastError::IoError(e.into_error()))
}

/// Decode readings from CSV
pub fn readings_from_csv(bytes: &[u8]) -> Result<Vec<Reading>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut readings = Vec::new();
    for record in reader.deserialize() {
        readings.push(record?);
    }
    Ok(readings)
}

/// Encode a value as pretty JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}

/// Decode a value from JSON
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn csv_has_a_stable_header() {
        let reading = Reading::from_features(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            [24.5, 60.0, 3.25, 11.0],
        );
        let bytes = readings_to_csv(&[reading]).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();

        assert!(text.starts_with("timestamp,temperature,humidity,mq2,mq135\n"));
        assert_eq!(readings_from_csv(&bytes).unwrap(), vec![reading]);
    }

    #[test]
    fn malformed_csv_is_an_error() {
        assert!(readings_from_csv(b"timestamp,temperature\nnot-a-time,1.0\n").is_err());
    }
}
