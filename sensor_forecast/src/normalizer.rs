//! Raw readings to a clean, gap-filled minute series

use crate::data::{Granularity, RawReading, Reading, UniformSeries, FEATURE_COUNT};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use sensor_math::interpolation::interpolate_linear;
use std::collections::BTreeMap;
use tracing::debug;

/// Resamples raw readings onto a uniform grid
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    granularity: Granularity,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Granularity::Minute)
    }
}

#[derive(Default)]
struct Bucket {
    sums: [f64; FEATURE_COUNT],
    count: usize,
}

impl Normalizer {
    /// Create a normalizer for the given grid spacing
    pub fn new(granularity: Granularity) -> Self {
        Self { granularity }
    }

    /// Grid spacing of the produced series
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Turn raw readings into a uniformly spaced series without missing values.
    ///
    /// Incomplete readings are dropped, the rest are averaged per grid bucket, empty
    /// buckets between known ones are linearly interpolated. Fails with `NoData` when
    /// no complete reading remains.
    pub fn normalize(&self, raw: &[RawReading]) -> Result<UniformSeries> {
        let mut complete: Vec<Reading> = raw.iter().filter_map(RawReading::complete).collect();
        let dropped = raw.len() - complete.len();
        if complete.is_empty() {
            return Err(ForecastError::NoData(format!(
                "none of {} readings had a valid timestamp and all sensor values",
                raw.len()
            )));
        }
        complete.sort_by_key(|r| r.timestamp);

        let mut buckets: BTreeMap<DateTime<Utc>, Bucket> = BTreeMap::new();
        for reading in &complete {
            let bucket = buckets
                .entry(self.granularity.floor(reading.timestamp))
                .or_default();
            for (sum, value) in bucket.sums.iter_mut().zip(reading.features()) {
                *sum += value;
            }
            bucket.count += 1;
        }

        let (Some(&start), Some(&end)) = (buckets.keys().next(), buckets.keys().next_back())
        else {
            return Err(ForecastError::NoData("no buckets after resampling".to_string()));
        };

        let step = self.granularity.duration();
        let slots = ((end - start).num_seconds() / step.num_seconds()) as usize + 1;
        let mut columns: Vec<Vec<Option<f64>>> = vec![vec![None; slots]; FEATURE_COUNT];
        for (timestamp, bucket) in &buckets {
            let slot = ((*timestamp - start).num_seconds() / step.num_seconds()) as usize;
            for (feature, column) in columns.iter_mut().enumerate() {
                column[slot] = Some(bucket.sums[feature] / bucket.count as f64);
            }
        }

        let mut interpolated = 0;
        for column in columns.iter_mut() {
            interpolated += interpolate_linear(column);
        }

        let mut readings = Vec::with_capacity(slots);
        for slot in 0..slots {
            let mut features = [0.0; FEATURE_COUNT];
            let mut complete_row = true;
            for (feature, column) in columns.iter().enumerate() {
                match column[slot] {
                    Some(value) => features[feature] = value,
                    None => complete_row = false,
                }
            }
            if complete_row {
                readings.push(Reading::from_features(start + step * slot as i32, features));
            }
        }

        debug!(
            raw = raw.len(),
            dropped_incomplete = dropped,
            buckets = buckets.len(),
            interpolated_values = interpolated,
            rows = readings.len(),
            "normalized readings"
        );

        if readings.is_empty() {
            return Err(ForecastError::NoData(
                "no complete rows after interpolation".to_string(),
            ));
        }
        UniformSeries::new(self.granularity, readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn raw(minute: i64, second: i64, value: f64) -> RawReading {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        RawReading::from(Reading::from_features(
            base + Duration::minutes(minute) + Duration::seconds(second),
            [value, value + 1.0, value + 2.0, value + 3.0],
        ))
    }

    #[test]
    fn averages_duplicates_within_a_bucket() {
        let series = Normalizer::default()
            .normalize(&[raw(0, 10, 10.0), raw(0, 40, 20.0), raw(1, 0, 30.0)])
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_relative_eq!(series.readings()[0].temperature, 15.0);
        assert_relative_eq!(series.readings()[1].temperature, 30.0);
    }

    #[test]
    fn unordered_input_with_gap_is_interpolated() {
        let series = Normalizer::default()
            .normalize(&[raw(4, 0, 40.0), raw(0, 0, 0.0)])
            .unwrap();

        assert_eq!(series.len(), 5);
        let temps: Vec<f64> = series.readings().iter().map(|r| r.temperature).collect();
        for (value, expected) in temps.iter().zip([0.0, 10.0, 20.0, 30.0, 40.0]) {
            assert_relative_eq!(*value, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn incomplete_rows_are_dropped() {
        let mut partial = raw(1, 0, 99.0);
        partial.humidity = None;
        let mut undated = raw(2, 0, 99.0);
        undated.timestamp = None;

        let series = Normalizer::default()
            .normalize(&[raw(0, 0, 1.0), partial, undated, raw(2, 0, 3.0)])
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_relative_eq!(series.readings()[1].temperature, 2.0);
    }

    #[test]
    fn empty_or_unusable_input_is_no_data() {
        assert!(matches!(
            Normalizer::default().normalize(&[]),
            Err(ForecastError::NoData(_))
        ));
        assert!(matches!(
            Normalizer::default().normalize(&[RawReading::default()]),
            Err(ForecastError::NoData(_))
        ));
    }
}
