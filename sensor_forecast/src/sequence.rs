//! Hourly aggregation and sliding training windows

use crate::data::{
    FeatureRow, Granularity, Reading, UniformSeries, Window, FEATURE_COUNT, HUMIDITY,
};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use sensor_math::moving_averages::RollingMean;
use sensor_math::scaling::MinMaxScaler;
use std::collections::BTreeMap;

/// Average a minute series into hour buckets and smooth the humidity channel.
///
/// Humidity is replaced by its trailing mean over `humidity_window` buckets (one
/// observation suffices). Buckets with non-finite values are dropped.
pub fn aggregate_hourly(series: &UniformSeries, humidity_window: usize) -> Result<UniformSeries> {
    if series.granularity() == Granularity::Hour {
        return Ok(series.clone());
    }

    let mut buckets: BTreeMap<DateTime<Utc>, ([f64; FEATURE_COUNT], usize)> = BTreeMap::new();
    for reading in series.readings() {
        let (sums, count) = buckets
            .entry(Granularity::Hour.floor(reading.timestamp))
            .or_insert(([0.0; FEATURE_COUNT], 0));
        for (sum, value) in sums.iter_mut().zip(reading.features()) {
            *sum += value;
        }
        *count += 1;
    }

    let mut smoothing = RollingMean::new(humidity_window, 1)?;
    let mut readings = Vec::with_capacity(buckets.len());
    for (timestamp, (sums, count)) in buckets {
        let mut features = sums.map(|sum| sum / count as f64);
        if !features.iter().all(|v| v.is_finite()) {
            continue;
        }
        if let Some(smoothed) = smoothing.update(features[HUMIDITY]) {
            features[HUMIDITY] = smoothed;
        }
        readings.push(Reading::from_features(timestamp, features));
    }

    UniformSeries::new(Granularity::Hour, readings)
}

/// Training pairs cut from a scaled hourly series
#[derive(Debug, Clone)]
pub struct SequenceSet {
    /// Input histories, each `seq_len` scaled rows
    pub windows: Vec<Window>,
    /// Scaled row following each window
    pub labels: Vec<FeatureRow>,
    /// Scaler fitted over the whole aggregated series
    pub scaler: MinMaxScaler,
    /// The aggregated series the pairs were cut from
    pub aggregated: UniformSeries,
}

impl SequenceSet {
    /// Number of window/label pairs
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no pairs were produced
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Builds window/label pairs for the sequence regressor
#[derive(Debug, Clone, Copy)]
pub struct SequenceBuilder {
    seq_len: usize,
    min_pairs: usize,
    humidity_window: usize,
}

impl SequenceBuilder {
    /// Create a builder
    pub fn new(seq_len: usize, min_pairs: usize, humidity_window: usize) -> Result<Self> {
        if seq_len == 0 {
            return Err(ForecastError::InvalidParameter(
                "Sequence length must be positive".to_string(),
            ));
        }
        if humidity_window == 0 {
            return Err(ForecastError::InvalidParameter(
                "Humidity smoothing window must be positive".to_string(),
            ));
        }

        Ok(Self {
            seq_len,
            min_pairs,
            humidity_window,
        })
    }

    /// Window length
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Aggregate (minute input only), fit a fresh scaler and cut overlapping pairs.
    ///
    /// Pair `i` is scaled rows `[i, i + seq_len)` labelled with row `i + seq_len`.
    /// Fails with `InsufficientData` below the configured minimum number of pairs.
    pub fn build(&self, series: &UniformSeries) -> Result<SequenceSet> {
        let aggregated = aggregate_hourly(series, self.humidity_window)?;
        let found = aggregated.len().saturating_sub(self.seq_len);
        if aggregated.is_empty() || found < self.min_pairs {
            return Err(ForecastError::InsufficientData {
                required: self.min_pairs,
                found,
            });
        }

        let rows = aggregated.feature_rows();
        let scaler = MinMaxScaler::fit(&rows)?;
        let scaled = scale_rows(&scaler, &rows)?;

        let mut windows = Vec::with_capacity(found);
        let mut labels = Vec::with_capacity(found);
        for i in 0..found {
            windows.push(Window::new(scaled[i..i + self.seq_len].to_vec())?);
            labels.push(scaled[i + self.seq_len]);
        }

        Ok(SequenceSet {
            windows,
            labels,
            scaler,
            aggregated,
        })
    }
}

/// Apply a fitted scaler to every row
pub fn scale_rows(scaler: &MinMaxScaler, rows: &[FeatureRow]) -> Result<Vec<FeatureRow>> {
    rows.iter()
        .map(|row| {
            let mut scaled = *row;
            scaler.transform_in_place(&mut scaled)?;
            Ok(scaled)
        })
        .collect()
}
