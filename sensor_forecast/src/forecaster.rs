//! Multi-step forecasting by feeding predictions back into the window

use crate::data::{FeatureRow, Granularity, Reading, Window};
use crate::error::{ForecastError, Result};
use crate::models::FittedRegressor;
use crate::utils::future_timestamps;
use chrono::{DateTime, Utc};
use sensor_math::scaling::MinMaxScaler;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Predicted readings, one aggregation interval apart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Last observed timestamp the forecast starts after
    pub origin: DateTime<Utc>,
    /// Predicted readings in time order
    pub readings: Vec<Reading>,
}

impl Forecast {
    /// Number of forecast steps
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Check if the forecast is empty
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Take the newest `seq_len` scaled rows as the starting window
pub fn initial_window(scaled_rows: &[FeatureRow], seq_len: usize) -> Result<Window> {
    if scaled_rows.len() < seq_len {
        return Err(ForecastError::InsufficientData {
            required: seq_len,
            found: scaled_rows.len(),
        });
    }
    Window::new(scaled_rows[scaled_rows.len() - seq_len..].to_vec())
}

/// Drives a fitted regressor step by step
#[derive(Debug)]
pub struct AutoregressiveForecaster<'a, M: FittedRegressor> {
    model: &'a M,
    scaler: &'a MinMaxScaler,
    granularity: Granularity,
}

impl<'a, M: FittedRegressor> AutoregressiveForecaster<'a, M> {
    /// Create a forecaster producing hourly steps
    pub fn new(model: &'a M, scaler: &'a MinMaxScaler) -> Self {
        Self {
            model,
            scaler,
            granularity: Granularity::Hour,
        }
    }

    /// Use a different step size
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Forecast `steps` readings after `last_timestamp`.
    ///
    /// Published values are inverse scaled and floored at zero. The window is
    /// advanced with the raw scaled prediction so the chain stays in the model's
    /// own representation.
    pub fn forecast(
        &self,
        last_window: &Window,
        steps: usize,
        last_timestamp: DateTime<Utc>,
    ) -> Result<Forecast> {
        if last_window.len() != self.model.seq_len() {
            return Err(ForecastError::ModelError(format!(
                "Window has {} rows but {} was fitted on {}",
                last_window.len(),
                self.model.name(),
                self.model.seq_len()
            )));
        }

        let timestamps = future_timestamps(last_timestamp, steps, self.granularity);
        let mut window = last_window.clone();
        let mut readings = Vec::with_capacity(steps);

        for (k, timestamp) in timestamps.into_iter().enumerate() {
            let scaled = self.model.infer(&window)?;
            if !scaled.iter().all(|v| v.is_finite()) {
                return Err(ForecastError::ModelError(format!(
                    "Non-finite prediction at step {}",
                    k + 1
                )));
            }

            let mut values = scaled;
            self.scaler.inverse_transform_in_place(&mut values)?;
            let values = values.map(|v| v.max(0.0));

            readings.push(Reading::from_features(timestamp, values));
            window.slide(scaled);
        }

        debug!(model = self.model.name(), steps, "forecast complete");

        Ok(Forecast {
            origin: last_timestamp,
            readings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PersistenceModel;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn unit_scaler() -> MinMaxScaler {
        MinMaxScaler::fit(&[[0.0; 4], [10.0; 4]]).unwrap()
    }

    #[test]
    fn persistence_repeats_last_row_in_original_units() {
        let model = PersistenceModel::new(2);
        let scaler = unit_scaler();
        let window = Window::new(vec![[0.1; 4], [0.5, 0.2, 0.0, 1.0]]).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let forecast = AutoregressiveForecaster::new(&model, &scaler)
            .forecast(&window, 4, last)
            .unwrap();

        assert_eq!(forecast.len(), 4);
        assert_eq!(forecast.origin, last);
        assert_eq!(forecast.readings[3].timestamp, last + Duration::hours(4));
        assert_relative_eq!(forecast.readings[3].temperature, 5.0);
        assert_relative_eq!(forecast.readings[3].mq135, 10.0);
    }

    #[test]
    fn minute_granularity_steps_by_minute() {
        let model = PersistenceModel::new(1);
        let scaler = unit_scaler();
        let window = Window::new(vec![[0.3; 4]]).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let forecast = AutoregressiveForecaster::new(&model, &scaler)
            .with_granularity(Granularity::Minute)
            .forecast(&window, 3, last)
            .unwrap();

        let stamps: Vec<_> = forecast.readings.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            stamps,
            vec![
                last + Duration::minutes(1),
                last + Duration::minutes(2),
                last + Duration::minutes(3)
            ]
        );
    }

    #[test]
    fn window_length_must_match_model() {
        let model = PersistenceModel::new(3);
        let scaler = unit_scaler();
        let window = Window::new(vec![[0.1; 4]]).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let err = AutoregressiveForecaster::new(&model, &scaler)
            .forecast(&window, 1, last)
            .unwrap_err();
        assert!(matches!(err, ForecastError::ModelError(_)));
    }

    #[test]
    fn initial_window_uses_newest_rows() {
        let rows: Vec<FeatureRow> = (0..5).map(|i| [i as f64; 4]).collect();
        let window = initial_window(&rows, 3).unwrap();
        assert_eq!(window.rows().next(), Some(&[2.0; 4]));
        assert_eq!(window.last(), &[4.0; 4]);
        assert!(matches!(
            initial_window(&rows, 6),
            Err(ForecastError::InsufficientData { required: 6, found: 5 })
        ));
    }
}
