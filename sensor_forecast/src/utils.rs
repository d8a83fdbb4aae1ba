//! Utility functions for the sensor_forecast crate

use crate::data::{Granularity, Reading};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Create the timestamps following `last_timestamp`, one interval apart
pub fn future_timestamps(
    last_timestamp: DateTime<Utc>,
    horizon: usize,
    granularity: Granularity,
) -> Vec<DateTime<Utc>> {
    let step = granularity.duration();
    (1..=horizon)
        .map(|k| last_timestamp + step * k as i32)
        .collect()
}

/// Generate one reading per minute with a daily cycle and gaussian noise.
///
/// The same seed always yields the same readings. Values are floored at zero like
/// real sensor output.
pub fn generate_readings(start: DateTime<Utc>, minutes: usize, seed: u64) -> Result<Vec<Reading>> {
    let mut random = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;

    let mut data = Vec::with_capacity(minutes);
    let mut drift = 0.0_f64;
    for minute in 0..minutes {
        let timestamp = start + Duration::minutes(minute as i64);

        // Warmest mid-afternoon, most humid before dawn
        let hour = timestamp.hour() as f64 + timestamp.minute() as f64 / 60.0;
        let cycle = ((hour - 9.0) / 24.0 * std::f64::consts::TAU).sin();

        // Slow random walk shared by the gas sensors
        drift = (drift + 0.05 * noise.sample(&mut random)).clamp(-20.0, 20.0);

        let temperature = 27.0 + 4.0 * cycle + 0.2 * noise.sample(&mut random);
        let humidity = 65.0 - 12.0 * cycle + 1.5 * noise.sample(&mut random);
        let mq2 = 180.0 + drift * 3.0 + 5.0 * noise.sample(&mut random);
        let mq135 = 90.0 + drift * 1.5 + 3.0 * noise.sample(&mut random);

        data.push(Reading::from_features(
            timestamp,
            [temperature, humidity, mq2, mq135].map(|v| v.max(0.0)),
        ));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_step_by_granularity() {
        let last = Utc.with_ymd_and_hms(2024, 3, 1, 23, 0, 0).unwrap();
        let stamps = future_timestamps(last, 3, Granularity::Hour);
        assert_eq!(
            stamps,
            vec![
                last + Duration::hours(1),
                last + Duration::hours(2),
                last + Duration::hours(3)
            ]
        );
        assert!(future_timestamps(last, 0, Granularity::Minute).is_empty());
    }

    #[test]
    fn generated_readings_are_seeded_and_uniform() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let a = generate_readings(start, 120, 7).unwrap();
        let b = generate_readings(start, 120, 7).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 120);
        assert!(a.windows(2).all(|w| w[1].timestamp - w[0].timestamp == Duration::minutes(1)));
        assert!(a.iter().all(|r| r.features().iter().all(|v| *v >= 0.0)));
    }
}
