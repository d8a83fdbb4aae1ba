//! # Aircast
//!
//! Forecasting of environmental sensor readings with periodic background retraining.
//!
//! The workspace is split into:
//!
//! - [`sensor_math`]: min-max scaling, rolling means, interpolation and ridge regression
//! - [`sensor_forecast`]: the ingest, train and forecast pipeline with its scheduler
//!   and artifact stores
//! - `forecast_server`: the HTTP binary serving the published forecasts
//!
//! ## Example
//!
//! ```
//! use aircast_workspace::sensor_forecast::data::{Granularity, RawReading, Reading};
//! use aircast_workspace::sensor_forecast::normalizer::Normalizer;
//! use chrono::{TimeZone, Utc};
//!
//! let at = |m| Utc.with_ymd_and_hms(2024, 3, 1, 8, m, 0).unwrap();
//! let raw = vec![
//!     RawReading::from(Reading::from_features(at(0), [24.0, 60.0, 3.0, 9.0])),
//!     RawReading::from(Reading::from_features(at(2), [26.0, 62.0, 5.0, 11.0])),
//! ];
//!
//! let series = Normalizer::new(Granularity::Minute).normalize(&raw).unwrap();
//! assert_eq!(series.len(), 3);
//! assert_eq!(series.readings()[1].temperature, 25.0);
//! ```

pub use sensor_forecast;
pub use sensor_math;
