//! Pipeline configuration
//!
//! Settings are read from a TOML file when one is given, fall back to defaults for
//! every missing key, and can be overridden from the environment.

use crate::error::{ForecastError, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "AIRCAST_CONFIG";

/// Where raw readings are fetched from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSON export of the reading collection (array or one document per line)
    JsonFile { path: PathBuf },
    /// HTTP endpoint returning all reading documents as a JSON array
    Http { url: String },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::JsonFile {
            path: PathBuf::from("data/sensordatas.json"),
        }
    }
}

/// Configuration for the ingest, train and forecast pipeline
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause between the end of one run and the start of the next
    pub retrain_interval_secs: f64,
    /// Upper bound on a single stage's wall time
    pub stage_timeout_secs: f64,
    /// History window length used for both training and inference
    pub seq_len: usize,
    /// Steps of the short forecast
    pub short_horizon: usize,
    /// Steps of the long forecast
    pub long_horizon: usize,
    /// Fewer training pairs than this aborts the run
    pub min_training_pairs: usize,
    /// Trailing window of the humidity smoothing
    pub humidity_smoothing_window: usize,
    /// Only readings newer than this many hours are fetched
    pub history_hours: Option<u64>,
    /// L2 penalty of the ridge regressor
    pub ridge_lambda: f64,
    /// Root directory of the filesystem artifact store
    pub artifact_dir: PathBuf,
    /// Published generations kept on disk, the current one included
    pub retained_generations: usize,
    /// Reading source
    pub source: SourceConfig,
    /// Address the prediction server listens on
    pub bind_addr: SocketAddr,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrain_interval_secs: 600.0,
            stage_timeout_secs: 900.0,
            seq_len: 12,
            short_horizon: 1,
            long_horizon: 10,
            min_training_pairs: 10,
            humidity_smoothing_window: 5,
            history_hours: None,
            ridge_lambda: 1e-3,
            artifact_dir: PathBuf::from("data/artifacts"),
            retained_generations: 3,
            source: SourceConfig::default(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5001)),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ForecastError::ConfigError(format!(
                "Cannot read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `AIRCAST_CONFIG` if set, otherwise defaults, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("AIRCAST_BIND_ADDR") {
            self.bind_addr = addr.parse().map_err(|e| {
                ForecastError::ConfigError(format!("Invalid AIRCAST_BIND_ADDR '{}': {}", addr, e))
            })?;
        }
        if let Some(dir) = lookup("AIRCAST_ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("AIRCAST_SOURCE_URL") {
            self.source = SourceConfig::Http { url };
        } else if let Some(path) = lookup("AIRCAST_SOURCE_FILE") {
            self.source = SourceConfig::JsonFile {
                path: PathBuf::from(path),
            };
        }
        if let Some(secs) = lookup("AIRCAST_RETRAIN_INTERVAL_SECS") {
            self.retrain_interval_secs = secs.parse().map_err(|e| {
                ForecastError::ConfigError(format!(
                    "Invalid AIRCAST_RETRAIN_INTERVAL_SECS '{}': {}",
                    secs, e
                ))
            })?;
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("seq_len", self.seq_len),
            ("short_horizon", self.short_horizon),
            ("long_horizon", self.long_horizon),
            ("min_training_pairs", self.min_training_pairs),
            ("humidity_smoothing_window", self.humidity_smoothing_window),
            ("retained_generations", self.retained_generations),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ForecastError::ConfigError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        for (name, secs) in [
            ("retrain_interval_secs", self.retrain_interval_secs),
            ("stage_timeout_secs", self.stage_timeout_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ForecastError::ConfigError(format!(
                    "{} must be a positive number of seconds",
                    name
                )));
            }
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(ForecastError::ConfigError(format!(
                    "{} is too large: {}",
                    name, secs
                )));
            }
        }

        if !self.ridge_lambda.is_finite() || self.ridge_lambda < 0.0 {
            return Err(ForecastError::ConfigError(
                "ridge_lambda must be non-negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Retrain interval as a duration
    pub fn retrain_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.retrain_interval_secs).unwrap_or(Duration::MAX)
    }

    /// Stage timeout as a duration
    pub fn stage_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.stage_timeout_secs).unwrap_or(Duration::MAX)
    }
}
