//! Reading sources
//!
//! The upstream collection is only ever asked for documents newer than an optional
//! cutoff. Documents are projected onto the reading fields and anything else is
//! ignored, so a source never fails on an odd record.

use crate::data::RawReading;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Query passed to a reading source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
    /// Only readings at or after this time
    pub since: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    /// Whether a reading passes the filter.
    ///
    /// Readings without a timestamp pass; the normalizer drops them.
    pub fn matches(&self, reading: &RawReading) -> bool {
        match (self.since, reading.timestamp) {
            (Some(since), Some(ts)) => ts >= since,
            _ => true,
        }
    }
}

/// Yields raw readings on demand
pub trait ReadingSource: Send + Sync {
    /// Fetch the readings matching `filter`
    fn find(&self, filter: &ReadingFilter) -> Result<Vec<RawReading>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

fn project(documents: &[Value], filter: &ReadingFilter) -> Vec<RawReading> {
    documents
        .iter()
        .map(RawReading::from_document)
        .filter(|r| filter.matches(r))
        .collect()
}

/// Parse a JSON array of documents, or one document per line
pub fn parse_documents(text: &str) -> Result<Vec<Value>> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(ForecastError::from))
        .collect()
}

/// Export of the reading collection on local disk
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Read from `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ReadingSource for JsonFileSource {
    fn find(&self, filter: &ReadingFilter) -> Result<Vec<RawReading>> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            ForecastError::SourceError(format!("Cannot read {}: {}", self.path.display(), e))
        })?;
        let documents = parse_documents(&text)?;
        let readings = project(&documents, filter);
        debug!(documents = documents.len(), kept = readings.len(), "read reading file");
        Ok(readings)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// HTTP endpoint returning reading documents as a JSON array.
///
/// Uses a blocking client; call it from a blocking context.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    timeout: Duration,
}

impl HttpSource {
    /// Fetch from `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ReadingSource for HttpSource {
    fn find(&self, filter: &ReadingFilter) -> Result<Vec<RawReading>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let mut request = client.get(&self.url);
        if let Some(since) = filter.since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }

        let documents: Vec<Value> = request.send()?.error_for_status()?.json()?;
        let readings = project(&documents, filter);
        debug!(url = %self.url, documents = documents.len(), kept = readings.len(), "fetched readings");
        Ok(readings)
    }

    fn describe(&self) -> String {
        format!("http {}", self.url)
    }
}

/// In-memory documents, for tests and demos
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: Vec<Value>,
}

impl MemorySource {
    /// Serve the given documents
    pub fn new(documents: Vec<Value>) -> Self {
        Self { documents }
    }

    /// Serve complete readings
    pub fn from_readings(readings: &[crate::data::Reading]) -> Result<Self> {
        let documents = readings
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(documents))
    }
}

impl ReadingSource for MemorySource {
    fn find(&self, filter: &ReadingFilter) -> Result<Vec<RawReading>> {
        Ok(project(&self.documents, filter))
    }

    fn describe(&self) -> String {
        format!("memory ({} documents)", self.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn parses_array_and_lines() {
        assert_eq!(parse_documents("[{\"a\": 1}, {\"a\": 2}]").unwrap().len(), 2);
        assert_eq!(parse_documents("{\"a\": 1}\n\n{\"a\": 2}\n").unwrap().len(), 2);
        assert!(parse_documents("   ").unwrap().is_empty());
        assert!(parse_documents("{not json").is_err());
    }

    #[test]
    fn filter_applies_cutoff() {
        let source = MemorySource::new(vec![
            json!({"timestamp": "2024-03-01T10:00:00Z", "temperature": 1.0}),
            json!({"timestamp": "2024-03-01T12:00:00Z", "temperature": 2.0}),
            json!({"temperature": 3.0}),
        ]);
        let filter = ReadingFilter {
            since: Some(Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap()),
        };

        let found = source.find(&filter).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].temperature, Some(2.0));
        assert_eq!(source.find(&ReadingFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn file_source_reads_export() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"timestamp": "2024-03-01 10:00:00", "temperature": 24, "humidity": 60, "mq2": 3, "mq135": 9}}"#
        )
        .unwrap();

        let source = JsonFileSource::new(file.path());
        let found = source.find(&ReadingFilter::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].complete().is_some());
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let source = JsonFileSource::new("/nonexistent/readings.json");
        assert!(matches!(
            source.find(&ReadingFilter::default()),
            Err(ForecastError::SourceError(_))
        ));
    }
}
