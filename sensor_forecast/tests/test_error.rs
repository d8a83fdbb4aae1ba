use sensor_forecast::{ForecastError, Stage};
use sensor_math::MathError;

#[test]
fn test_error_messages() {
    let err = ForecastError::InsufficientData {
        required: 10,
        found: 3,
    };
    assert_eq!(
        err.to_string(),
        "Insufficient data: need at least 10 training pairs, found 3"
    );

    let err = ForecastError::StageFailure {
        stage: Stage::Train,
        reason: "timed out after 1.0s".to_string(),
    };
    assert_eq!(err.to_string(), "train stage failed: timed out after 1.0s");

    let err = ForecastError::ArtifactMissing("model.json".to_string());
    assert_eq!(err.to_string(), "Artifact missing: model.json");
}

#[test]
fn test_in_stage_wraps_unexpected_faults() {
    let io = ForecastError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
    match io.in_stage(Stage::Ingest) {
        ForecastError::StageFailure { stage, reason } => {
            assert_eq!(stage, Stage::Ingest);
            assert!(reason.contains("disk full"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_in_stage_keeps_expected_outcomes() {
    let no_data = ForecastError::NoData("empty".to_string()).in_stage(Stage::Ingest);
    assert!(matches!(no_data, ForecastError::NoData(_)));

    let short = ForecastError::InsufficientData {
        required: 10,
        found: 0,
    }
    .in_stage(Stage::Train);
    assert!(matches!(short, ForecastError::InsufficientData { .. }));
}

#[test]
fn test_conversions() {
    let math: ForecastError = MathError::InsufficientData("need two rows".to_string()).into();
    assert!(matches!(math, ForecastError::MathError(_)));

    let json: ForecastError = serde_json::from_str::<u32>("nope").unwrap_err().into();
    assert!(matches!(json, ForecastError::JsonError(_)));

    let config: ForecastError = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
    assert!(matches!(config, ForecastError::ConfigError(_)));
}
