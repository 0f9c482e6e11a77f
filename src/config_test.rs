use super::*;
use tempfile::TempDir;

#[test]
fn test_defaults() {
    let config = DetectorConfig::default();
    assert_eq!(config.window_duration(), Duration::from_secs(2));
    assert_eq!(config.sample_rate, 16000);
    assert_eq!(config.sensitivity, 0.75);
    assert!(config.library_path.is_none());
    assert_eq!(config.exit_timeout(), Duration::from_millis(500));
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = DetectorConfig::load(&temp_dir.path().join("config.json")).unwrap();
    assert_eq!(config, DetectorConfig::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "windowDurationMs": 500, "libraryPath": "/tmp/refs.json" }"#).unwrap();

    let config = DetectorConfig::load(&path).unwrap();
    assert_eq!(config.window_duration_ms, 500);
    assert_eq!(config.sensitivity, DEFAULT_SENSITIVITY);
    assert_eq!(config.library_path(), PathBuf::from("/tmp/refs.json"));
}

#[test]
fn test_out_of_range_sensitivity_is_clamped_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "sensitivity": 1.7 }"#).unwrap();

    assert_eq!(DetectorConfig::load(&path).unwrap().sensitivity, 1.0);
}

#[test]
fn test_invalid_json_is_parse_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "not json").unwrap();

    assert!(matches!(DetectorConfig::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_save_then_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");
    let config = DetectorConfig {
        window_duration_ms: 1000,
        sensitivity: 0.6,
        ..Default::default()
    };

    config.save(&path).unwrap();
    assert!(!path.with_extension("tmp").exists());
    assert_eq!(DetectorConfig::load(&path).unwrap(), config);
}

#[test]
fn test_clamp_sensitivity() {
    assert_eq!(clamp_sensitivity(-0.5), 0.0);
    assert_eq!(clamp_sensitivity(0.4), 0.4);
    assert_eq!(clamp_sensitivity(2.0), 1.0);
    assert_eq!(clamp_sensitivity(f64::NAN), DEFAULT_SENSITIVITY);
}

#[test]
fn test_default_library_path_ends_with_app_file() {
    let path = default_library_path();
    assert!(path.ends_with("chimewatch/references.json"));
}

#[test]
fn test_default_contacts_path_ends_with_app_file() {
    assert!(default_contacts_path().ends_with("chimewatch/contacts.json"));

    let config = DetectorConfig {
        contacts_path: Some(PathBuf::from("/tmp/contacts.json")),
        ..Default::default()
    };
    assert_eq!(config.contacts_path(), PathBuf::from("/tmp/contacts.json"));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_zero_window_is_rejected_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "windowDurationMs": 0 }"#).unwrap();

    assert!(matches!(DetectorConfig::load(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_zero_sample_rate_is_rejected_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "sampleRate": 0, "windowDurationMs": 2000 }"#).unwrap();

    assert!(matches!(DetectorConfig::load(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_window_shorter_than_one_sample_is_rejected() {
    let config = DetectorConfig {
        window_duration_ms: 1,
        sample_rate: 100,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let config = DetectorConfig {
        window_duration_ms: 10,
        sample_rate: 100,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
}
