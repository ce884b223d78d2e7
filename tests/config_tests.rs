//! Tests for configuration loading.

use std::io::Write;
use std::time::Duration;

use panelflow::ClientConfig;

#[test]
fn test_defaults_without_file() {
    let config = ClientConfig::load(None).unwrap();
    assert_eq!(config.base_url, "http://127.0.0.1:8000");
    assert_eq!(config.ws_base_url, "ws://127.0.0.1:8000");
    let timing = config.timing();
    assert_eq!(timing.reveal_cadence, Duration::from_millis(120));
    assert_eq!(timing.settle_delay, Duration::from_millis(500));
}

#[test]
fn test_load_full_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
base_url = "http://panel.example:9000"
ws_base_url = "ws://panel.example:9000"
poll_interval_ms = 250
poll_interval_cached_ms = 5000
"#
    )
    .unwrap();
    let config = ClientConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.base_url, "http://panel.example:9000");
    assert_eq!(config.timing().poll_interval, Duration::from_millis(250));
    assert_eq!(
        config.timing().poll_interval_cached,
        Duration::from_millis(5000)
    );
    // Unset keys keep their defaults.
    assert_eq!(config.reveal_cadence_ms, 120);
}

#[test]
fn test_missing_file_is_config_error() {
    let result = ClientConfig::load(Some(std::path::Path::new("/nonexistent/panelflow.toml")));
    assert!(matches!(
        result,
        Err(panelflow::PanelflowError::Config(_))
    ));
}

#[test]
fn test_unknown_key_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "poll_interva_ms = 250").unwrap();
    assert!(ClientConfig::load(Some(file.path())).is_err());
}
