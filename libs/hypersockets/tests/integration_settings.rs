//! Integration tests for loading socket settings from disk

mod common;

use hypersockets::{HyperSocketError, SocketSettings};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_load_settings_file() {
    let yaml = r#"
url: wss://stream.example.com/ws
token: abc123
headers:
  X-Client: hyperclient
query:
  channel: trades
debug: true
heartbeat_interval_ms: 5000
heartbeat_timeout_ms: 15000
connect_timeout_ms: 2000
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let settings = SocketSettings::load(file.path()).unwrap();
    verbose_println!("  loaded: {:?}", settings);

    let config = settings.into_config();
    assert!(config.debug);
    assert_eq!(config.connect_timeout, Duration::from_secs(2));

    let request = config.connect_request().unwrap();
    assert_eq!(request.url.as_str(), "wss://stream.example.com/ws?channel=trades");
    assert!(request
        .headers
        .contains(&("Authorization".to_string(), "Bearer abc123".to_string())));
    assert!(request
        .headers
        .contains(&("X-Client".to_string(), "hyperclient".to_string())));
}

#[test]
fn test_missing_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = SocketSettings::load(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(HyperSocketError::SettingsFile(_))));
}
