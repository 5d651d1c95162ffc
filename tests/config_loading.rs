//! Integration test: Configuration utilities
//!
//! Tests config path resolution and loading the combined settings file.

use hyperclient::bin_common::{load_config_from_env, AppSettings, ConfigType};
use std::env;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_config_path_from_env_and_default() {
    // Single test so the env var is not raced by a parallel test
    env::remove_var("HYPERCLIENT_CONFIG_PATH");
    let config_path = load_config_from_env(ConfigType::Client);
    assert_eq!(config_path.to_str().unwrap(), "config/client.yaml");

    env::set_var("HYPERCLIENT_CONFIG_PATH", "/etc/hyperclient.yaml");
    let config_path = load_config_from_env(ConfigType::Client);
    assert_eq!(config_path.to_str().unwrap(), "/etc/hyperclient.yaml");
    env::remove_var("HYPERCLIENT_CONFIG_PATH");
}

#[test]
fn test_config_type_default_paths() {
    assert_eq!(ConfigType::Client.default_path(), "config/client.yaml");

    let custom = ConfigType::Custom("test.yaml".to_string());
    assert_eq!(custom.default_path(), "test.yaml");
}

#[test]
fn test_load_combined_settings() {
    let yaml = r#"
http:
  base_url: https://api.example.com
  timeout_secs: 5
  retry:
    max_attempts: 2
socket:
  url: wss://api.example.com/ws
  token: abc
  max_reconnect_attempts: 3
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let settings = AppSettings::load(file.path()).unwrap();

    let http = settings.http.into_config();
    assert_eq!(http.base_url.as_deref(), Some("https://api.example.com"));
    assert_eq!(http.timeout, Some(Duration::from_secs(5)));
    assert_eq!(http.retry.max_attempts, 2);

    let socket = settings.socket.unwrap().into_config();
    assert_eq!(socket.token.as_deref(), Some("abc"));
    assert_eq!(socket.reconnect.max_attempts, Some(3));
}

#[test]
fn test_shipped_config_file_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/client.yaml");
    let settings = AppSettings::load(path).unwrap();
    assert!(settings.http.base_url.is_some());
    assert!(settings.socket.is_some());
}
