//! Loading session configuration from YAML and TOML files.
#![cfg(feature = "config-file")]

use std::io::Write;

use geode_client::{load_config, CacheSession, SerializationConfig};
use tempfile::Builder;

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_yaml() {
    let file = write_temp(
        ".yaml",
        "session-name: orders\nread-serialized: true\ninitial-buffer-capacity: 64\nmax-buffer-capacity: 1024\n",
    );
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.session_name(), "orders");
    assert!(config.read_serialized());
    assert!(!config.ignore_unread_fields());
    assert_eq!(config.initial_buffer_capacity(), 64);
    assert_eq!(config.max_buffer_capacity(), 1024);
}

#[test]
fn test_load_yml_extension() {
    let file = write_temp(".yml", "ignore-unread-fields: true\n");
    let config = load_config(file.path()).unwrap();
    assert!(config.ignore_unread_fields());
    assert_eq!(config.session_name(), "default");
}

#[test]
fn test_load_toml() {
    let file = write_temp(
        ".toml",
        "session-name = \"inventory\"\nignore-unread-fields = true\nmax-buffer-capacity = 4096\n",
    );
    let config = SerializationConfig::from_toml(file.path()).unwrap();
    assert_eq!(config.session_name(), "inventory");
    assert!(config.ignore_unread_fields());
    assert_eq!(config.max_buffer_capacity(), 4096);
}

#[test]
fn test_empty_file_gives_defaults() {
    let file = write_temp(".toml", "");
    let config = load_config(file.path()).unwrap();
    assert_eq!(config, SerializationConfig::default());
}

#[test]
fn test_invalid_values_are_rejected() {
    let file = write_temp(".yaml", "initial-buffer-capacity: 2048\nmax-buffer-capacity: 1024\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.message().contains("must not exceed"));
}

#[test]
fn test_parse_errors_are_reported() {
    let file = write_temp(".yaml", "read-serialized: [not, a, bool]\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.message().contains("failed to parse YAML config"));

    let file = write_temp(".toml", "max-buffer-capacity = \"big\"\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.message().contains("failed to parse TOML config"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.message().contains("failed to read YAML config file"));
}

#[test]
fn test_loaded_config_drives_session() {
    let file = write_temp(".yaml", "session-name: tiny\nmax-buffer-capacity: 32\ninitial-buffer-capacity: 16\n");
    let session = CacheSession::connect(load_config(file.path()).unwrap()).unwrap();
    assert_eq!(session.config().session_name(), "tiny");
    assert!(session.serialize("x".repeat(100)).is_err());
}
