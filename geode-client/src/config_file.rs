//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! [`FileConfig`] mirrors [`SerializationConfig`] with serde-friendly
//! optional fields; every loader converts it through [`TryFrom`], so file
//! and environment settings are validated exactly like builder settings.
//!
//! # Supported Formats
//!
//! - **YAML** (requires `config-file` feature): `SerializationConfig::from_yaml("geode.yaml")`
//! - **TOML** (requires `config-file` feature): `SerializationConfig::from_toml("geode.toml")`
//! - **Environment Variables** (always available): `SerializationConfig::from_env()`
//!
//! # Example YAML
//!
//! ```yaml
//! session-name: orders
//! read-serialized: true
//! ignore-unread-fields: false
//! initial-buffer-capacity: 1024
//! max-buffer-capacity: 16777216
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SerializationConfig, SerializationConfigBuilder};

/// File-based mirror of [`SerializationConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Session name used in log records.
    pub session_name: Option<String>,
    /// Decode PDX values to `PdxInstance`.
    pub read_serialized: Option<bool>,
    /// Drop unread PDX fields silently.
    pub ignore_unread_fields: Option<bool>,
    /// Initial encoding buffer capacity in bytes.
    pub initial_buffer_capacity: Option<usize>,
    /// Encoding buffer ceiling in bytes.
    pub max_buffer_capacity: Option<usize>,
}

impl TryFrom<FileConfig> for SerializationConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = SerializationConfigBuilder::new();
        if let Some(name) = file.session_name {
            builder = builder.session_name(name);
        }
        if let Some(read_serialized) = file.read_serialized {
            builder = builder.read_serialized(read_serialized);
        }
        if let Some(ignore) = file.ignore_unread_fields {
            builder = builder.ignore_unread_fields(ignore);
        }
        if let Some(capacity) = file.initial_buffer_capacity {
            builder = builder.initial_buffer_capacity(capacity);
        }
        if let Some(capacity) = file.max_buffer_capacity {
            builder = builder.max_buffer_capacity(capacity);
        }
        builder.build()
    }
}

impl SerializationConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read YAML config file: {e}")))?;
        let file_config: FileConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse YAML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read TOML config file: {e}")))?;
        let file_config: FileConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse TOML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Setting |
    /// |----------|---------|
    /// | `GEODE_SESSION_NAME` | Session name |
    /// | `GEODE_READ_SERIALIZED` | `true` to decode PDX as `PdxInstance` |
    /// | `GEODE_IGNORE_UNREAD_FIELDS` | `true` to drop unread PDX fields silently |
    /// | `GEODE_INITIAL_BUFFER_CAPACITY` | Initial buffer capacity in bytes |
    /// | `GEODE_MAX_BUFFER_CAPACITY` | Buffer ceiling in bytes |
    ///
    /// Unset variables keep their defaults. A numeric variable that does not
    /// parse is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut file_config = FileConfig::default();

        if let Ok(val) = std::env::var("GEODE_SESSION_NAME") {
            file_config.session_name = Some(val);
        }
        if let Ok(val) = std::env::var("GEODE_READ_SERIALIZED") {
            file_config.read_serialized = Some(val.eq_ignore_ascii_case("true"));
        }
        if let Ok(val) = std::env::var("GEODE_IGNORE_UNREAD_FIELDS") {
            file_config.ignore_unread_fields = Some(val.eq_ignore_ascii_case("true"));
        }
        if let Ok(val) = std::env::var("GEODE_INITIAL_BUFFER_CAPACITY") {
            file_config.initial_buffer_capacity = Some(parse_capacity("GEODE_INITIAL_BUFFER_CAPACITY", &val)?);
        }
        if let Ok(val) = std::env::var("GEODE_MAX_BUFFER_CAPACITY") {
            file_config.max_buffer_capacity = Some(parse_capacity("GEODE_MAX_BUFFER_CAPACITY", &val)?);
        }

        file_config.try_into()
    }
}

fn parse_capacity(name: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|e| ConfigError::new(format!("{name} must be a byte count, got {value:?}: {e}")))
}

/// Loads configuration from a file, choosing the format by extension.
///
/// Requires the `config-file` feature.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<SerializationConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => SerializationConfig::from_yaml(path),
        Some("toml") => SerializationConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}
