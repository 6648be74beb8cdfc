//! Configuration types for a cache session.

use std::fmt;

/// Default initial capacity of an encoding buffer, in bytes.
pub const DEFAULT_INITIAL_BUFFER_CAPACITY: usize = 256;
/// Default ceiling for an encoding buffer, in bytes.
pub const DEFAULT_MAX_BUFFER_CAPACITY: usize = i32::MAX as usize;
/// Default session name.
pub const DEFAULT_SESSION_NAME: &str = "default";

/// Error returned when configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Serialization behavior of a cache session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationConfig {
    session_name: String,
    read_serialized: bool,
    ignore_unread_fields: bool,
    initial_buffer_capacity: usize,
    max_buffer_capacity: usize,
}

impl SerializationConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SerializationConfigBuilder {
        SerializationConfigBuilder::new()
    }

    /// Name used in session log records.
    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Whether PDX values decode to `PdxInstance` rather than the application type.
    pub fn read_serialized(&self) -> bool {
        self.read_serialized
    }

    /// Whether PDX fields left unread are silently dropped.
    pub fn ignore_unread_fields(&self) -> bool {
        self.ignore_unread_fields
    }

    /// Initial capacity of encoding buffers.
    pub fn initial_buffer_capacity(&self) -> usize {
        self.initial_buffer_capacity
    }

    /// Ceiling past which an encoding buffer refuses to grow.
    pub fn max_buffer_capacity(&self) -> usize {
        self.max_buffer_capacity
    }
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            session_name: DEFAULT_SESSION_NAME.to_string(),
            read_serialized: false,
            ignore_unread_fields: false,
            initial_buffer_capacity: DEFAULT_INITIAL_BUFFER_CAPACITY,
            max_buffer_capacity: DEFAULT_MAX_BUFFER_CAPACITY,
        }
    }
}

/// Builder for `SerializationConfig`.
#[derive(Debug, Clone, Default)]
pub struct SerializationConfigBuilder {
    session_name: Option<String>,
    read_serialized: Option<bool>,
    ignore_unread_fields: Option<bool>,
    initial_buffer_capacity: Option<usize>,
    max_buffer_capacity: Option<usize>,
}

impl SerializationConfigBuilder {
    /// Creates a new builder with every setting at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session name.
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }

    /// Decodes PDX values to `PdxInstance` when set.
    pub fn read_serialized(mut self, read_serialized: bool) -> Self {
        self.read_serialized = Some(read_serialized);
        self
    }

    /// Drops unread PDX fields without logging them when set.
    pub fn ignore_unread_fields(mut self, ignore: bool) -> Self {
        self.ignore_unread_fields = Some(ignore);
        self
    }

    /// Sets the initial capacity of encoding buffers.
    pub fn initial_buffer_capacity(mut self, capacity: usize) -> Self {
        self.initial_buffer_capacity = Some(capacity);
        self
    }

    /// Sets the ceiling of encoding buffers.
    pub fn max_buffer_capacity(mut self, capacity: usize) -> Self {
        self.max_buffer_capacity = Some(capacity);
        self
    }

    /// Builds the configuration, validating all settings.
    pub fn build(self) -> Result<SerializationConfig, ConfigError> {
        let session_name = self
            .session_name
            .unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
        if session_name.is_empty() {
            return Err(ConfigError::new("session_name must not be empty"));
        }

        let initial_buffer_capacity = self
            .initial_buffer_capacity
            .unwrap_or(DEFAULT_INITIAL_BUFFER_CAPACITY);
        let max_buffer_capacity = self
            .max_buffer_capacity
            .unwrap_or(DEFAULT_MAX_BUFFER_CAPACITY);

        if max_buffer_capacity == 0 {
            return Err(ConfigError::new("max_buffer_capacity must be greater than zero"));
        }
        if initial_buffer_capacity > max_buffer_capacity {
            return Err(ConfigError::new(format!(
                "initial_buffer_capacity ({initial_buffer_capacity}) must not exceed max_buffer_capacity ({max_buffer_capacity})"
            )));
        }

        Ok(SerializationConfig {
            session_name,
            read_serialized: self.read_serialized.unwrap_or(false),
            ignore_unread_fields: self.ignore_unread_fields.unwrap_or(false),
            initial_buffer_capacity,
            max_buffer_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SerializationConfig::default();
        assert_eq!(config.session_name(), "default");
        assert!(!config.read_serialized());
        assert!(!config.ignore_unread_fields());
        assert_eq!(config.initial_buffer_capacity(), 256);
        assert_eq!(config.max_buffer_capacity(), i32::MAX as usize);
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let built = SerializationConfig::builder().build().unwrap();
        assert_eq!(built, SerializationConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = SerializationConfig::builder()
            .session_name("orders")
            .read_serialized(true)
            .ignore_unread_fields(true)
            .initial_buffer_capacity(64)
            .max_buffer_capacity(4096)
            .build()
            .unwrap();

        assert_eq!(config.session_name(), "orders");
        assert!(config.read_serialized());
        assert!(config.ignore_unread_fields());
        assert_eq!(config.initial_buffer_capacity(), 64);
        assert_eq!(config.max_buffer_capacity(), 4096);
    }

    #[test]
    fn test_builder_empty_session_name_fails() {
        let result = SerializationConfig::builder().session_name("").build();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("session_name must not be empty"));
    }

    #[test]
    fn test_builder_zero_max_capacity_fails() {
        let result = SerializationConfig::builder()
            .initial_buffer_capacity(0)
            .max_buffer_capacity(0)
            .build();
        assert!(result.unwrap_err().message().contains("greater than zero"));
    }

    #[test]
    fn test_builder_initial_above_max_fails() {
        let result = SerializationConfig::builder()
            .initial_buffer_capacity(1024)
            .max_buffer_capacity(512)
            .build();
        assert!(result.unwrap_err().message().contains("must not exceed"));
    }

    #[test]
    fn test_builder_initial_equal_to_max_is_valid() {
        let config = SerializationConfig::builder()
            .initial_buffer_capacity(512)
            .max_buffer_capacity(512)
            .build()
            .unwrap();
        assert_eq!(config.initial_buffer_capacity(), config.max_buffer_capacity());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::new("bad value");
        assert_eq!(err.to_string(), "configuration error: bad value");
    }
}
