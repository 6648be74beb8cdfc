//! The cache session: one isolated type registry plus typed codec entry points.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use geode_core::{CacheableValue, FromCacheable, IntoCacheable, TypeRegistry};

use crate::config::SerializationConfig;
use crate::error::{ClientError, Result};

/// A connected cache session.
///
/// Every session owns its own [`TypeRegistry`]; registrations made through
/// one session are never visible to another.
///
/// # Example
///
/// ```
/// use geode_client::{CacheSession, SerializationConfig};
///
/// let session = CacheSession::connect(SerializationConfig::default())?;
/// let bytes = session.serialize(vec![1i32, 2, 3])?;
/// let back: Option<Vec<i32>> = session.deserialize(&bytes)?;
/// assert_eq!(back, Some(vec![1, 2, 3]));
/// # Ok::<(), geode_client::ClientError>(())
/// ```
#[derive(Debug)]
pub struct CacheSession {
    config: SerializationConfig,
    registry: Arc<TypeRegistry>,
    closed: AtomicBool,
}

impl CacheSession {
    /// Opens a session with a fresh registry holding the built-in types.
    pub fn connect(config: SerializationConfig) -> Result<Self> {
        let registry = Arc::new(TypeRegistry::with_builtins());
        registry.set_read_serialized(config.read_serialized());
        registry.set_ignore_unread_fields(config.ignore_unread_fields());
        registry.set_buffer_capacity(config.initial_buffer_capacity(), config.max_buffer_capacity())?;

        tracing::info!(
            session = %config.session_name(),
            read_serialized = config.read_serialized(),
            "cache session connected"
        );

        Ok(Self {
            config,
            registry,
            closed: AtomicBool::new(false),
        })
    }

    /// Unregisters every type, built-ins included, and closes the session.
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registry.clear();
        tracing::info!(session = %self.config.session_name(), "cache session disconnected");
    }

    /// Re-installs the built-in types and reopens the session.
    ///
    /// Application registrations dropped by [`disconnect`](Self::disconnect)
    /// must be made again.
    pub fn reconnect(&self) {
        self.registry.register_builtins();
        self.closed.store(false, Ordering::Release);
        tracing::info!(session = %self.config.session_name(), "cache session reconnected");
    }

    /// Whether [`disconnect`](Self::disconnect) has been called since the last connect.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The configuration this session was opened with.
    pub fn config(&self) -> &SerializationConfig {
        &self.config
    }

    /// The session's type registry, for registering application types.
    pub fn registry(&self) -> Result<&Arc<TypeRegistry>> {
        self.ensure_open()?;
        Ok(&self.registry)
    }

    /// Encodes a value with a compile-time wire mapping.
    ///
    /// `None` encodes as the null object.
    pub fn serialize<T: IntoCacheable>(&self, value: T) -> Result<Bytes> {
        self.ensure_open()?;
        let value = value.into_element()?;
        let mut output = self.registry.output();
        output.write_object(value.as_ref())?;
        Ok(output.into_bytes())
    }

    /// Encodes a value whose wire mapping is looked up at run time.
    ///
    /// Uses the native mapping recorded at registration, then the PDX serializer.
    pub fn serialize_any<T: Any + Send + Sync>(&self, value: T) -> Result<Bytes> {
        self.ensure_open()?;
        let value = self.registry.get_unmanaged_value(value)?;
        Ok(self.registry.serialize(&value)?)
    }

    /// Encodes an already-built wire value.
    pub fn serialize_value(&self, value: &CacheableValue) -> Result<Bytes> {
        self.ensure_open()?;
        Ok(self.registry.serialize(value)?)
    }

    /// Decodes bytes into a native value; `None` for the null encodings.
    pub fn deserialize<T: FromCacheable>(&self, data: &[u8]) -> Result<Option<T>> {
        let value = self.deserialize_value(data)?;
        Ok(self.registry.get_managed_value(value)?)
    }

    /// Decodes bytes into a wire value.
    pub fn deserialize_value(&self, data: &[u8]) -> Result<Option<CacheableValue>> {
        self.ensure_open()?;
        Ok(self.registry.deserialize(data)?)
    }

    /// Java `hashCode` of a key, as the server computes it for routing.
    pub fn key_hash<T: IntoCacheable>(&self, key: T) -> Result<i32> {
        self.ensure_open()?;
        Ok(self.registry.to_cacheable(key)?.hash_code())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ClientError::SessionClosed(self.config.session_name().to_string()));
        }
        Ok(())
    }
}

impl Drop for CacheSession {
    fn drop(&mut self) {
        if !self.is_closed() {
            tracing::debug!(session = %self.config.session_name(), "dropping open cache session");
        }
    }
}
