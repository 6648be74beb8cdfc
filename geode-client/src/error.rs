//! Errors raised by the session layer.

use geode_core::GeodeError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by [`CacheSession`](crate::CacheSession) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The serialization layer rejected the value or bytes.
    #[error(transparent)]
    Serialization(#[from] GeodeError),

    /// The session configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session was disconnected.
    #[error("session '{0}' is closed")]
    SessionClosed(String),
}

impl ClientError {
    /// Returns the serialization error, if this is one.
    pub fn as_serialization(&self) -> Option<&GeodeError> {
        match self {
            ClientError::Serialization(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` when the session was closed.
    pub fn is_session_closed(&self) -> bool {
        matches!(self, ClientError::SessionClosed(_))
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_geode_error() {
        let err: ClientError = GeodeError::Protocol("bad header".into()).into();
        assert!(err.as_serialization().is_some_and(GeodeError::is_protocol));
        assert!(!err.is_session_closed());
    }

    #[test]
    fn test_session_closed_display() {
        let err = ClientError::SessionClosed("orders".into());
        assert_eq!(err.to_string(), "session 'orders' is closed");
        assert!(err.is_session_closed());
    }
}
