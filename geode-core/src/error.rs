//! Error types for the Geode serialization layer.

use std::io;
use thiserror::Error;

/// The main error type for codec, registry and PDX operations.
///
/// Variants fall into four families that callers may treat differently:
/// protocol/corruption, configuration, resource and reflection. Use the
/// `is_*` helpers rather than matching individual variants when choosing a
/// retry or surfacing policy.
#[derive(Debug, Error)]
pub enum GeodeError {
    /// A read needed more bytes than the buffer holds.
    #[error("buffer underflow: need {needed} bytes, have {remaining}")]
    BufferUnderflow {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// A decoded type identifier has no registered reader.
    #[error("unknown type identifier: {0}")]
    UnknownTypeId(String),

    /// A length prefix or type-identifier escape sequence is malformed.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Other wire-level violations (invalid text encoding, inconsistent framing).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A type, code or PDX class name is already bound.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),

    /// No reader, writer or serializer is available for a type.
    #[error("type not registered: {0}")]
    TypeNotRegistered(String),

    /// A catalog type has no zero-argument constructor.
    #[error("missing zero-argument constructor for type: {0}")]
    MissingConstructor(String),

    /// The PDX type-name mapper returned nothing or broke the name bijection.
    #[error("PDX type mapper error: {0}")]
    PdxTypeMapper(String),

    /// Invalid settings or misuse of the registration API.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The output buffer could not grow to the requested size.
    #[error("out of memory: requested {requested} bytes, limit is {limit}")]
    OutOfMemory {
        /// Capacity the write needed.
        requested: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// No loaded module defines the requested type name.
    #[error("type not found: {0}")]
    TypeNotFound(String),

    /// More than one module defines the requested type name.
    #[error("ambiguous type {name}: defined in modules {modules:?}")]
    AmbiguousType {
        /// The requested fully-qualified name.
        name: String,
        /// Modules defining the name.
        modules: Vec<String>,
    },

    /// A value cannot be converted into the requested native type.
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The requested type.
        expected: String,
        /// What the value actually holds.
        actual: String,
    },

    /// Failures raised by user serialization code.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GeodeError {
    /// Builds a [`GeodeError::TypeMismatch`].
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        GeodeError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns true for corrupted or out-of-sync streams.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            GeodeError::BufferUnderflow { .. }
                | GeodeError::UnknownTypeId(_)
                | GeodeError::MalformedHeader(_)
                | GeodeError::Protocol(_)
        )
    }

    /// Returns true for registration and setup mistakes.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GeodeError::DuplicateRegistration(_)
                | GeodeError::TypeNotRegistered(_)
                | GeodeError::MissingConstructor(_)
                | GeodeError::PdxTypeMapper(_)
                | GeodeError::Configuration(_)
        )
    }

    /// Returns true for allocation failures.
    pub fn is_resource(&self) -> bool {
        matches!(self, GeodeError::OutOfMemory { .. })
    }

    /// Returns true for type discovery failures.
    pub fn is_reflection(&self) -> bool {
        matches!(
            self,
            GeodeError::TypeNotFound(_) | GeodeError::AmbiguousType { .. }
        )
    }
}

/// A specialized `Result` type for Geode serialization operations.
pub type Result<T> = std::result::Result<T, GeodeError>;
