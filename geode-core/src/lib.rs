//! Wire codec, type registry and PDX serialization for the Geode cache client.
//!
//! The [`serialization`] module holds the binary codec, the built-in value
//! types and the session-scoped [`TypeRegistry`](serialization::TypeRegistry).

#![warn(missing_docs)]

pub mod error;
pub mod serialization;

pub use error::{GeodeError, Result};
pub use serialization::{
    CacheableValue, DataInput, DataOutput, FromCacheable, IntoCacheable, ObjectDataInput, ObjectDataOutput,
    TypeRegistry,
};

#[cfg(feature = "derive")]
pub use geode_derive::{DataSerializable, PdxSerializable};
