//! Cache sessions over the Geode serialization layer.
//!
//! A [`CacheSession`] owns an isolated [`TypeRegistry`] preloaded with the
//! built-in wire types. Applications register their own types on it and
//! move values to and from the wire format through typed entry points.
//!
//! # Quick Start
//!
//! ```rust
//! use geode_client::{CacheSession, SerializationConfig};
//! use geode_client::core::DataSerializable;
//!
//! #[derive(Debug, Clone, Default, PartialEq, DataSerializable)]
//! #[geode(class_id = 7)]
//! struct Order {
//!     id: i64,
//!     customer: String,
//! }
//!
//! let session = CacheSession::connect(SerializationConfig::default())?;
//! session.registry()?.register_type(7, Order::default)?;
//!
//! let order = Order { id: 1, customer: "acme".into() };
//! let bytes = session.serialize(order.clone())?;
//! assert_eq!(session.deserialize::<Order>(&bytes)?, Some(order));
//! # Ok::<(), geode_client::ClientError>(())
//! ```
//!
//! # Configuration
//!
//! [`SerializationConfig::builder()`] builds a config programmatically;
//! [`config_file`] loads one from YAML, TOML or `GEODE_*` environment
//! variables.

#![warn(missing_docs)]

pub mod config;
pub mod config_file;
pub mod error;
mod session;

/// The serialization layer this crate is built on.
pub use geode_core as core;

pub use config::{ConfigError, SerializationConfig, SerializationConfigBuilder};
#[cfg(feature = "config-file")]
pub use config_file::load_config;
pub use config_file::FileConfig;
pub use error::{ClientError, Result};
pub use geode_core::{CacheableValue, FromCacheable, IntoCacheable, TypeRegistry};
pub use session::CacheSession;
