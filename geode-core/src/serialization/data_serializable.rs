//! Data serializable support: user class-ID types and built-in overrides.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use super::data_input::ObjectDataInput;
use super::data_output::ObjectDataOutput;
use super::ds_code::DsCode;
use super::hashing::hash_bytes;
use crate::error::Result;

/// Downcasting support for serializable trait objects.
pub trait AsAny: Any + Send + Sync {
    /// Borrows `self` as `Any`.
    fn as_any(&self) -> &dyn Any;

    /// Converts a shared instance into a shared `Any`.
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// The Rust type name, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Serializes a payload with `write` into a detached buffer.
pub(crate) fn payload_of(write: impl FnOnce(&mut ObjectDataOutput) -> Result<()>) -> Option<Bytes> {
    let mut output = ObjectDataOutput::new();
    write(&mut output).ok()?;
    Some(output.into_bytes())
}

/// A user type registered under a 32-bit class ID.
///
/// On the wire the value is `CacheableUserData{,2,4}`, the class ID in 1, 2
/// or 4 bytes, then whatever [`to_data`](Self::to_data) writes. The registered
/// factory creates a blank instance and [`from_data`](Self::from_data) must
/// consume exactly the bytes `to_data` produced.
///
/// Equality and hashing default to comparing the serialized payload.
pub trait DataSerializable: AsAny + fmt::Debug {
    /// Returns the class ID for this type.
    fn class_id(&self) -> i32;

    /// Writes the object's data to the output.
    fn to_data(&self, output: &mut ObjectDataOutput) -> Result<()>;

    /// Reads the object's data from the input, populating this instance.
    fn from_data(&mut self, input: &mut ObjectDataInput<'_>) -> Result<()>;

    /// Value equality with another instance.
    fn equals(&self, other: &dyn DataSerializable) -> bool {
        self.as_any().type_id() == other.as_any().type_id()
            && payload_of(|o| self.to_data(o)) == payload_of(|o| other.to_data(o))
    }

    /// Java-compatible hash code.
    fn hash_code(&self) -> i32 {
        payload_of(|o| self.to_data(o)).map_or(0, |b| hash_bytes(&b))
    }
}

/// A type standing in for a built-in single-byte-coded wire type.
///
/// Registering one replaces the built-in reader for [`ds_code`](Self::ds_code).
pub trait DataSerializablePrimitive: AsAny + fmt::Debug {
    /// Returns the DSCode this type is written under.
    fn ds_code(&self) -> DsCode;

    /// Writes the payload that follows the DSCode.
    fn to_data(&self, output: &mut ObjectDataOutput) -> Result<()>;

    /// Reads the payload that follows the DSCode.
    fn from_data(&mut self, input: &mut ObjectDataInput<'_>) -> Result<()>;

    /// Value equality with another instance.
    fn equals(&self, other: &dyn DataSerializablePrimitive) -> bool {
        self.ds_code() == other.ds_code()
            && payload_of(|o| self.to_data(o)) == payload_of(|o| other.to_data(o))
    }

    /// Java-compatible hash code.
    fn hash_code(&self) -> i32 {
        payload_of(|o| self.to_data(o)).map_or(0, |b| hash_bytes(&b))
    }
}

/// An internal framework type addressed by a fixed ID.
pub trait DataSerializableFixedId: AsAny + fmt::Debug {
    /// Returns the fixed ID.
    fn fixed_id(&self) -> i32;

    /// Writes the payload that follows the fixed ID.
    fn to_data(&self, output: &mut ObjectDataOutput) -> Result<()>;

    /// Reads the payload that follows the fixed ID.
    fn from_data(&mut self, input: &mut ObjectDataInput<'_>) -> Result<()>;

    /// Value equality with another instance.
    fn equals(&self, other: &dyn DataSerializableFixedId) -> bool {
        self.fixed_id() == other.fixed_id()
            && payload_of(|o| self.to_data(o)) == payload_of(|o| other.to_data(o))
    }

    /// Java-compatible hash code.
    fn hash_code(&self) -> i32 {
        payload_of(|o| self.to_data(o)).map_or(0, |b| hash_bytes(&b))
    }
}

/// Creates blank user-type instances for decoding.
pub type DataSerializableFactory = Arc<dyn Fn() -> Box<dyn DataSerializable> + Send + Sync>;

/// Creates blank primitive-override instances for decoding.
pub type PrimitiveFactory = Arc<dyn Fn() -> Box<dyn DataSerializablePrimitive> + Send + Sync>;

/// Creates blank fixed-ID instances for decoding.
pub type FixedIdFactory = Arc<dyn Fn() -> Box<dyn DataSerializableFixedId> + Send + Sync>;
