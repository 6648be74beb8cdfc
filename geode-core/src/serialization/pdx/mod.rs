//! PDX structured serialization.
//!
//! A PDX record carries its fields by name through a [`PdxType`] definition
//! held in the session's [`PdxTypeRegistry`], so a class can be read without
//! a class ID agreed up front. Application types either implement
//! [`PdxSerializable`] or are handled by a registered [`PdxSerializer`].

mod instance;
mod mapper;
mod reader;
mod serializer;
mod type_registry;
mod writer;

use std::collections::HashMap;
use std::fmt;

use crate::error::{GeodeError, Result};
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};

pub use instance::PdxInstance;
pub use mapper::{IdentityPdxTypeMapper, PdxTypeMapper};
pub(crate) use mapper::PdxNameCache;
pub use reader::PdxReader;
pub(crate) use serializer::{read_pdx, read_pdx_enum, write_pdx, write_pdx_enum};
pub use serializer::{PdxFactory, PdxSerializable, PdxSerializer, PdxWrapper};
pub use type_registry::PdxTypeRegistry;
pub use writer::PdxWriter;

/// Rabin fingerprint seed shared with the Java implementation.
const RABIN_FINGERPRINT_INIT: u64 = 0xc15d_213a_a4d7_a795;

/// Computes a 64-bit Rabin fingerprint.
pub fn rabin_fingerprint_64(data: &[u8]) -> i64 {
    let mut fp = RABIN_FINGERPRINT_INIT;
    for &byte in data {
        for i in 0..8 {
            let bit = (byte >> i) & 1;
            if (fp ^ bit as u64) & 1 == 1 {
                fp = (fp >> 1) ^ RABIN_FINGERPRINT_INIT;
            } else {
                fp >>= 1;
            }
        }
    }
    fp as i64
}

/// Supported field types in PDX serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PdxFieldType {
    /// Boolean value.
    Boolean = 0,
    /// Signed 8-bit integer.
    Byte = 1,
    /// UTF-16 code unit.
    Char = 2,
    /// Signed 16-bit integer.
    Short = 3,
    /// Signed 32-bit integer.
    Int = 4,
    /// Signed 64-bit integer.
    Long = 5,
    /// 32-bit floating point.
    Float = 6,
    /// 64-bit floating point.
    Double = 7,
    /// Milliseconds since the epoch.
    Date = 8,
    /// Typed string.
    String = 9,
    /// Any object, written with its type identifier.
    Object = 10,
    /// Array of booleans.
    BooleanArray = 11,
    /// Array of chars.
    CharArray = 12,
    /// Array of bytes.
    ByteArray = 13,
    /// Array of shorts.
    ShortArray = 14,
    /// Array of ints.
    IntArray = 15,
    /// Array of longs.
    LongArray = 16,
    /// Array of floats.
    FloatArray = 17,
    /// Array of doubles.
    DoubleArray = 18,
    /// Array of strings.
    StringArray = 19,
    /// Array of objects.
    ObjectArray = 20,
    /// Array of byte arrays.
    ArrayOfByteArrays = 21,
}

impl PdxFieldType {
    /// Creates a field type from its wire representation.
    pub fn from_id(id: u8) -> Result<Self> {
        let field_type = match id {
            0 => Self::Boolean,
            1 => Self::Byte,
            2 => Self::Char,
            3 => Self::Short,
            4 => Self::Int,
            5 => Self::Long,
            6 => Self::Float,
            7 => Self::Double,
            8 => Self::Date,
            9 => Self::String,
            10 => Self::Object,
            11 => Self::BooleanArray,
            12 => Self::CharArray,
            13 => Self::ByteArray,
            14 => Self::ShortArray,
            15 => Self::IntArray,
            16 => Self::LongArray,
            17 => Self::FloatArray,
            18 => Self::DoubleArray,
            19 => Self::StringArray,
            20 => Self::ObjectArray,
            21 => Self::ArrayOfByteArrays,
            _ => {
                return Err(GeodeError::MalformedHeader(format!(
                    "unknown PDX field type id {id}"
                )))
            }
        };
        Ok(field_type)
    }

    /// Returns the wire representation of this field type.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Returns true if this is an array type.
    pub fn is_array(self) -> bool {
        self.id() >= Self::BooleanArray.id()
    }
}

impl fmt::Display for PdxFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Definition of a single field within a PDX type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdxField {
    name: String,
    field_type: PdxFieldType,
    index: usize,
    identity: bool,
}

impl PdxField {
    /// Creates a field definition.
    pub fn new(name: impl Into<String>, field_type: PdxFieldType, index: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            index,
            identity: false,
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    pub fn field_type(&self) -> PdxFieldType {
        self.field_type
    }

    /// Returns the position of the field in the record.
    pub fn index(&self) -> usize {
        self.index
    }

    /// True when the field takes part in equality and hashing.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    pub(crate) fn set_identity(&mut self, identity: bool) {
        self.identity = identity;
    }
}

/// The definition of a PDX class: its distributed name and ordered fields.
///
/// Travels on the wire as fixed ID 17.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdxType {
    class_name: String,
    type_id: i32,
    fields: Vec<PdxField>,
    field_indices: HashMap<String, usize>,
}

impl PdxType {
    /// Creates an unnumbered type with the given fields.
    pub fn new(class_name: impl Into<String>, fields: Vec<PdxField>) -> Self {
        let field_indices = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self {
            class_name: class_name.into(),
            type_id: 0,
            fields,
            field_indices,
        }
    }

    /// Returns the distributed class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the session-assigned type ID; 0 until defined.
    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    pub(crate) fn with_type_id(mut self, type_id: i32) -> Self {
        self.type_id = type_id;
        self
    }

    /// Returns all field definitions in record order.
    pub fn fields(&self) -> &[PdxField] {
        &self.fields
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&PdxField> {
        self.field_indices.get(name).map(|&i| &self.fields[i])
    }

    /// Returns true if a field with the given name exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.field_indices.contains_key(name)
    }

    /// True when two definitions describe the same layout, ignoring type IDs.
    pub fn same_layout(&self, other: &PdxType) -> bool {
        self.class_name == other.class_name && self.fields == other.fields
    }

    /// Fingerprint of the layout, used to allocate type IDs.
    pub fn fingerprint(&self) -> i64 {
        let mut data = Vec::with_capacity(self.class_name.len() + self.fields.len() * 16);
        data.extend_from_slice(self.class_name.as_bytes());
        for field in &self.fields {
            data.extend_from_slice(field.name.as_bytes());
            data.push(field.field_type.id());
            data.push(field.identity as u8);
        }
        rabin_fingerprint_64(&data)
    }

    /// Writes the definition as the payload of fixed ID 17.
    pub fn to_data(&self, output: &mut ObjectDataOutput) -> Result<()> {
        output.write_string(Some(&self.class_name))?;
        output.write_int(self.type_id)?;
        output.write_array_len(Some(self.fields.len()))?;
        for field in &self.fields {
            output.write_string(Some(&field.name))?;
            output.write_byte(field.field_type.id() as i8)?;
            output.write_bool(field.identity)?;
        }
        Ok(())
    }

    /// Reads a definition written by [`to_data`](Self::to_data).
    pub fn from_data(input: &mut ObjectDataInput<'_>) -> Result<Self> {
        let class_name = input.read_string()?.ok_or_else(|| {
            GeodeError::MalformedHeader("PDX type without a class name".to_string())
        })?;
        let type_id = input.read_int()?;
        let count = input.read_array_len()?.ok_or_else(|| {
            GeodeError::MalformedHeader("PDX type without a field count".to_string())
        })?;
        // Each field needs at least a string code, a type byte and a flag.
        input.ensure_elements(count, 3)?;
        let mut fields = Vec::with_capacity(count);
        for index in 0..count {
            let name = input.read_string()?.ok_or_else(|| {
                GeodeError::MalformedHeader("PDX field without a name".to_string())
            })?;
            let field_type = PdxFieldType::from_id(input.read_byte()? as u8)?;
            let mut field = PdxField::new(name, field_type, index);
            field.set_identity(input.read_bool()?);
            fields.push(field);
        }
        Ok(PdxType::new(class_name, fields).with_type_id(type_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PdxType {
        PdxType::new(
            "com.example.Order",
            vec![
                PdxField::new("id", PdxFieldType::Long, 0),
                PdxField::new("item", PdxFieldType::String, 1),
            ],
        )
    }

    #[test]
    fn test_field_type_ids() {
        for id in 0..=21u8 {
            assert_eq!(PdxFieldType::from_id(id).unwrap().id(), id);
        }
        assert!(PdxFieldType::from_id(22).is_err());
    }

    #[test]
    fn test_field_type_is_array() {
        assert!(!PdxFieldType::Object.is_array());
        assert!(!PdxFieldType::String.is_array());
        assert!(PdxFieldType::BooleanArray.is_array());
        assert!(PdxFieldType::ArrayOfByteArrays.is_array());
    }

    #[test]
    fn test_type_lookup() {
        let pdx_type = sample();
        assert_eq!(pdx_type.field_count(), 2);
        assert!(pdx_type.has_field("id"));
        assert!(!pdx_type.has_field("price"));
        assert_eq!(pdx_type.field("item").unwrap().index(), 1);
        assert_eq!(pdx_type.type_id(), 0);
    }

    #[test]
    fn test_fingerprint_depends_on_layout() {
        let a = sample();
        let mut fields = a.fields().to_vec();
        fields[0].set_identity(true);
        let b = PdxType::new("com.example.Order", fields);
        assert_eq!(a.fingerprint(), sample().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_type_wire_form() {
        let original = sample().with_type_id(77);
        let mut output = ObjectDataOutput::new();
        original.to_data(&mut output).unwrap();
        let mut input = ObjectDataInput::new(output.as_bytes());
        let decoded = PdxType::from_data(&mut input).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(input.bytes_remaining(), 0);
    }

    #[test]
    fn test_rabin_fingerprint_is_stable() {
        assert_eq!(rabin_fingerprint_64(b""), RABIN_FINGERPRINT_INIT as i64);
        assert_eq!(rabin_fingerprint_64(b"abc"), rabin_fingerprint_64(b"abc"));
        assert_ne!(rabin_fingerprint_64(b"abc"), rabin_fingerprint_64(b"abd"));
    }
}
