//! Field-by-field PDX record builder.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{PdxField, PdxFieldType};
use crate::error::{GeodeError, Result};
use crate::serialization::builtins::{self, WirePrimitive};
use crate::serialization::value::{CacheableValue, Collection, ObjectArray, Primitive};
use crate::serialization::{DataOutput, ObjectDataOutput};

/// PDX writes a null date as this millisecond value.
///
/// Java clients use the same sentinel, so a real date of
/// 1969-12-31T23:59:59.999Z is indistinguishable from null and reads back as
/// `None`.
pub(crate) const NULL_DATE_MILLIS: i64 = -1;

/// Collects the fields of one PDX record in the order they are written.
///
/// The order of the `write_*` calls defines the record layout, so a type must
/// write its fields in the same order every time.
#[derive(Debug)]
pub struct PdxWriter {
    class_name: String,
    fields: Vec<PdxField>,
    values: Vec<Option<CacheableValue>>,
}

impl PdxWriter {
    /// Creates a writer for a record of the given local class.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Returns the local class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns true if a field with this name has been written.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name() == name)
    }

    fn push(&mut self, name: &str, field_type: PdxFieldType, value: Option<CacheableValue>) -> Result<()> {
        if self.has_field(name) {
            return Err(GeodeError::Serialization(format!(
                "PDX field {name} written twice for {}",
                self.class_name
            )));
        }
        self.fields.push(PdxField::new(name, field_type, self.fields.len()));
        self.values.push(value);
        Ok(())
    }

    fn push_primitive<T: WirePrimitive>(&mut self, name: &str, field_type: PdxFieldType, value: T) -> Result<()> {
        self.push(name, field_type, Some(value.boxed().into()))
    }

    fn push_array<T: WirePrimitive>(
        &mut self,
        name: &str,
        field_type: PdxFieldType,
        value: Option<&[T]>,
    ) -> Result<()> {
        self.push(name, field_type, value.map(|v| T::array(v.to_vec()).into()))
    }

    /// Writes a boolean field.
    pub fn write_boolean(&mut self, name: &str, value: bool) -> Result<()> {
        self.push_primitive(name, PdxFieldType::Boolean, value)
    }

    /// Writes a byte field.
    pub fn write_byte(&mut self, name: &str, value: i8) -> Result<()> {
        self.push_primitive(name, PdxFieldType::Byte, value)
    }

    /// Writes one UTF-16 code unit.
    pub fn write_char(&mut self, name: &str, value: u16) -> Result<()> {
        self.push_primitive(name, PdxFieldType::Char, value)
    }

    /// Writes a short field.
    pub fn write_short(&mut self, name: &str, value: i16) -> Result<()> {
        self.push_primitive(name, PdxFieldType::Short, value)
    }

    /// Writes an int field.
    pub fn write_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.push_primitive(name, PdxFieldType::Int, value)
    }

    /// Writes a long field.
    pub fn write_long(&mut self, name: &str, value: i64) -> Result<()> {
        self.push_primitive(name, PdxFieldType::Long, value)
    }

    /// Writes a float field.
    pub fn write_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.push_primitive(name, PdxFieldType::Float, value)
    }

    /// Writes a double field.
    pub fn write_double(&mut self, name: &str, value: f64) -> Result<()> {
        self.push_primitive(name, PdxFieldType::Double, value)
    }

    /// Writes a date at millisecond precision.
    pub fn write_date(&mut self, name: &str, value: Option<DateTime<Utc>>) -> Result<()> {
        self.push(name, PdxFieldType::Date, value.map(|d| Primitive::Date(d).into()))
    }

    /// Writes a string field.
    pub fn write_string(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        self.push(
            name,
            PdxFieldType::String,
            value.map(|s| Primitive::String(s.to_string()).into()),
        )
    }

    /// Writes any value, including nested PDX objects.
    pub fn write_object(&mut self, name: &str, value: Option<CacheableValue>) -> Result<()> {
        self.push(name, PdxFieldType::Object, value)
    }

    /// Writes a boolean array field.
    pub fn write_boolean_array(&mut self, name: &str, value: Option<&[bool]>) -> Result<()> {
        self.push_array(name, PdxFieldType::BooleanArray, value)
    }

    /// Writes a char array field.
    pub fn write_char_array(&mut self, name: &str, value: Option<&[u16]>) -> Result<()> {
        self.push_array(name, PdxFieldType::CharArray, value)
    }

    /// Writes a byte array field.
    pub fn write_byte_array(&mut self, name: &str, value: Option<&[u8]>) -> Result<()> {
        self.push(
            name,
            PdxFieldType::ByteArray,
            value.map(|v| Collection::Bytes(Bytes::copy_from_slice(v)).into()),
        )
    }

    /// Writes a short array field.
    pub fn write_short_array(&mut self, name: &str, value: Option<&[i16]>) -> Result<()> {
        self.push_array(name, PdxFieldType::ShortArray, value)
    }

    /// Writes an int array field.
    pub fn write_int_array(&mut self, name: &str, value: Option<&[i32]>) -> Result<()> {
        self.push_array(name, PdxFieldType::IntArray, value)
    }

    /// Writes a long array field.
    pub fn write_long_array(&mut self, name: &str, value: Option<&[i64]>) -> Result<()> {
        self.push_array(name, PdxFieldType::LongArray, value)
    }

    /// Writes a float array field.
    pub fn write_float_array(&mut self, name: &str, value: Option<&[f32]>) -> Result<()> {
        self.push_array(name, PdxFieldType::FloatArray, value)
    }

    /// Writes a double array field.
    pub fn write_double_array(&mut self, name: &str, value: Option<&[f64]>) -> Result<()> {
        self.push_array(name, PdxFieldType::DoubleArray, value)
    }

    /// Writes a string array field.
    pub fn write_string_array(&mut self, name: &str, value: Option<&[Option<String>]>) -> Result<()> {
        self.push(
            name,
            PdxFieldType::StringArray,
            value.map(|v| Collection::StringArray(v.to_vec()).into()),
        )
    }

    /// Writes an object array field.
    pub fn write_object_array(&mut self, name: &str, value: Option<Vec<Option<CacheableValue>>>) -> Result<()> {
        self.push(
            name,
            PdxFieldType::ObjectArray,
            value.map(|v| Collection::ObjectArray(ObjectArray::new(v)).into()),
        )
    }

    /// Writes an array of byte arrays.
    pub fn write_array_of_byte_arrays(&mut self, name: &str, value: Option<&[Option<Vec<u8>>]>) -> Result<()> {
        let value = value.map(|arrays| {
            let items = arrays
                .iter()
                .map(|a| {
                    a.as_deref()
                        .map(|b| CacheableValue::from(Collection::Bytes(Bytes::copy_from_slice(b))))
                })
                .collect();
            CacheableValue::from(Collection::ArrayList(items))
        });
        self.push(name, PdxFieldType::ArrayOfByteArrays, value)
    }

    /// Makes an already written field part of the record's identity.
    pub fn mark_identity_field(&mut self, name: &str) -> Result<()> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name() == name)
            .ok_or_else(|| {
                GeodeError::Serialization(format!(
                    "cannot mark unwritten field {name} as identity"
                ))
            })?;
        field.set_identity(true);
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (String, Vec<PdxField>, Vec<Option<CacheableValue>>) {
        (self.class_name, self.fields, self.values)
    }
}

fn mismatch(field_type: PdxFieldType, value: Option<&CacheableValue>) -> GeodeError {
    GeodeError::mismatch(
        format!("PDX {field_type} field"),
        value.map_or("null", CacheableValue::kind),
    )
}

/// Encodes one field value in the representation its PDX type prescribes.
pub(crate) fn write_field_value(
    output: &mut ObjectDataOutput,
    field_type: PdxFieldType,
    value: Option<&CacheableValue>,
) -> Result<()> {
    use CacheableValue::{Collection as C, Primitive as P};
    use PdxFieldType as F;

    match (field_type, value) {
        (F::Object, v) => output.write_object(v),
        (F::Boolean, Some(P(Primitive::Boolean(v)))) => output.write_bool(*v),
        (F::Byte, Some(P(Primitive::Byte(v)))) => output.write_byte(*v),
        (F::Char, Some(P(Primitive::Char(v)))) => output.write_char(*v),
        (F::Short, Some(P(Primitive::Int16(v)))) => output.write_short(*v),
        (F::Int, Some(P(Primitive::Int32(v)))) => output.write_int(*v),
        (F::Long, Some(P(Primitive::Int64(v)))) => output.write_long(*v),
        (F::Float, Some(P(Primitive::Float(v)))) => output.write_float(*v),
        (F::Double, Some(P(Primitive::Double(v)))) => output.write_double(*v),
        (F::Date, None) => output.write_long(NULL_DATE_MILLIS),
        (F::Date, Some(P(Primitive::Date(d)))) => output.write_long(d.timestamp_millis()),
        (F::String, None) => output.write_string(None),
        (F::String, Some(P(Primitive::String(s)))) => output.write_string(Some(s)),
        (t, None) if t.is_array() => output.write_array_len(None),
        (F::BooleanArray, Some(C(Collection::BooleanArray(v)))) => {
            builtins::write_array(output, Some(v.as_slice()))
        }
        (F::CharArray, Some(C(Collection::CharArray(v)))) => builtins::write_array(output, Some(v.as_slice())),
        (F::ByteArray, Some(C(Collection::Bytes(b)))) => output.write_bytes(Some(&b[..])),
        (F::ShortArray, Some(C(Collection::Int16Array(v)))) => builtins::write_array(output, Some(v.as_slice())),
        (F::IntArray, Some(C(Collection::Int32Array(v)))) => builtins::write_array(output, Some(v.as_slice())),
        (F::LongArray, Some(C(Collection::Int64Array(v)))) => builtins::write_array(output, Some(v.as_slice())),
        (F::FloatArray, Some(C(Collection::FloatArray(v)))) => builtins::write_array(output, Some(v.as_slice())),
        (F::DoubleArray, Some(C(Collection::DoubleArray(v)))) => {
            builtins::write_array(output, Some(v.as_slice()))
        }
        (F::StringArray, Some(C(Collection::StringArray(v)))) => builtins::write_string_array(output, v),
        (F::ObjectArray, Some(C(Collection::ObjectArray(a)))) => builtins::write_list(output, Some(a.items.as_slice())),
        (F::ArrayOfByteArrays, Some(C(Collection::ArrayList(items)))) => {
            output.write_array_len(Some(items.len()))?;
            for item in items {
                match item {
                    None => output.write_bytes(None)?,
                    Some(C(Collection::Bytes(b))) => output.write_bytes(Some(&b[..]))?,
                    Some(other) => return Err(mismatch(field_type, Some(other))),
                }
            }
            Ok(())
        }
        (t, v) => Err(mismatch(t, v)),
    }
}
