//! Field access for decoded PDX records.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

use super::writer::NULL_DATE_MILLIS;
use super::{PdxFieldType, PdxType};
use crate::error::{GeodeError, Result};
use crate::serialization::builtins::{self, WirePrimitive};
use crate::serialization::value::{CacheableValue, Collection, ObjectArray, Primitive};
use crate::serialization::{DataInput, ObjectDataInput};

/// Reads named fields out of one PDX record.
///
/// A field the record does not carry reads as its type's default, so code
/// written against a newer layout can read older records. Reading a present
/// field under a different type is a [`GeodeError::TypeMismatch`].
#[derive(Debug)]
pub struct PdxReader {
    pdx_type: Arc<PdxType>,
    values: Arc<[Option<CacheableValue>]>,
    read: Vec<bool>,
}

impl PdxReader {
    pub(crate) fn new(pdx_type: Arc<PdxType>, values: Arc<[Option<CacheableValue>]>) -> Self {
        let read = vec![false; values.len()];
        Self {
            pdx_type,
            values,
            read,
        }
    }

    /// The distributed class name of the record.
    pub fn class_name(&self) -> &str {
        self.pdx_type.class_name()
    }

    /// The record's type definition.
    pub fn pdx_type(&self) -> &Arc<PdxType> {
        &self.pdx_type
    }

    /// Returns true if the record carries the named field.
    pub fn has_field(&self, name: &str) -> bool {
        self.pdx_type.has_field(name)
    }

    /// Returns true if the named field is part of the record's identity.
    pub fn is_identity_field(&self, name: &str) -> bool {
        self.pdx_type.field(name).map_or(false, |f| f.is_identity())
    }

    /// Names of fields no `read_*` call has touched yet.
    pub fn unread_fields(&self) -> Vec<&str> {
        self.pdx_type
            .fields()
            .iter()
            .filter(|f| !self.read[f.index()])
            .map(|f| f.name())
            .collect()
    }

    /// Index of the named field, marked as read; `None` when the record lacks it.
    fn locate(&mut self, name: &str, expected: PdxFieldType) -> Result<Option<usize>> {
        let Some(field) = self.pdx_type.field(name) else {
            return Ok(None);
        };
        if field.field_type() != expected {
            return Err(GeodeError::mismatch(
                format!("PDX {expected} field {name}"),
                field.field_type().to_string(),
            ));
        }
        let index = field.index();
        self.read[index] = true;
        Ok(Some(index))
    }

    fn take(&mut self, name: &str, expected: PdxFieldType) -> Result<Option<CacheableValue>> {
        Ok(self
            .locate(name, expected)?
            .and_then(|index| self.values[index].clone()))
    }

    fn unexpected(&self, name: &str, expected: PdxFieldType, value: &CacheableValue) -> GeodeError {
        GeodeError::mismatch(format!("PDX {expected} field {name}"), value.kind())
    }

    fn take_primitive<T: WirePrimitive + Default>(&mut self, name: &str, field_type: PdxFieldType) -> Result<T> {
        let Some(value) = self.take(name, field_type)? else {
            return Ok(T::default());
        };
        match &value {
            CacheableValue::Primitive(p) => T::unboxed(p),
            _ => None,
        }
        .ok_or_else(|| self.unexpected(name, field_type, &value))
    }

    fn take_array<T: WirePrimitive>(&mut self, name: &str, field_type: PdxFieldType) -> Result<Option<Vec<T>>> {
        let Some(value) = self.take(name, field_type)? else {
            return Ok(None);
        };
        match &value {
            CacheableValue::Collection(c) => T::unarray(c),
            _ => None,
        }
        .map(Some)
        .ok_or_else(|| self.unexpected(name, field_type, &value))
    }

    /// Reads a boolean field.
    pub fn read_boolean(&mut self, name: &str) -> Result<bool> {
        self.take_primitive(name, PdxFieldType::Boolean)
    }

    /// Reads a byte field.
    pub fn read_byte(&mut self, name: &str) -> Result<i8> {
        self.take_primitive(name, PdxFieldType::Byte)
    }

    /// Reads one UTF-16 code unit.
    pub fn read_char(&mut self, name: &str) -> Result<u16> {
        self.take_primitive(name, PdxFieldType::Char)
    }

    /// Reads a short field.
    pub fn read_short(&mut self, name: &str) -> Result<i16> {
        self.take_primitive(name, PdxFieldType::Short)
    }

    /// Reads an int field.
    pub fn read_int(&mut self, name: &str) -> Result<i32> {
        self.take_primitive(name, PdxFieldType::Int)
    }

    /// Reads a long field.
    pub fn read_long(&mut self, name: &str) -> Result<i64> {
        self.take_primitive(name, PdxFieldType::Long)
    }

    /// Reads a float field.
    pub fn read_float(&mut self, name: &str) -> Result<f32> {
        self.take_primitive(name, PdxFieldType::Float)
    }

    /// Reads a double field.
    pub fn read_double(&mut self, name: &str) -> Result<f64> {
        self.take_primitive(name, PdxFieldType::Double)
    }

    /// Reads a date field.
    pub fn read_date(&mut self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.take(name, PdxFieldType::Date)? {
            None => Ok(None),
            Some(CacheableValue::Primitive(Primitive::Date(d))) => Ok(Some(d)),
            Some(other) => Err(self.unexpected(name, PdxFieldType::Date, &other)),
        }
    }

    /// Reads a string field.
    pub fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        match self.take(name, PdxFieldType::String)? {
            None => Ok(None),
            Some(CacheableValue::Primitive(Primitive::String(s))) => Ok(Some(s)),
            Some(other) => Err(self.unexpected(name, PdxFieldType::String, &other)),
        }
    }

    /// Reads a nested object field.
    ///
    /// A reader that is the sole owner of a decoded record moves the value
    /// out, so nested user objects arrive unshared; reading the same field
    /// again then yields `None`.
    pub fn read_object(&mut self, name: &str) -> Result<Option<CacheableValue>> {
        let Some(index) = self.locate(name, PdxFieldType::Object)? else {
            return Ok(None);
        };
        Ok(match Arc::get_mut(&mut self.values) {
            Some(values) => values[index].take(),
            None => self.values[index].clone(),
        })
    }

    /// Reads a boolean array field.
    pub fn read_boolean_array(&mut self, name: &str) -> Result<Option<Vec<bool>>> {
        self.take_array(name, PdxFieldType::BooleanArray)
    }

    /// Reads a char array field.
    pub fn read_char_array(&mut self, name: &str) -> Result<Option<Vec<u16>>> {
        self.take_array(name, PdxFieldType::CharArray)
    }

    /// Reads a byte array field.
    pub fn read_byte_array(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.take(name, PdxFieldType::ByteArray)? {
            None => Ok(None),
            Some(CacheableValue::Collection(Collection::Bytes(b))) => Ok(Some(b.to_vec())),
            Some(other) => Err(self.unexpected(name, PdxFieldType::ByteArray, &other)),
        }
    }

    /// Reads a short array field.
    pub fn read_short_array(&mut self, name: &str) -> Result<Option<Vec<i16>>> {
        self.take_array(name, PdxFieldType::ShortArray)
    }

    /// Reads an int array field.
    pub fn read_int_array(&mut self, name: &str) -> Result<Option<Vec<i32>>> {
        self.take_array(name, PdxFieldType::IntArray)
    }

    /// Reads a long array field.
    pub fn read_long_array(&mut self, name: &str) -> Result<Option<Vec<i64>>> {
        self.take_array(name, PdxFieldType::LongArray)
    }

    /// Reads a float array field.
    pub fn read_float_array(&mut self, name: &str) -> Result<Option<Vec<f32>>> {
        self.take_array(name, PdxFieldType::FloatArray)
    }

    /// Reads a double array field.
    pub fn read_double_array(&mut self, name: &str) -> Result<Option<Vec<f64>>> {
        self.take_array(name, PdxFieldType::DoubleArray)
    }

    /// Reads a string array field.
    pub fn read_string_array(&mut self, name: &str) -> Result<Option<Vec<Option<String>>>> {
        match self.take(name, PdxFieldType::StringArray)? {
            None => Ok(None),
            Some(CacheableValue::Collection(Collection::StringArray(v))) => Ok(Some(v)),
            Some(other) => Err(self.unexpected(name, PdxFieldType::StringArray, &other)),
        }
    }

    /// Reads an object array field.
    pub fn read_object_array(&mut self, name: &str) -> Result<Option<Vec<Option<CacheableValue>>>> {
        match self.take(name, PdxFieldType::ObjectArray)? {
            None => Ok(None),
            Some(CacheableValue::Collection(Collection::ObjectArray(a))) => Ok(Some(a.items)),
            Some(other) => Err(self.unexpected(name, PdxFieldType::ObjectArray, &other)),
        }
    }

    /// Reads an array of byte arrays.
    pub fn read_array_of_byte_arrays(&mut self, name: &str) -> Result<Option<Vec<Option<Vec<u8>>>>> {
        let items = match self.take(name, PdxFieldType::ArrayOfByteArrays)? {
            None => return Ok(None),
            Some(CacheableValue::Collection(Collection::ArrayList(items))) => items,
            Some(other) => return Err(self.unexpected(name, PdxFieldType::ArrayOfByteArrays, &other)),
        };
        items
            .into_iter()
            .map(|item| match item {
                None => Ok(None),
                Some(CacheableValue::Collection(Collection::Bytes(b))) => Ok(Some(b.to_vec())),
                Some(other) => Err(self.unexpected(name, PdxFieldType::ArrayOfByteArrays, &other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

/// Decodes one field value written by `write_field_value`.
pub(crate) fn read_field_value(
    input: &mut ObjectDataInput<'_>,
    field_type: PdxFieldType,
) -> Result<Option<CacheableValue>> {
    fn boxed<T: WirePrimitive>(input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
        Ok(Some(T::read_from(input)?.boxed().into()))
    }

    fn array<T: WirePrimitive>(input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
        Ok(builtins::read_array::<T>(input)?.map(|v| T::array(v).into()))
    }

    match field_type {
        PdxFieldType::Boolean => boxed::<bool>(input),
        PdxFieldType::Byte => boxed::<i8>(input),
        PdxFieldType::Char => boxed::<u16>(input),
        PdxFieldType::Short => boxed::<i16>(input),
        PdxFieldType::Int => boxed::<i32>(input),
        PdxFieldType::Long => boxed::<i64>(input),
        PdxFieldType::Float => boxed::<f32>(input),
        PdxFieldType::Double => boxed::<f64>(input),
        PdxFieldType::Date => {
            let millis = input.read_long()?;
            if millis == NULL_DATE_MILLIS {
                return Ok(None);
            }
            let date = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                GeodeError::Protocol(format!("PDX date {millis} ms is out of range"))
            })?;
            Ok(Some(Primitive::Date(date).into()))
        }
        PdxFieldType::String => Ok(input.read_string()?.map(|s| Primitive::String(s).into())),
        PdxFieldType::Object => input.read_object(),
        PdxFieldType::BooleanArray => array::<bool>(input),
        PdxFieldType::CharArray => array::<u16>(input),
        PdxFieldType::ByteArray => Ok(input
            .read_bytes()?
            .map(|b| Collection::Bytes(Bytes::from(b)).into())),
        PdxFieldType::ShortArray => array::<i16>(input),
        PdxFieldType::IntArray => array::<i32>(input),
        PdxFieldType::LongArray => array::<i64>(input),
        PdxFieldType::FloatArray => array::<f32>(input),
        PdxFieldType::DoubleArray => array::<f64>(input),
        PdxFieldType::StringArray => Ok(builtins::read_string_array(input)?
            .map(|v| Collection::StringArray(v).into())),
        PdxFieldType::ObjectArray => Ok(builtins::read_list(input)?
            .map(|items| Collection::ObjectArray(ObjectArray::new(items)).into())),
        PdxFieldType::ArrayOfByteArrays => {
            let Some(len) = input.read_array_len()? else {
                return Ok(None);
            };
            input.ensure_elements(len, 1)?;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                let item = input.read_bytes()?;
                items.push(item.map(|b| CacheableValue::from(Collection::Bytes(Bytes::from(b)))));
            }
            Ok(Some(Collection::ArrayList(items).into()))
        }
    }
}
