//! Readers and writers for the built-in wire types.
//!
//! Boxed primitives and their typed arrays share one generic implementation
//! over [`WirePrimitive`]; containers encode an array length followed by
//! their elements as objects.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use indexmap::{IndexMap, IndexSet};

use super::data_input::{DataInput, ObjectDataInput};
use super::data_output::{DataOutput, ObjectDataOutput};
use super::ds_code::{fixed_id, fixed_id_escape, user_data_escape, DsCode};
use super::pdx::{self, PdxType};
use super::value::{
    CacheableMap, CacheableSet, CacheableValue, CacheableVec, Collection, EnumInfo, FixedIdValue,
    ObjectArray, PdxValue, Primitive, Struct, UserFunctionExecutionException,
};
use crate::error::{GeodeError, Result};

/// Decodes the payload that follows a built-in DSCode.
pub(crate) type BuiltinReader = fn(DsCode, &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>>;

/// Decodes the payload that follows a built-in fixed ID.
pub(crate) type BuiltinFixedIdReader =
    fn(i32, &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>>;

/// A scalar with a boxed wire form and a typed array form.
pub(crate) trait WirePrimitive: Copy + Sized + Send + Sync + 'static {
    /// Code of the boxed value.
    const DS_CODE: DsCode;
    /// Encoded width in bytes.
    const WIDTH: usize;

    fn write_to(self, output: &mut ObjectDataOutput) -> Result<()>;
    fn read_from(input: &mut ObjectDataInput<'_>) -> Result<Self>;
    fn boxed(self) -> Primitive;
    fn unboxed(value: &Primitive) -> Option<Self>;
    fn array(items: Vec<Self>) -> Collection;
    fn unarray(value: &Collection) -> Option<Vec<Self>>;
}

macro_rules! wire_primitive {
    ($ty:ty, $code:ident, $width:expr, $write:ident, $read:ident, $variant:ident, $array_variant:ident) => {
        impl WirePrimitive for $ty {
            const DS_CODE: DsCode = DsCode::$code;
            const WIDTH: usize = $width;

            fn write_to(self, output: &mut ObjectDataOutput) -> Result<()> {
                output.$write(self)
            }

            fn read_from(input: &mut ObjectDataInput<'_>) -> Result<Self> {
                input.$read()
            }

            fn boxed(self) -> Primitive {
                Primitive::$variant(self)
            }

            fn unboxed(value: &Primitive) -> Option<Self> {
                match value {
                    Primitive::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn array(items: Vec<Self>) -> Collection {
                Collection::$array_variant(items)
            }

            fn unarray(value: &Collection) -> Option<Vec<Self>> {
                match value {
                    Collection::$array_variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

wire_primitive!(bool, CacheableBoolean, 1, write_bool, read_bool, Boolean, BooleanArray);
wire_primitive!(u16, CacheableCharacter, 2, write_char, read_char, Char, CharArray);
wire_primitive!(i16, CacheableInt16, 2, write_short, read_short, Int16, Int16Array);
wire_primitive!(i32, CacheableInt32, 4, write_int, read_int, Int32, Int32Array);
wire_primitive!(i64, CacheableInt64, 8, write_long, read_long, Int64, Int64Array);
wire_primitive!(f32, CacheableFloat, 4, write_float, read_float, Float, FloatArray);
wire_primitive!(f64, CacheableDouble, 8, write_double, read_double, Double, DoubleArray);

// Byte arrays travel as `CacheableBytes` and are held as `Bytes`.
impl WirePrimitive for i8 {
    const DS_CODE: DsCode = DsCode::CacheableByte;
    const WIDTH: usize = 1;

    fn write_to(self, output: &mut ObjectDataOutput) -> Result<()> {
        output.write_byte(self)
    }

    fn read_from(input: &mut ObjectDataInput<'_>) -> Result<Self> {
        input.read_byte()
    }

    fn boxed(self) -> Primitive {
        Primitive::Byte(self)
    }

    fn unboxed(value: &Primitive) -> Option<Self> {
        match value {
            Primitive::Byte(v) => Some(*v),
            _ => None,
        }
    }

    fn array(items: Vec<Self>) -> Collection {
        Collection::Bytes(items.into_iter().map(|b| b as u8).collect::<Vec<u8>>().into())
    }

    fn unarray(value: &Collection) -> Option<Vec<Self>> {
        match value {
            Collection::Bytes(b) => Some(b.iter().map(|&v| v as i8).collect()),
            _ => None,
        }
    }
}

/// Writes a typed array body: length, then each element.
pub(crate) fn write_array<T: WirePrimitive>(
    output: &mut ObjectDataOutput,
    items: Option<&[T]>,
) -> Result<()> {
    let Some(items) = items else {
        return output.write_array_len(None);
    };
    output.write_array_len(Some(items.len()))?;
    output.ensure_capacity(items.len().saturating_mul(T::WIDTH))?;
    for &item in items {
        item.write_to(output)?;
    }
    Ok(())
}

/// Reads a typed array body written by [`write_array`].
pub(crate) fn read_array<T: WirePrimitive>(input: &mut ObjectDataInput<'_>) -> Result<Option<Vec<T>>> {
    let Some(len) = input.read_array_len()? else {
        return Ok(None);
    };
    input.ensure_elements(len, T::WIDTH)?;
    (0..len)
        .map(|_| T::read_from(input))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Writes a list body; `None` writes the null length.
pub fn write_list(output: &mut ObjectDataOutput, items: Option<&[Option<CacheableValue>]>) -> Result<()> {
    let Some(items) = items else {
        return output.write_array_len(None);
    };
    output.write_array_len(Some(items.len()))?;
    for item in items {
        output.write_object(item.as_ref())?;
    }
    Ok(())
}

/// Reads a list body; the null length yields `None`.
pub fn read_list(input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableVec>> {
    let Some(len) = input.read_array_len()? else {
        return Ok(None);
    };
    input.ensure_elements(len, 1)?;
    (0..len)
        .map(|_| input.read_object())
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Writes a map body: length, then alternating keys and values.
pub fn write_map(output: &mut ObjectDataOutput, map: Option<&CacheableMap>) -> Result<()> {
    let Some(map) = map else {
        return output.write_array_len(None);
    };
    output.write_array_len(Some(map.len()))?;
    for (key, value) in map {
        output.write_object(Some(key))?;
        output.write_object(value.as_ref())?;
    }
    Ok(())
}

/// Reads a map body; the null length yields `None`.
pub fn read_map(input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableMap>> {
    let Some(len) = input.read_array_len()? else {
        return Ok(None);
    };
    input.ensure_elements(len, 2)?;
    let mut map = IndexMap::with_capacity(len);
    for _ in 0..len {
        let key = input
            .read_object()?
            .ok_or_else(|| GeodeError::Protocol("null map key".to_string()))?;
        let value = input.read_object()?;
        map.insert(key, value);
    }
    Ok(Some(map))
}

/// Writes a set body: length, then each element.
pub fn write_set(output: &mut ObjectDataOutput, set: Option<&CacheableSet>) -> Result<()> {
    let Some(set) = set else {
        return output.write_array_len(None);
    };
    output.write_array_len(Some(set.len()))?;
    for item in set {
        output.write_object(Some(item))?;
    }
    Ok(())
}

/// Reads a set body; the null length yields `None`.
pub fn read_set(input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableSet>> {
    let Some(len) = input.read_array_len()? else {
        return Ok(None);
    };
    input.ensure_elements(len, 1)?;
    let mut set = IndexSet::with_capacity(len);
    for _ in 0..len {
        let item = input
            .read_object()?
            .ok_or_else(|| GeodeError::Protocol("null set element".to_string()))?;
        set.insert(item);
    }
    Ok(Some(set))
}

pub(crate) fn write_string_array(output: &mut ObjectDataOutput, items: &[Option<String>]) -> Result<()> {
    output.write_array_len(Some(items.len()))?;
    for item in items {
        output.write_string(item.as_deref())?;
    }
    Ok(())
}

pub(crate) fn read_string_array(input: &mut ObjectDataInput<'_>) -> Result<Option<Vec<Option<String>>>> {
    let Some(len) = input.read_array_len()? else {
        return Ok(None);
    };
    input.ensure_elements(len, 1)?;
    (0..len)
        .map(|_| input.read_string())
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// Writes the 1, 2 or 4 byte ID that follows an escape code.
pub(crate) fn write_escaped_id(output: &mut ObjectDataOutput, escape: DsCode, id: i32) -> Result<()> {
    match escape {
        DsCode::FixedIdByte | DsCode::CacheableUserData => output.write_byte(id as i8),
        DsCode::FixedIdShort | DsCode::CacheableUserData2 => output.write_short(id as i16),
        _ => output.write_int(id),
    }
}

/// Reads the ID that follows an escape code.
pub(crate) fn read_escaped_id(input: &mut ObjectDataInput<'_>, escape: DsCode) -> Result<i32> {
    match escape {
        DsCode::FixedIdByte | DsCode::CacheableUserData => input.read_byte().map(i32::from),
        DsCode::FixedIdShort | DsCode::CacheableUserData2 => input.read_short().map(i32::from),
        _ => input.read_int(),
    }
}

fn write_boxed<T: WirePrimitive>(output: &mut ObjectDataOutput, value: T) -> Result<()> {
    output.write_ds_code(T::DS_CODE)?;
    value.write_to(output)
}

fn write_primitive(output: &mut ObjectDataOutput, value: &Primitive) -> Result<()> {
    match value {
        Primitive::Byte(v) => write_boxed(output, *v),
        Primitive::Boolean(v) => write_boxed(output, *v),
        Primitive::Char(v) => write_boxed(output, *v),
        Primitive::Double(v) => write_boxed(output, *v),
        Primitive::Float(v) => write_boxed(output, *v),
        Primitive::Int16(v) => write_boxed(output, *v),
        Primitive::Int32(v) => write_boxed(output, *v),
        Primitive::Int64(v) => write_boxed(output, *v),
        Primitive::String(s) => output.write_string(Some(s)),
        Primitive::Date(d) => {
            output.write_ds_code(DsCode::CacheableDate)?;
            output.write_long(d.timestamp_millis())
        }
        Primitive::Custom(o) => {
            output.write_ds_code(o.ds_code())?;
            o.to_data(output)
        }
    }
}

fn write_collection(output: &mut ObjectDataOutput, value: &Collection) -> Result<()> {
    output.write_ds_code(value.ds_code())?;
    match value {
        Collection::Bytes(b) => output.write_bytes(Some(&b[..])),
        Collection::Int16Array(v) => write_array(output, Some(v.as_slice())),
        Collection::Int32Array(v) => write_array(output, Some(v.as_slice())),
        Collection::Int64Array(v) => write_array(output, Some(v.as_slice())),
        Collection::FloatArray(v) => write_array(output, Some(v.as_slice())),
        Collection::DoubleArray(v) => write_array(output, Some(v.as_slice())),
        Collection::BooleanArray(v) => write_array(output, Some(v.as_slice())),
        Collection::CharArray(v) => write_array(output, Some(v.as_slice())),
        Collection::StringArray(v) => write_string_array(output, v),
        Collection::ArrayList(v)
        | Collection::LinkedList(v)
        | Collection::Vector(v)
        | Collection::Stack(v) => write_list(output, Some(v.as_slice())),
        Collection::ObjectArray(a) => {
            output.write_array_len(Some(a.items.len()))?;
            output.write_ds_code(DsCode::Class)?;
            output.write_string(Some(&a.class_name))?;
            for item in &a.items {
                output.write_object(item.as_ref())?;
            }
            Ok(())
        }
        Collection::HashMap(m)
        | Collection::HashTable(m)
        | Collection::IdentityHashMap(m)
        | Collection::Properties(m) => write_map(output, Some(m)),
        Collection::HashSet(s) | Collection::LinkedHashSet(s) => write_set(output, Some(s)),
        Collection::FileName(path) => output.write_string(Some(path)),
    }
}

fn write_struct(output: &mut ObjectDataOutput, value: &Struct) -> Result<()> {
    output.write_array_len(Some(value.len()))?;
    for name in value.field_names() {
        output.write_string(Some(name))?;
    }
    for item in value.values() {
        output.write_object(item.as_ref())?;
    }
    Ok(())
}

fn write_fixed_id(output: &mut ObjectDataOutput, value: &FixedIdValue) -> Result<()> {
    let id = value.fixed_id();
    let escape = fixed_id_escape(id);
    output.write_ds_code(escape)?;
    write_escaped_id(output, escape, id)?;
    match value {
        FixedIdValue::Struct(s) => write_struct(output, s),
        FixedIdValue::Undefined => Ok(()),
        FixedIdValue::EnumInfo(info) => {
            output.write_string(Some(&info.class_name))?;
            output.write_string(Some(&info.name))?;
            output.write_int(info.ordinal)
        }
        FixedIdValue::PdxType(t) => t.to_data(output),
        FixedIdValue::Custom(o) => o.to_data(output),
    }
}

/// Writes any value with its leading type identifier.
pub(crate) fn write_value(output: &mut ObjectDataOutput, value: Option<&CacheableValue>) -> Result<()> {
    let Some(value) = value else {
        return output.write_ds_code(DsCode::NullObj);
    };
    match value {
        CacheableValue::Primitive(p) => write_primitive(output, p),
        CacheableValue::Collection(c) => write_collection(output, c),
        CacheableValue::FixedId(f) => write_fixed_id(output, f),
        CacheableValue::UserData(o) => {
            let class_id = o.class_id();
            if class_id < 0 {
                return Err(GeodeError::Configuration(format!(
                    "{} reports negative class ID {class_id}",
                    (**o).type_name()
                )));
            }
            let escape = user_data_escape(class_id);
            output.write_ds_code(escape)?;
            write_escaped_id(output, escape, class_id)?;
            o.to_data(output)
        }
        CacheableValue::Pdx(p) => {
            let registry = output.registry().cloned().ok_or_else(|| {
                GeodeError::Configuration("PDX values need an output bound to a registry".to_string())
            })?;
            match p {
                PdxValue::Enum(info) => pdx::write_pdx_enum(output, &registry, info),
                other => pdx::write_pdx(output, &registry, other),
            }
        }
        CacheableValue::Exception(e) => {
            output.write_ds_code(DsCode::FixedIdDefault)?;
            output.write_string(Some(e.message()))
        }
    }
}

fn read_boxed<T: WirePrimitive>(_: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    Ok(Some(T::read_from(input)?.boxed().into()))
}

fn read_typed_array<T: WirePrimitive>(
    _: DsCode,
    input: &mut ObjectDataInput<'_>,
) -> Result<Option<CacheableValue>> {
    Ok(read_array::<T>(input)?.map(|items| T::array(items).into()))
}

fn read_string_value(_: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    input.rewind_cursor(1)?;
    Ok(input.read_string()?.map(|s| Primitive::String(s).into()))
}

fn read_date(_: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let millis = input.read_long()?;
    let date = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| GeodeError::Protocol(format!("date {millis}ms is out of range")))?;
    Ok(Some(Primitive::Date(date).into()))
}

fn read_bytes_value(_: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let Some(len) = input.read_array_len()? else {
        return Ok(None);
    };
    let bytes = Bytes::copy_from_slice(input.read_slice(len)?);
    Ok(Some(Collection::Bytes(bytes).into()))
}

fn read_string_array_value(_: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    Ok(read_string_array(input)?.map(|v| Collection::StringArray(v).into()))
}

fn read_list_value(code: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let Some(items) = read_list(input)? else {
        return Ok(None);
    };
    let collection = match code {
        DsCode::CacheableLinkedList => Collection::LinkedList(items),
        DsCode::CacheableVector => Collection::Vector(items),
        DsCode::CacheableStack => Collection::Stack(items),
        _ => Collection::ArrayList(items),
    };
    Ok(Some(collection.into()))
}

fn read_object_array(_: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let Some(len) = input.read_array_len()? else {
        return Ok(None);
    };
    let marker = input.read_ds_code()?;
    if marker != DsCode::Class {
        return Err(GeodeError::MalformedHeader(format!(
            "object array expects a class marker, found {marker}"
        )));
    }
    let class_name = input
        .read_string()?
        .ok_or_else(|| GeodeError::MalformedHeader("object array without a class name".to_string()))?;
    input.ensure_elements(len, 1)?;
    let items = (0..len)
        .map(|_| input.read_object())
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(Collection::ObjectArray(ObjectArray { class_name, items }).into()))
}

fn read_map_value(code: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let Some(map) = read_map(input)? else {
        return Ok(None);
    };
    let collection = match code {
        DsCode::CacheableHashTable => Collection::HashTable(map),
        DsCode::CacheableIdentityHashMap => Collection::IdentityHashMap(map),
        DsCode::Properties => Collection::Properties(map),
        _ => Collection::HashMap(map),
    };
    Ok(Some(collection.into()))
}

fn read_set_value(code: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let Some(set) = read_set(input)? else {
        return Ok(None);
    };
    let collection = match code {
        DsCode::CacheableLinkedHashSet => Collection::LinkedHashSet(set),
        _ => Collection::HashSet(set),
    };
    Ok(Some(collection.into()))
}

fn read_file_name(_: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    Ok(input
        .read_string()?
        .map(|path| Collection::FileName(path).into()))
}

static BUILTIN_READERS: [(DsCode, BuiltinReader); 34] = [
    (DsCode::CacheableByte, read_boxed::<i8>),
    (DsCode::CacheableBoolean, read_boxed::<bool>),
    (DsCode::CacheableCharacter, read_boxed::<u16>),
    (DsCode::CacheableDouble, read_boxed::<f64>),
    (DsCode::CacheableFloat, read_boxed::<f32>),
    (DsCode::CacheableInt16, read_boxed::<i16>),
    (DsCode::CacheableInt32, read_boxed::<i32>),
    (DsCode::CacheableInt64, read_boxed::<i64>),
    (DsCode::CacheableString, read_string_value),
    (DsCode::CacheableAsciiString, read_string_value),
    (DsCode::CacheableAsciiStringHuge, read_string_value),
    (DsCode::CacheableStringHuge, read_string_value),
    (DsCode::CacheableDate, read_date),
    (DsCode::CacheableBytes, read_bytes_value),
    (DsCode::CacheableInt16Array, read_typed_array::<i16>),
    (DsCode::CacheableInt32Array, read_typed_array::<i32>),
    (DsCode::CacheableInt64Array, read_typed_array::<i64>),
    (DsCode::CacheableFloatArray, read_typed_array::<f32>),
    (DsCode::CacheableDoubleArray, read_typed_array::<f64>),
    (DsCode::BooleanArray, read_typed_array::<bool>),
    (DsCode::CharArray, read_typed_array::<u16>),
    (DsCode::CacheableStringArray, read_string_array_value),
    (DsCode::CacheableArrayList, read_list_value),
    (DsCode::CacheableLinkedList, read_list_value),
    (DsCode::CacheableVector, read_list_value),
    (DsCode::CacheableStack, read_list_value),
    (DsCode::CacheableObjectArray, read_object_array),
    (DsCode::CacheableHashMap, read_map_value),
    (DsCode::CacheableHashTable, read_map_value),
    (DsCode::CacheableIdentityHashMap, read_map_value),
    (DsCode::Properties, read_map_value),
    (DsCode::CacheableHashSet, read_set_value),
    (DsCode::CacheableLinkedHashSet, read_set_value),
    (DsCode::CacheableFileName, read_file_name),
];

/// Every built-in DSCode with its reader.
pub(crate) fn builtin_readers() -> &'static [(DsCode, BuiltinReader)] {
    &BUILTIN_READERS
}

fn read_undefined(_: i32, _: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    Ok(Some(FixedIdValue::Undefined.into()))
}

fn read_struct(_: i32, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let names = read_string_array(input)?
        .ok_or_else(|| GeodeError::MalformedHeader("struct without field names".to_string()))?;
    let names = names
        .into_iter()
        .map(|n| n.ok_or_else(|| GeodeError::MalformedHeader("null struct field name".to_string())))
        .collect::<Result<Vec<_>>>()?;
    input.ensure_elements(names.len(), 1)?;
    let values = (0..names.len())
        .map(|_| input.read_object())
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(FixedIdValue::Struct(Struct::new(names, values)?).into()))
}

fn read_enum_info(_: i32, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let class_name = input
        .read_string()?
        .ok_or_else(|| GeodeError::MalformedHeader("enum info without a class name".to_string()))?;
    let name = input
        .read_string()?
        .ok_or_else(|| GeodeError::MalformedHeader("enum info without a constant name".to_string()))?;
    let ordinal = input.read_int()?;
    Ok(Some(FixedIdValue::EnumInfo(EnumInfo::new(class_name, name, ordinal)).into()))
}

fn read_pdx_type(_: i32, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
    let pdx_type = PdxType::from_data(input)?;
    let pdx_type = match input.registry() {
        Some(registry) => registry.pdx_types().add_type(pdx_type)?,
        None => std::sync::Arc::new(pdx_type),
    };
    Ok(Some(FixedIdValue::PdxType(pdx_type).into()))
}

static BUILTIN_FIXED_ID_READERS: [(i32, BuiltinFixedIdReader); 4] = [
    (fixed_id::CACHEABLE_UNDEFINED, read_undefined),
    (fixed_id::STRUCT, read_struct),
    (fixed_id::ENUM_INFO, read_enum_info),
    (fixed_id::PDX_TYPE, read_pdx_type),
];

/// Every built-in fixed ID with its reader.
pub(crate) fn builtin_fixed_id_readers() -> &'static [(i32, BuiltinFixedIdReader)] {
    &BUILTIN_FIXED_ID_READERS
}

/// Reads the message that follows the exception marker.
pub(crate) fn read_exception(input: &mut ObjectDataInput<'_>) -> Result<CacheableValue> {
    let message = input
        .read_string()?
        .ok_or_else(|| GeodeError::MalformedHeader("exception without a message".to_string()))?;
    Ok(CacheableValue::Exception(UserFunctionExecutionException::new(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(value: &CacheableValue) -> Vec<u8> {
        let mut output = ObjectDataOutput::new();
        write_value(&mut output, Some(value)).unwrap();
        output.as_bytes().to_vec()
    }

    #[test]
    fn test_int32_42_wire_form() {
        let bytes = written(&Primitive::Int32(42).into());
        assert_eq!(bytes, vec![57, 0, 0, 0, 42]);
    }

    #[test]
    fn test_null_writes_null_obj() {
        let mut output = ObjectDataOutput::new();
        write_value(&mut output, None).unwrap();
        assert_eq!(output.as_bytes(), &[41]);
    }

    #[test]
    fn test_nul_string_uses_two_byte_escape() {
        let bytes = written(&Primitive::String("\0".to_string()).into());
        assert_eq!(bytes, vec![DsCode::CacheableString.id(), 0, 2, 0xC0, 0x80]);
    }

    #[test]
    fn test_ascii_string_code() {
        let bytes = written(&Primitive::String("hi".to_string()).into());
        assert_eq!(bytes, vec![87, 0, 2, b'h', b'i']);
    }

    #[test]
    fn test_null_and_empty_map_bodies_differ() {
        let mut null_out = ObjectDataOutput::new();
        write_map(&mut null_out, None).unwrap();
        let mut empty_out = ObjectDataOutput::new();
        write_map(&mut empty_out, Some(&CacheableMap::new())).unwrap();
        assert_eq!(null_out.as_bytes(), &[0xFF]);
        assert_eq!(empty_out.as_bytes(), &[0x00]);

        let mut input = ObjectDataInput::new(null_out.as_bytes());
        assert!(read_map(&mut input).unwrap().is_none());
        let mut input = ObjectDataInput::new(empty_out.as_bytes());
        assert_eq!(read_map(&mut input).unwrap(), Some(CacheableMap::new()));
    }

    #[test]
    fn test_typed_array_body() {
        let mut output = ObjectDataOutput::new();
        write_array(&mut output, Some(&[1i32, -1][..])).unwrap();
        assert_eq!(output.as_bytes(), &[2, 0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF]);
        let mut input = ObjectDataInput::new(output.as_bytes());
        assert_eq!(read_array::<i32>(&mut input).unwrap(), Some(vec![1, -1]));
    }

    #[test]
    fn test_typed_array_length_guard() {
        // Claims 200 ints but carries none.
        let data = [200u8];
        let mut input = ObjectDataInput::new(&data);
        let err = read_array::<i32>(&mut input).unwrap_err();
        assert!(matches!(err, GeodeError::BufferUnderflow { .. }));
    }

    #[test]
    fn test_nan_written_canonically() {
        let odd_nan = f64::from_bits(0x7ff8_0000_0000_0001);
        let bytes = written(&Primitive::Double(odd_nan).into());
        assert_eq!(&bytes[1..], &0x7ff8_0000_0000_0000u64.to_be_bytes());
    }

    #[test]
    fn test_fixed_id_escapes() {
        let bytes = written(&FixedIdValue::Undefined.into());
        assert_eq!(bytes, vec![DsCode::FixedIdByte.id(), 31]);

        let mut output = ObjectDataOutput::new();
        write_escaped_id(&mut output, fixed_id_escape(300), 300).unwrap();
        assert_eq!(output.as_bytes(), &[1, 44]);
        let mut input = ObjectDataInput::new(output.as_bytes());
        assert_eq!(read_escaped_id(&mut input, DsCode::FixedIdShort).unwrap(), 300);
    }

    #[test]
    fn test_exception_marker() {
        let bytes = written(&CacheableValue::Exception(UserFunctionExecutionException::new("boom")));
        assert_eq!(bytes[0], 0);
        let mut input = ObjectDataInput::new(&bytes[1..]);
        match read_exception(&mut input).unwrap() {
            CacheableValue::Exception(e) => assert_eq!(e.message(), "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_null_struct_names_are_malformed() {
        let mut input = ObjectDataInput::new(&[0xFF]);
        let err = read_struct(fixed_id::STRUCT, &mut input).unwrap_err();
        assert!(matches!(err, GeodeError::MalformedHeader(_)));
    }

    #[test]
    fn test_null_enum_info_names_are_malformed() {
        let null = DsCode::CacheableNullString.id();
        let data = [null, null, 0, 0, 0, 7];
        let mut input = ObjectDataInput::new(&data);
        let err = read_enum_info(fixed_id::ENUM_INFO, &mut input).unwrap_err();
        assert!(matches!(err, GeodeError::MalformedHeader(_)));

        let data = [87, 0, 1, b'E', null, 0, 0, 0, 7];
        let mut input = ObjectDataInput::new(&data);
        let err = read_enum_info(fixed_id::ENUM_INFO, &mut input).unwrap_err();
        assert!(matches!(err, GeodeError::MalformedHeader(_)));
    }

    #[test]
    fn test_null_exception_message_is_malformed() {
        let data = [DsCode::CacheableNullString.id()];
        let mut input = ObjectDataInput::new(&data);
        let err = read_exception(&mut input).unwrap_err();
        assert!(matches!(err, GeodeError::MalformedHeader(_)));
    }

    #[test]
    fn test_date_wire_form() {
        let date = Utc.timestamp_millis_opt(1_000).unwrap();
        let bytes = written(&Primitive::Date(date).into());
        assert_eq!(bytes, vec![61, 0, 0, 0, 0, 0, 0, 0x03, 0xE8]);
    }

    #[test]
    fn test_pdx_needs_registry() {
        let value = CacheableValue::Pdx(PdxValue::Enum(EnumInfo::new("Color", "RED", 0)));
        let mut output = ObjectDataOutput::new();
        let err = write_value(&mut output, Some(&value)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_every_builtin_reader_is_a_data_code() {
        for (code, _) in builtin_readers() {
            assert!(!code.is_framing(), "{code} is a framing code");
        }
    }
}
