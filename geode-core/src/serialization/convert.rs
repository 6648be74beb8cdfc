//! Conversions between wire values and native Rust types.
//!
//! [`IntoCacheable`] picks the wire representation for a native value and
//! [`FromCacheable`] unwraps a decoded value into the type the caller asked
//! for. Vectors of wire primitives become the typed array codes; other
//! vectors become array lists.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};

use super::builtins::WirePrimitive;
use super::ds_code::{fixed_id, ClassId, DsCode};
use super::pdx::PdxInstance;
use super::value::{
    CacheableMap, CacheableSet, CacheableValue, Collection, EnumInfo, FixedIdValue, PdxValue, Primitive, Struct,
};
use crate::error::{GeodeError, Result};

fn mismatch<T: ?Sized>(value: &CacheableValue) -> GeodeError {
    GeodeError::mismatch(type_name::<T>(), value.kind())
}

/// Converts a native value into its wire representation.
pub trait IntoCacheable {
    /// Converts `self`; a value with no wire form is a type mismatch.
    fn into_cacheable(self) -> Result<CacheableValue>;

    #[doc(hidden)]
    fn into_element(self) -> Result<Option<CacheableValue>>
    where
        Self: Sized,
    {
        self.into_cacheable().map(Some)
    }

    #[doc(hidden)]
    fn vec_into_cacheable(items: Vec<Self>) -> Result<CacheableValue>
    where
        Self: Sized,
    {
        items
            .into_iter()
            .map(IntoCacheable::into_element)
            .collect::<Result<Vec<_>>>()
            .map(|items| Collection::ArrayList(items).into())
    }
}

/// Unwraps a decoded wire value into a native type.
pub trait FromCacheable: Sized {
    /// Converts `value`, failing with [`GeodeError::TypeMismatch`] when it
    /// holds something else.
    fn from_cacheable(value: CacheableValue) -> Result<Self>;

    #[doc(hidden)]
    fn from_element(value: Option<CacheableValue>) -> Result<Self> {
        match value {
            Some(value) => Self::from_cacheable(value),
            None => Err(GeodeError::mismatch(type_name::<Self>(), "null")),
        }
    }

    #[doc(hidden)]
    fn vec_from_cacheable(value: CacheableValue) -> Result<Vec<Self>> {
        list_from_cacheable(value)
    }
}

fn list_from_cacheable<T: FromCacheable>(value: CacheableValue) -> Result<Vec<T>> {
    let items = match value {
        CacheableValue::Collection(
            Collection::ArrayList(items)
            | Collection::LinkedList(items)
            | Collection::Vector(items)
            | Collection::Stack(items),
        ) => items,
        CacheableValue::Collection(Collection::ObjectArray(array)) => array.items,
        other => return Err(mismatch::<Vec<T>>(&other)),
    };
    items.into_iter().map(T::from_element).collect()
}

fn map_from_cacheable<T>(value: CacheableValue) -> Result<CacheableMap> {
    match value {
        CacheableValue::Collection(
            Collection::HashMap(map)
            | Collection::HashTable(map)
            | Collection::IdentityHashMap(map)
            | Collection::Properties(map),
        ) => Ok(map),
        other => Err(mismatch::<T>(&other)),
    }
}

fn set_from_cacheable<T>(value: CacheableValue) -> Result<CacheableSet> {
    match value {
        CacheableValue::Collection(Collection::HashSet(set) | Collection::LinkedHashSet(set)) => Ok(set),
        other => Err(mismatch::<T>(&other)),
    }
}

fn map_into_cacheable<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<CacheableValue>
where
    K: IntoCacheable,
    V: IntoCacheable,
{
    let map = entries
        .into_iter()
        .map(|(k, v)| Ok((k.into_cacheable()?, v.into_element()?)))
        .collect::<Result<CacheableMap>>()?;
    Ok(Collection::HashMap(map).into())
}

macro_rules! wire_primitive_conversions {
    ($($ty:ty),* $(,)?) => {$(
        impl IntoCacheable for $ty {
            fn into_cacheable(self) -> Result<CacheableValue> {
                Ok(self.boxed().into())
            }

            fn vec_into_cacheable(items: Vec<Self>) -> Result<CacheableValue> {
                Ok(<$ty as WirePrimitive>::array(items).into())
            }
        }

        impl FromCacheable for $ty {
            fn from_cacheable(value: CacheableValue) -> Result<Self> {
                let unboxed = match &value {
                    CacheableValue::Primitive(p) => <$ty as WirePrimitive>::unboxed(p),
                    _ => None,
                };
                unboxed.ok_or_else(|| mismatch::<Self>(&value))
            }

            fn vec_from_cacheable(value: CacheableValue) -> Result<Vec<Self>> {
                let items = match &value {
                    CacheableValue::Collection(c) => <$ty as WirePrimitive>::unarray(c),
                    _ => None,
                };
                match items {
                    Some(items) => Ok(items),
                    None => list_from_cacheable(value),
                }
            }
        }
    )*};
}

wire_primitive_conversions!(i8, bool, u16, i16, i32, i64, f32, f64);

impl IntoCacheable for u8 {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(Primitive::Byte(self as i8).into())
    }

    fn vec_into_cacheable(items: Vec<Self>) -> Result<CacheableValue> {
        Ok(Collection::Bytes(Bytes::from(items)).into())
    }
}

impl FromCacheable for u8 {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        match value {
            CacheableValue::Primitive(Primitive::Byte(v)) => Ok(v as u8),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn vec_from_cacheable(value: CacheableValue) -> Result<Vec<Self>> {
        match value {
            CacheableValue::Collection(Collection::Bytes(b)) => Ok(b.to_vec()),
            other => list_from_cacheable(other),
        }
    }
}

fn char_unit(c: char) -> Result<u16> {
    u16::try_from(u32::from(c))
        .map_err(|_| GeodeError::mismatch("char in the basic multilingual plane", format!("U+{:X}", u32::from(c))))
}

fn unit_char(unit: u16) -> Result<char> {
    char::from_u32(u32::from(unit)).ok_or_else(|| GeodeError::mismatch("char", format!("surrogate {unit:#06x}")))
}

/// Chars travel as one UTF-16 unit; characters outside the BMP are rejected.
impl IntoCacheable for char {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(Primitive::Char(char_unit(self)?).into())
    }

    fn vec_into_cacheable(items: Vec<Self>) -> Result<CacheableValue> {
        let units = items.into_iter().map(char_unit).collect::<Result<Vec<_>>>()?;
        Ok(Collection::CharArray(units).into())
    }
}

impl FromCacheable for char {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        match value {
            CacheableValue::Primitive(Primitive::Char(unit)) => unit_char(unit),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn vec_from_cacheable(value: CacheableValue) -> Result<Vec<Self>> {
        match value {
            CacheableValue::Collection(Collection::CharArray(units)) => units.into_iter().map(unit_char).collect(),
            other => list_from_cacheable(other),
        }
    }
}

impl IntoCacheable for String {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(Primitive::String(self).into())
    }

    fn vec_into_cacheable(items: Vec<Self>) -> Result<CacheableValue> {
        Ok(Collection::StringArray(items.into_iter().map(Some).collect()).into())
    }
}

impl IntoCacheable for &str {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(Primitive::String(self.to_string()).into())
    }
}

impl FromCacheable for String {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        match value {
            CacheableValue::Primitive(Primitive::String(s)) => Ok(s),
            CacheableValue::Collection(Collection::FileName(s)) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }

    fn vec_from_cacheable(value: CacheableValue) -> Result<Vec<Self>> {
        match value {
            CacheableValue::Collection(Collection::StringArray(items)) => items
                .into_iter()
                .map(|s| s.ok_or_else(|| GeodeError::mismatch("String", "null")))
                .collect(),
            other => list_from_cacheable(other),
        }
    }
}

impl IntoCacheable for DateTime<Utc> {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(Primitive::Date(self).into())
    }
}

impl FromCacheable for DateTime<Utc> {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        match value {
            CacheableValue::Primitive(Primitive::Date(d)) => Ok(d),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoCacheable for Bytes {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(Collection::Bytes(self).into())
    }
}

impl FromCacheable for Bytes {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        match value {
            CacheableValue::Collection(Collection::Bytes(b)) => Ok(b),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: IntoCacheable> IntoCacheable for Vec<T> {
    fn into_cacheable(self) -> Result<CacheableValue> {
        T::vec_into_cacheable(self)
    }
}

impl<T: FromCacheable> FromCacheable for Vec<T> {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        T::vec_from_cacheable(value)
    }
}

/// `None` is only representable as a collection element or map value.
impl<T: IntoCacheable> IntoCacheable for Option<T> {
    fn into_cacheable(self) -> Result<CacheableValue> {
        match self {
            Some(value) => value.into_cacheable(),
            None => Err(GeodeError::mismatch(type_name::<T>(), "null")),
        }
    }

    fn into_element(self) -> Result<Option<CacheableValue>> {
        self.map(IntoCacheable::into_cacheable).transpose()
    }
}

impl<T: FromCacheable> FromCacheable for Option<T> {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        T::from_cacheable(value).map(Some)
    }

    fn from_element(value: Option<CacheableValue>) -> Result<Self> {
        value.map(T::from_cacheable).transpose()
    }
}

impl<K: IntoCacheable, V: IntoCacheable> IntoCacheable for HashMap<K, V> {
    fn into_cacheable(self) -> Result<CacheableValue> {
        map_into_cacheable(self)
    }
}

impl<K, V> FromCacheable for HashMap<K, V>
where
    K: FromCacheable + Eq + Hash,
    V: FromCacheable,
{
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        map_from_cacheable::<Self>(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_cacheable(k)?, V::from_element(v)?)))
            .collect()
    }
}

impl<K: IntoCacheable, V: IntoCacheable> IntoCacheable for BTreeMap<K, V> {
    fn into_cacheable(self) -> Result<CacheableValue> {
        map_into_cacheable(self)
    }
}

impl<K: FromCacheable + Ord, V: FromCacheable> FromCacheable for BTreeMap<K, V> {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        map_from_cacheable::<Self>(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_cacheable(k)?, V::from_element(v)?)))
            .collect()
    }
}

impl<K: IntoCacheable, V: IntoCacheable> IntoCacheable for IndexMap<K, V> {
    fn into_cacheable(self) -> Result<CacheableValue> {
        map_into_cacheable(self)
    }
}

impl<K, V> FromCacheable for IndexMap<K, V>
where
    K: FromCacheable + Eq + Hash,
    V: FromCacheable,
{
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        map_from_cacheable::<Self>(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_cacheable(k)?, V::from_element(v)?)))
            .collect()
    }
}

impl<T: IntoCacheable> IntoCacheable for HashSet<T> {
    fn into_cacheable(self) -> Result<CacheableValue> {
        let set = self
            .into_iter()
            .map(IntoCacheable::into_cacheable)
            .collect::<Result<CacheableSet>>()?;
        Ok(Collection::HashSet(set).into())
    }
}

impl<T: FromCacheable + Eq + Hash> FromCacheable for HashSet<T> {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        set_from_cacheable::<Self>(value)?
            .into_iter()
            .map(T::from_cacheable)
            .collect()
    }
}

/// Insertion-ordered sets travel as `CacheableLinkedHashSet`.
impl<T: IntoCacheable> IntoCacheable for IndexSet<T> {
    fn into_cacheable(self) -> Result<CacheableValue> {
        let set = self
            .into_iter()
            .map(IntoCacheable::into_cacheable)
            .collect::<Result<CacheableSet>>()?;
        Ok(Collection::LinkedHashSet(set).into())
    }
}

impl<T: FromCacheable + Eq + Hash> FromCacheable for IndexSet<T> {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        set_from_cacheable::<Self>(value)?
            .into_iter()
            .map(T::from_cacheable)
            .collect()
    }
}

impl IntoCacheable for Struct {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(FixedIdValue::Struct(self).into())
    }
}

impl FromCacheable for Struct {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        match value {
            CacheableValue::FixedId(FixedIdValue::Struct(s)) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoCacheable for PdxInstance {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(PdxValue::Instance(self).into())
    }
}

impl FromCacheable for PdxInstance {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        match value {
            CacheableValue::Pdx(PdxValue::Instance(instance)) => Ok(instance),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// Accepts both the fixed-ID and the PDX enum encodings.
impl FromCacheable for EnumInfo {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        match value {
            CacheableValue::FixedId(FixedIdValue::EnumInfo(info)) | CacheableValue::Pdx(PdxValue::Enum(info)) => Ok(info),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl IntoCacheable for CacheableValue {
    fn into_cacheable(self) -> Result<CacheableValue> {
        Ok(self)
    }
}

impl FromCacheable for CacheableValue {
    fn from_cacheable(value: CacheableValue) -> Result<Self> {
        Ok(value)
    }
}

macro_rules! category_into_cacheable {
    ($($ty:ty),*) => {$(
        impl IntoCacheable for $ty {
            fn into_cacheable(self) -> Result<CacheableValue> {
                Ok(self.into())
            }
        }
    )*};
}

category_into_cacheable!(Primitive, Collection, FixedIdValue, PdxValue);

/// Wraps a type-erased native value; `None` when the box holds another type.
pub(crate) type WrapFn = fn(Box<dyn Any + Send + Sync>) -> Option<Result<CacheableValue>>;

pub(crate) fn wrap<T: IntoCacheable + Any>(value: Box<dyn Any + Send + Sync>) -> Option<Result<CacheableValue>> {
    value.downcast::<T>().ok().map(|v| (*v).into_cacheable())
}

/// A native type with a built-in wire representation.
pub(crate) struct NativeType {
    pub(crate) type_id: fn() -> TypeId,
    pub(crate) class_id: ClassId,
    pub(crate) wrap: WrapFn,
}

macro_rules! native {
    ($ty:ty, $code:ident) => {
        NativeType {
            type_id: TypeId::of::<$ty>,
            class_id: ClassId::built_in(DsCode::$code),
            wrap: wrap::<$ty>,
        }
    };
}

static BUILTIN_NATIVE_TYPES: [NativeType; 21] = [
    native!(i8, CacheableByte),
    native!(u8, CacheableByte),
    native!(bool, CacheableBoolean),
    native!(char, CacheableCharacter),
    native!(f64, CacheableDouble),
    native!(f32, CacheableFloat),
    native!(i16, CacheableInt16),
    native!(i32, CacheableInt32),
    native!(i64, CacheableInt64),
    native!(String, CacheableString),
    native!(DateTime<Utc>, CacheableDate),
    native!(Bytes, CacheableBytes),
    native!(Vec<u8>, CacheableBytes),
    native!(Vec<i16>, CacheableInt16Array),
    native!(Vec<i32>, CacheableInt32Array),
    native!(Vec<i64>, CacheableInt64Array),
    native!(Vec<f32>, CacheableFloatArray),
    native!(Vec<f64>, CacheableDoubleArray),
    native!(Vec<bool>, BooleanArray),
    native!(Vec<char>, CharArray),
    native!(Vec<String>, CacheableStringArray),
];

/// Native types the built-in registrations map to wire codes.
pub(crate) fn builtin_native_types() -> &'static [NativeType] {
    &BUILTIN_NATIVE_TYPES
}

/// `Struct` maps to its fixed ID rather than a DSCode.
pub(crate) fn struct_native_type() -> NativeType {
    NativeType {
        type_id: TypeId::of::<Struct>,
        class_id: ClassId::fixed_id(fixed_id::STRUCT),
        wrap: wrap::<Struct>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round<T: IntoCacheable + FromCacheable>(value: T) -> T {
        T::from_cacheable(value.into_cacheable().unwrap()).unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(42i32.into_cacheable().unwrap(), Primitive::Int32(42).into());
        assert_eq!(round(-7i64), -7);
        assert_eq!(round('é'), 'é');
        assert_eq!(round(200u8), 200);
        assert!(i64::from_cacheable(Primitive::Int32(1).into()).is_err());
    }

    #[test]
    fn test_typed_vectors_use_typed_arrays() {
        assert_eq!(
            vec![1i32, 2].into_cacheable().unwrap(),
            Collection::Int32Array(vec![1, 2]).into()
        );
        assert_eq!(
            vec![1u8, 2].into_cacheable().unwrap(),
            Collection::Bytes(Bytes::from_static(&[1, 2])).into()
        );
        assert_eq!(
            vec!["a".to_string()].into_cacheable().unwrap(),
            Collection::StringArray(vec![Some("a".to_string())]).into()
        );
        assert_eq!(round(vec![1.5f64]), vec![1.5]);
    }

    #[test]
    fn test_other_vectors_use_array_list() {
        let nested = vec![vec![1i32], vec![]];
        let value = nested.clone().into_cacheable().unwrap();
        assert!(matches!(value, CacheableValue::Collection(Collection::ArrayList(_))));
        assert_eq!(Vec::<Vec<i32>>::from_cacheable(value).unwrap(), nested);
    }

    #[test]
    fn test_typed_vectors_accept_lists() {
        let list: CacheableValue = Collection::Vector(vec![Some(Primitive::Int32(3).into())]).into();
        assert_eq!(Vec::<i32>::from_cacheable(list).unwrap(), vec![3]);
    }

    #[test]
    fn test_null_elements() {
        let items = vec![Some(1i32), None];
        let value = items.clone().into_cacheable().unwrap();
        assert_eq!(Vec::<Option<i32>>::from_cacheable(value.clone()).unwrap(), items);
        assert!(Vec::<i32>::from_cacheable(value).is_err());
        assert!(None::<i32>.into_cacheable().is_err());
    }

    #[test]
    fn test_maps_and_sets() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), 1i32);
        let value = map.clone().into_cacheable().unwrap();
        assert!(matches!(value, CacheableValue::Collection(Collection::HashMap(_))));
        assert_eq!(HashMap::<String, i32>::from_cacheable(value.clone()).unwrap(), map);
        assert_eq!(BTreeMap::<String, i32>::from_cacheable(value).unwrap().len(), 1);

        let set: IndexSet<i64> = [3, 1, 2].into_iter().collect();
        let value = set.clone().into_cacheable().unwrap();
        assert!(matches!(value, CacheableValue::Collection(Collection::LinkedHashSet(_))));
        assert_eq!(IndexSet::<i64>::from_cacheable(value).unwrap(), set);
    }

    #[test]
    fn test_astral_char_rejected() {
        assert!('😀'.into_cacheable().is_err());
        assert!(char::from_cacheable(Primitive::Char(0xD800).into()).is_err());
    }

    #[test]
    fn test_native_table_wraps_its_types() {
        for native in builtin_native_types() {
            assert!(native.class_id.origin().is_some());
        }
        let i32_entry = builtin_native_types()
            .iter()
            .find(|n| (n.type_id)() == TypeId::of::<i32>())
            .unwrap();
        let wrapped = (i32_entry.wrap)(Box::new(9i32)).unwrap().unwrap();
        assert_eq!(wrapped.as_i32(), Some(9));
        assert!((i32_entry.wrap)(Box::new(9i64)).is_none());
        assert_eq!(
            struct_native_type().class_id.origin(),
            Some(super::super::ds_code::ClassIdOrigin::FixedId(fixed_id::STRUCT))
        );
    }
}
