//! The wire value model.
//!
//! Every decoded object is one [`CacheableValue`]. The enum is closed over
//! six categories, each with its own dispatch table in the registry:
//! primitives, collections, fixed-ID framework types, user data, PDX and
//! the function-execution exception marker. Null is `Option::None`.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};

use super::data_output::{canonical_f32_bits, canonical_f64_bits};
use super::data_serializable::{DataSerializable, DataSerializableFixedId, DataSerializablePrimitive};
use super::ds_code::{fixed_id, DsCode};
use super::hashing::{hash_bytes, hash_map_entries, hash_ordered, hash_unordered, JavaHash};
use super::pdx::{PdxInstance, PdxSerializable, PdxType, PdxWrapper};
use crate::error::{GeodeError, Result};

/// Elements of list-like collections.
pub type CacheableVec = Vec<Option<CacheableValue>>;

/// Insertion-ordered map with nullable values.
pub type CacheableMap = IndexMap<CacheableValue, Option<CacheableValue>>;

/// Insertion-ordered set.
pub type CacheableSet = IndexSet<CacheableValue>;

/// Java `File.hashCode` mixes the path hash with this constant.
const FILE_NAME_HASH_MIX: i32 = 1234321;

/// A decoded wire value.
#[derive(Debug, Clone)]
pub enum CacheableValue {
    /// Boxed scalars, strings and dates.
    Primitive(Primitive),
    /// Arrays, lists, maps and sets.
    Collection(Collection),
    /// Internal framework types addressed by fixed ID.
    FixedId(FixedIdValue),
    /// A registered user type.
    UserData(Arc<dyn DataSerializable>),
    /// A PDX-encoded object.
    Pdx(PdxValue),
    /// An exception raised by a server-side function.
    Exception(UserFunctionExecutionException),
}

/// Boxed scalar wire values.
#[derive(Debug, Clone)]
pub enum Primitive {
    /// `CacheableByte`.
    Byte(i8),
    /// `CacheableBoolean`.
    Boolean(bool),
    /// `CacheableCharacter`: one UTF-16 code unit.
    Char(u16),
    /// `CacheableDouble`.
    Double(f64),
    /// `CacheableFloat`.
    Float(f32),
    /// `CacheableInt16`.
    Int16(i16),
    /// `CacheableInt32`.
    Int32(i32),
    /// `CacheableInt64`.
    Int64(i64),
    /// Any of the string codes; the code is chosen on every write.
    String(String),
    /// `CacheableDate`, at millisecond precision.
    Date(DateTime<Utc>),
    /// An application type overriding a built-in code.
    Custom(Arc<dyn DataSerializablePrimitive>),
}

/// Built-in container wire values.
#[derive(Debug, Clone)]
pub enum Collection {
    /// `CacheableBytes`.
    Bytes(Bytes),
    /// `CacheableInt16Array`.
    Int16Array(Vec<i16>),
    /// `CacheableInt32Array`.
    Int32Array(Vec<i32>),
    /// `CacheableInt64Array`.
    Int64Array(Vec<i64>),
    /// `CacheableFloatArray`.
    FloatArray(Vec<f32>),
    /// `CacheableDoubleArray`.
    DoubleArray(Vec<f64>),
    /// `BooleanArray`.
    BooleanArray(Vec<bool>),
    /// `CharArray`: UTF-16 code units.
    CharArray(Vec<u16>),
    /// `CacheableStringArray`.
    StringArray(Vec<Option<String>>),
    /// `CacheableArrayList`.
    ArrayList(CacheableVec),
    /// `CacheableLinkedList`.
    LinkedList(CacheableVec),
    /// `CacheableVector`.
    Vector(CacheableVec),
    /// `CacheableStack`; the last element is the top.
    Stack(CacheableVec),
    /// `CacheableObjectArray`.
    ObjectArray(ObjectArray),
    /// `CacheableHashMap`.
    HashMap(CacheableMap),
    /// `CacheableHashTable`.
    HashTable(CacheableMap),
    /// `CacheableIdentityHashMap`.
    IdentityHashMap(CacheableMap),
    /// `Properties`.
    Properties(CacheableMap),
    /// `CacheableHashSet`.
    HashSet(CacheableSet),
    /// `CacheableLinkedHashSet`.
    LinkedHashSet(CacheableSet),
    /// `CacheableFileName`.
    FileName(String),
}

/// An object array tagged with its element class name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectArray {
    /// Fully-qualified element class name.
    pub class_name: String,
    /// The elements.
    pub items: CacheableVec,
}

impl ObjectArray {
    /// Default element class for arrays without a more specific type.
    pub const OBJECT_CLASS: &'static str = "java.lang.Object";

    /// Creates an array of `java.lang.Object`.
    pub fn new(items: CacheableVec) -> Self {
        Self {
            class_name: Self::OBJECT_CLASS.to_string(),
            items,
        }
    }
}

/// Framework types addressed by fixed ID.
#[derive(Debug, Clone)]
pub enum FixedIdValue {
    /// A query result row.
    Struct(Struct),
    /// The query `UNDEFINED` token.
    Undefined,
    /// An enum constant descriptor.
    EnumInfo(EnumInfo),
    /// A PDX type definition.
    PdxType(Arc<PdxType>),
    /// An application type overriding a fixed ID.
    Custom(Arc<dyn DataSerializableFixedId>),
}

/// Named fields of a query result row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Struct {
    field_names: Vec<String>,
    values: CacheableVec,
}

impl Struct {
    /// Builds a struct; names and values pair up positionally.
    pub fn new(field_names: Vec<String>, values: CacheableVec) -> Result<Self> {
        if field_names.len() != values.len() {
            return Err(GeodeError::Serialization(format!(
                "struct has {} field names but {} values",
                field_names.len(),
                values.len()
            )));
        }
        Ok(Self {
            field_names,
            values,
        })
    }

    /// Field names in order.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Field values in order.
    pub fn values(&self) -> &[Option<CacheableValue>] {
        &self.values
    }

    /// Looks up a field by name; `None` for absent fields.
    pub fn get(&self, name: &str) -> Option<&Option<CacheableValue>> {
        self.field_names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.values[i])
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.field_names.len()
    }

    /// True for a struct without fields.
    pub fn is_empty(&self) -> bool {
        self.field_names.is_empty()
    }
}

/// Identifies one constant of an enum type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumInfo {
    /// Fully-qualified enum class name.
    pub class_name: String,
    /// Constant name.
    pub name: String,
    /// Declaration ordinal.
    pub ordinal: i32,
}

impl EnumInfo {
    /// Creates a descriptor.
    pub fn new(class_name: impl Into<String>, name: impl Into<String>, ordinal: i32) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            ordinal,
        }
    }

    fn hash_code(&self) -> i32 {
        self.class_name
            .java_hash()
            .wrapping_mul(31)
            .wrapping_add(self.name.java_hash())
    }
}

/// PDX-encoded values.
#[derive(Debug, Clone)]
pub enum PdxValue {
    /// An application object implementing [`PdxSerializable`].
    Object(Arc<dyn PdxSerializable>),
    /// An application object handled by a registered PDX serializer.
    Wrapper(PdxWrapper),
    /// A field view of a record whose class is not materialized.
    Instance(PdxInstance),
    /// A PDX enum constant.
    Enum(EnumInfo),
}

/// The exception a server-side function raised, carried as its message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserFunctionExecutionException {
    message: String,
}

impl UserFunctionExecutionException {
    /// Creates the exception.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for UserFunctionExecutionException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user function execution failed: {}", self.message)
    }
}

impl std::error::Error for UserFunctionExecutionException {}

impl CacheableValue {
    /// A short name for the held variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheableValue::Primitive(p) => p.kind(),
            CacheableValue::Collection(c) => c.kind(),
            CacheableValue::FixedId(f) => match f {
                FixedIdValue::Struct(_) => "Struct",
                FixedIdValue::Undefined => "Undefined",
                FixedIdValue::EnumInfo(_) => "EnumInfo",
                FixedIdValue::PdxType(_) => "PdxType",
                FixedIdValue::Custom(o) => (**o).type_name(),
            },
            CacheableValue::UserData(o) => (**o).type_name(),
            CacheableValue::Pdx(p) => match p {
                PdxValue::Object(o) => (**o).type_name(),
                PdxValue::Wrapper(_) => "PdxWrapper",
                PdxValue::Instance(_) => "PdxInstance",
                PdxValue::Enum(_) => "PdxEnum",
            },
            CacheableValue::Exception(_) => "UserFunctionExecutionException",
        }
    }

    /// Java-compatible hash code.
    pub fn hash_code(&self) -> i32 {
        match self {
            CacheableValue::Primitive(p) => p.hash_code(),
            CacheableValue::Collection(c) => c.hash_code(),
            CacheableValue::FixedId(f) => match f {
                FixedIdValue::Struct(s) => hash_nullable(&s.values),
                FixedIdValue::Undefined => 0,
                FixedIdValue::EnumInfo(e) => e.hash_code(),
                FixedIdValue::PdxType(t) => t.class_name().java_hash(),
                FixedIdValue::Custom(o) => o.hash_code(),
            },
            CacheableValue::UserData(o) => o.hash_code(),
            CacheableValue::Pdx(p) => match p {
                PdxValue::Object(o) => o.hash_code(),
                PdxValue::Wrapper(w) => w.class_name().java_hash(),
                PdxValue::Instance(i) => i.hash_code(),
                PdxValue::Enum(e) => e.hash_code(),
            },
            CacheableValue::Exception(e) => e.message.java_hash(),
        }
    }

    /// Extracts a shared user object of type `T`.
    ///
    /// Works for registered data-serializable objects, PDX objects and
    /// objects behind a PDX serializer wrapper.
    pub fn downcast_user<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let any: Arc<dyn Any + Send + Sync> = match self {
            CacheableValue::UserData(o) => Arc::clone(o).into_any_arc(),
            CacheableValue::Pdx(PdxValue::Object(o)) => Arc::clone(o).into_any_arc(),
            CacheableValue::Pdx(PdxValue::Wrapper(w)) => w.object(),
            CacheableValue::Primitive(Primitive::Custom(o)) => Arc::clone(o).into_any_arc(),
            CacheableValue::FixedId(FixedIdValue::Custom(o)) => Arc::clone(o).into_any_arc(),
            other => {
                return Err(GeodeError::mismatch(
                    std::any::type_name::<T>(),
                    other.kind(),
                ))
            }
        };
        any.downcast::<T>()
            .map_err(|_| GeodeError::mismatch(std::any::type_name::<T>(), self.kind()))
    }

    /// Returns the held `i32` for `CacheableInt32` values.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            CacheableValue::Primitive(Primitive::Int32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns the held text for string values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheableValue::Primitive(Primitive::String(s)) => Some(s),
            _ => None,
        }
    }
}

fn hash_nullable(items: &[Option<CacheableValue>]) -> i32 {
    hash_ordered(items.iter().map(|i| i.as_ref().map_or(0, CacheableValue::hash_code)))
}

fn hash_map(map: &CacheableMap) -> i32 {
    hash_map_entries(
        map.iter()
            .map(|(k, v)| (k.hash_code(), v.as_ref().map_or(0, CacheableValue::hash_code))),
    )
}

fn hash_set(set: &CacheableSet) -> i32 {
    hash_unordered(set.iter().map(CacheableValue::hash_code))
}

impl Primitive {
    /// A short name for the held variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Byte(_) => "Byte",
            Primitive::Boolean(_) => "Boolean",
            Primitive::Char(_) => "Char",
            Primitive::Double(_) => "Double",
            Primitive::Float(_) => "Float",
            Primitive::Int16(_) => "Int16",
            Primitive::Int32(_) => "Int32",
            Primitive::Int64(_) => "Int64",
            Primitive::String(_) => "String",
            Primitive::Date(_) => "Date",
            Primitive::Custom(o) => (**o).type_name(),
        }
    }

    /// Java-compatible hash code.
    pub fn hash_code(&self) -> i32 {
        match self {
            Primitive::Byte(v) => v.java_hash(),
            Primitive::Boolean(v) => v.java_hash(),
            Primitive::Char(v) => v.java_hash(),
            Primitive::Double(v) => v.java_hash(),
            Primitive::Float(v) => v.java_hash(),
            Primitive::Int16(v) => v.java_hash(),
            Primitive::Int32(v) => v.java_hash(),
            Primitive::Int64(v) => v.java_hash(),
            Primitive::String(v) => v.java_hash(),
            Primitive::Date(v) => v.java_hash(),
            Primitive::Custom(o) => o.hash_code(),
        }
    }
}

impl Collection {
    /// A short name for the held variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Collection::Bytes(_) => "Bytes",
            Collection::Int16Array(_) => "Int16Array",
            Collection::Int32Array(_) => "Int32Array",
            Collection::Int64Array(_) => "Int64Array",
            Collection::FloatArray(_) => "FloatArray",
            Collection::DoubleArray(_) => "DoubleArray",
            Collection::BooleanArray(_) => "BooleanArray",
            Collection::CharArray(_) => "CharArray",
            Collection::StringArray(_) => "StringArray",
            Collection::ArrayList(_) => "ArrayList",
            Collection::LinkedList(_) => "LinkedList",
            Collection::Vector(_) => "Vector",
            Collection::Stack(_) => "Stack",
            Collection::ObjectArray(_) => "ObjectArray",
            Collection::HashMap(_) => "HashMap",
            Collection::HashTable(_) => "HashTable",
            Collection::IdentityHashMap(_) => "IdentityHashMap",
            Collection::Properties(_) => "Properties",
            Collection::HashSet(_) => "HashSet",
            Collection::LinkedHashSet(_) => "LinkedHashSet",
            Collection::FileName(_) => "FileName",
        }
    }

    /// Java-compatible hash code.
    pub fn hash_code(&self) -> i32 {
        match self {
            Collection::Bytes(b) => hash_bytes(b),
            Collection::Int16Array(v) => v.java_hash(),
            Collection::Int32Array(v) => v.java_hash(),
            Collection::Int64Array(v) => v.java_hash(),
            Collection::FloatArray(v) => v.java_hash(),
            Collection::DoubleArray(v) => v.java_hash(),
            Collection::BooleanArray(v) => v.java_hash(),
            Collection::CharArray(v) => v.java_hash(),
            Collection::StringArray(v) => v.java_hash(),
            Collection::ArrayList(v)
            | Collection::LinkedList(v)
            | Collection::Vector(v)
            | Collection::Stack(v) => hash_nullable(v),
            Collection::ObjectArray(a) => hash_nullable(&a.items),
            Collection::HashMap(m)
            | Collection::HashTable(m)
            | Collection::IdentityHashMap(m)
            | Collection::Properties(m) => hash_map(m),
            Collection::HashSet(s) | Collection::LinkedHashSet(s) => hash_set(s),
            Collection::FileName(path) => path.java_hash() ^ FILE_NAME_HASH_MIX,
        }
    }

    /// The DSCode this collection is written under.
    pub fn ds_code(&self) -> DsCode {
        match self {
            Collection::Bytes(_) => DsCode::CacheableBytes,
            Collection::Int16Array(_) => DsCode::CacheableInt16Array,
            Collection::Int32Array(_) => DsCode::CacheableInt32Array,
            Collection::Int64Array(_) => DsCode::CacheableInt64Array,
            Collection::FloatArray(_) => DsCode::CacheableFloatArray,
            Collection::DoubleArray(_) => DsCode::CacheableDoubleArray,
            Collection::BooleanArray(_) => DsCode::BooleanArray,
            Collection::CharArray(_) => DsCode::CharArray,
            Collection::StringArray(_) => DsCode::CacheableStringArray,
            Collection::ArrayList(_) => DsCode::CacheableArrayList,
            Collection::LinkedList(_) => DsCode::CacheableLinkedList,
            Collection::Vector(_) => DsCode::CacheableVector,
            Collection::Stack(_) => DsCode::CacheableStack,
            Collection::ObjectArray(_) => DsCode::CacheableObjectArray,
            Collection::HashMap(_) => DsCode::CacheableHashMap,
            Collection::HashTable(_) => DsCode::CacheableHashTable,
            Collection::IdentityHashMap(_) => DsCode::CacheableIdentityHashMap,
            Collection::Properties(_) => DsCode::Properties,
            Collection::HashSet(_) => DsCode::CacheableHashSet,
            Collection::LinkedHashSet(_) => DsCode::CacheableLinkedHashSet,
            Collection::FileName(_) => DsCode::CacheableFileName,
        }
    }
}

impl FixedIdValue {
    /// The fixed ID this value is written under.
    pub fn fixed_id(&self) -> i32 {
        match self {
            FixedIdValue::Struct(_) => fixed_id::STRUCT,
            FixedIdValue::Undefined => fixed_id::CACHEABLE_UNDEFINED,
            FixedIdValue::EnumInfo(_) => fixed_id::ENUM_INFO,
            FixedIdValue::PdxType(_) => fixed_id::PDX_TYPE,
            FixedIdValue::Custom(o) => o.fixed_id(),
        }
    }
}

fn float_eq(a: f32, b: f32) -> bool {
    canonical_f32_bits(a) == canonical_f32_bits(b)
}

fn double_eq(a: f64, b: f64) -> bool {
    canonical_f64_bits(a) == canonical_f64_bits(b)
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Primitive::Byte(a), Primitive::Byte(b)) => a == b,
            (Primitive::Boolean(a), Primitive::Boolean(b)) => a == b,
            (Primitive::Char(a), Primitive::Char(b)) => a == b,
            (Primitive::Double(a), Primitive::Double(b)) => double_eq(*a, *b),
            (Primitive::Float(a), Primitive::Float(b)) => float_eq(*a, *b),
            (Primitive::Int16(a), Primitive::Int16(b)) => a == b,
            (Primitive::Int32(a), Primitive::Int32(b)) => a == b,
            (Primitive::Int64(a), Primitive::Int64(b)) => a == b,
            (Primitive::String(a), Primitive::String(b)) => a == b,
            (Primitive::Date(a), Primitive::Date(b)) => {
                a.timestamp_millis() == b.timestamp_millis()
            }
            (Primitive::Custom(a), Primitive::Custom(b)) => {
                Arc::ptr_eq(a, b) || a.equals(b.as_ref())
            }
            _ => false,
        }
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Collection::Bytes(a), Collection::Bytes(b)) => a == b,
            (Collection::Int16Array(a), Collection::Int16Array(b)) => a == b,
            (Collection::Int32Array(a), Collection::Int32Array(b)) => a == b,
            (Collection::Int64Array(a), Collection::Int64Array(b)) => a == b,
            (Collection::FloatArray(a), Collection::FloatArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| float_eq(*x, *y))
            }
            (Collection::DoubleArray(a), Collection::DoubleArray(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| double_eq(*x, *y))
            }
            (Collection::BooleanArray(a), Collection::BooleanArray(b)) => a == b,
            (Collection::CharArray(a), Collection::CharArray(b)) => a == b,
            (Collection::StringArray(a), Collection::StringArray(b)) => a == b,
            (Collection::ArrayList(a), Collection::ArrayList(b))
            | (Collection::LinkedList(a), Collection::LinkedList(b))
            | (Collection::Vector(a), Collection::Vector(b))
            | (Collection::Stack(a), Collection::Stack(b)) => a == b,
            (Collection::ObjectArray(a), Collection::ObjectArray(b)) => a == b,
            (Collection::HashMap(a), Collection::HashMap(b))
            | (Collection::HashTable(a), Collection::HashTable(b))
            | (Collection::IdentityHashMap(a), Collection::IdentityHashMap(b))
            | (Collection::Properties(a), Collection::Properties(b)) => a == b,
            (Collection::HashSet(a), Collection::HashSet(b))
            | (Collection::LinkedHashSet(a), Collection::LinkedHashSet(b)) => a == b,
            (Collection::FileName(a), Collection::FileName(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for FixedIdValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FixedIdValue::Struct(a), FixedIdValue::Struct(b)) => a == b,
            (FixedIdValue::Undefined, FixedIdValue::Undefined) => true,
            (FixedIdValue::EnumInfo(a), FixedIdValue::EnumInfo(b)) => a == b,
            (FixedIdValue::PdxType(a), FixedIdValue::PdxType(b)) => a == b,
            (FixedIdValue::Custom(a), FixedIdValue::Custom(b)) => {
                Arc::ptr_eq(a, b) || a.equals(b.as_ref())
            }
            _ => false,
        }
    }
}

impl PartialEq for PdxValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PdxValue::Object(a), PdxValue::Object(b)) => Arc::ptr_eq(a, b) || a.equals(b.as_ref()),
            (PdxValue::Wrapper(a), PdxValue::Wrapper(b)) => a == b,
            (PdxValue::Instance(a), PdxValue::Instance(b)) => a == b,
            (PdxValue::Enum(a), PdxValue::Enum(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for CacheableValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CacheableValue::Primitive(a), CacheableValue::Primitive(b)) => a == b,
            (CacheableValue::Collection(a), CacheableValue::Collection(b)) => a == b,
            (CacheableValue::FixedId(a), CacheableValue::FixedId(b)) => a == b,
            (CacheableValue::UserData(a), CacheableValue::UserData(b)) => {
                Arc::ptr_eq(a, b) || a.equals(b.as_ref())
            }
            (CacheableValue::Pdx(a), CacheableValue::Pdx(b)) => a == b,
            (CacheableValue::Exception(a), CacheableValue::Exception(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CacheableValue {}

impl Hash for CacheableValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.hash_code());
    }
}

impl From<Primitive> for CacheableValue {
    fn from(value: Primitive) -> Self {
        CacheableValue::Primitive(value)
    }
}

impl From<Collection> for CacheableValue {
    fn from(value: Collection) -> Self {
        CacheableValue::Collection(value)
    }
}

impl From<FixedIdValue> for CacheableValue {
    fn from(value: FixedIdValue) -> Self {
        CacheableValue::FixedId(value)
    }
}

impl From<PdxValue> for CacheableValue {
    fn from(value: PdxValue) -> Self {
        CacheableValue::Pdx(value)
    }
}
