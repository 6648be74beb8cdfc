//! Serialization framework for Geode's binary format.
//!
//! Values travel as a leading type identifier (a DSCode byte, optionally
//! followed by a fixed ID or user class ID) and a payload. The
//! [`TypeRegistry`] maps identifiers to readers; [`ObjectDataOutput`] and
//! [`ObjectDataInput`] carry the primitive encodings.

mod builtins;
mod catalog;
mod convert;
mod data_input;
mod data_output;
mod data_serializable;
mod ds_code;
mod hashing;
pub mod mutf8;
pub mod pdx;
mod registry;
mod snapshot;
mod value;

#[cfg(test)]
mod proptest_tests;

pub use builtins::{read_list, read_map, read_set, write_list, write_map, write_set};
pub use catalog::{CatalogConstructor, CatalogModule, CatalogObject, TypeCatalog};
pub use convert::{FromCacheable, IntoCacheable};
pub use data_input::{DataInput, ObjectDataInput, MAX_NESTING_DEPTH};
pub use data_output::{
    canonical_f32_bits, canonical_f64_bits, DataOutput, ObjectDataOutput, CANONICAL_NAN_F32, CANONICAL_NAN_F64,
};
pub use data_serializable::{
    AsAny, DataSerializable, DataSerializableFactory, DataSerializableFixedId, DataSerializablePrimitive,
    FixedIdFactory, PrimitiveFactory,
};
pub use ds_code::{fixed_id, fixed_id_escape, user_data_escape, ClassId, ClassIdOrigin, DsCode};
pub use hashing::{hash_bytes, hash_map_entries, hash_ordered, hash_unordered, JavaHash};
pub use pdx::{PdxInstance, PdxReader, PdxSerializable, PdxSerializer, PdxTypeMapper, PdxWrapper, PdxWriter};
pub use registry::TypeRegistry;
pub use value::{
    CacheableMap, CacheableSet, CacheableValue, CacheableVec, Collection, EnumInfo, FixedIdValue, ObjectArray,
    PdxValue, Primitive, Struct, UserFunctionExecutionException,
};
