//! The session type registry.
//!
//! Maps every wire type identifier (DSCode, fixed ID, user class ID, PDX
//! class name) to the code that reads it, and native Rust types back to the
//! wire representation they are written as. All tables are copy-on-write
//! snapshots, so decoding never takes a lock while registration is in flight
//! on another thread.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::Bytes;

use super::builtins::{self, BuiltinFixedIdReader, BuiltinReader};
use super::catalog::{CatalogObject, TypeCatalog};
use super::convert::{self, FromCacheable, IntoCacheable, WrapFn};
use super::data_input::ObjectDataInput;
use super::data_output::{ObjectDataOutput, DEFAULT_CAPACITY, DEFAULT_MAX_CAPACITY};
use super::data_serializable::{
    DataSerializable, DataSerializableFactory, DataSerializableFixedId, DataSerializablePrimitive, FixedIdFactory,
    PrimitiveFactory,
};
use super::ds_code::{ClassId, ClassIdOrigin, DsCode};
use super::pdx::{
    self, PdxFactory, PdxNameCache, PdxSerializable, PdxSerializer, PdxTypeMapper, PdxTypeRegistry, PdxWrapper,
    PdxWriter,
};
use super::snapshot::SnapshotMap;
use super::value::{CacheableValue, FixedIdValue, ObjectArray, PdxValue, Primitive};
use crate::error::{GeodeError, Result};

/// How a native Rust type is written.
#[derive(Clone, Copy)]
struct NativeMapping {
    class_id: Option<ClassId>,
    wrap: WrapFn,
}

fn wrap_user<T: DataSerializable>(value: Box<dyn Any + Send + Sync>) -> Option<Result<CacheableValue>> {
    let value = value.downcast::<T>().ok()?;
    let object: Arc<dyn DataSerializable> = Arc::new(*value);
    Some(Ok(CacheableValue::UserData(object)))
}

fn wrap_primitive<T: DataSerializablePrimitive>(value: Box<dyn Any + Send + Sync>) -> Option<Result<CacheableValue>> {
    let value = value.downcast::<T>().ok()?;
    let object: Arc<dyn DataSerializablePrimitive> = Arc::new(*value);
    Some(Ok(Primitive::Custom(object).into()))
}

fn wrap_fixed_id<T: DataSerializableFixedId>(value: Box<dyn Any + Send + Sync>) -> Option<Result<CacheableValue>> {
    let value = value.downcast::<T>().ok()?;
    let object: Arc<dyn DataSerializableFixedId> = Arc::new(*value);
    Some(Ok(FixedIdValue::Custom(object).into()))
}

fn wrap_pdx<T: PdxSerializable>(value: Box<dyn Any + Send + Sync>) -> Option<Result<CacheableValue>> {
    let value = value.downcast::<T>().ok()?;
    let object: Arc<dyn PdxSerializable> = Arc::new(*value);
    Some(Ok(PdxValue::Object(object).into()))
}

/// The type registry of one cache session.
///
/// Built-in readers are installed by [`with_builtins`](Self::with_builtins)
/// or [`register_builtins`](Self::register_builtins). User registrations are
/// never silently replaced: a second registration under a bound identifier
/// fails and leaves the first one in place.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use geode_core::serialization::{CacheableValue, Primitive, TypeRegistry};
///
/// let registry = Arc::new(TypeRegistry::with_builtins());
/// let value = CacheableValue::from(Primitive::Int32(42));
/// let bytes = registry.serialize(&value).unwrap();
/// assert_eq!(registry.deserialize(&bytes).unwrap(), Some(value));
/// ```
pub struct TypeRegistry {
    builtin_readers: SnapshotMap<DsCode, BuiltinReader>,
    primitive_overrides: SnapshotMap<DsCode, PrimitiveFactory>,
    fixed_id_readers: SnapshotMap<i32, BuiltinFixedIdReader>,
    fixed_id_overrides: SnapshotMap<i32, FixedIdFactory>,
    user_types: SnapshotMap<i32, DataSerializableFactory>,
    native_types: SnapshotMap<TypeId, NativeMapping>,
    pdx_factories: SnapshotMap<String, PdxFactory>,
    pdx_serializer: ArcSwapOption<Arc<dyn PdxSerializer>>,
    pdx_names: PdxNameCache,
    pdx_types: PdxTypeRegistry,
    catalog: TypeCatalog,
    read_serialized: AtomicBool,
    ignore_unread_fields: AtomicBool,
    initial_capacity: AtomicUsize,
    max_capacity: AtomicUsize,
}

impl TypeRegistry {
    /// Creates a registry with no types at all.
    pub fn new() -> Self {
        Self {
            builtin_readers: SnapshotMap::new(),
            primitive_overrides: SnapshotMap::new(),
            fixed_id_readers: SnapshotMap::new(),
            fixed_id_overrides: SnapshotMap::new(),
            user_types: SnapshotMap::new(),
            native_types: SnapshotMap::new(),
            pdx_factories: SnapshotMap::new(),
            pdx_serializer: ArcSwapOption::empty(),
            pdx_names: PdxNameCache::new(),
            pdx_types: PdxTypeRegistry::new(),
            catalog: TypeCatalog::new(),
            read_serialized: AtomicBool::new(false),
            ignore_unread_fields: AtomicBool::new(false),
            initial_capacity: AtomicUsize::new(DEFAULT_CAPACITY),
            max_capacity: AtomicUsize::new(DEFAULT_MAX_CAPACITY),
        }
    }

    /// Creates a registry with every built-in type installed.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Installs the built-in readers and native mappings.
    ///
    /// Overrides registered earlier keep taking precedence.
    pub fn register_builtins(&self) {
        let _ = self.builtin_readers.update(|readers| {
            readers.extend(builtins::builtin_readers().iter().copied());
            Ok::<_, GeodeError>(())
        });
        let _ = self.fixed_id_readers.update(|readers| {
            readers.extend(builtins::builtin_fixed_id_readers().iter().copied());
            Ok::<_, GeodeError>(())
        });
        let struct_type = convert::struct_native_type();
        let _ = self.native_types.update(|natives| {
            for native in convert::builtin_native_types().iter().chain([&struct_type]) {
                natives.entry((native.type_id)()).or_insert(NativeMapping {
                    class_id: Some(native.class_id),
                    wrap: native.wrap,
                });
            }
            Ok::<_, GeodeError>(())
        });
        tracing::debug!(
            codes = self.builtin_readers.len(),
            fixed_ids = self.fixed_id_readers.len(),
            "registered built-in types"
        );
    }

    /// Removes the built-in readers and their native mappings.
    pub fn unregister_builtins(&self) {
        self.builtin_readers.clear();
        self.fixed_id_readers.clear();
        let struct_type = convert::struct_native_type();
        let _ = self.native_types.update(|natives| {
            for native in convert::builtin_native_types().iter().chain([&struct_type]) {
                let type_id = (native.type_id)();
                if natives.get(&type_id).map(|m| m.class_id) == Some(Some(native.class_id)) {
                    natives.remove(&type_id);
                }
            }
            Ok::<_, GeodeError>(())
        });
        tracing::debug!("unregistered built-in types");
    }

    /// Removes every registration, PDX definition and catalog module.
    pub fn clear(&self) {
        self.builtin_readers.clear();
        self.primitive_overrides.clear();
        self.fixed_id_readers.clear();
        self.fixed_id_overrides.clear();
        self.user_types.clear();
        self.native_types.clear();
        self.pdx_factories.clear();
        self.pdx_serializer.store(None);
        self.pdx_names.clear();
        self.pdx_types.clear();
        self.catalog.clear();
        tracing::debug!("cleared type registry");
    }

    fn record_native<T: Any>(&self, class_id: Option<ClassId>, wrap: WrapFn) {
        let _ = self.native_types.update(|natives| {
            natives.insert(TypeId::of::<T>(), NativeMapping { class_id, wrap });
            Ok::<_, GeodeError>(())
        });
    }

    /// Registers a user data-serializable type under `class_id`.
    ///
    /// The factory is probed once to check that its instances report the
    /// same class ID.
    pub fn register_type<T, F>(&self, class_id: i32, factory: F) -> Result<()>
    where
        T: DataSerializable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        if class_id < 0 {
            return Err(GeodeError::Configuration(format!(
                "class ID {class_id} of {} is negative",
                type_name::<T>()
            )));
        }
        let reported = factory().class_id();
        if reported != class_id {
            return Err(GeodeError::Configuration(format!(
                "{} reports class ID {reported}, registered as {class_id}",
                type_name::<T>()
            )));
        }
        self.user_types.update(|types| {
            if types.contains_key(&class_id) {
                tracing::warn!(class_id, type_name = type_name::<T>(), "rejected duplicate class ID");
                return Err(GeodeError::DuplicateRegistration(format!("class ID {class_id}")));
            }
            let factory: DataSerializableFactory = Arc::new(move || -> Box<dyn DataSerializable> { Box::new(factory()) });
            types.insert(class_id, factory);
            Ok(())
        })?;
        self.record_native::<T>(ClassId::user(class_id), wrap_user::<T>);
        tracing::debug!(class_id, type_name = type_name::<T>(), "registered data serializable type");
        Ok(())
    }

    /// Replaces the built-in reader for the DSCode `T` reports.
    pub fn register_primitive_override<T, F>(&self, factory: F) -> Result<()>
    where
        T: DataSerializablePrimitive,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let code = factory().ds_code();
        if code.is_framing() {
            return Err(GeodeError::Configuration(format!(
                "{code:?} is a framing code and cannot be overridden"
            )));
        }
        self.primitive_overrides.update(|overrides| {
            if overrides.contains_key(&code) {
                tracing::warn!(?code, type_name = type_name::<T>(), "rejected duplicate primitive override");
                return Err(GeodeError::DuplicateRegistration(format!("override for {code:?}")));
            }
            let factory: PrimitiveFactory =
                Arc::new(move || -> Box<dyn DataSerializablePrimitive> { Box::new(factory()) });
            overrides.insert(code, factory);
            Ok(())
        })?;
        self.record_native::<T>(Some(ClassId::built_in(code)), wrap_primitive::<T>);
        tracing::debug!(?code, type_name = type_name::<T>(), "registered primitive override");
        Ok(())
    }

    /// Replaces the built-in reader for the fixed ID `T` reports.
    pub fn register_fixed_id_override<T, F>(&self, factory: F) -> Result<()>
    where
        T: DataSerializableFixedId,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let id = factory().fixed_id();
        self.fixed_id_overrides.update(|overrides| {
            if overrides.contains_key(&id) {
                tracing::warn!(fixed_id = id, type_name = type_name::<T>(), "rejected duplicate fixed ID override");
                return Err(GeodeError::DuplicateRegistration(format!("override for fixed ID {id}")));
            }
            let factory: FixedIdFactory =
                Arc::new(move || -> Box<dyn DataSerializableFixedId> { Box::new(factory()) });
            overrides.insert(id, factory);
            Ok(())
        })?;
        self.record_native::<T>(Some(ClassId::fixed_id(id)), wrap_fixed_id::<T>);
        tracing::debug!(fixed_id = id, type_name = type_name::<T>(), "registered fixed ID override");
        Ok(())
    }

    /// Removes whatever is registered under `class_id`. Unknown IDs are ignored.
    ///
    /// For a built-in code or fixed ID this removes the override and the
    /// built-in reader, so the code stops decoding until built-ins are
    /// registered again.
    pub fn unregister_type(&self, class_id: ClassId) {
        match class_id.origin() {
            Some(ClassIdOrigin::User(id)) => remove(&self.user_types, &id),
            Some(ClassIdOrigin::BuiltIn(code)) => {
                remove(&self.primitive_overrides, &code);
                remove(&self.builtin_readers, &code);
            }
            Some(ClassIdOrigin::FixedId(id)) => {
                remove(&self.fixed_id_overrides, &id);
                remove(&self.fixed_id_readers, &id);
            }
            None => return,
        }
        let _ = self.native_types.update(|natives| {
            natives.retain(|_, mapping| mapping.class_id != Some(class_id));
            Ok::<_, GeodeError>(())
        });
        tracing::debug!(class_id = class_id.raw(), "unregistered type");
    }

    /// Returns true when something decodes `class_id`.
    pub fn is_registered(&self, class_id: ClassId) -> bool {
        match class_id.origin() {
            Some(ClassIdOrigin::User(id)) => self.user_types.contains_key(&id),
            Some(ClassIdOrigin::BuiltIn(code)) => {
                self.primitive_overrides.contains_key(&code) || self.builtin_readers.contains_key(&code)
            }
            Some(ClassIdOrigin::FixedId(id)) => {
                self.fixed_id_overrides.contains_key(&id) || self.fixed_id_readers.contains_key(&id)
            }
            None => false,
        }
    }

    /// Registers a PDX type under the class name its instances report.
    pub fn register_pdx_type<T, F>(&self, factory: F) -> Result<()>
    where
        T: PdxSerializable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let class_name = factory().class_name().to_string();
        self.pdx_factories.update(|factories| {
            if factories.contains_key(&class_name) {
                tracing::warn!(class_name = %class_name, "rejected duplicate PDX type");
                return Err(GeodeError::DuplicateRegistration(format!("PDX type {class_name}")));
            }
            let factory: PdxFactory = Arc::new(move || -> Box<dyn PdxSerializable> { Box::new(factory()) });
            factories.insert(class_name.clone(), factory);
            Ok(())
        })?;
        self.record_native::<T>(None, wrap_pdx::<T>);
        tracing::debug!(class_name = %class_name, "registered PDX type");
        Ok(())
    }

    /// Installs the session's PDX serializer. Only one may be registered.
    pub fn register_pdx_serializer(&self, serializer: Arc<dyn PdxSerializer>) -> Result<()> {
        let previous = self
            .pdx_serializer
            .compare_and_swap(&None::<Arc<Arc<dyn PdxSerializer>>>, Some(Arc::new(serializer)));
        if previous.is_some() {
            tracing::warn!("rejected second PDX serializer");
            return Err(GeodeError::DuplicateRegistration("PDX serializer".to_string()));
        }
        tracing::debug!("registered PDX serializer");
        Ok(())
    }

    /// Installs the PDX type-name mapper; fails once a name has been mapped.
    pub fn set_pdx_type_mapper(&self, mapper: Arc<dyn PdxTypeMapper>) -> Result<()> {
        self.pdx_names.set_mapper(mapper)?;
        tracing::debug!("installed PDX type mapper");
        Ok(())
    }

    /// The registered PDX serializer, if any.
    pub fn pdx_serializer(&self) -> Option<Arc<dyn PdxSerializer>> {
        self.pdx_serializer.load_full().map(|s| Arc::clone(&*s))
    }

    pub(crate) fn pdx_factory(&self, class_name: &str) -> Option<PdxFactory> {
        self.pdx_factories.get(&class_name.to_string())
    }

    /// Maps a local class name to its distributed PDX name.
    pub fn to_pdx_type_name(&self, local_name: &str) -> Result<String> {
        self.pdx_names.to_pdx(local_name)
    }

    /// Maps a distributed PDX name back to the local class name.
    pub fn from_pdx_type_name(&self, pdx_name: &str) -> Result<String> {
        self.pdx_names.from_pdx(pdx_name)
    }

    /// The session's PDX type and enum definitions.
    pub fn pdx_types(&self) -> &PdxTypeRegistry {
        &self.pdx_types
    }

    /// The reflection fallback consulted for unregistered class names.
    pub fn type_catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Constructs a blank instance of a catalog type.
    pub fn create_object(&self, class_name: &str) -> Result<CatalogObject> {
        self.catalog.create_object(class_name)
    }

    /// Creates an array of `len` nulls typed as a catalog type.
    pub fn get_array_object(&self, class_name: &str, len: usize) -> Result<ObjectArray> {
        self.catalog.get_array_object(class_name, len)
    }

    /// When set, PDX values decode to [`PdxInstance`](super::pdx::PdxInstance).
    pub fn set_read_serialized(&self, read_serialized: bool) {
        self.read_serialized.store(read_serialized, Ordering::Relaxed);
    }

    /// Whether PDX values decode to field views.
    pub fn read_serialized(&self) -> bool {
        self.read_serialized.load(Ordering::Relaxed)
    }

    /// When set, PDX fields left unread are not logged.
    pub fn set_ignore_unread_fields(&self, ignore: bool) {
        self.ignore_unread_fields.store(ignore, Ordering::Relaxed);
    }

    /// Whether unread PDX fields go unlogged.
    pub fn ignore_unread_fields(&self) -> bool {
        self.ignore_unread_fields.load(Ordering::Relaxed)
    }

    /// Sets the sizing of outputs created by [`output`](Self::output).
    pub fn set_buffer_capacity(&self, initial: usize, max: usize) -> Result<()> {
        if max == 0 || initial > max {
            return Err(GeodeError::Configuration(format!(
                "invalid buffer capacity: initial {initial}, max {max}"
            )));
        }
        self.initial_capacity.store(initial, Ordering::Relaxed);
        self.max_capacity.store(max, Ordering::Relaxed);
        Ok(())
    }

    /// A fresh output bound to this registry.
    pub fn output(self: &Arc<Self>) -> ObjectDataOutput {
        let mut output = ObjectDataOutput::with_capacity(self.initial_capacity.load(Ordering::Relaxed));
        output.set_max_capacity(self.max_capacity.load(Ordering::Relaxed));
        output.set_registry(Arc::clone(self));
        output
    }

    /// A fresh input over `data` bound to this registry.
    pub fn input<'a>(self: &Arc<Self>, data: &'a [u8]) -> ObjectDataInput<'a> {
        ObjectDataInput::with_registry(data, Arc::clone(self))
    }

    /// Encodes one value with its leading type identifier.
    pub fn serialize(self: &Arc<Self>, value: &CacheableValue) -> Result<Bytes> {
        let mut output = self.output();
        output.write_object(Some(value))?;
        Ok(output.into_bytes())
    }

    /// Decodes one value; fails when bytes are left over.
    pub fn deserialize(self: &Arc<Self>, data: &[u8]) -> Result<Option<CacheableValue>> {
        let mut input = self.input(data);
        let value = input.read_object()?;
        let remaining = input.bytes_remaining();
        if remaining > 0 {
            return Err(GeodeError::Protocol(format!("{remaining} trailing bytes after value")));
        }
        Ok(value)
    }

    /// Hands the application its native value for a decoded wire value.
    pub fn get_managed_value<T: FromCacheable>(&self, value: Option<CacheableValue>) -> Result<Option<T>> {
        value.map(T::from_cacheable).transpose()
    }

    /// Picks the wire representation for a native value.
    ///
    /// Tries the native mapping recorded for `T`, then the PDX serializer.
    pub fn get_unmanaged_value<T: Any + Send + Sync>(&self, value: T) -> Result<CacheableValue> {
        if let Some(mapping) = self.native_types.get(&TypeId::of::<T>()) {
            return (mapping.wrap)(Box::new(value))
                .unwrap_or_else(|| Err(GeodeError::mismatch(type_name::<T>(), "native mapping")));
        }
        if let Some(serializer) = self.pdx_serializer() {
            let class_name = type_name::<T>();
            if serializer.to_data(&value, class_name, &mut PdxWriter::new(class_name))? {
                return Ok(PdxValue::Wrapper(PdxWrapper::new(class_name, value)).into());
            }
        }
        tracing::error!(type_name = type_name::<T>(), "no wire mapping for native type");
        Err(GeodeError::TypeNotRegistered(type_name::<T>().to_string()))
    }

    /// Converts a value with a compile-time wire mapping.
    pub fn to_cacheable<T: IntoCacheable>(&self, value: T) -> Result<CacheableValue> {
        value.into_cacheable()
    }

    /// Reads one value after its leading type identifier.
    pub(crate) fn read_object(&self, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
        let code = input.read_ds_code()?;
        tracing::trace!(?code, position = input.bytes_read(), "decoding object");
        match code {
            DsCode::NullObj | DsCode::CacheableNullString | DsCode::FixedIdNone => Ok(None),
            DsCode::FixedIdDefault => builtins::read_exception(input).map(Some),
            DsCode::FixedIdByte | DsCode::FixedIdShort | DsCode::FixedIdInt => {
                let id = builtins::read_escaped_id(input, code)?;
                self.read_fixed_id(id, input)
            }
            DsCode::CacheableUserData | DsCode::CacheableUserData2 | DsCode::CacheableUserData4 => {
                let class_id = builtins::read_escaped_id(input, code)?;
                self.read_user_data(class_id, input)
            }
            DsCode::Pdx => pdx::read_pdx(input, self).map(Some),
            DsCode::PdxEnum => pdx::read_pdx_enum(input, self).map(Some),
            DsCode::Class => Err(GeodeError::Protocol(
                "class marker outside an object array".to_string(),
            )),
            code => self.read_builtin(code, input),
        }
    }

    fn read_builtin(&self, code: DsCode, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
        if let Some(factory) = self.primitive_overrides.get(&code) {
            let mut object = factory();
            object.from_data(input)?;
            return Ok(Some(Primitive::Custom(Arc::from(object)).into()));
        }
        match self.builtin_readers.get(&code) {
            Some(reader) => reader(code, input),
            None => {
                tracing::error!(?code, "no reader registered for DSCode");
                Err(GeodeError::UnknownTypeId(format!("{code:?}")))
            }
        }
    }

    fn read_fixed_id(&self, id: i32, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
        if let Some(factory) = self.fixed_id_overrides.get(&id) {
            let mut object = factory();
            object.from_data(input)?;
            return Ok(Some(FixedIdValue::Custom(Arc::from(object)).into()));
        }
        match self.fixed_id_readers.get(&id) {
            Some(reader) => reader(id, input),
            None => {
                tracing::error!(fixed_id = id, "no reader registered for fixed ID");
                Err(GeodeError::UnknownTypeId(format!("fixed ID {id}")))
            }
        }
    }

    fn read_user_data(&self, class_id: i32, input: &mut ObjectDataInput<'_>) -> Result<Option<CacheableValue>> {
        let Some(factory) = self.user_types.get(&class_id) else {
            tracing::error!(class_id, "no data serializable type registered for class ID");
            return Err(GeodeError::UnknownTypeId(format!("class ID {class_id}")));
        };
        let mut object = factory();
        object.from_data(input)?;
        Ok(Some(CacheableValue::UserData(Arc::from(object))))
    }
}

fn remove<K: Eq + std::hash::Hash + Clone, V: Clone>(map: &SnapshotMap<K, V>, key: &K) {
    if map.contains_key(key) {
        let _ = map.update(|entries| {
            entries.remove(key);
            Ok::<_, GeodeError>(())
        });
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("builtin_codes", &self.builtin_readers.len())
            .field("primitive_overrides", &self.primitive_overrides.len())
            .field("fixed_ids", &self.fixed_id_readers.len())
            .field("fixed_id_overrides", &self.fixed_id_overrides.len())
            .field("user_types", &self.user_types.len())
            .field("pdx_types", &self.pdx_factories.len())
            .field("has_pdx_serializer", &self.pdx_serializer.load().is_some())
            .field("read_serialized", &self.read_serialized())
            .finish()
    }
}
