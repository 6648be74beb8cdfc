//! PDX application traits and the record encoding.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::reader::read_field_value;
use super::writer::write_field_value;
use super::{PdxInstance, PdxReader, PdxType, PdxWriter};
use crate::error::{GeodeError, Result};
use crate::serialization::catalog::CatalogObject;
use crate::serialization::data_serializable::AsAny;
use crate::serialization::ds_code::DsCode;
use crate::serialization::registry::TypeRegistry;
use crate::serialization::value::{CacheableValue, EnumInfo, PdxValue};
use crate::serialization::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput};

/// An application type that writes itself as named PDX fields.
///
/// `from_data` runs on a blank instance from the registered factory and
/// should read the fields `to_data` writes. Equality and hashing default to
/// comparing the written fields as a [`PdxInstance`] would.
pub trait PdxSerializable: AsAny + fmt::Debug {
    /// The local class name, mapped to a PDX type name on the wire.
    fn class_name(&self) -> &str;

    fn to_data(&self, writer: &mut PdxWriter) -> Result<()>;

    fn from_data(&mut self, reader: &mut PdxReader) -> Result<()>;

    fn equals(&self, other: &dyn PdxSerializable) -> bool {
        let mine = snapshot(self.class_name(), |w| self.to_data(w));
        mine.is_some() && mine == snapshot(other.class_name(), |w| other.to_data(w))
    }

    fn hash_code(&self) -> i32 {
        snapshot(self.class_name(), |w| self.to_data(w)).map_or(0, |i| i.hash_code())
    }
}

fn snapshot(class_name: &str, write: impl FnOnce(&mut PdxWriter) -> Result<()>) -> Option<PdxInstance> {
    let mut writer = PdxWriter::new(class_name);
    write(&mut writer).ok()?;
    Some(PdxInstance::from_writer(writer))
}

/// Serializes classes that do not implement [`PdxSerializable`] themselves.
///
/// A registered serializer is asked first for every PDX class it sees.
pub trait PdxSerializer: Send + Sync {
    /// Writes `object`'s fields; returns false when the class is not handled.
    fn to_data(&self, object: &dyn Any, class_name: &str, writer: &mut PdxWriter) -> Result<bool>;

    /// Builds an object of `class_name`; `None` when the class is not handled.
    fn from_data(&self, class_name: &str, reader: &mut PdxReader) -> Result<Option<Box<dyn Any + Send + Sync>>>;
}

/// Creates blank PDX instances for decoding.
pub type PdxFactory = Arc<dyn Fn() -> Box<dyn PdxSerializable> + Send + Sync>;

/// An application object handled by the registered [`PdxSerializer`].
///
/// Only the registry sees wrappers; [`CacheableValue::downcast_user`] hands
/// out the object inside.
#[derive(Clone)]
pub struct PdxWrapper {
    class_name: String,
    object: Arc<dyn Any + Send + Sync>,
}

impl PdxWrapper {
    /// Wraps `object` under the given local class name.
    pub fn new<T: Any + Send + Sync>(class_name: impl Into<String>, object: T) -> Self {
        Self::from_arc(class_name, Arc::new(object))
    }

    /// Wraps an already shared object.
    pub fn from_arc(class_name: impl Into<String>, object: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            class_name: class_name.into(),
            object,
        }
    }

    /// The local class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The wrapped object.
    pub fn object(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.object)
    }

    /// Borrows the object as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }
}

impl PartialEq for PdxWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name && Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for PdxWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdxWrapper")
            .field("class_name", &self.class_name)
            .finish_non_exhaustive()
    }
}

/// Returns the session's numbered copy of a decoded type, defining it if the
/// ID is unknown here.
fn numbered(registry: &TypeRegistry, pdx_type: &Arc<PdxType>) -> Result<Arc<PdxType>> {
    if let Some(known) = registry.pdx_types().get_type(PdxType::type_id(pdx_type)) {
        if known.same_layout(pdx_type) {
            return Ok(known);
        }
    }
    registry.pdx_types().define_type(PdxType::clone(pdx_type))
}

fn record_of(registry: &TypeRegistry, writer: PdxWriter) -> Result<(Arc<PdxType>, Vec<Option<CacheableValue>>)> {
    let (class_name, fields, values) = writer.into_parts();
    let pdx_name = registry.to_pdx_type_name(&class_name)?;
    let pdx_type = registry.pdx_types().define_type(PdxType::new(pdx_name, fields))?;
    Ok((pdx_type, values))
}

/// Writes a PDX value as a `PDX` record.
pub(crate) fn write_pdx(output: &mut ObjectDataOutput, registry: &TypeRegistry, value: &PdxValue) -> Result<()> {
    let (pdx_type, values) = match value {
        PdxValue::Object(object) => {
            let mut writer = PdxWriter::new(object.class_name());
            object.to_data(&mut writer)?;
            record_of(registry, writer)?
        }
        PdxValue::Wrapper(wrapper) => {
            let serializer = registry.pdx_serializer().ok_or_else(|| {
                GeodeError::TypeNotRegistered(format!(
                    "no PDX serializer registered for {}",
                    wrapper.class_name()
                ))
            })?;
            let mut writer = PdxWriter::new(wrapper.class_name());
            if !serializer.to_data(wrapper.object.as_ref(), wrapper.class_name(), &mut writer)? {
                return Err(GeodeError::TypeNotRegistered(format!(
                    "PDX serializer does not handle {}",
                    wrapper.class_name()
                )));
            }
            record_of(registry, writer)?
        }
        PdxValue::Instance(instance) => (numbered(registry, instance.pdx_type())?, instance.values().to_vec()),
        PdxValue::Enum(info) => return write_pdx_enum(output, registry, info),
    };

    output.write_ds_code(DsCode::Pdx)?;
    let length_at = output.position();
    output.advance_cursor(4)?;
    output.write_int(PdxType::type_id(&pdx_type))?;
    let start = output.position();
    for (field, value) in pdx_type.fields().iter().zip(&values) {
        write_field_value(output, field.field_type(), value.as_ref())?;
    }
    let end = output.position();
    let length = i32::try_from(end - start).map_err(|_| GeodeError::OutOfMemory {
        requested: end - start,
        limit: i32::MAX as usize,
    })?;
    output.rewind_cursor(end - length_at)?;
    output.write_int(length)?;
    output.advance_cursor(end - length_at - 4)
}

/// Reads a `PDX` record; the leading code has been consumed.
pub(crate) fn read_pdx(input: &mut ObjectDataInput<'_>, registry: &TypeRegistry) -> Result<CacheableValue> {
    let length = input.read_int()?;
    let length = usize::try_from(length)
        .map_err(|_| GeodeError::MalformedHeader(format!("negative PDX record length {length}")))?;
    let type_id = input.read_int()?;
    let pdx_type = registry.pdx_types().get_type(type_id).ok_or_else(|| {
        tracing::error!(type_id, "unknown PDX type during deserialization");
        GeodeError::UnknownTypeId(format!("PDX type {type_id}"))
    })?;
    input.ensure_remaining(length)?;
    let start = input.bytes_read();
    let values = pdx_type
        .fields()
        .iter()
        .map(|f| read_field_value(input, f.field_type()))
        .collect::<Result<Vec<_>>>()?;
    let consumed = input.bytes_read() - start;
    if consumed != length {
        return Err(GeodeError::Protocol(format!(
            "PDX record for {} declared {length} bytes but its fields took {consumed}",
            pdx_type.class_name()
        )));
    }
    materialize(registry, PdxInstance::new(pdx_type, values)).map(CacheableValue::Pdx)
}

fn log_unread(registry: &TypeRegistry, reader: &PdxReader) {
    if registry.ignore_unread_fields() {
        return;
    }
    let unread = reader.unread_fields();
    if !unread.is_empty() {
        tracing::debug!(class_name = reader.class_name(), ?unread, "PDX fields left unread");
    }
}

fn read_into(
    registry: &TypeRegistry,
    instance: PdxInstance,
    mut object: Box<dyn PdxSerializable>,
) -> Result<PdxValue> {
    let mut reader = instance.into_reader();
    object.from_data(&mut reader)?;
    log_unread(registry, &reader);
    Ok(PdxValue::Object(Arc::from(object)))
}

/// Turns a decoded record into the application's value.
///
/// Tries, in order: read-serialized mode, the PDX serializer, a registered
/// factory, then the type catalog.
fn materialize(registry: &TypeRegistry, instance: PdxInstance) -> Result<PdxValue> {
    if registry.read_serialized() {
        return Ok(PdxValue::Instance(instance));
    }
    let local_name = registry.from_pdx_type_name(instance.class_name())?;
    tracing::trace!(pdx_name = instance.class_name(), local_name, "materializing PDX record");

    if let Some(serializer) = registry.pdx_serializer() {
        let mut reader = instance.reader();
        if let Some(object) = serializer.from_data(&local_name, &mut reader)? {
            log_unread(registry, &reader);
            return Ok(PdxValue::Wrapper(PdxWrapper::from_arc(local_name, Arc::from(object))));
        }
    }

    if let Some(factory) = registry.pdx_factory(&local_name) {
        return read_into(registry, instance, factory());
    }

    match registry.type_catalog().create_object(&local_name) {
        Ok(CatalogObject::Pdx(object)) => read_into(registry, instance, object),
        Ok(CatalogObject::DataSerializable(_)) => Err(GeodeError::Configuration(format!(
            "catalog type {local_name} is not PDX serializable"
        ))),
        Err(GeodeError::TypeNotFound(_)) => Err(GeodeError::Configuration(format!(
            "no PDX serializer, factory or catalog entry for {local_name}"
        ))),
        Err(e) => Err(e),
    }
}

/// Writes a PDX enum constant as `PDX_ENUM` and its session enum ID.
pub(crate) fn write_pdx_enum(output: &mut ObjectDataOutput, registry: &TypeRegistry, info: &EnumInfo) -> Result<()> {
    let enum_id = registry.pdx_types().get_or_define_enum(info)?;
    output.write_ds_code(DsCode::PdxEnum)?;
    output.write_int(enum_id)
}

/// Reads a `PDX_ENUM` body; the leading code has been consumed.
pub(crate) fn read_pdx_enum(input: &mut ObjectDataInput<'_>, registry: &TypeRegistry) -> Result<CacheableValue> {
    let enum_id = input.read_int()?;
    let info = registry.pdx_types().get_enum(enum_id).ok_or_else(|| {
        tracing::error!(enum_id, "unknown PDX enum during deserialization");
        GeodeError::UnknownTypeId(format!("PDX enum {enum_id}"))
    })?;
    Ok(CacheableValue::Pdx(PdxValue::Enum(info)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::catalog::CatalogModule;
    use crate::serialization::pdx::PdxTypeMapper;
    use crate::serialization::value::Primitive;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Order {
        id: i64,
        item: Option<String>,
    }

    impl PdxSerializable for Order {
        fn class_name(&self) -> &str {
            "Order"
        }

        fn to_data(&self, writer: &mut PdxWriter) -> Result<()> {
            writer.write_long("id", self.id)?;
            writer.write_string("item", self.item.as_deref())?;
            writer.mark_identity_field("id")
        }

        fn from_data(&mut self, reader: &mut PdxReader) -> Result<()> {
            self.id = reader.read_long("id")?;
            self.item = reader.read_string("item")?;
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    struct PointSerializer;

    impl PdxSerializer for PointSerializer {
        fn to_data(&self, object: &dyn Any, _: &str, writer: &mut PdxWriter) -> Result<bool> {
            let Some(point) = object.downcast_ref::<Point>() else {
                return Ok(false);
            };
            writer.write_int("x", point.x)?;
            writer.write_int("y", point.y)?;
            Ok(true)
        }

        fn from_data(&self, class_name: &str, reader: &mut PdxReader) -> Result<Option<Box<dyn Any + Send + Sync>>> {
            if class_name != "Point" {
                return Ok(None);
            }
            Ok(Some(Box::new(Point {
                x: reader.read_int("x")?,
                y: reader.read_int("y")?,
            })))
        }
    }

    struct PrefixMapper;

    impl PdxTypeMapper for PrefixMapper {
        fn to_pdx_type_name(&self, local_name: &str) -> Option<String> {
            Some(format!("com.example.{local_name}"))
        }

        fn from_pdx_type_name(&self, pdx_type_name: &str) -> Option<String> {
            pdx_type_name.strip_prefix("com.example.").map(str::to_string)
        }
    }

    fn order() -> Order {
        Order {
            id: 9,
            item: Some("pen".to_string()),
        }
    }

    fn session() -> Arc<TypeRegistry> {
        let registry = Arc::new(TypeRegistry::with_builtins());
        registry.register_pdx_type(Order::default).unwrap();
        registry
    }

    fn round_trip(registry: &Arc<TypeRegistry>, value: &CacheableValue) -> CacheableValue {
        let bytes = registry.serialize(value).unwrap();
        registry.deserialize(&bytes).unwrap().unwrap()
    }

    #[test]
    fn test_record_layout() {
        let registry = session();
        let value = CacheableValue::Pdx(PdxValue::Object(Arc::new(order())));
        let bytes = registry.serialize(&value).unwrap();
        assert_eq!(bytes[0], DsCode::Pdx.id());
        let length = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        // long id, then string code, u16 length and "pen".
        assert_eq!(length, 8 + 1 + 2 + 3);
        assert_eq!(bytes.len(), 9 + length as usize);
        let type_id = i32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let pdx_type = registry.pdx_types().get_type(type_id).unwrap();
        assert_eq!(pdx_type.class_name(), "Order");
        assert!(pdx_type.field("id").unwrap().is_identity());
    }

    #[test]
    fn test_factory_round_trip() {
        let registry = session();
        let value = CacheableValue::Pdx(PdxValue::Object(Arc::new(order())));
        let decoded = round_trip(&registry, &value);
        assert_eq!(decoded, value);
        assert_eq!(*decoded.downcast_user::<Order>().unwrap(), order());
    }

    #[test]
    fn test_read_serialized_yields_instance() {
        let registry = Arc::new(TypeRegistry::with_builtins());
        registry.set_read_serialized(true);
        let value = CacheableValue::Pdx(PdxValue::Object(Arc::new(order())));
        let bytes = registry.serialize(&value).unwrap();
        let Some(CacheableValue::Pdx(PdxValue::Instance(instance))) = registry.deserialize(&bytes).unwrap() else {
            panic!("expected a PDX instance");
        };
        assert_eq!(instance.get_field("id"), Some(&Primitive::Int64(9).into()));
        assert!(instance.is_identity_field("id"));
        let again = registry
            .serialize(&CacheableValue::Pdx(PdxValue::Instance(instance)))
            .unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_unknown_class_without_serializer_is_configuration_error() {
        let writer_session = session();
        let value = CacheableValue::Pdx(PdxValue::Object(Arc::new(order())));
        let bytes = writer_session.serialize(&value).unwrap();

        let reader_session = Arc::new(TypeRegistry::with_builtins());
        let err = reader_session.deserialize(&bytes).unwrap_err();
        assert!(matches!(err, GeodeError::UnknownTypeId(_)));

        let type_id = i32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let pdx_type = writer_session.pdx_types().get_type(type_id).unwrap();
        reader_session.pdx_types().add_type(PdxType::clone(&pdx_type)).unwrap();
        let err = reader_session.deserialize(&bytes).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_serializer_round_trip_unwraps() {
        let registry = Arc::new(TypeRegistry::with_builtins());
        registry.register_pdx_serializer(Arc::new(PointSerializer)).unwrap();
        let value = CacheableValue::Pdx(PdxValue::Wrapper(PdxWrapper::new("Point", Point { x: 1, y: -2 })));
        let decoded = round_trip(&registry, &value);
        assert!(matches!(decoded, CacheableValue::Pdx(PdxValue::Wrapper(_))));
        assert_eq!(*decoded.downcast_user::<Point>().unwrap(), Point { x: 1, y: -2 });
    }

    #[test]
    fn test_serializer_declining_is_an_error() {
        let registry = Arc::new(TypeRegistry::with_builtins());
        registry.register_pdx_serializer(Arc::new(PointSerializer)).unwrap();
        let value = CacheableValue::Pdx(PdxValue::Wrapper(PdxWrapper::new("Other", 5_u8)));
        let err = registry.serialize(&value).unwrap_err();
        assert!(matches!(err, GeodeError::TypeNotRegistered(_)));
    }

    #[test]
    fn test_mapper_renames_on_the_wire() {
        let registry = session();
        registry.set_pdx_type_mapper(Arc::new(PrefixMapper)).unwrap();
        let value = CacheableValue::Pdx(PdxValue::Object(Arc::new(order())));
        let bytes = registry.serialize(&value).unwrap();
        let type_id = i32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        assert_eq!(
            registry.pdx_types().get_type(type_id).unwrap().class_name(),
            "com.example.Order"
        );
        assert_eq!(round_trip(&registry, &value), value);
    }

    #[test]
    fn test_catalog_fallback() {
        let registry = Arc::new(TypeRegistry::with_builtins());
        let mut module = CatalogModule::new("orders");
        module.add_pdx_type("Order", || Box::new(Order::default()));
        registry.type_catalog().add_loaded_module(module);
        let value = CacheableValue::Pdx(PdxValue::Object(Arc::new(order())));
        assert_eq!(round_trip(&registry, &value), value);
    }

    #[test]
    fn test_truncated_length_is_protocol_error() {
        let registry = session();
        let value = CacheableValue::Pdx(PdxValue::Object(Arc::new(order())));
        let mut bytes = registry.serialize(&value).unwrap().to_vec();
        bytes[4] -= 1;
        let err = registry.deserialize(&bytes).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_enum_round_trip() {
        let registry = session();
        let value = CacheableValue::Pdx(PdxValue::Enum(EnumInfo::new("Color", "RED", 0)));
        let bytes = registry.serialize(&value).unwrap();
        assert_eq!(bytes.len(), 5);
        assert_eq!(bytes[0], DsCode::PdxEnum.id());
        assert_eq!(round_trip(&registry, &value), value);
        let err = Arc::new(TypeRegistry::with_builtins()).deserialize(&bytes).unwrap_err();
        assert!(matches!(err, GeodeError::UnknownTypeId(_)));
    }

    #[test]
    fn test_default_equality_uses_fields() {
        let a = order();
        let mut b = order();
        b.item = None;
        assert!(a.equals(&b));
        assert_eq!(a.hash_code(), b.hash_code());
        let c = Order { id: 10, ..order() };
        assert!(!a.equals(&c));
    }
}
