//! PDX records through a live session: derived types, instances, serializers.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use geode_client::core::serialization::{
    Collection, PdxInstance, PdxReader, PdxSerializer, PdxTypeMapper, PdxValue, PdxWriter, Primitive,
};
use geode_client::core::{GeodeError, PdxSerializable};
use geode_client::{CacheSession, CacheableValue, SerializationConfig};

#[derive(Debug, Clone, Default, PartialEq, PdxSerializable)]
#[geode(class_name = "com.example.Customer")]
struct Customer {
    #[geode(identity)]
    id: i64,
    #[geode(field_name = "fullName")]
    name: String,
    email: Option<String>,
    vip: bool,
    joined: DateTime<Utc>,
    scores: Vec<i32>,
    aliases: Vec<String>,
    avatar: Vec<u8>,
    address: Option<Address>,
    #[geode(skip)]
    session_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, PdxSerializable)]
#[geode(class_name = "com.example.Address")]
struct Address {
    street: String,
    zip: i32,
}

#[derive(Debug, Clone, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

struct PointSerializer;

impl PdxSerializer for PointSerializer {
    fn to_data(&self, object: &dyn Any, _: &str, writer: &mut PdxWriter) -> geode_client::core::Result<bool> {
        let Some(point) = object.downcast_ref::<Point>() else {
            return Ok(false);
        };
        writer.write_int("x", point.x)?;
        writer.write_int("y", point.y)?;
        Ok(true)
    }

    fn from_data(
        &self,
        class_name: &str,
        reader: &mut PdxReader,
    ) -> geode_client::core::Result<Option<Box<dyn Any + Send + Sync>>> {
        if class_name != std::any::type_name::<Point>() {
            return Ok(None);
        }
        Ok(Some(Box::new(Point {
            x: reader.read_int("x")?,
            y: reader.read_int("y")?,
        })))
    }
}

struct ShortNames;

impl PdxTypeMapper for ShortNames {
    fn to_pdx_type_name(&self, local_name: &str) -> Option<String> {
        local_name.strip_prefix("com.example.").map(|n| format!("ex.{n}"))
    }

    fn from_pdx_type_name(&self, pdx_type_name: &str) -> Option<String> {
        pdx_type_name.strip_prefix("ex.").map(|n| format!("com.example.{n}"))
    }
}

fn customer() -> Customer {
    Customer {
        id: 77,
        name: "Grace Hopper".into(),
        email: None,
        vip: true,
        joined: Utc.timestamp_millis_opt(1_600_000_000_000).unwrap(),
        scores: vec![9, 8, 10],
        aliases: vec!["amazing grace".into()],
        avatar: vec![1, 2, 3],
        address: Some(Address {
            street: "1 Navy Way".into(),
            zip: 20350,
        }),
        session_token: String::new(),
    }
}

fn connect(read_serialized: bool) -> CacheSession {
    let config = SerializationConfig::builder()
        .read_serialized(read_serialized)
        .build()
        .unwrap();
    let session = CacheSession::connect(config).unwrap();
    let registry = session.registry().unwrap();
    registry.register_pdx_type(Customer::default).unwrap();
    registry.register_pdx_type(Address::default).unwrap();
    session
}

fn type_id_of(bytes: &[u8]) -> i32 {
    i32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]])
}

#[test]
fn test_derived_round_trip() {
    let session = connect(false);
    let bytes = session.serialize(customer()).unwrap();
    assert_eq!(bytes[0], 93);
    assert_eq!(session.deserialize::<Customer>(&bytes).unwrap(), Some(customer()));
}

#[test]
fn test_record_length_covers_field_data() {
    let session = connect(false);
    let address = Address {
        street: "Elm".into(),
        zip: 1,
    };
    let bytes = session.serialize(address).unwrap();
    let length = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    // Typed string "Elm" then the i32 zip.
    assert_eq!(length, 1 + 2 + 3 + 4);
    assert_eq!(bytes.len(), 9 + length);
}

#[test]
fn test_type_definition_follows_attributes() {
    let session = connect(false);
    let bytes = session.serialize(customer()).unwrap();
    let registry = session.registry().unwrap();
    let pdx_type = registry.pdx_types().get_type(type_id_of(&bytes)).unwrap();

    assert_eq!(pdx_type.class_name(), "com.example.Customer");
    assert!(pdx_type.field("fullName").is_some());
    assert!(pdx_type.field("name").is_none());
    assert!(pdx_type.field("session_token").is_none());
    assert!(pdx_type.field("id").unwrap().is_identity());
    assert!(!pdx_type.field("vip").unwrap().is_identity());
}

#[test]
fn test_same_layout_reuses_type_id() {
    let session = connect(false);
    let first = session.serialize(customer()).unwrap();
    let second = session
        .serialize(Customer {
            id: 78,
            ..customer()
        })
        .unwrap();
    assert_eq!(type_id_of(&first), type_id_of(&second));
}

#[test]
fn test_read_serialized_yields_instance() {
    let session = connect(true);
    let bytes = session.serialize(customer()).unwrap();
    let instance = session.deserialize::<PdxInstance>(&bytes).unwrap().unwrap();

    assert_eq!(instance.class_name(), "com.example.Customer");
    assert!(instance.has_field("fullName"));
    assert!(instance.is_identity_field("id"));
    assert_eq!(
        instance.get_field("fullName"),
        Some(&CacheableValue::Primitive(Primitive::String("Grace Hopper".into())))
    );
    assert_eq!(
        instance.get_field("scores"),
        Some(&CacheableValue::Collection(Collection::Int32Array(vec![9, 8, 10])))
    );

    // The instance writes back byte-for-byte.
    assert_eq!(session.serialize(instance).unwrap(), bytes);
}

#[test]
fn test_instance_identity_hash() {
    let session = connect(true);
    let a = session.serialize(customer()).unwrap();
    let b = session
        .serialize(Customer {
            name: "Someone Else".into(),
            ..customer()
        })
        .unwrap();
    let a = session.deserialize::<PdxInstance>(&a).unwrap().unwrap();
    let b = session.deserialize::<PdxInstance>(&b).unwrap().unwrap();
    assert_eq!(a.hash_code(), b.hash_code());
}

#[test]
fn test_unregistered_class_is_a_configuration_error() {
    let session = connect(false);
    let address = Address {
        street: "Elm".into(),
        zip: 1,
    };
    let bytes = session.serialize(address).unwrap();

    let fresh = CacheSession::connect(SerializationConfig::default()).unwrap();
    let registry = fresh.registry().unwrap();
    let pdx_type = session.registry().unwrap().pdx_types().get_type(type_id_of(&bytes)).unwrap();
    registry.pdx_types().add_type((*pdx_type).clone()).unwrap();

    let err = fresh.deserialize_value(&bytes).unwrap_err();
    assert!(err.as_serialization().is_some_and(GeodeError::is_configuration));
}

#[test]
fn test_serializer_through_serialize_any() {
    let session = CacheSession::connect(SerializationConfig::default()).unwrap();
    session
        .registry()
        .unwrap()
        .register_pdx_serializer(Arc::new(PointSerializer))
        .unwrap();

    let bytes = session.serialize_any(Point { x: 3, y: -4 }).unwrap();
    let value = session.deserialize_value(&bytes).unwrap().unwrap();
    assert!(matches!(value, CacheableValue::Pdx(PdxValue::Wrapper(_))));
    assert_eq!(*value.downcast_user::<Point>().unwrap(), Point { x: 3, y: -4 });
}

#[test]
fn test_second_serializer_is_rejected() {
    let session = CacheSession::connect(SerializationConfig::default()).unwrap();
    let registry = session.registry().unwrap();
    registry.register_pdx_serializer(Arc::new(PointSerializer)).unwrap();
    let err = registry.register_pdx_serializer(Arc::new(PointSerializer)).unwrap_err();
    assert!(matches!(err, GeodeError::DuplicateRegistration(_)));
}

#[test]
fn test_unmapped_native_type_is_rejected() {
    let session = CacheSession::connect(SerializationConfig::default()).unwrap();
    let err = session.serialize_any(Point { x: 0, y: 0 }).unwrap_err();
    assert!(matches!(err.as_serialization(), Some(GeodeError::TypeNotRegistered(_))));
}

#[test]
fn test_type_mapper_renames_on_the_wire() {
    let session = connect(false);
    session
        .registry()
        .unwrap()
        .set_pdx_type_mapper(Arc::new(ShortNames))
        .unwrap();

    let bytes = session.serialize(customer()).unwrap();
    let registry = session.registry().unwrap();
    let pdx_type = registry.pdx_types().get_type(type_id_of(&bytes)).unwrap();
    assert_eq!(pdx_type.class_name(), "ex.Customer");
    assert_eq!(session.deserialize::<Customer>(&bytes).unwrap(), Some(customer()));
}

#[test]
fn test_mapper_cannot_change_after_use() {
    let session = connect(false);
    session.serialize(customer()).unwrap();
    let err = session
        .registry()
        .unwrap()
        .set_pdx_type_mapper(Arc::new(ShortNames))
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_disconnect_forgets_pdx_types() {
    let session = connect(false);
    let bytes = session.serialize(customer()).unwrap();
    session.disconnect();
    session.reconnect();
    let err = session.deserialize_value(&bytes).unwrap_err();
    assert!(matches!(err.as_serialization(), Some(GeodeError::UnknownTypeId(_))));
}
