//! `#[derive(DataSerializable)]` through a live session.

use std::collections::HashMap;

use geode_client::core::{DataSerializable, GeodeError};
use geode_client::{CacheSession, SerializationConfig};

#[derive(Debug, Clone, Default, PartialEq, DataSerializable)]
#[geode(class_id = 5)]
struct LineItem {
    sku: String,
    quantity: i32,
}

#[derive(Debug, Clone, Default, PartialEq, DataSerializable)]
#[geode(class_id = 300)]
struct Invoice {
    number: i64,
    paid: bool,
    discount: f32,
    currency: u16,
    note: Option<String>,
    attachment: Vec<u8>,
    tags: Vec<String>,
    lines: Vec<LineItem>,
    totals: HashMap<String, f64>,
    reference: Option<i32>,
    #[geode(skip)]
    cached_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, DataSerializable)]
#[geode(class_id = 70000)]
struct Marker {
    level: i8,
}

fn session() -> CacheSession {
    let session = CacheSession::connect(SerializationConfig::default()).unwrap();
    let registry = session.registry().unwrap();
    registry.register_type(5, LineItem::default).unwrap();
    registry.register_type(300, Invoice::default).unwrap();
    registry.register_type(70000, Marker::default).unwrap();
    session
}

fn invoice() -> Invoice {
    Invoice {
        number: 1042,
        paid: true,
        discount: 0.25,
        currency: 978,
        note: Some("net 30".into()),
        attachment: vec![0xCA, 0xFE],
        tags: vec!["priority".into(), "export".into()],
        lines: vec![
            LineItem {
                sku: "A-1".into(),
                quantity: 2,
            },
            LineItem {
                sku: "B-7".into(),
                quantity: 1,
            },
        ],
        totals: [("net".to_string(), 99.5), ("tax".to_string(), 19.9)].into(),
        reference: None,
        cached_total: 0.0,
    }
}

#[test]
fn test_flat_layout() {
    let session = session();
    let bytes = session
        .serialize(LineItem {
            sku: "Z".into(),
            quantity: 3,
        })
        .unwrap();
    assert_eq!(&bytes[..], &[39, 5, 87, 0, 1, b'Z', 0, 0, 0, 3]);
}

#[test]
fn test_class_id_escapes_by_magnitude() {
    let session = session();
    let bytes = session.serialize(invoice()).unwrap();
    assert_eq!(&bytes[..3], &[38, 0x01, 0x2C]);

    let bytes = session.serialize(Marker { level: -1 }).unwrap();
    assert_eq!(&bytes[..5], &[37, 0x00, 0x01, 0x11, 0x70]);
    assert_eq!(session.deserialize::<Marker>(&bytes).unwrap(), Some(Marker { level: -1 }));
}

#[test]
fn test_nested_round_trip() {
    let session = session();
    let bytes = session.serialize(invoice()).unwrap();
    assert_eq!(session.deserialize::<Invoice>(&bytes).unwrap(), Some(invoice()));
}

#[test]
fn test_skipped_field_resets_to_default() {
    let session = session();
    let mut original = invoice();
    original.cached_total = 119.4;
    let bytes = session.serialize(original).unwrap();
    let decoded = session.deserialize::<Invoice>(&bytes).unwrap().unwrap();
    assert_eq!(decoded.cached_total, 0.0);
}

#[test]
fn test_nested_type_must_be_registered() {
    let session = CacheSession::connect(SerializationConfig::default()).unwrap();
    session.registry().unwrap().register_type(300, Invoice::default).unwrap();
    let bytes = session.serialize(invoice()).unwrap();
    let err = session.deserialize::<Invoice>(&bytes).unwrap_err();
    assert!(matches!(err.as_serialization(), Some(GeodeError::UnknownTypeId(_))));
}

#[test]
fn test_wrong_class_id_is_rejected() {
    let session = CacheSession::connect(SerializationConfig::default()).unwrap();
    let err = session.registry().unwrap().register_type(6, LineItem::default).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_decoding_into_other_user_type_fails() {
    let session = session();
    let bytes = session.serialize(Marker { level: 1 }).unwrap();
    let err = session.deserialize::<LineItem>(&bytes).unwrap_err();
    assert!(matches!(err.as_serialization(), Some(GeodeError::TypeMismatch { .. })));
}

#[test]
fn test_user_types_hash_by_payload() {
    let session = session();
    let a = session.key_hash(LineItem { sku: "A".into(), quantity: 1 }).unwrap();
    let b = session.key_hash(LineItem { sku: "A".into(), quantity: 1 }).unwrap();
    let c = session.key_hash(LineItem { sku: "A".into(), quantity: 2 }).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}
