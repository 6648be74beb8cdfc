//! Property-based tests for codec round trips and hashing.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use super::hashing::JavaHash;
use super::mutf8;
use super::value::{
    CacheableMap, CacheableSet, CacheableValue, Collection, EnumInfo, FixedIdValue, ObjectArray, Primitive, Struct,
};
use super::{DataInput, DataOutput, ObjectDataInput, ObjectDataOutput, TypeRegistry};

fn arb_primitive() -> impl Strategy<Value = CacheableValue> {
    prop_oneof![
        any::<i8>().prop_map(Primitive::Byte),
        any::<bool>().prop_map(Primitive::Boolean),
        any::<u16>().prop_map(Primitive::Char),
        any::<i16>().prop_map(Primitive::Int16),
        any::<i32>().prop_map(Primitive::Int32),
        any::<i64>().prop_map(Primitive::Int64),
        any::<f32>().prop_map(Primitive::Float),
        any::<f64>().prop_map(Primitive::Double),
        ".*".prop_map(Primitive::String),
        (-10_000_000_000_000i64..10_000_000_000_000)
            .prop_map(|ms| Primitive::Date(Utc.timestamp_millis_opt(ms).unwrap())),
    ]
    .prop_map(CacheableValue::Primitive)
}

fn arb_array() -> impl Strategy<Value = CacheableValue> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..300).prop_map(|b| Collection::Bytes(b.into())),
        prop::collection::vec(any::<i32>(), 0..50).prop_map(Collection::Int32Array),
        prop::collection::vec(any::<f64>(), 0..50).prop_map(Collection::DoubleArray),
        prop::collection::vec(any::<bool>(), 0..50).prop_map(Collection::BooleanArray),
        prop::collection::vec(prop::option::of(".{0,20}"), 0..20).prop_map(Collection::StringArray),
    ]
    .prop_map(CacheableValue::Collection)
}

fn arb_fixed_leaf() -> impl Strategy<Value = CacheableValue> {
    prop_oneof![
        ".{0,24}".prop_map(|path| CacheableValue::from(Collection::FileName(path))),
        ("[A-Za-z.]{1,16}", "[A-Z_]{1,8}", any::<i32>()).prop_map(|(class_name, name, ordinal)| {
            CacheableValue::from(FixedIdValue::EnumInfo(EnumInfo::new(class_name, name, ordinal)))
        }),
        Just(CacheableValue::from(FixedIdValue::Undefined)),
    ]
}

fn arb_value() -> impl Strategy<Value = CacheableValue> {
    let leaf = prop_oneof![arb_primitive(), arb_array(), arb_fixed_leaf()];
    leaf.prop_recursive(3, 64, 8, |inner| {
        let items = || prop::collection::vec(prop::option::of(inner.clone()), 0..6);
        let entries = prop::collection::vec(("[a-z]{1,8}", prop::option::of(inner.clone())), 0..6).prop_map(
            |entries| {
                entries
                    .into_iter()
                    .map(|(k, v)| (CacheableValue::Primitive(Primitive::String(k)), v))
                    .collect::<CacheableMap>()
            },
        );
        prop_oneof![
            (0u8..4, items()).prop_map(|(kind, items)| CacheableValue::from(match kind {
                0 => Collection::ArrayList(items),
                1 => Collection::LinkedList(items),
                2 => Collection::Vector(items),
                _ => Collection::Stack(items),
            })),
            ("[A-Za-z.]{1,16}", items()).prop_map(|(class_name, items)| {
                CacheableValue::from(Collection::ObjectArray(ObjectArray { class_name, items }))
            }),
            (0u8..4, entries).prop_map(|(kind, map)| CacheableValue::from(match kind {
                0 => Collection::HashMap(map),
                1 => Collection::HashTable(map),
                2 => Collection::IdentityHashMap(map),
                _ => Collection::Properties(map),
            })),
            (any::<bool>(), prop::collection::vec(inner.clone(), 0..6)).prop_map(|(linked, items)| {
                let set: CacheableSet = items.into_iter().collect();
                CacheableValue::from(if linked {
                    Collection::LinkedHashSet(set)
                } else {
                    Collection::HashSet(set)
                })
            }),
            prop::collection::btree_map("[a-z]{1,6}", prop::option::of(inner.clone()), 0..4).prop_map(|fields| {
                let (names, values): (Vec<String>, Vec<_>) = fields.into_iter().unzip();
                CacheableValue::from(FixedIdValue::Struct(Struct::new(names, values).unwrap()))
            }),
        ]
    })
}

fn registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::with_builtins())
}

/// `String.hashCode` computed directly over UTF-16 units.
fn reference_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

proptest! {
    #[test]
    fn value_roundtrip(value in arb_value()) {
        let registry = registry();
        let bytes = registry.serialize(&value).unwrap();
        let decoded = registry.deserialize(&bytes).unwrap();
        prop_assert_eq!(decoded, Some(value));
    }

    #[test]
    fn equal_values_hash_equally(value in arb_value()) {
        let registry = registry();
        let bytes = registry.serialize(&value).unwrap();
        let decoded = registry.deserialize(&bytes).unwrap().unwrap();
        prop_assert_eq!(decoded.hash_code(), value.hash_code());
    }

    #[test]
    fn mutf8_roundtrip(s in "\\PC*") {
        let mut encoded = Vec::new();
        mutf8::encode_into(&s, &mut encoded);
        prop_assert_eq!(encoded.len(), mutf8::encoded_len(&s));
        prop_assert!(!encoded.contains(&0));
        prop_assert_eq!(mutf8::decode(&encoded).unwrap(), s);
    }

    #[test]
    fn mutf8_truncation_keeps_whole_characters(s in "\\PC{0,64}", max in 0usize..200) {
        let truncated = mutf8::encode_truncated(&s, max);
        prop_assert!(truncated.len() <= max);
        let decoded = mutf8::decode(&truncated).unwrap();
        prop_assert!(s.starts_with(&decoded));
    }

    #[test]
    fn array_length_roundtrip(len in prop::option::of(0usize..200_000)) {
        let mut output = ObjectDataOutput::new();
        output.write_array_len(len).unwrap();
        let bytes = output.into_bytes();
        let expected_width = match len {
            None => 1,
            Some(n) if n <= 252 => 1,
            Some(n) if n <= 0xFFFF => 3,
            Some(_) => 5,
        };
        prop_assert_eq!(bytes.len(), expected_width);
        let mut input = ObjectDataInput::new(&bytes);
        prop_assert_eq!(input.read_array_len().unwrap(), len);
    }

    #[test]
    fn string_hash_matches_utf16_reference(s in "\\PC*") {
        prop_assert_eq!(s.java_hash(), reference_string_hash(&s));
    }

    #[test]
    fn long_hash_folds_halves(v in any::<i64>()) {
        prop_assert_eq!(v.java_hash(), (v ^ ((v as u64) >> 32) as i64) as i32);
    }

    #[test]
    fn arbitrary_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let registry = registry();
        let _ = registry.deserialize(&data);
    }
}
