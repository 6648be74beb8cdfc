#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use geode_core::{CacheableValue, TypeRegistry};

fuzz_target!(|data: &[u8]| {
    let registry = Arc::new(TypeRegistry::with_builtins());
    registry.set_read_serialized(true);

    let mut input = registry.input(data);
    while input.bytes_remaining() > 0 {
        match input.read_object() {
            Ok(Some(value)) => {
                let _ = value.hash_code();
                let _ = value.kind();
                // Anything that decoded must encode again.
                if let Ok(bytes) = registry.serialize(&value) {
                    let _ = registry.deserialize(&bytes);
                }
                let _ = CacheableValue::clone(&value) == value;
            }
            Ok(None) => {}
            Err(_) => break,
        }
    }
});
