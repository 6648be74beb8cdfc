//! Hash functions that agree bit-for-bit with the Java reference hashes.
//!
//! Keys are routed by hash on the server, so a key hashed here must produce
//! the same `i32` that `Object.hashCode()` gives for its Java counterpart.

use chrono::{DateTime, Utc};

use super::data_output::{canonical_f32_bits, canonical_f64_bits};

/// Java-compatible `hashCode`.
pub trait JavaHash {
    /// Returns the Java hash of `self`.
    fn java_hash(&self) -> i32;
}

impl JavaHash for i8 {
    fn java_hash(&self) -> i32 {
        *self as i32
    }
}

impl JavaHash for u8 {
    fn java_hash(&self) -> i32 {
        *self as i8 as i32
    }
}

impl JavaHash for bool {
    fn java_hash(&self) -> i32 {
        if *self {
            1231
        } else {
            1237
        }
    }
}

impl JavaHash for u16 {
    fn java_hash(&self) -> i32 {
        *self as i32
    }
}

impl JavaHash for i16 {
    fn java_hash(&self) -> i32 {
        *self as i32
    }
}

impl JavaHash for i32 {
    fn java_hash(&self) -> i32 {
        *self
    }
}

impl JavaHash for i64 {
    fn java_hash(&self) -> i32 {
        (*self ^ ((*self as u64) >> 32) as i64) as i32
    }
}

impl JavaHash for f32 {
    fn java_hash(&self) -> i32 {
        canonical_f32_bits(*self) as i32
    }
}

impl JavaHash for f64 {
    fn java_hash(&self) -> i32 {
        (canonical_f64_bits(*self) as i64).java_hash()
    }
}

impl JavaHash for str {
    fn java_hash(&self) -> i32 {
        self.encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
    }
}

impl JavaHash for String {
    fn java_hash(&self) -> i32 {
        self.as_str().java_hash()
    }
}

impl JavaHash for DateTime<Utc> {
    /// Hashes the millisecond value, matching `java.util.Date`.
    fn java_hash(&self) -> i32 {
        self.timestamp_millis().java_hash()
    }
}

impl<T: JavaHash> JavaHash for [T] {
    fn java_hash(&self) -> i32 {
        hash_ordered(self.iter().map(JavaHash::java_hash))
    }
}

impl<T: JavaHash> JavaHash for Vec<T> {
    fn java_hash(&self) -> i32 {
        self.as_slice().java_hash()
    }
}

impl<T: JavaHash> JavaHash for Option<T> {
    fn java_hash(&self) -> i32 {
        self.as_ref().map_or(0, JavaHash::java_hash)
    }
}

/// `List.hashCode`: seeded at 1, `31 * h + element` per element.
pub fn hash_ordered<I: IntoIterator<Item = i32>>(hashes: I) -> i32 {
    hashes
        .into_iter()
        .fold(1i32, |h, e| h.wrapping_mul(31).wrapping_add(e))
}

/// `Set.hashCode`: the wrapping sum of element hashes.
pub fn hash_unordered<I: IntoIterator<Item = i32>>(hashes: I) -> i32 {
    hashes.into_iter().fold(0i32, i32::wrapping_add)
}

/// `Map.hashCode`: the wrapping sum of `hash(key) ^ hash(value)`.
pub fn hash_map_entries<I: IntoIterator<Item = (i32, i32)>>(entries: I) -> i32 {
    entries
        .into_iter()
        .fold(0i32, |h, (k, v)| h.wrapping_add(k ^ v))
}

/// `Arrays.hashCode(byte[])`.
pub fn hash_bytes(bytes: &[u8]) -> i32 {
    hash_ordered(bytes.iter().map(JavaHash::java_hash))
}
