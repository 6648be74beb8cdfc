//! Data output traits and implementations for Geode serialization.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::ds_code::DsCode;
use super::mutf8::{self, MAX_UTF_LEN};
use super::registry::TypeRegistry;
use super::value::CacheableValue;
use crate::error::{GeodeError, Result};

/// Java's canonical float NaN.
pub const CANONICAL_NAN_F32: u32 = 0x7fc0_0000;
/// Java's canonical double NaN.
pub const CANONICAL_NAN_F64: u64 = 0x7ff8_0000_0000_0000;

pub(crate) const DEFAULT_CAPACITY: usize = 256;
const GROWTH_QUANTUM: usize = 8192;
pub(crate) const DEFAULT_MAX_CAPACITY: usize = i32::MAX as usize;

/// Returns the bits of `v`, with every NaN collapsed to the canonical pattern.
pub fn canonical_f32_bits(v: f32) -> u32 {
    if v.is_nan() {
        CANONICAL_NAN_F32
    } else {
        v.to_bits()
    }
}

/// Returns the bits of `v`, with every NaN collapsed to the canonical pattern.
pub fn canonical_f64_bits(v: f64) -> u64 {
    if v.is_nan() {
        CANONICAL_NAN_F64
    } else {
        v.to_bits()
    }
}

/// Trait for writing primitive values in Geode's binary format.
///
/// All multi-byte values are written in big-endian byte order.
pub trait DataOutput {
    /// Writes a single byte (i8).
    fn write_byte(&mut self, v: i8) -> Result<()>;

    /// Writes a boolean as a single byte (0 for false, 1 for true).
    fn write_bool(&mut self, v: bool) -> Result<()>;

    /// Writes a 16-bit signed integer.
    fn write_short(&mut self, v: i16) -> Result<()>;

    /// Writes a UTF-16 code unit.
    fn write_char(&mut self, v: u16) -> Result<()>;

    /// Writes a 32-bit signed integer.
    fn write_int(&mut self, v: i32) -> Result<()>;

    /// Writes a 64-bit signed integer.
    fn write_long(&mut self, v: i64) -> Result<()>;

    /// Writes a 32-bit float; NaN is written as `0x7fc00000`.
    fn write_float(&mut self, v: f32) -> Result<()>;

    /// Writes a 64-bit float; NaN is written as `0x7ff8000000000000`.
    fn write_double(&mut self, v: f64) -> Result<()>;

    /// Writes raw bytes without a length prefix.
    fn write_bytes_only(&mut self, v: &[u8]) -> Result<()>;

    /// Writes an array length; `None` writes the null marker.
    fn write_array_len(&mut self, len: Option<usize>) -> Result<()>;

    /// Writes a byte array with its array-length prefix.
    fn write_bytes(&mut self, v: Option<&[u8]>) -> Result<()> {
        match v {
            None => self.write_array_len(None),
            Some(bytes) => {
                self.write_array_len(Some(bytes.len()))?;
                self.write_bytes_only(bytes)
            }
        }
    }

    /// Writes modified UTF-8 with a 16-bit length, truncating at 65,535 bytes.
    fn write_utf(&mut self, v: &str) -> Result<()>;

    /// Writes text as a 32-bit unit count followed by UTF-16 units.
    fn write_utf_huge(&mut self, v: &str) -> Result<()>;

    /// Writes a string preceded by the type code matching its encoded size.
    fn write_string(&mut self, v: Option<&str>) -> Result<()>;
}

/// A buffer-based implementation of `DataOutput`.
///
/// The cursor may be moved back over already-written bytes to backfill a
/// placeholder; [`len`](Self::len) always reports the furthest byte written.
pub struct ObjectDataOutput {
    buffer: BytesMut,
    cursor: usize,
    max_capacity: usize,
    registry: Option<Arc<TypeRegistry>>,
}

impl ObjectDataOutput {
    /// Creates a new `ObjectDataOutput` with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a new `ObjectDataOutput` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            cursor: 0,
            max_capacity: DEFAULT_MAX_CAPACITY,
            registry: None,
        }
    }

    /// Creates an output bound to a session registry, needed for PDX values.
    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        let mut output = Self::new();
        output.registry = Some(registry);
        output
    }

    /// Binds the output to a session registry.
    pub fn set_registry(&mut self, registry: Arc<TypeRegistry>) {
        self.registry = Some(registry);
    }

    /// Sets the capacity ceiling past which writes fail with `OutOfMemory`.
    pub fn set_max_capacity(&mut self, max_capacity: usize) {
        self.max_capacity = max_capacity;
    }

    /// Returns the bound registry, if any.
    pub fn registry(&self) -> Option<&Arc<TypeRegistry>> {
        self.registry.as_ref()
    }

    /// Returns the written bytes as a slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the cursor position.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Returns the current buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Clears the buffer, removing all written data.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Makes room for `additional` bytes past the cursor.
    ///
    /// Capacity grows geometrically; growth beyond the configured ceiling
    /// fails with [`GeodeError::OutOfMemory`].
    pub fn ensure_capacity(&mut self, additional: usize) -> Result<()> {
        let required = self
            .cursor
            .checked_add(additional)
            .ok_or(GeodeError::OutOfMemory {
                requested: usize::MAX,
                limit: self.max_capacity,
            })?;
        if required > self.max_capacity {
            return Err(GeodeError::OutOfMemory {
                requested: required,
                limit: self.max_capacity,
            });
        }
        if required <= self.buffer.capacity() {
            return Ok(());
        }
        let grown = self
            .buffer
            .capacity()
            .saturating_mul(2)
            .saturating_add(GROWTH_QUANTUM * (additional / GROWTH_QUANTUM));
        let target = grown.max(required).min(self.max_capacity);
        self.buffer.reserve(target - self.buffer.len());
        Ok(())
    }

    /// Moves the cursor forward, zero-filling any bytes not yet written.
    pub fn advance_cursor(&mut self, n: usize) -> Result<()> {
        self.ensure_capacity(n)?;
        self.cursor += n;
        if self.cursor > self.buffer.len() {
            self.buffer.resize(self.cursor, 0);
        }
        Ok(())
    }

    /// Moves the cursor back so a placeholder can be overwritten.
    pub fn rewind_cursor(&mut self, n: usize) -> Result<()> {
        if n > self.cursor {
            return Err(GeodeError::Protocol(format!(
                "cannot rewind {n} bytes from position {}",
                self.cursor
            )));
        }
        self.cursor -= n;
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_capacity(bytes.len())?;
        let len = self.buffer.len();
        if self.cursor == len {
            self.buffer.extend_from_slice(bytes);
        } else {
            let overlap = (len - self.cursor).min(bytes.len());
            self.buffer[self.cursor..self.cursor + overlap].copy_from_slice(&bytes[..overlap]);
            self.buffer.extend_from_slice(&bytes[overlap..]);
        }
        self.cursor += bytes.len();
        Ok(())
    }

    /// Writes a single DSCode byte.
    pub fn write_ds_code(&mut self, code: DsCode) -> Result<()> {
        self.put(&[code.id()])
    }

    /// Writes a value with its leading type identifier; `None` writes `NullObj`.
    pub fn write_object(&mut self, value: Option<&CacheableValue>) -> Result<()> {
        super::builtins::write_value(self, value)
    }
}

impl Default for ObjectDataOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectDataOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDataOutput")
            .field("len", &self.buffer.len())
            .field("cursor", &self.cursor)
            .field("capacity", &self.buffer.capacity())
            .field("has_registry", &self.registry.is_some())
            .finish()
    }
}

impl DataOutput for ObjectDataOutput {
    fn write_byte(&mut self, v: i8) -> Result<()> {
        self.put(&v.to_be_bytes())
    }

    fn write_bool(&mut self, v: bool) -> Result<()> {
        self.put(&[if v { 1 } else { 0 }])
    }

    fn write_short(&mut self, v: i16) -> Result<()> {
        self.put(&v.to_be_bytes())
    }

    fn write_char(&mut self, v: u16) -> Result<()> {
        self.put(&v.to_be_bytes())
    }

    fn write_int(&mut self, v: i32) -> Result<()> {
        self.put(&v.to_be_bytes())
    }

    fn write_long(&mut self, v: i64) -> Result<()> {
        self.put(&v.to_be_bytes())
    }

    fn write_float(&mut self, v: f32) -> Result<()> {
        self.put(&canonical_f32_bits(v).to_be_bytes())
    }

    fn write_double(&mut self, v: f64) -> Result<()> {
        self.put(&canonical_f64_bits(v).to_be_bytes())
    }

    fn write_bytes_only(&mut self, v: &[u8]) -> Result<()> {
        self.put(v)
    }

    fn write_array_len(&mut self, len: Option<usize>) -> Result<()> {
        match len {
            None => self.put(&[0xFF]),
            Some(n) if n <= 252 => self.put(&[n as u8]),
            Some(n) if n <= 0xFFFF => {
                self.put(&[0xFE])?;
                self.put(&(n as u16).to_be_bytes())
            }
            Some(n) => {
                let n = i32::try_from(n).map_err(|_| {
                    GeodeError::MalformedHeader(format!("array length {n} exceeds i32::MAX"))
                })?;
                self.put(&[0xFD])?;
                self.put(&n.to_be_bytes())
            }
        }
    }

    fn write_utf(&mut self, v: &str) -> Result<()> {
        let encoded = mutf8::encode_truncated(v, MAX_UTF_LEN);
        if encoded.len() < mutf8::encoded_len(v) {
            tracing::debug!(
                original = mutf8::encoded_len(v),
                kept = encoded.len(),
                "truncated string to fit a 16-bit length"
            );
        }
        self.put(&(encoded.len() as u16).to_be_bytes())?;
        self.put(&encoded)
    }

    fn write_utf_huge(&mut self, v: &str) -> Result<()> {
        let units: Vec<u16> = v.encode_utf16().collect();
        let count = i32::try_from(units.len()).map_err(|_| {
            GeodeError::MalformedHeader(format!("string of {} units is too long", units.len()))
        })?;
        self.ensure_capacity(4 + units.len() * 2)?;
        self.write_int(count)?;
        for unit in units {
            self.write_char(unit)?;
        }
        Ok(())
    }

    fn write_string(&mut self, v: Option<&str>) -> Result<()> {
        let Some(s) = v else {
            return self.write_ds_code(DsCode::CacheableNullString);
        };
        let len = mutf8::encoded_len(s);
        let single_byte = mutf8::is_single_byte(s);
        if len > MAX_UTF_LEN {
            if single_byte {
                let count = i32::try_from(len).map_err(|_| {
                    GeodeError::MalformedHeader(format!("string of {len} bytes is too long"))
                })?;
                self.write_ds_code(DsCode::CacheableAsciiStringHuge)?;
                self.write_int(count)?;
                self.put(s.as_bytes())
            } else {
                self.write_ds_code(DsCode::CacheableStringHuge)?;
                self.write_utf_huge(s)
            }
        } else {
            let code = if single_byte {
                DsCode::CacheableAsciiString
            } else {
                DsCode::CacheableString
            };
            self.write_ds_code(code)?;
            let mut encoded = Vec::with_capacity(len);
            mutf8::encode_into(s, &mut encoded);
            self.put(&(len as u16).to_be_bytes())?;
            self.put(&encoded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_output_is_empty() {
        let output = ObjectDataOutput::new();
        assert!(output.is_empty());
        assert_eq!(output.len(), 0);
        assert_eq!(output.position(), 0);
    }

    #[test]
    fn test_write_byte_negative() {
        let mut output = ObjectDataOutput::new();
        output.write_byte(-1).unwrap();
        assert_eq!(output.as_bytes(), &[0xFF]);
    }

    #[test]
    fn test_write_bool() {
        let mut output = ObjectDataOutput::new();
        output.write_bool(true).unwrap();
        output.write_bool(false).unwrap();
        assert_eq!(output.as_bytes(), &[1, 0]);
    }

    #[test]
    fn test_write_int_big_endian() {
        let mut output = ObjectDataOutput::new();
        output.write_int(0x01020304).unwrap();
        assert_eq!(output.as_bytes(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_write_long_big_endian() {
        let mut output = ObjectDataOutput::new();
        output.write_long(0x0102030405060708).unwrap();
        assert_eq!(
            output.as_bytes(),
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );
    }

    #[test]
    fn test_write_float_canonicalizes_nan() {
        let mut output = ObjectDataOutput::new();
        output.write_float(f32::from_bits(0x7fc0_0001)).unwrap();
        output.write_float(f32::from_bits(0xffc0_0000)).unwrap();
        assert_eq!(output.as_bytes(), &[0x7f, 0xc0, 0, 0, 0x7f, 0xc0, 0, 0]);
    }

    #[test]
    fn test_write_double_canonicalizes_nan() {
        let mut output = ObjectDataOutput::new();
        output.write_double(f64::from_bits(0xfff8_0000_0000_0001)).unwrap();
        assert_eq!(output.as_bytes(), &[0x7f, 0xf8, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_array_len_tiers() {
        let cases: [(Option<usize>, &[u8]); 6] = [
            (None, &[0xFF]),
            (Some(0), &[0x00]),
            (Some(252), &[0xFC]),
            (Some(253), &[0xFE, 0x00, 0xFD]),
            (Some(65535), &[0xFE, 0xFF, 0xFF]),
            (Some(65536), &[0xFD, 0x00, 0x01, 0x00, 0x00]),
        ];
        for (len, expected) in cases {
            let mut output = ObjectDataOutput::new();
            output.write_array_len(len).unwrap();
            assert_eq!(output.as_bytes(), expected, "len {len:?}");
        }
    }

    #[test]
    fn test_write_bytes_null_and_empty() {
        let mut output = ObjectDataOutput::new();
        output.write_bytes(None).unwrap();
        output.write_bytes(Some(&[])).unwrap();
        output.write_bytes(Some(&[7, 8])).unwrap();
        assert_eq!(output.as_bytes(), &[0xFF, 0x00, 0x02, 7, 8]);
    }

    #[test]
    fn test_write_utf_nul_escape() {
        let mut output = ObjectDataOutput::new();
        output.write_utf("\0").unwrap();
        assert_eq!(output.as_bytes(), &[0x00, 0x02, 0xC0, 0x80]);
    }

    #[test]
    fn test_write_utf_truncates_at_encoded_limit() {
        let mut output = ObjectDataOutput::new();
        let text = "é".repeat(40_000);
        output.write_utf(&text).unwrap();
        assert_eq!(&output.as_bytes()[..2], &[0xFF, 0xFE]);
        assert_eq!(output.len(), 2 + 65534);
    }

    #[test]
    fn test_write_string_picks_ascii_code() {
        let mut output = ObjectDataOutput::new();
        output.write_string(Some("hi")).unwrap();
        assert_eq!(output.as_bytes(), &[87, 0x00, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_write_string_picks_utf_code_for_nul() {
        let mut output = ObjectDataOutput::new();
        output.write_string(Some("\0")).unwrap();
        assert_eq!(output.as_bytes(), &[42, 0x00, 0x02, 0xC0, 0x80]);
    }

    #[test]
    fn test_write_string_null() {
        let mut output = ObjectDataOutput::new();
        output.write_string(None).unwrap();
        assert_eq!(output.as_bytes(), &[69]);
    }

    #[test]
    fn test_write_string_huge_ascii() {
        let mut output = ObjectDataOutput::new();
        let text = "a".repeat(70_000);
        output.write_string(Some(&text)).unwrap();
        assert_eq!(output.as_bytes()[0], 88);
        assert_eq!(&output.as_bytes()[1..5], &70_000i32.to_be_bytes());
        assert_eq!(output.len(), 5 + 70_000);
    }

    #[test]
    fn test_write_string_huge_utf16() {
        let mut output = ObjectDataOutput::new();
        let text = "€".repeat(30_000);
        output.write_string(Some(&text)).unwrap();
        assert_eq!(output.as_bytes()[0], 89);
        assert_eq!(&output.as_bytes()[1..5], &30_000i32.to_be_bytes());
        assert_eq!(&output.as_bytes()[5..7], &[0x20, 0xAC]);
    }

    #[test]
    fn test_placeholder_backfill() {
        let mut output = ObjectDataOutput::new();
        output.write_byte(9).unwrap();
        output.advance_cursor(4).unwrap();
        output.write_short(0x0102).unwrap();
        output.rewind_cursor(6).unwrap();
        output.write_int(2).unwrap();
        output.advance_cursor(2).unwrap();
        assert_eq!(output.as_bytes(), &[9, 0, 0, 0, 2, 1, 2]);
        assert_eq!(output.position(), 7);
    }

    #[test]
    fn test_rewind_past_start_fails() {
        let mut output = ObjectDataOutput::new();
        output.write_byte(1).unwrap();
        assert!(output.rewind_cursor(2).is_err());
    }

    #[test]
    fn test_growth_is_geometric() {
        let mut output = ObjectDataOutput::with_capacity(16);
        for i in 0..100 {
            output.write_int(i).unwrap();
        }
        assert_eq!(output.len(), 400);
        assert!(output.capacity() >= 400);
    }

    #[test]
    fn test_out_of_memory_past_ceiling() {
        let mut output = ObjectDataOutput::with_capacity(8);
        output.set_max_capacity(16);
        output.write_long(1).unwrap();
        output.write_long(2).unwrap();
        let err = output.write_byte(3).unwrap_err();
        assert!(err.is_resource());
        assert_eq!(output.len(), 16);
    }

    #[test]
    fn test_into_bytes() {
        let mut output = ObjectDataOutput::new();
        output.write_short(7).unwrap();
        let bytes = output.into_bytes();
        assert_eq!(&bytes[..], &[0, 7]);
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut output = ObjectDataOutput::new();
        output.write_int(1).unwrap();
        output.clear();
        assert!(output.is_empty());
        assert_eq!(output.position(), 0);
    }
}
