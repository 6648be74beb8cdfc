//! Data input traits and implementations for Geode serialization.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use bytes::Buf;

use super::ds_code::DsCode;
use super::mutf8;
use super::registry::TypeRegistry;
use super::value::CacheableValue;
use crate::error::{GeodeError, Result};

/// Nesting limit for objects inside objects.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Trait for reading primitive values from Geode's binary format.
///
/// All multi-byte values are read in big-endian byte order. Reading past the
/// end of the buffer fails with [`GeodeError::BufferUnderflow`]. A failed
/// read of one primitive, length, byte array or string consumes nothing,
/// including any length prefix it had already read.
pub trait DataInput {
    /// Reads a single byte (i8).
    fn read_byte(&mut self) -> Result<i8>;

    /// Reads a boolean from a single byte.
    fn read_bool(&mut self) -> Result<bool>;

    /// Reads a 16-bit signed integer.
    fn read_short(&mut self) -> Result<i16>;

    /// Reads a UTF-16 code unit.
    fn read_char(&mut self) -> Result<u16>;

    /// Reads a 32-bit signed integer.
    fn read_int(&mut self) -> Result<i32>;

    /// Reads a 64-bit signed integer.
    fn read_long(&mut self) -> Result<i64>;

    /// Reads a 32-bit floating point.
    fn read_float(&mut self) -> Result<f32>;

    /// Reads a 64-bit floating point.
    fn read_double(&mut self) -> Result<f64>;

    /// Reads the specified number of raw bytes.
    fn read_bytes_only(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Reads an array length; `None` is the null marker.
    fn read_array_len(&mut self) -> Result<Option<usize>>;

    /// Reads a byte array with its array-length prefix.
    fn read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.read_array_len()? {
            None => Ok(None),
            Some(len) => self.read_bytes_only(len).map(Some),
        }
    }

    /// Reads modified UTF-8 text with a 16-bit length.
    fn read_utf(&mut self) -> Result<String>;

    /// Reads text as a 32-bit unit count followed by UTF-16 units.
    fn read_utf_huge(&mut self) -> Result<String>;

    /// Reads a string preceded by its type code.
    fn read_string(&mut self) -> Result<Option<String>>;
}

/// A buffer-based implementation of `DataInput`.
///
/// The input borrows the caller's buffer and never copies it.
pub struct ObjectDataInput<'a> {
    cursor: Cursor<&'a [u8]>,
    registry: Option<Arc<TypeRegistry>>,
    depth: usize,
}

impl<'a> ObjectDataInput<'a> {
    /// Creates a new `ObjectDataInput` from the given byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            registry: None,
            depth: 0,
        }
    }

    /// Creates an input that can decode objects through `registry`.
    pub fn with_registry(data: &'a [u8], registry: Arc<TypeRegistry>) -> Self {
        Self {
            cursor: Cursor::new(data),
            registry: Some(registry),
            depth: 0,
        }
    }

    /// Returns the bound registry, if any.
    pub fn registry(&self) -> Option<&Arc<TypeRegistry>> {
        self.registry.as_ref()
    }

    /// Returns the number of bytes remaining to be read.
    pub fn bytes_remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Returns the number of bytes consumed so far.
    pub fn bytes_read(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Skips `n` bytes.
    pub fn advance_cursor(&mut self, n: usize) -> Result<()> {
        self.ensure_remaining(n)?;
        self.cursor.advance(n);
        Ok(())
    }

    /// Steps back over `n` already-read bytes.
    pub fn rewind_cursor(&mut self, n: usize) -> Result<()> {
        let position = self.bytes_read();
        if n > position {
            return Err(GeodeError::Protocol(format!(
                "cannot rewind {n} bytes from position {position}"
            )));
        }
        self.cursor.set_position((position - n) as u64);
        Ok(())
    }

    /// Returns the cursor to the start of the buffer.
    pub fn reset(&mut self) {
        self.cursor.set_position(0);
    }

    /// Borrows the next `len` bytes without copying them.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure_remaining(len)?;
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = self.bytes_read();
        self.cursor.advance(len);
        Ok(&data[start..start + len])
    }

    /// Fails unless at least `n` more bytes are available.
    pub fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.cursor.remaining() < n {
            Err(GeodeError::BufferUnderflow {
                needed: n,
                remaining: self.cursor.remaining(),
            })
        } else {
            Ok(())
        }
    }

    /// Fails unless `count` elements of `width` bytes each could still follow.
    pub fn ensure_elements(&self, count: usize, width: usize) -> Result<()> {
        let needed = count.checked_mul(width).ok_or(GeodeError::BufferUnderflow {
            needed: usize::MAX,
            remaining: self.cursor.remaining(),
        })?;
        self.ensure_remaining(needed)
    }

    /// Reads a single DSCode byte.
    pub fn read_ds_code(&mut self) -> Result<DsCode> {
        let raw = self.read_byte()? as u8;
        DsCode::from_id(raw).ok_or_else(|| {
            tracing::error!(code = raw, "unregistered DSCode during deserialization");
            GeodeError::UnknownTypeId(format!("DSCode {raw}"))
        })
    }

    /// Reads a value with its leading type identifier.
    ///
    /// Requires a bound registry; `NullObj` yields `None`.
    pub fn read_object(&mut self) -> Result<Option<CacheableValue>> {
        let registry = self.registry.clone().ok_or_else(|| {
            GeodeError::Configuration("no type registry bound to this input".to_string())
        })?;
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(GeodeError::Protocol(format!(
                "object nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let result = registry.read_object(self);
        self.depth -= 1;
        result
    }

    /// Runs `read`, restoring the position when it fails.
    fn atomically<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let position = self.cursor.position();
        let result = read(self);
        if result.is_err() {
            self.cursor.set_position(position);
        }
        result
    }

    fn parse_array_len(&mut self) -> Result<Option<usize>> {
        self.ensure_remaining(1)?;
        match self.cursor.get_u8() {
            0xFF => Ok(None),
            n @ 0..=252 => Ok(Some(n as usize)),
            0xFE => {
                self.ensure_remaining(2)?;
                Ok(Some(self.cursor.get_u16() as usize))
            }
            0xFD => {
                let len = self.read_int()?;
                usize::try_from(len).map(Some).map_err(|_| {
                    GeodeError::MalformedHeader(format!("negative array length {len}"))
                })
            }
        }
    }

    fn parse_utf(&mut self) -> Result<String> {
        self.ensure_remaining(2)?;
        let len = self.cursor.get_u16() as usize;
        let bytes = self.read_slice(len)?;
        mutf8::decode(bytes)
    }

    fn parse_utf_huge(&mut self) -> Result<String> {
        let count = self.read_int()?;
        let count = usize::try_from(count)
            .map_err(|_| GeodeError::MalformedHeader(format!("negative string length {count}")))?;
        self.ensure_elements(count, 2)?;
        let units: Vec<u16> = (0..count).map(|_| self.cursor.get_u16()).collect();
        mutf8::decode_units(&units)
    }

    fn parse_string(&mut self) -> Result<Option<String>> {
        match self.read_ds_code()? {
            DsCode::CacheableNullString | DsCode::NullObj => Ok(None),
            DsCode::CacheableString | DsCode::CacheableAsciiString => self.parse_utf().map(Some),
            DsCode::CacheableAsciiStringHuge => self.read_ascii_huge().map(Some),
            DsCode::CacheableStringHuge => self.parse_utf_huge().map(Some),
            other => Err(GeodeError::MalformedHeader(format!(
                "expected a string type code, found {other}"
            ))),
        }
    }

    fn read_ascii_huge(&mut self) -> Result<String> {
        let len = self.read_int()?;
        let len = usize::try_from(len)
            .map_err(|_| GeodeError::MalformedHeader(format!("negative string length {len}")))?;
        let bytes = self.read_slice(len)?;
        if !bytes.is_ascii() {
            return Err(GeodeError::Protocol(
                "non-ASCII byte in ASCII string".to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl fmt::Debug for ObjectDataInput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDataInput")
            .field("position", &self.bytes_read())
            .field("remaining", &self.bytes_remaining())
            .field("has_registry", &self.registry.is_some())
            .finish()
    }
}

impl DataInput for ObjectDataInput<'_> {
    fn read_byte(&mut self) -> Result<i8> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_i8())
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.ensure_remaining(1)?;
        Ok(self.cursor.get_u8() != 0)
    }

    fn read_short(&mut self) -> Result<i16> {
        self.ensure_remaining(2)?;
        Ok(self.cursor.get_i16())
    }

    fn read_char(&mut self) -> Result<u16> {
        self.ensure_remaining(2)?;
        Ok(self.cursor.get_u16())
    }

    fn read_int(&mut self) -> Result<i32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_i32())
    }

    fn read_long(&mut self) -> Result<i64> {
        self.ensure_remaining(8)?;
        Ok(self.cursor.get_i64())
    }

    fn read_float(&mut self) -> Result<f32> {
        self.ensure_remaining(4)?;
        Ok(self.cursor.get_f32())
    }

    fn read_double(&mut self) -> Result<f64> {
        self.ensure_remaining(8)?;
        Ok(self.cursor.get_f64())
    }

    fn read_bytes_only(&mut self, len: usize) -> Result<Vec<u8>> {
        self.read_slice(len).map(<[u8]>::to_vec)
    }

    fn read_array_len(&mut self) -> Result<Option<usize>> {
        self.atomically(Self::parse_array_len)
    }

    fn read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        self.atomically(|input| match input.parse_array_len()? {
            None => Ok(None),
            Some(len) => input.read_bytes_only(len).map(Some),
        })
    }

    fn read_utf(&mut self) -> Result<String> {
        self.atomically(Self::parse_utf)
    }

    fn read_utf_huge(&mut self) -> Result<String> {
        self.atomically(Self::parse_utf_huge)
    }

    fn read_string(&mut self) -> Result<Option<String>> {
        self.atomically(Self::parse_string)
    }
}
