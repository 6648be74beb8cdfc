//! Modified UTF-8 text encoding.
//!
//! Text is processed as UTF-16 code units, each encoded on its own: `0x0000`
//! becomes `C0 80`, units below `0x80` take one byte, below `0x800` two bytes
//! and everything else (surrogates included) three bytes. Supplementary
//! characters therefore occupy six bytes as an encoded surrogate pair.

use crate::error::{GeodeError, Result};

/// Largest encoded length a 16-bit length prefix can describe.
pub const MAX_UTF_LEN: usize = 0xFFFF;

#[inline]
fn unit_len(unit: u16) -> usize {
    match unit {
        0 => 2,
        1..=0x7F => 1,
        0x80..=0x7FF => 2,
        _ => 3,
    }
}

#[inline]
fn push_unit(out: &mut Vec<u8>, unit: u16) {
    match unit {
        1..=0x7F => out.push(unit as u8),
        0 | 0x80..=0x7FF => {
            out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
            out.push(0x80 | (unit & 0x3F) as u8);
        }
        _ => {
            out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
            out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
            out.push(0x80 | (unit & 0x3F) as u8);
        }
    }
}

/// Returns the number of bytes `s` occupies in modified UTF-8.
pub fn encoded_len(s: &str) -> usize {
    s.encode_utf16().map(unit_len).sum()
}

/// Returns true when every UTF-16 unit of `s` encodes as a single byte.
///
/// NUL needs the two-byte escape, so strings containing it are not ASCII here.
pub fn is_single_byte(s: &str) -> bool {
    s.bytes().all(|b| (1..0x80).contains(&b))
}

/// Appends the modified UTF-8 encoding of `s` to `out`.
pub fn encode_into(s: &str, out: &mut Vec<u8>) {
    out.reserve(encoded_len(s));
    for unit in s.encode_utf16() {
        push_unit(out, unit);
    }
}

/// Encodes `s`, dropping trailing characters that would push the encoding
/// past `max_len` bytes. Characters are never split.
pub fn encode_truncated(s: &str, max_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(s).min(max_len));
    let mut units = [0u16; 2];
    for ch in s.chars() {
        let encoded = ch.encode_utf16(&mut units);
        let needed: usize = encoded.iter().copied().map(unit_len).sum();
        if out.len() + needed > max_len {
            break;
        }
        for unit in encoded.iter().copied() {
            push_unit(&mut out, unit);
        }
    }
    out
}

/// Decodes modified UTF-8 bytes into a string.
///
/// Malformed sequences and unpaired surrogates are protocol errors.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        let unit = if b0 & 0x80 == 0 {
            i += 1;
            b0 as u16
        } else if b0 & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            i += 2;
            (((b0 & 0x1F) as u16) << 6) | b1
        } else if b0 & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            i += 3;
            (((b0 & 0x0F) as u16) << 12) | (b1 << 6) | b2
        } else {
            return Err(GeodeError::Protocol(format!(
                "invalid modified UTF-8 lead byte {b0:#04x} at offset {i}"
            )));
        };
        units.push(unit);
    }
    decode_units(&units)
}

fn continuation(bytes: &[u8], at: usize) -> Result<u16> {
    match bytes.get(at) {
        Some(b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
        Some(b) => Err(GeodeError::Protocol(format!(
            "invalid modified UTF-8 continuation byte {b:#04x} at offset {at}"
        ))),
        None => Err(GeodeError::Protocol(
            "truncated modified UTF-8 sequence".to_string(),
        )),
    }
}

/// Builds a string from UTF-16 units, rejecting unpaired surrogates.
pub fn decode_units(units: &[u16]) -> Result<String> {
    String::from_utf16(units)
        .map_err(|e| GeodeError::Protocol(format!("invalid UTF-16 text: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        encode_into(s, &mut out);
        out
    }

    #[test]
    fn test_nul_uses_two_byte_escape() {
        assert_eq!(encode("\0"), vec![0xC0, 0x80]);
        assert_eq!(encoded_len("\0"), 2);
        assert_eq!(decode(&[0xC0, 0x80]).unwrap(), "\0");
    }

    #[test]
    fn test_ascii_is_one_byte_per_char() {
        assert_eq!(encode("abc"), b"abc".to_vec());
        assert!(is_single_byte("abc"));
        assert!(!is_single_byte("a\0c"));
    }

    #[test]
    fn test_two_and_three_byte_units() {
        assert_eq!(encode("é"), vec![0xC3, 0xA9]);
        assert_eq!(encode("€"), vec![0xE2, 0x82, 0xAC]);
        assert_eq!(encoded_len("é€"), 5);
    }

    #[test]
    fn test_supplementary_char_is_surrogate_pair() {
        let bytes = encode("😀");
        assert_eq!(bytes.len(), 6);
        assert_eq!(bytes, vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]);
        assert_eq!(decode(&bytes).unwrap(), "😀");
    }

    #[test]
    fn test_truncation_keeps_whole_characters() {
        let s = "ab€";
        assert_eq!(encode_truncated(s, 4), b"ab".to_vec());
        assert_eq!(encode_truncated(s, 5), encode(s));
        assert_eq!(encode_truncated("😀x", 5), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_rejects_bad_lead_byte() {
        assert!(decode(&[0xF8]).is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_sequence() {
        let err = decode(&[0xE2, 0x82]).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_decode_rejects_lone_surrogate() {
        assert!(decode(&[0xED, 0xA0, 0xBD]).is_err());
    }
}
