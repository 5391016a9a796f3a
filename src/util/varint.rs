//! Variable-length integer encoding utilities.
//!
//! Seven payload bits per byte with a continuation bit, least significant
//! group first. Used for doc id deltas, position deltas and length prefixes
//! throughout the segment files.

use std::io::Write;

use crate::error::{GlaiveError, Result};

/// Encode a u64 value using variable-length encoding.
pub fn encode_u64(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    let mut val = value;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80;
        }

        bytes.push(byte);

        if val == 0 {
            break;
        }
    }

    bytes
}

/// Decode a u64 value from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_u64(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;

    for (index, &byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return Err(GlaiveError::other("VarInt overflow"));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok((result, index + 1));
        }

        shift += 7;
    }

    Err(GlaiveError::other("Incomplete VarInt"))
}

/// Write a variable-length encoded u64 to a writer.
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<usize> {
    let bytes = encode_u64(value);
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_values_use_one_byte() {
        assert_eq!(encode_u64(0), vec![0]);
        assert_eq!(encode_u64(127), vec![127]);
        assert_eq!(encode_u64(128), vec![0x80, 0x01]);
    }

    #[test]
    fn test_decode_reports_consumed_bytes() {
        let mut bytes = encode_u64(300);
        bytes.push(0xFF);

        let (value, read) = decode_u64(&bytes).unwrap();
        assert_eq!(value, 300);
        assert_eq!(read, 2);
    }

    #[test]
    fn test_incomplete_varint() {
        assert!(decode_u64(&[0x80, 0x80]).is_err());
    }

    #[test]
    fn test_large_value() {
        let bytes = encode_u64(u64::MAX);
        assert_eq!(bytes.len(), 10);
        assert_eq!(decode_u64(&bytes).unwrap().0, u64::MAX);
    }
}
