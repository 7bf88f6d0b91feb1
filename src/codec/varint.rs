//! Variable-length integer encoding for length prefixes
//!
//! Each byte carries 7 bits of payload, least significant group first, and
//! uses its high bit as a continuation flag. A `u64` therefore needs between
//! 1 and 10 bytes; lengths below 128 cost a single byte.

use bytes::BufMut;

use super::errors::{CodecError, CodecResult};

const DATA_BITS_PER_BYTE: u32 = 7;
const DATA_BITS_MASK: u8 = 0x7F;
const CONTINUATION_BIT_MASK: u8 = 0x80;

/// Longest valid encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Returns the number of bytes `write` emits for `value`.
pub fn size(value: u64) -> usize {
    let data_bits = u64::BITS - value.leading_zeros();
    usize::max(1, data_bits.div_ceil(DATA_BITS_PER_BYTE) as usize)
}

/// Writes `value` as a varint.
///
/// Panics if `buf` has fewer than `size(value)` bytes of room.
pub fn write(value: u64, buf: &mut impl BufMut) {
    if value < u64::from(CONTINUATION_BIT_MASK) {
        buf.put_u8(value as u8);
        return;
    }

    let mut val = value;
    while val >= u64::from(CONTINUATION_BIT_MASK) {
        buf.put_u8((val as u8 & DATA_BITS_MASK) | CONTINUATION_BIT_MASK);
        val >>= DATA_BITS_PER_BYTE;
    }
    buf.put_u8(val as u8);
}

/// Reads a varint from the front of `buf`, advancing it past the prefix.
pub fn read(buf: &mut &[u8]) -> CodecResult<u64> {
    let bytes: &[u8] = *buf;
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    for (consumed, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        // The tenth byte may only contribute the single remaining bit of a u64.
        // This also rejects a continuation bit on what must be the last byte.
        let remaining_bits = u64::BITS - shift;
        if remaining_bits <= DATA_BITS_PER_BYTE {
            let relevant_bits = u8::BITS - byte.leading_zeros();
            if relevant_bits > remaining_bits {
                return Err(CodecError::InvalidVarint);
            }
        }

        result |= u64::from(byte & DATA_BITS_MASK) << shift;

        if byte & CONTINUATION_BIT_MASK == 0 {
            *buf = &bytes[consumed + 1..];
            return Ok(result);
        }
        shift += DATA_BITS_PER_BYTE;
    }

    Err(CodecError::EndOfBuffer {
        needed: bytes.len() + 1,
        remaining: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_sizes() {
        assert_eq!(size(0), 1);
        assert_eq!(size(127), 1);
        assert_eq!(size(128), 2);
        assert_eq!(size(0x3FFF), 2);
        assert_eq!(size(0x4000), 3);
        assert_eq!(size(u32::MAX as u64), 5);
        assert_eq!(size(u64::MAX), MAX_VARINT_LEN);
    }

    #[test]
    fn test_varint_boundaries() {
        let cases = [
            0u64,
            1,
            127,
            128,
            129,
            0xFF,
            0x100,
            0x3FFF,
            0x4000,
            0x1F_FFFF,
            0xFFFF_FFFF,
            0xFF_FFFF_FFFF_FFFF,
            u64::MAX,
        ];

        for &value in &cases {
            let mut encoded = Vec::new();
            write(value, &mut encoded);
            assert_eq!(encoded.len(), size(value), "size mismatch for {}", value);

            let mut cursor = &encoded[..];
            assert_eq!(read(&mut cursor).unwrap(), value);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn test_known_encoding() {
        let mut encoded = Vec::new();
        write(300, &mut encoded);
        assert_eq!(encoded, vec![0xAC, 0x02]);
    }

    #[test]
    fn test_read_leaves_trailing_bytes() {
        let data = [0x05, 0xAA, 0xBB];
        let mut cursor = &data[..];
        assert_eq!(read(&mut cursor).unwrap(), 5);
        assert_eq!(cursor, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_truncated_varint() {
        let data = [0x80, 0x80];
        let mut cursor = &data[..];
        assert!(matches!(
            read(&mut cursor),
            Err(CodecError::EndOfBuffer { .. })
        ));
    }

    #[test]
    fn test_overlong_varint_rejected() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02];
        let mut cursor = &data[..];
        assert_eq!(read(&mut cursor), Err(CodecError::InvalidVarint));

        let data = [0xFF; 11];
        let mut cursor = &data[..];
        assert_eq!(read(&mut cursor), Err(CodecError::InvalidVarint));
    }

    #[test]
    #[should_panic]
    fn test_write_into_short_slice_panics() {
        let mut storage = [0u8; 1];
        let mut out = &mut storage[..];
        write(300, &mut out);
    }
}
