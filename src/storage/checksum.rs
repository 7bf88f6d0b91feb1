//! CRC32 over the persisted position-container file
//!
//! The checksum covers the header fields and the position body together, so a
//! torn write of either is detected on open.

use crc32fast::Hasher;

/// Computes a CRC32 over the concatenation of `parts`.
pub fn checksum_parts(parts: &[&[u8]]) -> u32 {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize()
}

/// Returns whether `parts` hash to `expected`.
pub fn verify_parts(parts: &[&[u8]], expected: u32) -> bool {
    checksum_parts(parts) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_does_not_change_checksum() {
        let whole = checksum_parts(&[&b"header-and-body"[..]]);
        let split = checksum_parts(&[&b"header"[..], &b"-and-"[..], &b"body"[..]]);
        assert_eq!(whole, split);
    }

    #[test]
    fn test_detects_flipped_bit() {
        let mut body = vec![1u8, 2, 3, 4, 5];
        let expected = checksum_parts(&[&b"hdr"[..], &body[..]]);
        body[3] ^= 0x10;
        assert!(!verify_parts(&[&b"hdr"[..], &body[..]], expected));
    }

    #[test]
    fn test_empty_input() {
        let empty: &[u8] = b"";
        assert!(verify_parts(&[], checksum_parts(&[empty])));
    }
}
