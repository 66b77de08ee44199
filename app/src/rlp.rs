//! Minimal RLP encoder for hash preimages.
//!
//! Pure, stateless functions implementing the canonical Recursive
//! Length Prefix rules, restricted to what authorization preimages
//! need: byte-string numbers and short lists. Fixed-width fields such
//! as 20-byte addresses are encoded as literal strings; leading zero
//! bytes are never stripped from multi-byte inputs.

use alloc::vec::Vec;

const RLP_NUMBER8_MAX: u8 = 0x7F;
const RLP_STRING_BASE: u8 = 0x80;
const RLP_STRING_LONG_BASE: u8 = 0xB7;
const RLP_LIST_BASE: u8 = 0xC0;
const RLP_LIST_LONG_BASE: u8 = 0xF7;
const RLP_SHORT_MAX: usize = 55;

/// Encodes a byte string interpreted as a number.
///
/// A single `0` byte (or an empty input) encodes as the empty-string
/// marker `0x80`, the canonical encoding of the integer zero. A single
/// byte in `1..=0x7F` encodes as itself. Any other input of length
/// `n` encodes as `0x80 + n` followed by the bytes, unstripped.
pub fn encode_number(bytes: &[u8]) -> Vec<u8> {
    match bytes {
        [] | [0] => alloc::vec![RLP_STRING_BASE],
        [byte] if *byte <= RLP_NUMBER8_MAX => alloc::vec![*byte],
        _ => {
            let mut out = Vec::with_capacity(bytes.len() + 5);
            if bytes.len() <= RLP_SHORT_MAX {
                out.push(RLP_STRING_BASE + bytes.len() as u8);
            } else {
                let size = be_bytes(bytes.len() as u64);
                out.push(RLP_STRING_LONG_BASE + size.len() as u8);
                out.extend_from_slice(&size);
            }
            out.extend_from_slice(bytes);
            out
        }
    }
}

/// Length of [`encode_number`]'s output without producing it.
///
/// Needed to size a list header before encoding its elements.
pub fn encoded_number_length(bytes: &[u8]) -> usize {
    match bytes {
        [] | [_] => 1,
        _ if bytes.len() <= RLP_SHORT_MAX => bytes.len() + 1,
        _ => bytes.len() + 1 + be_bytes(bytes.len() as u64).len(),
    }
}

/// Size of the smallest big-endian representation of `n`.
///
/// The integer `0` has size 0: it is encoded as the empty string.
pub fn smallest_u64_size(n: u64) -> usize {
    if n == 0 {
        0
    } else {
        8 - n.leading_zeros() as usize / 8
    }
}

/// Encodes a u64 in its canonical minimal form.
pub fn encode_u64(n: u64) -> Vec<u8> {
    let size = smallest_u64_size(n);
    encode_number(&n.to_be_bytes()[8 - size..])
}

/// Length of [`encode_u64`]'s output without producing it.
pub fn encoded_u64_length(n: u64) -> usize {
    if n == 0 || n <= u64::from(RLP_NUMBER8_MAX) {
        1
    } else {
        smallest_u64_size(n) + 1
    }
}

/// Encodes a list header for a payload of `payload_size` bytes.
///
/// `payload_size <= 55` gives the one-byte header `0xC0 + size`;
/// larger payloads get the long form `0xF7 + n` followed by the
/// `n` big-endian size bytes.
pub fn encode_list_header(payload_size: usize) -> Vec<u8> {
    if payload_size <= RLP_SHORT_MAX {
        alloc::vec![RLP_LIST_BASE + payload_size as u8]
    } else {
        let size = be_bytes(payload_size as u64);
        let mut out = Vec::with_capacity(1 + size.len());
        out.push(RLP_LIST_LONG_BASE + size.len() as u8);
        out.extend_from_slice(&size);
        out
    }
}

/// Length of [`encode_list_header`]'s output without producing it.
pub fn encoded_list_header_length(payload_size: usize) -> usize {
    if payload_size <= RLP_SHORT_MAX {
        1
    } else {
        1 + be_bytes(payload_size as u64).len()
    }
}

/// Minimal big-endian byte representation of a nonzero value.
fn be_bytes(n: u64) -> Vec<u8> {
    let size = smallest_u64_size(n).max(1);
    n.to_be_bytes()[8 - size..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use proptest::prelude::*;

    #[test]
    fn test_zero_encodes_as_empty_string_marker() {
        assert_eq!(encode_number(&[0]), alloc::vec![0x80]);
        assert_eq!(encode_number(&[]), alloc::vec![0x80]);
        assert_eq!(encode_u64(0), alloc::vec![0x80]);
        assert_eq!(smallest_u64_size(0), 0);
    }

    #[test]
    fn test_single_byte_encodes_as_itself() {
        assert_eq!(encode_number(&[0x01]), alloc::vec![0x01]);
        assert_eq!(encode_number(&[0x7F]), alloc::vec![0x7F]);
        assert_eq!(encode_number(&[0x80]), alloc::vec![0x81, 0x80]);
    }

    #[test]
    fn test_fixed_width_strings_keep_leading_zeros() {
        let address = hex!("0000000000000000000000000000000000000001");
        let encoded = encode_number(&address);
        assert_eq!(encoded[0], 0x94);
        assert_eq!(&encoded[1..], &address);
        assert_eq!(encoded_number_length(&address), 21);
    }

    #[test]
    fn test_list_headers() {
        assert_eq!(encode_list_header(0), alloc::vec![0xC0]);
        assert_eq!(encode_list_header(23), alloc::vec![0xD7]);
        assert_eq!(encode_list_header(55), alloc::vec![0xF7]);
        assert_eq!(encode_list_header(56), alloc::vec![0xF8, 56]);
        assert_eq!(encode_list_header(0x100), alloc::vec![0xF9, 0x01, 0x00]);
        assert_eq!(encoded_list_header_length(56), 2);
    }

    #[test]
    fn test_length_helpers_match_encoders() {
        for n in [0u64, 1, 0x7F, 0x80, 0xFF, 0x100, u64::MAX] {
            assert_eq!(encode_u64(n).len(), encoded_u64_length(n));
        }
        for size in [0usize, 1, 55, 56, 300] {
            assert_eq!(
                encode_list_header(size).len(),
                encoded_list_header_length(size)
            );
        }
    }

    proptest! {
        /// Encoding a u64 and decoding the big-endian magnitude bytes
        /// recovers the value, and the magnitude has no leading zero.
        #[test]
        fn prop_u64_round_trip(n in any::<u64>()) {
            let encoded = encode_u64(n);
            let magnitude: &[u8] = if encoded == [0x80] {
                &[]
            } else if encoded.len() == 1 {
                &encoded
            } else {
                prop_assert_eq!(encoded[0] as usize, 0x80 + encoded.len() - 1);
                &encoded[1..]
            };
            if let Some(first) = magnitude.first() {
                prop_assert_ne!(*first, 0);
            }
            let mut decoded = 0u64;
            for &byte in magnitude {
                decoded = (decoded << 8) | u64::from(byte);
            }
            prop_assert_eq!(decoded, n);
        }
    }
}
