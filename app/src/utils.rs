//! Small helpers shared by the command handlers.

use alloc::string::String;

use common::types::EthAddress;
use tiny_keccak::{Hasher as KeccakHasher, Keccak};

/// Keccak256 hash function as used by Ethereum.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Streaming Keccak256 hasher for preimages assembled piecewise.
pub struct Keccak256Hasher {
    inner: Keccak,
}

impl Keccak256Hasher {
    /// Creates a new Keccak256 hasher.
    pub fn new() -> Self {
        Self {
            inner: Keccak::v256(),
        }
    }

    /// Feeds more input bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalizes into a 32-byte digest.
    pub fn finalize(self) -> [u8; 32] {
        let mut output = [0u8; 32];
        self.inner.finalize(&mut output);
        output
    }
}

impl Default for Keccak256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// True when every byte is printable ASCII.
///
/// Names and tickers shown to the user must pass this check before
/// they are accepted; control characters could fake screen content.
pub fn is_printable_ascii(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| (0x20..=0x7E).contains(&b))
}

/// Formats an address as 0x-prefixed lowercase hex for display.
pub fn format_address(address: &EthAddress) -> String {
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    out.push_str(&hex::encode(address));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_keccak256_empty() {
        // keccak256("") reference vector
        assert_eq!(
            keccak256(&[]),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut hasher = Keccak256Hasher::new();
        hasher.update(b"abc");
        hasher.update(b"def");
        assert_eq!(hasher.finalize(), keccak256(b"abcdef"));
    }

    #[test]
    fn test_printable_check() {
        assert!(is_printable_ascii(b"Sepolia ETH"));
        assert!(!is_printable_ascii(b"bad\x00name"));
        assert!(!is_printable_ascii(b"bad\x1bname"));
    }

    #[test]
    fn test_format_address() {
        assert_eq!(
            format_address(&[0u8; 20]),
            "0x0000000000000000000000000000000000000000"
        );
    }
}
