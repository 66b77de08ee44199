//! Core types shared between the device and host client.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Maximum BIP32 derivation path depth.
pub const MAX_BIP32_PATH_DEPTH: usize = 10;

/// Ethereum address (20 bytes).
pub type EthAddress = [u8; 20];

/// 32-byte hash (Keccak256 or SHA-256 depending on context).
pub type Hash256 = [u8; 32];

/// BIP32 derivation path.
///
/// Stored as a vector of u32 values where hardened indices have the
/// 0x80000000 bit set. Maximum depth is 10 elements.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Bip32Path(pub Vec<u32>);

impl Bip32Path {
    /// Creates a new empty path.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates a path from a slice.
    pub fn from_slice(path: &[u32]) -> Self {
        Self(path.to_vec())
    }

    /// Returns the path length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the path as a slice.
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Appends one derivation index, failing once the depth cap is hit.
    pub fn push(&mut self, index: u32) -> Result<(), ()> {
        if self.0.len() >= MAX_BIP32_PATH_DEPTH {
            return Err(());
        }
        self.0.push(index);
        Ok(())
    }
}
