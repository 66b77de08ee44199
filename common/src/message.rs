//! Command frame and response types for the signer protocol.
//!
//! Frames are serialized with postcard at the transport boundary. A
//! frame is one request unit: the command class, its chunk role within
//! a multi-frame transfer, a sub-selector distinguishing descriptors
//! within the class, and up to 255 payload bytes.
//!
//! # Security Model
//!
//! All frames come from the untrusted host. The device must:
//! 1. Validate every field after deserialization
//! 2. Never trust metadata without signature verification
//! 3. Fail closed on any parsing/validation error

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::commands::ChunkRole;
use crate::error::Error;
use crate::types::{Bip32Path, Hash256};

/// Maximum payload size of a single command frame.
pub const MAX_FRAME_PAYLOAD: usize = 255;

/// One request unit from the host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Command class identifier (see [`crate::commands::Command`]).
    pub class: u8,
    /// Chunk role within a multi-frame transfer.
    pub chunk: ChunkRole,
    /// Sub-selector distinguishing descriptors within a class.
    pub selector: u8,
    /// Payload bytes, at most [`MAX_FRAME_PAYLOAD`].
    pub payload: Vec<u8>,
}

impl CommandFrame {
    /// Builds a first-chunk frame.
    pub fn first(class: u8, selector: u8, payload: Vec<u8>) -> Self {
        Self {
            class,
            chunk: ChunkRole::First,
            selector,
            payload,
        }
    }

    /// Builds a continuation frame.
    pub fn next(class: u8, selector: u8, payload: Vec<u8>) -> Self {
        Self {
            class,
            chunk: ChunkRole::Continuation,
            selector,
            payload,
        }
    }
}

/// Response messages from the device to the host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Error response with error code.
    Error(Error),

    /// Command accepted and fully processed.
    Ok,

    /// Chunk stored; the transfer is not complete yet.
    Pending,

    /// Chain identifiers of the registered dynamic networks.
    Networks(Vec<u64>),

    /// Freshly armed anti-replay challenge.
    ///
    /// Challenge-bearing descriptors must echo this value; it is
    /// consumed by the flow that commits against it.
    Challenge(u32),

    /// Authorization hash built from verified EIP-7702 fields.
    ///
    /// The hash is what the signing key eventually commits to; the
    /// device never signs it from this path.
    AuthorizationHash {
        /// keccak256(MAGIC || rlp([chain_id, delegate, nonce])).
        hash: Hash256,
        /// Derivation path of the key asked to sign the hash.
        path: Bip32Path,
        /// True when the delegate is the zero address (revocation).
        revocation: bool,
    },
}

impl Response {
    /// Creates an error response.
    pub fn error(e: Error) -> Self {
        Response::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_frame_round_trip() {
        let frame = CommandFrame::first(0x30, 0x00, vec![0x00, 0x0A, 0x01, 0x02]);
        let bytes = postcard::to_allocvec(&frame).unwrap();
        let back: CommandFrame = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(frame, back);
    }

    #[test]
    fn test_response_error() {
        let response = Response::error(Error::TrustViolation);
        assert!(matches!(response, Response::Error(Error::TrustViolation)));
    }
}
