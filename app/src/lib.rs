//! Ethereum signer firmware: command processor core.
//!
//! This crate implements the authenticated, chunked TLV ingestion
//! pipeline through which every "provide information" command reaches
//! the device: dynamic network registration, EIP-7702 authorization
//! fields, Safe account descriptors, transaction-risk reports, trusted
//! name bindings, token/NFT descriptors and clear-signing field tables.
//!
//! # Security Model
//!
//! - Host is fully compromised; treat all input as adversarial
//! - No metadata influences display or signing before its detached
//!   signature verifies against the device trust anchor
//! - Unknown TLV tags are fatal, never skipped
//! - Fail closed on any ambiguity; no partial commit survives an error
//!
//! Screen rendering, the transaction-body streaming parser, persistent
//! settings and the EC signing primitive live outside this crate and
//! are reached through opaque boundaries.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod chunk;
pub mod handlers;
pub mod rlp;
pub mod state;
pub mod tlv;
pub mod utils;
pub mod verify;

use alloc::vec::Vec;

use common::commands::Command;
use common::error::Error;
use common::message::{CommandFrame, Response, MAX_FRAME_PAYLOAD};

use state::DeviceState;

/// Handles a single command frame from the host.
///
/// This is the main dispatch point. Each handler must validate all
/// input, keep the single-assembly invariant, and leave every feature
/// table untouched on any failure.
pub fn handle_frame(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    if frame.payload.len() > MAX_FRAME_PAYLOAD {
        return Err(Error::ResourceOverflow);
    }
    let command = Command::try_from(frame.class).map_err(|_| Error::InvalidCommand)?;
    match command {
        Command::GetChallenge => Ok(Response::Challenge(state.roll_challenge())),
        Command::ProvideNetworkConfiguration => handlers::network::handle(state, frame),
        Command::SignAuthorization7702 => handlers::auth_7702::handle(state, frame),
        Command::ProvideSafeAccount => handlers::safe_account::handle(state, frame),
        Command::ProvideTxSimulation => handlers::tx_simulation::handle(state, frame),
        Command::ProvideTrustedName => handlers::trusted_name::handle(state, frame),
        Command::ProvideTokenInformation => handlers::token::handle_token(state, frame),
        Command::ProvideNftInformation => handlers::token::handle_nft(state, frame),
        Command::ProvideTransactionInfo => handlers::field_table::handle(state, frame),
    }
}

/// Processes a raw postcard-encoded frame from the transport layer.
///
/// Deserialization of untrusted input fails closed: any codec error
/// yields an `InvalidCommand` error response rather than a crash.
pub fn process_message(state: &mut DeviceState, request: &[u8]) -> Vec<u8> {
    let Ok(frame) = postcard::from_bytes::<CommandFrame>(request) else {
        return postcard::to_allocvec(&Response::Error(Error::InvalidCommand))
            .unwrap_or_else(|_| Vec::new());
    };

    let response = handle_frame(state, &frame).unwrap_or_else(Response::error);

    postcard::to_allocvec(&response).unwrap_or_else(|_| Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_unknown_class_rejected() {
        let mut state = DeviceState::new_for_tests();
        let frame = CommandFrame::first(0xEE, 0x00, vec![]);
        assert_eq!(handle_frame(&mut state, &frame), Err(Error::InvalidCommand));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut state = DeviceState::new_for_tests();
        let frame = CommandFrame::first(0x30, 0x00, vec![0u8; MAX_FRAME_PAYLOAD + 1]);
        assert_eq!(
            handle_frame(&mut state, &frame),
            Err(Error::ResourceOverflow)
        );
    }

    #[test]
    fn test_process_message_bad_codec_fails_closed() {
        let mut state = DeviceState::new_for_tests();
        let raw = process_message(&mut state, &[0xFF; 3]);
        let response: Response = postcard::from_bytes(&raw).unwrap();
        assert!(matches!(response, Response::Error(_)));
    }
}
