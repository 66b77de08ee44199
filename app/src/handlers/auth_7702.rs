//! EIP-7702 authorization fields and authorization hash builder.
//!
//! The verified payload carries a signing path, a delegate address, a
//! chain id and a nonce. From these the handler builds the
//! authorization preimage `MAGIC || rlp([chain_id, delegate, nonce])`
//! and returns its keccak256 hash; the EC signing step itself happens
//! outside this crate. An all-zero delegate revokes a prior delegation
//! and is exempt from the delegate whitelist.

use common::error::Error;
use common::message::{CommandFrame, Response};
use common::types::{Bip32Path, EthAddress, Hash256};

use crate::chunk::{self, Transfer};
use crate::rlp;
use crate::state::DeviceState;
use crate::tlv::{Schema, TagSpec, TlvRecord};
use crate::utils::Keccak256Hasher;
use crate::verify::KeyUsage;

/// EIP-7702 authorization preimage magic byte.
pub const AUTH_MAGIC: u8 = 0x05;

const TAG_VERSION: u8 = 0x00;
const TAG_DERIVATION_INDEX: u8 = 0x01;
const TAG_DELEGATE: u8 = 0x02;
const TAG_CHAIN_ID: u8 = 0x03;
const TAG_NONCE: u8 = 0x04;

const STRUCT_VERSION: u8 = 0x01;

#[derive(Default)]
struct AuthPayload {
    path: Bip32Path,
    delegate: Option<EthAddress>,
    chain_id: Option<u64>,
    nonce: Option<u64>,
}

fn handle_version(record: &TlvRecord<'_>, _out: &mut AuthPayload) -> Result<(), Error> {
    if record.value != [STRUCT_VERSION] {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn handle_derivation_index(record: &TlvRecord<'_>, out: &mut AuthPayload) -> Result<(), Error> {
    let bytes: [u8; 4] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    out.path
        .push(u32::from_be_bytes(bytes))
        .map_err(|_| Error::ResourceOverflow)
}

fn handle_delegate(record: &TlvRecord<'_>, out: &mut AuthPayload) -> Result<(), Error> {
    out.delegate = Some(record.value.try_into().map_err(|_| Error::InvalidField)?);
    Ok(())
}

fn handle_chain_id(record: &TlvRecord<'_>, out: &mut AuthPayload) -> Result<(), Error> {
    let bytes: [u8; 8] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    out.chain_id = Some(u64::from_be_bytes(bytes));
    Ok(())
}

fn handle_nonce(record: &TlvRecord<'_>, out: &mut AuthPayload) -> Result<(), Error> {
    let bytes: [u8; 8] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    out.nonce = Some(u64::from_be_bytes(bytes));
    Ok(())
}

static SCHEMA: Schema<AuthPayload> = Schema {
    tags: &[
        TagSpec {
            tag: TAG_VERSION,
            required: true,
            unique: true,
            handler: handle_version,
        },
        TagSpec {
            tag: TAG_DERIVATION_INDEX,
            required: true,
            unique: false,
            handler: handle_derivation_index,
        },
        TagSpec {
            tag: TAG_DELEGATE,
            required: true,
            unique: true,
            handler: handle_delegate,
        },
        TagSpec {
            tag: TAG_CHAIN_ID,
            required: true,
            unique: true,
            handler: handle_chain_id,
        },
        TagSpec {
            tag: TAG_NONCE,
            required: true,
            unique: true,
            handler: handle_nonce,
        },
    ],
    usage: KeyUsage::AccountSafety,
};

/// keccak256(MAGIC || rlp([chain_id, delegate, nonce])).
///
/// The delegate is a fixed-width 20-byte string; the two integers use
/// their canonical minimal form. The preimage is streamed into the
/// keccak state rather than materialized.
pub fn authorization_hash(chain_id: u64, delegate: &EthAddress, nonce: u64) -> Hash256 {
    let payload_size = rlp::encoded_u64_length(chain_id)
        + rlp::encoded_number_length(delegate)
        + rlp::encoded_u64_length(nonce);
    let mut hasher = Keccak256Hasher::new();
    hasher.update(&[AUTH_MAGIC]);
    hasher.update(&rlp::encode_list_header(payload_size));
    hasher.update(&rlp::encode_u64(chain_id));
    hasher.update(&rlp::encode_number(delegate));
    hasher.update(&rlp::encode_u64(nonce));
    hasher.finalize()
}

pub fn handle(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    let payload = match chunk::ingest_sized(&mut state.assembly, frame)? {
        Transfer::Pending => return Ok(Response::Pending),
        Transfer::Complete(bytes) => bytes,
    };
    let parsed = crate::tlv::parse(&SCHEMA, &payload, state.anchor())?;

    // Required tags are schema-enforced; the options are filled here.
    let delegate = parsed.delegate.ok_or(Error::MissingRequiredTag)?;
    let chain_id = parsed.chain_id.ok_or(Error::MissingRequiredTag)?;
    let nonce = parsed.nonce.ok_or(Error::MissingRequiredTag)?;

    let revocation = delegate == [0u8; 20];
    if !revocation && !state.delegate_allowed(chain_id, &delegate) {
        return Err(Error::InvalidField);
    }

    Ok(Response::AuthorizationHash {
        hash: authorization_hash(chain_id, &delegate, nonce),
        path: parsed.path,
        revocation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::TAG_DER_SIGNATURE;
    use crate::utils::keccak256;
    use crate::verify::test_support::sign_payload;
    use alloc::vec::Vec;

    fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
        let mut out = alloc::vec![tag, value.len() as u8];
        out.extend_from_slice(value);
        out
    }

    fn auth_payload(delegate: [u8; 20], chain_id: u64, nonce: u64) -> Vec<u8> {
        let mut payload = tlv(TAG_VERSION, &[STRUCT_VERSION]);
        payload.extend_from_slice(&tlv(TAG_DERIVATION_INDEX, &0x8000002Cu32.to_be_bytes()));
        payload.extend_from_slice(&tlv(TAG_DERIVATION_INDEX, &0x8000003Cu32.to_be_bytes()));
        payload.extend_from_slice(&tlv(TAG_DELEGATE, &delegate));
        payload.extend_from_slice(&tlv(TAG_CHAIN_ID, &chain_id.to_be_bytes()));
        payload.extend_from_slice(&tlv(TAG_NONCE, &nonce.to_be_bytes()));
        let signature = sign_payload(&payload);
        payload.extend_from_slice(&tlv(TAG_DER_SIGNATURE, &signature));
        payload
    }

    fn framed(payload: Vec<u8>) -> CommandFrame {
        let mut body = (payload.len() as u16).to_be_bytes().to_vec();
        body.extend_from_slice(&payload);
        CommandFrame::first(0x32, 0x00, body)
    }

    #[test]
    fn test_authorization_preimage_bytes() {
        // chain id 1, delegate 0x11 * 20, nonce 1:
        // payload = 01 | 94 11*20 | 01 (23 bytes), header 0xD7.
        let delegate = [0x11u8; 20];
        let mut preimage = alloc::vec![AUTH_MAGIC, 0xD7, 0x01, 0x94];
        preimage.extend_from_slice(&delegate);
        preimage.push(0x01);
        assert_eq!(authorization_hash(1, &delegate, 1), keccak256(&preimage));
    }

    #[test]
    fn test_delegation_returns_hash() {
        let mut state = DeviceState::new_for_tests();
        let delegate = [0x11u8; 20];
        let response = handle(&mut state, &framed(auth_payload(delegate, 1, 1))).unwrap();
        assert_eq!(
            response,
            Response::AuthorizationHash {
                hash: authorization_hash(1, &delegate, 1),
                path: Bip32Path::from_slice(&[0x8000002C, 0x8000003C]),
                revocation: false,
            }
        );
    }

    #[test]
    fn test_zero_delegate_is_revocation() {
        let mut state = DeviceState::new_for_tests();
        // The whitelist does not apply to revocations.
        state.allow_delegate(1, [0x11u8; 20]);
        let response = handle(&mut state, &framed(auth_payload([0u8; 20], 1, 7))).unwrap();
        assert!(matches!(
            response,
            Response::AuthorizationHash {
                revocation: true,
                ..
            }
        ));
    }

    #[test]
    fn test_whitelisted_delegate_enforced() {
        let mut state = DeviceState::new_for_tests();
        state.allow_delegate(1, [0x11u8; 20]);
        let err = handle(&mut state, &framed(auth_payload([0x22u8; 20], 1, 1)));
        assert_eq!(err, Err(Error::InvalidField));
        // Wildcard chain id admits the delegate on any chain.
        state.allow_delegate(0, [0x22u8; 20]);
        assert!(handle(&mut state, &framed(auth_payload([0x22u8; 20], 9, 1))).is_ok());
    }

    #[test]
    fn test_path_depth_limit() {
        let mut payload = tlv(TAG_VERSION, &[STRUCT_VERSION]);
        for index in 0..11u32 {
            payload.extend_from_slice(&tlv(TAG_DERIVATION_INDEX, &index.to_be_bytes()));
        }
        payload.extend_from_slice(&tlv(TAG_DELEGATE, &[0x11u8; 20]));
        payload.extend_from_slice(&tlv(TAG_CHAIN_ID, &1u64.to_be_bytes()));
        payload.extend_from_slice(&tlv(TAG_NONCE, &1u64.to_be_bytes()));
        let signature = sign_payload(&payload);
        payload.extend_from_slice(&tlv(TAG_DER_SIGNATURE, &signature));
        let mut state = DeviceState::new_for_tests();
        assert_eq!(
            handle(&mut state, &framed(payload)),
            Err(Error::ResourceOverflow)
        );
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut payload = tlv(TAG_VERSION, &[0x02]);
        payload.extend_from_slice(&tlv(TAG_DERIVATION_INDEX, &0u32.to_be_bytes()));
        payload.extend_from_slice(&tlv(TAG_DELEGATE, &[0x11u8; 20]));
        payload.extend_from_slice(&tlv(TAG_CHAIN_ID, &1u64.to_be_bytes()));
        payload.extend_from_slice(&tlv(TAG_NONCE, &1u64.to_be_bytes()));
        let signature = sign_payload(&payload);
        payload.extend_from_slice(&tlv(TAG_DER_SIGNATURE, &signature));
        let mut state = DeviceState::new_for_tests();
        assert_eq!(handle(&mut state, &framed(payload)), Err(Error::InvalidField));
    }
}
