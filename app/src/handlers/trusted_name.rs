//! Verified name/address bindings.
//!
//! A trusted name lets the approval screen show "vitalik.eth" instead
//! of a bare address, but only when the binding was signed by the
//! metadata provider. Account names (v2 struct) carry the armed device
//! challenge against replay and must come from a naming service, never
//! from the contract asset list; contract names are the opposite.

use alloc::string::String;

use common::error::Error;
use common::message::{CommandFrame, Response};
use common::types::EthAddress;

use crate::chunk::{self, Transfer};
use crate::handlers::network::MAX_CHAIN_ID;
use crate::state::{DeviceState, TrustedNameEntry};
use crate::tlv::{Schema, TagSpec, TlvRecord};
use crate::utils::is_printable_ascii;
use crate::verify::KeyUsage;

const TAG_STRUCT_TYPE: u8 = 0x01;
const TAG_STRUCT_VERSION: u8 = 0x02;
const TAG_CHALLENGE: u8 = 0x12;
const TAG_NAME: u8 = 0x20;
const TAG_COIN_TYPE: u8 = 0x21;
const TAG_ADDRESS: u8 = 0x22;
const TAG_CHAIN_ID: u8 = 0x23;
const TAG_NAME_TYPE: u8 = 0x70;
const TAG_NAME_SOURCE: u8 = 0x71;

const STRUCT_TYPE: u8 = 0x03;
const STRUCT_VERSION: u8 = 0x02;

/// Name designates an externally owned account.
pub const TYPE_ACCOUNT: u8 = 0x01;
/// Name designates a contract.
pub const TYPE_CONTRACT: u8 = 0x02;

/// Contract asset list source, reserved for contract names.
pub const SOURCE_CAL: u8 = 0x01;
const MAX_SOURCE: u8 = 0x05;

const MAX_NAME_LEN: usize = 30;

#[derive(Default)]
struct NamePayload {
    challenge: Option<u32>,
    name: String,
    address: Option<EthAddress>,
    chain_id: Option<u64>,
    name_type: Option<u8>,
    name_source: Option<u8>,
}

fn expect_byte(record: &TlvRecord<'_>, value: u8) -> Result<(), Error> {
    if record.value != [value] {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn handle_type(record: &TlvRecord<'_>, _out: &mut NamePayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_TYPE)
}

fn handle_version(record: &TlvRecord<'_>, _out: &mut NamePayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_VERSION)
}

fn handle_challenge(record: &TlvRecord<'_>, out: &mut NamePayload) -> Result<(), Error> {
    let bytes: [u8; 4] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    out.challenge = Some(u32::from_be_bytes(bytes));
    Ok(())
}

fn handle_name(record: &TlvRecord<'_>, out: &mut NamePayload) -> Result<(), Error> {
    if record.is_empty() || record.len() > MAX_NAME_LEN || !is_printable_ascii(record.value) {
        return Err(Error::InvalidField);
    }
    out.name = String::from_utf8(record.value.to_vec()).map_err(|_| Error::InvalidField)?;
    Ok(())
}

fn handle_coin_type(record: &TlvRecord<'_>, _out: &mut NamePayload) -> Result<(), Error> {
    // SLIP-44 coin type, carried for cross-chain wallets; unused here
    // beyond its length check.
    if record.len() != 4 {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn handle_address(record: &TlvRecord<'_>, out: &mut NamePayload) -> Result<(), Error> {
    out.address = Some(record.value.try_into().map_err(|_| Error::InvalidField)?);
    Ok(())
}

fn handle_chain_id(record: &TlvRecord<'_>, out: &mut NamePayload) -> Result<(), Error> {
    let bytes: [u8; 8] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    let chain_id = u64::from_be_bytes(bytes);
    if !(1..=MAX_CHAIN_ID).contains(&chain_id) {
        return Err(Error::InvalidField);
    }
    out.chain_id = Some(chain_id);
    Ok(())
}

fn handle_name_type(record: &TlvRecord<'_>, out: &mut NamePayload) -> Result<(), Error> {
    match record.value {
        [value @ (TYPE_ACCOUNT | TYPE_CONTRACT)] => {
            out.name_type = Some(*value);
            Ok(())
        }
        _ => Err(Error::InvalidField),
    }
}

fn handle_name_source(record: &TlvRecord<'_>, out: &mut NamePayload) -> Result<(), Error> {
    if record.len() != 1 || record.value[0] > MAX_SOURCE {
        return Err(Error::InvalidField);
    }
    out.name_source = Some(record.value[0]);
    Ok(())
}

static SCHEMA: Schema<NamePayload> = Schema {
    tags: &[
        TagSpec {
            tag: TAG_STRUCT_TYPE,
            required: true,
            unique: true,
            handler: handle_type,
        },
        TagSpec {
            tag: TAG_STRUCT_VERSION,
            required: true,
            unique: true,
            handler: handle_version,
        },
        TagSpec {
            tag: TAG_CHALLENGE,
            required: false,
            unique: true,
            handler: handle_challenge,
        },
        TagSpec {
            tag: TAG_NAME,
            required: true,
            unique: true,
            handler: handle_name,
        },
        TagSpec {
            tag: TAG_COIN_TYPE,
            required: false,
            unique: true,
            handler: handle_coin_type,
        },
        TagSpec {
            tag: TAG_ADDRESS,
            required: true,
            unique: true,
            handler: handle_address,
        },
        TagSpec {
            tag: TAG_CHAIN_ID,
            required: true,
            unique: true,
            handler: handle_chain_id,
        },
        TagSpec {
            tag: TAG_NAME_TYPE,
            required: true,
            unique: true,
            handler: handle_name_type,
        },
        TagSpec {
            tag: TAG_NAME_SOURCE,
            required: true,
            unique: true,
            handler: handle_name_source,
        },
    ],
    usage: KeyUsage::TrustedName,
};

pub fn handle(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    let payload = match chunk::ingest_sized(&mut state.assembly, frame)? {
        Transfer::Pending => return Ok(Response::Pending),
        Transfer::Complete(bytes) => bytes,
    };
    let parsed = crate::tlv::parse(&SCHEMA, &payload, state.anchor())?;
    let name_type = parsed.name_type.ok_or(Error::MissingRequiredTag)?;
    let name_source = parsed.name_source.ok_or(Error::MissingRequiredTag)?;

    match name_type {
        TYPE_ACCOUNT => {
            // Account names are replayable screen content; the armed
            // challenge makes each descriptor single-use.
            let armed = state.challenge.ok_or(Error::InvalidField)?;
            if parsed.challenge != Some(armed) {
                return Err(Error::InvalidField);
            }
            if name_source == SOURCE_CAL {
                return Err(Error::InvalidField);
            }
        }
        TYPE_CONTRACT => {
            if name_source != SOURCE_CAL {
                return Err(Error::InvalidField);
            }
        }
        _ => return Err(Error::InvalidField),
    }

    state.insert_trusted_name(TrustedNameEntry {
        name: parsed.name,
        address: parsed.address.ok_or(Error::MissingRequiredTag)?,
        chain_id: parsed.chain_id.ok_or(Error::MissingRequiredTag)?,
        name_type,
        name_source,
    });
    if name_type == TYPE_ACCOUNT {
        state.challenge = None;
    }
    Ok(Response::Ok)
}
