//! Dynamic network registration.
//!
//! Networks unknown at firmware build time are registered at runtime
//! from a signed descriptor: chain id, display name, ticker and an
//! optional icon hash. The table holds a fixed number of slots with
//! round-robin eviction; a chain id already present, statically or
//! dynamically, cannot be registered again.

use alloc::string::String;
use alloc::vec::Vec;

use common::error::Error;
use common::message::{CommandFrame, Response};
use common::types::Hash256;

use crate::chunk::{self, Transfer};
use crate::state::{DeviceState, NetworkEntry};
use crate::tlv::{Schema, TagSpec, TlvRecord};
use crate::utils::is_printable_ascii;
use crate::verify::KeyUsage;

/// Provide one network descriptor.
pub const SEL_CONFIG: u8 = 0x00;
/// Return the registered chain-id list.
pub const SEL_GET_INFO: u8 = 0x02;

/// Largest chain id a network may claim (EIP-2294).
pub const MAX_CHAIN_ID: u64 = 0x7FFF_FFFF_FFFF_FFDB;

const TAG_STRUCT_TYPE: u8 = 0x01;
const TAG_STRUCT_VERSION: u8 = 0x02;
const TAG_CHAIN_ID: u8 = 0x23;
const TAG_TICKER: u8 = 0x24;
const TAG_BLOCKCHAIN_FAMILY: u8 = 0x51;
const TAG_NAME: u8 = 0x52;
const TAG_ICON_HASH: u8 = 0x53;

const STRUCT_TYPE: u8 = 0x08;
const STRUCT_VERSION: u8 = 0x01;
const FAMILY_ETHEREUM: u8 = 0x01;

const MAX_NAME_LEN: usize = 32;
const MAX_TICKER_LEN: usize = 10;

#[derive(Default)]
struct NetworkPayload {
    chain_id: Option<u64>,
    name: String,
    ticker: String,
    icon_hash: Option<Hash256>,
}

fn expect_byte(record: &TlvRecord<'_>, value: u8) -> Result<(), Error> {
    if record.value != [value] {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn handle_type(record: &TlvRecord<'_>, _out: &mut NetworkPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_TYPE)
}

fn handle_version(record: &TlvRecord<'_>, _out: &mut NetworkPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_VERSION)
}

fn handle_family(record: &TlvRecord<'_>, _out: &mut NetworkPayload) -> Result<(), Error> {
    expect_byte(record, FAMILY_ETHEREUM)
}

fn handle_chain_id(record: &TlvRecord<'_>, out: &mut NetworkPayload) -> Result<(), Error> {
    let bytes: [u8; 8] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    let chain_id = u64::from_be_bytes(bytes);
    if !(1..=MAX_CHAIN_ID).contains(&chain_id) {
        return Err(Error::InvalidField);
    }
    out.chain_id = Some(chain_id);
    Ok(())
}

fn printable_string(record: &TlvRecord<'_>, max_len: usize) -> Result<String, Error> {
    if record.is_empty() || record.len() > max_len || !is_printable_ascii(record.value) {
        return Err(Error::InvalidField);
    }
    String::from_utf8(record.value.to_vec()).map_err(|_| Error::InvalidField)
}

fn handle_name(record: &TlvRecord<'_>, out: &mut NetworkPayload) -> Result<(), Error> {
    out.name = printable_string(record, MAX_NAME_LEN)?;
    Ok(())
}

fn handle_ticker(record: &TlvRecord<'_>, out: &mut NetworkPayload) -> Result<(), Error> {
    out.ticker = printable_string(record, MAX_TICKER_LEN)?;
    Ok(())
}

fn handle_icon_hash(record: &TlvRecord<'_>, out: &mut NetworkPayload) -> Result<(), Error> {
    out.icon_hash = Some(record.value.try_into().map_err(|_| Error::InvalidField)?);
    Ok(())
}

static SCHEMA: Schema<NetworkPayload> = Schema {
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
            tag: TAG_BLOCKCHAIN_FAMILY,
            required: true,
            unique: true,
            handler: handle_family,
        },
        TagSpec {
            tag: TAG_CHAIN_ID,
            required: true,
            unique: true,
            handler: handle_chain_id,
        },
        TagSpec {
            tag: TAG_NAME,
            required: true,
            unique: true,
            handler: handle_name,
        },
        TagSpec {
            tag: TAG_TICKER,
            required: true,
            unique: true,
            handler: handle_ticker,
        },
        TagSpec {
            tag: TAG_ICON_HASH,
            required: false,
            unique: true,
            handler: handle_icon_hash,
        },
    ],
    usage: KeyUsage::CoinMetadata,
};

pub fn handle(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    match frame.selector {
        SEL_CONFIG => handle_config(state, frame),
        SEL_GET_INFO => {
            let chain_ids: Vec<u64> = state.networks.iter().map(|n| n.chain_id).collect();
            Ok(Response::Networks(chain_ids))
        }
        _ => Err(Error::InvalidCommand),
    }
}

fn handle_config(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    let payload = match chunk::ingest_sized(&mut state.assembly, frame)? {
        Transfer::Pending => return Ok(Response::Pending),
        Transfer::Complete(bytes) => bytes,
    };
    let parsed = crate::tlv::parse(&SCHEMA, &payload, state.anchor())?;
    let chain_id = parsed.chain_id.ok_or(Error::MissingRequiredTag)?;
    if state.find_network(chain_id).is_some() {
        return Err(Error::InvalidField);
    }
    state.insert_network(NetworkEntry {
        chain_id,
        name: parsed.name,
        ticker: parsed.ticker,
        icon_hash: parsed.icon_hash,
    });
    Ok(Response::Ok)
}
