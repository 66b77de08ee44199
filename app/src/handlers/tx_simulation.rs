//! Transaction pre-simulation risk reports.
//!
//! A simulation provider runs the transaction off-device and sends back
//! a signed verdict: a risk score, a category and a short URL the user
//! can check. The report binds to one transaction hash; the signing
//! flow consults the stored slot and the verdict is shown before
//! approval. One slot, overwritten by each new report.

use alloc::string::String;

use common::error::Error;
use common::message::{CommandFrame, Response};
use common::types::{EthAddress, Hash256};

use crate::chunk::{self, Transfer};
use crate::handlers::network::MAX_CHAIN_ID;
use crate::state::{DeviceState, SimulationEntry};
use crate::tlv::{Schema, TagSpec, TlvRecord};
use crate::utils::is_printable_ascii;
use crate::verify::KeyUsage;

/// Report for a raw transaction.
pub const SEL_TRANSACTION: u8 = 0x00;
/// Report for an EIP-712 typed-data message.
pub const SEL_TYPED_DATA: u8 = 0x01;
/// Report for a personal-sign message.
pub const SEL_PERSONAL_MESSAGE: u8 = 0x02;

const TAG_STRUCT_TYPE: u8 = 0x01;
const TAG_STRUCT_VERSION: u8 = 0x02;
const TAG_ADDRESS: u8 = 0x22;
const TAG_CHAIN_ID: u8 = 0x23;
const TAG_TX_HASH: u8 = 0x27;
const TAG_DOMAIN_HASH: u8 = 0x28;
const TAG_RISK: u8 = 0x80;
const TAG_CATEGORY: u8 = 0x81;
const TAG_PROVIDER_MSG: u8 = 0x82;
const TAG_TINY_URL: u8 = 0x83;
const TAG_SIMU_TYPE: u8 = 0x84;

const STRUCT_TYPE: u8 = 0x09;
const STRUCT_VERSION: u8 = 0x01;

/// Highest defined risk score (unknown/benign/warning/malicious).
const MAX_RISK: u8 = 0x03;

const MAX_PROVIDER_MSG_LEN: usize = 80;
const MAX_TINY_URL_LEN: usize = 64;

#[derive(Default)]
struct SimulationPayload {
    address: Option<EthAddress>,
    chain_id: Option<u64>,
    tx_hash: Option<Hash256>,
    domain_hash: Option<Hash256>,
    risk: Option<u8>,
    category: Option<u8>,
    provider_msg: Option<String>,
    tiny_url: Option<String>,
    simu_type: Option<u8>,
}

fn expect_byte(record: &TlvRecord<'_>, value: u8) -> Result<(), Error> {
    if record.value != [value] {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn handle_type(record: &TlvRecord<'_>, _out: &mut SimulationPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_TYPE)
}

fn handle_version(record: &TlvRecord<'_>, _out: &mut SimulationPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_VERSION)
}

fn handle_address(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    let address: EthAddress = record.value.try_into().map_err(|_| Error::InvalidField)?;
    if address == [0u8; 20] {
        return Err(Error::InvalidField);
    }
    out.address = Some(address);
    Ok(())
}

fn handle_chain_id(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    let bytes: [u8; 8] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    let chain_id = u64::from_be_bytes(bytes);
    if !(1..=MAX_CHAIN_ID).contains(&chain_id) {
        return Err(Error::InvalidField);
    }
    out.chain_id = Some(chain_id);
    Ok(())
}

fn nonzero_hash(record: &TlvRecord<'_>) -> Result<Hash256, Error> {
    let hash: Hash256 = record.value.try_into().map_err(|_| Error::InvalidField)?;
    if hash == [0u8; 32] {
        return Err(Error::InvalidField);
    }
    Ok(hash)
}

fn handle_tx_hash(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    out.tx_hash = Some(nonzero_hash(record)?);
    Ok(())
}

fn handle_domain_hash(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    out.domain_hash = Some(nonzero_hash(record)?);
    Ok(())
}

fn handle_risk(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    if record.len() != 1 || record.value[0] > MAX_RISK {
        return Err(Error::InvalidField);
    }
    out.risk = Some(record.value[0]);
    Ok(())
}

fn handle_category(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    if record.len() != 1 {
        return Err(Error::InvalidField);
    }
    out.category = Some(record.value[0]);
    Ok(())
}

fn printable_string(record: &TlvRecord<'_>, max_len: usize) -> Result<String, Error> {
    if record.is_empty() || record.len() > max_len || !is_printable_ascii(record.value) {
        return Err(Error::InvalidField);
    }
    String::from_utf8(record.value.to_vec()).map_err(|_| Error::InvalidField)
}

fn handle_provider_msg(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    out.provider_msg = Some(printable_string(record, MAX_PROVIDER_MSG_LEN)?);
    Ok(())
}

fn handle_tiny_url(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    out.tiny_url = Some(printable_string(record, MAX_TINY_URL_LEN)?);
    Ok(())
}

fn handle_simu_type(record: &TlvRecord<'_>, out: &mut SimulationPayload) -> Result<(), Error> {
    if record.len() != 1 || record.value[0] > SEL_PERSONAL_MESSAGE {
        return Err(Error::InvalidField);
    }
    out.simu_type = Some(record.value[0]);
    Ok(())
}

static SCHEMA: Schema<SimulationPayload> = Schema {
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
            tag: TAG_ADDRESS,
            required: true,
            unique: true,
            handler: handle_address,
        },
        TagSpec {
            tag: TAG_CHAIN_ID,
            required: false,
            unique: true,
            handler: handle_chain_id,
        },
        TagSpec {
            tag: TAG_TX_HASH,
            required: true,
            unique: true,
            handler: handle_tx_hash,
        },
        TagSpec {
            tag: TAG_DOMAIN_HASH,
            required: false,
            unique: true,
            handler: handle_domain_hash,
        },
        TagSpec {
            tag: TAG_RISK,
            required: true,
            unique: true,
            handler: handle_risk,
        },
        TagSpec {
            tag: TAG_CATEGORY,
            required: true,
            unique: true,
            handler: handle_category,
        },
        TagSpec {
            tag: TAG_PROVIDER_MSG,
            required: false,
            unique: true,
            handler: handle_provider_msg,
        },
        TagSpec {
            tag: TAG_TINY_URL,
            required: true,
            unique: true,
            handler: handle_tiny_url,
        },
        TagSpec {
            tag: TAG_SIMU_TYPE,
            required: true,
            unique: true,
            handler: handle_simu_type,
        },
    ],
    usage: KeyUsage::TransactionChecks,
};

pub fn handle(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    if frame.selector > SEL_PERSONAL_MESSAGE {
        return Err(Error::InvalidCommand);
    }
    let payload = match chunk::ingest_sized(&mut state.assembly, frame)? {
        Transfer::Pending => return Ok(Response::Pending),
        Transfer::Complete(bytes) => bytes,
    };
    let parsed = crate::tlv::parse(&SCHEMA, &payload, state.anchor())?;
    let simu_type = parsed.simu_type.ok_or(Error::MissingRequiredTag)?;
    if simu_type != frame.selector {
        return Err(Error::InvalidField);
    }
    // A domain hash only exists for typed-data messages.
    if parsed.domain_hash.is_some() && simu_type != SEL_TYPED_DATA {
        return Err(Error::InvalidField);
    }
    state.simulation = Some(SimulationEntry {
        address: parsed.address.ok_or(Error::MissingRequiredTag)?,
        chain_id: parsed.chain_id,
        tx_hash: parsed.tx_hash.ok_or(Error::MissingRequiredTag)?,
        domain_hash: parsed.domain_hash,
        risk: parsed.risk.ok_or(Error::MissingRequiredTag)?,
        category: parsed.category.ok_or(Error::MissingRequiredTag)?,
        provider_msg: parsed.provider_msg,
        tiny_url: parsed.tiny_url.ok_or(Error::MissingRequiredTag)?,
        simu_type,
    });
    Ok(Response::Ok)
}
