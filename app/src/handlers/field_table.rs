//! Clear-signing field tables.
//!
//! A field descriptor tells the device how to label and format one
//! calldata field of a known contract call. The table is scoped to a
//! single contract context (address and chain id): a descriptor for a
//! different context replaces the whole table rather than mixing two
//! contracts' labels.

use alloc::string::String;

use common::error::Error;
use common::message::{CommandFrame, Response};
use common::types::EthAddress;

use crate::chunk::{self, Transfer};
use crate::handlers::network::MAX_CHAIN_ID;
use crate::state::{DeviceState, FieldTableEntry};
use crate::tlv::{Schema, TagSpec, TlvRecord};
use crate::utils::is_printable_ascii;
use crate::verify::KeyUsage;

const TAG_STRUCT_TYPE: u8 = 0x01;
const TAG_STRUCT_VERSION: u8 = 0x02;
const TAG_DISPLAY_NAME: u8 = 0x20;
const TAG_ADDRESS: u8 = 0x22;
const TAG_CHAIN_ID: u8 = 0x23;
const TAG_FIELD_FORMAT: u8 = 0x26;

const STRUCT_TYPE: u8 = 0x0B;
const STRUCT_VERSION: u8 = 0x01;

/// Render the field as raw bytes.
pub const FORMAT_RAW: u8 = 0x00;
/// Render the field as a token amount.
pub const FORMAT_AMOUNT: u8 = 0x01;
/// Render the field as an address.
pub const FORMAT_ADDRESS: u8 = 0x02;
/// Render the field as a date/time.
pub const FORMAT_DATETIME: u8 = 0x03;

const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Table capacity for one contract context.
pub const MAX_FIELDS: usize = 16;

#[derive(Default)]
struct FieldPayload {
    display_name: String,
    field_format: Option<u8>,
    address: Option<EthAddress>,
    chain_id: Option<u64>,
}

fn expect_byte(record: &TlvRecord<'_>, value: u8) -> Result<(), Error> {
    if record.value != [value] {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn handle_type(record: &TlvRecord<'_>, _out: &mut FieldPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_TYPE)
}

fn handle_version(record: &TlvRecord<'_>, _out: &mut FieldPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_VERSION)
}

fn handle_display_name(record: &TlvRecord<'_>, out: &mut FieldPayload) -> Result<(), Error> {
    if record.is_empty()
        || record.len() > MAX_DISPLAY_NAME_LEN
        || !is_printable_ascii(record.value)
    {
        return Err(Error::InvalidField);
    }
    out.display_name =
        String::from_utf8(record.value.to_vec()).map_err(|_| Error::InvalidField)?;
    Ok(())
}

fn handle_field_format(record: &TlvRecord<'_>, out: &mut FieldPayload) -> Result<(), Error> {
    if record.len() != 1 || record.value[0] > FORMAT_DATETIME {
        return Err(Error::InvalidField);
    }
    out.field_format = Some(record.value[0]);
    Ok(())
}

fn handle_address(record: &TlvRecord<'_>, out: &mut FieldPayload) -> Result<(), Error> {
    out.address = Some(record.value.try_into().map_err(|_| Error::InvalidField)?);
    Ok(())
}

fn handle_chain_id(record: &TlvRecord<'_>, out: &mut FieldPayload) -> Result<(), Error> {
    let bytes: [u8; 8] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    let chain_id = u64::from_be_bytes(bytes);
    if !(1..=MAX_CHAIN_ID).contains(&chain_id) {
        return Err(Error::InvalidField);
    }
    out.chain_id = Some(chain_id);
    Ok(())
}

static SCHEMA: Schema<FieldPayload> = Schema {
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
            tag: TAG_DISPLAY_NAME,
            required: true,
            unique: true,
            handler: handle_display_name,
        },
        TagSpec {
            tag: TAG_FIELD_FORMAT,
            required: true,
            unique: true,
            handler: handle_field_format,
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
    ],
    usage: KeyUsage::Calldata,
};

pub fn handle(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    let payload = match chunk::ingest_sized(&mut state.assembly, frame)? {
        Transfer::Pending => return Ok(Response::Pending),
        Transfer::Complete(bytes) => bytes,
    };
    let parsed = crate::tlv::parse(&SCHEMA, &payload, state.anchor())?;
    let address = parsed.address.ok_or(Error::MissingRequiredTag)?;
    let chain_id = parsed.chain_id.ok_or(Error::MissingRequiredTag)?;

    let same_context = state
        .field_table
        .first()
        .is_some_and(|entry| entry.address == address && entry.chain_id == chain_id);
    if same_context && state.field_table.len() == MAX_FIELDS {
        return Err(Error::ResourceOverflow);
    }
    if !same_context {
        state.field_table.clear();
    }
    state.field_table.push(FieldTableEntry {
        display_name: parsed.display_name,
        field_format: parsed.field_format.ok_or(Error::MissingRequiredTag)?,
        address,
        chain_id,
    });
    Ok(Response::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::TAG_DER_SIGNATURE;
    use crate::verify::test_support::sign_payload;
    use alloc::vec::Vec;

    fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
        let mut out = alloc::vec![tag, value.len() as u8];
        out.extend_from_slice(value);
        out
    }

    fn descriptor(name: &[u8], format: u8, address: [u8; 20]) -> Vec<u8> {
        let mut payload = tlv(TAG_STRUCT_TYPE, &[STRUCT_TYPE]);
        payload.extend_from_slice(&tlv(TAG_STRUCT_VERSION, &[STRUCT_VERSION]));
        payload.extend_from_slice(&tlv(TAG_DISPLAY_NAME, name));
        payload.extend_from_slice(&tlv(TAG_FIELD_FORMAT, &[format]));
        payload.extend_from_slice(&tlv(TAG_ADDRESS, &address));
        payload.extend_from_slice(&tlv(TAG_CHAIN_ID, &1u64.to_be_bytes()));
        let signature = sign_payload(&payload);
        payload.extend_from_slice(&tlv(TAG_DER_SIGNATURE, &signature));
        payload
    }

    fn framed(payload: Vec<u8>) -> CommandFrame {
        let mut body = (payload.len() as u16).to_be_bytes().to_vec();
        body.extend_from_slice(&payload);
        CommandFrame::first(0x26, 0x00, body)
    }

    #[test]
    fn test_fields_accumulate_per_context() {
        let mut state = DeviceState::new_for_tests();
        let contract = [0xC0; 20];
        let frame = framed(descriptor(b"Amount", FORMAT_AMOUNT, contract));
        assert_eq!(handle(&mut state, &frame), Ok(Response::Ok));
        let frame = framed(descriptor(b"Recipient", FORMAT_ADDRESS, contract));
        assert_eq!(handle(&mut state, &frame), Ok(Response::Ok));
        assert_eq!(state.field_table.len(), 2);
    }

    #[test]
    fn test_new_context_replaces_table() {
        let mut state = DeviceState::new_for_tests();
        let frame = framed(descriptor(b"Amount", FORMAT_AMOUNT, [0xC0; 20]));
        assert_eq!(handle(&mut state, &frame), Ok(Response::Ok));
        let frame = framed(descriptor(b"Deadline", FORMAT_DATETIME, [0xC1; 20]));
        assert_eq!(handle(&mut state, &frame), Ok(Response::Ok));
        assert_eq!(state.field_table.len(), 1);
        assert_eq!(state.field_table[0].display_name, "Deadline");
    }

    #[test]
    fn test_table_capacity() {
        let mut state = DeviceState::new_for_tests();
        let contract = [0xC0; 20];
        for i in 0..MAX_FIELDS {
            let name = alloc::format!("Field {i}");
            let frame = framed(descriptor(name.as_bytes(), FORMAT_RAW, contract));
            assert_eq!(handle(&mut state, &frame), Ok(Response::Ok));
        }
        let frame = framed(descriptor(b"One too many", FORMAT_RAW, contract));
        assert_eq!(handle(&mut state, &frame), Err(Error::ResourceOverflow));
        assert_eq!(state.field_table.len(), MAX_FIELDS);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut state = DeviceState::new_for_tests();
        let frame = framed(descriptor(b"Amount", 0x04, [0xC0; 20]));
        assert_eq!(handle(&mut state, &frame), Err(Error::InvalidField));
    }
}
