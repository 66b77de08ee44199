//! Safe account and signer descriptors.
//!
//! A Safe descriptor announces a multisig account: its address, its
//! approval threshold and how many signers will follow. Each signer
//! descriptor then binds one address and role to the committed Safe.
//! Both descriptors carry the armed device challenge, which makes a
//! captured descriptor worthless for replay.

use common::error::Error;
use common::message::{CommandFrame, Response};
use common::types::EthAddress;

use crate::chunk::{self, Transfer};
use crate::state::{DeviceState, SafeAccount, SignerEntry, SignerRole};
use crate::tlv::{Schema, TagSpec, TlvRecord};
use crate::verify::KeyUsage;

/// Provide the Safe account descriptor.
pub const SEL_SAFE: u8 = 0x00;
/// Provide one signer descriptor for the committed Safe.
pub const SEL_SIGNER: u8 = 0x01;

const TAG_STRUCT_TYPE: u8 = 0x01;
const TAG_STRUCT_VERSION: u8 = 0x02;
const TAG_CHALLENGE: u8 = 0x12;
const TAG_ADDRESS: u8 = 0x22;
const TAG_THRESHOLD: u8 = 0xA0;
const TAG_SIGNERS_COUNT: u8 = 0xA1;
const TAG_ROLE: u8 = 0xA2;

const SAFE_STRUCT_TYPE: u8 = 0x27;
const SIGNER_STRUCT_TYPE: u8 = 0x0A;
const STRUCT_VERSION: u8 = 0x01;

const ROLE_SIGNER: u8 = 0x00;
const ROLE_PROPOSER: u8 = 0x01;

#[derive(Default)]
struct SafePayload {
    challenge: Option<u32>,
    address: Option<EthAddress>,
    threshold: Option<u8>,
    signers_count: Option<u8>,
}

#[derive(Default)]
struct SignerPayload {
    challenge: Option<u32>,
    address: Option<EthAddress>,
    role: Option<SignerRole>,
}

fn expect_byte(record: &TlvRecord<'_>, value: u8) -> Result<(), Error> {
    if record.value != [value] {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn challenge_value(record: &TlvRecord<'_>) -> Result<u32, Error> {
    let bytes: [u8; 4] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    Ok(u32::from_be_bytes(bytes))
}

fn address_value(record: &TlvRecord<'_>) -> Result<EthAddress, Error> {
    record.value.try_into().map_err(|_| Error::InvalidField)
}

fn handle_safe_type(record: &TlvRecord<'_>, _out: &mut SafePayload) -> Result<(), Error> {
    expect_byte(record, SAFE_STRUCT_TYPE)
}

fn handle_safe_version(record: &TlvRecord<'_>, _out: &mut SafePayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_VERSION)
}

fn handle_safe_challenge(record: &TlvRecord<'_>, out: &mut SafePayload) -> Result<(), Error> {
    out.challenge = Some(challenge_value(record)?);
    Ok(())
}

fn handle_safe_address(record: &TlvRecord<'_>, out: &mut SafePayload) -> Result<(), Error> {
    out.address = Some(address_value(record)?);
    Ok(())
}

fn handle_threshold(record: &TlvRecord<'_>, out: &mut SafePayload) -> Result<(), Error> {
    if record.len() != 1 || record.value[0] == 0 {
        return Err(Error::InvalidField);
    }
    out.threshold = Some(record.value[0]);
    Ok(())
}

fn handle_signers_count(record: &TlvRecord<'_>, out: &mut SafePayload) -> Result<(), Error> {
    if record.len() != 1 || record.value[0] == 0 {
        return Err(Error::InvalidField);
    }
    out.signers_count = Some(record.value[0]);
    Ok(())
}

static SAFE_SCHEMA: Schema<SafePayload> = Schema {
    tags: &[
        TagSpec {
            tag: TAG_STRUCT_TYPE,
            required: true,
            unique: true,
            handler: handle_safe_type,
        },
        TagSpec {
            tag: TAG_STRUCT_VERSION,
            required: true,
            unique: true,
            handler: handle_safe_version,
        },
        TagSpec {
            tag: TAG_CHALLENGE,
            required: true,
            unique: true,
            handler: handle_safe_challenge,
        },
        TagSpec {
            tag: TAG_ADDRESS,
            required: true,
            unique: true,
            handler: handle_safe_address,
        },
        TagSpec {
            tag: TAG_THRESHOLD,
            required: true,
            unique: true,
            handler: handle_threshold,
        },
        TagSpec {
            tag: TAG_SIGNERS_COUNT,
            required: true,
            unique: true,
            handler: handle_signers_count,
        },
    ],
    usage: KeyUsage::AccountSafety,
};

fn handle_signer_type(record: &TlvRecord<'_>, _out: &mut SignerPayload) -> Result<(), Error> {
    expect_byte(record, SIGNER_STRUCT_TYPE)
}

fn handle_signer_version(record: &TlvRecord<'_>, _out: &mut SignerPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_VERSION)
}

fn handle_signer_challenge(record: &TlvRecord<'_>, out: &mut SignerPayload) -> Result<(), Error> {
    out.challenge = Some(challenge_value(record)?);
    Ok(())
}

fn handle_signer_address(record: &TlvRecord<'_>, out: &mut SignerPayload) -> Result<(), Error> {
    out.address = Some(address_value(record)?);
    Ok(())
}

fn handle_role(record: &TlvRecord<'_>, out: &mut SignerPayload) -> Result<(), Error> {
    out.role = Some(match record.value {
        [ROLE_SIGNER] => SignerRole::Signer,
        [ROLE_PROPOSER] => SignerRole::Proposer,
        _ => return Err(Error::InvalidField),
    });
    Ok(())
}

static SIGNER_SCHEMA: Schema<SignerPayload> = Schema {
    tags: &[
        TagSpec {
            tag: TAG_STRUCT_TYPE,
            required: true,
            unique: true,
            handler: handle_signer_type,
        },
        TagSpec {
            tag: TAG_STRUCT_VERSION,
            required: true,
            unique: true,
            handler: handle_signer_version,
        },
        TagSpec {
            tag: TAG_CHALLENGE,
            required: true,
            unique: true,
            handler: handle_signer_challenge,
        },
        TagSpec {
            tag: TAG_ADDRESS,
            required: true,
            unique: true,
            handler: handle_signer_address,
        },
        TagSpec {
            tag: TAG_ROLE,
            required: true,
            unique: true,
            handler: handle_role,
        },
    ],
    usage: KeyUsage::AccountSafety,
};

pub fn handle(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    match frame.selector {
        SEL_SAFE => handle_safe(state, frame),
        SEL_SIGNER => handle_signer(state, frame),
        _ => Err(Error::InvalidCommand),
    }
}

fn check_challenge(state: &DeviceState, received: Option<u32>) -> Result<(), Error> {
    let armed = state.challenge.ok_or(Error::InvalidField)?;
    if received != Some(armed) {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn handle_safe(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    let payload = match chunk::ingest_sized(&mut state.assembly, frame)? {
        Transfer::Pending => return Ok(Response::Pending),
        Transfer::Complete(bytes) => bytes,
    };
    let parsed = crate::tlv::parse(&SAFE_SCHEMA, &payload, state.anchor())?;
    check_challenge(state, parsed.challenge)?;
    // A committed descriptor must be consumed by its signers before a
    // new one is accepted.
    if state.safe.as_ref().is_some_and(|safe| !safe.is_complete()) {
        return Err(Error::InvalidCommand);
    }
    let threshold = parsed.threshold.ok_or(Error::MissingRequiredTag)?;
    let signers_count = parsed.signers_count.ok_or(Error::MissingRequiredTag)?;
    if threshold > signers_count {
        return Err(Error::InvalidField);
    }
    state.safe = Some(SafeAccount {
        address: parsed.address.ok_or(Error::MissingRequiredTag)?,
        threshold,
        signers_count,
        signers: alloc::vec::Vec::new(),
    });
    state.challenge = None;
    Ok(Response::Ok)
}

fn handle_signer(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    let payload = match chunk::ingest_sized(&mut state.assembly, frame)? {
        Transfer::Pending => return Ok(Response::Pending),
        Transfer::Complete(bytes) => bytes,
    };
    let parsed = crate::tlv::parse(&SIGNER_SCHEMA, &payload, state.anchor())?;
    check_challenge(state, parsed.challenge)?;
    let address = parsed.address.ok_or(Error::MissingRequiredTag)?;
    let role = parsed.role.ok_or(Error::MissingRequiredTag)?;
    let Some(safe) = state.safe.as_mut() else {
        return Err(Error::InvalidCommand);
    };
    if safe.is_complete() {
        return Err(Error::InvalidCommand);
    }
    if safe.signers.iter().any(|signer| signer.address == address) {
        return Err(Error::InvalidField);
    }
    safe.signers.push(SignerEntry { address, role });
    if safe.is_complete() {
        state.challenge = None;
    }
    Ok(Response::Ok)
}
