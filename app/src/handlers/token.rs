//! Token and NFT collection descriptors.
//!
//! Both descriptors feed the display caches consulted while rendering
//! a transaction: a known token gets its ticker and decimals shown, a
//! known NFT collection its name. NFT descriptors use the common
//! length-prefixed framing; token descriptors keep the legacy framing
//! with no declared size, where the device re-parses after every frame
//! and accepts once the payload is whole and verified.

use alloc::string::String;

use common::error::Error;
use common::message::{CommandFrame, Response};
use common::types::EthAddress;

use crate::chunk::{self, Transfer};
use crate::handlers::network::MAX_CHAIN_ID;
use crate::state::{DeviceState, NftEntry, TokenEntry};
use crate::tlv::{Schema, TagSpec, TlvRecord};
use crate::utils::is_printable_ascii;
use crate::verify::KeyUsage;

const TAG_STRUCT_TYPE: u8 = 0x01;
const TAG_STRUCT_VERSION: u8 = 0x02;
const TAG_ADDRESS: u8 = 0x22;
const TAG_CHAIN_ID: u8 = 0x23;
const TAG_TICKER: u8 = 0x24;
const TAG_DECIMALS: u8 = 0x25;
const TAG_COLLECTION_NAME: u8 = 0x52;

const TOKEN_STRUCT_TYPE: u8 = 0x05;
const NFT_STRUCT_TYPE: u8 = 0x06;
const STRUCT_VERSION: u8 = 0x01;

const MAX_TICKER_LEN: usize = 10;
const MAX_COLLECTION_NAME_LEN: usize = 32;

#[derive(Default)]
struct TokenPayload {
    address: Option<EthAddress>,
    chain_id: Option<u64>,
    ticker: String,
    decimals: Option<u8>,
}

#[derive(Default)]
struct NftPayload {
    address: Option<EthAddress>,
    chain_id: Option<u64>,
    collection_name: String,
}

fn expect_byte(record: &TlvRecord<'_>, value: u8) -> Result<(), Error> {
    if record.value != [value] {
        return Err(Error::InvalidField);
    }
    Ok(())
}

fn address_value(record: &TlvRecord<'_>) -> Result<EthAddress, Error> {
    record.value.try_into().map_err(|_| Error::InvalidField)
}

fn chain_id_value(record: &TlvRecord<'_>) -> Result<u64, Error> {
    let bytes: [u8; 8] = record.value.try_into().map_err(|_| Error::InvalidField)?;
    let chain_id = u64::from_be_bytes(bytes);
    if !(1..=MAX_CHAIN_ID).contains(&chain_id) {
        return Err(Error::InvalidField);
    }
    Ok(chain_id)
}

fn printable_string(record: &TlvRecord<'_>, max_len: usize) -> Result<String, Error> {
    if record.is_empty() || record.len() > max_len || !is_printable_ascii(record.value) {
        return Err(Error::InvalidField);
    }
    String::from_utf8(record.value.to_vec()).map_err(|_| Error::InvalidField)
}

fn handle_token_type(record: &TlvRecord<'_>, _out: &mut TokenPayload) -> Result<(), Error> {
    expect_byte(record, TOKEN_STRUCT_TYPE)
}

fn handle_token_version(record: &TlvRecord<'_>, _out: &mut TokenPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_VERSION)
}

fn handle_token_address(record: &TlvRecord<'_>, out: &mut TokenPayload) -> Result<(), Error> {
    out.address = Some(address_value(record)?);
    Ok(())
}

fn handle_token_chain_id(record: &TlvRecord<'_>, out: &mut TokenPayload) -> Result<(), Error> {
    out.chain_id = Some(chain_id_value(record)?);
    Ok(())
}

fn handle_ticker(record: &TlvRecord<'_>, out: &mut TokenPayload) -> Result<(), Error> {
    out.ticker = printable_string(record, MAX_TICKER_LEN)?;
    Ok(())
}

fn handle_decimals(record: &TlvRecord<'_>, out: &mut TokenPayload) -> Result<(), Error> {
    if record.len() != 1 {
        return Err(Error::InvalidField);
    }
    out.decimals = Some(record.value[0]);
    Ok(())
}

static TOKEN_SCHEMA: Schema<TokenPayload> = Schema {
    tags: &[
        TagSpec {
            tag: TAG_STRUCT_TYPE,
            required: true,
            unique: true,
            handler: handle_token_type,
        },
        TagSpec {
            tag: TAG_STRUCT_VERSION,
            required: true,
            unique: true,
            handler: handle_token_version,
        },
        TagSpec {
            tag: TAG_ADDRESS,
            required: true,
            unique: true,
            handler: handle_token_address,
        },
        TagSpec {
            tag: TAG_CHAIN_ID,
            required: true,
            unique: true,
            handler: handle_token_chain_id,
        },
        TagSpec {
            tag: TAG_TICKER,
            required: true,
            unique: true,
            handler: handle_ticker,
        },
        TagSpec {
            tag: TAG_DECIMALS,
            required: true,
            unique: true,
            handler: handle_decimals,
        },
    ],
    usage: KeyUsage::CoinMetadata,
};

fn handle_nft_type(record: &TlvRecord<'_>, _out: &mut NftPayload) -> Result<(), Error> {
    expect_byte(record, NFT_STRUCT_TYPE)
}

fn handle_nft_version(record: &TlvRecord<'_>, _out: &mut NftPayload) -> Result<(), Error> {
    expect_byte(record, STRUCT_VERSION)
}

fn handle_nft_address(record: &TlvRecord<'_>, out: &mut NftPayload) -> Result<(), Error> {
    out.address = Some(address_value(record)?);
    Ok(())
}

fn handle_nft_chain_id(record: &TlvRecord<'_>, out: &mut NftPayload) -> Result<(), Error> {
    out.chain_id = Some(chain_id_value(record)?);
    Ok(())
}

fn handle_collection_name(record: &TlvRecord<'_>, out: &mut NftPayload) -> Result<(), Error> {
    out.collection_name = printable_string(record, MAX_COLLECTION_NAME_LEN)?;
    Ok(())
}

static NFT_SCHEMA: Schema<NftPayload> = Schema {
    tags: &[
        TagSpec {
            tag: TAG_STRUCT_TYPE,
            required: true,
            unique: true,
            handler: handle_nft_type,
        },
        TagSpec {
            tag: TAG_STRUCT_VERSION,
            required: true,
            unique: true,
            handler: handle_nft_version,
        },
        TagSpec {
            tag: TAG_ADDRESS,
            required: true,
            unique: true,
            handler: handle_nft_address,
        },
        TagSpec {
            tag: TAG_CHAIN_ID,
            required: true,
            unique: true,
            handler: handle_nft_chain_id,
        },
        TagSpec {
            tag: TAG_COLLECTION_NAME,
            required: true,
            unique: true,
            handler: handle_collection_name,
        },
    ],
    usage: KeyUsage::NftMetadata,
};

/// Token descriptors, legacy framing: no declared size. The payload is
/// re-parsed after every frame; an incomplete parse keeps the
/// assembly alive, any other failure discards it.
pub fn handle_token(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    chunk::ingest_incremental(&mut state.assembly, frame)?;
    let result = {
        let assembled = state.assembly.as_ref().ok_or(Error::InvalidChunk)?;
        crate::tlv::parse(&TOKEN_SCHEMA, assembled.bytes(), state.anchor())
    };
    let parsed = match result {
        Ok(parsed) => parsed,
        // Incomplete records or not-yet-seen tags mean more frames are
        // coming; everything else is fatal.
        Err(Error::Truncated | Error::MissingRequiredTag) => return Ok(Response::Pending),
        Err(e) => {
            state.assembly = None;
            return Err(e);
        }
    };
    state.assembly = None;
    state.insert_token(TokenEntry {
        address: parsed.address.ok_or(Error::MissingRequiredTag)?,
        ticker: parsed.ticker,
        decimals: parsed.decimals.ok_or(Error::MissingRequiredTag)?,
        chain_id: parsed.chain_id.ok_or(Error::MissingRequiredTag)?,
    });
    Ok(Response::Ok)
}

/// NFT collection descriptors, length-prefixed framing.
pub fn handle_nft(state: &mut DeviceState, frame: &CommandFrame) -> Result<Response, Error> {
    let payload = match chunk::ingest_sized(&mut state.assembly, frame)? {
        Transfer::Pending => return Ok(Response::Pending),
        Transfer::Complete(bytes) => bytes,
    };
    let parsed = crate::tlv::parse(&NFT_SCHEMA, &payload, state.anchor())?;
    state.insert_nft(NftEntry {
        address: parsed.address.ok_or(Error::MissingRequiredTag)?,
        collection_name: parsed.collection_name,
        chain_id: parsed.chain_id.ok_or(Error::MissingRequiredTag)?,
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

    fn token_descriptor() -> Vec<u8> {
        let mut payload = tlv(TAG_STRUCT_TYPE, &[TOKEN_STRUCT_TYPE]);
        payload.extend_from_slice(&tlv(TAG_STRUCT_VERSION, &[STRUCT_VERSION]));
        payload.extend_from_slice(&tlv(TAG_ADDRESS, &[0xAA; 20]));
        payload.extend_from_slice(&tlv(TAG_CHAIN_ID, &1u64.to_be_bytes()));
        payload.extend_from_slice(&tlv(TAG_TICKER, b"USDC"));
        payload.extend_from_slice(&tlv(TAG_DECIMALS, &[6]));
        let signature = sign_payload(&payload);
        payload.extend_from_slice(&tlv(TAG_DER_SIGNATURE, &signature));
        payload
    }

    fn nft_descriptor() -> Vec<u8> {
        let mut payload = tlv(TAG_STRUCT_TYPE, &[NFT_STRUCT_TYPE]);
        payload.extend_from_slice(&tlv(TAG_STRUCT_VERSION, &[STRUCT_VERSION]));
        payload.extend_from_slice(&tlv(TAG_ADDRESS, &[0xBB; 20]));
        payload.extend_from_slice(&tlv(TAG_CHAIN_ID, &1u64.to_be_bytes()));
        payload.extend_from_slice(&tlv(TAG_COLLECTION_NAME, b"Cool Cats"));
        let signature = sign_payload(&payload);
        payload.extend_from_slice(&tlv(TAG_DER_SIGNATURE, &signature));
        payload
    }

    #[test]
    fn test_token_single_frame() {
        let mut state = DeviceState::new_for_tests();
        let frame = CommandFrame::first(0x0A, 0x00, token_descriptor());
        assert_eq!(handle_token(&mut state, &frame), Ok(Response::Ok));
        assert_eq!(state.tokens[0].ticker, "USDC");
        assert_eq!(state.tokens[0].decimals, 6);
        assert!(state.assembly.is_none());
    }

    #[test]
    fn test_token_incremental_completion() {
        // No length prefix: the device answers Pending until the parse
        // is satisfied, even across a mid-record split.
        let mut state = DeviceState::new_for_tests();
        let descriptor = token_descriptor();
        let (a, rest) = descriptor.split_at(7);
        let (b, c) = rest.split_at(21);
        let frame = CommandFrame::first(0x0A, 0x00, a.to_vec());
        assert_eq!(handle_token(&mut state, &frame), Ok(Response::Pending));
        let frame = CommandFrame::next(0x0A, 0x00, b.to_vec());
        assert_eq!(handle_token(&mut state, &frame), Ok(Response::Pending));
        let frame = CommandFrame::next(0x0A, 0x00, c.to_vec());
        assert_eq!(handle_token(&mut state, &frame), Ok(Response::Ok));
        assert_eq!(state.tokens.len(), 1);
    }

    #[test]
    fn test_token_bad_tag_discards_assembly() {
        let mut state = DeviceState::new_for_tests();
        let frame = CommandFrame::first(0x0A, 0x00, alloc::vec![0x7E, 0x01, 0x00]);
        assert_eq!(handle_token(&mut state, &frame), Err(Error::UnknownTag));
        assert!(state.assembly.is_none());
        assert!(state.tokens.is_empty());
    }

    #[test]
    fn test_nft_descriptor_stored() {
        let mut state = DeviceState::new_for_tests();
        let descriptor = nft_descriptor();
        let mut body = (descriptor.len() as u16).to_be_bytes().to_vec();
        body.extend_from_slice(&descriptor);
        let frame = CommandFrame::first(0x14, 0x00, body);
        assert_eq!(handle_nft(&mut state, &frame), Ok(Response::Ok));
        assert_eq!(state.nfts[0].collection_name, "Cool Cats");
    }

    #[test]
    fn test_token_cache_eviction() {
        use crate::state::TOKEN_CACHE_SLOTS;
        let mut state = DeviceState::new_for_tests();
        for i in 0..=TOKEN_CACHE_SLOTS as u8 {
            state.insert_token(TokenEntry {
                address: [i; 20],
                ticker: String::from("TKN"),
                decimals: 18,
                chain_id: 1,
            });
        }
        assert_eq!(state.tokens.len(), TOKEN_CACHE_SLOTS);
        // The first insert was evicted.
        assert!(state.tokens.iter().all(|t| t.address != [0u8; 20]));
    }
}
