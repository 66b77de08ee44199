//! TLV tag dispatcher.
//!
//! Parses a reassembled payload as a sequence of Tag-Length-Value
//! records against a declarative per-command schema, enforcing
//! completeness and uniqueness, hashing every non-signature record in
//! wire order, and verifying the detached signature before any field
//! is trusted.
//!
//! Tag and length use DER-style encoding: a single byte for values
//! 0..=0x7F, or a long-form prefix whose low 7 bits give the count of
//! following big-endian magnitude bytes (up to 4). Schemas that only
//! ever use single-byte tags are simply the special case where long
//! form never occurs.
//!
//! # Security Model
//!
//! Unknown tags are fatal. Unlike many text protocols, unknown fields
//! are never silently skipped: skipping would let unsigned or
//! unvalidated fields slip past review.

use common::error::Error;
use common::types::Hash256;

use crate::verify::{HashAccumulator, KeyUsage, TrustAnchor};

/// DER long-form marker bit.
const DER_LONG_FORM_FLAG: u8 = 0x80;
/// Value mask of a DER first byte.
const DER_FIRST_BYTE_VALUE_MASK: u8 = 0x7F;

/// Detached-signature tag shared by every schema.
pub const TAG_DER_SIGNATURE: u8 = 0x15;

/// Plausible DER ECDSA signature size bounds.
const MIN_DER_SIG_LEN: usize = 8;
const MAX_DER_SIG_LEN: usize = 72;

/// One decoded TLV record.
///
/// The value borrows from the assembly buffer; records are transient
/// and never outlive one parse pass.
pub struct TlvRecord<'a> {
    /// Record tag.
    pub tag: u8,
    /// Record value, possibly empty.
    pub value: &'a [u8],
}

impl TlvRecord<'_> {
    /// Length of the record value in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// True for a zero-length value (legal, not an error).
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Schema entry for one tag.
pub struct TagSpec<P: 'static> {
    /// Tag this entry matches.
    pub tag: u8,
    /// The payload is incomplete without this tag.
    pub required: bool,
    /// This tag may appear at most once.
    pub unique: bool,
    /// Validates the value and writes it into the payload under
    /// construction. Failure aborts the whole parse.
    pub handler: fn(&TlvRecord<'_>, &mut P) -> Result<(), Error>,
}

/// Declarative schema for one command type.
///
/// The signature tag is handled by the dispatcher itself: its value is
/// captured as the detached signature, is never hashed, and is always
/// required and unique.
pub struct Schema<P: 'static> {
    /// Tag table, at most 32 entries (reception state is a bitmask).
    pub tags: &'static [TagSpec<P>],
    /// Key-usage class a certificate-scoped anchor must carry.
    pub usage: KeyUsage,
}

/// Decodes one DER-encoded value (up to 4 bytes long).
///
/// Returns the decoded value and how many payload bytes it took.
fn der_decode(payload: &[u8]) -> Result<(u32, usize), Error> {
    let first = *payload.first().ok_or(Error::Truncated)?;
    if first & DER_LONG_FORM_FLAG == 0 {
        return Ok((u32::from(first), 1));
    }
    let byte_length = usize::from(first & DER_FIRST_BYTE_VALUE_MASK);
    if byte_length == 0 || byte_length > 4 {
        return Err(Error::InvalidField);
    }
    if payload.len() < 1 + byte_length {
        return Err(Error::Truncated);
    }
    let mut value = 0u32;
    for &byte in &payload[1..1 + byte_length] {
        value = (value << 8) | u32::from(byte);
    }
    Ok((value, 1 + byte_length))
}

/// Decodes a DER value that must fit in a u8 (tags).
fn der_decode_u8(payload: &[u8]) -> Result<(u8, usize), Error> {
    let (value, read) = der_decode(payload)?;
    let value = u8::try_from(value).map_err(|_| Error::InvalidField)?;
    Ok((value, read))
}

/// Parses a complete TLV payload against a schema.
///
/// On success the fully populated payload is returned; on any failure
/// the partially built payload is dropped whole and nothing is ever
/// half-committed.
pub fn parse<P: Default>(
    schema: &Schema<P>,
    payload: &[u8],
    anchor: &TrustAnchor,
) -> Result<P, Error> {
    let mut out = P::default();
    let mut accumulator = HashAccumulator::init();
    let mut signature: Option<&[u8]> = None;
    // One reception bit per schema entry, checked against the required
    // set once all bytes are consumed.
    let mut received: u32 = 0;
    let mut offset = 0usize;

    while offset < payload.len() {
        let record_start = offset;
        let (tag, read) = der_decode_u8(&payload[offset..])?;
        offset += read;
        let (length, read) = der_decode(&payload[offset..])?;
        offset += read;
        let length = length as usize;
        if payload.len() - offset < length {
            return Err(Error::Truncated);
        }
        let value = &payload[offset..offset + length];
        offset += length;

        let record = TlvRecord { tag, value };

        if tag == TAG_DER_SIGNATURE {
            if signature.is_some() {
                return Err(Error::DuplicateTag);
            }
            if value.len() < MIN_DER_SIG_LEN || value.len() > MAX_DER_SIG_LEN {
                return Err(Error::InvalidField);
            }
            // The signature record is captured, never hashed.
            signature = Some(value);
            continue;
        }

        let index = schema
            .tags
            .iter()
            .position(|spec| spec.tag == tag)
            .ok_or(Error::UnknownTag)?;
        let spec = &schema.tags[index];
        let bit = 1u32 << index;
        if spec.unique && received & bit != 0 {
            return Err(Error::DuplicateTag);
        }
        (spec.handler)(&record, &mut out)?;
        accumulator.update(&payload[record_start..offset]);
        received |= bit;
    }

    for (index, spec) in schema.tags.iter().enumerate() {
        if spec.required && received & (1 << index) == 0 {
            return Err(Error::MissingRequiredTag);
        }
    }
    let signature = signature.ok_or(Error::MissingRequiredTag)?;

    let digest: Hash256 = accumulator.finalize();
    anchor.verify(&digest, signature, schema.usage)?;
    Ok(out)
}
