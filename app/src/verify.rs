//! Hash-and-verify engine.
//!
//! Every non-signature TLV record is streamed into a SHA-256
//! accumulator in wire order; the finalized digest is then checked
//! against a detached DER-encoded ECDSA signature and the device trust
//! anchor. The device cannot independently fact-check any metadata it
//! is fed, so this verification is the single point standing between
//! an attacker-controlled host and a misleading approval screen.
//!
//! # Security Model
//!
//! Verification is strict: any mismatch (digest, key usage, curve, or
//! signature encoding) yields the same `TrustViolation` outcome. No
//! partial-trust levels exist.

use common::error::Error;
use common::types::Hash256;

use hex_literal::hex;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};

/// Development metadata-signing key (SEC1 compressed).
///
/// This is the secp256k1 generator point, i.e. the public key of the
/// scalar 1, so development hosts can mint acceptable signatures.
/// Production firmware embeds the vendor key here instead.
pub const DEV_METADATA_KEY: [u8; 33] =
    hex!("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");

/// Certificate key-usage classes.
///
/// A certificate-scoped anchor is only acceptable for the usage class
/// the command's schema expects; a certificate valid for the wrong
/// usage is rejected even if cryptographically well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyUsage {
    /// NFT collection metadata.
    NftMetadata = 0x03,
    /// Name/address bindings.
    TrustedName = 0x04,
    /// Token and network metadata.
    CoinMetadata = 0x08,
    /// Transaction-risk simulation reports.
    TransactionChecks = 0x0A,
    /// Safe account and signer descriptors.
    AccountSafety = 0x0B,
    /// Clear-signing field descriptions.
    Calldata = 0x0C,
}

/// Elliptic-curve identifiers carried by certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CurveId {
    /// secp256k1, the only curve this engine verifies on.
    Secp256k1 = 0x21,
}

/// Incremental SHA-256 accumulator over the received record bytes.
pub struct HashAccumulator {
    inner: Sha256,
}

impl HashAccumulator {
    /// Starts a fresh accumulator.
    pub fn init() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feeds raw record bytes, in wire order.
    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Finalizes into a 32-byte digest.
    pub fn finalize(self) -> Hash256 {
        self.inner.finalize().into()
    }
}

/// The public key a detached metadata signature is verified against.
///
/// Either a fixed key compiled into the device, or a key extracted
/// from a validated certificate scoped to a usage class and curve.
/// Certificate chain validation itself happens in the PKI subsystem;
/// this engine only sees its outcome.
pub enum TrustAnchor {
    /// Fixed embedded key (legacy path, no usage scoping).
    FixedKey(VerifyingKey),
    /// Certificate-derived key, scoped to a usage class and curve.
    Certificate {
        /// Leaf certificate public key.
        key: VerifyingKey,
        /// Usage class the certificate was issued for.
        usage: KeyUsage,
        /// Curve the certificate was issued for.
        curve: CurveId,
    },
}

impl TrustAnchor {
    /// Builds a fixed-key anchor from SEC1 bytes.
    pub fn fixed_from_sec1(bytes: &[u8]) -> Result<Self, Error> {
        let key = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| Error::TrustViolation)?;
        Ok(TrustAnchor::FixedKey(key))
    }

    /// Builds a certificate-scoped anchor from SEC1 bytes.
    pub fn certificate_from_sec1(
        bytes: &[u8],
        usage: KeyUsage,
        curve: CurveId,
    ) -> Result<Self, Error> {
        let key = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| Error::TrustViolation)?;
        Ok(TrustAnchor::Certificate { key, usage, curve })
    }

    /// Verifies a detached DER signature over a digest.
    ///
    /// `expected` is the usage class the calling schema demands. Every
    /// failure mode collapses into `TrustViolation`.
    pub fn verify(
        &self,
        digest: &Hash256,
        signature: &[u8],
        expected: KeyUsage,
    ) -> Result<(), Error> {
        let key = match self {
            TrustAnchor::FixedKey(key) => key,
            TrustAnchor::Certificate { key, usage, curve } => {
                if *usage != expected || *curve != CurveId::Secp256k1 {
                    return Err(Error::TrustViolation);
                }
                key
            }
        };
        let signature = Signature::from_der(signature).map_err(|_| Error::TrustViolation)?;
        key.verify_prehash(digest, &signature)
            .map_err(|_| Error::TrustViolation)
    }
}
