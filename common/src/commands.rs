//! Command identifiers for the signer wire protocol.
//!
//! Each "provide information" command carries an authenticated TLV
//! payload; the identifier selects which declarative tag schema the
//! device applies to it.

use serde::{Deserialize, Serialize};

/// Command identifiers understood by the device.
///
/// Each command has a unique byte identifier used in the wire protocol.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Provide verified ERC-20 token metadata.
    ProvideTokenInformation = 0x0A,
    /// Arm and return a fresh anti-replay challenge.
    GetChallenge = 0x20,
    /// Provide verified NFT collection metadata.
    ProvideNftInformation = 0x14,
    /// Provide a verified name/address binding.
    ProvideTrustedName = 0x22,
    /// Provide a verified clear-signing field table for one contract.
    ProvideTransactionInfo = 0x26,
    /// Register a dynamic network descriptor.
    ProvideNetworkConfiguration = 0x30,
    /// Build an EIP-7702 authorization hash from verified fields.
    SignAuthorization7702 = 0x32,
    /// Provide a transaction-risk simulation report.
    ProvideTxSimulation = 0x34,
    /// Provide Safe account and signer descriptors.
    ProvideSafeAccount = 0x36,
}

impl Command {
    /// Returns the command identifier byte.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0A => Ok(Command::ProvideTokenInformation),
            0x14 => Ok(Command::ProvideNftInformation),
            0x20 => Ok(Command::GetChallenge),
            0x22 => Ok(Command::ProvideTrustedName),
            0x26 => Ok(Command::ProvideTransactionInfo),
            0x30 => Ok(Command::ProvideNetworkConfiguration),
            0x32 => Ok(Command::SignAuthorization7702),
            0x34 => Ok(Command::ProvideTxSimulation),
            0x36 => Ok(Command::ProvideSafeAccount),
            _ => Err(()),
        }
    }
}

/// Chunk role of a command frame within a multi-frame transfer.
///
/// The byte values follow smart-card P1 conventions: a first chunk is
/// flagged with 0x01, following chunks with 0x00.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkRole {
    /// Continuation of an in-flight transfer.
    Continuation = 0x00,
    /// First frame of a transfer; resets any in-flight assembly.
    First = 0x01,
}
