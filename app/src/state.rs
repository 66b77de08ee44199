//! Device-wide mutable state shared by all command handlers.
//!
//! Every handler follows the same commit discipline: parse and validate
//! the whole payload first, then mutate the state in one step. A payload
//! that fails anywhere leaves the state exactly as it was.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use common::types::{EthAddress, Hash256};

use crate::chunk::Assembly;
use crate::utils::format_address;
use crate::verify::{HashAccumulator, TrustAnchor};

/// Number of dynamic network slots.
pub const NETWORK_SLOTS: usize = 2;
/// Maximum cached token metadata entries before FIFO eviction.
pub const TOKEN_CACHE_SLOTS: usize = 5;
/// Maximum cached NFT collection entries before FIFO eviction.
pub const NFT_CACHE_SLOTS: usize = 5;
/// Maximum cached trusted names before FIFO eviction.
pub const TRUSTED_NAME_SLOTS: usize = 4;

/// A dynamically registered network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEntry {
    pub chain_id: u64,
    pub name: String,
    pub ticker: String,
    pub icon_hash: Option<Hash256>,
}

/// Cached ERC-20 token metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub address: EthAddress,
    pub ticker: String,
    pub decimals: u8,
    pub chain_id: u64,
}

/// Cached NFT collection metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftEntry {
    pub address: EthAddress,
    pub collection_name: String,
    pub chain_id: u64,
}

/// A verified binding between a display name and an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedNameEntry {
    pub name: String,
    pub address: EthAddress,
    pub chain_id: u64,
    pub name_type: u8,
    pub name_source: u8,
}

impl fmt::Display for TrustedNameEntry {
    /// Approval-screen form: the name with the bound address beside
    /// it, so a spoofed name cannot fully hide what it resolves to.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, format_address(&self.address))
    }
}

/// Role of a signer inside a Safe account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    Signer,
    Proposer,
}

/// A signer bound to the committed Safe descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerEntry {
    pub address: EthAddress,
    pub role: SignerRole,
}

/// A committed Safe account descriptor, consumed once its signers
/// have been fully provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeAccount {
    pub address: EthAddress,
    pub threshold: u8,
    pub signers_count: u8,
    pub signers: Vec<SignerEntry>,
}

impl SafeAccount {
    /// True once every announced signer has been received.
    pub fn is_complete(&self) -> bool {
        self.signers.len() == usize::from(self.signers_count)
    }
}

/// Outcome of a transaction pre-simulation, bound to one transaction hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationEntry {
    pub address: EthAddress,
    pub chain_id: Option<u64>,
    pub tx_hash: Hash256,
    pub domain_hash: Option<Hash256>,
    pub risk: u8,
    pub category: u8,
    pub provider_msg: Option<String>,
    pub tiny_url: String,
    pub simu_type: u8,
}

/// A descriptor for one calldata field of a clear-signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTableEntry {
    pub display_name: String,
    pub field_format: u8,
    pub address: EthAddress,
    pub chain_id: u64,
}

/// An allowed 7702 delegate. A chain id of 0 matches every chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegateRule {
    pub chain_id: u64,
    pub address: EthAddress,
}

/// All mutable device state.
pub struct DeviceState {
    anchor: TrustAnchor,
    /// Single device-wide chunk reassembly slot.
    pub assembly: Option<Assembly>,
    pub networks: Vec<NetworkEntry>,
    pub tokens: Vec<TokenEntry>,
    pub nfts: Vec<NftEntry>,
    pub trusted_names: Vec<TrustedNameEntry>,
    pub safe: Option<SafeAccount>,
    pub simulation: Option<SimulationEntry>,
    pub field_table: Vec<FieldTableEntry>,
    /// Challenge expected in challenge-bearing payloads, cleared on use.
    pub challenge: Option<u32>,
    challenge_seed: [u8; 32],
    challenge_counter: u32,
    delegate_whitelist: Vec<DelegateRule>,
    enforce_whitelist: bool,
}

impl DeviceState {
    /// Creates a fresh state trusting the given anchor.
    ///
    /// The platform should follow up with [`Self::seed_challenges`] at
    /// boot; until then challenges are derived from a zero seed.
    pub fn new(anchor: TrustAnchor) -> Self {
        Self {
            anchor,
            assembly: None,
            networks: Vec::new(),
            tokens: Vec::new(),
            nfts: Vec::new(),
            trusted_names: Vec::new(),
            safe: None,
            simulation: None,
            field_table: Vec::new(),
            challenge: None,
            challenge_seed: [0u8; 32],
            challenge_counter: 0,
            delegate_whitelist: Vec::new(),
            enforce_whitelist: false,
        }
    }

    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// Injects boot-time entropy for challenge derivation.
    pub fn seed_challenges(&mut self, seed: [u8; 32]) {
        self.challenge_seed = seed;
    }

    /// Arms and returns a fresh anti-replay challenge.
    ///
    /// Each roll invalidates the previous challenge; derivation mixes
    /// the boot seed with a monotonic counter so a value never repeats
    /// within a session.
    pub fn roll_challenge(&mut self) -> u32 {
        self.challenge_counter = self.challenge_counter.wrapping_add(1);
        let mut accumulator = HashAccumulator::init();
        accumulator.update(&self.challenge_seed);
        accumulator.update(&self.challenge_counter.to_be_bytes());
        let digest = accumulator.finalize();
        let challenge = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        self.challenge = Some(challenge);
        challenge
    }

    /// Adds a delegate rule and turns whitelist enforcement on.
    pub fn allow_delegate(&mut self, chain_id: u64, address: EthAddress) {
        self.delegate_whitelist.push(DelegateRule { chain_id, address });
        self.enforce_whitelist = true;
    }

    /// True when the delegate is acceptable on the given chain.
    pub fn delegate_allowed(&self, chain_id: u64, address: &EthAddress) -> bool {
        if !self.enforce_whitelist {
            return true;
        }
        self.delegate_whitelist.iter().any(|rule| {
            rule.address == *address && (rule.chain_id == 0 || rule.chain_id == chain_id)
        })
    }

    pub fn find_network(&self, chain_id: u64) -> Option<&NetworkEntry> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    /// Registers a network, evicting the oldest slot when full.
    pub fn insert_network(&mut self, entry: NetworkEntry) {
        push_fifo(&mut self.networks, NETWORK_SLOTS, entry);
    }

    pub fn insert_token(&mut self, entry: TokenEntry) {
        push_fifo(&mut self.tokens, TOKEN_CACHE_SLOTS, entry);
    }

    pub fn insert_nft(&mut self, entry: NftEntry) {
        push_fifo(&mut self.nfts, NFT_CACHE_SLOTS, entry);
    }

    pub fn insert_trusted_name(&mut self, entry: TrustedNameEntry) {
        push_fifo(&mut self.trusted_names, TRUSTED_NAME_SLOTS, entry);
    }
}

fn push_fifo<T>(slots: &mut Vec<T>, cap: usize, entry: T) {
    if slots.len() == cap {
        slots.remove(0);
    }
    slots.push(entry);
}

#[cfg(test)]
impl DeviceState {
    /// State trusting the development metadata key.
    pub fn new_for_tests() -> Self {
        Self::new(crate::verify::test_support::test_anchor())
    }
}
