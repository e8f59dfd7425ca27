// File: randomness-audit/src/types.rs
//
// Decoded records and the immutable snapshot they are reconciled from.

use primitive_types::{H160, H256};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type BlockNumber = u64;
pub type BlockHash = H256;
pub type Bytes32 = H256;
pub type AccountId20 = H160;

/// Chain header subset needed to pick the audited block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub number: BlockNumber,
}

/// What a randomness request waits on.
///
/// Doubles as the grouping key between requests and results: the variant tag
/// is part of equality, so epoch 7 and local block 7 are different keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum TriggerCondition {
    BabeEpoch(u64),
    LocalBlock(u64),
}

impl TriggerCondition {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BabeEpoch(_) => "BabeEpoch",
            Self::LocalBlock(_) => "Local",
        }
    }

    pub fn value(&self) -> u64 {
        match self {
            Self::BabeEpoch(v) | Self::LocalBlock(v) => *v,
        }
    }
}

impl fmt::Display for TriggerCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BabeEpoch(epoch) => write!(f, "BabeEpoch({})", epoch),
            Self::LocalBlock(block) => write!(f, "Local(#{})", block),
        }
    }
}

/// A pending randomness request as stored in `Randomness::Requests`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Low 64 bits of the storage key, little-endian
    pub id: u64,
    pub deposit: u128,
    pub fee: u128,
    pub trigger: TriggerCondition,
}

impl RequestRecord {
    /// Funds held in escrow for this request.
    pub fn reserved(&self) -> Option<u128> {
        self.deposit.checked_add(self.fee)
    }
}

/// A `Randomness::RandomnessResults` entry, one per distinct trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub trigger: TriggerCondition,
    /// Number of live requests the pallet believes depend on this result
    pub request_count: u64,
    pub randomness: Option<Bytes32>,
}

/// VRF-related subset of the randomness pallet state at one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrfState {
    pub block_number: BlockNumber,
    pub local_vrf_output: Option<Bytes32>,
    pub not_first_block: bool,
    pub inherent_included: bool,
}

/// Everything the reconciliation checks read, pinned to a single block.
///
/// Never mutated after the fetcher builds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub block_number: BlockNumber,
    pub block_hash: BlockHash,
    pub requests: Vec<RequestRecord>,
    pub results: Vec<ResultRecord>,
    /// `Randomness::RequestCount`, the lifetime id counter
    pub declared_request_count: u64,
    /// Free balance of the pallet escrow account
    pub pallet_account_balance: u128,
    pub local_vrf_output: Option<Bytes32>,
    pub not_first_block: bool,
    pub inherent_included: bool,
}

impl Snapshot {
    pub fn vrf_state(&self) -> VrfState {
        VrfState {
            block_number: self.block_number,
            local_vrf_output: self.local_vrf_output,
            not_first_block: self.not_first_block,
            inherent_included: self.inherent_included,
        }
    }

    /// Randomness payloads already fulfilled, with the trigger they belong to
    pub fn available_randomness(&self) -> impl Iterator<Item = (TriggerCondition, &Bytes32)> {
        self.results
            .iter()
            .filter_map(|r| r.randomness.as_ref().map(|bytes| (r.trigger, bytes)))
    }
}
