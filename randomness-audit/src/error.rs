// File: randomness-audit/src/error.rs
//
// Error taxonomy
//
// Fetch errors abort a run. Consistency violations and randomness assertion
// failures are collected per scenario and never abort other scenarios.

use crate::types::{BlockNumber, Bytes32, TriggerCondition};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Storage key too short: need at least {need} bytes, got {got}")]
    KeyTooShort { need: usize, got: usize },

    #[error("Invalid SCALE encoding for {what}: {reason}")]
    Scale { what: &'static str, reason: String },

    #[error("{count} trailing bytes after decoding {what}")]
    TrailingBytes { what: &'static str, count: usize },

    #[error("Invalid hex string: {0}")]
    Hex(String),
}

impl DecodeError {
    pub(crate) fn scale(what: &'static str, err: parity_scale_codec::Error) -> Self {
        Self::Scale {
            what,
            reason: err.to_string(),
        }
    }
}

/// Provider I/O or decoding failure. Fatal to the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("RPC error from '{method}': {message}")]
    Rpc { method: &'static str, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unknown block #{0}")]
    UnknownBlock(BlockNumber),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Pagination exceeded {max_pages} pages of {page_size} entries")]
    PaginationLimit { max_pages: usize, page_size: u32 },

    #[error("Pagination cursor did not advance past key 0x{cursor}")]
    CursorStalled { cursor: String },

    #[error("Timed out after {secs}s while {during}")]
    Timeout { secs: u64, during: &'static str },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A broken reconciliation invariant. Every variant carries both sides of the
/// comparison that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsistencyViolation {
    #[error("{live} live requests exceed RequestCount {declared}")]
    LiveRequestsExceedCounter { live: u64, declared: u64 },

    #[error("Request id {id} is above RequestCount {declared}")]
    RequestIdAboveCounter { id: u64, declared: u64 },

    #[error("Result for {trigger} has no matching request")]
    OrphanResult { trigger: TriggerCondition },

    #[error("Counted {counted} requests for {trigger} but result declares {declared}")]
    RequestCountMismatch {
        trigger: TriggerCondition,
        counted: u64,
        declared: u64,
    },

    #[error("Reserved deposits and fees {reserved} exceed escrow balance {balance}")]
    InsufficientEscrow { reserved: u128, balance: u128 },

    #[error("Sum of deposits and fees overflows u128 after {processed} requests")]
    ReservedOverflow { processed: usize },

    #[error("NotFirstBlock is set at block #{block}")]
    NotFirstBlockAtGenesis { block: BlockNumber },

    #[error("Local VRF output missing at block #{block}")]
    MissingVrfOutput { block: BlockNumber },

    #[error("Local VRF output {output:?} at block #{block} is unchanged from block #{previous}")]
    StaleVrfOutput {
        block: BlockNumber,
        previous: BlockNumber,
        output: Bytes32,
    },

    #[error("InherentIncluded still set at block #{block}, expected cleared on finalize")]
    InherentNotCleared { block: BlockNumber },
}

/// One of the statistical sub-checks rejected a byte sequence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RandomnessAssertionFailure {
    #[error("Chi-square statistic {statistic:.3} >= {threshold}, bytes appear related")]
    ChiSquare { statistic: f64, threshold: f64 },

    #[error("Average byte {mean:.3} outside [{min}, {max}]")]
    MeanOutOfRange { mean: f64, min: f64, max: f64 },

    #[error("Byte value {value} occurs {count} times, at most {max} allowed")]
    ExcessiveRepetition { value: u8, count: usize, max: usize },
}
