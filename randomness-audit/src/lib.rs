//! Randomness pallet audit
//!
//! Read-only consistency and randomness smoke tests for a chain's randomness
//! pallet. An audit pins one block, snapshots the pallet's requests, results,
//! counters, escrow balance and VRF state, then checks them against each
//! other and checks every randomness payload for obvious non-uniformity.
//!
//! ## Layout
//!
//! - `provider`: chain data access (`RpcProvider` for a live node,
//!   `MemoryChain` for fixtures)
//! - `keys` / `codec`: storage key derivation and SCALE decoding
//! - `fetcher`: snapshot building with bounded cursor pagination
//! - `reconcile`: request/result/deposit/VRF invariants
//! - `stats`: statistical randomness checks
//! - `scenarios`: the `Auditor` and its `AuditReport`

pub mod codec;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod keys;
pub mod provider;
pub mod reconcile;
pub mod scenarios;
pub mod stats;
pub mod types;

pub use config::AuditConfig;
pub use error::{ConsistencyViolation, DecodeError, FetchError, RandomnessAssertionFailure};
pub use fetcher::SnapshotFetcher;
pub use provider::{ChainDataProvider, MemoryBlock, MemoryChain, RpcProvider, SnapshotHandle};
pub use scenarios::{AuditReport, Auditor, Scenario, ScenarioOutcome, ScenarioStatus};
pub use types::{RequestRecord, ResultRecord, Snapshot, TriggerCondition, VrfState};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
