// File: randomness-audit/src/provider/mod.rs
//
// Chain data providers
//
// The audit never talks to a node directly. It reads through these two
// traits so the same checks run against a live node (`rpc`) or an in-memory
// fixture (`memory`).

pub mod memory;
pub mod rpc;
pub mod storage;

pub use memory::{MemoryBlock, MemoryChain};
pub use rpc::RpcProvider;
pub use storage::{RawStorage, StorageView};

use crate::error::FetchError;
use crate::types::{AccountId20, BlockHash, BlockNumber, Bytes32, Header};
use async_trait::async_trait;

/// Raw storage entry: (full storage key, SCALE-encoded value)
pub type RawEntry = (Vec<u8>, Vec<u8>);

/// Entry point to a node's chain data.
///
/// # Implementation Note
///
/// Implementations must return `FetchError::UnknownBlock` when asked for a
/// block hash the node does not have, rather than a default hash.
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    type Handle: SnapshotHandle;

    /// Header of the current best block.
    async fn get_header(&self) -> Result<Header, FetchError>;

    async fn get_block_hash(&self, number: BlockNumber) -> Result<BlockHash, FetchError>;

    /// Pin every subsequent read to `hash`.
    async fn at(&self, hash: BlockHash) -> Result<Self::Handle, FetchError>;
}

/// Storage reads pinned to a single block.
#[async_trait]
pub trait SnapshotHandle: Send + Sync {
    /// Up to `page_size` request entries whose key sorts strictly after
    /// `start_key`, in key order. `None` starts at the beginning of the map.
    async fn list_requests_page(
        &self,
        start_key: Option<&[u8]>,
        page_size: u32,
    ) -> Result<Vec<RawEntry>, FetchError>;

    /// `Randomness::RequestCount`
    async fn get_request_count(&self) -> Result<u64, FetchError>;

    /// Every `Randomness::RandomnessResults` entry
    async fn list_results(&self) -> Result<Vec<RawEntry>, FetchError>;

    async fn get_account_balance_free(&self, account: &AccountId20) -> Result<u128, FetchError>;

    async fn get_local_vrf_output(&self) -> Result<Option<Bytes32>, FetchError>;

    /// `Some(())` when `Randomness::NotFirstBlock` is set
    async fn get_not_first_block(&self) -> Result<Option<()>, FetchError>;

    /// `Some(())` when `Randomness::InherentIncluded` is set
    async fn get_inherent_included(&self) -> Result<Option<()>, FetchError>;
}
