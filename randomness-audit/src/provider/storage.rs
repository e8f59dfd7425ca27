// File: randomness-audit/src/provider/storage.rs
//
// Raw key/value storage access shared by every provider.
//
// Providers only need to answer "value at key" and "entries under prefix";
// `StorageView` turns that into the typed `SnapshotHandle` reads.

use super::{RawEntry, SnapshotHandle};
use crate::codec;
use crate::error::FetchError;
use crate::keys;
use crate::types::{AccountId20, Bytes32};
use async_trait::async_trait;
use log::debug;

/// Upper bound on pages read while listing a whole map
pub const DEFAULT_MAX_PAGES: usize = 100_000;

/// Page size used when a map is listed in full
pub const LISTING_PAGE_SIZE: u32 = 1000;

/// Storage pinned to one block
#[async_trait]
pub trait RawStorage: Send + Sync {
    async fn storage(&self, key: &[u8]) -> Result<Option<Vec<u8>>, FetchError>;

    /// Up to `count` entries under `prefix` with keys strictly after `start_key`, key-ordered.
    async fn entries_paged(
        &self,
        prefix: &[u8],
        start_key: Option<&[u8]>,
        count: u32,
    ) -> Result<Vec<RawEntry>, FetchError>;
}

/// Typed randomness pallet reads on top of a `RawStorage`
pub struct StorageView<S> {
    storage: S,
    max_pages: usize,
}

impl<S: RawStorage> StorageView<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Reads every entry under `prefix` with a bounded cursor loop.
    pub async fn list_all(&self, prefix: &[u8]) -> Result<Vec<RawEntry>, FetchError> {
        let mut entries: Vec<RawEntry> = Vec::new();
        for _ in 0..self.max_pages {
            let cursor = entries.last().map(|(key, _)| key.as_slice());
            let page = self
                .storage
                .entries_paged(prefix, cursor, LISTING_PAGE_SIZE)
                .await?;
            let exhausted = page.len() < LISTING_PAGE_SIZE as usize;
            if let (Some(cursor), Some((last, _))) = (cursor, page.last()) {
                if last.as_slice() <= cursor {
                    return Err(FetchError::CursorStalled {
                        cursor: hex::encode(cursor),
                    });
                }
            }
            entries.extend(page);
            if exhausted {
                debug!("Listed {} entries under 0x{}", entries.len(), hex::encode(prefix));
                return Ok(entries);
            }
        }
        Err(FetchError::PaginationLimit {
            max_pages: self.max_pages,
            page_size: LISTING_PAGE_SIZE,
        })
    }

    async fn flag(&self, key: &[u8]) -> Result<Option<()>, FetchError> {
        Ok(self.storage.storage(key).await?.map(|_| ()))
    }
}

#[async_trait]
impl<S: RawStorage> SnapshotHandle for StorageView<S> {
    async fn list_requests_page(
        &self,
        start_key: Option<&[u8]>,
        page_size: u32,
    ) -> Result<Vec<RawEntry>, FetchError> {
        self.storage
            .entries_paged(&keys::REQUESTS_PREFIX, start_key, page_size)
            .await
    }

    async fn get_request_count(&self) -> Result<u64, FetchError> {
        match self.storage.storage(&keys::REQUEST_COUNT_KEY).await? {
            Some(raw) => Ok(codec::decode_request_count(&raw)?),
            None => Ok(0),
        }
    }

    async fn list_results(&self) -> Result<Vec<RawEntry>, FetchError> {
        self.list_all(&keys::RESULTS_PREFIX).await
    }

    async fn get_account_balance_free(&self, account: &AccountId20) -> Result<u128, FetchError> {
        match self.storage.storage(&keys::system_account_key(account)).await? {
            Some(raw) => Ok(codec::decode_free_balance(&raw)?),
            None => Ok(0),
        }
    }

    async fn get_local_vrf_output(&self) -> Result<Option<Bytes32>, FetchError> {
        match self.storage.storage(&keys::LOCAL_VRF_OUTPUT_KEY).await? {
            Some(raw) => Ok(codec::decode_vrf_output(&raw)?),
            None => Ok(None),
        }
    }

    async fn get_not_first_block(&self) -> Result<Option<()>, FetchError> {
        self.flag(&keys::NOT_FIRST_BLOCK_KEY).await
    }

    async fn get_inherent_included(&self) -> Result<Option<()>, FetchError> {
        self.flag(&keys::INHERENT_INCLUDED_KEY).await
    }
}
