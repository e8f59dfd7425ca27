// File: randomness-audit/src/fetcher.rs
//
// Snapshot Fetcher
//
// Materializes every randomness request at a pinned block by walking the
// `Requests` map page by page, then reads the counters, results, escrow
// balance and VRF state at the same block hash.

use crate::codec;
use crate::error::FetchError;
use crate::keys;
use crate::provider::storage::DEFAULT_MAX_PAGES;
use crate::provider::{ChainDataProvider, SnapshotHandle};
use crate::types::{BlockNumber, RequestRecord, ResultRecord, Snapshot, VrfState};
use log::{debug, info};

pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Reads snapshots from a `ChainDataProvider`
pub struct SnapshotFetcher<'a, P> {
    provider: &'a P,
    page_size: u32,
    max_pages: usize,
}

impl<'a, P: ChainDataProvider> SnapshotFetcher<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Full snapshot at `block_number`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The node does not know `block_number`
    /// - Any storage read fails or cannot be decoded
    /// - The request map does not end within `max_pages` pages
    pub async fn fetch(&self, block_number: BlockNumber) -> Result<Snapshot, FetchError> {
        if self.page_size == 0 {
            return Err(FetchError::Config("page size must be positive".to_string()));
        }

        let block_hash = self.provider.get_block_hash(block_number).await?;
        let handle = self.provider.at(block_hash).await?;

        let requests = collect_requests(&handle, self.page_size, self.max_pages).await?;

        let account = keys::randomness_account();
        let (
            declared_request_count,
            raw_results,
            pallet_account_balance,
            local_vrf_output,
            not_first_block,
            inherent_included,
        ) = tokio::try_join!(
            handle.get_request_count(),
            handle.list_results(),
            handle.get_account_balance_free(&account),
            handle.get_local_vrf_output(),
            handle.get_not_first_block(),
            handle.get_inherent_included(),
        )?;

        let results = raw_results
            .iter()
            .map(|(key, value)| codec::decode_result_entry(key, value))
            .collect::<Result<Vec<ResultRecord>, _>>()?;

        info!(
            "Snapshot at #{} ({:?}): {} requests, {} results, RequestCount {}",
            block_number,
            block_hash,
            requests.len(),
            results.len(),
            declared_request_count
        );

        Ok(Snapshot {
            block_number,
            block_hash,
            requests,
            results,
            declared_request_count,
            pallet_account_balance,
            local_vrf_output,
            not_first_block: not_first_block.is_some(),
            inherent_included: inherent_included.is_some(),
        })
    }

    /// VRF subset of the pallet state at `block_number`, without listing requests
    pub async fn fetch_vrf_state(&self, block_number: BlockNumber) -> Result<VrfState, FetchError> {
        let block_hash = self.provider.get_block_hash(block_number).await?;
        let handle = self.provider.at(block_hash).await?;

        let (local_vrf_output, not_first_block, inherent_included) = tokio::try_join!(
            handle.get_local_vrf_output(),
            handle.get_not_first_block(),
            handle.get_inherent_included(),
        )?;

        Ok(VrfState {
            block_number,
            local_vrf_output,
            not_first_block: not_first_block.is_some(),
            inherent_included: inherent_included.is_some(),
        })
    }
}

/// Walks the request map with an exclusive start-key cursor.
///
/// Stops on an empty page or on a page shorter than `page_size`, since keys
/// come back in order and a short page can only mean the map is exhausted.
pub async fn collect_requests<H: SnapshotHandle>(
    handle: &H,
    page_size: u32,
    max_pages: usize,
) -> Result<Vec<RequestRecord>, FetchError> {
    let mut requests = Vec::new();
    let mut cursor: Option<Vec<u8>> = None;

    for page_index in 0..max_pages {
        let page = handle
            .list_requests_page(cursor.as_deref(), page_size)
            .await?;
        let page_len = page.len();

        if let (Some(previous), Some((last, _))) = (cursor.as_ref(), page.last()) {
            if last <= previous {
                return Err(FetchError::CursorStalled {
                    cursor: hex::encode(previous),
                });
            }
        }

        for (key, value) in &page {
            requests.push(codec::decode_request_entry(key, value)?);
        }
        debug!(
            "Retrieved {} requests after page {}",
            requests.len(),
            page_index + 1
        );

        if page_len < page_size as usize {
            return Ok(requests);
        }
        cursor = page.into_iter().last().map(|(key, _)| key);
    }

    Err(FetchError::PaginationLimit {
        max_pages,
        page_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RandomnessResult, RequestInfo, RequestType};
    use crate::provider::memory::{request_state, MemoryBlock, MemoryChain};
    use crate::provider::RawEntry;
    use async_trait::async_trait;
    use primitive_types::H256;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chain_with(n: u64) -> MemoryChain {
        let block = (1..=n).fold(MemoryBlock::new(), |block, id| {
            block.with_request(id, request_state(RequestInfo::BabeEpoch(id % 4, 99), 1, 1))
        });
        MemoryChain::new().with_block(10, block.with_request_count(n))
    }

    async fn paged(n: u64, page_size: u32) -> (Vec<RequestRecord>, usize) {
        let chain = chain_with(n);
        let snapshot = SnapshotFetcher::new(&chain)
            .with_page_size(page_size)
            .fetch(10)
            .await
            .unwrap();
        (snapshot.requests, chain.request_page_reads())
    }

    #[tokio::test]
    async fn test_pagination_boundaries() {
        assert_eq!(paged(0, 1000).await.1, 1);

        let (requests, pages) = paged(999, 1000).await;
        assert_eq!((requests.len(), pages), (999, 1));

        let (requests, pages) = paged(1000, 1000).await;
        assert_eq!((requests.len(), pages), (1000, 2));

        let (requests, pages) = paged(1001, 1000).await;
        assert_eq!((requests.len(), pages), (1001, 2));
    }

    #[tokio::test]
    async fn test_pagination_2500_entries_three_pages() {
        let (requests, pages) = paged(2500, 1000).await;
        assert_eq!(requests.len(), 2500);
        assert_eq!(pages, 3);

        let mut ids: Vec<u64> = requests.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 2500);
    }

    #[tokio::test]
    async fn test_pages_follow_key_order() {
        let chain = chain_with(25);
        let handle = chain.at(MemoryChain::block_hash(10)).await.unwrap();
        let requests = collect_requests(&handle, 10, 10).await.unwrap();

        let mut expected: Vec<(Vec<u8>, u64)> = (1..=25u64)
            .map(|id| (keys::request_key(id), id))
            .collect();
        expected.sort();
        let expected_ids: Vec<u64> = expected.into_iter().map(|(_, id)| id).collect();
        let ids: Vec<u64> = requests.iter().map(|r| r.id).collect();
        assert_eq!(ids, expected_ids);
    }

    #[tokio::test]
    async fn test_pagination_limit() {
        let chain = chain_with(30);
        let handle = chain.at(MemoryChain::block_hash(10)).await.unwrap();
        assert!(matches!(
            collect_requests(&handle, 10, 2).await,
            Err(FetchError::PaginationLimit {
                max_pages: 2,
                page_size: 10
            })
        ));
    }

    /// Handle that keeps serving the same full page
    struct StuckHandle {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotHandle for StuckHandle {
        async fn list_requests_page(
            &self,
            _start_key: Option<&[u8]>,
            page_size: u32,
        ) -> Result<Vec<RawEntry>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let state = request_state(RequestInfo::Local(1, 2), 0, 0);
            Ok((0..u64::from(page_size))
                .map(|id| {
                    (
                        keys::request_key(id),
                        parity_scale_codec::Encode::encode(&state),
                    )
                })
                .collect())
        }
        async fn get_request_count(&self) -> Result<u64, FetchError> {
            Ok(0)
        }
        async fn list_results(&self) -> Result<Vec<RawEntry>, FetchError> {
            Ok(Vec::new())
        }
        async fn get_account_balance_free(
            &self,
            _account: &crate::types::AccountId20,
        ) -> Result<u128, FetchError> {
            Ok(0)
        }
        async fn get_local_vrf_output(&self) -> Result<Option<H256>, FetchError> {
            Ok(None)
        }
        async fn get_not_first_block(&self) -> Result<Option<()>, FetchError> {
            Ok(None)
        }
        async fn get_inherent_included(&self) -> Result<Option<()>, FetchError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_stalled_cursor_is_an_error() {
        let handle = StuckHandle {
            calls: AtomicUsize::new(0),
        };
        let result = collect_requests(&handle, 3, 100).await;
        assert!(matches!(result, Err(FetchError::CursorStalled { .. })));
        assert_eq!(handle.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_reads_everything_at_same_block() {
        let output = H256::repeat_byte(0x77);
        let block = MemoryBlock::new()
            .with_request(1, request_state(RequestInfo::Local(12, 20), 5, 50))
            .with_result(
                RequestType::Local(12),
                RandomnessResult {
                    randomness: None,
                    request_count: 1,
                },
            )
            .with_request_count(1)
            .with_free_balance(&keys::randomness_account(), 55)
            .with_local_vrf_output(Some(output))
            .with_not_first_block();
        let chain = MemoryChain::new()
            .with_block(11, block)
            .with_block(12, MemoryBlock::new());

        let snapshot = SnapshotFetcher::new(&chain).fetch(11).await.unwrap();
        assert_eq!(snapshot.block_hash, MemoryChain::block_hash(11));
        assert_eq!(snapshot.requests.len(), 1);
        assert_eq!(snapshot.requests[0].deposit, 50);
        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.declared_request_count, 1);
        assert_eq!(snapshot.pallet_account_balance, 55);
        assert_eq!(snapshot.local_vrf_output, Some(output));
        assert!(snapshot.not_first_block);
        assert!(!snapshot.inherent_included);

        let vrf = SnapshotFetcher::new(&chain).fetch_vrf_state(12).await.unwrap();
        assert_eq!(vrf.local_vrf_output, None);
        assert!(!vrf.not_first_block);
    }

    #[tokio::test]
    async fn test_unknown_block_fails() {
        let chain = chain_with(1);
        assert!(matches!(
            SnapshotFetcher::new(&chain).fetch(11).await,
            Err(FetchError::UnknownBlock(11))
        ));
    }

    #[tokio::test]
    async fn test_undecodable_request_fails_fetch() {
        let block = MemoryBlock::new().with_raw(keys::request_key(1), vec![0xff; 3]);
        let chain = MemoryChain::new().with_block(1, block);
        assert!(matches!(
            SnapshotFetcher::new(&chain).fetch(1).await,
            Err(FetchError::Decode(_))
        ));
    }
}
