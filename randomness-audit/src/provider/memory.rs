// File: randomness-audit/src/provider/memory.rs
//
// In-memory chain data provider
//
// Holds raw SCALE-encoded storage per block, so audits run against it go
// through exactly the same key derivation and decoding as a live node.

use super::storage::{RawStorage, StorageView};
use super::{ChainDataProvider, RawEntry};
use crate::codec::{RandomnessResult, Request, RequestInfo, RequestState, RequestType};
use crate::error::FetchError;
use crate::keys;
use crate::types::{AccountId20, BlockHash, BlockNumber, Bytes32, Header};
use async_trait::async_trait;
use parity_scale_codec::Encode;
use primitive_types::{H160, H256};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Build a request with fixed addresses and salt.
pub fn request_state(info: RequestInfo, fee: u128, deposit: u128) -> RequestState {
    RequestState {
        request: Request {
            refund_address: H160::repeat_byte(0x01),
            contract_address: H160::repeat_byte(0x02),
            fee,
            gas_limit: 100_000,
            num_words: 1,
            salt: H256::zero(),
            info,
        },
        deposit,
    }
}

/// Storage of a single block
///
/// # Example
///
/// ```rust
/// use randomness_audit::codec::{RandomnessResult, RequestInfo, RequestType};
/// use randomness_audit::provider::memory::{request_state, MemoryBlock};
///
/// let block = MemoryBlock::new()
///     .with_request(1, request_state(RequestInfo::BabeEpoch(3, 5), 10, 100))
///     .with_result(RequestType::BabeEpoch(3), RandomnessResult { randomness: None, request_count: 1 })
///     .with_request_count(1);
/// assert_eq!(block.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBlock {
    storage: BTreeMap<Vec<u8>, Vec<u8>>,
    read_delay: Option<Duration>,
}

impl MemoryBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(mut self, key: Vec<u8>, value: Vec<u8>) -> Self {
        self.storage.insert(key, value);
        self
    }

    pub fn with_request(self, id: u64, state: RequestState) -> Self {
        self.with_raw(keys::request_key(id), state.encode())
    }

    pub fn with_result(self, request_type: RequestType, result: RandomnessResult) -> Self {
        self.with_raw(keys::result_key(&request_type.encode()), result.encode())
    }

    pub fn with_request_count(self, count: u64) -> Self {
        self.with_raw(keys::REQUEST_COUNT_KEY.clone(), count.encode())
    }

    pub fn with_free_balance(self, account: &AccountId20, free: u128) -> Self {
        let info = crate::codec::AccountInfo {
            nonce: 0,
            consumers: 0,
            providers: 1,
            sufficients: 0,
            data: crate::codec::AccountData {
                free,
                reserved: 0,
                frozen: 0,
                flags: 0,
            },
        };
        self.with_raw(keys::system_account_key(account), info.encode())
    }

    pub fn with_local_vrf_output(self, output: Option<Bytes32>) -> Self {
        self.with_raw(keys::LOCAL_VRF_OUTPUT_KEY.clone(), output.encode())
    }

    pub fn with_not_first_block(self) -> Self {
        self.with_raw(keys::NOT_FIRST_BLOCK_KEY.clone(), ().encode())
    }

    pub fn with_inherent_included(self) -> Self {
        self.with_raw(keys::INHERENT_INCLUDED_KEY.clone(), ().encode())
    }

    /// Delay every read of this block, to exercise timeouts
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

/// In-memory node with a fixed set of blocks.
#[derive(Debug, Default)]
pub struct MemoryChain {
    blocks: BTreeMap<BlockNumber, Arc<MemoryBlock>>,
    hashes: HashMap<BlockHash, BlockNumber>,
    request_page_reads: Arc<AtomicUsize>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic hash of block `number`
    pub fn block_hash(number: BlockNumber) -> BlockHash {
        let mut hash = H256::from_low_u64_be(number);
        hash.0[0] = 0xb1;
        hash
    }

    pub fn with_block(mut self, number: BlockNumber, block: MemoryBlock) -> Self {
        self.hashes.insert(Self::block_hash(number), number);
        self.blocks.insert(number, Arc::new(block));
        self
    }

    /// Number of `Randomness::Requests` pages served so far
    pub fn request_page_reads(&self) -> usize {
        self.request_page_reads.load(Ordering::SeqCst)
    }
}

/// Reads pinned to one `MemoryBlock`
pub struct MemoryAt {
    block: Arc<MemoryBlock>,
    request_page_reads: Arc<AtomicUsize>,
}

impl MemoryAt {
    async fn delay(&self) {
        if let Some(delay) = self.block.read_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RawStorage for MemoryAt {
    async fn storage(&self, key: &[u8]) -> Result<Option<Vec<u8>>, FetchError> {
        self.delay().await;
        Ok(self.block.storage.get(key).cloned())
    }

    async fn entries_paged(
        &self,
        prefix: &[u8],
        start_key: Option<&[u8]>,
        count: u32,
    ) -> Result<Vec<RawEntry>, FetchError> {
        self.delay().await;
        if prefix == keys::REQUESTS_PREFIX.as_slice() {
            self.request_page_reads.fetch_add(1, Ordering::SeqCst);
        }

        let lower = match start_key {
            Some(start) => Bound::Excluded(start.to_vec()),
            None => Bound::Included(prefix.to_vec()),
        };
        Ok(self
            .block
            .storage
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(count as usize)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[async_trait]
impl ChainDataProvider for MemoryChain {
    type Handle = StorageView<MemoryAt>;

    async fn get_header(&self) -> Result<Header, FetchError> {
        let number = self
            .blocks
            .keys()
            .next_back()
            .copied()
            .ok_or(FetchError::UnknownBlock(0))?;
        Ok(Header { number })
    }

    async fn get_block_hash(&self, number: BlockNumber) -> Result<BlockHash, FetchError> {
        if self.blocks.contains_key(&number) {
            Ok(Self::block_hash(number))
        } else {
            Err(FetchError::UnknownBlock(number))
        }
    }

    async fn at(&self, hash: BlockHash) -> Result<Self::Handle, FetchError> {
        let block = self
            .hashes
            .get(&hash)
            .and_then(|number| self.blocks.get(number))
            .ok_or_else(|| FetchError::Rpc {
                method: "at",
                message: format!("unknown block hash {:?}", hash),
            })?;
        Ok(StorageView::new(MemoryAt {
            block: Arc::clone(block),
            request_page_reads: Arc::clone(&self.request_page_reads),
        }))
    }
}
