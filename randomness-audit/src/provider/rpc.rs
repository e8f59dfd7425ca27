// File: randomness-audit/src/provider/rpc.rs
//
// JSON-RPC 2.0 provider for a Substrate node over HTTP.

use super::storage::{RawStorage, StorageView, DEFAULT_MAX_PAGES};
use super::{ChainDataProvider, RawEntry};
use crate::codec::{bytes_to_hex, hex_to_bytes};
use crate::error::FetchError;
use crate::types::{BlockHash, BlockNumber, Header};
use async_trait::async_trait;
use log::trace;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Per-request HTTP timeout, scenario timeouts sit on top of this
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct HeaderResult {
    number: String,
}

#[derive(Deserialize)]
struct StorageChangeSet {
    changes: Vec<(String, Option<String>)>,
}

pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, FetchError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id(),
            "method": method,
            "params": params,
        });
        trace!("-> {}", request);

        let body: Value = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = body.get("error") {
            return Err(FetchError::Rpc {
                method,
                message: error.to_string(),
            });
        }

        let result = body.get("result").cloned().ok_or_else(|| FetchError::Rpc {
            method,
            message: "no result in response".to_string(),
        })?;
        serde_json::from_value(result).map_err(|e| FetchError::Rpc {
            method,
            message: format!("unexpected result: {}", e),
        })
    }
}

fn parse_block_number(value: &str) -> Result<BlockNumber, FetchError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|e| FetchError::Rpc {
        method: "chain_getHeader",
        message: format!("invalid block number '{}': {}", value, e),
    })
}

fn parse_hash(method: &'static str, value: &str) -> Result<BlockHash, FetchError> {
    let bytes = hex_to_bytes(value)?;
    if bytes.len() != 32 {
        return Err(FetchError::Rpc {
            method,
            message: format!("expected 32-byte hash, got {} bytes", bytes.len()),
        });
    }
    Ok(BlockHash::from_slice(&bytes))
}

/// Provider talking to a node's HTTP JSON-RPC endpoint
pub struct RpcProvider {
    client: Arc<RpcClient>,
    max_pages: usize,
}

impl RpcProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        Ok(Self {
            client: Arc::new(RpcClient::new(url)?),
            max_pages: DEFAULT_MAX_PAGES,
        })
    }

    /// Bound on pages read when a handle lists a whole map
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }
}

#[async_trait]
impl ChainDataProvider for RpcProvider {
    type Handle = StorageView<RpcAt>;

    async fn get_header(&self) -> Result<Header, FetchError> {
        let header: HeaderResult = self.client.call("chain_getHeader", json!([])).await?;
        Ok(Header {
            number: parse_block_number(&header.number)?,
        })
    }

    async fn get_block_hash(&self, number: BlockNumber) -> Result<BlockHash, FetchError> {
        let hash: Option<String> = self
            .client
            .call("chain_getBlockHash", json!([number]))
            .await?;
        match hash {
            Some(hash) => parse_hash("chain_getBlockHash", &hash),
            None => Err(FetchError::UnknownBlock(number)),
        }
    }

    async fn at(&self, hash: BlockHash) -> Result<Self::Handle, FetchError> {
        Ok(StorageView::new(RpcAt {
            client: Arc::clone(&self.client),
            at: bytes_to_hex(hash.as_bytes()),
        })
        .with_max_pages(self.max_pages))
    }
}

/// Storage reads pinned to a block hash
pub struct RpcAt {
    client: Arc<RpcClient>,
    at: String,
}

#[async_trait]
impl RawStorage for RpcAt {
    async fn storage(&self, key: &[u8]) -> Result<Option<Vec<u8>>, FetchError> {
        let value: Option<String> = self
            .client
            .call("state_getStorage", json!([bytes_to_hex(key), self.at]))
            .await?;
        Ok(value.map(|v| hex_to_bytes(&v)).transpose()?)
    }

    async fn entries_paged(
        &self,
        prefix: &[u8],
        start_key: Option<&[u8]>,
        count: u32,
    ) -> Result<Vec<RawEntry>, FetchError> {
        let keys: Vec<String> = self
            .client
            .call(
                "state_getKeysPaged",
                json!([
                    bytes_to_hex(prefix),
                    count,
                    start_key.map(bytes_to_hex),
                    self.at
                ]),
            )
            .await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let change_sets: Vec<StorageChangeSet> = self
            .client
            .call("state_queryStorageAt", json!([keys, self.at]))
            .await?;
        merge_keys_with_values(keys, change_sets)
    }
}

/// Pairs listed keys with their queried values, in listing order.
///
/// A listed key without a value at the same block would make the page short
/// and end pagination early, so it is an error rather than skipped.
fn merge_keys_with_values(
    keys: Vec<String>,
    change_sets: Vec<StorageChangeSet>,
) -> Result<Vec<RawEntry>, FetchError> {
    let mut values: HashMap<String, String> = change_sets
        .into_iter()
        .flat_map(|set| set.changes)
        .filter_map(|(key, value)| value.map(|v| (key.to_lowercase(), v)))
        .collect();

    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let value = values
            .remove(&key.to_lowercase())
            .ok_or_else(|| FetchError::Rpc {
                method: "state_queryStorageAt",
                message: format!("no value for listed key {}", key),
            })?;
        entries.push((hex_to_bytes(&key)?, hex_to_bytes(&value)?));
    }
    Ok(entries)
}
