// File: randomness-audit/src/codec.rs
//
// Fixed-layout SCALE decoding of randomness pallet storage entries.
//
// Storage values are decoded into private wire structs mirroring the on-chain
// types, then flattened into the records the reconciliation checks use.

use crate::error::DecodeError;
use crate::keys::PREFIX_LEN;
use crate::types::{Bytes32, RequestRecord, ResultRecord, TriggerCondition};
use parity_scale_codec::{Decode, Encode};
use primitive_types::{H160, H256};

/// Bytes of the Twox64 hash in front of the concatenated request type
const TWOX64_LEN: usize = 8;

/// Request id is the trailing little-endian u64 of the key
const REQUEST_ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum RequestType {
    #[codec(index = 0)]
    BabeEpoch(u64),
    #[codec(index = 1)]
    Local(u32),
}

impl From<RequestType> for TriggerCondition {
    fn from(value: RequestType) -> Self {
        match value {
            RequestType::BabeEpoch(epoch) => TriggerCondition::BabeEpoch(epoch),
            RequestType::Local(block) => TriggerCondition::LocalBlock(u64::from(block)),
        }
    }
}

/// (due, expires) pair per request kind
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum RequestInfo {
    #[codec(index = 0)]
    BabeEpoch(u64, u64),
    #[codec(index = 1)]
    Local(u32, u32),
}

impl RequestInfo {
    pub fn trigger(&self) -> TriggerCondition {
        match self {
            Self::BabeEpoch(due, _) => TriggerCondition::BabeEpoch(*due),
            Self::Local(due, _) => TriggerCondition::LocalBlock(u64::from(*due)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Request {
    pub refund_address: H160,
    pub contract_address: H160,
    pub fee: u128,
    pub gas_limit: u64,
    pub num_words: u8,
    pub salt: H256,
    pub info: RequestInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RequestState {
    pub request: Request,
    pub deposit: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct RandomnessResult {
    pub randomness: Option<H256>,
    pub request_count: u64,
}

/// `AccountData` of the balances pallet as embedded in `System::Account`
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AccountData {
    pub free: u128,
    pub reserved: u128,
    pub frozen: u128,
    pub flags: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct AccountInfo {
    pub nonce: u32,
    pub consumers: u32,
    pub providers: u32,
    pub sufficients: u32,
    pub data: AccountData,
}

/// Decode `T` from `input`, rejecting any unconsumed bytes.
pub fn decode_exact<T: Decode>(what: &'static str, mut input: &[u8]) -> Result<T, DecodeError> {
    let value = T::decode(&mut input).map_err(|e| DecodeError::scale(what, e))?;
    if !input.is_empty() {
        return Err(DecodeError::TrailingBytes {
            what,
            count: input.len(),
        });
    }
    Ok(value)
}

pub fn decode_request_id(key: &[u8]) -> Result<u64, DecodeError> {
    if key.len() < REQUEST_ID_LEN {
        return Err(DecodeError::KeyTooShort {
            need: REQUEST_ID_LEN,
            got: key.len(),
        });
    }
    let mut id = [0u8; REQUEST_ID_LEN];
    id.copy_from_slice(&key[key.len() - REQUEST_ID_LEN..]);
    Ok(u64::from_le_bytes(id))
}

pub fn decode_request_entry(key: &[u8], value: &[u8]) -> Result<RequestRecord, DecodeError> {
    let id = decode_request_id(key)?;
    let state: RequestState = decode_exact("RequestState", value)?;
    Ok(RequestRecord {
        id,
        deposit: state.deposit,
        fee: state.request.fee,
        trigger: state.request.info.trigger(),
    })
}

pub fn decode_result_key(key: &[u8]) -> Result<TriggerCondition, DecodeError> {
    let offset = PREFIX_LEN + TWOX64_LEN;
    if key.len() <= offset {
        return Err(DecodeError::KeyTooShort {
            need: offset + 1,
            got: key.len(),
        });
    }
    let request_type: RequestType = decode_exact("RequestType", &key[offset..])?;
    Ok(request_type.into())
}

pub fn decode_result_entry(key: &[u8], value: &[u8]) -> Result<ResultRecord, DecodeError> {
    let trigger = decode_result_key(key)?;
    let result: RandomnessResult = decode_exact("RandomnessResult", value)?;
    Ok(ResultRecord {
        trigger,
        request_count: result.request_count,
        randomness: result.randomness,
    })
}

pub fn decode_free_balance(value: &[u8]) -> Result<u128, DecodeError> {
    let info: AccountInfo = decode_exact("AccountInfo", value)?;
    Ok(info.data.free)
}

pub fn decode_vrf_output(value: &[u8]) -> Result<Option<Bytes32>, DecodeError> {
    decode_exact("Option<H256>", value)
}

pub fn decode_request_count(value: &[u8]) -> Result<u64, DecodeError> {
    decode_exact("RequestCount", value)
}

/// Parse a `0x`-prefixed hex string as returned by the node
pub fn hex_to_bytes(value: &str) -> Result<Vec<u8>, DecodeError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).map_err(|e| DecodeError::Hex(e.to_string()))
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
