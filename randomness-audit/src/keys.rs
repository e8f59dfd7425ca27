// File: randomness-audit/src/keys.rs
//
// Storage key derivation for the randomness pallet and the escrow account.
//
// Keys follow the FRAME layout: twox128(pallet) ++ twox128(item) ++ hashed key.

use crate::types::AccountId20;
use cryptoxide::hashing::blake2b;
use lazy_static::lazy_static;
use primitive_types::H160;
use xxhash_rust::xxh64::xxh64;

pub const RANDOMNESS_PALLET: &str = "Randomness";

/// Escrow account holding request deposits and fees ("modlmoonrand" padded)
pub const RANDOMNESS_ACCOUNT_ID: [u8; 20] = [
    0x6d, 0x6f, 0x64, 0x6c, 0x6d, 0x6f, 0x6f, 0x6e, 0x72, 0x61, 0x6e, 0x64, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00,
];

/// Length of a pallet + storage item prefix
pub const PREFIX_LEN: usize = 32;

lazy_static! {
    pub static ref REQUESTS_PREFIX: Vec<u8> = storage_prefix(RANDOMNESS_PALLET, "Requests");
    pub static ref RESULTS_PREFIX: Vec<u8> = storage_prefix(RANDOMNESS_PALLET, "RandomnessResults");
    pub static ref REQUEST_COUNT_KEY: Vec<u8> = storage_prefix(RANDOMNESS_PALLET, "RequestCount");
    pub static ref LOCAL_VRF_OUTPUT_KEY: Vec<u8> =
        storage_prefix(RANDOMNESS_PALLET, "LocalVrfOutput");
    pub static ref NOT_FIRST_BLOCK_KEY: Vec<u8> = storage_prefix(RANDOMNESS_PALLET, "NotFirstBlock");
    pub static ref INHERENT_INCLUDED_KEY: Vec<u8> =
        storage_prefix(RANDOMNESS_PALLET, "InherentIncluded");
    static ref SYSTEM_ACCOUNT_PREFIX: Vec<u8> = storage_prefix("System", "Account");
}

pub fn randomness_account() -> AccountId20 {
    H160::from(RANDOMNESS_ACCOUNT_ID)
}

pub fn twox64(data: &[u8]) -> [u8; 8] {
    xxh64(data, 0).to_le_bytes()
}

pub fn twox128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&xxh64(data, 0).to_le_bytes());
    out[8..].copy_from_slice(&xxh64(data, 1).to_le_bytes());
    out
}

pub fn blake2_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    blake2b::Context::<128>::new()
        .update(data)
        .finalize_at(&mut out);
    out
}

pub fn storage_prefix(pallet: &str, item: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(PREFIX_LEN);
    key.extend_from_slice(&twox128(pallet.as_bytes()));
    key.extend_from_slice(&twox128(item.as_bytes()));
    key
}

/// `System::Account` key, hashed with Blake2_128Concat
pub fn system_account_key(account: &AccountId20) -> Vec<u8> {
    let raw = account.as_bytes();
    let mut key = SYSTEM_ACCOUNT_PREFIX.clone();
    key.extend_from_slice(&blake2_128(raw));
    key.extend_from_slice(raw);
    key
}

/// `Randomness::Requests` key for a request id, hashed with Blake2_128Concat
pub fn request_key(id: u64) -> Vec<u8> {
    let encoded = id.to_le_bytes();
    let mut key = REQUESTS_PREFIX.clone();
    key.extend_from_slice(&blake2_128(&encoded));
    key.extend_from_slice(&encoded);
    key
}

/// `Randomness::RandomnessResults` key for an encoded request type, hashed with Twox64Concat
pub fn result_key(encoded_request_type: &[u8]) -> Vec<u8> {
    let mut key = RESULTS_PREFIX.clone();
    key.extend_from_slice(&twox64(encoded_request_type));
    key.extend_from_slice(encoded_request_type);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twox128_known_prefixes() {
        assert_eq!(
            hex::encode(twox128(b"System")),
            "26aa394eea5630e07c48ae0c9558cef7"
        );
        assert_eq!(
            hex::encode(twox128(b"Account")),
            "b99d880ec681799c0cf30e8886371da9"
        );
    }

    #[test]
    fn test_blake2_128_concat_account_key() {
        // Well-known System::Account key of the sr25519 development account "Alice"
        let alice = hex::decode("d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d")
            .unwrap();
        assert_eq!(
            hex::encode(blake2_128(&alice)),
            "de1e86a9a8c739864cf3cc5ec2bea59f"
        );
    }

    #[test]
    fn test_escrow_account_id() {
        assert_eq!(
            format!("{:?}", randomness_account()),
            "0x6d6f646c6d6f6f6e72616e640000000000000000"
        );
        assert_eq!(&RANDOMNESS_ACCOUNT_ID[..12], b"modlmoonrand");
    }

    #[test]
    fn test_request_key_layout() {
        let key = request_key(0x0102);
        assert_eq!(key.len(), PREFIX_LEN + 16 + 8);
        assert!(key.starts_with(&REQUESTS_PREFIX));
        assert_eq!(&key[key.len() - 8..], &0x0102u64.to_le_bytes());
    }

    #[test]
    fn test_system_account_key_layout() {
        let account = randomness_account();
        let key = system_account_key(&account);
        assert_eq!(key.len(), PREFIX_LEN + 16 + 20);
        assert_eq!(
            hex::encode(&key[..PREFIX_LEN]),
            "26aa394eea5630e07c48ae0c9558cef7b99d880ec681799c0cf30e8886371da9"
        );
        assert_eq!(&key[PREFIX_LEN + 16..], &RANDOMNESS_ACCOUNT_ID);
    }

    #[test]
    fn test_prefixes_are_distinct() {
        assert_ne!(*REQUESTS_PREFIX, *RESULTS_PREFIX);
        assert_eq!(REQUESTS_PREFIX[..16], RESULTS_PREFIX[..16]);
    }
}
