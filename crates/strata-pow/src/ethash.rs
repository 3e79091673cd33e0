//! Ethash epoch parameters and boundary checks.
//!
//! The PoW engine itself (cache generation, dataset lookups, mining) sits
//! behind the [`PowVerifier`] contract and is supplied by the node
//! runtime. What must be consensus-identical on every node is the
//! arithmetic around it: epoch numbering, the prime-searched cache and
//! dataset sizes, the hex conversions applied to submitted hashes, and
//! the final boundary comparison.

use shared_types::Hash;
use tracing::warn;

/// Blocks per Ethash epoch.
pub const EPOCH_LENGTH: u64 = 30_000;

/// Bytes in a dataset item (mix width).
pub const MIX_BYTES: u64 = 128;

/// Bytes in a cache item.
pub const HASH_BYTES: u64 = 64;

const DATASET_BYTES_INIT: u64 = 1 << 30;
const DATASET_BYTES_GROWTH: u64 = 1 << 23;
const CACHE_BYTES_INIT: u64 = 1 << 24;
const CACHE_BYTES_GROWTH: u64 = 1 << 17;

/// Verification contract the node runtime provides.
///
/// `mix_digest` is the intermediate mix the miner claims; a verifier
/// recomputes it from the light cache and checks the final hash against
/// [`difficulty_to_boundary`].
pub trait PowVerifier: Send + Sync {
    /// Check one PoW solution for the given header and difficulty.
    fn verify(&self, header_hash: &Hash, nonce: u64, mix_digest: &Hash, difficulty: u8) -> bool;
}

/// Ethash epoch of a block number.
pub fn epoch_number(block_number: u64) -> u64 {
    block_number / EPOCH_LENGTH
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut divisor = 3;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

/// Number of 64-byte items in the light cache for `epoch`.
///
/// Starts from the linear growth bound and steps down until the item
/// count is prime, which keeps the access pattern cycle-free.
pub fn light_cache_num_items(epoch: u64) -> u64 {
    let mut size = CACHE_BYTES_INIT + CACHE_BYTES_GROWTH * epoch - HASH_BYTES;
    while !is_prime(size / HASH_BYTES) {
        size -= 2 * HASH_BYTES;
    }
    size / HASH_BYTES
}

/// Light cache size in bytes.
pub fn light_cache_size(num_items: u64) -> u64 {
    num_items * HASH_BYTES
}

/// Number of 128-byte items in the full dataset for `epoch`.
pub fn full_dataset_num_items(epoch: u64) -> u64 {
    let mut size = DATASET_BYTES_INIT + DATASET_BYTES_GROWTH * epoch - MIX_BYTES;
    while !is_prime(size / MIX_BYTES) {
        size -= 2 * MIX_BYTES;
    }
    size / MIX_BYTES
}

/// Full dataset size in bytes.
pub fn full_dataset_size(num_items: u64) -> u64 {
    num_items * MIX_BYTES
}

/// Parse a 64-hex-character block hash (with or without `0x`).
///
/// Anything that is not exactly 32 bytes of hex yields the zero hash; the
/// caller notices because the round-trip through [`hash_to_hex`] no longer
/// matches its input.
pub fn hash_from_hex(input: &str) -> Hash {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    let mut hash = [0u8; 32];
    match hex::decode(stripped) {
        Ok(bytes) if bytes.len() == 32 => hash.copy_from_slice(&bytes),
        _ => warn!(len = input.len(), "input is not a 32-byte hex string"),
    }
    hash
}

/// Lowercase hex form of a block hash.
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// True when `hash` meets the difficulty `boundary`: big-endian
/// `hash <= boundary`.
pub fn check_difficulty(hash: &Hash, boundary: &Hash) -> bool {
    for (h, b) in hash.iter().zip(boundary.iter()) {
        match h.cmp(b) {
            std::cmp::Ordering::Less => return true,
            std::cmp::Ordering::Greater => return false,
            std::cmp::Ordering::Equal => {}
        }
    }
    true
}

/// Boundary for a difficulty expressed as leading zero bits.
pub fn difficulty_to_boundary(difficulty: u8) -> Hash {
    let mut boundary = [0xFFu8; 32];
    let full_bytes = (difficulty / 8) as usize;
    for byte in boundary.iter_mut().take(full_bytes.min(32)) {
        *byte = 0;
    }
    if full_bytes < 32 {
        boundary[full_bytes] = 0xFF >> (difficulty % 8);
    }
    boundary
}
