//! SHA3-256 hashing.
//!
//! All consensus-critical hashes (block self-hashes, committee hashes)
//! are SHA3-256 over the canonical wire serialization of the object.

use sha3::{Digest, Sha3_256};

/// SHA3-256 hash output (256-bit).
pub type Hash = [u8; 32];

/// Stateful SHA3-256 hasher for multi-part inputs.
pub struct Sha3Hasher {
    inner: Sha3_256,
}

impl Sha3Hasher {
    /// Create new hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha3_256::new(),
        }
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Finalize and return hash.
    pub fn finalize(self) -> Hash {
        self.inner.finalize().into()
    }
}

impl Default for Sha3Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash data with SHA3-256 (one-shot).
pub fn sha3_256(data: &[u8]) -> Hash {
    Sha3_256::digest(data).into()
}

/// Hash multiple inputs as one concatenated message.
pub fn sha3_256_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Sha3Hasher::new();
    for input in inputs {
        hasher.update(input);
    }
    hasher.finalize()
}
