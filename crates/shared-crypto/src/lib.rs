//! # Shared Crypto - Consensus Cryptography
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `bls` | BLS12-381 (min_pk) | Collective block co-signatures |
//! | `hashing` | SHA3-256 | Block and committee hashing |
//!
//! ## Security Properties
//!
//! - **BLS12-381**: aggregatable signatures; one pairing check verifies a
//!   whole committee round. Ethereum 2.0 compatible domain separation tag.
//! - **SHA3-256**: consensus object hashing; every honest node must compute
//!   block and committee hashes identically, so all hashing of serialized
//!   consensus objects goes through this module.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bls;
pub mod errors;
pub mod hashing;

pub use bls::{BlsKeyPair, BlsPublicKey, BlsSecretKey, BlsSignature};
pub use errors::CryptoError;
pub use hashing::{sha3_256, Hash, Sha3Hasher};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
