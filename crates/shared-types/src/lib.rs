//! # Shared Types - Core Entities
//!
//! Plain data types shared by every Strata subsystem: hashes, network
//! peers, block typing, and the block-link records that tie the
//! per-kind chains (transaction, directory-service, view-change)
//! together.
//!
//! Crypto-bearing types (keys, signatures) live in `shared-crypto`;
//! this crate stays dependency-light so leaf subsystems can use it
//! without pulling in curve arithmetic.

#![warn(clippy::all)]

pub mod entities;

pub use entities::{BlockLink, BlockType, Hash, Peer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
