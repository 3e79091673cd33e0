//! # Strata PoW - Difficulty Control
//!
//! ## Purpose
//!
//! The directory service admits new nodes per epoch through Ethash-style
//! proof-of-work submissions. This crate holds the consensus-critical
//! arithmetic around that process:
//!
//! - [`difficulty::calculate_new_difficulty`]: the pure retargeting rule
//!   mapping observed participation to the next epoch's difficulty. Every
//!   DS node must compute the same value or the next DS block fails
//!   consensus.
//! - [`ethash`]: epoch parameters (light-cache and full-dataset sizing),
//!   the hash/hex conversions used on submission boundaries, and the
//!   boundary difficulty check.
//!
//! The mining and dataset machinery itself lives behind the
//! [`ethash::PowVerifier`] contract and is provided by the node runtime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod difficulty;
pub mod ethash;

pub use difficulty::{calculate_new_difficulty, PowParams};
pub use ethash::{check_difficulty, difficulty_to_boundary, PowVerifier};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
