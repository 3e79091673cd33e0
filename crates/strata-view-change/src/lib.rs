//! # Strata View-Change - DS Committee Reconfiguration
//!
//! ## Purpose
//!
//! Validates, persists and applies view-change (VC) blocks: the consensus
//! objects a DS committee quorum produces after ejecting a faulty leader.
//! Every honest node must run the same gate sequence and arrive at the same
//! committee permutation, or the shard splits.
//!
//! ## Validation pipeline
//!
//! `ViewChangeService::process_vc_block` runs the gates strictly top-down;
//! the first failing gate aborts with a typed [`VcBlockError`] and nothing
//! is persisted or mutated:
//!
//! 1. Decode the framed block
//! 2. Version tag
//! 3. Reject DS-block-coupled view changes (handled by the DS pipeline)
//! 4. View-change epoch must equal the node's current epoch
//! 5. Freshness against the last committed DS generation
//! 6. Self-hash consistency
//! 7. Duplicate detection against the block store
//! 8. Timestamp tolerance window
//! 9. DS committee hash (under the committee lock)
//! 10. Aggregate co-signature over the committee bitmap
//! 11. Block-link append, persistence, committee mutation
//! 12. Optional tree-based re-broadcast to shard peers
//!
//! The committee mutex is held from gate 9 through the committee mutation so
//! no concurrent DS-block apply can slip between the hash check and the
//! signature check.

#![warn(clippy::all)]

pub mod broadcast;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::ViewChangeConfig;
pub use domain::{
    cosig_message, num_for_consensus, verify_cosignature, Bitmap, BlockLinkChain, CodecError,
    CommitteeMember, DsCommittee, StorageError, VcBlock, VcBlockError, VcBlockHeader,
    VcBlockResult, ViewChangeState,
};
pub use ports::{
    FileVcBlockStore, InMemoryVcBlockStore, ShardBroadcaster, SystemTimeSource, TimeSource,
    VcBlockStore,
};
pub use service::{ViewChangeDependencies, ViewChangeService};
