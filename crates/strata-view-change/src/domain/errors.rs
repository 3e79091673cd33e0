//! Error types for the view-change pipeline.
//!
//! One [`VcBlockError`] variant per validation gate plus cross-cutting
//! kinds. Contextual detail (hashes, epochs) is logged where the gate
//! fails; the variants carry what a caller needs to discriminate.

use shared_types::Hash;
use thiserror::Error;

use super::entities::ViewChangeState;

/// Wire decoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input ended before the field was complete
    #[error("truncated input at byte {at}")]
    Truncated {
        /// Offset at which more bytes were needed.
        at: usize,
    },

    /// A variable integer exceeded the width of its target type
    #[error("integer field too wide: {len} bytes")]
    IntegerTooWide {
        /// Encoded byte length.
        len: usize,
    },

    /// Unknown view-change state tag
    #[error("unknown view-change state tag: {0}")]
    InvalidStateTag(u8),

    /// A length-prefixed list exceeded the protocol bound
    #[error("list length {0} exceeds protocol bound")]
    ListTooLong(u64),

    /// An embedded key or signature failed to parse as a curve point
    #[error("invalid curve point: {0}")]
    Crypto(#[from] shared_crypto::CryptoError),
}

/// Block store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failure
    #[error("storage I/O error: {message}")]
    Io {
        /// Operating system error description.
        message: String,
    },
}

/// Rejected append to the block-link chain.
#[derive(Debug, Error)]
#[error("non-contiguous block link index: expected {expected}, got {got}")]
pub struct LinkChainError {
    /// The only index the chain will accept next.
    pub expected: u64,
    /// The index that was offered.
    pub got: u64,
}

/// Typed failure of `process_vc_block`; the variant names the gate that
/// rejected the block. `Duplicate` is benign.
#[derive(Debug, Error)]
pub enum VcBlockError {
    /// Gate 1: framing or field parsing failed
    #[error("failed to decode view-change block: {0}")]
    Decode(#[from] CodecError),

    /// Gate 2: version tag not accepted by this node
    #[error("unexpected block version: expected {expected}, got {got}")]
    Version {
        /// Version this node accepts.
        expected: u32,
        /// Version carried by the block.
        got: u32,
    },

    /// Gate 3: the view change precedes a DS block and belongs to the DS
    /// pipeline
    #[error("view change in state {state:?} precedes a DS block; processed with the DS block")]
    PrecedesDsBlock {
        /// The DS-coupled state the block carried.
        state: ViewChangeState,
    },

    /// Gate 4: view-change epoch does not match the node's current epoch
    #[error("wrong view-change epoch: block at {got}, node at {current}")]
    WrongEpoch {
        /// Epoch in the block header.
        got: u64,
        /// The node's current epoch.
        current: u64,
    },

    /// Gate 5: block is not ahead of the last committed DS generation
    #[error("stale view-change block: ds epoch {ds_epoch}, tx epoch {tx_epoch}")]
    Stale {
        /// DS epoch in the block header.
        ds_epoch: u64,
        /// Transaction epoch in the block header.
        tx_epoch: u64,
    },

    /// Gate 6: recomputed self-hash differs from the canonical block hash
    #[error("block hash mismatch")]
    HashMismatch {
        /// Hash recomputed from the header.
        calculated: Hash,
        /// Hash the block arrived with.
        received: Hash,
    },

    /// Gate 7: block already persisted
    #[error("duplicate view-change block")]
    Duplicate {
        /// The duplicated block hash.
        hash: Hash,
    },

    /// Gate 8: timestamp outside the tolerance window
    #[error("timestamp {timestamp} outside tolerance window around {now}")]
    BadTimestamp {
        /// Timestamp carried by the block.
        timestamp: u64,
        /// Local time at the check.
        now: u64,
    },

    /// Gate 9: live committee does not hash to the co-signed committee
    #[error("DS committee hash mismatch")]
    CommitteeHashMismatch {
        /// Hash of this node's live committee.
        calculated: Hash,
        /// Committee hash in the block header.
        received: Hash,
    },

    /// Gate 10: aggregate co-signature rejected
    #[error("co-signature verification failed")]
    BadSignature,

    /// Gate 11: block-link chain refused the append
    #[error(transparent)]
    LinkChain(#[from] LinkChainError),

    /// Gate 12: persistence failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invariant violation that no gate accounts for
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for view-change operations.
pub type VcBlockResult<T> = Result<T, VcBlockError>;
