//! Append-only block-link chain.
//!
//! Indexes every accepted block hash with its DS epoch and kind. The
//! index sequence is contiguous from zero; concurrent appenders are
//! serialized on the internal lock, so `latest_index` is monotonically
//! non-decreasing.

use parking_lot::Mutex;
use shared_types::{BlockLink, BlockType, Hash};
use tracing::debug;

use super::errors::LinkChainError;

/// Thread-safe append-only log of block links.
#[derive(Debug, Default)]
pub struct BlockLinkChain {
    links: Mutex<Vec<BlockLink>>,
}

impl BlockLinkChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the newest link, `None` for an empty chain.
    pub fn latest_index(&self) -> Option<u64> {
        let links = self.links.lock();
        links.last().map(|link| link.index)
    }

    /// The newest link.
    pub fn latest(&self) -> Option<BlockLink> {
        self.links.lock().last().copied()
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.lock().len()
    }

    /// True when no links have been appended.
    pub fn is_empty(&self) -> bool {
        self.links.lock().is_empty()
    }

    /// Link at `index`.
    pub fn get(&self, index: u64) -> Option<BlockLink> {
        self.links.lock().get(index as usize).copied()
    }

    /// Append a link; `index` must be exactly `latest_index() + 1`
    /// (or 0 on an empty chain).
    pub fn add_link(
        &self,
        index: u64,
        ds_epoch: u64,
        block_type: BlockType,
        hash: Hash,
    ) -> Result<(), LinkChainError> {
        let mut links = self.links.lock();
        let expected = links.last().map_or(0, |link| link.index + 1);
        if index != expected {
            return Err(LinkChainError {
                expected,
                got: index,
            });
        }
        debug!(
            index,
            ds_epoch,
            ?block_type,
            hash = %hex::encode(hash),
            "appending block link"
        );
        links.push(BlockLink {
            index,
            ds_epoch,
            block_type,
            hash,
        });
        Ok(())
    }
}
