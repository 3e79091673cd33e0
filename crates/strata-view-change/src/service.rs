//! The view-change processing service.
//!
//! Owns the node-local consensus context the pipeline needs: the DS
//! committee behind its mutex, the block-link chain, the epoch counters,
//! and the injected persistence / broadcast / time dependencies.
//!
//! The committee mutex is held from the committee-hash gate through the
//! committee mutation (including the link append and the persistence
//! write): a concurrent DS-block apply must not change the committee
//! between the hash check and the signature check.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use shared_crypto::BlsPublicKey;
use shared_types::{BlockType, Peer};
use tracing::{debug, info, warn};

use crate::broadcast;
use crate::config::ViewChangeConfig;
use crate::domain::{
    codec, verify_cosignature, BlockLinkChain, CommitteeMember, DsCommittee, VcBlock,
    VcBlockError, VcBlockResult,
};
use crate::ports::{ShardBroadcaster, TimeSource, VcBlockStore};

/// Injected dependencies of [`ViewChangeService`].
pub struct ViewChangeDependencies<S, B, T> {
    /// Durable block store.
    pub store: S,
    /// Fan-out transport; `None` on nodes that never forward.
    pub broadcaster: Option<B>,
    /// Clock used by the timestamp gate.
    pub time_source: T,
}

/// The view-change pipeline service.
pub struct ViewChangeService<S, B, T>
where
    S: VcBlockStore,
    B: ShardBroadcaster,
    T: TimeSource,
{
    config: ViewChangeConfig,
    committee: Mutex<DsCommittee>,
    chain: BlockLinkChain,
    store: S,
    broadcaster: Option<B>,
    time_source: T,
    self_pubkey: BlsPublicKey,
    current_epoch: AtomicU64,
    latest_ds_epoch: AtomicU64,
}

impl<S, B, T> ViewChangeService<S, B, T>
where
    S: VcBlockStore,
    B: ShardBroadcaster,
    T: TimeSource,
{
    /// Create a service over an existing committee view.
    ///
    /// `current_epoch` is the node's transaction epoch; `latest_ds_epoch`
    /// the number of the last committed DS block. Both are advanced by the
    /// DS-block pipeline, not by view changes.
    pub fn new(
        deps: ViewChangeDependencies<S, B, T>,
        config: ViewChangeConfig,
        committee: DsCommittee,
        self_pubkey: BlsPublicKey,
        current_epoch: u64,
        latest_ds_epoch: u64,
    ) -> Self {
        Self {
            config,
            committee: Mutex::new(committee),
            chain: BlockLinkChain::new(),
            store: deps.store,
            broadcaster: deps.broadcaster,
            time_source: deps.time_source,
            self_pubkey,
            current_epoch: AtomicU64::new(current_epoch),
            latest_ds_epoch: AtomicU64::new(latest_ds_epoch),
        }
    }

    /// Validate and apply a framed view-change block received from `from`.
    ///
    /// Runs the full gate sequence; on success the block is persisted, the
    /// committee permuted, and (on forwarding shard nodes) a fresh frame is
    /// handed to the broadcaster. Any gate failure surfaces as a typed
    /// [`VcBlockError`] and leaves no state behind, except that a storage
    /// failure does not roll back the block link appended just before it.
    pub fn process_vc_block(&self, raw: &[u8], offset: usize, from: &Peer) -> VcBlockResult<()> {
        let result = self.try_process(raw, offset);
        match &result {
            Ok(()) => {}
            Err(VcBlockError::Duplicate { hash }) => {
                debug!(
                    block_hash = %hex::encode(hash),
                    from = %from,
                    "dropped duplicate view-change block"
                );
            }
            Err(err) => {
                warn!(
                    error = %err,
                    from = %from,
                    current_epoch = self.current_epoch.load(Ordering::SeqCst),
                    "view-change block rejected"
                );
            }
        }
        result
    }

    fn try_process(&self, raw: &[u8], offset: usize) -> VcBlockResult<()> {
        let block = codec::decode_block(raw, offset)?;

        if block.header.version != self.config.block_version {
            return Err(VcBlockError::Version {
                expected: self.config.block_version,
                got: block.header.version,
            });
        }

        // A view change that precedes a DS block is applied atomically with
        // that DS block by the DS pipeline; shard nodes must not apply it
        // individually.
        if block.header.state.precedes_ds_block() {
            return Err(VcBlockError::PrecedesDsBlock {
                state: block.header.state,
            });
        }

        self.process_core(&block)?;

        if !self.config.lookup_node_mode && self.config.broadcast_treebased_cluster_mode {
            self.forward_to_shard(&block);
        }

        info!(
            block_hash = %hex::encode(block.block_hash),
            vc_epoch = block.header.vc_epoch,
            new_leader = %block.header.candidate_leader_peer,
            "view of the DS leader successfully changed"
        );
        Ok(())
    }

    /// Core validation and apply sequence for one decoded block.
    fn process_core(&self, block: &VcBlock) -> VcBlockResult<()> {
        let header = &block.header;

        let current_epoch = self.current_epoch.load(Ordering::SeqCst);
        if header.vc_epoch != current_epoch {
            return Err(VcBlockError::WrongEpoch {
                got: header.vc_epoch,
                current: current_epoch,
            });
        }

        if !self.is_latest_block(header.vc_ds_epoch, header.vc_epoch) {
            return Err(VcBlockError::Stale {
                ds_epoch: header.vc_ds_epoch,
                tx_epoch: header.vc_epoch,
            });
        }

        let calculated = header.compute_hash();
        if calculated != block.block_hash {
            warn!(
                calculated = %hex::encode(calculated),
                received = %hex::encode(block.block_hash),
                "view-change block hash does not match its header"
            );
            return Err(VcBlockError::HashMismatch {
                calculated,
                received: block.block_hash,
            });
        }

        if self.store.get_vc_block(&block.block_hash)?.is_some() {
            return Err(VcBlockError::Duplicate {
                hash: block.block_hash,
            });
        }

        self.verify_timestamp(block.timestamp)?;

        let mut committee = self.committee.lock();

        let committee_hash = committee.hash();
        if committee_hash != header.committee_hash {
            warn!(
                calculated = %hex::encode(committee_hash),
                received = %hex::encode(header.committee_hash),
                "DS committee hash in view-change block does not match"
            );
            return Err(VcBlockError::CommitteeHashMismatch {
                calculated: committee_hash,
                received: header.committee_hash,
            });
        }

        if !verify_cosignature(block, &committee) {
            return Err(VcBlockError::BadSignature);
        }

        let next_index = self.chain.latest_index().map_or(0, |i| i + 1);
        self.chain
            .add_link(next_index, header.vc_ds_epoch, BlockType::Vc, block.block_hash)?;

        // A storage failure below does not roll back the link appended
        // above; the retrieval path tolerates a link without a stored body.
        let bytes = codec::encode_block(block);
        self.store.put_vc_block(&block.block_hash, &bytes)?;

        committee.eject_faulty_leaders(
            &header.faulty_leaders,
            &self.self_pubkey,
            self.config.guard_mode,
        );
        drop(committee);

        if self.config.lookup_node_mode {
            info!(
                ds_epoch = header.vc_ds_epoch,
                tx_epoch = header.vc_epoch,
                new_leader = %header.candidate_leader_peer,
                "view-change block archived"
            );
            for faulty in &header.faulty_leaders {
                info!(faulty = %faulty.peer, "faulty leader rotated to committee tail");
            }
        }

        Ok(())
    }

    /// Freshness gate: the block must belong to a DS generation ahead of
    /// the last committed one, at a transaction epoch the node has not
    /// passed. Committing a view change advances neither counter, so a
    /// replayed block falls through to the duplicate gate instead.
    fn is_latest_block(&self, ds_epoch: u64, tx_epoch: u64) -> bool {
        ds_epoch > self.latest_ds_epoch.load(Ordering::SeqCst)
            && tx_epoch >= self.current_epoch.load(Ordering::SeqCst)
    }

    fn verify_timestamp(&self, timestamp: u64) -> VcBlockResult<()> {
        let now = self.time_source.now();
        let tolerance = self.config.timestamp_tolerance();
        if timestamp > now + tolerance || timestamp + tolerance < now {
            warn!(
                timestamp,
                now, tolerance, "view-change block timestamp outside tolerance window"
            );
            return Err(VcBlockError::BadTimestamp { timestamp, now });
        }
        Ok(())
    }

    fn forward_to_shard(&self, block: &VcBlock) {
        let Some(broadcaster) = &self.broadcaster else {
            return;
        };
        // Never forward the inbound buffer: it may carry bytes beyond the
        // block. Encode a fresh frame from the validated object.
        let frame = codec::encode_frame(block);
        let cluster_size = broadcast::effective_cluster_size(
            self.config.forwarded_block_receivers_per_shard,
            self.config.num_ds_election,
        );
        info!(cluster_size, "forwarding view-change block to shard peers");
        broadcaster.send_to_shard_nodes(frame, cluster_size, self.config.treebased_child_clusters);
    }

    /// The node's current transaction epoch.
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::SeqCst)
    }

    /// Advance the transaction epoch (DS pipeline collaborator).
    pub fn set_current_epoch(&self, epoch: u64) {
        self.current_epoch.store(epoch, Ordering::SeqCst);
    }

    /// Number of the last committed DS block.
    pub fn latest_ds_epoch(&self) -> u64 {
        self.latest_ds_epoch.load(Ordering::SeqCst)
    }

    /// Record a newly committed DS block (DS pipeline collaborator).
    pub fn set_latest_ds_epoch(&self, ds_epoch: u64) {
        self.latest_ds_epoch.store(ds_epoch, Ordering::SeqCst);
    }

    /// Snapshot of the committee in seat order.
    pub fn committee_snapshot(&self) -> Vec<CommitteeMember> {
        self.committee.lock().to_vec()
    }

    /// The block-link chain.
    pub fn chain(&self) -> &BlockLinkChain {
        &self.chain
    }
}
