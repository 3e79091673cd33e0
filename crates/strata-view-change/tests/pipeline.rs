//! End-to-end tests of the view-change pipeline: a committee of real BLS
//! keys signs a block, the service validates and applies it, and every
//! gate's failure mode is exercised against the same harness.

use std::sync::Arc;

use bitvec::prelude::*;
use parking_lot::Mutex;
use shared_crypto::{BlsKeyPair, BlsSignature};
use shared_types::Peer;
use strata_view_change::domain::codec;
use strata_view_change::{
    cosig_message, num_for_consensus, Bitmap, CommitteeMember, DsCommittee, InMemoryVcBlockStore,
    ShardBroadcaster, TimeSource, VcBlock, VcBlockError, VcBlockHeader, ViewChangeConfig,
    ViewChangeDependencies, ViewChangeService, ViewChangeState,
};
use strata_view_change::VcBlockStore;

const NOW: u64 = 1_700_000_000;
const CURRENT_EPOCH: u64 = 42;
const VC_DS_EPOCH: u64 = 1;
const COMMITTEE_SIZE: usize = 9;

struct MockTimeSource(u64);

impl TimeSource for MockTimeSource {
    fn now(&self) -> u64 {
        self.0
    }
}

#[derive(Default)]
struct RecordingBroadcaster {
    sent: Mutex<Vec<(Vec<u8>, u32, u32)>>,
}

impl ShardBroadcaster for RecordingBroadcaster {
    fn send_to_shard_nodes(&self, frame: Vec<u8>, cluster_size: u32, child_clusters: u32) {
        self.sent.lock().push((frame, cluster_size, child_clusters));
    }
}

type Service =
    ViewChangeService<Arc<InMemoryVcBlockStore>, Arc<RecordingBroadcaster>, MockTimeSource>;

struct Harness {
    keypairs: Vec<BlsKeyPair>,
    committee: DsCommittee,
    store: Arc<InMemoryVcBlockStore>,
    broadcaster: Arc<RecordingBroadcaster>,
    service: Service,
    from: Peer,
}

fn member(keypair: &BlsKeyPair, seat: u8) -> CommitteeMember {
    CommitteeMember::new(keypair.public_key(), Peer::from_ipv4([10, 0, 0, seat], 5001))
}

fn harness_with_config(config: ViewChangeConfig) -> Harness {
    let keypairs: Vec<BlsKeyPair> = (0..COMMITTEE_SIZE).map(|_| BlsKeyPair::generate()).collect();
    let committee: DsCommittee = keypairs
        .iter()
        .enumerate()
        .map(|(i, kp)| member(kp, i as u8))
        .collect();

    let store = Arc::new(InMemoryVcBlockStore::new());
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let self_keypair = BlsKeyPair::generate();

    let service = ViewChangeService::new(
        ViewChangeDependencies {
            store: Arc::clone(&store),
            broadcaster: Some(Arc::clone(&broadcaster)),
            time_source: MockTimeSource(NOW),
        },
        config,
        committee.clone(),
        self_keypair.public_key(),
        CURRENT_EPOCH,
        0,
    );

    Harness {
        keypairs,
        committee,
        store,
        broadcaster,
        service,
        from: Peer::from_ipv4([10, 0, 1, 77], 5001),
    }
}

fn harness() -> Harness {
    harness_with_config(ViewChangeConfig::default())
}

struct BlockParams {
    version: u32,
    vc_epoch: u64,
    vc_ds_epoch: u64,
    state: ViewChangeState,
    timestamp: u64,
    signers: usize,
    committee_hash: Option<[u8; 32]>,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            version: 1,
            vc_epoch: CURRENT_EPOCH,
            vc_ds_epoch: VC_DS_EPOCH,
            state: ViewChangeState::FinalBlockConsensus,
            timestamp: NOW,
            signers: num_for_consensus(COMMITTEE_SIZE),
            committee_hash: None,
        }
    }
}

/// Build a block with faulty leader seat 0 and candidate leader seat 1,
/// commit-signed by the first `signers` seats.
fn build_block(h: &Harness, params: BlockParams) -> VcBlock {
    let header = VcBlockHeader {
        version: params.version,
        vc_ds_epoch: params.vc_ds_epoch,
        vc_epoch: params.vc_epoch,
        state: params.state,
        candidate_leader_peer: Peer::from_ipv4([10, 0, 0, 1], 5001),
        candidate_leader_pubkey: h.keypairs[1].public_key(),
        faulty_leaders: vec![member(&h.keypairs[0], 0)],
        committee_hash: params.committee_hash.unwrap_or_else(|| h.committee.hash()),
        prev_hash: [0u8; 32],
    };

    let b1: Bitmap = bitvec![u8, Msb0; 1; COMMITTEE_SIZE];
    let cs1 = BlsSignature::aggregate(
        &h.keypairs
            .iter()
            .map(|kp| kp.sign(b"pre-commit round"))
            .collect::<Vec<_>>(),
    )
    .unwrap();

    let mut b2: Bitmap = bitvec![u8, Msb0; 0; COMMITTEE_SIZE];
    for i in 0..params.signers {
        b2.set(i, true);
    }
    let message = cosig_message(&header, &cs1, &b1);
    let cs2 = BlsSignature::aggregate(
        &h.keypairs[..params.signers]
            .iter()
            .map(|kp| kp.sign(&message))
            .collect::<Vec<_>>(),
    )
    .unwrap();

    VcBlock::new(header, cs1, b1, cs2, b2, params.timestamp)
}

fn frame_of(block: &VcBlock) -> Vec<u8> {
    codec::encode_frame(block)
}

#[test]
fn happy_path_persists_mutates_and_forwards() {
    let h = harness();
    let block = build_block(&h, BlockParams::default());
    let frame = frame_of(&block);

    h.service
        .process_vc_block(&frame, codec::BODY_OFFSET, &h.from)
        .unwrap();

    // Persisted verbatim under the canonical hash
    assert_eq!(
        h.store.get_vc_block(&block.block_hash).unwrap(),
        Some(codec::encode_block(&block))
    );

    // Linked with a contiguous index and the VC tag
    let link = h.service.chain().latest().unwrap();
    assert_eq!(link.index, 0);
    assert_eq!(link.ds_epoch, VC_DS_EPOCH);
    assert_eq!(link.hash, block.block_hash);

    // Faulty seat 0 rotated to the tail
    let snapshot = h.service.committee_snapshot();
    assert_eq!(snapshot.len(), COMMITTEE_SIZE);
    assert_eq!(snapshot[0], member(&h.keypairs[1], 1));
    assert_eq!(snapshot[COMMITTEE_SIZE - 1], member(&h.keypairs[0], 0));

    // A fresh frame (not the inbound buffer) was handed to the broadcaster
    let sent = h.broadcaster.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, frame);
    assert_eq!(sent[0].1, 3);
    assert_eq!(sent[0].2, 3);
}

#[test]
fn trailing_garbage_is_not_forwarded() {
    let h = harness();
    let block = build_block(&h, BlockParams::default());
    let mut frame = frame_of(&block);
    frame.extend_from_slice(b"trailing gossip bytes");

    h.service
        .process_vc_block(&frame, codec::BODY_OFFSET, &h.from)
        .unwrap();

    let sent = h.broadcaster.sent.lock();
    assert_eq!(sent[0].0, frame_of(&block));
}

#[test]
fn duplicate_submission_is_benign_and_idempotent() {
    let h = harness();
    let block = build_block(&h, BlockParams::default());
    let frame = frame_of(&block);

    h.service
        .process_vc_block(&frame, codec::BODY_OFFSET, &h.from)
        .unwrap();
    let snapshot_after_apply = h.service.committee_snapshot();

    let err = h
        .service
        .process_vc_block(&frame, codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(err, VcBlockError::Duplicate { hash } if hash == block.block_hash));

    // Exactly one apply: store, chain and committee unchanged
    assert_eq!(h.store.len(), 1);
    assert_eq!(h.service.chain().len(), 1);
    assert_eq!(h.service.committee_snapshot(), snapshot_after_apply);
}

#[test]
fn undecodable_frame_rejected() {
    let h = harness();
    let err = h
        .service
        .process_vc_block(b"\x01\x03nonsense", codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(err, VcBlockError::Decode(_)));
    assert!(h.store.is_empty());
}

#[test]
fn wrong_version_rejected() {
    let h = harness();
    let block = build_block(
        &h,
        BlockParams {
            version: 2,
            ..Default::default()
        },
    );
    let err = h
        .service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(
        err,
        VcBlockError::Version {
            expected: 1,
            got: 2
        }
    ));
}

#[test]
fn ds_coupled_view_change_deferred_to_ds_pipeline() {
    let h = harness();
    for state in [
        ViewChangeState::DsBlockConsensusPrep,
        ViewChangeState::DsBlockConsensus,
    ] {
        let block = build_block(
            &h,
            BlockParams {
                state,
                ..Default::default()
            },
        );
        let err = h
            .service
            .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
            .unwrap_err();
        assert!(matches!(err, VcBlockError::PrecedesDsBlock { .. }));
    }
    assert!(h.store.is_empty());
    assert_eq!(h.service.committee_snapshot(), h.committee.to_vec());
}

#[test]
fn wrong_epoch_rejected() {
    let h = harness();
    let block = build_block(
        &h,
        BlockParams {
            vc_epoch: CURRENT_EPOCH + 1,
            ..Default::default()
        },
    );
    let err = h
        .service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(err, VcBlockError::WrongEpoch { .. }));
}

#[test]
fn stale_ds_generation_rejected() {
    let h = harness();
    h.service.set_latest_ds_epoch(VC_DS_EPOCH);
    let block = build_block(&h, BlockParams::default());
    let err = h
        .service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(err, VcBlockError::Stale { .. }));
}

#[test]
fn tampered_block_hash_rejected() {
    let h = harness();
    let mut block = build_block(&h, BlockParams::default());
    block.block_hash[0] ^= 0xFF;
    let err = h
        .service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(err, VcBlockError::HashMismatch { .. }));
    assert!(h.store.is_empty());
}

#[test]
fn timestamp_window_boundaries() {
    let tolerance = ViewChangeConfig::default().timestamp_tolerance();

    // Exactly at the upper edge: accepted
    let h = harness();
    let block = build_block(
        &h,
        BlockParams {
            timestamp: NOW + tolerance,
            ..Default::default()
        },
    );
    h.service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap();

    // One second past the edge: rejected
    let h = harness();
    let block = build_block(
        &h,
        BlockParams {
            timestamp: NOW + tolerance + 1,
            ..Default::default()
        },
    );
    let err = h
        .service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(err, VcBlockError::BadTimestamp { .. }));

    // Lower edge mirrors the upper one
    let h = harness();
    let block = build_block(
        &h,
        BlockParams {
            timestamp: NOW - tolerance,
            ..Default::default()
        },
    );
    h.service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap();
}

#[test]
fn committee_hash_mismatch_rejected() {
    let h = harness();
    let block = build_block(
        &h,
        BlockParams {
            committee_hash: Some([0x5A; 32]),
            ..Default::default()
        },
    );
    let err = h
        .service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(err, VcBlockError::CommitteeHashMismatch { .. }));
}

#[test]
fn insufficient_signers_rejected() {
    let h = harness();
    let block = build_block(
        &h,
        BlockParams {
            signers: num_for_consensus(COMMITTEE_SIZE) - 1,
            ..Default::default()
        },
    );
    let err = h
        .service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap_err();
    assert!(matches!(err, VcBlockError::BadSignature));
    assert!(h.store.is_empty());
    assert_eq!(h.service.chain().len(), 0);
}

#[test]
fn lookup_node_archives_without_forwarding() {
    let config = ViewChangeConfig {
        lookup_node_mode: true,
        ..Default::default()
    };
    let h = harness_with_config(config);
    let block = build_block(&h, BlockParams::default());

    h.service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap();

    assert_eq!(h.store.len(), 1);
    assert!(h.broadcaster.sent.lock().is_empty());
}

#[test]
fn guard_mode_applies_block_without_touching_committee() {
    let config = ViewChangeConfig {
        guard_mode: true,
        ..Default::default()
    };
    let h = harness_with_config(config);
    let block = build_block(&h, BlockParams::default());

    h.service
        .process_vc_block(&frame_of(&block), codec::BODY_OFFSET, &h.from)
        .unwrap();

    assert_eq!(h.store.len(), 1);
    assert_eq!(h.service.committee_snapshot(), h.committee.to_vec());
}

#[test]
fn consecutive_view_changes_chain_contiguously() {
    let h = harness();
    let first = build_block(&h, BlockParams::default());
    h.service
        .process_vc_block(&frame_of(&first), codec::BODY_OFFSET, &h.from)
        .unwrap();

    // The next view change is produced against the permuted committee
    let permuted: DsCommittee = h.service.committee_snapshot().into_iter().collect();
    let header = VcBlockHeader {
        version: 1,
        vc_ds_epoch: VC_DS_EPOCH,
        vc_epoch: CURRENT_EPOCH,
        state: ViewChangeState::FinalBlockConsensusPrep,
        candidate_leader_peer: Peer::from_ipv4([10, 0, 0, 2], 5001),
        candidate_leader_pubkey: h.keypairs[2].public_key(),
        faulty_leaders: vec![member(&h.keypairs[1], 1)],
        committee_hash: permuted.hash(),
        prev_hash: first.block_hash,
    };
    let b1: Bitmap = bitvec![u8, Msb0; 1; COMMITTEE_SIZE];
    let cs1 = BlsSignature::aggregate(
        &h.keypairs
            .iter()
            .map(|kp| kp.sign(b"pre-commit round"))
            .collect::<Vec<_>>(),
    )
    .unwrap();
    let threshold = num_for_consensus(COMMITTEE_SIZE);
    let mut b2: Bitmap = bitvec![u8, Msb0; 0; COMMITTEE_SIZE];
    let message = cosig_message(&header, &cs1, &b1);
    let mut signatures = Vec::new();
    for seat in 0..threshold {
        // Sign with the key seated at `seat` in the *permuted* order
        let seat_key = &permuted.get(seat).unwrap().pubkey;
        let keypair = h
            .keypairs
            .iter()
            .find(|kp| kp.public_key() == *seat_key)
            .unwrap();
        b2.set(seat, true);
        signatures.push(keypair.sign(&message));
    }
    let cs2 = BlsSignature::aggregate(&signatures).unwrap();
    let second = VcBlock::new(header, cs1, b1, cs2, b2, NOW);

    h.service
        .process_vc_block(&frame_of(&second), codec::BODY_OFFSET, &h.from)
        .unwrap();

    assert_eq!(h.service.chain().len(), 2);
    assert_eq!(h.service.chain().get(0).unwrap().hash, first.block_hash);
    assert_eq!(h.service.chain().get(1).unwrap().hash, second.block_hash);
    assert_eq!(h.store.len(), 2);
}
