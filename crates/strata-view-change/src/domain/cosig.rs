//! Collective signature verification for view-change blocks.
//!
//! The commit-round signature `cs2` is an aggregate BLS signature by the
//! committee members flagged in `b2`. Verification recovers the aggregate
//! public key from the live committee and the bitmap, checks the BFT
//! supermajority count, and verifies one signature over the composed
//! message `serialize(header) || cs1 || encode(b1)`.
//!
//! Everything here is pure; no I/O and no locks.

use shared_crypto::{bls, BlsPublicKey, BlsSignature};
use tracing::warn;

use super::codec;
use super::committee::DsCommittee;
use super::entities::{Bitmap, VcBlock, VcBlockHeader};

/// BFT supermajority threshold: `ceil(2n/3) + 1` signers out of `n`.
pub fn num_for_consensus(committee_size: usize) -> usize {
    (2 * committee_size).div_ceil(3) + 1
}

/// The message the commit round signs: serialized header, round-one
/// signature, round-one bitmap.
pub fn cosig_message(header: &VcBlockHeader, cs1: &BlsSignature, b1: &Bitmap) -> Vec<u8> {
    let mut message = codec::encode_header(header);
    message.extend_from_slice(&cs1.to_bytes());
    codec::write_bitmap(&mut message, b1);
    message
}

/// Verify the block's commit-round co-signature against the live committee.
///
/// Returns false (with a warning naming the failed step) rather than an
/// error: the caller maps any failure to its signature gate.
pub fn verify_cosignature(block: &VcBlock, committee: &DsCommittee) -> bool {
    if committee.len() != block.b2.len() || block.b1.len() != block.b2.len() {
        warn!(
            committee_size = committee.len(),
            b1_size = block.b1.len(),
            b2_size = block.b2.len(),
            "co-signature bitmap size does not match the DS committee"
        );
        return false;
    }

    let mut keys = Vec::new();
    for (index, member) in committee.iter().enumerate() {
        if block.b2[index] {
            keys.push(member.pubkey.clone());
        }
    }

    if keys.len() != num_for_consensus(block.b2.len()) {
        warn!(
            signers = keys.len(),
            required = num_for_consensus(block.b2.len()),
            "co-signature was not generated by enough nodes"
        );
        return false;
    }

    let aggregated_key = match BlsPublicKey::aggregate(&keys) {
        Ok(key) => key,
        Err(err) => {
            warn!(error = %err, "aggregate key generation failed");
            return false;
        }
    };

    let message = cosig_message(&block.header, &block.cs1, &block.b1);
    if !bls::multi_sig_verify(&message, &block.cs2, &aggregated_key) {
        warn!("co-signature verification failed");
        for key in &keys {
            warn!(pubkey = %hex::encode(key.to_bytes()), "participating key");
        }
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::committee::CommitteeMember;
    use crate::domain::entities::{ViewChangeState, VcBlock};
    use bitvec::prelude::*;
    use shared_crypto::BlsKeyPair;
    use shared_types::Peer;

    fn build_committee(n: usize) -> (Vec<BlsKeyPair>, DsCommittee) {
        let keypairs: Vec<BlsKeyPair> = (0..n).map(|_| BlsKeyPair::generate()).collect();
        let committee = keypairs
            .iter()
            .enumerate()
            .map(|(i, kp)| {
                CommitteeMember::new(kp.public_key(), Peer::from_ipv4([10, 0, 0, i as u8], 5001))
            })
            .collect();
        (keypairs, committee)
    }

    fn signed_block(keypairs: &[BlsKeyPair], committee: &DsCommittee, signers: usize) -> VcBlock {
        let n = keypairs.len();
        let header = VcBlockHeader {
            version: 1,
            vc_ds_epoch: 3,
            vc_epoch: 40,
            state: ViewChangeState::FinalBlockConsensus,
            candidate_leader_peer: Peer::from_ipv4([10, 0, 0, 1], 5001),
            candidate_leader_pubkey: keypairs[1].public_key(),
            faulty_leaders: vec![CommitteeMember::new(
                keypairs[0].public_key(),
                Peer::from_ipv4([10, 0, 0, 0], 5001),
            )],
            committee_hash: committee.hash(),
            prev_hash: [0u8; 32],
        };

        let mut b1 = bitvec![u8, Msb0; 1; n];
        b1.set(n - 1, false);
        let cs1 = shared_crypto::BlsSignature::aggregate(
            &keypairs[..n - 1]
                .iter()
                .map(|kp| kp.sign(b"round one"))
                .collect::<Vec<_>>(),
        )
        .unwrap();

        let mut b2 = bitvec![u8, Msb0; 0; n];
        for i in 0..signers {
            b2.set(i, true);
        }
        let message = cosig_message(&header, &cs1, &b1);
        let cs2 = shared_crypto::BlsSignature::aggregate(
            &keypairs[..signers]
                .iter()
                .map(|kp| kp.sign(&message))
                .collect::<Vec<_>>(),
        )
        .unwrap();

        VcBlock::new(header, cs1, b1, cs2, b2, 1_700_000_000)
    }

    #[test]
    fn test_threshold_formula() {
        assert_eq!(num_for_consensus(9), 7);
        assert_eq!(num_for_consensus(10), 8);
        assert_eq!(num_for_consensus(3), 3);
        assert_eq!(num_for_consensus(100), 68);
    }

    #[test]
    fn test_valid_cosignature_accepted() {
        let (keypairs, committee) = build_committee(9);
        let block = signed_block(&keypairs, &committee, num_for_consensus(9));
        assert!(verify_cosignature(&block, &committee));
    }

    #[test]
    fn test_one_signer_short_rejected() {
        // ceil(2n/3) signers without the +1 must fail
        let (keypairs, committee) = build_committee(9);
        let block = signed_block(&keypairs, &committee, num_for_consensus(9) - 1);
        assert!(!verify_cosignature(&block, &committee));
    }

    #[test]
    fn test_bitmap_size_mismatch_rejected() {
        let (keypairs, committee) = build_committee(9);
        let mut block = signed_block(&keypairs, &committee, num_for_consensus(9));
        block.b2.push(false);
        assert!(!verify_cosignature(&block, &committee));
    }

    #[test]
    fn test_signature_by_wrong_quorum_rejected() {
        // Signed by seats 0..6 but the bitmap claims seats 1..7
        let (keypairs, committee) = build_committee(9);
        let threshold = num_for_consensus(9);
        let mut block = signed_block(&keypairs, &committee, threshold);
        block.b2.set(0, false);
        block.b2.set(threshold, true);
        assert!(!verify_cosignature(&block, &committee));
    }

    #[test]
    fn test_tampered_header_rejected() {
        let (keypairs, committee) = build_committee(9);
        let mut block = signed_block(&keypairs, &committee, num_for_consensus(9));
        block.header.vc_epoch += 1;
        assert!(!verify_cosignature(&block, &committee));
    }
}
