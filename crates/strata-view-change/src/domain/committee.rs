//! DS committee model and view-change mutation.
//!
//! The committee is an ordered deque of `(public key, peer)` pairs;
//! insertion order defines each member's bit position in the co-signature
//! bitmaps, so every mutation must be a deterministic permutation.
//!
//! A node stores *itself* in its own committee view with the zero peer
//! (`0.0.0.0:0`); the ejection logic has to account for that sentinel when
//! the faulty leader is the local node.

use std::collections::VecDeque;

use shared_crypto::{BlsPublicKey, Sha3Hasher};
use shared_types::{Hash, Peer};
use tracing::{info, warn};

use super::codec;

/// One seat of the DS committee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeMember {
    /// Member's BLS public key.
    pub pubkey: BlsPublicKey,
    /// Member's network endpoint; [`Peer::ZERO`] for the local node's own
    /// seat.
    pub peer: Peer,
}

impl CommitteeMember {
    /// Create a committee member.
    pub fn new(pubkey: BlsPublicKey, peer: Peer) -> Self {
        Self { pubkey, peer }
    }
}

/// The ordered DS committee.
///
/// Wraps a deque so leader rotation (front) and faulty-member demotion
/// (tail) are both O(1) at the ends.
#[derive(Debug, Clone, Default)]
pub struct DsCommittee {
    members: VecDeque<CommitteeMember>,
}

impl DsCommittee {
    /// Empty committee.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of seats.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when the committee has no seats.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate members in seat order.
    pub fn iter(&self) -> impl Iterator<Item = &CommitteeMember> {
        self.members.iter()
    }

    /// Member at seat `index`.
    pub fn get(&self, index: usize) -> Option<&CommitteeMember> {
        self.members.get(index)
    }

    /// Append a member at the tail.
    pub fn push_back(&mut self, member: CommitteeMember) {
        self.members.push_back(member);
    }

    /// Seat order as a plain vector (for inspection and tests).
    pub fn to_vec(&self) -> Vec<CommitteeMember> {
        self.members.iter().cloned().collect()
    }

    /// SHA3-256 over the serialized committee in seat order.
    ///
    /// This is the value a view-change quorum commits to in the block
    /// header; it pins both membership and ordering.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha3Hasher::new();
        for member in &self.members {
            let mut buf = Vec::with_capacity(72);
            buf.extend_from_slice(&member.pubkey.to_bytes());
            buf.extend_from_slice(&member.peer.ip.to_be_bytes());
            codec::write_uint(&mut buf, member.peer.port as u64);
            hasher.update(&buf);
        }
        hasher.finalize()
    }

    /// Rotate the faulty leaders to the committee tail, in list order.
    ///
    /// When a faulty entry names this node (own key, zero peer), the seat
    /// is located by the sentinel form it has in the local view. A missing
    /// seat is logged and skipped over, but the entry is still appended so
    /// every node converges on the same tail ordering.
    ///
    /// No-op in guard mode: membership is pinned by policy.
    pub fn eject_faulty_leaders(
        &mut self,
        faulty_leaders: &[CommitteeMember],
        self_pubkey: &BlsPublicKey,
        guard_mode: bool,
    ) {
        if guard_mode {
            info!("guard mode: DS committee composition left unchanged");
            return;
        }

        for faulty in faulty_leaders {
            let seat = if faulty.pubkey == *self_pubkey && faulty.peer.is_zero() {
                self.members
                    .iter()
                    .position(|m| m.pubkey == *self_pubkey && m.peer.is_zero())
            } else {
                self.members.iter().position(|m| m == faulty)
            };

            match seat {
                Some(index) => {
                    self.members.remove(index);
                }
                None => {
                    warn!(
                        faulty_leader = %faulty.peer,
                        "cannot find the faulty DS leader to eject"
                    );
                }
            }

            self.members.push_back(faulty.clone());
        }
    }

    /// Retrieval-time variant of [`Self::eject_faulty_leaders`].
    ///
    /// During cold recovery from persisted blocks the peer field is not
    /// trustworthy (it may have been the zero sentinel when the block was
    /// produced), so seats are matched by public key only.
    pub fn eject_faulty_leaders_for_retrieval(
        &mut self,
        faulty_leaders: &[CommitteeMember],
        guard_mode: bool,
    ) {
        if guard_mode {
            info!("guard mode: DS committee composition left unchanged");
            return;
        }

        for faulty in faulty_leaders {
            match self.members.iter().position(|m| m.pubkey == faulty.pubkey) {
                Some(index) => {
                    self.members.remove(index);
                }
                None => {
                    warn!(
                        faulty_leader = %faulty.peer,
                        "cannot find the faulty DS leader to eject"
                    );
                }
            }

            self.members.push_back(faulty.clone());
        }
    }
}

impl FromIterator<CommitteeMember> for DsCommittee {
    fn from_iter<I: IntoIterator<Item = CommitteeMember>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}
