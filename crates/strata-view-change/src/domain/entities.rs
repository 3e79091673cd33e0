//! View-change block entities.

use bitvec::prelude::*;
use shared_crypto::{sha3_256, BlsPublicKey, BlsSignature};
use shared_types::{Hash, Peer};

use super::codec;
use super::committee::CommitteeMember;

/// Participation bitmap over the DS committee, one bit per member in
/// committee order. Serialized MSB-first.
pub type Bitmap = BitVec<u8, Msb0>;

/// Consensus phase during which the view change fired.
///
/// The two `DsBlock*` phases mean the VC block precedes a DS block; such
/// blocks are applied atomically with that DS block by the DS pipeline and
/// must not be processed individually by shard nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ViewChangeState {
    /// Leader fault during DS block pre-consensus.
    DsBlockConsensusPrep = 1,
    /// Leader fault during DS block consensus.
    DsBlockConsensus = 2,
    /// Leader fault during final block pre-consensus.
    FinalBlockConsensusPrep = 3,
    /// Leader fault during final block consensus.
    FinalBlockConsensus = 4,
}

impl ViewChangeState {
    /// True when this view change is coupled to a DS block.
    pub fn precedes_ds_block(&self) -> bool {
        matches!(
            self,
            ViewChangeState::DsBlockConsensusPrep | ViewChangeState::DsBlockConsensus
        )
    }

    /// Decode from the wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ViewChangeState::DsBlockConsensusPrep),
            2 => Some(ViewChangeState::DsBlockConsensus),
            3 => Some(ViewChangeState::FinalBlockConsensusPrep),
            4 => Some(ViewChangeState::FinalBlockConsensus),
            _ => None,
        }
    }
}

/// Header of a view-change block.
///
/// The header is what the committee co-signs; its serialized form is the
/// first segment of the co-signature message and the input of the block's
/// self-hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcBlockHeader {
    /// Block format version.
    pub version: u32,
    /// DS epoch this view change belongs to.
    pub vc_ds_epoch: u64,
    /// Transaction epoch at which the view change fired.
    pub vc_epoch: u64,
    /// Consensus phase during which the leader faulted.
    pub state: ViewChangeState,
    /// Network endpoint of the candidate leader.
    pub candidate_leader_peer: Peer,
    /// Public key of the candidate leader.
    pub candidate_leader_pubkey: BlsPublicKey,
    /// Faulty members to rotate to the committee tail, in ejection order.
    pub faulty_leaders: Vec<CommitteeMember>,
    /// Hash of the DS committee the quorum signed against.
    pub committee_hash: Hash,
    /// Hash of the previous block.
    pub prev_hash: Hash,
}

impl VcBlockHeader {
    /// SHA3-256 of the serialized header.
    ///
    /// Computed on demand; the canonical block hash must equal this value.
    pub fn compute_hash(&self) -> Hash {
        sha3_256(&codec::encode_header(self))
    }
}

/// A complete view-change block.
///
/// `cs1`/`b1` are the pre-commit round collective signature and its
/// participation bitmap, `cs2`/`b2` the final commit round. `block_hash`
/// is the canonical hash the block is stored and deduplicated under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcBlock {
    /// The co-signed header.
    pub header: VcBlockHeader,
    /// Round-one collective signature.
    pub cs1: BlsSignature,
    /// Round-one participation bitmap.
    pub b1: Bitmap,
    /// Round-two (commit) collective signature.
    pub cs2: BlsSignature,
    /// Round-two participation bitmap.
    pub b2: Bitmap,
    /// Production time, seconds since the Unix epoch.
    pub timestamp: u64,
    /// Canonical block hash.
    pub block_hash: Hash,
}

impl VcBlock {
    /// Assemble a block, binding the canonical hash to the header.
    pub fn new(
        header: VcBlockHeader,
        cs1: BlsSignature,
        b1: Bitmap,
        cs2: BlsSignature,
        b2: Bitmap,
        timestamp: u64,
    ) -> Self {
        let block_hash = header.compute_hash();
        Self {
            header,
            cs1,
            b1,
            cs2,
            b2,
            timestamp,
            block_hash,
        }
    }
}
