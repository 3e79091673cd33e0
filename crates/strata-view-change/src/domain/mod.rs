//! Domain model of the view-change pipeline: block entities, the wire
//! codec, the DS committee, co-signature verification and the block-link
//! chain.

pub mod chain;
pub mod codec;
pub mod committee;
pub mod cosig;
pub mod entities;
pub mod errors;

pub use chain::BlockLinkChain;
pub use committee::{CommitteeMember, DsCommittee};
pub use cosig::{cosig_message, num_for_consensus, verify_cosignature};
pub use entities::{Bitmap, VcBlock, VcBlockHeader, ViewChangeState};
pub use errors::{CodecError, LinkChainError, StorageError, VcBlockError, VcBlockResult};
