//! Ports of the view-change subsystem.
//!
//! Only driven (outbound) ports exist here: persistence, broadcast and
//! time. The inbound surface is `ViewChangeService::process_vc_block`
//! itself, invoked by the network layer with a raw frame.

pub mod outbound;

pub use outbound::{
    FileVcBlockStore, InMemoryVcBlockStore, ShardBroadcaster, SystemTimeSource, TimeSource,
    VcBlockStore,
};
