//! View-change subsystem configuration.

use serde::{Deserialize, Serialize};

/// Accepted view-change block version tag.
pub const VC_BLOCK_VERSION: u32 = 1;

/// Runtime configuration for the view-change pipeline.
///
/// Timing fields are in seconds; their sum forms the timestamp tolerance
/// window (a VC block may legitimately be produced any time between the
/// consensus object timing out and the last view-change round finishing).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewChangeConfig {
    /// Block version this node accepts.
    pub block_version: u32,
    /// Seconds before a consensus object is considered timed out.
    pub consensus_object_timeout: u64,
    /// Seconds allotted to one view-change round.
    pub viewchange_time: u64,
    /// Seconds allotted to the pre-change liveness check.
    pub viewchange_precheck_time: u64,
    /// Extra slack added to the tolerance window.
    pub viewchange_extra_time: u64,
    /// Committee membership is pinned by policy; VC blocks never mutate it.
    pub guard_mode: bool,
    /// Lookup nodes archive and serve blocks but never fan out.
    pub lookup_node_mode: bool,
    /// Enables tree-based re-broadcast to shard peers.
    pub broadcast_treebased_cluster_mode: bool,
    /// Requested receiver cluster size for forwarded blocks.
    pub forwarded_block_receivers_per_shard: u32,
    /// Number of DS seats contested per election.
    pub num_ds_election: u32,
    /// Child cluster count for the tree-based broadcast.
    pub treebased_child_clusters: u32,
}

impl Default for ViewChangeConfig {
    fn default() -> Self {
        Self {
            block_version: VC_BLOCK_VERSION,
            consensus_object_timeout: 10,
            viewchange_time: 300,
            viewchange_precheck_time: 60,
            viewchange_extra_time: 120,
            guard_mode: false,
            lookup_node_mode: false,
            broadcast_treebased_cluster_mode: true,
            forwarded_block_receivers_per_shard: 3,
            num_ds_election: 2,
            treebased_child_clusters: 3,
        }
    }
}

impl ViewChangeConfig {
    /// Width of the accepted timestamp window around local time.
    pub fn timestamp_tolerance(&self) -> u64 {
        self.consensus_object_timeout
            + self.viewchange_time
            + self.viewchange_precheck_time
            + self.viewchange_extra_time
    }
}
