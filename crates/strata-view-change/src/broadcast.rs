//! Fan-out glue for tree-based block forwarding.

use tracing::warn;

/// Effective receiver cluster size for forwarded blocks.
///
/// The cluster must be strictly larger than the DS election seat count, or
/// a forwarded block could land only on nodes about to leave the shard.
/// Misconfiguration is corrected here with a warning rather than rejected.
pub fn effective_cluster_size(requested: u32, num_ds_election: u32) -> u32 {
    if requested <= num_ds_election {
        warn!(
            requested,
            num_ds_election,
            "forwarded-block cluster size raised above the DS election count; \
             correct the configuration"
        );
        num_ds_election + 1
    } else {
        requested
    }
}
