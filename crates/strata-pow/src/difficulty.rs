//! PoW difficulty retargeting.
//!
//! The DS committee recomputes the PoW difficulty once per DS epoch from
//! the participation it observed: how many PoW submissions arrived versus
//! how many nodes are live and how many the network is provisioned for.
//! The function is pure and must be computed identically by every DS node.

use serde::{Deserialize, Serialize};

/// The secular bump applies only within the first ten calibration years.
pub const MAX_INCREASE_DIFFICULTY_YEARS: i64 = 10;

/// Observed participation and calibration inputs for one retarget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PowParams {
    /// Difficulty in force during the finished epoch.
    pub current_difficulty: u8,
    /// Floor the difficulty never drops below.
    pub min_difficulty: u8,
    /// Nodes currently live in the network.
    pub current_nodes: i64,
    /// PoW submissions received this epoch.
    pub pow_submissions: i64,
    /// Provisioned network size.
    pub expected_nodes: i64,
    /// Submission-count swing that must be exceeded before a saturated
    /// network moves the difficulty (9 for the DS pool, 99 for shards).
    pub adjust_threshold: u32,
    /// Current epoch number.
    pub current_epoch: i64,
    /// Epochs per calibration year.
    pub blocks_per_year: i64,
}

/// Compute the next epoch's difficulty.
///
/// While the network is below its provisioned size, the difficulty tracks
/// every swing: more submissions than live nodes means mining capacity is
/// waiting at the door, fewer means nodes are dropping out. Once the
/// network is at or beyond capacity, only a swing larger than
/// `adjust_threshold` submissions moves the difficulty downward, while an
/// overfull network keeps ratcheting upward as long as submissions exceed
/// the live node count.
///
/// Independently of participation, the difficulty gains one level per
/// calibration year for the first [`MAX_INCREASE_DIFFICULTY_YEARS`] years.
///
/// The result is clamped to `[min_difficulty, u8::MAX]`.
pub fn calculate_new_difficulty(params: &PowParams) -> u8 {
    let min_difficulty = params.min_difficulty as i64;
    let threshold = params.adjust_threshold as i64;
    let mut difficulty = params.current_difficulty as i64;
    let submissions_delta = params.pow_submissions - params.current_nodes;

    if params.current_nodes > 0 && submissions_delta != 0 {
        if params.current_nodes < params.expected_nodes {
            if submissions_delta > 0 {
                difficulty += 1;
            } else if difficulty > min_difficulty {
                difficulty -= 1;
            }
        } else if params.current_nodes > params.expected_nodes {
            if submissions_delta > 0 {
                difficulty += 1;
            } else if -submissions_delta > threshold && difficulty > min_difficulty {
                difficulty -= 1;
            }
        } else if submissions_delta > threshold {
            difficulty += 1;
        } else if -submissions_delta > threshold && difficulty > min_difficulty {
            difficulty -= 1;
        }
    }

    if params.blocks_per_year > 0
        && params.current_epoch / params.blocks_per_year <= MAX_INCREASE_DIFFICULTY_YEARS
        && params.current_epoch % params.blocks_per_year == 0
    {
        difficulty += 1;
    }

    difficulty.clamp(min_difficulty, u8::MAX as i64) as u8
}
