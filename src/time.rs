//! Wall-clock helpers shared by the schedulers and the task governor.

use chrono::Utc;

/// Unix timestamp of 2020-01-01T00:00:00Z, the base of the swap id
/// timestamp prefix.
pub const SWAP_ID_EPOCH: u64 = 1_577_836_800;

/// Current unix timestamp in seconds.
pub fn unix_time() -> u64 {
    Utc::now().timestamp() as u64
}
