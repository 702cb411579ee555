//! Constants of the bridge backend.

/// Decimal precision of the bridged coin's ERC20 representation on ethnet.
pub const COIN_DECIMALS_ETHNET: u8 = 7;

/// Decimal precision of the native coin on biznet.
pub const COIN_DECIMALS_BIZNET: u8 = 18;

/// Divisor turning polled gas prices (tenth-of-gwei units) into coin units
/// per gas.
pub const GAS_UNIT: f64 = 1e10;

/// Backoff applied after a failed on-chain attempt before the same task may
/// run again.
pub const VM_RETRY_DELAY_SECS: u64 = 60;

/// Persisted VM-error messages are truncated to this many characters.
pub const VM_ERROR_MESSAGE_MAX: usize = 256;

/// Attempts allowed for a state-changing submission before the swap is
/// finalized to its error status.
pub const SUBMIT_MAX_ATTEMPTS: u32 = 3;

/// Accepted relative deviation between the gas reimbursement paid into a
/// deposit box and the estimate computed from current prices.
pub const TX_FEE_TOLERANCE: f64 = 0.1;

/// Decimal places kept when comparing paid and estimated reimbursements, to
/// keep rounding noise out of the tolerance check.
pub const FEE_COMPARE_PRECISION: u8 = 5;

/// Range of the per-process scheduling jitter, in seconds.
pub const JITTER_RANGE_SECS: u64 = 86_400;
