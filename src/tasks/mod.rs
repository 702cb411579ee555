//! The per-swap state-transition operations, one implementation per asset
//! class behind the [`BridgeTasks`] trait.
//!
//! Every on-chain read or write inside a task runs under the governor in
//! [`governor`], with its own task name, so failures are isolated per
//! sub-step rather than per swap. Tasks only surface storage errors; chain
//! failures are persisted and retried on later ticks.

mod governor;
pub use governor::{RetryLimit, TaskOutcome, run_vm_task};
mod flow;

mod coin;
pub use coin::CoinBridgeTasks;
mod token;
pub use token::TokenBridgeTasks;

use crate::{
    constants::{FEE_COMPARE_PRECISION, TX_FEE_TOLERANCE},
    storage::StorageError,
    types::{LockBoxInfo, SwapRecord},
};
use alloy::primitives::U256;
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::error;

/// The operations a swap can undergo, dispatched by the scheduler according
/// to the swap's current status.
#[async_trait]
pub trait BridgeTasks: Debug + Send + Sync {
    /// Verifies the user's deposit box is open with acceptable fees.
    async fn check_deposit_is_opened(&self, swap: &SwapRecord) -> Result<(), StorageError>;

    /// Opens the matching withdraw box on the target network.
    async fn open_withdraw(&self, swap: &SwapRecord) -> Result<(), StorageError>;

    /// Confirms the withdraw box is open and captures the clock skew.
    async fn check_withdraw_is_opened(&self, swap: &SwapRecord) -> Result<(), StorageError>;

    /// Closes the withdraw box once the user reveals the secret.
    async fn close_withdraw(&self, swap: &SwapRecord) -> Result<(), StorageError>;

    /// Confirms the withdraw box is closed.
    async fn check_withdraw_is_closed(&self, swap: &SwapRecord) -> Result<(), StorageError>;

    /// Expires an unredeemed withdraw box.
    async fn expire_withdraw(&self, swap: &SwapRecord) -> Result<(), StorageError>;

    /// Closes the deposit box with the secret read back from the target
    /// chain.
    async fn close_deposit(&self, swap: &SwapRecord) -> Result<(), StorageError>;

    /// Confirms the deposit box is closed; terminal success.
    async fn check_deposit_is_closed(&self, swap: &SwapRecord) -> Result<(), StorageError>;

    /// Confirms the withdraw box is expired; terminal.
    async fn check_withdraw_is_expired(&self, swap: &SwapRecord) -> Result<(), StorageError>;
}

/// Unwraps a governed outcome, logging a captured failure under `context`.
/// `None` means "nothing to do this tick".
pub(crate) fn require_done<T>(
    outcome: TaskOutcome<T>,
    swap: &SwapRecord,
    context: &str,
) -> Option<T> {
    match outcome {
        TaskOutcome::Done(value) => Some(value),
        TaskOutcome::Skipped => None,
        TaskOutcome::Failed(error) => {
            error!(
                id = %swap.id,
                status = ?swap.process_status,
                vm_message = %error.message,
                vm_code = %error.code,
                "{context}"
            );
            None
        }
    }
}

/// Whether the gas reimbursement paid into a deposit box covers the current
/// estimate.
///
/// Paying at least the estimate always passes. An underpayment is compared
/// at [`FEE_COMPARE_PRECISION`] decimals and accepted within
/// [`TX_FEE_TOLERANCE`], since the user's front-end priced the fee from
/// slightly older gas and exchange rates.
pub(crate) fn tx_fee_acceptable(paid: U256, calculated: U256, decimals: u8) -> bool {
    if paid >= calculated {
        return true;
    }
    let precision = FEE_COMPARE_PRECISION.min(decimals);
    let scale = U256::from(10).pow(U256::from(decimals - precision));
    let paid = u128::try_from(paid / scale).unwrap_or(u128::MAX) as f64;
    let calculated = u128::try_from(calculated / scale).unwrap_or(u128::MAX) as f64;
    if calculated == 0.0 {
        return false;
    }
    (paid / calculated - 1.0).abs() <= TX_FEE_TOLERANCE
}

/// Whether enough of the deposit box's time lock remains to safely open and
/// resolve a withdraw box against it: at least half the total lock.
pub(crate) fn deposit_time_lock_sufficient(info: &LockBoxInfo, now: u64) -> bool {
    let expire = info.create_time + info.time_lock;
    expire.saturating_sub(now) >= info.time_lock / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LockBoxState, SwapId, TokenId};
    use alloy::primitives::{Address, B256};

    #[test]
    fn tx_fee_tolerance_boundary() {
        let calculated = U256::from(10_000_000u64); // 1.0 at 7 decimals
        // Paying the estimate or more always passes.
        assert!(tx_fee_acceptable(calculated, calculated, 7));
        assert!(tx_fee_acceptable(calculated + U256::from(1), calculated, 7));
        // 10% under is still within tolerance.
        assert!(tx_fee_acceptable(U256::from(9_000_000u64), calculated, 7));
        // 11% under is rejected.
        assert!(!tx_fee_acceptable(U256::from(8_900_000u64), calculated, 7));
        assert!(!tx_fee_acceptable(U256::ZERO, calculated, 7));
    }

    #[test]
    fn tx_fee_comparison_ignores_sub_precision_noise() {
        // Identical at 5 decimals, different in the low digits.
        let calculated = U256::from(10_000_099u64);
        let paid = U256::from(10_000_000u64);
        assert!(tx_fee_acceptable(paid, calculated, 7));
    }

    #[test]
    fn time_lock_half_life_rule() {
        let info = LockBoxInfo {
            id: SwapId::ZERO,
            state: LockBoxState::Open,
            token_id: TokenId::ZERO,
            time_lock: 3600,
            amount: U256::ZERO,
            swap_fee: U256::ZERO,
            tx_fee: U256::ZERO,
            trader_address: Address::ZERO,
            withdraw_address: Address::ZERO,
            secret_lock: B256::ZERO,
            create_time: 10_000,
        };
        // Exactly half the lock left.
        assert!(deposit_time_lock_sufficient(&info, 10_000 + 1800));
        assert!(deposit_time_lock_sufficient(&info, 10_000));
        // Less than half left.
        assert!(!deposit_time_lock_sufficient(&info, 10_000 + 1801));
        // Already expired.
        assert!(!deposit_time_lock_sufficient(&info, 10_000 + 7200));
    }
}
