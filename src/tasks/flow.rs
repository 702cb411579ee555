//! Task flows shared verbatim by both asset classes.
//!
//! Everything from "the withdraw box exists" onward is independent of the
//! asset class: decimals and token ids only matter while validating the
//! deposit and opening the withdraw box, which each variant implements
//! itself.

use super::{RetryLimit, require_done, run_vm_task};
use crate::{
    constants::SUBMIT_MAX_ATTEMPTS,
    manager::BridgeManager,
    storage::{StorageError, SwapStorage, WithdrawUpdate},
    time::unix_time,
    types::{LockBoxState, ProcessStatus, SwapRecord, TaskName},
};
use alloy::primitives::B256;
use tracing::warn;

/// Confirms the withdraw box opened and captures the clock-skew correction
/// between the target chain and this process.
pub(crate) async fn check_withdraw_is_opened(
    storage: &SwapStorage,
    manager: &dyn BridgeManager,
    swap: &SwapRecord,
) -> Result<(), StorageError> {
    let target = manager.target_bridge_with_signer(swap.direction);
    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::CheckWithdrawIsOpened,
        None,
        target.check_withdraw(swap.id),
    )
    .await?;
    let Some(withdraw_box) = require_done(outcome, swap, "failed to check withdraw lock box opening")
    else {
        return Ok(());
    };

    let time_diff = withdraw_box.create_time as i64 - unix_time() as i64;
    match withdraw_box.state {
        LockBoxState::Open | LockBoxState::Closed => {
            storage
                .update_withdraw(
                    swap.id,
                    &WithdrawUpdate::from_box(
                        &withdraw_box,
                        ProcessStatus::ConfirmedOpeningWithdraw,
                    ),
                )
                .await?;
            storage.update_withdraw_time_diff(swap.id, time_diff).await?;
        }
        LockBoxState::Expired => {
            storage
                .update_withdraw(
                    swap.id,
                    &WithdrawUpdate::from_box(&withdraw_box, ProcessStatus::ErrorOpeningWithdraw),
                )
                .await?;
            storage.update_withdraw_time_diff(swap.id, time_diff).await?;
        }
        LockBoxState::Invalid => {}
    }
    Ok(())
}

/// Closes the withdraw box with the user's secret, switching to the expiry
/// path when the box's time lock has already elapsed.
pub(crate) async fn close_withdraw(
    storage: &SwapStorage,
    manager: &dyn BridgeManager,
    swap: &SwapRecord,
) -> Result<(), StorageError> {
    let target = manager.target_bridge_with_signer(swap.direction);

    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::CheckWithdrawIsOpened,
        None,
        target.check_withdraw(swap.id),
    )
    .await?;
    let Some(withdraw_box) = require_done(outcome, swap, "failed to check withdraw lock box opening")
    else {
        return Ok(());
    };

    match withdraw_box.state {
        LockBoxState::Closed => {
            // The user closed it themselves.
            storage
                .update_withdraw(
                    swap.id,
                    &WithdrawUpdate::from_box(
                        &withdraw_box,
                        ProcessStatus::ConfirmedClosingWithdraw,
                    ),
                )
                .await?;
            return Ok(());
        }
        LockBoxState::Open => {
            if withdraw_box.expire_time(swap.withdraw_time_diff) < unix_time() as i64 {
                storage
                    .update_process_status(swap.id, ProcessStatus::StartedExpireWithdraw)
                    .await?;
                return Ok(());
            }
        }
        LockBoxState::Expired | LockBoxState::Invalid => {}
    }

    // The secret crosses over through the API; until it does there is
    // nothing to submit.
    let Some(secret_key) = swap.secret_key else {
        return Ok(());
    };

    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::CloseWithdraw,
        Some(RetryLimit {
            max_attempts: SUBMIT_MAX_ATTEMPTS,
            error_status: ProcessStatus::ErrorClosingWithdraw,
        }),
        async {
            match target.close_withdraw(swap.id, secret_key).await {
                Ok(tx_hash) => Ok(tx_hash),
                Err(error) => {
                    reset_nonce(manager, swap, Side::Target).await;
                    Err(error)
                }
            }
        },
    )
    .await?;
    let Some(tx_hash) = require_done(outcome, swap, "failed to close withdraw lock box") else {
        return Ok(());
    };

    storage.update_withdraw_tx_hash(swap.id, tx_hash).await?;
    storage.update_process_status(swap.id, ProcessStatus::FinishedClosingWithdraw).await
}

/// Waits for the withdraw box to be closed, falling back to the expiry path
/// when its time lock runs out first.
pub(crate) async fn check_withdraw_is_closed(
    storage: &SwapStorage,
    manager: &dyn BridgeManager,
    swap: &SwapRecord,
) -> Result<(), StorageError> {
    let target = manager.target_bridge_with_signer(swap.direction);
    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::CheckWithdrawIsClosed,
        None,
        target.check_withdraw(swap.id),
    )
    .await?;
    let Some(withdraw_box) = require_done(outcome, swap, "failed to check withdraw lock box closing")
    else {
        return Ok(());
    };

    match withdraw_box.state {
        LockBoxState::Closed => {
            storage
                .update_withdraw(
                    swap.id,
                    &WithdrawUpdate::from_box(
                        &withdraw_box,
                        ProcessStatus::ConfirmedClosingWithdraw,
                    ),
                )
                .await?;
        }
        LockBoxState::Open => {
            if withdraw_box.expire_time(swap.withdraw_time_diff) < unix_time() as i64 {
                storage
                    .update_process_status(swap.id, ProcessStatus::StartedExpireWithdraw)
                    .await?;
            }
        }
        LockBoxState::Expired => {
            storage
                .update_withdraw(
                    swap.id,
                    &WithdrawUpdate::from_box(&withdraw_box, ProcessStatus::ErrorClosingWithdraw),
                )
                .await?;
        }
        LockBoxState::Invalid => {}
    }
    Ok(())
}

/// Expires an unredeemed withdraw box, unless the user closed it in the
/// meantime.
pub(crate) async fn expire_withdraw(
    storage: &SwapStorage,
    manager: &dyn BridgeManager,
    swap: &SwapRecord,
) -> Result<(), StorageError> {
    let target = manager.target_bridge_with_signer(swap.direction);

    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::CheckWithdrawExpire,
        None,
        target.check_withdraw(swap.id),
    )
    .await?;
    let Some(withdraw_box) =
        require_done(outcome, swap, "failed to check withdraw lock box for expire")
    else {
        return Ok(());
    };

    match withdraw_box.state {
        LockBoxState::Closed => {
            storage
                .update_process_status(swap.id, ProcessStatus::ConfirmedClosingWithdraw)
                .await
        }
        LockBoxState::Open => {
            let outcome = run_vm_task(
                storage,
                swap.id,
                TaskName::ExpireWithdraw,
                Some(RetryLimit {
                    max_attempts: SUBMIT_MAX_ATTEMPTS,
                    error_status: ProcessStatus::ErrorExpireWithdraw,
                }),
                async {
                    match target.expire_withdraw(swap.id).await {
                        Ok(tx_hash) => Ok(tx_hash),
                        Err(error) => {
                            reset_nonce(manager, swap, Side::Target).await;
                            Err(error)
                        }
                    }
                },
            )
            .await?;
            if require_done(outcome, swap, "failed to expire withdraw lock box").is_none() {
                return Ok(());
            }
            storage.update_process_status(swap.id, ProcessStatus::FinishedExpireWithdraw).await
        }
        LockBoxState::Expired | LockBoxState::Invalid => Ok(()),
    }
}

/// Reads the revealed secret back from the target bridge and closes the
/// deposit box with it. This is how the preimage crosses from the target
/// chain to the source chain.
pub(crate) async fn close_deposit(
    storage: &SwapStorage,
    manager: &dyn BridgeManager,
    swap: &SwapRecord,
) -> Result<(), StorageError> {
    let target = manager.target_bridge_with_signer(swap.direction);

    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::GetSecretKey,
        None,
        target.check_secret_key_withdraw(swap.id),
    )
    .await?;
    let Some(secret_key) = require_done(outcome, swap, "failed to get withdraw secret key") else {
        return Ok(());
    };
    if secret_key == B256::ZERO {
        return Ok(());
    }

    let source = manager.source_bridge_with_signer(swap.direction);
    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::CloseDeposit,
        Some(RetryLimit {
            max_attempts: SUBMIT_MAX_ATTEMPTS,
            error_status: ProcessStatus::ErrorClosingDeposit,
        }),
        async {
            match source.close_deposit(swap.id, secret_key).await {
                Ok(tx_hash) => Ok(tx_hash),
                Err(error) => {
                    reset_nonce(manager, swap, Side::Source).await;
                    Err(error)
                }
            }
        },
    )
    .await?;
    if require_done(outcome, swap, "failed to close deposit lock box").is_none() {
        return Ok(());
    }

    storage.update_process_status(swap.id, ProcessStatus::FinishedClosingDeposit).await
}

/// Waits for the deposit box to be closed; terminal success.
pub(crate) async fn check_deposit_is_closed(
    storage: &SwapStorage,
    manager: &dyn BridgeManager,
    swap: &SwapRecord,
) -> Result<(), StorageError> {
    let source = manager.source_bridge_with_signer(swap.direction);
    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::CheckDepositIsClosed,
        None,
        source.check_deposit(swap.id),
    )
    .await?;
    let Some(deposit_box) = require_done(outcome, swap, "failed to check deposit lock box closing")
    else {
        return Ok(());
    };

    if deposit_box.state == LockBoxState::Closed {
        storage.update_process_status(swap.id, ProcessStatus::ConfirmedClosingDeposit).await?;
    }
    Ok(())
}

/// Waits for the withdraw box to be expired; terminal, the asset stays with
/// the operator for manual reconciliation.
pub(crate) async fn check_withdraw_is_expired(
    storage: &SwapStorage,
    manager: &dyn BridgeManager,
    swap: &SwapRecord,
) -> Result<(), StorageError> {
    let target = manager.target_bridge_with_signer(swap.direction);
    let outcome = run_vm_task(
        storage,
        swap.id,
        TaskName::CheckWithdrawIsExpired,
        None,
        target.check_withdraw(swap.id),
    )
    .await?;
    let Some(withdraw_box) =
        require_done(outcome, swap, "failed to check withdraw lock box expiring")
    else {
        return Ok(());
    };

    if withdraw_box.state == LockBoxState::Expired {
        storage.update_process_status(swap.id, ProcessStatus::ConfirmedExpireWithdraw).await?;
    }
    Ok(())
}

pub(crate) enum Side {
    Source,
    Target,
}

/// Resynchronizes the relevant network's nonce after a failed submission.
/// Best effort: a failure here only delays recovery until the next attempt.
pub(crate) async fn reset_nonce(manager: &dyn BridgeManager, swap: &SwapRecord, side: Side) {
    let result = match side {
        Side::Source => manager.reset_source_transaction_count(swap.direction).await,
        Side::Target => manager.reset_target_transaction_count(swap.direction).await,
    };
    if let Err(error) = result {
        warn!(
            id = %swap.id,
            vm_message = %error.message,
            "failed to reset the manager transaction count"
        );
    }
}
