use super::{
    BridgeTasks, RetryLimit, deposit_time_lock_sufficient, flow, require_done, run_vm_task,
    tx_fee_acceptable,
};
use crate::{
    amount::rebase,
    constants::{COIN_DECIMALS_BIZNET, COIN_DECIMALS_ETHNET, SUBMIT_MAX_ATTEMPTS},
    contracts::OpenWithdrawRequest,
    manager::{BridgeManager, CoinBridgeManager},
    storage::{DepositUpdate, StorageError, SwapStorage},
    time::unix_time,
    types::{BridgeDirection, LockBoxState, ProcessStatus, SwapRecord, TaskName, TokenId},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// Tasks of the coin bridge.
#[derive(Debug)]
pub struct CoinBridgeTasks {
    storage: SwapStorage,
    manager: Arc<CoinBridgeManager>,
    /// Symbol under which the bridged coin's price rows are stored.
    asset_symbol: String,
}

impl CoinBridgeTasks {
    /// Creates the task set.
    pub fn new(
        storage: SwapStorage,
        manager: Arc<CoinBridgeManager>,
        asset_symbol: impl Into<String>,
    ) -> Self {
        Self { storage, manager, asset_symbol: asset_symbol.into() }
    }

    /// Decimal precision of the deposit-side representation.
    fn source_decimals(direction: BridgeDirection) -> u8 {
        match direction {
            BridgeDirection::EthnetToBiznet => COIN_DECIMALS_ETHNET,
            BridgeDirection::BiznetToEthnet => COIN_DECIMALS_BIZNET,
        }
    }

    /// Decimal precision of the withdraw-side representation.
    fn target_decimals(direction: BridgeDirection) -> u8 {
        Self::source_decimals(direction.inverse())
    }
}

#[async_trait]
impl BridgeTasks for CoinBridgeTasks {
    async fn check_deposit_is_opened(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        let Some(gas_price) = self.storage.standard_gas_price().await? else {
            error!(
                id = %swap.id,
                status = ?swap.process_status,
                "task on hold: the gas price is unknown"
            );
            return Ok(());
        };
        let Some(eth_asset_rate) = self.storage.eth_asset_rate(&self.asset_symbol).await? else {
            error!(
                id = %swap.id,
                status = ?swap.process_status,
                "task on hold: the coin exchange rate is unknown"
            );
            return Ok(());
        };

        let source = self.manager.source_bridge_with_signer(swap.direction);
        let outcome = run_vm_task(
            &self.storage,
            swap.id,
            TaskName::CheckDepositIsOpened,
            None,
            source.check_deposit(swap.id),
        )
        .await?;
        let Some(deposit_box) =
            require_done(outcome, swap, "failed to check deposit lock box opening")
        else {
            return Ok(());
        };

        let decimals = Self::source_decimals(swap.direction);
        match deposit_box.state {
            LockBoxState::Open => {
                let swap_fee = self.manager.swap_fee(deposit_box.amount, decimals);
                let tx_fee = self.manager.estimated_tx_fee(
                    gas_price,
                    eth_asset_rate,
                    swap.direction,
                    decimals,
                );
                if tx_fee.value().is_zero() {
                    error!(
                        id = %swap.id,
                        status = ?swap.process_status,
                        "the estimated transaction fee of the network does not exist"
                    );
                    return Ok(());
                }

                if deposit_box.swap_fee < swap_fee.value() {
                    error!(id = %swap.id, status = ?swap.process_status, "the swap fee is inappropriate");
                    self.storage
                        .update_process_status(swap.id, ProcessStatus::ErrorOpeningDeposit)
                        .await?;
                    return Ok(());
                }

                if !tx_fee_acceptable(deposit_box.tx_fee, tx_fee.value(), decimals) {
                    error!(
                        id = %swap.id,
                        status = ?swap.process_status,
                        "the transaction fee is inappropriate"
                    );
                    self.storage
                        .update_process_status(swap.id, ProcessStatus::ErrorOpeningDeposit)
                        .await?;
                    return Ok(());
                }

                let status = if deposit_time_lock_sufficient(&deposit_box, unix_time()) {
                    ProcessStatus::ConfirmedOpeningDeposit
                } else {
                    ProcessStatus::ErrorOpeningDeposit
                };
                self.storage
                    .update_deposit(swap.id, &DepositUpdate::from_box(&deposit_box, status))
                    .await?;
            }
            LockBoxState::Closed | LockBoxState::Expired => {
                // A box resolved before the bridge acted on it cannot be
                // processed through this flow.
                self.storage
                    .update_deposit(
                        swap.id,
                        &DepositUpdate::from_box(&deposit_box, ProcessStatus::ErrorOpeningDeposit),
                    )
                    .await?;
            }
            LockBoxState::Invalid => {}
        }
        Ok(())
    }

    async fn open_withdraw(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        // Re-read the deposit box and compare it to the stored record; a
        // mismatch means the record no longer describes what is on-chain.
        {
            let source = self.manager.source_bridge_with_signer(swap.direction);
            let outcome = run_vm_task(
                &self.storage,
                swap.id,
                TaskName::CheckDepositIsOpened,
                None,
                source.check_deposit(swap.id),
            )
            .await?;
            let Some(deposit_box) =
                require_done(outcome, swap, "failed to check deposit lock box opening")
            else {
                return Ok(());
            };

            if deposit_box.state != LockBoxState::Open {
                error!(
                    id = %swap.id,
                    status = ?swap.process_status,
                    "failed to open withdraw lock box: the deposit box is not open"
                );
                self.storage
                    .update_process_status(swap.id, ProcessStatus::ErrorOpeningWithdraw)
                    .await?;
                return Ok(());
            }

            if deposit_box.trader_address != swap.trader_address
                || deposit_box.withdraw_address != swap.withdraw_address
                || deposit_box.secret_lock != swap.secret_lock
                || deposit_box.time_lock != swap.deposit_time_lock
                || deposit_box.create_time != swap.deposit_create_time
            {
                error!(
                    id = %swap.id,
                    status = ?swap.process_status,
                    "failed to open withdraw lock box: the deposit box does not match the record"
                );
                self.storage
                    .update_process_status(swap.id, ProcessStatus::ErrorOpeningWithdraw)
                    .await?;
                return Ok(());
            }
        }

        let target = self.manager.target_bridge_with_signer(swap.direction);
        let outcome = run_vm_task(
            &self.storage,
            swap.id,
            TaskName::CheckWithdrawIsNone,
            None,
            target.check_withdraw(swap.id),
        )
        .await?;
        let Some(withdraw_box) = require_done(outcome, swap, "failed to check withdraw lock box")
        else {
            return Ok(());
        };

        let source_decimals = Self::source_decimals(swap.direction);
        let target_decimals = Self::target_decimals(swap.direction);
        let target_amount = rebase(swap.amount, source_decimals, target_decimals);
        let target_swap_fee = rebase(swap.swap_fee, source_decimals, target_decimals);
        let target_tx_fee = rebase(swap.tx_fee, source_decimals, target_decimals);

        if withdraw_box.state == LockBoxState::Invalid {
            let request = OpenWithdrawRequest {
                id: swap.id,
                token_id: TokenId::ZERO,
                amount: target_amount,
                swap_fee: target_swap_fee,
                tx_fee: target_tx_fee,
                trader_address: swap.trader_address,
                withdraw_address: swap.withdraw_address,
                secret_lock: swap.secret_lock,
            };
            let outcome = run_vm_task(
                &self.storage,
                swap.id,
                TaskName::OpenWithdraw,
                Some(RetryLimit {
                    max_attempts: SUBMIT_MAX_ATTEMPTS,
                    error_status: ProcessStatus::ErrorOpeningWithdraw,
                }),
                async {
                    match target.open_withdraw(&request).await {
                        Ok(tx_hash) => Ok(tx_hash),
                        Err(error) => {
                            flow::reset_nonce(self.manager.as_ref(), swap, flow::Side::Target)
                                .await;
                            Err(error)
                        }
                    }
                },
            )
            .await?;
            if require_done(outcome, swap, "failed to open withdraw lock box").is_none() {
                return Ok(());
            }
            self.storage
                .update_process_status(swap.id, ProcessStatus::FinishedOpeningWithdraw)
                .await?;
        } else if withdraw_box.amount == target_amount
            && withdraw_box.trader_address == swap.trader_address
            && withdraw_box.withdraw_address == swap.withdraw_address
            && withdraw_box.secret_lock == swap.secret_lock
        {
            // Already submitted on an earlier attempt; nothing to redo.
            self.storage
                .update_process_status(swap.id, ProcessStatus::FinishedOpeningWithdraw)
                .await?;
        } else {
            error!(
                id = %swap.id,
                status = ?swap.process_status,
                "failed to open withdraw lock box: a foreign box occupies the id"
            );
            self.storage
                .update_process_status(swap.id, ProcessStatus::ErrorOpeningWithdraw)
                .await?;
        }
        Ok(())
    }

    async fn check_withdraw_is_opened(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        flow::check_withdraw_is_opened(&self.storage, self.manager.as_ref(), swap).await
    }

    async fn close_withdraw(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        flow::close_withdraw(&self.storage, self.manager.as_ref(), swap).await
    }

    async fn check_withdraw_is_closed(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        flow::check_withdraw_is_closed(&self.storage, self.manager.as_ref(), swap).await
    }

    async fn expire_withdraw(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        flow::expire_withdraw(&self.storage, self.manager.as_ref(), swap).await
    }

    async fn close_deposit(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        flow::close_deposit(&self.storage, self.manager.as_ref(), swap).await
    }

    async fn check_deposit_is_closed(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        flow::check_deposit_is_closed(&self.storage, self.manager.as_ref(), swap).await
    }

    async fn check_withdraw_is_expired(&self, swap: &SwapRecord) -> Result<(), StorageError> {
        flow::check_withdraw_is_expired(&self.storage, self.manager.as_ref(), swap).await
    }
}
