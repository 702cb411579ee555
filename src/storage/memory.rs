//! Swap storage implementation in-memory.
//!
//! Used by tests and by deployments running without a database; rows live
//! exactly as long as the process.

use super::{
    StorageApi, StorageError,
    api::{CoinPriceInfo, DepositUpdate, GasPriceInfo, Result, WithdrawUpdate},
};
use crate::types::{ProcessStatus, SwapId, SwapRecord, TaskName, VmErrorRecord};
use alloy::primitives::B256;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

/// [`StorageApi`] implementation in-memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    /// Insertion-ordered, mirroring the row order a table scan would yield.
    swaps: RwLock<Vec<SwapRecord>>,
    vm_errors: DashMap<(SwapId, TaskName), VmErrorRecord>,
    gas_price: RwLock<Option<GasPriceInfo>>,
    coin_prices: RwLock<Vec<CoinPriceInfo>>,
}

impl InMemoryStorage {
    /// Applies `apply` to the stored record with the given id, if any.
    ///
    /// A missing id is a silent no-op, matching an `UPDATE` that affects
    /// zero rows.
    async fn update_swap(&self, id: SwapId, apply: impl FnOnce(&mut SwapRecord)) -> Result<()> {
        let mut swaps = self.swaps.write().await;
        if let Some(swap) = swaps.iter_mut().find(|swap| swap.id == id) {
            apply(swap);
        }
        Ok(())
    }
}

#[async_trait]
impl StorageApi for InMemoryStorage {
    async fn create_swap(&self, swap: &SwapRecord) -> Result<()> {
        let mut swaps = self.swaps.write().await;
        if swaps.iter().any(|existing| existing.id == swap.id) {
            return Err(StorageError::SwapAlreadyExists(swap.id));
        }
        swaps.push(swap.clone());
        Ok(())
    }

    async fn get_swap(&self, id: SwapId) -> Result<Option<SwapRecord>> {
        Ok(self.swaps.read().await.iter().find(|swap| swap.id == id).cloned())
    }

    async fn waiting_swaps(&self) -> Result<Vec<SwapRecord>> {
        Ok(self
            .swaps
            .read()
            .await
            .iter()
            .filter(|swap| !swap.process_status.is_terminal())
            .cloned()
            .collect())
    }

    async fn update_deposit(&self, id: SwapId, update: &DepositUpdate) -> Result<()> {
        self.update_swap(id, |swap| {
            swap.trader_address = update.trader_address;
            swap.withdraw_address = update.withdraw_address;
            swap.amount = update.amount;
            swap.swap_fee = update.swap_fee;
            swap.tx_fee = update.tx_fee;
            swap.secret_lock = update.secret_lock;
            swap.deposit_state = update.state;
            swap.deposit_token_id = update.token_id;
            swap.deposit_time_lock = update.time_lock;
            swap.deposit_create_time = update.create_time;
            swap.process_status = update.process_status;
        })
        .await
    }

    async fn update_withdraw(&self, id: SwapId, update: &WithdrawUpdate) -> Result<()> {
        self.update_swap(id, |swap| {
            swap.withdraw_state = update.state;
            swap.withdraw_token_id = update.token_id;
            swap.withdraw_time_lock = update.time_lock;
            swap.withdraw_create_time = update.create_time;
            swap.process_status = update.process_status;
        })
        .await
    }

    async fn update_withdraw_time_diff(&self, id: SwapId, time_diff: i64) -> Result<()> {
        self.update_swap(id, |swap| swap.withdraw_time_diff = time_diff).await
    }

    async fn update_withdraw_tx_hash(&self, id: SwapId, tx_hash: B256) -> Result<()> {
        self.update_swap(id, |swap| swap.withdraw_tx_hash = Some(tx_hash)).await
    }

    async fn update_process_status(&self, id: SwapId, status: ProcessStatus) -> Result<()> {
        self.update_swap(id, |swap| swap.process_status = status).await
    }

    async fn update_process_time(&self, id: SwapId, time: u64) -> Result<()> {
        self.update_swap(id, |swap| swap.process_update_time = time).await
    }

    async fn update_secret_key(&self, id: SwapId, secret_key: B256) -> Result<()> {
        self.update_swap(id, |swap| swap.secret_key = Some(secret_key)).await
    }

    async fn vm_error(&self, id: SwapId, task: TaskName) -> Result<VmErrorRecord> {
        Ok(self
            .vm_errors
            .get(&(id, task))
            .map(|record| record.clone())
            .unwrap_or_else(|| VmErrorRecord::absent(id, task)))
    }

    async fn upsert_vm_error(&self, record: &VmErrorRecord) -> Result<()> {
        self.vm_errors.insert((record.id, record.task), record.clone());
        Ok(())
    }

    async fn clear_vm_error(&self, id: SwapId, task: TaskName) -> Result<()> {
        self.vm_errors.remove(&(id, task));
        Ok(())
    }

    async fn update_gas_price(&self, price: &GasPriceInfo) -> Result<()> {
        *self.gas_price.write().await = Some(price.clone());
        Ok(())
    }

    async fn gas_price(&self) -> Result<Option<GasPriceInfo>> {
        Ok(self.gas_price.read().await.clone())
    }

    async fn update_coin_prices(&self, prices: &[CoinPriceInfo]) -> Result<()> {
        let mut rows = self.coin_prices.write().await;
        for price in prices {
            match rows
                .iter_mut()
                .find(|row| row.source == price.source && row.symbol == price.symbol)
            {
                Some(row) => *row = price.clone(),
                None => rows.push(price.clone()),
            }
        }
        Ok(())
    }

    async fn coin_prices(&self) -> Result<Vec<CoinPriceInfo>> {
        Ok(self.coin_prices.read().await.clone())
    }
}
