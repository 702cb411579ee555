//! Swap storage.

mod api;
pub use api::{CoinPriceInfo, DepositUpdate, GasPriceInfo, StorageApi, WithdrawUpdate};
mod error;
pub use error::StorageError;
mod memory;
pub use memory::InMemoryStorage;
mod pg;
pub use pg::PgStorage;

use crate::{
    constants::{VM_ERROR_MESSAGE_MAX, VM_RETRY_DELAY_SECS},
    error::VmError,
    time::unix_time,
    types::{ProcessStatus, SwapId, SwapRecord, TaskName, VmErrorRecord},
};
use alloy::primitives::B256;
use sqlx::PgPool;
use std::sync::Arc;

/// Swap storage interface handed to the tasks and schedulers.
#[derive(Debug, Clone)]
pub struct SwapStorage {
    inner: Arc<dyn StorageApi>,
}

impl SwapStorage {
    /// Creates a [`SwapStorage`] with an in-memory backend.
    pub fn in_memory() -> Self {
        Self { inner: Arc::new(InMemoryStorage::default()) }
    }

    /// Creates a [`SwapStorage`] backed by PostgreSQL, bootstrapping the
    /// schema.
    pub async fn pg(pool: PgPool) -> api::Result<Self> {
        let storage = PgStorage::new(pool);
        storage.create_tables().await?;
        Ok(Self { inner: Arc::new(storage) })
    }

    /// Inserts a fresh swap record.
    pub async fn create_swap(&self, swap: &SwapRecord) -> api::Result<()> {
        self.inner.create_swap(swap).await
    }

    /// Reads one swap; `None` when the id is unknown.
    pub async fn get_swap(&self, id: SwapId) -> api::Result<Option<SwapRecord>> {
        self.inner.get_swap(id).await
    }

    /// All swaps not yet in a terminal state, in insertion order.
    pub async fn waiting_swaps(&self) -> api::Result<Vec<SwapRecord>> {
        self.inner.waiting_swaps().await
    }

    /// Writes the deposit mirror fields and the status in one step.
    pub async fn update_deposit(&self, id: SwapId, update: &DepositUpdate) -> api::Result<()> {
        self.inner.update_deposit(id, update).await
    }

    /// Writes the withdraw mirror fields and the status in one step.
    pub async fn update_withdraw(&self, id: SwapId, update: &WithdrawUpdate) -> api::Result<()> {
        self.inner.update_withdraw(id, update).await
    }

    /// Records the clock-skew correction for the withdraw box.
    pub async fn update_withdraw_time_diff(&self, id: SwapId, time_diff: i64) -> api::Result<()> {
        self.inner.update_withdraw_time_diff(id, time_diff).await
    }

    /// Records the hash of the withdraw-close transaction.
    pub async fn update_withdraw_tx_hash(&self, id: SwapId, tx_hash: B256) -> api::Result<()> {
        self.inner.update_withdraw_tx_hash(id, tx_hash).await
    }

    /// Moves a swap to a new status.
    pub async fn update_process_status(
        &self,
        id: SwapId,
        status: ProcessStatus,
    ) -> api::Result<()> {
        self.inner.update_process_status(id, status).await
    }

    /// Refreshes the interval-gating timestamp.
    pub async fn update_process_time(&self, id: SwapId, time: u64) -> api::Result<()> {
        self.inner.update_process_time(id, time).await
    }

    /// Stores the secret revealed by the user.
    pub async fn update_secret_key(&self, id: SwapId, secret_key: B256) -> api::Result<()> {
        self.inner.update_secret_key(id, secret_key).await
    }

    /// Reads the retry bookkeeping for `(id, task)`.
    pub async fn vm_error(&self, id: SwapId, task: TaskName) -> api::Result<VmErrorRecord> {
        self.inner.vm_error(id, task).await
    }

    /// Records a failed attempt: message truncated, next retry allowed
    /// after the fixed backoff.
    pub async fn update_vm_error(
        &self,
        id: SwapId,
        task: TaskName,
        error: &VmError,
        is_retry: bool,
        num_retry: u32,
    ) -> api::Result<()> {
        let record = VmErrorRecord {
            id,
            task,
            is_error: true,
            message: error.message.chars().take(VM_ERROR_MESSAGE_MAX).collect(),
            code: error.code.clone(),
            is_retry,
            next_try_time: unix_time() + VM_RETRY_DELAY_SECS,
            num_retry,
        };
        self.inner.upsert_vm_error(&record).await
    }

    /// Inserts or replaces the retry bookkeeping row as-is.
    pub async fn upsert_vm_error(&self, record: &VmErrorRecord) -> api::Result<()> {
        self.inner.upsert_vm_error(record).await
    }

    /// Removes the retry bookkeeping for `(id, task)`.
    pub async fn clear_vm_error(&self, id: SwapId, task: TaskName) -> api::Result<()> {
        self.inner.clear_vm_error(id, task).await
    }

    /// Stores the latest gas prices.
    pub async fn update_gas_price(&self, price: &GasPriceInfo) -> api::Result<()> {
        self.inner.update_gas_price(price).await
    }

    /// Reads the latest gas prices.
    pub async fn gas_price(&self) -> api::Result<Option<GasPriceInfo>> {
        self.inner.gas_price().await
    }

    /// Stores a batch of coin prices.
    pub async fn update_coin_prices(&self, prices: &[CoinPriceInfo]) -> api::Result<()> {
        self.inner.update_coin_prices(prices).await
    }

    /// Reads the latest coin prices.
    pub async fn coin_prices(&self) -> api::Result<Vec<CoinPriceInfo>> {
        self.inner.coin_prices().await
    }

    /// The average gas price, if one has been polled.
    pub async fn standard_gas_price(&self) -> api::Result<Option<f64>> {
        Ok(self.gas_price().await?.map(|price| price.average))
    }

    /// ETH price divided by the bridged asset's price; `None` unless both
    /// are known and nonzero.
    pub async fn eth_asset_rate(&self, asset_symbol: &str) -> api::Result<Option<f64>> {
        let mut eth = None;
        let mut asset = None;
        for price in self.coin_prices().await? {
            if price.symbol == "ETH" {
                eth = Some(price.krw);
            }
            if price.symbol == asset_symbol {
                asset = Some(price.krw);
            }
        }
        Ok(match (eth, asset) {
            (Some(eth), Some(asset)) if eth != 0.0 && asset != 0.0 => Some(eth / asset),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BridgeDirection, BridgeKind};
    use alloy::primitives::{Address, U256};

    fn sample_swap() -> SwapRecord {
        SwapRecord::new(
            SwapId::generate(),
            BridgeKind::Coin,
            BridgeDirection::EthnetToBiznet,
            Address::repeat_byte(1),
            Address::repeat_byte(1),
            U256::from(10_000_000u64),
            U256::from(300_000u64),
            U256::from(100_000u64),
            B256::repeat_byte(7),
            None,
        )
    }

    #[tokio::test]
    async fn get_swap_of_unknown_id_is_none() {
        let storage = SwapStorage::in_memory();
        assert!(storage.get_swap(SwapId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_swap_is_rejected() {
        let storage = SwapStorage::in_memory();
        let swap = sample_swap();
        storage.create_swap(&swap).await.unwrap();
        assert!(matches!(
            storage.create_swap(&swap).await,
            Err(StorageError::SwapAlreadyExists(id)) if id == swap.id
        ));
    }

    #[tokio::test]
    async fn waiting_swaps_skips_terminal_states() {
        let storage = SwapStorage::in_memory();
        let first = sample_swap();
        let second = sample_swap();
        storage.create_swap(&first).await.unwrap();
        storage.create_swap(&second).await.unwrap();
        storage
            .update_process_status(first.id, ProcessStatus::ConfirmedClosingDeposit)
            .await
            .unwrap();

        let waiting = storage.waiting_swaps().await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, second.id);
    }

    #[tokio::test]
    async fn vm_error_lifecycle() {
        let storage = SwapStorage::in_memory();
        let id = SwapId::generate();
        let task = TaskName::OpenWithdraw;

        let absent = storage.vm_error(id, task).await.unwrap();
        assert!(!absent.is_error);
        assert!(absent.is_retry);
        assert_eq!(absent.num_retry, 0);

        let error = VmError { message: "x".repeat(400), code: "1200".into() };
        storage.update_vm_error(id, task, &error, true, 1).await.unwrap();
        let stored = storage.vm_error(id, task).await.unwrap();
        assert!(stored.is_error);
        assert_eq!(stored.message.chars().count(), VM_ERROR_MESSAGE_MAX);
        assert_eq!(stored.code, "1200");
        assert_eq!(stored.num_retry, 1);
        assert!(stored.next_try_time >= unix_time() + VM_RETRY_DELAY_SECS - 1);

        storage.clear_vm_error(id, task).await.unwrap();
        assert!(!storage.vm_error(id, task).await.unwrap().is_error);
    }

    #[tokio::test]
    async fn eth_asset_rate_requires_both_prices() {
        let storage = SwapStorage::in_memory();
        assert_eq!(storage.eth_asset_rate("COIN").await.unwrap(), None);

        storage
            .update_coin_prices(&[CoinPriceInfo {
                source: "gecko".into(),
                symbol: "ETH".into(),
                usd: 2000.0,
                krw: 2_600_000.0,
                last_updated_at: unix_time(),
            }])
            .await
            .unwrap();
        assert_eq!(storage.eth_asset_rate("COIN").await.unwrap(), None);

        storage
            .update_coin_prices(&[CoinPriceInfo {
                source: "gecko".into(),
                symbol: "COIN".into(),
                usd: 0.1,
                krw: 130.0,
                last_updated_at: unix_time(),
            }])
            .await
            .unwrap();
        assert_eq!(storage.eth_asset_rate("COIN").await.unwrap(), Some(20_000.0));
    }
}
