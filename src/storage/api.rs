//! Swap storage api.

use super::StorageError;
use crate::types::{
    LockBoxInfo, LockBoxState, ProcessStatus, SwapId, SwapRecord, TaskName, TokenId, VmErrorRecord,
};
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Type alias for `Result<T, StorageError>`.
pub type Result<T> = core::result::Result<T, StorageError>;

/// Mirror fields written after a deposit box read, together with the status
/// transition the read justified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositUpdate {
    /// Depositor address as reported on-chain.
    pub trader_address: Address,
    /// Recipient address as reported on-chain.
    pub withdraw_address: Address,
    /// Locked amount.
    pub amount: U256,
    /// Swap fee paid into the box.
    pub swap_fee: U256,
    /// Gas reimbursement paid into the box.
    pub tx_fee: U256,
    /// Hash lock.
    pub secret_lock: B256,
    /// Observed box state.
    pub state: LockBoxState,
    /// Token id, zero on the coin bridge.
    pub token_id: TokenId,
    /// Lock duration in seconds.
    pub time_lock: u64,
    /// Unix time the box was opened.
    pub create_time: u64,
    /// Status the swap moves to.
    pub process_status: ProcessStatus,
}

impl DepositUpdate {
    /// Builds the update from an on-chain read.
    pub fn from_box(info: &LockBoxInfo, process_status: ProcessStatus) -> Self {
        Self {
            trader_address: info.trader_address,
            withdraw_address: info.withdraw_address,
            amount: info.amount,
            swap_fee: info.swap_fee,
            tx_fee: info.tx_fee,
            secret_lock: info.secret_lock,
            state: info.state,
            token_id: info.token_id,
            time_lock: info.time_lock,
            create_time: info.create_time,
            process_status,
        }
    }
}

/// Mirror fields written after a withdraw box read, together with the status
/// transition the read justified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawUpdate {
    /// Observed box state.
    pub state: LockBoxState,
    /// Token id, zero on the coin bridge.
    pub token_id: TokenId,
    /// Lock duration in seconds.
    pub time_lock: u64,
    /// Unix time the box was opened.
    pub create_time: u64,
    /// Status the swap moves to.
    pub process_status: ProcessStatus,
}

impl WithdrawUpdate {
    /// Builds the update from an on-chain read.
    pub fn from_box(info: &LockBoxInfo, process_status: ProcessStatus) -> Self {
        Self {
            state: info.state,
            token_id: info.token_id,
            time_lock: info.time_lock,
            create_time: info.create_time,
            process_status,
        }
    }
}

/// Latest polled gas prices, in tenth-of-gwei units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasPriceInfo {
    /// Row key; the pollers write `"GAS"`.
    pub symbol: String,
    /// Fast-inclusion price.
    pub fast: f64,
    /// Safe-low price.
    pub low: f64,
    /// Average price, the one fee estimation consumes.
    pub average: f64,
    /// Unix time of the poll.
    pub last_updated_at: u64,
}

/// Latest polled price of one coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinPriceInfo {
    /// Which poller produced the row.
    pub source: String,
    /// Coin symbol (`"ETH"`, or the configured asset symbol).
    pub symbol: String,
    /// Price in USD.
    pub usd: f64,
    /// Price in KRW; the exchange-rate read divides two of these.
    pub krw: f64,
    /// Unix time of the poll.
    pub last_updated_at: u64,
}

/// Storage API.
///
/// Every write must be durable before the call returns; the task governor's
/// crash recovery depends on it.
#[async_trait]
pub trait StorageApi: Debug + Send + Sync {
    /// Inserts a fresh swap record.
    async fn create_swap(&self, swap: &SwapRecord) -> Result<()>;

    /// Reads one swap; `None` when the id is unknown.
    async fn get_swap(&self, id: SwapId) -> Result<Option<SwapRecord>>;

    /// All swaps not yet in a terminal state, in insertion order.
    async fn waiting_swaps(&self) -> Result<Vec<SwapRecord>>;

    /// Writes the deposit mirror fields and the status in one step.
    async fn update_deposit(&self, id: SwapId, update: &DepositUpdate) -> Result<()>;

    /// Writes the withdraw mirror fields and the status in one step.
    async fn update_withdraw(&self, id: SwapId, update: &WithdrawUpdate) -> Result<()>;

    /// Records the clock-skew correction for the withdraw box.
    async fn update_withdraw_time_diff(&self, id: SwapId, time_diff: i64) -> Result<()>;

    /// Records the hash of the withdraw-close transaction.
    async fn update_withdraw_tx_hash(&self, id: SwapId, tx_hash: B256) -> Result<()>;

    /// Moves a swap to a new status.
    async fn update_process_status(&self, id: SwapId, status: ProcessStatus) -> Result<()>;

    /// Refreshes the interval-gating timestamp.
    async fn update_process_time(&self, id: SwapId, time: u64) -> Result<()>;

    /// Stores the secret revealed by the user.
    async fn update_secret_key(&self, id: SwapId, secret_key: B256) -> Result<()>;

    /// Reads the retry bookkeeping for `(id, task)`; a missing row decodes
    /// as [`VmErrorRecord::absent`].
    async fn vm_error(&self, id: SwapId, task: TaskName) -> Result<VmErrorRecord>;

    /// Inserts or replaces the retry bookkeeping for `(record.id,
    /// record.task)`.
    async fn upsert_vm_error(&self, record: &VmErrorRecord) -> Result<()>;

    /// Removes the retry bookkeeping for `(id, task)`.
    async fn clear_vm_error(&self, id: SwapId, task: TaskName) -> Result<()>;

    /// Stores the latest gas prices.
    async fn update_gas_price(&self, price: &GasPriceInfo) -> Result<()>;

    /// Reads the latest gas prices.
    async fn gas_price(&self) -> Result<Option<GasPriceInfo>>;

    /// Stores a batch of coin prices.
    async fn update_coin_prices(&self, prices: &[CoinPriceInfo]) -> Result<()>;

    /// Reads the latest coin prices.
    async fn coin_prices(&self) -> Result<Vec<CoinPriceInfo>>;
}
