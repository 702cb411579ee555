//! Shared fixtures: a programmable in-memory lock-box chain and wiring for
//! both bridge variants against in-memory storage.
#![allow(dead_code)]

use alloy::primitives::{Address, B256, U256};
use lockbox_relay::{
    contracts::{LockBoxContract, LockBoxReader, OpenWithdrawRequest},
    error::VmError,
    manager::{CoinBridgeManager, GasUsage, Token, TokenBridgeManager, TokenPair},
    scheduler::{BridgeIntervals, BridgeScheduler},
    storage::{CoinPriceInfo, GasPriceInfo, SwapStorage},
    tasks::{CoinBridgeTasks, TokenBridgeTasks},
    time::unix_time,
    types::{LockBoxInfo, LockBoxState, ProcessStatus, SwapId, SwapRecord, TokenId},
};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

/// SHA-256 as the contracts hash the secret preimage.
pub fn sha256(data: &[u8]) -> B256 {
    B256::from(<[u8; 32]>::from(Sha256::digest(data)))
}

/// The manager address used by fixtures.
pub fn trader() -> Address {
    Address::repeat_byte(0x11)
}

fn zero_box(id: SwapId) -> LockBoxInfo {
    LockBoxInfo {
        id,
        state: LockBoxState::Invalid,
        token_id: TokenId::ZERO,
        time_lock: 0,
        amount: U256::ZERO,
        swap_fee: U256::ZERO,
        tx_fee: U256::ZERO,
        trader_address: Address::ZERO,
        withdraw_address: Address::ZERO,
        secret_lock: B256::ZERO,
        create_time: 0,
    }
}

/// One bridge contract on one simulated network: deposit and withdraw
/// boxes, preimage verification, and failure injection for submissions.
#[derive(Debug, Default)]
pub struct MockBridge {
    deposits: Mutex<HashMap<SwapId, LockBoxInfo>>,
    withdraws: Mutex<HashMap<SwapId, LockBoxInfo>>,
    secrets: Mutex<HashMap<SwapId, B256>>,
    /// Time lock stamped on withdraw boxes opened through this bridge.
    withdraw_time_lock: u64,
    /// Remaining submissions that will fail with a revert.
    fail_submissions: AtomicU32,
    pub open_withdraw_calls: AtomicU32,
    pub reset_calls: AtomicU32,
}

impl MockBridge {
    pub fn new(withdraw_time_lock: u64) -> Self {
        Self { withdraw_time_lock, ..Default::default() }
    }

    /// Simulates the user opening a deposit box.
    pub fn open_deposit(&self, info: LockBoxInfo) {
        self.deposits.lock().unwrap().insert(info.id, info);
    }

    /// Places a withdraw box directly, bypassing the bridge flow.
    pub fn insert_withdraw(&self, info: LockBoxInfo) {
        self.withdraws.lock().unwrap().insert(info.id, info);
    }

    /// Moves a withdraw box's creation back in time.
    pub fn rewind_withdraw(&self, id: SwapId, secs: u64) {
        if let Some(info) = self.withdraws.lock().unwrap().get_mut(&id) {
            info.create_time = info.create_time.saturating_sub(secs);
        }
    }

    /// Arms the next `count` submissions to fail.
    pub fn fail_next_submissions(&self, count: u32) {
        self.fail_submissions.store(count, Ordering::SeqCst);
    }

    pub fn deposit_state(&self, id: SwapId) -> LockBoxState {
        self.deposits.lock().unwrap().get(&id).map(|info| info.state).unwrap_or(LockBoxState::Invalid)
    }

    pub fn withdraw_state(&self, id: SwapId) -> LockBoxState {
        self.withdraws
            .lock()
            .unwrap()
            .get(&id)
            .map(|info| info.state)
            .unwrap_or(LockBoxState::Invalid)
    }

    pub fn withdraw_box(&self, id: SwapId) -> Option<LockBoxInfo> {
        self.withdraws.lock().unwrap().get(&id).cloned()
    }

    fn take_failure(&self) -> bool {
        self.fail_submissions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn revert(message: &str) -> VmError {
        VmError::parse(message)
    }
}

#[async_trait::async_trait]
impl LockBoxReader for MockBridge {
    async fn check_deposit(&self, id: SwapId) -> Result<LockBoxInfo, VmError> {
        Ok(self.deposits.lock().unwrap().get(&id).cloned().unwrap_or_else(|| zero_box(id)))
    }

    async fn check_withdraw(&self, id: SwapId) -> Result<LockBoxInfo, VmError> {
        Ok(self.withdraws.lock().unwrap().get(&id).cloned().unwrap_or_else(|| zero_box(id)))
    }

    async fn check_secret_key_withdraw(&self, id: SwapId) -> Result<B256, VmError> {
        Ok(self.secrets.lock().unwrap().get(&id).copied().unwrap_or(B256::ZERO))
    }
}

#[async_trait::async_trait]
impl LockBoxContract for MockBridge {
    async fn open_withdraw(&self, request: &OpenWithdrawRequest) -> Result<B256, VmError> {
        if self.take_failure() {
            return Err(Self::revert("Transaction reverted|2001"));
        }
        self.open_withdraw_calls.fetch_add(1, Ordering::SeqCst);
        let info = LockBoxInfo {
            id: request.id,
            state: LockBoxState::Open,
            token_id: request.token_id,
            time_lock: self.withdraw_time_lock,
            amount: request.amount,
            swap_fee: request.swap_fee,
            tx_fee: request.tx_fee,
            trader_address: request.trader_address,
            withdraw_address: request.withdraw_address,
            secret_lock: request.secret_lock,
            create_time: unix_time(),
        };
        self.withdraws.lock().unwrap().insert(request.id, info);
        Ok(B256::repeat_byte(0xA1))
    }

    async fn close_withdraw(&self, id: SwapId, secret_key: B256) -> Result<B256, VmError> {
        if self.take_failure() {
            return Err(Self::revert("Transaction reverted|2002"));
        }
        let mut withdraws = self.withdraws.lock().unwrap();
        let Some(info) = withdraws.get_mut(&id) else {
            return Err(Self::revert("The box does not exist|1201"));
        };
        if info.state != LockBoxState::Open {
            return Err(Self::revert("The box is not open|1202"));
        }
        if sha256(secret_key.as_slice()) != info.secret_lock {
            return Err(Self::revert("The secret key does not match|1203"));
        }
        info.state = LockBoxState::Closed;
        self.secrets.lock().unwrap().insert(id, secret_key);
        Ok(B256::repeat_byte(0xA2))
    }

    async fn close_deposit(&self, id: SwapId, secret_key: B256) -> Result<B256, VmError> {
        if self.take_failure() {
            return Err(Self::revert("Transaction reverted|2003"));
        }
        let mut deposits = self.deposits.lock().unwrap();
        let Some(info) = deposits.get_mut(&id) else {
            return Err(Self::revert("The box does not exist|1201"));
        };
        if info.state != LockBoxState::Open {
            return Err(Self::revert("The box is not open|1202"));
        }
        if sha256(secret_key.as_slice()) != info.secret_lock {
            return Err(Self::revert("The secret key does not match|1203"));
        }
        info.state = LockBoxState::Closed;
        Ok(B256::repeat_byte(0xA3))
    }

    async fn expire_withdraw(&self, id: SwapId) -> Result<B256, VmError> {
        if self.take_failure() {
            return Err(Self::revert("Transaction reverted|2004"));
        }
        let mut withdraws = self.withdraws.lock().unwrap();
        let Some(info) = withdraws.get_mut(&id) else {
            return Err(Self::revert("The box does not exist|1201"));
        };
        if info.state != LockBoxState::Open {
            return Err(Self::revert("The box is not open|1202"));
        }
        info.state = LockBoxState::Expired;
        Ok(B256::repeat_byte(0xA4))
    }

    async fn reset_transaction_count(&self) -> Result<(), VmError> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Gas usage constants shared by the fixtures.
pub fn gas_usage() -> GasUsage {
    GasUsage {
        open_deposit: 213_968,
        close_deposit: 79_238,
        open_withdraw: 197_145,
        close_withdraw: 111_016,
    }
}

/// Storage preloaded with a 30-gwei gas price and a 2000:1 ETH:COIN rate.
pub async fn storage_with_prices() -> SwapStorage {
    let storage = SwapStorage::in_memory();
    storage
        .update_gas_price(&GasPriceInfo {
            symbol: "GAS".into(),
            fast: 600.0,
            low: 100.0,
            average: 300.0,
            last_updated_at: unix_time(),
        })
        .await
        .unwrap();
    storage
        .update_coin_prices(&[
            CoinPriceInfo {
                source: "coingecko".into(),
                symbol: "ETH".into(),
                usd: 2000.0,
                krw: 2_600_000.0,
                last_updated_at: unix_time(),
            },
            CoinPriceInfo {
                source: "coingecko".into(),
                symbol: "COIN".into(),
                usd: 1.0,
                krw: 1300.0,
                last_updated_at: unix_time(),
            },
        ])
        .await
        .unwrap();
    storage
}

/// A coin bridge wired against two mock networks.
pub struct CoinFixture {
    pub storage: SwapStorage,
    pub ethnet: Arc<MockBridge>,
    pub biznet: Arc<MockBridge>,
    pub scheduler: BridgeScheduler,
}

impl CoinFixture {
    pub async fn new() -> Self {
        let storage = storage_with_prices().await;
        let ethnet = Arc::new(MockBridge::new(7200));
        let biznet = Arc::new(MockBridge::new(7200));
        let manager = Arc::new(CoinBridgeManager::new(
            ethnet.clone(),
            biznet.clone(),
            30,
            gas_usage(),
        ));
        let tasks = CoinBridgeTasks::new(storage.clone(), manager, "COIN");
        let scheduler = BridgeScheduler::new(
            storage.clone(),
            Some(Arc::new(tasks)),
            None,
            BridgeIntervals { coin_ethnet: 1, coin_biznet: 1, token_ethnet: 1, token_biznet: 1 },
            0,
            Duration::from_secs(1),
        );
        Self { storage, ethnet, biznet, scheduler }
    }

    /// Runs one scheduler pass and makes the swap due again immediately,
    /// so tests do not have to wait out the per-network intervals (the
    /// interval gate has its own unit tests).
    pub async fn step(&self, id: SwapId) {
        self.scheduler.run_once().await;
        self.storage.update_process_time(id, 0).await.unwrap();
    }

    pub async fn status(&self, id: SwapId) -> ProcessStatus {
        self.storage.get_swap(id).await.unwrap().unwrap().process_status
    }

    pub async fn swap(&self, id: SwapId) -> SwapRecord {
        self.storage.get_swap(id).await.unwrap().unwrap()
    }
}

/// A token bridge wired against two mock networks, with one registered
/// pair: 10 decimals on ethnet, 7 on biznet.
pub struct TokenFixture {
    pub storage: SwapStorage,
    pub ethnet: Arc<MockBridge>,
    pub biznet: Arc<MockBridge>,
    pub pair: TokenPair,
    pub scheduler: BridgeScheduler,
}

impl TokenFixture {
    pub async fn new() -> Self {
        let storage = storage_with_prices().await;
        let ethnet = Arc::new(MockBridge::new(7200));
        let biznet = Arc::new(MockBridge::new(7200));
        let pair = TokenPair {
            ethnet: Token::new(
                Address::repeat_byte(0xE1),
                Address::repeat_byte(0xE2),
                "TKA",
                10,
            ),
            biznet: Token::new(
                Address::repeat_byte(0xB1),
                Address::repeat_byte(0xB2),
                "TKA",
                7,
            ),
        };
        let manager = Arc::new(TokenBridgeManager::new(
            ethnet.clone(),
            biznet.clone(),
            vec![pair.clone()],
            gas_usage(),
        ));
        let tasks = TokenBridgeTasks::new(storage.clone(), manager, "COIN");
        let scheduler = BridgeScheduler::new(
            storage.clone(),
            None,
            Some(Arc::new(tasks)),
            BridgeIntervals { coin_ethnet: 1, coin_biznet: 1, token_ethnet: 1, token_biznet: 1 },
            0,
            Duration::from_secs(1),
        );
        Self { storage, ethnet, biznet, pair, scheduler }
    }

    pub async fn step(&self, id: SwapId) {
        self.scheduler.run_once().await;
        self.storage.update_process_time(id, 0).await.unwrap();
    }

    pub async fn status(&self, id: SwapId) -> ProcessStatus {
        self.storage.get_swap(id).await.unwrap().unwrap().process_status
    }
}
