//! Typed bindings for the lock-box bridge contracts and the trait seam the
//! bridge tasks call through.
//!
//! The coin bridge exposes one interface on both networks (ERC20-backed on
//! ethnet, native-coin-backed on biznet); the token bridge adds a token id
//! to every box and charges no per-box swap fee.

use crate::{
    error::VmError,
    gateway::ChainGateway,
    types::{LockBoxInfo, LockBoxState, SwapId, TokenId},
};
use alloy::{
    primitives::{Address, B256, Bytes, U256},
    providers::DynProvider,
    sol,
    sol_types::SolCall,
};
use async_trait::async_trait;
use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

sol! {
    #[sol(rpc)]
    interface ICoinBridge {
        function checkDeposit(bytes32 id) external view returns (
            uint8 state,
            uint256 timeLock,
            uint256 amount,
            uint256 swapFee,
            uint256 txFee,
            address traderAddress,
            address withdrawAddress,
            bytes32 secretLock,
            uint256 createTimestamp
        );
        function checkWithdraw(bytes32 id) external view returns (
            uint8 state,
            uint256 timeLock,
            uint256 amount,
            uint256 swapFee,
            uint256 txFee,
            address traderAddress,
            address withdrawAddress,
            bytes32 secretLock,
            uint256 createTimestamp
        );
        function checkSecretKeyWithdraw(bytes32 id) external view returns (bytes32 key);
        function openWithdraw(
            bytes32 id,
            uint256 amount,
            uint256 swapFee,
            uint256 txFee,
            address traderAddress,
            address withdrawAddress,
            bytes32 secretLock
        ) external;
        function closeWithdraw(bytes32 id, bytes32 key) external;
        function closeDeposit(bytes32 id, bytes32 key) external;
        function expireWithdraw(bytes32 id) external;
    }

    #[sol(rpc)]
    interface ITokenBridge {
        function checkDeposit(bytes32 id) external view returns (
            uint8 state,
            bytes32 tokenId,
            uint256 timeLock,
            uint256 amount,
            uint256 txFee,
            address traderAddress,
            address withdrawAddress,
            bytes32 secretLock,
            uint256 createTimestamp
        );
        function checkWithdraw(bytes32 id) external view returns (
            uint8 state,
            bytes32 tokenId,
            uint256 timeLock,
            uint256 amount,
            address traderAddress,
            address withdrawAddress,
            bytes32 secretLock,
            uint256 createTimestamp
        );
        function checkSecretKeyWithdraw(bytes32 id) external view returns (bytes32 key);
        function openWithdraw(
            bytes32 id,
            bytes32 tokenId,
            uint256 amount,
            uint256 txFee,
            address traderAddress,
            address withdrawAddress,
            bytes32 secretLock
        ) external;
        function closeWithdraw(bytes32 id, bytes32 key) external;
        function closeDeposit(bytes32 id, bytes32 key) external;
        function expireWithdraw(bytes32 id) external;
    }

    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

/// Parameters of a withdraw-box submission.
///
/// Amounts are already rebased to the target network's precision;
/// `token_id` names the target-side token and is ignored by the coin
/// bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenWithdrawRequest {
    /// Box id, equal to the swap id.
    pub id: SwapId,
    /// Target-side token id.
    pub token_id: TokenId,
    /// Amount in target precision.
    pub amount: U256,
    /// Swap fee in target precision.
    pub swap_fee: U256,
    /// Gas reimbursement in target precision.
    pub tx_fee: U256,
    /// Depositor address.
    pub trader_address: Address,
    /// Recipient address.
    pub withdraw_address: Address,
    /// Hash lock carried over from the deposit box.
    pub secret_lock: B256,
}

/// Read access to one bridge contract's lock boxes.
#[async_trait]
pub trait LockBoxReader: Debug + Send + Sync {
    /// Reads the deposit box with the given id.
    async fn check_deposit(&self, id: SwapId) -> Result<LockBoxInfo, VmError>;

    /// Reads the withdraw box with the given id.
    async fn check_withdraw(&self, id: SwapId) -> Result<LockBoxInfo, VmError>;

    /// Reads the secret revealed by closing the withdraw box.
    async fn check_secret_key_withdraw(&self, id: SwapId) -> Result<B256, VmError>;
}

/// Full access to one bridge contract, bound to the manager signer.
#[async_trait]
pub trait LockBoxContract: LockBoxReader {
    /// Submits a withdraw box.
    async fn open_withdraw(&self, request: &OpenWithdrawRequest) -> Result<B256, VmError>;

    /// Submits a withdraw close revealing the secret.
    async fn close_withdraw(&self, id: SwapId, secret_key: B256) -> Result<B256, VmError>;

    /// Submits a deposit close revealing the secret.
    async fn close_deposit(&self, id: SwapId, secret_key: B256) -> Result<B256, VmError>;

    /// Submits a withdraw expiry.
    async fn expire_withdraw(&self, id: SwapId) -> Result<B256, VmError>;

    /// Resynchronizes the nonce sequence of the signer behind this contract.
    async fn reset_transaction_count(&self) -> Result<(), VmError>;
}

/// The coin bridge contract on one network, driven through a shared
/// [`ChainGateway`].
#[derive(Debug)]
pub struct CoinBridge {
    address: Address,
    gateway: Arc<ChainGateway>,
}

impl CoinBridge {
    /// Binds the contract at `address` to the gateway's network and signer.
    pub fn new(address: Address, gateway: Arc<ChainGateway>) -> Self {
        Self { address, gateway }
    }

    /// The contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    fn instance(&self) -> ICoinBridge::ICoinBridgeInstance<DynProvider> {
        ICoinBridge::new(self.address, self.gateway.provider().clone())
    }

    async fn send(&self, input: Vec<u8>) -> Result<B256, VmError> {
        self.gateway
            .send(self.address, Bytes::from(input))
            .await
            .map_err(|err| err.to_vm_error())
    }
}

#[async_trait]
impl LockBoxReader for CoinBridge {
    async fn check_deposit(&self, id: SwapId) -> Result<LockBoxInfo, VmError> {
        let ret = self
            .instance()
            .checkDeposit(id.0)
            .call()
            .await
            .map_err(|err| VmError::from_contract_error(&err))?;
        Ok(LockBoxInfo {
            id,
            state: LockBoxState::from_u8(ret.state),
            token_id: TokenId::ZERO,
            time_lock: u64::try_from(ret.timeLock).unwrap_or(u64::MAX),
            amount: ret.amount,
            swap_fee: ret.swapFee,
            tx_fee: ret.txFee,
            trader_address: ret.traderAddress,
            withdraw_address: ret.withdrawAddress,
            secret_lock: ret.secretLock,
            create_time: u64::try_from(ret.createTimestamp).unwrap_or(u64::MAX),
        })
    }

    async fn check_withdraw(&self, id: SwapId) -> Result<LockBoxInfo, VmError> {
        let ret = self
            .instance()
            .checkWithdraw(id.0)
            .call()
            .await
            .map_err(|err| VmError::from_contract_error(&err))?;
        Ok(LockBoxInfo {
            id,
            state: LockBoxState::from_u8(ret.state),
            token_id: TokenId::ZERO,
            time_lock: u64::try_from(ret.timeLock).unwrap_or(u64::MAX),
            amount: ret.amount,
            swap_fee: ret.swapFee,
            tx_fee: ret.txFee,
            trader_address: ret.traderAddress,
            withdraw_address: ret.withdrawAddress,
            secret_lock: ret.secretLock,
            create_time: u64::try_from(ret.createTimestamp).unwrap_or(u64::MAX),
        })
    }

    async fn check_secret_key_withdraw(&self, id: SwapId) -> Result<B256, VmError> {
        self.instance()
            .checkSecretKeyWithdraw(id.0)
            .call()
            .await
            .map_err(|err| VmError::from_contract_error(&err))
    }
}

#[async_trait]
impl LockBoxContract for CoinBridge {
    async fn open_withdraw(&self, request: &OpenWithdrawRequest) -> Result<B256, VmError> {
        let call = ICoinBridge::openWithdrawCall {
            id: request.id.0,
            amount: request.amount,
            swapFee: request.swap_fee,
            txFee: request.tx_fee,
            traderAddress: request.trader_address,
            withdrawAddress: request.withdraw_address,
            secretLock: request.secret_lock,
        };
        self.send(call.abi_encode()).await
    }

    async fn close_withdraw(&self, id: SwapId, secret_key: B256) -> Result<B256, VmError> {
        self.send(ICoinBridge::closeWithdrawCall { id: id.0, key: secret_key }.abi_encode()).await
    }

    async fn close_deposit(&self, id: SwapId, secret_key: B256) -> Result<B256, VmError> {
        self.send(ICoinBridge::closeDepositCall { id: id.0, key: secret_key }.abi_encode()).await
    }

    async fn expire_withdraw(&self, id: SwapId) -> Result<B256, VmError> {
        self.send(ICoinBridge::expireWithdrawCall { id: id.0 }.abi_encode()).await
    }

    async fn reset_transaction_count(&self) -> Result<(), VmError> {
        self.gateway
            .reset_transaction_count()
            .await
            .map_err(|err| VmError::from_transport_error(&err))
    }
}

/// The token bridge contract on one network, driven through a shared
/// [`ChainGateway`].
#[derive(Debug)]
pub struct TokenBridge {
    address: Address,
    gateway: Arc<ChainGateway>,
}

impl TokenBridge {
    /// Binds the contract at `address` to the gateway's network and signer.
    pub fn new(address: Address, gateway: Arc<ChainGateway>) -> Self {
        Self { address, gateway }
    }

    /// The contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    fn instance(&self) -> ITokenBridge::ITokenBridgeInstance<DynProvider> {
        ITokenBridge::new(self.address, self.gateway.provider().clone())
    }

    async fn send(&self, input: Vec<u8>) -> Result<B256, VmError> {
        self.gateway
            .send(self.address, Bytes::from(input))
            .await
            .map_err(|err| err.to_vm_error())
    }
}

#[async_trait]
impl LockBoxReader for TokenBridge {
    async fn check_deposit(&self, id: SwapId) -> Result<LockBoxInfo, VmError> {
        let ret = self
            .instance()
            .checkDeposit(id.0)
            .call()
            .await
            .map_err(|err| VmError::from_contract_error(&err))?;
        Ok(LockBoxInfo {
            id,
            state: LockBoxState::from_u8(ret.state),
            token_id: TokenId::from(<[u8; 32]>::from(ret.tokenId)),
            time_lock: u64::try_from(ret.timeLock).unwrap_or(u64::MAX),
            amount: ret.amount,
            swap_fee: U256::ZERO,
            tx_fee: ret.txFee,
            trader_address: ret.traderAddress,
            withdraw_address: ret.withdrawAddress,
            secret_lock: ret.secretLock,
            create_time: u64::try_from(ret.createTimestamp).unwrap_or(u64::MAX),
        })
    }

    async fn check_withdraw(&self, id: SwapId) -> Result<LockBoxInfo, VmError> {
        let ret = self
            .instance()
            .checkWithdraw(id.0)
            .call()
            .await
            .map_err(|err| VmError::from_contract_error(&err))?;
        Ok(LockBoxInfo {
            id,
            state: LockBoxState::from_u8(ret.state),
            token_id: TokenId::from(<[u8; 32]>::from(ret.tokenId)),
            time_lock: u64::try_from(ret.timeLock).unwrap_or(u64::MAX),
            amount: ret.amount,
            swap_fee: U256::ZERO,
            tx_fee: U256::ZERO,
            trader_address: ret.traderAddress,
            withdraw_address: ret.withdrawAddress,
            secret_lock: ret.secretLock,
            create_time: u64::try_from(ret.createTimestamp).unwrap_or(u64::MAX),
        })
    }

    async fn check_secret_key_withdraw(&self, id: SwapId) -> Result<B256, VmError> {
        self.instance()
            .checkSecretKeyWithdraw(id.0)
            .call()
            .await
            .map_err(|err| VmError::from_contract_error(&err))
    }
}

#[async_trait]
impl LockBoxContract for TokenBridge {
    async fn open_withdraw(&self, request: &OpenWithdrawRequest) -> Result<B256, VmError> {
        let call = ITokenBridge::openWithdrawCall {
            id: request.id.0,
            tokenId: request.token_id.0,
            amount: request.amount,
            txFee: request.tx_fee,
            traderAddress: request.trader_address,
            withdrawAddress: request.withdraw_address,
            secretLock: request.secret_lock,
        };
        self.send(call.abi_encode()).await
    }

    async fn close_withdraw(&self, id: SwapId, secret_key: B256) -> Result<B256, VmError> {
        self.send(ITokenBridge::closeWithdrawCall { id: id.0, key: secret_key }.abi_encode()).await
    }

    async fn close_deposit(&self, id: SwapId, secret_key: B256) -> Result<B256, VmError> {
        self.send(ITokenBridge::closeDepositCall { id: id.0, key: secret_key }.abi_encode()).await
    }

    async fn expire_withdraw(&self, id: SwapId) -> Result<B256, VmError> {
        self.send(ITokenBridge::expireWithdrawCall { id: id.0 }.abi_encode()).await
    }

    async fn reset_transaction_count(&self) -> Result<(), VmError> {
        self.gateway
            .reset_transaction_count()
            .await
            .map_err(|err| VmError::from_transport_error(&err))
    }
}

/// Error returned by the blocking wait helpers.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The predicate did not hold within the timeout.
    #[error("a timeout occurred")]
    TimedOut,

    /// RPC error while polling.
    #[error(transparent)]
    Rpc(#[from] alloy::contract::Error),
}

/// Polls until the deposit box with `id` is open.
///
/// A deliberately blocking helper for tooling scripts; the scheduler never
/// waits on-chain, it re-evaluates on its next tick.
pub async fn wait_for_deposit_open(
    reader: &dyn LockBoxReader,
    id: SwapId,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<LockBoxInfo, WaitError> {
    let start = Instant::now();
    loop {
        if let Ok(info) = reader.check_deposit(id).await {
            if info.state == LockBoxState::Open {
                return Ok(info);
            }
        }
        if start.elapsed() >= timeout {
            return Err(WaitError::TimedOut);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Polls until the deposit box with `id` is closed.
pub async fn wait_for_deposit_close(
    reader: &dyn LockBoxReader,
    id: SwapId,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<LockBoxInfo, WaitError> {
    let start = Instant::now();
    loop {
        if let Ok(info) = reader.check_deposit(id).await {
            if info.state == LockBoxState::Closed {
                return Ok(info);
            }
        }
        if start.elapsed() >= timeout {
            return Err(WaitError::TimedOut);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Polls until `owner` has granted `spender` an allowance of at least
/// `amount` on the given token.
pub async fn wait_for_allowance(
    provider: &DynProvider,
    token: Address,
    owner: Address,
    spender: Address,
    amount: U256,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<U256, WaitError> {
    let erc20 = IERC20::new(token, provider.clone());
    let start = Instant::now();
    loop {
        let allowance = erc20.allowance(owner, spender).call().await?;
        if allowance >= amount {
            return Ok(allowance);
        }
        if start.elapsed() >= timeout {
            return Err(WaitError::TimedOut);
        }
        tokio::time::sleep(poll_interval).await;
    }
}
