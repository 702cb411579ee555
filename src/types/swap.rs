use super::{LockBoxState, TokenId};
use crate::time::{SWAP_ID_EPOCH, unix_time};
use alloy::primitives::{Address, B256, U256, wrap_fixed_bytes};
use rand::RngCore;
use serde::{Deserialize, Serialize};

wrap_fixed_bytes! {
    /// The id of a swap and of its two on-chain lock boxes.
    ///
    /// Generated client-side: a 4-byte big-endian timestamp prefix (seconds
    /// since 2020-01-01T00:00:00Z) followed by 28 random bytes. The prefix
    /// keeps ids roughly sortable by creation time without making them
    /// predictable.
    pub struct SwapId<32>;
}

impl SwapId {
    /// Generates a fresh id with the current timestamp prefix.
    pub fn generate() -> Self {
        let secs = unix_time().saturating_sub(SWAP_ID_EPOCH) as u32;
        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        rand::rng().fill_bytes(&mut bytes[4..]);
        Self::from(bytes)
    }
}

/// The asset class a swap moves across the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeKind {
    /// The bridged coin: an ERC20 representation on ethnet, the native coin
    /// on biznet.
    Coin = 0,
    /// A registered ERC20 token pair, one contract on each network.
    Token = 1,
}

impl BridgeKind {
    /// Stable storage discriminant.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decodes a storage discriminant.
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Coin),
            1 => Some(Self::Token),
            _ => None,
        }
    }
}

/// The direction of a swap: which network holds the deposit box and which
/// the withdraw box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeDirection {
    /// Deposit on ethnet, withdrawal on biznet.
    EthnetToBiznet = 0,
    /// Deposit on biznet, withdrawal on ethnet.
    BiznetToEthnet = 1,
}

impl BridgeDirection {
    /// The opposite direction.
    pub const fn inverse(self) -> Self {
        match self {
            Self::EthnetToBiznet => Self::BiznetToEthnet,
            Self::BiznetToEthnet => Self::EthnetToBiznet,
        }
    }

    /// Stable storage discriminant.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decodes a storage discriminant.
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::EthnetToBiznet),
            1 => Some(Self::BiznetToEthnet),
            _ => None,
        }
    }
}

/// Position of a swap in the reconciliation state machine.
///
/// The discriminants are stable and stored as-is; gaps group the states by
/// phase (deposit opening, withdraw opening, withdraw closing, deposit
/// closing, expiry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Swap registered, deposit box not yet confirmed on-chain.
    None = 0,
    /// Deposit box verified open with acceptable fees.
    ConfirmedOpeningDeposit = 12,
    /// Deposit validation failed; terminal.
    ErrorOpeningDeposit = 13,
    /// Withdraw box submission succeeded, confirmation pending.
    FinishedOpeningWithdraw = 21,
    /// Withdraw box verified open.
    ConfirmedOpeningWithdraw = 22,
    /// Withdraw box could not be opened or expired first; terminal.
    ErrorOpeningWithdraw = 23,
    /// Withdraw close submitted with the revealed secret.
    FinishedClosingWithdraw = 31,
    /// Withdraw box verified closed.
    ConfirmedClosingWithdraw = 32,
    /// Withdraw close failed permanently; terminal.
    ErrorClosingWithdraw = 33,
    /// Deposit close submitted on the source network.
    FinishedClosingDeposit = 41,
    /// Deposit box verified closed; terminal success.
    ConfirmedClosingDeposit = 42,
    /// Deposit close failed permanently; terminal.
    ErrorClosingDeposit = 43,
    /// Withdraw box time lock elapsed unredeemed; expiry begins.
    StartedExpireWithdraw = 50,
    /// Expiry submitted, confirmation pending.
    FinishedExpireWithdraw = 51,
    /// Withdraw box verified expired; terminal.
    ConfirmedExpireWithdraw = 52,
    /// Expiry failed permanently; terminal.
    ErrorExpireWithdraw = 53,
    /// The swap row cannot be handled by this deployment; terminal.
    ErrorInvalidSwap = 99,
}

impl ProcessStatus {
    /// Whether the scheduler is done with a swap in this state.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ErrorOpeningDeposit
                | Self::ErrorOpeningWithdraw
                | Self::ErrorClosingWithdraw
                | Self::ConfirmedClosingDeposit
                | Self::ErrorClosingDeposit
                | Self::ConfirmedExpireWithdraw
                | Self::ErrorExpireWithdraw
                | Self::ErrorInvalidSwap
        )
    }

    /// Stable storage discriminant.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decodes a storage discriminant.
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            12 => Some(Self::ConfirmedOpeningDeposit),
            13 => Some(Self::ErrorOpeningDeposit),
            21 => Some(Self::FinishedOpeningWithdraw),
            22 => Some(Self::ConfirmedOpeningWithdraw),
            23 => Some(Self::ErrorOpeningWithdraw),
            31 => Some(Self::FinishedClosingWithdraw),
            32 => Some(Self::ConfirmedClosingWithdraw),
            33 => Some(Self::ErrorClosingWithdraw),
            41 => Some(Self::FinishedClosingDeposit),
            42 => Some(Self::ConfirmedClosingDeposit),
            43 => Some(Self::ErrorClosingDeposit),
            50 => Some(Self::StartedExpireWithdraw),
            51 => Some(Self::FinishedExpireWithdraw),
            52 => Some(Self::ConfirmedExpireWithdraw),
            53 => Some(Self::ErrorExpireWithdraw),
            99 => Some(Self::ErrorInvalidSwap),
            _ => None,
        }
    }
}

/// One swap attempt, as persisted.
///
/// The deposit and withdraw mirror fields are read-only projections of the
/// on-chain lock boxes: every write to them follows a successful (or
/// idempotently verified) on-chain read, never an optimistic local guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    /// Swap id, shared by both lock boxes.
    pub id: SwapId,
    /// Asset class.
    pub kind: BridgeKind,
    /// Swap direction.
    pub direction: BridgeDirection,
    /// Depositor address.
    pub trader_address: Address,
    /// Recipient address on the target network.
    pub withdraw_address: Address,
    /// Swapped amount, in the source network's decimal precision.
    pub amount: U256,
    /// Protocol service charge, source precision.
    pub swap_fee: U256,
    /// Operator gas reimbursement, source precision.
    pub tx_fee: U256,
    /// SHA-256 hash the boxes are locked under.
    pub secret_lock: B256,
    /// The 32-byte preimage; `None` until the user reveals it.
    pub secret_key: Option<B256>,
    /// Deposit box mirror: last observed state.
    pub deposit_state: LockBoxState,
    /// Deposit box mirror: token id (zero for the coin bridge).
    pub deposit_token_id: TokenId,
    /// Deposit box mirror: lock duration in seconds.
    pub deposit_time_lock: u64,
    /// Deposit box mirror: unix time the box was opened on-chain.
    pub deposit_create_time: u64,
    /// Hash of the user's deposit transaction, if reported.
    pub deposit_tx_hash: Option<B256>,
    /// Withdraw box mirror: last observed state.
    pub withdraw_state: LockBoxState,
    /// Withdraw box mirror: token id (zero for the coin bridge).
    pub withdraw_token_id: TokenId,
    /// Withdraw box mirror: lock duration in seconds.
    pub withdraw_time_lock: u64,
    /// Withdraw box mirror: unix time the box was opened on-chain.
    pub withdraw_create_time: u64,
    /// Hash of the bridge's withdraw-close transaction.
    pub withdraw_tx_hash: Option<B256>,
    /// Clock skew between the target chain and this process, captured once
    /// when the withdraw box is confirmed open.
    pub withdraw_time_diff: i64,
    /// Current state-machine position.
    pub process_status: ProcessStatus,
    /// Unix time of the last status transition; gates the per-network poll
    /// interval.
    pub process_update_time: u64,
}

impl SwapRecord {
    /// A fresh record as created when the deposit notification arrives.
    pub fn new(
        id: SwapId,
        kind: BridgeKind,
        direction: BridgeDirection,
        trader_address: Address,
        withdraw_address: Address,
        amount: U256,
        swap_fee: U256,
        tx_fee: U256,
        secret_lock: B256,
        deposit_tx_hash: Option<B256>,
    ) -> Self {
        Self {
            id,
            kind,
            direction,
            trader_address,
            withdraw_address,
            amount,
            swap_fee,
            tx_fee,
            secret_lock,
            secret_key: None,
            deposit_state: LockBoxState::Invalid,
            deposit_token_id: TokenId::ZERO,
            deposit_time_lock: 0,
            deposit_create_time: 0,
            deposit_tx_hash,
            withdraw_state: LockBoxState::Invalid,
            withdraw_token_id: TokenId::ZERO,
            withdraw_time_lock: 0,
            withdraw_create_time: 0,
            withdraw_tx_hash: None,
            withdraw_time_diff: 0,
            process_status: ProcessStatus::None,
            process_update_time: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_id_has_timestamp_prefix() {
        let id = SwapId::generate();
        let secs = u32::from_be_bytes(id[..4].try_into().unwrap()) as u64;
        let now = unix_time() - SWAP_ID_EPOCH;
        assert!(now.abs_diff(secs) <= 1);
    }

    #[test]
    fn swap_ids_are_unique() {
        assert_ne!(SwapId::generate(), SwapId::generate());
    }

    #[test]
    fn status_discriminants_round_trip() {
        for status in [
            ProcessStatus::None,
            ProcessStatus::ConfirmedOpeningDeposit,
            ProcessStatus::ErrorOpeningDeposit,
            ProcessStatus::FinishedOpeningWithdraw,
            ProcessStatus::ConfirmedOpeningWithdraw,
            ProcessStatus::ErrorOpeningWithdraw,
            ProcessStatus::FinishedClosingWithdraw,
            ProcessStatus::ConfirmedClosingWithdraw,
            ProcessStatus::ErrorClosingWithdraw,
            ProcessStatus::FinishedClosingDeposit,
            ProcessStatus::ConfirmedClosingDeposit,
            ProcessStatus::ErrorClosingDeposit,
            ProcessStatus::StartedExpireWithdraw,
            ProcessStatus::FinishedExpireWithdraw,
            ProcessStatus::ConfirmedExpireWithdraw,
            ProcessStatus::ErrorExpireWithdraw,
            ProcessStatus::ErrorInvalidSwap,
        ] {
            assert_eq!(ProcessStatus::from_i32(status.as_i32()), Some(status));
        }
        assert_eq!(ProcessStatus::from_i32(7), None);
    }

    #[test]
    fn terminal_states() {
        assert!(ProcessStatus::ConfirmedClosingDeposit.is_terminal());
        assert!(ProcessStatus::ConfirmedExpireWithdraw.is_terminal());
        assert!(ProcessStatus::ErrorInvalidSwap.is_terminal());
        assert!(!ProcessStatus::None.is_terminal());
        assert!(!ProcessStatus::ConfirmedOpeningWithdraw.is_terminal());
        assert!(!ProcessStatus::StartedExpireWithdraw.is_terminal());
    }

    #[test]
    fn direction_inverse() {
        assert_eq!(BridgeDirection::EthnetToBiznet.inverse(), BridgeDirection::BiznetToEthnet);
        assert_eq!(BridgeDirection::BiznetToEthnet.inverse(), BridgeDirection::EthnetToBiznet);
    }
}
