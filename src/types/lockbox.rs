use super::{SwapId, TokenId};
use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// On-chain state of a lock box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockBoxState {
    /// No box with this id exists.
    Invalid = 0,
    /// Box holds funds under the hash/time lock.
    Open = 1,
    /// Box released by revealing the preimage.
    Closed = 2,
    /// Box reclaimed after the time lock elapsed.
    Expired = 3,
}

impl LockBoxState {
    /// Decodes the `uint8` the contracts report. Unknown values map to
    /// [`LockBoxState::Invalid`].
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::Closed,
            3 => Self::Expired,
            _ => Self::Invalid,
        }
    }

    /// Stable storage discriminant.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decodes a storage discriminant.
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Invalid),
            1 => Some(Self::Open),
            2 => Some(Self::Closed),
            3 => Some(Self::Expired),
            _ => None,
        }
    }
}

/// The contract's authoritative view of one lock box.
///
/// Token-bridge boxes carry a nonzero `token_id` and always report a zero
/// `swap_fee`; token withdraw boxes additionally report a zero `tx_fee`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockBoxInfo {
    /// Box id (equals the swap id).
    pub id: SwapId,
    /// Current state.
    pub state: LockBoxState,
    /// Token id, zero on the coin bridge.
    pub token_id: TokenId,
    /// Lock duration in seconds.
    pub time_lock: u64,
    /// Locked amount, in the box's network precision.
    pub amount: U256,
    /// Swap fee paid into the box.
    pub swap_fee: U256,
    /// Gas reimbursement paid into the box.
    pub tx_fee: U256,
    /// Depositor address.
    pub trader_address: Address,
    /// Recipient address.
    pub withdraw_address: Address,
    /// Hash lock.
    pub secret_lock: B256,
    /// Unix time the box was opened, per the chain's clock.
    pub create_time: u64,
}

impl LockBoxInfo {
    /// Unix time at which the box becomes expirable, corrected by the given
    /// clock skew.
    pub fn expire_time(&self, time_diff: i64) -> i64 {
        (self.create_time + self.time_lock) as i64 - time_diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_from_u8() {
        assert_eq!(LockBoxState::from_u8(0), LockBoxState::Invalid);
        assert_eq!(LockBoxState::from_u8(1), LockBoxState::Open);
        assert_eq!(LockBoxState::from_u8(2), LockBoxState::Closed);
        assert_eq!(LockBoxState::from_u8(3), LockBoxState::Expired);
        assert_eq!(LockBoxState::from_u8(200), LockBoxState::Invalid);
    }

    #[test]
    fn expire_time_applies_skew() {
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
            create_time: 1_000_000,
        };
        assert_eq!(info.expire_time(0), 1_003_600);
        // The target chain runs 10 s ahead of us, so in our clock the box
        // expires 10 s earlier.
        assert_eq!(info.expire_time(10), 1_003_590);
    }
}
