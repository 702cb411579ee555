//! Bridge contract managers.
//!
//! A manager owns the two networks' contract handles for one asset class,
//! resolves source/target by swap direction, and prices the operator's
//! charges. Both managers hand out handles backed by the shared
//! [`GatewayRegistry`](crate::gateway::GatewayRegistry) gateways, so nonce
//! sequencing stays serialized per `(network, signer)`.

mod coin;
pub use coin::CoinBridgeManager;
mod token;
pub use token::{Token, TokenBridgeManager, TokenPair};

use crate::{
    amount::Amount,
    config::{BridgeConfig, TokenBridgeConfig},
    constants::GAS_UNIT,
    contracts::{LockBoxContract, LockBoxReader},
    error::VmError,
    types::BridgeDirection,
};
use alloy::primitives::U256;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

/// Per-operation average gas usage, configured per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasUsage {
    /// Gas used opening a deposit box.
    pub open_deposit: u64,
    /// Gas used closing a deposit box.
    pub close_deposit: u64,
    /// Gas used opening a withdraw box.
    pub open_withdraw: u64,
    /// Gas used closing a withdraw box.
    pub close_withdraw: u64,
}

impl From<&BridgeConfig> for GasUsage {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            open_deposit: config.gas_usage_open_deposit,
            close_deposit: config.gas_usage_close_deposit,
            open_withdraw: config.gas_usage_open_withdraw,
            close_withdraw: config.gas_usage_close_withdraw,
        }
    }
}

impl From<&TokenBridgeConfig> for GasUsage {
    fn from(config: &TokenBridgeConfig) -> Self {
        Self {
            open_deposit: config.gas_usage_open_deposit,
            close_deposit: config.gas_usage_close_deposit,
            open_withdraw: config.gas_usage_open_withdraw,
            close_withdraw: config.gas_usage_close_withdraw,
        }
    }
}

impl GasUsage {
    /// Gas the bridge will spend completing a swap in the given direction:
    /// a deposit close on the source network for one direction, a withdraw
    /// open plus close on the target network for the other.
    pub fn for_direction(&self, direction: BridgeDirection) -> u64 {
        match direction {
            BridgeDirection::EthnetToBiznet => self.close_deposit,
            BridgeDirection::BiznetToEthnet => self.open_withdraw + self.close_withdraw,
        }
    }
}

/// Computes the gas reimbursement owed to the bridge operator, in display
/// units of the swapped asset, rebased to `decimals`.
///
/// `gas_price` arrives in tenth-of-gwei units and `eth_asset_rate` is the
/// ETH price divided by the asset price, so the product is rounded up to a
/// whole display unit before scaling.
pub(crate) fn estimate_tx_fee(
    gas_usage: u64,
    gas_price: f64,
    eth_asset_rate: f64,
    decimals: u8,
) -> Amount {
    let display = (gas_usage as f64 * (gas_price / GAS_UNIT) * eth_asset_rate).ceil();
    Amount::from_integer(display as u64, decimals)
}

/// Contract access and fee pricing for one asset class.
#[async_trait]
pub trait BridgeManager: Debug + Send + Sync {
    /// Read-only handle to the bridge holding the deposit box.
    fn source_bridge(&self, direction: BridgeDirection) -> Arc<dyn LockBoxReader>;

    /// Read-only handle to the bridge holding the withdraw box.
    fn target_bridge(&self, direction: BridgeDirection) -> Arc<dyn LockBoxReader>;

    /// Signer-bound handle to the bridge holding the deposit box.
    fn source_bridge_with_signer(&self, direction: BridgeDirection) -> Arc<dyn LockBoxContract>;

    /// Signer-bound handle to the bridge holding the withdraw box.
    fn target_bridge_with_signer(&self, direction: BridgeDirection) -> Arc<dyn LockBoxContract>;

    /// The protocol service charge for a swap of `amount`, in the asset's
    /// own units at `decimals`.
    fn swap_fee(&self, amount: U256, decimals: u8) -> Amount;

    /// The operator's gas reimbursement for completing a swap, in the
    /// asset's own units at `decimals`.
    fn estimated_tx_fee(
        &self,
        gas_price: f64,
        eth_asset_rate: f64,
        direction: BridgeDirection,
        decimals: u8,
    ) -> Amount;

    /// Resynchronizes the source network's nonce sequence.
    async fn reset_source_transaction_count(
        &self,
        direction: BridgeDirection,
    ) -> Result<(), VmError> {
        self.source_bridge_with_signer(direction).reset_transaction_count().await
    }

    /// Resynchronizes the target network's nonce sequence.
    async fn reset_target_transaction_count(
        &self,
        direction: BridgeDirection,
    ) -> Result<(), VmError> {
        self.target_bridge_with_signer(direction).reset_transaction_count().await
    }
}
