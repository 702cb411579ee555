use super::{BridgeManager, GasUsage, estimate_tx_fee};
use crate::{
    amount::Amount,
    config::BridgeConfig,
    contracts::{CoinBridge, LockBoxContract, LockBoxReader},
    gateway::GatewayRegistry,
    types::BridgeDirection,
};
use alloy::{primitives::U256, signers::local::PrivateKeySigner};
use eyre::Context;
use std::sync::Arc;
use tracing::info;

/// Contract manager for the coin bridge: the ERC20 representation on ethnet
/// against the native coin on biznet.
#[derive(Debug)]
pub struct CoinBridgeManager {
    bridge_ethnet: Arc<dyn LockBoxContract>,
    bridge_biznet: Arc<dyn LockBoxContract>,
    /// Flat swap fee in whole display units.
    fee: u64,
    gas_usage: GasUsage,
}

impl CoinBridgeManager {
    /// Builds the manager from explicit contract handles.
    pub fn new(
        bridge_ethnet: Arc<dyn LockBoxContract>,
        bridge_biznet: Arc<dyn LockBoxContract>,
        fee: u64,
        gas_usage: GasUsage,
    ) -> Self {
        Self { bridge_ethnet, bridge_biznet, fee, gas_usage }
    }

    /// Connects both networks' gateways through the registry and binds the
    /// configured contract addresses. Performs live RPC calls; failures are
    /// fatal and expected to abort startup.
    pub async fn from_config(
        config: &BridgeConfig,
        registry: &GatewayRegistry,
    ) -> eyre::Result<Self> {
        let signer: PrivateKeySigner =
            config.manager_key.parse().wrap_err("invalid coin bridge manager key")?;
        let ethnet =
            registry.connect("ethnet", config.ethnet_rpc.clone(), signer.clone()).await?;
        let biznet = registry.connect("biznet", config.biznet_rpc.clone(), signer).await?;
        info!(
            ethnet_bridge = %config.bridge_ethnet_address,
            biznet_bridge = %config.bridge_biznet_address,
            "coin bridge contracts bound"
        );
        Ok(Self::new(
            Arc::new(CoinBridge::new(config.bridge_ethnet_address, ethnet)),
            Arc::new(CoinBridge::new(config.bridge_biznet_address, biznet)),
            config.fee,
            GasUsage::from(config),
        ))
    }
}

#[async_trait::async_trait]
impl BridgeManager for CoinBridgeManager {
    fn source_bridge(&self, direction: BridgeDirection) -> Arc<dyn LockBoxReader> {
        match direction {
            BridgeDirection::EthnetToBiznet => self.bridge_ethnet.clone(),
            BridgeDirection::BiznetToEthnet => self.bridge_biznet.clone(),
        }
    }

    fn target_bridge(&self, direction: BridgeDirection) -> Arc<dyn LockBoxReader> {
        match direction {
            BridgeDirection::EthnetToBiznet => self.bridge_biznet.clone(),
            BridgeDirection::BiznetToEthnet => self.bridge_ethnet.clone(),
        }
    }

    fn source_bridge_with_signer(&self, direction: BridgeDirection) -> Arc<dyn LockBoxContract> {
        match direction {
            BridgeDirection::EthnetToBiznet => self.bridge_ethnet.clone(),
            BridgeDirection::BiznetToEthnet => self.bridge_biznet.clone(),
        }
    }

    fn target_bridge_with_signer(&self, direction: BridgeDirection) -> Arc<dyn LockBoxContract> {
        match direction {
            BridgeDirection::EthnetToBiznet => self.bridge_biznet.clone(),
            BridgeDirection::BiznetToEthnet => self.bridge_ethnet.clone(),
        }
    }

    fn swap_fee(&self, _amount: U256, decimals: u8) -> Amount {
        Amount::from_integer(self.fee, decimals)
    }

    fn estimated_tx_fee(
        &self,
        gas_price: f64,
        eth_asset_rate: f64,
        direction: BridgeDirection,
        decimals: u8,
    ) -> Amount {
        estimate_tx_fee(self.gas_usage.for_direction(direction), gas_price, eth_asset_rate, decimals)
    }
}
