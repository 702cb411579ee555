use super::{BridgeManager, GasUsage, estimate_tx_fee};
use crate::{
    amount::Amount,
    config::TokenBridgeConfig,
    contracts::{IERC20, LockBoxContract, LockBoxReader, TokenBridge},
    gateway::GatewayRegistry,
    types::{BridgeDirection, TokenId},
};
use alloy::{
    primitives::{Address, U256},
    providers::DynProvider,
    signers::local::PrivateKeySigner,
};
use eyre::Context;
use std::sync::Arc;
use tracing::info;

/// One side of a registered token pair, with the on-chain metadata fetched
/// at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Bridge contract the token is registered with.
    pub bridge_address: Address,
    /// ERC20 contract address.
    pub token_address: Address,
    /// ERC20 symbol.
    pub symbol: String,
    /// ERC20 decimal precision; the rebasing basis for this side.
    pub decimals: u8,
    /// Id the bridge contracts key this token under.
    pub token_id: TokenId,
}

impl Token {
    /// Builds a token from already-known metadata.
    pub fn new(
        bridge_address: Address,
        token_address: Address,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            bridge_address,
            token_address,
            symbol: symbol.into(),
            decimals,
            token_id: TokenId::derive(bridge_address, token_address),
        }
    }

    /// Fetches the token's metadata from its contract.
    pub async fn fetch(
        bridge_address: Address,
        token_address: Address,
        provider: &DynProvider,
    ) -> eyre::Result<Self> {
        let erc20 = IERC20::new(token_address, provider.clone());
        let decimals_call = erc20.decimals();
        let symbol_call = erc20.symbol();
        let (decimals, symbol) = tokio::try_join!(decimals_call.call(), symbol_call.call())
            .wrap_err_with(|| format!("failed to read token metadata at {token_address}"))?;
        Ok(Self::new(bridge_address, token_address, symbol, decimals))
    }
}

/// A token registered on both networks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// The ethnet side.
    pub ethnet: Token,
    /// The biznet side.
    pub biznet: Token,
}

impl TokenPair {
    /// The side holding the deposit box for the given direction.
    pub fn source(&self, direction: BridgeDirection) -> &Token {
        match direction {
            BridgeDirection::EthnetToBiznet => &self.ethnet,
            BridgeDirection::BiznetToEthnet => &self.biznet,
        }
    }

    /// The side holding the withdraw box for the given direction.
    pub fn target(&self, direction: BridgeDirection) -> &Token {
        match direction {
            BridgeDirection::EthnetToBiznet => &self.biznet,
            BridgeDirection::BiznetToEthnet => &self.ethnet,
        }
    }
}

/// Contract manager for the token bridge.
///
/// The token bridge charges no swap fee; its revenue model is the gas
/// reimbursement alone.
#[derive(Debug)]
pub struct TokenBridgeManager {
    bridge_ethnet: Arc<dyn LockBoxContract>,
    bridge_biznet: Arc<dyn LockBoxContract>,
    tokens: Vec<TokenPair>,
    gas_usage: GasUsage,
}

impl TokenBridgeManager {
    /// Builds the manager from explicit contract handles and prebuilt
    /// token pairs.
    pub fn new(
        bridge_ethnet: Arc<dyn LockBoxContract>,
        bridge_biznet: Arc<dyn LockBoxContract>,
        tokens: Vec<TokenPair>,
        gas_usage: GasUsage,
    ) -> Self {
        Self { bridge_ethnet, bridge_biznet, tokens, gas_usage }
    }

    /// Connects both networks' gateways through the registry, binds the
    /// bridge contracts and fetches every registered token's metadata.
    /// Performs live RPC calls; failures are fatal and expected to abort
    /// startup.
    pub async fn from_config(
        config: &TokenBridgeConfig,
        registry: &GatewayRegistry,
    ) -> eyre::Result<Self> {
        let signer: PrivateKeySigner =
            config.manager_key.parse().wrap_err("invalid token bridge manager key")?;
        let ethnet =
            registry.connect("ethnet", config.ethnet_rpc.clone(), signer.clone()).await?;
        let biznet = registry.connect("biznet", config.biznet_rpc.clone(), signer).await?;

        let mut tokens = Vec::with_capacity(config.token_addresses.len());
        for pair in &config.token_addresses {
            let pair = TokenPair {
                ethnet: Token::fetch(
                    config.bridge_ethnet_address,
                    pair.ethnet,
                    ethnet.provider(),
                )
                .await?,
                biznet: Token::fetch(
                    config.bridge_biznet_address,
                    pair.biznet,
                    biznet.provider(),
                )
                .await?,
            };
            info!(
                symbol = %pair.ethnet.symbol,
                ethnet_token = %pair.ethnet.token_address,
                ethnet_token_id = %pair.ethnet.token_id,
                biznet_token = %pair.biznet.token_address,
                biznet_token_id = %pair.biznet.token_id,
                "registered token pair"
            );
            tokens.push(pair);
        }

        Ok(Self::new(
            Arc::new(TokenBridge::new(config.bridge_ethnet_address, ethnet)),
            Arc::new(TokenBridge::new(config.bridge_biznet_address, biznet)),
            tokens,
            GasUsage::from(config),
        ))
    }

    /// The pair whose source-side token id matches.
    pub fn source_token_pair(
        &self,
        direction: BridgeDirection,
        token_id: TokenId,
    ) -> Option<&TokenPair> {
        self.tokens.iter().find(|pair| pair.source(direction).token_id == token_id)
    }

    /// The pair whose target-side token id matches.
    pub fn target_token_pair(
        &self,
        direction: BridgeDirection,
        token_id: TokenId,
    ) -> Option<&TokenPair> {
        self.tokens.iter().find(|pair| pair.target(direction).token_id == token_id)
    }

    /// The source-side token with the given id.
    pub fn source_token(&self, direction: BridgeDirection, token_id: TokenId) -> Option<&Token> {
        self.source_token_pair(direction, token_id).map(|pair| pair.source(direction))
    }

    /// The target-side token with the given id.
    pub fn target_token(&self, direction: BridgeDirection, token_id: TokenId) -> Option<&Token> {
        self.target_token_pair(direction, token_id).map(|pair| pair.target(direction))
    }

    /// The target-side partner of the source token with the given id.
    pub fn target_token_by_source(
        &self,
        direction: BridgeDirection,
        token_id: TokenId,
    ) -> Option<&Token> {
        self.source_token_pair(direction, token_id).map(|pair| pair.target(direction))
    }
}

#[async_trait::async_trait]
impl BridgeManager for TokenBridgeManager {
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
        Amount::new(U256::ZERO, decimals)
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
