//! Per-network chain access.
//!
//! A [`ChainGateway`] owns the provider and manager wallet for one network
//! and serializes transaction submission per `(network, signer address)`
//! through a mutex-guarded nonce sequence. The [`GatewayRegistry`] hands the
//! same gateway to every component using the same network and key, so two
//! bridge managers can never race each other's nonces.

use alloy::{
    consensus::TxEip1559,
    eips::Encodable2718,
    network::{Ethereum, EthereumWallet, NetworkWallet},
    primitives::{Address, B256, Bytes, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::{RpcError, TransportErrorKind, TransportResult},
};
use futures_util::lock::Mutex;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};
use url::Url;

use crate::error::VmError;

/// Errors that may occur while submitting a transaction through a gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError<TransportErrorKind>),

    /// Error occurred while signing the transaction.
    #[error(transparent)]
    Sign(#[from] alloy::signers::Error),
}

impl GatewayError {
    /// Reduces the failure to the `message`/`code` pair the task governor
    /// persists.
    pub fn to_vm_error(&self) -> VmError {
        match self {
            Self::Rpc(err) => VmError::from_transport_error(err),
            Self::Sign(err) => VmError::parse(&err.to_string()),
        }
    }
}

/// Provider, wallet and nonce sequence for one network.
#[derive(Debug)]
pub struct ChainGateway {
    network: String,
    provider: DynProvider,
    wallet: EthereumWallet,
    address: Address,
    chain_id: u64,
    /// Next nonce to use; `None` until first fetched from the chain.
    nonce: Mutex<Option<u64>>,
}

impl ChainGateway {
    /// Connects the provider, caches the chain id and logs the manager
    /// balance as a startup diagnostic.
    pub async fn connect(
        network: impl Into<String>,
        url: Url,
        signer: PrivateKeySigner,
    ) -> eyre::Result<Self> {
        let network = network.into();
        let provider = ProviderBuilder::new().connect_http(url).erased();
        let address = signer.address();
        let (chain_id, balance) =
            tokio::try_join!(provider.get_chain_id(), provider.get_balance(address))?;
        info!(network = %network, %address, chain_id, %balance, "connected manager account");
        Ok(Self {
            network,
            provider,
            wallet: EthereumWallet::new(signer),
            address,
            chain_id,
            nonce: Mutex::new(None),
        })
    }

    /// The network this gateway talks to.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The manager address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The read provider.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Takes the next nonce, initializing the sequence from the chain's
    /// pending count on first use.
    async fn next_nonce(&self) -> TransportResult<u64> {
        let mut guard = self.nonce.lock().await;
        let next = match *guard {
            Some(nonce) => nonce,
            None => self.provider.get_transaction_count(self.address).pending().await?,
        };
        *guard = Some(next + 1);
        Ok(next)
    }

    /// Resynchronizes the nonce sequence from the chain's pending count.
    ///
    /// Called after any failed submission so a rejected or dropped
    /// transaction cannot leave the sequence pointing past a gap.
    pub async fn reset_transaction_count(&self) -> TransportResult<()> {
        let mut guard = self.nonce.lock().await;
        let count = self.provider.get_transaction_count(self.address).pending().await?;
        *guard = Some(count);
        debug!(network = %self.network, nonce = count, "resynchronized transaction count");
        Ok(())
    }

    /// Signs and submits a contract call, returning the transaction hash.
    ///
    /// Returns as soon as the node accepts the raw transaction; inclusion is
    /// observed by the poll-driven box reads, never awaited here.
    pub async fn send(&self, to: Address, input: Bytes) -> Result<B256, GatewayError> {
        let request = TransactionRequest {
            from: Some(self.address),
            to: Some(to.into()),
            input: input.clone().into(),
            ..Default::default()
        };
        let gas_limit = self
            .provider
            .estimate_gas(request)
            .await?
            .saturating_mul(120)
            .saturating_div(100);
        let fees = self.provider.estimate_eip1559_fees().await?;
        let nonce = self.next_nonce().await?;

        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            to: to.into(),
            value: U256::ZERO,
            input,
            ..Default::default()
        };
        let signed =
            NetworkWallet::<Ethereum>::sign_transaction_from(&self.wallet, self.address, tx.into())
                .await?;
        let _ = self.provider.send_raw_transaction(&signed.encoded_2718()).await?;
        debug!(network = %self.network, tx_hash = %signed.tx_hash(), nonce, "submitted transaction");
        Ok(*signed.tx_hash())
    }
}

/// Shared gateways keyed by `(network, signer address)`, owned by the
/// process's dependency root.
#[derive(Debug, Default)]
pub struct GatewayRegistry {
    gateways: tokio::sync::Mutex<HashMap<(String, Address), Arc<ChainGateway>>>,
}

impl GatewayRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the gateway for `(network, signer)`, connecting it on first
    /// use. Repeated construction with the same key yields the same
    /// instance, keeping nonce sequencing serialized.
    pub async fn connect(
        &self,
        network: &str,
        url: Url,
        signer: PrivateKeySigner,
    ) -> eyre::Result<Arc<ChainGateway>> {
        let key = (network.to_string(), signer.address());
        let mut gateways = self.gateways.lock().await;
        if let Some(gateway) = gateways.get(&key) {
            return Ok(gateway.clone());
        }
        let gateway = Arc::new(ChainGateway::connect(network, url, signer).await?);
        gateways.insert(key, gateway.clone());
        Ok(gateway)
    }
}
