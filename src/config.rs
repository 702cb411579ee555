//! Service configuration.
//!
//! Loaded from a YAML file; every section has deployable defaults so a
//! config file only needs to override what differs. Manager keys are
//! expected in decrypted form (key decryption happens before the service is
//! handed its config).

use alloy::primitives::Address;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Coin bridge section.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Token bridge section.
    #[serde(default)]
    pub token_bridge: TokenBridgeConfig,
    /// Price and gas polling section.
    #[serde(default)]
    pub price: PriceConfig,
    /// Scheduler cadence section.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Postgres connection string; the in-memory backend is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Settings shared by both bridge sections: endpoints, contract addresses,
/// poll intervals, and the per-operation average gas usage the fee estimate
/// is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Whether the coin bridge scheduler handles swaps of this class.
    pub enabled: bool,
    /// JSON-RPC endpoint of ethnet.
    pub ethnet_rpc: Url,
    /// JSON-RPC endpoint of biznet.
    pub biznet_rpc: Url,
    /// Bridge contract address on ethnet.
    pub bridge_ethnet_address: Address,
    /// Bridge contract address on biznet.
    pub bridge_biznet_address: Address,
    /// Seconds between polls of a swap's ethnet-side state.
    pub ethnet_interval: u64,
    /// Seconds between polls of a swap's biznet-side state.
    pub biznet_interval: u64,
    /// Average gas used opening a deposit box.
    pub gas_usage_open_deposit: u64,
    /// Average gas used closing a deposit box.
    pub gas_usage_close_deposit: u64,
    /// Average gas used opening a withdraw box.
    pub gas_usage_open_withdraw: u64,
    /// Average gas used closing a withdraw box.
    pub gas_usage_close_withdraw: u64,
    /// Flat swap fee in whole display units of the deposit asset.
    pub fee: u64,
    /// Hex-encoded private key of the manager account.
    pub manager_key: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ethnet_rpc: default_rpc(),
            biznet_rpc: default_rpc(),
            bridge_ethnet_address: Address::ZERO,
            bridge_biznet_address: Address::ZERO,
            ethnet_interval: 5,
            biznet_interval: 5,
            gas_usage_open_deposit: 213_968,
            gas_usage_close_deposit: 79_238,
            gas_usage_open_withdraw: 197_145,
            gas_usage_close_withdraw: 111_016,
            fee: 30,
            manager_key: String::new(),
        }
    }
}

/// Token bridge settings: the coin bridge fields minus the flat fee (the
/// token bridge charges no swap fee) plus the registered token pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenBridgeConfig {
    /// Whether the token bridge scheduler handles swaps of this class.
    pub enabled: bool,
    /// JSON-RPC endpoint of ethnet.
    pub ethnet_rpc: Url,
    /// JSON-RPC endpoint of biznet.
    pub biznet_rpc: Url,
    /// Bridge contract address on ethnet.
    pub bridge_ethnet_address: Address,
    /// Bridge contract address on biznet.
    pub bridge_biznet_address: Address,
    /// Seconds between polls of a swap's ethnet-side state.
    pub ethnet_interval: u64,
    /// Seconds between polls of a swap's biznet-side state.
    pub biznet_interval: u64,
    /// Average gas used opening a deposit box.
    pub gas_usage_open_deposit: u64,
    /// Average gas used closing a deposit box.
    pub gas_usage_close_deposit: u64,
    /// Average gas used opening a withdraw box.
    pub gas_usage_open_withdraw: u64,
    /// Average gas used closing a withdraw box.
    pub gas_usage_close_withdraw: u64,
    /// Hex-encoded private key of the manager account.
    pub manager_key: String,
    /// ERC20 pairs served by the token bridge, one contract per network.
    pub token_addresses: Vec<TokenPairConfig>,
}

impl Default for TokenBridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ethnet_rpc: default_rpc(),
            biznet_rpc: default_rpc(),
            bridge_ethnet_address: Address::ZERO,
            bridge_biznet_address: Address::ZERO,
            ethnet_interval: 5,
            biznet_interval: 5,
            gas_usage_open_deposit: 213_968,
            gas_usage_close_deposit: 79_238,
            gas_usage_open_withdraw: 197_145,
            gas_usage_close_withdraw: 111_016,
            manager_key: String::new(),
            token_addresses: Vec::new(),
        }
    }
}

/// One registered ERC20 pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairConfig {
    /// Token contract on ethnet.
    pub ethnet: Address,
    /// Token contract on biznet.
    pub biznet: Address,
}

/// Price and gas polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    /// Whether the gas price poller runs.
    pub gas_price_enabled: bool,
    /// Endpoint reporting `{fast, safeLow, average}` gas prices.
    pub gas_price_endpoint: Url,
    /// Whether the coin price poller runs.
    pub coin_price_enabled: bool,
    /// CoinGecko-style simple-price endpoint.
    pub coin_price_endpoint: Url,
    /// CoinGecko id of the bridged asset; the asset leg of the poll is
    /// skipped while this is empty.
    pub asset_id: String,
    /// Symbol under which the bridged asset's price rows are stored.
    pub asset_symbol: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            gas_price_enabled: true,
            gas_price_endpoint: "https://ethgasstation.info/json/ethgasAPI.json"
                .parse()
                .expect("static url"),
            coin_price_enabled: true,
            coin_price_endpoint: "https://api.coingecko.com/api/v3/simple/price"
                .parse()
                .expect("static url"),
            asset_id: String::new(),
            asset_symbol: "COIN".to_string(),
        }
    }
}

/// Scheduler cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between bridge scheduler ticks; per-swap work is further
    /// gated by the per-network intervals.
    pub bridge_tick: u64,
    /// Seconds between gas price updates.
    pub gas_price_interval: u64,
    /// Seconds between coin price updates.
    pub coin_price_interval: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { bridge_tick: 1, gas_price_interval: 15, coin_price_interval: 15 }
    }
}

fn default_rpc() -> Url {
    "http://127.0.0.1:8545".parse().expect("static url")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.bridge.fee, 30);
        assert_eq!(parsed.bridge.gas_usage_close_deposit, 79_238);
        assert_eq!(parsed.scheduler.gas_price_interval, 15);
        assert!(parsed.database_url.is_none());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r#"
bridge:
  ethnet_interval: 10
  fee: 5
token_bridge:
  enabled: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bridge.ethnet_interval, 10);
        assert_eq!(config.bridge.fee, 5);
        assert_eq!(config.bridge.biznet_interval, 5);
        assert!(!config.token_bridge.enabled);
        assert!(config.price.gas_price_enabled);
    }
}
