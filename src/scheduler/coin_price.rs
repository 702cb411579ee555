//! Coin price poller.
//!
//! Fetches USD/KRW prices for ETH and the bridged asset from a
//! CoinGecko-style simple-price endpoint. The exchange-rate read used by
//! fee validation divides the two KRW quotes.

use super::{Schedule, metrics::PricePollerMetrics};
use crate::{
    storage::{CoinPriceInfo, SwapStorage},
    time::unix_time,
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, trace, warn};
use url::Url;

const ETH_ID: &str = "ethereum";

/// Polls the coin price endpoint on a fixed interval.
#[derive(Debug)]
pub struct CoinPriceScheduler {
    storage: SwapStorage,
    client: reqwest::Client,
    endpoint: Url,
    /// CoinGecko id of the bridged asset; the asset row is skipped while
    /// empty.
    asset_id: String,
    /// Symbol the asset row is stored under.
    asset_symbol: String,
    interval: Duration,
    metrics: PricePollerMetrics,
}

impl CoinPriceScheduler {
    /// Creates the poller.
    pub fn new(
        storage: SwapStorage,
        endpoint: Url,
        asset_id: impl Into<String>,
        asset_symbol: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            storage,
            client: reqwest::Client::new(),
            endpoint,
            asset_id: asset_id.into(),
            asset_symbol: asset_symbol.into(),
            interval,
            metrics: PricePollerMetrics::default(),
        }
    }

    fn ids(&self) -> String {
        if self.asset_id.is_empty() {
            ETH_ID.to_string()
        } else {
            format!("{ETH_ID},{}", self.asset_id)
        }
    }

    fn row(&self, body: &Value, id: &str, symbol: &str, now: u64) -> Option<CoinPriceInfo> {
        let quote = body.get(id)?;
        Some(CoinPriceInfo {
            source: "coingecko".to_string(),
            symbol: symbol.to_string(),
            usd: quote.get("usd").and_then(Value::as_f64)?,
            krw: quote.get("krw").and_then(Value::as_f64)?,
            last_updated_at: now,
        })
    }

    async fn fetch(&self) -> reqwest::Result<Vec<CoinPriceInfo>> {
        let body: Value = self
            .client
            .get(self.endpoint.clone())
            .query(&[("ids", self.ids().as_str()), ("vs_currencies", "usd,krw")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let now = unix_time();
        let mut prices = Vec::with_capacity(2);
        match self.row(&body, ETH_ID, "ETH", now) {
            Some(price) => prices.push(price),
            None => warn!(id = ETH_ID, "the price response is missing a quote"),
        }
        if !self.asset_id.is_empty() {
            match self.row(&body, &self.asset_id, &self.asset_symbol, now) {
                Some(price) => prices.push(price),
                None => warn!(id = %self.asset_id, "the price response is missing a quote"),
            }
        }
        Ok(prices)
    }
}

#[async_trait]
impl Schedule for CoinPriceScheduler {
    fn name(&self) -> &'static str {
        "coin-price"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn work(&mut self) {
        match self.fetch().await {
            Ok(prices) if !prices.is_empty() => {
                if let Err(error) = self.storage.update_coin_prices(&prices).await {
                    error!(%error, "failed to save the coin prices");
                } else {
                    self.metrics.updates.increment(1);
                    trace!(rows = prices.len(), "coin prices updated");
                }
            }
            Ok(_) => {}
            Err(error) => {
                self.metrics.fetch_failures.increment(1);
                warn!(%error, "failed to fetch the coin prices");
            }
        }
    }
}
