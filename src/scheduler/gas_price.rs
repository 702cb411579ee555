//! Gas price poller.
//!
//! Fetches `{fast, safeLow, average}` from the configured endpoint and
//! stores it for fee estimation. A malformed or failed response is skipped;
//! consumers keep deferring on the stale/absent price until a poll
//! succeeds.

use super::{Schedule, metrics::PricePollerMetrics};
use crate::{
    storage::{GasPriceInfo, SwapStorage},
    time::unix_time,
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, trace, warn};
use url::Url;

/// Polls the gas price endpoint on a fixed interval.
#[derive(Debug)]
pub struct GasPriceScheduler {
    storage: SwapStorage,
    client: reqwest::Client,
    endpoint: Url,
    interval: Duration,
    metrics: PricePollerMetrics,
}

impl GasPriceScheduler {
    /// Creates the poller.
    pub fn new(storage: SwapStorage, endpoint: Url, interval: Duration) -> Self {
        Self {
            storage,
            client: reqwest::Client::new(),
            endpoint,
            interval,
            metrics: PricePollerMetrics::default(),
        }
    }

    async fn fetch(&self) -> reqwest::Result<Option<GasPriceInfo>> {
        let body: Value = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let (Some(fast), Some(low), Some(average)) = (
            body.get("fast").and_then(Value::as_f64),
            body.get("safeLow").and_then(Value::as_f64),
            body.get("average").and_then(Value::as_f64),
        ) else {
            warn!("the gas price response is missing fields");
            return Ok(None);
        };

        Ok(Some(GasPriceInfo {
            symbol: "GAS".to_string(),
            fast,
            low,
            average,
            last_updated_at: unix_time(),
        }))
    }
}

#[async_trait]
impl Schedule for GasPriceScheduler {
    fn name(&self) -> &'static str {
        "gas-price"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn work(&mut self) {
        match self.fetch().await {
            Ok(Some(price)) => {
                if let Err(error) = self.storage.update_gas_price(&price).await {
                    error!(%error, "failed to save the gas price");
                } else {
                    self.metrics.updates.increment(1);
                    trace!(average = price.average, "gas price updated");
                }
            }
            Ok(None) => {}
            Err(error) => {
                self.metrics.fetch_failures.increment(1);
                warn!(%error, "failed to fetch the gas price");
            }
        }
    }
}
