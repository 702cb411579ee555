use metrics::Counter;
use metrics_derive::Metrics;

/// Metrics for the [`BridgeScheduler`](super::BridgeScheduler).
#[derive(Metrics)]
#[metrics(scope = "bridge_scheduler")]
pub(crate) struct BridgeSchedulerMetrics {
    /// Number of task invocations dispatched.
    pub dispatched: Counter,
    /// Number of swaps marked invalid for lacking a task implementation.
    pub invalid_swaps: Counter,
}

/// Metrics shared by the price pollers.
#[derive(Metrics)]
#[metrics(scope = "price_poller")]
pub(crate) struct PricePollerMetrics {
    /// Number of successful price updates written to storage.
    pub updates: Counter,
    /// Number of failed fetches.
    pub fetch_failures: Counter,
}
