//! The outer swap state machine.
//!
//! Each tick loads every non-terminal swap and dispatches the task method
//! matching its status, but only when the swap's poll interval has a new
//! period boundary between the last update and now. Deposit-phase states
//! gate on the source network's interval, withdraw-phase states on the
//! target's. One shared per-process jitter offsets both timestamps so
//! restarted deployments do not poll in lockstep.

use super::{Schedule, metrics::BridgeSchedulerMetrics};
use crate::{
    config::Config,
    storage::SwapStorage,
    tasks::BridgeTasks,
    time::unix_time,
    types::{BridgeDirection, BridgeKind, ProcessStatus, SwapRecord},
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::error;

/// Poll intervals in seconds, per asset class and network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeIntervals {
    /// Coin bridge, ethnet side.
    pub coin_ethnet: u64,
    /// Coin bridge, biznet side.
    pub coin_biznet: u64,
    /// Token bridge, ethnet side.
    pub token_ethnet: u64,
    /// Token bridge, biznet side.
    pub token_biznet: u64,
}

impl BridgeIntervals {
    /// Reads the intervals from both bridge config sections.
    pub fn from_config(config: &Config) -> Self {
        Self {
            coin_ethnet: config.bridge.ethnet_interval.max(1),
            coin_biznet: config.bridge.biznet_interval.max(1),
            token_ethnet: config.token_bridge.ethnet_interval.max(1),
            token_biznet: config.token_bridge.biznet_interval.max(1),
        }
    }

    fn ethnet(&self, kind: BridgeKind) -> u64 {
        match kind {
            BridgeKind::Coin => self.coin_ethnet,
            BridgeKind::Token => self.token_ethnet,
        }
    }

    fn biznet(&self, kind: BridgeKind) -> u64 {
        match kind {
            BridgeKind::Coin => self.coin_biznet,
            BridgeKind::Token => self.token_biznet,
        }
    }

    /// Interval of the network holding the deposit box.
    pub fn source(&self, kind: BridgeKind, direction: BridgeDirection) -> u64 {
        match direction {
            BridgeDirection::EthnetToBiznet => self.ethnet(kind),
            BridgeDirection::BiznetToEthnet => self.biznet(kind),
        }
    }

    /// Interval of the network holding the withdraw box.
    pub fn target(&self, kind: BridgeKind, direction: BridgeDirection) -> u64 {
        match direction {
            BridgeDirection::EthnetToBiznet => self.biznet(kind),
            BridgeDirection::BiznetToEthnet => self.ethnet(kind),
        }
    }
}

/// Whether a new `interval`-sized period started between the two
/// timestamps. This is what throttles a swap to at most one task
/// invocation per interval rather than one per tick.
pub(crate) fn period_elapsed(old_time: u64, new_time: u64, interval: u64) -> bool {
    old_time / interval != new_time / interval
}

/// The bridge scheduler.
#[derive(Debug)]
pub struct BridgeScheduler {
    storage: SwapStorage,
    coin_tasks: Option<Arc<dyn BridgeTasks>>,
    token_tasks: Option<Arc<dyn BridgeTasks>>,
    intervals: BridgeIntervals,
    jitter: u64,
    tick: Duration,
    metrics: BridgeSchedulerMetrics,
}

impl BridgeScheduler {
    /// Creates the scheduler. A `None` task set means swaps of that kind
    /// cannot be handled by this deployment and are marked
    /// [`ProcessStatus::ErrorInvalidSwap`].
    pub fn new(
        storage: SwapStorage,
        coin_tasks: Option<Arc<dyn BridgeTasks>>,
        token_tasks: Option<Arc<dyn BridgeTasks>>,
        intervals: BridgeIntervals,
        jitter: u64,
        tick: Duration,
    ) -> Self {
        Self {
            storage,
            coin_tasks,
            token_tasks,
            intervals,
            jitter,
            tick,
            metrics: BridgeSchedulerMetrics::default(),
        }
    }

    fn tasks_for(&self, kind: BridgeKind) -> Option<&Arc<dyn BridgeTasks>> {
        match kind {
            BridgeKind::Coin => self.coin_tasks.as_ref(),
            BridgeKind::Token => self.token_tasks.as_ref(),
        }
    }

    /// One scheduler pass over all waiting swaps.
    pub async fn run_once(&self) {
        let now = unix_time();
        let new_time_stamp = now + self.jitter;

        let swaps = match self.storage.waiting_swaps().await {
            Ok(swaps) => swaps,
            Err(error) => {
                error!(%error, "failed to load the waiting swaps");
                return;
            }
        };

        for swap in swaps {
            if let Err(error) = self.process(&swap, now, new_time_stamp).await {
                error!(id = %swap.id, %error, "failed to process the swap");
            }
        }
    }

    async fn process(
        &self,
        swap: &SwapRecord,
        now: u64,
        new_time_stamp: u64,
    ) -> Result<(), crate::storage::StorageError> {
        let Some(tasks) = self.tasks_for(swap.kind) else {
            self.metrics.invalid_swaps.increment(1);
            return self
                .storage
                .update_process_status(swap.id, ProcessStatus::ErrorInvalidSwap)
                .await;
        };

        let old_time_stamp = swap.process_update_time + self.jitter;
        let source_due = period_elapsed(
            old_time_stamp,
            new_time_stamp,
            self.intervals.source(swap.kind, swap.direction),
        );
        let target_due = period_elapsed(
            old_time_stamp,
            new_time_stamp,
            self.intervals.target(swap.kind, swap.direction),
        );

        let invoked = match swap.process_status {
            // The user opened the deposit box: confirm it opened cleanly.
            ProcessStatus::None if source_due => Some(tasks.check_deposit_is_opened(swap).await),
            // The deposit is confirmed: open the box on the target side.
            ProcessStatus::ConfirmedOpeningDeposit if target_due => {
                Some(tasks.open_withdraw(swap).await)
            }
            // The withdraw box was submitted: wait for it to appear.
            ProcessStatus::FinishedOpeningWithdraw if target_due => {
                Some(tasks.check_withdraw_is_opened(swap).await)
            }
            // Wait for the user's secret, then close the withdraw box.
            ProcessStatus::ConfirmedOpeningWithdraw if target_due => {
                Some(tasks.close_withdraw(swap).await)
            }
            // The close was submitted: wait for the box to close.
            ProcessStatus::FinishedClosingWithdraw if target_due => {
                Some(tasks.check_withdraw_is_closed(swap).await)
            }
            // The withdraw box is closed: collect the deposit.
            ProcessStatus::ConfirmedClosingWithdraw if source_due => {
                Some(tasks.close_deposit(swap).await)
            }
            // The deposit close was submitted: wait for terminal success.
            ProcessStatus::FinishedClosingDeposit if source_due => {
                Some(tasks.check_deposit_is_closed(swap).await)
            }
            // The withdraw box ran out its lock: expire it.
            ProcessStatus::StartedExpireWithdraw if target_due => {
                Some(tasks.expire_withdraw(swap).await)
            }
            // The expiry was submitted: wait for it to land.
            ProcessStatus::FinishedExpireWithdraw if target_due => {
                Some(tasks.check_withdraw_is_expired(swap).await)
            }
            _ => None,
        };

        if let Some(result) = invoked {
            self.metrics.dispatched.increment(1);
            // Refresh the gate even when the task made no progress; this is
            // what throttles attempts to once per interval.
            self.storage.update_process_time(swap.id, now).await?;
            result?;
        }
        Ok(())
    }
}

#[async_trait]
impl Schedule for BridgeScheduler {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn interval(&self) -> Duration {
        self.tick
    }

    async fn work(&mut self) {
        self.run_once().await;
    }
}
