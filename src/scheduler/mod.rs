//! Run-loops of the service.
//!
//! Each schedule runs on its own tokio task so a stuck RPC call on one
//! cannot stall the others: price polling keeps working even while bridge
//! processing is blocked on a dead endpoint. Shutdown is cooperative; a
//! tick that has started always runs to completion before the loop exits,
//! so a governed storage write is never abandoned half-applied.

mod metrics;

mod bridge;
pub use bridge::{BridgeIntervals, BridgeScheduler};
mod coin_price;
pub use coin_price::CoinPriceScheduler;
mod gas_price;
pub use gas_price::GasPriceScheduler;

use async_trait::async_trait;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info};

/// A unit of recurring work.
#[async_trait]
pub trait Schedule: Send + 'static {
    /// Name shown in logs.
    fn name(&self) -> &'static str;

    /// Time between ticks.
    fn interval(&self) -> Duration;

    /// One tick of work. Must not run unbounded; the loop will not observe
    /// a stop request until the tick returns.
    async fn work(&mut self);
}

/// Handle to a spawned schedule.
#[derive(Debug)]
pub struct SchedulerHandle {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Name of the schedule behind this handle.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Requests a cooperative stop. No new tick starts after this; an
    /// in-flight tick finishes normally.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Waits for the run-loop to exit.
    pub async fn stopped(self) {
        let _ = self.handle.await;
    }
}

/// Spawns a schedule on its own task.
pub fn spawn<S: Schedule>(mut schedule: S) -> SchedulerHandle {
    let name = schedule.name();
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(schedule.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => schedule.work().await,
                result = stop_rx.changed() => {
                    if result.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(scheduler = name, "scheduler stopped");
    });
    info!(scheduler = name, "scheduler started");
    SchedulerHandle { name, stop_tx, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    struct CountingSchedule {
        ticks: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Schedule for CountingSchedule {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(10)
        }

        async fn work(&mut self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn stop_prevents_further_ticks() {
        let ticks = Arc::new(AtomicU32::new(0));
        let handle = spawn(CountingSchedule { ticks: ticks.clone() });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
        handle.stopped().await;
        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop > 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }
}
