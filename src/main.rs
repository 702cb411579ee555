//! Process entry point: wires config, storage, gateways, managers and
//! schedulers together and runs until interrupted.

use clap::Parser;
use lockbox_relay::{
    config::Config,
    constants::JITTER_RANGE_SECS,
    gateway::GatewayRegistry,
    manager::{CoinBridgeManager, TokenBridgeManager},
    scheduler::{
        self, BridgeIntervals, BridgeScheduler, CoinPriceScheduler, GasPriceScheduler,
        SchedulerHandle,
    },
    storage::SwapStorage,
    tasks::{BridgeTasks, CoinBridgeTasks, TokenBridgeTasks},
};
use rand::Rng;
use sqlx::PgPool;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// The swap bridge backend.
#[derive(Debug, Parser)]
#[command(author, about = "Swap bridge backend", long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = if args.config.exists() {
        Config::load_from_file(&args.config)?
    } else {
        warn!(path = %args.config.display(), "config file not found; using defaults");
        Config::default()
    };

    let storage = match &config.database_url {
        Some(url) => SwapStorage::pg(PgPool::connect(url).await?).await?,
        None => {
            warn!("no database configured; swap state will not survive a restart");
            SwapStorage::in_memory()
        }
    };

    let registry = GatewayRegistry::new();
    let asset_symbol = config.price.asset_symbol.clone();

    let coin_tasks: Option<Arc<dyn BridgeTasks>> = if config.bridge.enabled {
        let manager = Arc::new(CoinBridgeManager::from_config(&config.bridge, &registry).await?);
        Some(Arc::new(CoinBridgeTasks::new(storage.clone(), manager, asset_symbol.clone())))
    } else {
        None
    };
    let token_tasks: Option<Arc<dyn BridgeTasks>> = if config.token_bridge.enabled {
        let manager =
            Arc::new(TokenBridgeManager::from_config(&config.token_bridge, &registry).await?);
        Some(Arc::new(TokenBridgeTasks::new(storage.clone(), manager, asset_symbol.clone())))
    } else {
        None
    };

    // One shared jitter for every interval gate in this process.
    let jitter = rand::rng().random_range(0..JITTER_RANGE_SECS);

    let mut handles: Vec<SchedulerHandle> = Vec::new();
    handles.push(scheduler::spawn(BridgeScheduler::new(
        storage.clone(),
        coin_tasks,
        token_tasks,
        BridgeIntervals::from_config(&config),
        jitter,
        Duration::from_secs(config.scheduler.bridge_tick.max(1)),
    )));
    if config.price.gas_price_enabled {
        handles.push(scheduler::spawn(GasPriceScheduler::new(
            storage.clone(),
            config.price.gas_price_endpoint.clone(),
            Duration::from_secs(config.scheduler.gas_price_interval.max(1)),
        )));
    }
    if config.price.coin_price_enabled {
        handles.push(scheduler::spawn(CoinPriceScheduler::new(
            storage.clone(),
            config.price.coin_price_endpoint.clone(),
            config.price.asset_id.clone(),
            asset_symbol,
            Duration::from_secs(config.scheduler.coin_price_interval.max(1)),
        )));
    }

    info!("swap bridge backend running");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    for handle in &handles {
        handle.stop();
    }
    for handle in handles {
        handle.stopped().await;
    }
    Ok(())
}
