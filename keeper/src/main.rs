//! Olive Keeper
//!
//! Off-chain operator service that periodically harvests strategy yield and
//! liquidates vault positions whose health factor has fallen below one.
//!
//! The binary is a local simulation harness: it drives an in-process engine
//! over `SimEnv` that starts empty, with only the keeper roles granted and
//! the liquidator float minted. The tick logic in `service` is generic over
//! `Collaborators` and is exercised against populated engines in its tests.

mod config;
mod health;
mod priority_queue;
mod service;

use anyhow::{Context, Result};
use config::KeeperConfig;
use service::Keeper;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Olive keeper");

    let config = KeeperConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({}), using local defaults", e);
        KeeperConfig::default_local()
    });
    let engine_config = config
        .engine_config()
        .context("Failed to load engine config")?;

    let engine = service::local_engine(&config, engine_config, unix_now()?)
        .context("Failed to initialise engine")?;
    log::info!(
        "Keeper {} / liquidator {}, polling every {}s",
        config.keeper_account,
        config.liquidator_account,
        config.poll_interval_secs
    );

    let mut keeper = Keeper::new(engine, config.clone());
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let summary = keeper.tick(unix_now()?);
                match serde_json::to_string(&summary) {
                    Ok(json) => log::info!("tick {}", json),
                    Err(e) => log::warn!("Failed to encode tick summary: {}", e),
                }
                if !keeper.queue().is_empty() {
                    if let Some(worst) = keeper.queue().peek() {
                        log::debug!("Worst health: {} ({})", worst.hf, worst.account);
                    }
                }
                if let Ok(u) = keeper.engine().utilization(summary.now) {
                    log::debug!("Pool utilization: {}", u);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?
        .as_secs())
}
