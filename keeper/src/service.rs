//! One keeper pass: harvest, rescan health, liquidate

use crate::config::KeeperConfig;
use crate::health;
use crate::priority_queue::HealthQueue;
use olive::{AccountId, Capability, Collaborators, Engine, EngineConfig, SimEnv, Wad};
use serde::Serialize;

/// What a tick did, logged as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub now: u64,
    pub claimed: u128,
    pub reinvested: u128,
    pub pps: Option<Wad>,
    pub tracked: usize,
    pub liquidatable: usize,
    pub liquidated: Vec<AccountId>,
    pub bad_debt: u128,
    pub worst_hf: Option<Wad>,
    pub failures: usize,
    /// Engine events drained during the tick
    pub events: usize,
}

pub struct Keeper<C: Collaborators> {
    engine: Engine<C>,
    config: KeeperConfig,
    queue: HealthQueue,
}

impl<C: Collaborators> Keeper<C> {
    pub fn new(engine: Engine<C>, config: KeeperConfig) -> Self {
        Self {
            engine,
            config,
            queue: HealthQueue::new(),
        }
    }

    pub fn engine(&self) -> &Engine<C> {
        &self.engine
    }

    #[cfg(test)]
    pub fn engine_mut(&mut self) -> &mut Engine<C> {
        &mut self.engine
    }

    pub fn queue(&self) -> &HealthQueue {
        &self.queue
    }

    /// Run one pass at `now`. Failures are counted and logged, never retried.
    pub fn tick(&mut self, now: u64) -> TickSummary {
        let mut summary = self.run(now);
        for event in self.engine.take_events() {
            log::trace!("event: {:?}", event);
            summary.events += 1;
        }
        summary
    }

    fn run(&mut self, now: u64) -> TickSummary {
        let mut summary = TickSummary {
            now,
            ..TickSummary::default()
        };

        match self.engine.harvest(self.config.keeper_account, now) {
            Ok(report) => {
                summary.claimed = report.claimed;
                summary.reinvested = report.reinvested;
                summary.pps = Some(report.pps_after);
            }
            Err(e) => {
                log::error!("Harvest failed: {}", e);
                summary.failures += 1;
            }
        }

        self.refresh_queue(now);
        summary.tracked = self.queue.len();
        summary.worst_hf = self.queue.peek().map(|p| p.hf);

        let liquidatable = self.queue.get_liquidatable();
        summary.liquidatable = liquidatable.len();
        if liquidatable.is_empty() {
            log::debug!("No positions need liquidation");
            return summary;
        }
        log::info!("Found {} positions needing liquidation", liquidatable.len());

        let batch = self.config.max_liquidations_per_tick.min(liquidatable.len());
        for position in liquidatable.iter().take(batch) {
            log::info!(
                "Liquidating {} (hf: {}, debt: {})",
                position.account,
                position.hf,
                position.debt
            );
            match self.engine.liquidation(
                self.config.liquidator_account,
                position.account,
                position.debt,
                self.config.restake,
                now,
            ) {
                Ok(outcome) => {
                    summary.liquidated.push(position.account);
                    summary.bad_debt += outcome.bad_debt;
                    self.queue.remove(&position.account);
                }
                Err(e) => {
                    log::error!("Failed to liquidate {}: {}", position.account, e);
                    summary.failures += 1;
                }
            }
        }
        summary
    }

    fn refresh_queue(&mut self, now: u64) {
        let snapshot = health::snapshot(&self.engine, now);
        let open: Vec<AccountId> = snapshot.iter().map(|p| p.account).collect();
        for position in snapshot {
            log::trace!(
                "Updated {} (hf: {}, shares: {}, debt: {})",
                position.account,
                position.hf,
                position.shares,
                position.debt
            );
            self.queue.push(position);
        }
        self.queue.retain(&open);
        log::debug!("Health queue updated: {} positions tracked", self.queue.len());
    }
}

/// Engine over in-memory collaborators with the keeper's roles granted
pub fn local_engine(
    config: &KeeperConfig,
    engine_config: EngineConfig,
    now: u64,
) -> olive::Result<Engine<SimEnv>> {
    let mut env = SimEnv::for_config(&engine_config, config.owner_account);
    env.grant(config.keeper_account, Capability::Keeper);
    env.grant(config.liquidator_account, Capability::Liquidator);
    env.mint(
        engine_config.base.id,
        config.liquidator_account,
        u128::from(config.liquidator_float),
    );
    Engine::new(engine_config, env, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use olive::WAD;

    const E6: u128 = 1_000_000;
    const ALICE: AccountId = AccountId(10);
    const BOB: AccountId = AccountId(11);

    fn keeper() -> Keeper<SimEnv> {
        let config = KeeperConfig::default_local();
        let engine_config = EngineConfig::default_local();
        let mut engine = local_engine(&config, engine_config.clone(), 0).unwrap();
        for who in [ALICE, BOB] {
            engine
                .env_mut()
                .mint(engine_config.base.id, who, 100_000 * E6);
            engine
                .env_mut()
                .mint(engine_config.vault_asset.id, who, 100_000 * WAD);
        }
        engine.supply(BOB, 10_000 * E6, 0).unwrap();
        engine
            .deposit(ALICE, 100 * WAD, Wad::from_int(5), 0, 0, 0)
            .unwrap();
        engine
            .deposit(BOB, 100 * WAD, Wad::from_int(2), 0, 0, 0)
            .unwrap();
        Keeper::new(engine, config)
    }

    #[test]
    fn test_tick_with_healthy_positions() {
        let mut k = keeper();
        k.engine_mut().env_mut().add_rewards(10 * WAD);

        let summary = k.tick(0);
        assert_eq!(summary.claimed, 10 * WAD);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.tracked, 2);
        assert_eq!(summary.liquidatable, 0);
        assert!(summary.liquidated.is_empty());
    }

    #[test]
    fn test_tick_liquidates_unhealthy_position() {
        let mut k = keeper();
        let vault_asset = k.engine().config().vault_asset.id;
        k.engine_mut()
            .env_mut()
            .set_price(vault_asset, Wad::from_bps(8_500));

        let summary = k.tick(0);
        assert_eq!(summary.liquidatable, 1);
        assert_eq!(summary.liquidated, vec![ALICE]);
        assert_eq!(summary.bad_debt, 0);
        assert_eq!(k.engine().debt_of(ALICE, 0).unwrap(), 0);
        assert!(k.queue().get_liquidatable().is_empty());
        assert!(summary.events > 0);
        assert!(k.engine().events().is_empty());

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"liquidated\":[10]"));
    }

    #[test]
    fn test_failed_liquidation_is_counted() {
        let mut k = keeper();
        let vault_asset = k.engine().config().vault_asset.id;
        k.engine_mut()
            .env_mut()
            .set_price(vault_asset, Wad::from_bps(8_500));
        k.engine_mut()
            .env_mut()
            .fail_on(olive::FailPoint::StrategyWithdraw);

        let summary = k.tick(0);
        assert_eq!(summary.liquidatable, 1);
        assert!(summary.liquidated.is_empty());
        assert_eq!(summary.failures, 1);
        assert_eq!(k.queue().get_liquidatable().len(), 1);
    }
}
