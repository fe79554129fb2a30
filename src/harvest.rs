//! Yield harvesting
//!
//! Claimed rewards are split three ways: a treasury cut, a reward-pool cut
//! forwarded to the distributor, and a remainder swapped into the vault
//! asset and reinvested. Reinvesting raises PPS without minting shares.
//!
//! Strategy losses are not special-cased: PPS always reads the strategy's
//! reported value, so a loss is borne pro-rata by every position at once.
//! Harvest compares against the PPS it last observed and reports a drop.

use crate::access::Capability;
use crate::engine::{Engine, Event};
use crate::error::{OliveError, Result};
use crate::external::{
    AccountId, AssetLedger, Collaborators, Exchange, RewardDistributor, RewardsRouter,
    YieldStrategy,
};
use crate::wad::{Rounding, Wad};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HarvestReport {
    /// Reward asset claimed (native units)
    pub claimed: u128,
    pub treasury_cut: u128,
    pub reward_cut: u128,
    /// Vault asset deposited back into the strategy (native units)
    pub reinvested: u128,
    pub pps_before: Wad,
    pub pps_after: Wad,
}

impl<C: Collaborators> Engine<C> {
    /// Keeper-only: claim, split and reinvest outstanding yield
    pub fn harvest(&mut self, caller: AccountId, now: u64) -> Result<HarvestReport> {
        self.transact(|e| {
            e.ensure_enabled()?;
            e.require(caller, Capability::Keeper)?;
            e.accrue(now)?;

            let pps_before = e.pps()?;
            if pps_before < e.vault.last_pps {
                log::warn!(
                    "strategy loss: pps fell from {} to {}",
                    e.vault.last_pps,
                    pps_before
                );
                e.emit(Event::PpsDecreased {
                    from: e.vault.last_pps,
                    to: pps_before,
                });
            }

            let claimed = e.env.claim()?;
            let mut report = HarvestReport {
                claimed,
                pps_before,
                pps_after: pps_before,
                ..HarvestReport::default()
            };
            if claimed == 0 {
                e.vault.last_pps = pps_before;
                log::debug!("harvest: nothing to claim");
                return Ok(report);
            }

            let risk = e.config.risk;
            let reward_asset = e.config.reward_asset.id;
            let treasury_cut = risk
                .treasury_cut_on_harvest
                .apply(claimed, Rounding::Down)?;
            let reward_cut = risk.reward_cut_on_harvest.apply(claimed, Rounding::Down)?;
            let mut remainder = claimed
                .checked_sub(treasury_cut)
                .and_then(|r| r.checked_sub(reward_cut))
                .ok_or(OliveError::MathOverflow)?;

            let mut to_treasury = treasury_cut;
            // No shares outstanding: the remainder goes to the treasury.
            if e.vault.total_shares == 0 {
                to_treasury += remainder;
                remainder = 0;
            }
            if to_treasury > 0 {
                e.env
                    .transfer_out(reward_asset, e.config.treasury, to_treasury)?;
            }
            if reward_cut > 0 {
                e.env
                    .transfer_out(reward_asset, e.config.reward_distributor, reward_cut)?;
                e.env.notify(reward_cut)?;
            }

            let mut reinvested = 0;
            if remainder > 0 {
                let vault_asset = e.config.vault_asset.id;
                reinvested = if reward_asset == vault_asset {
                    remainder
                } else {
                    e.env.swap(reward_asset, vault_asset, remainder)?
                };
                e.env.deposit(reinvested)?;
            }

            let pps_after = e.pps()?;
            e.vault.last_pps = pps_after;
            report.treasury_cut = to_treasury;
            report.reward_cut = reward_cut;
            report.reinvested = reinvested;
            report.pps_after = pps_after;

            log::info!(
                "harvest: claimed {}, treasury {}, rewards {}, reinvested {}, pps {} -> {}",
                claimed,
                to_treasury,
                reward_cut,
                reinvested,
                pps_before,
                pps_after
            );
            e.emit(Event::Harvested {
                claimed,
                reinvested,
                pps: pps_after,
            });
            Ok(report)
        })
    }

    /// Rewards waiting to be harvested
    pub fn claimable(&self) -> Result<u128> {
        self.env.claimable()
    }
}
