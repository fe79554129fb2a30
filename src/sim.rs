//! In-memory collaborators
//!
//! `SimEnv` implements every collaborator trait against plain maps: a
//! balance ledger with a single custody account, a settable price table, a
//! strategy that simply holds the managed asset, a rewards router with a
//! settable pending amount, an oracle-priced exchange, and a role registry.
//! Failures can be injected per call site to exercise atomic rollback.

use crate::access::{AccessControl, Capability, RoleRegistry};
use crate::config::EngineConfig;
use crate::error::{OliveError, Result};
use crate::external::{
    AccountId, AssetId, AssetLedger, Exchange, PriceOracle, RewardDistributor, RewardsRouter,
    YieldStrategy,
};
use crate::wad::{from_wad, mul_div, to_wad, Rounding, Wad, WAD};
use std::collections::{BTreeMap, BTreeSet};

/// Account that holds everything the engine has custody of
pub const CUSTODY: AccountId = AccountId(u64::MAX);

/// Collaborator call sites that can be told to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailPoint {
    TransferIn,
    TransferOut,
    Price,
    StrategyDeposit,
    StrategyWithdraw,
    Claim,
    Notify,
    Swap,
}

#[derive(Clone, Debug)]
pub struct SimEnv {
    balances: BTreeMap<(AssetId, AccountId), u128>,
    decimals: BTreeMap<AssetId, u8>,
    prices: BTreeMap<AssetId, Wad>,
    managed_asset: AssetId,
    strategy_holdings: u128,
    reward_asset: AssetId,
    pending_rewards: u128,
    notified_rewards: u128,
    pub roles: RoleRegistry,
    failures: BTreeSet<FailPoint>,
}

impl SimEnv {
    /// Wire up the assets named by `config`, every price at 1.0
    pub fn for_config(config: &EngineConfig, owner: AccountId) -> Self {
        let mut decimals = BTreeMap::new();
        let mut prices = BTreeMap::new();
        for asset in [config.base, config.vault_asset, config.reward_asset] {
            decimals.insert(asset.id, asset.decimals);
            prices.insert(asset.id, Wad::ONE);
        }
        Self {
            balances: BTreeMap::new(),
            decimals,
            prices,
            managed_asset: config.vault_asset.id,
            strategy_holdings: 0,
            reward_asset: config.reward_asset.id,
            pending_rewards: 0,
            notified_rewards: 0,
            roles: RoleRegistry::new(owner),
            failures: BTreeSet::new(),
        }
    }

    pub fn mint(&mut self, asset: AssetId, to: AccountId, amount: u128) {
        *self.balances.entry((asset, to)).or_insert(0) += amount;
    }

    pub fn set_price(&mut self, asset: AssetId, price: Wad) {
        self.prices.insert(asset, price);
    }

    pub fn grant(&mut self, account: AccountId, capability: Capability) {
        self.roles.grant(account, capability);
    }

    /// Queue rewards for the next `claim`
    pub fn add_rewards(&mut self, amount: u128) {
        self.pending_rewards += amount;
    }

    /// Remove managed assets from the strategy as if the venue lost them
    pub fn strategy_loss(&mut self, amount: u128) {
        self.strategy_holdings = self.strategy_holdings.saturating_sub(amount);
    }

    /// Add managed assets to the strategy as in-kind yield
    pub fn strategy_gain(&mut self, amount: u128) {
        self.strategy_holdings += amount;
    }

    pub fn strategy_holdings(&self) -> u128 {
        self.strategy_holdings
    }

    pub fn notified_rewards(&self) -> u128 {
        self.notified_rewards
    }

    pub fn fail_on(&mut self, point: FailPoint) {
        self.failures.insert(point);
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        if self.failures.contains(&point) {
            return Err(OliveError::CollaboratorFailure);
        }
        Ok(())
    }

    fn debit(&mut self, asset: AssetId, account: AccountId, amount: u128) -> Result<()> {
        let bal = self.balances.entry((asset, account)).or_insert(0);
        if *bal < amount {
            return Err(OliveError::CollaboratorFailure);
        }
        *bal -= amount;
        Ok(())
    }

    fn credit(&mut self, asset: AssetId, account: AccountId, amount: u128) {
        *self.balances.entry((asset, account)).or_insert(0) += amount;
    }

    fn decimals_of(&self, asset: AssetId) -> Result<u8> {
        self.decimals
            .get(&asset)
            .copied()
            .ok_or(OliveError::CollaboratorFailure)
    }
}

impl AssetLedger for SimEnv {
    fn transfer_in(&mut self, asset: AssetId, from: AccountId, amount: u128) -> Result<()> {
        self.check(FailPoint::TransferIn)?;
        self.debit(asset, from, amount)?;
        self.credit(asset, CUSTODY, amount);
        Ok(())
    }

    fn transfer_out(&mut self, asset: AssetId, to: AccountId, amount: u128) -> Result<()> {
        self.check(FailPoint::TransferOut)?;
        self.debit(asset, CUSTODY, amount)?;
        self.credit(asset, to, amount);
        Ok(())
    }

    fn balance_of(&self, asset: AssetId, account: AccountId) -> u128 {
        self.balances.get(&(asset, account)).copied().unwrap_or(0)
    }
}

impl PriceOracle for SimEnv {
    fn price_of(&self, asset: AssetId) -> Result<Wad> {
        self.check(FailPoint::Price)?;
        match self.prices.get(&asset) {
            Some(p) if !p.is_zero() => Ok(*p),
            _ => Err(OliveError::CollaboratorFailure),
        }
    }
}

impl YieldStrategy for SimEnv {
    fn deposit(&mut self, amount: u128) -> Result<()> {
        self.check(FailPoint::StrategyDeposit)?;
        self.debit(self.managed_asset, CUSTODY, amount)?;
        self.strategy_holdings += amount;
        Ok(())
    }

    fn withdraw(&mut self, amount: u128) -> Result<u128> {
        self.check(FailPoint::StrategyWithdraw)?;
        let out = amount.min(self.strategy_holdings);
        self.strategy_holdings -= out;
        self.credit(self.managed_asset, CUSTODY, out);
        Ok(out)
    }

    fn total_managed_value(&self) -> Result<u128> {
        Ok(self.strategy_holdings)
    }
}

impl RewardsRouter for SimEnv {
    fn claimable(&self) -> Result<u128> {
        Ok(self.pending_rewards)
    }

    fn claim(&mut self) -> Result<u128> {
        self.check(FailPoint::Claim)?;
        let out = core::mem::take(&mut self.pending_rewards);
        self.credit(self.reward_asset, CUSTODY, out);
        Ok(out)
    }
}

impl RewardDistributor for SimEnv {
    fn notify(&mut self, amount: u128) -> Result<()> {
        self.check(FailPoint::Notify)?;
        self.notified_rewards += amount;
        Ok(())
    }
}

impl Exchange for SimEnv {
    /// Fills at oracle price with unlimited depth, rounding the output down
    fn swap(&mut self, from: AssetId, to: AssetId, amount_in: u128) -> Result<u128> {
        self.check(FailPoint::Swap)?;
        if from == to {
            return Ok(amount_in);
        }
        let value = mul_div(
            to_wad(amount_in, self.decimals_of(from)?)?,
            self.price_of(from)?.raw(),
            WAD,
            Rounding::Down,
        )?;
        let out_wad = mul_div(value, WAD, self.price_of(to)?.raw(), Rounding::Down)?;
        let out = from_wad(out_wad, self.decimals_of(to)?, Rounding::Down)?;

        self.debit(from, CUSTODY, amount_in)?;
        self.credit(to, CUSTODY, out);
        Ok(out)
    }
}

impl AccessControl for SimEnv {
    fn is_authorized(&self, caller: AccountId, capability: Capability) -> bool {
        self.roles.is_authorized(caller, capability)
    }
}
