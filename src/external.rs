//! Collaborator contracts consumed by the engine
//!
//! The engine never moves value itself: it asks these narrow traits to do
//! it. All calls return the crate `Result` so a collaborator failure aborts
//! the surrounding transaction.

use crate::access::AccessControl;
use crate::error::Result;
use crate::wad::Wad;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account identifier. `0` is the null account.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    pub const NULL: AccountId = AccountId(0);

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AssetId(pub u32);

/// Fungible asset transfer primitive. Amounts are in the asset's native units.
pub trait AssetLedger {
    /// Pull `amount` from `from` into engine custody
    fn transfer_in(&mut self, asset: AssetId, from: AccountId, amount: u128) -> Result<()>;
    /// Pay `amount` out of engine custody to `to`
    fn transfer_out(&mut self, asset: AssetId, to: AccountId, amount: u128) -> Result<()>;
    fn balance_of(&self, asset: AssetId, account: AccountId) -> u128;
}

pub trait PriceOracle {
    /// Value of one whole unit of `asset` in the common unit
    fn price_of(&self, asset: AssetId) -> Result<Wad>;
}

/// External yield venue holding the vault asset
pub trait YieldStrategy {
    /// Move `amount` of the managed asset from custody into the strategy
    fn deposit(&mut self, amount: u128) -> Result<()>;
    /// Return up to `amount` to custody, yielding what was actually returned
    fn withdraw(&mut self, amount: u128) -> Result<u128>;
    /// Managed asset held on the vault's behalf, native units
    fn total_managed_value(&self) -> Result<u128>;
}

pub trait RewardsRouter {
    fn claimable(&self) -> Result<u128>;
    /// Claim outstanding rewards into custody
    fn claim(&mut self) -> Result<u128>;
}

/// Vesting/staking module that receives the reward-pool cut of a harvest
pub trait RewardDistributor {
    fn notify(&mut self, amount: u128) -> Result<()>;
}

/// Swap venue used when rebalancing leverage and reinvesting rewards
pub trait Exchange {
    /// Swap `amount_in` of `from` held in custody into `to`, returning the output
    fn swap(&mut self, from: AssetId, to: AssetId, amount_in: u128) -> Result<u128>;
}

/// Everything the engine is wired to at construction
pub trait Collaborators:
    AssetLedger
    + PriceOracle
    + YieldStrategy
    + RewardsRouter
    + RewardDistributor
    + Exchange
    + AccessControl
    + Clone
{
}

impl<T> Collaborators for T where
    T: AssetLedger
        + PriceOracle
        + YieldStrategy
        + RewardsRouter
        + RewardDistributor
        + Exchange
        + AccessControl
        + Clone
{
}
