//! Leveraged vault
//!
//! Position shares are 18-decimal claims on the strategy's managed asset.
//! An account's debt lives in the pool under the same `AccountId`. Leverage
//! is exposure over equity, both valued through the oracle:
//!
//! ```text
//! P = shares * pps * price(vault asset)
//! D = owed * price(base)
//! leverage = P / (P - D)
//! hf = P * threshold / D          (MAX when D == 0)
//! ```

use crate::engine::{Engine, Event};
use crate::error::{OliveError, Result};
use crate::external::{
    AccountId, AssetLedger, Collaborators, Exchange, PriceOracle, YieldStrategy,
};
use crate::wad::{from_wad, mul_div, to_wad, Rounding, Wad, WAD};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VaultState {
    pub total_shares: u128,
    positions: BTreeMap<AccountId, u128>,
    /// PPS observed by the last harvest
    pub last_pps: Wad,
    last_action: BTreeMap<AccountId, u64>,
}

impl Default for VaultState {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultState {
    pub fn new() -> Self {
        Self {
            total_shares: 0,
            positions: BTreeMap::new(),
            last_pps: Wad::ONE,
            last_action: BTreeMap::new(),
        }
    }

    pub fn shares_of(&self, account: AccountId) -> u128 {
        self.positions.get(&account).copied().unwrap_or(0)
    }

    pub fn positions(&self) -> impl Iterator<Item = (AccountId, u128)> + '_ {
        self.positions.iter().map(|(a, s)| (*a, *s))
    }

    pub(crate) fn mint(&mut self, account: AccountId, shares: u128) -> Result<()> {
        if shares == 0 {
            return Ok(());
        }
        let held = self.shares_of(account);
        let total = self
            .total_shares
            .checked_add(shares)
            .ok_or(OliveError::MathOverflow)?;
        self.positions.insert(account, held + shares);
        self.total_shares = total;
        Ok(())
    }

    pub(crate) fn burn(&mut self, account: AccountId, shares: u128) -> Result<()> {
        let held = self.shares_of(account);
        let left = held
            .checked_sub(shares)
            .ok_or(OliveError::InsufficientShares)?;
        if left == 0 {
            self.positions.remove(&account);
        } else {
            self.positions.insert(account, left);
        }
        self.total_shares -= shares;
        Ok(())
    }

    pub(crate) fn move_shares(&mut self, from: AccountId, to: AccountId, shares: u128) -> Result<()> {
        self.burn(from, shares)?;
        self.mint(to, shares)
    }

    pub(crate) fn last_action_of(&self, account: AccountId) -> Option<u64> {
        self.last_action.get(&account).copied()
    }

    /// Only same-timestamp entries matter to the guard; older ones are dropped
    pub(crate) fn record_action(&mut self, account: AccountId, now: u64) {
        self.last_action.retain(|_, at| *at >= now);
        self.last_action.insert(account, now);
    }
}

/// PPS and oracle prices captured once at the start of an operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Valuation {
    pub pps: Wad,
    pub vault_price: Wad,
    pub base_price: Wad,
    vault_decimals: u8,
    base_decimals: u8,
}

impl Valuation {
    /// Vault asset (18 decimals) backing `shares`
    pub fn assets_for(&self, shares: u128) -> Result<u128> {
        self.pps.apply(shares, Rounding::Down)
    }

    /// Common-unit value of `shares`
    pub fn position_value(&self, shares: u128) -> Result<u128> {
        self.vault_price
            .apply(self.assets_for(shares)?, Rounding::Down)
    }

    /// Common-unit value of `owed` base (native units), rounded against the debtor
    pub fn debt_value(&self, owed: u128) -> Result<u128> {
        self.base_price
            .apply(to_wad(owed, self.base_decimals)?, Rounding::Up)
    }

    /// Common-unit value of one whole position share
    pub fn share_price(&self) -> Result<Wad> {
        self.pps.mul(self.vault_price, Rounding::Down)
    }

    /// Base asset (native units) worth `value`
    pub fn base_for_value(&self, value: u128, rounding: Rounding) -> Result<u128> {
        let wad = mul_div(value, WAD, self.base_price.raw(), rounding)?;
        from_wad(wad, self.base_decimals, rounding)
    }

    /// Position shares worth `value`
    pub fn shares_for_value(&self, value: u128, rounding: Rounding) -> Result<u128> {
        let price = self.share_price()?;
        if price.is_zero() {
            return Err(OliveError::HealthFactorViolation);
        }
        mul_div(value, WAD, price.raw(), rounding)
    }

    pub fn health(&self, shares: u128, owed: u128, threshold: Wad) -> Result<Wad> {
        if owed == 0 {
            return Ok(Wad::MAX);
        }
        let debt = self.debt_value(owed)?;
        let position = self.position_value(shares)?;
        mul_div(position, threshold.raw(), debt, Rounding::Down).map(Wad)
    }

    /// Exposure over equity; MAX once debt has eaten all equity
    pub fn leverage(&self, shares: u128, owed: u128) -> Result<Wad> {
        let position = self.position_value(shares)?;
        let debt = self.debt_value(owed)?;
        if position == 0 || owed == 0 {
            return Ok(Wad::ONE);
        }
        if debt >= position {
            return Ok(Wad::MAX);
        }
        Wad::from_ratio(position, position - debt)
    }

    /// Shares that must stay in place for the debt to remain at the threshold
    pub fn required_shares(&self, owed: u128, threshold: Wad) -> Result<u128> {
        if owed == 0 {
            return Ok(0);
        }
        let backing = mul_div(self.debt_value(owed)?, WAD, threshold.raw(), Rounding::Up)?;
        self.shares_for_value(backing, Rounding::Up)
    }
}

/// Net effect of moving a position to a target leverage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Rebalance {
    pub minted: u128,
    pub burned: u128,
    pub borrowed: u128,
    pub repaid: u128,
}

impl<C: Collaborators> Engine<C> {
    // ── Views ──

    /// Managed vault asset per position share; 1.0 with no shares outstanding
    pub fn pps(&self) -> Result<Wad> {
        if self.vault.total_shares == 0 {
            return Ok(Wad::ONE);
        }
        let managed = to_wad(
            self.env.total_managed_value()?,
            self.config.vault_asset.decimals,
        )?;
        Wad::from_ratio(managed, self.vault.total_shares)
    }

    pub fn valuation(&self) -> Result<Valuation> {
        Ok(Valuation {
            pps: self.pps()?,
            vault_price: self.env.price_of(self.config.vault_asset.id)?,
            base_price: self.env.price_of(self.config.base.id)?,
            vault_decimals: self.config.vault_asset.decimals,
            base_decimals: self.config.base.decimals,
        })
    }

    pub fn position_shares_of(&self, account: AccountId) -> u128 {
        self.vault.shares_of(account)
    }

    /// Vault asset (native units) redeemable for the account's shares
    pub fn position_of(&self, account: AccountId) -> Result<u128> {
        let assets = self.pps()?.apply(self.vault.shares_of(account), Rounding::Down)?;
        from_wad(assets, self.config.vault_asset.decimals, Rounding::Down)
    }

    /// Health factor from live prices and debt accrued to `now`
    pub fn hf(&self, account: AccountId, now: u64) -> Result<Wad> {
        let owed = self.pool_at(now)?.debt_of(account)?;
        self.valuation()?.health(
            self.vault.shares_of(account),
            owed,
            self.config.risk.liquidation_threshold,
        )
    }

    pub fn get_leverage(&self, account: AccountId, now: u64) -> Result<Wad> {
        let owed = self.pool_at(now)?.debt_of(account)?;
        self.valuation()?
            .leverage(self.vault.shares_of(account), owed)
    }

    /// Shares the account can withdraw while keeping hf >= 1
    pub fn burnable_shares(&self, account: AccountId, now: u64) -> Result<u128> {
        let owed = self.pool_at(now)?.debt_of(account)?;
        let shares = self.vault.shares_of(account);
        let required = match self
            .valuation()?
            .required_shares(owed, self.config.risk.liquidation_threshold)
        {
            Ok(r) => r,
            Err(OliveError::HealthFactorViolation) => shares,
            Err(e) => return Err(e),
        };
        Ok(shares.saturating_sub(required))
    }

    // ── Internal helpers (pool already accrued) ──

    pub(crate) fn health_now(&self, account: AccountId) -> Result<Wad> {
        let owed = self.pool.debt_of(account)?;
        self.valuation()?.health(
            self.vault.shares_of(account),
            owed,
            self.config.risk.liquidation_threshold,
        )
    }

    pub(crate) fn ensure_healthy(&self, account: AccountId) -> Result<()> {
        if self.health_now(account)? < Wad::ONE {
            return Err(OliveError::HealthFactorViolation);
        }
        Ok(())
    }

    fn check_leverage_bounds(&self, leverage: Wad) -> Result<()> {
        let risk = &self.config.risk;
        if leverage < risk.min_leverage || leverage > risk.max_leverage {
            return Err(OliveError::InvalidArgument);
        }
        Ok(())
    }

    fn current_leverage(&self, account: AccountId) -> Result<Wad> {
        let owed = self.pool.debt_of(account)?;
        self.valuation()?
            .leverage(self.vault.shares_of(account), owed)
    }

    /// Borrow-and-buy or sell-and-repay until exposure = equity * target
    fn rebalance(&mut self, account: AccountId, target: Wad) -> Result<Rebalance> {
        let base = self.config.base;
        let vault_asset = self.config.vault_asset;
        let v = self.valuation()?;
        let shares = self.vault.shares_of(account);
        let owed = self.pool.debt_of(account)?;

        let position = v.position_value(shares)?;
        let debt = v.debt_value(owed)?;
        if owed > 0 && debt >= position {
            return Err(OliveError::HealthFactorViolation);
        }
        let equity = position - debt;
        let exposure = target.apply(equity, Rounding::Down)?;

        let mut step = Rebalance::default();
        if exposure > position {
            let borrow = v.base_for_value(exposure - position, Rounding::Down)?;
            if borrow == 0 {
                return Ok(step);
            }
            self.pool.open_debt(account, borrow)?;
            let bought = self.env.swap(base.id, vault_asset.id, borrow)?;
            self.env.deposit(bought)?;
            let minted = mul_div(
                to_wad(bought, vault_asset.decimals)?,
                WAD,
                v.pps.raw(),
                Rounding::Down,
            )?;
            self.vault.mint(account, minted)?;
            step.borrowed = borrow;
            step.minted = minted;
        } else if exposure < position && owed > 0 {
            let repay = if target <= Wad::ONE {
                owed
            } else {
                v.base_for_value(position - exposure, Rounding::Down)?.min(owed)
            };
            if repay == 0 {
                return Ok(step);
            }
            let burn = v
                .shares_for_value(v.debt_value(repay)?, Rounding::Up)?
                .min(shares);
            let redeem = from_wad(v.assets_for(burn)?, vault_asset.decimals, Rounding::Down)?;
            self.vault.burn(account, burn)?;
            let received = self.env.withdraw(redeem)?;
            let proceeds = self.env.swap(vault_asset.id, base.id, received)?;
            let repaid = self.pool.close_debt(account, proceeds)?;
            let surplus = proceeds - repaid;
            if surplus > 0 {
                self.env.transfer_out(base.id, account, surplus)?;
            }
            step.burned = burn;
            step.repaid = repaid;
        }
        Ok(step)
    }

    // ── Manager entry points ──

    /// Deposit `amount` of the vault asset and lever the whole position to
    /// `leverage`. Returns the net position shares minted.
    pub fn deposit(
        &mut self,
        caller: AccountId,
        amount: u128,
        leverage: Wad,
        min_shares: u128,
        deadline: u64,
        now: u64,
    ) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            e.ensure_depositor(caller)?;
            Self::check_deadline(deadline, now)?;
            e.check_leverage_bounds(leverage)?;
            if caller.is_null() || amount == 0 {
                return Err(OliveError::InvalidArgument);
            }
            e.guard_same_block(caller, now)?;
            e.accrue(now)?;

            let vault_asset = e.config.vault_asset;
            e.env.transfer_in(vault_asset.id, caller, amount)?;
            let pps = e.pps()?;
            let principal = mul_div(
                to_wad(amount, vault_asset.decimals)?,
                WAD,
                pps.raw(),
                Rounding::Down,
            )?;
            if principal == 0 {
                return Err(OliveError::InvalidArgument);
            }
            e.env.deposit(amount)?;
            e.vault.mint(caller, principal)?;

            let step = e.rebalance(caller, leverage)?;
            let minted = (principal + step.minted).saturating_sub(step.burned);
            if minted < min_shares {
                return Err(OliveError::Slippage);
            }
            e.ensure_healthy(caller)?;

            log::debug!(
                "{} deposited {} at {}x: {} shares, borrowed {}",
                caller,
                amount,
                leverage,
                minted,
                step.borrowed
            );
            e.emit(Event::Deposited {
                account: caller,
                amount,
                shares: minted,
                leverage,
            });
            Ok(minted)
        })
    }

    /// Raise leverage to `target`; `min_out` bounds the shares minted
    pub fn leverage(
        &mut self,
        caller: AccountId,
        target: Wad,
        min_out: u128,
        deadline: u64,
        now: u64,
    ) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            e.ensure_depositor(caller)?;
            Self::check_deadline(deadline, now)?;
            e.check_leverage_bounds(target)?;
            if e.vault.shares_of(caller) == 0 {
                return Err(OliveError::InsufficientShares);
            }
            e.guard_same_block(caller, now)?;
            e.accrue(now)?;

            if target < e.current_leverage(caller)? {
                return Err(OliveError::InvalidArgument);
            }
            let step = e.rebalance(caller, target)?;
            if step.minted < min_out {
                return Err(OliveError::Slippage);
            }
            e.ensure_healthy(caller)?;

            log::debug!("{} levered to {}x (+{} shares)", caller, target, step.minted);
            e.emit(Event::Rebalanced {
                account: caller,
                leverage: target,
                borrowed: step.borrowed,
                repaid: step.repaid,
            });
            Ok(step.minted)
        })
    }

    /// Lower leverage to `target`; `min_out` bounds the debt repaid
    pub fn deleverage(
        &mut self,
        caller: AccountId,
        target: Wad,
        min_out: u128,
        deadline: u64,
        now: u64,
    ) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            Self::check_deadline(deadline, now)?;
            e.check_leverage_bounds(target)?;
            if e.vault.shares_of(caller) == 0 {
                return Err(OliveError::InsufficientShares);
            }
            e.guard_same_block(caller, now)?;
            e.accrue(now)?;

            if target > e.current_leverage(caller)? {
                return Err(OliveError::InvalidArgument);
            }
            let step = e.rebalance(caller, target)?;
            if step.repaid < min_out {
                return Err(OliveError::Slippage);
            }
            e.ensure_healthy(caller)?;

            log::debug!("{} delevered to {}x (repaid {})", caller, target, step.repaid);
            e.emit(Event::Rebalanced {
                account: caller,
                leverage: target,
                borrowed: step.borrowed,
                repaid: step.repaid,
            });
            Ok(step.repaid)
        })
    }

    /// Burn `shares` and pay out the vault asset they back
    pub fn withdraw(
        &mut self,
        caller: AccountId,
        shares: u128,
        min_out: u128,
        deadline: u64,
        now: u64,
    ) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            Self::check_deadline(deadline, now)?;
            if caller.is_null() || shares == 0 {
                return Err(OliveError::InvalidArgument);
            }
            e.guard_same_block(caller, now)?;
            e.accrue(now)?;

            if shares > e.vault.shares_of(caller) {
                return Err(OliveError::InsufficientShares);
            }
            if shares > e.burnable_shares(caller, now)? {
                return Err(OliveError::HealthFactorViolation);
            }

            let vault_asset = e.config.vault_asset;
            let assets = e.pps()?.apply(shares, Rounding::Down)?;
            let redeem = from_wad(assets, vault_asset.decimals, Rounding::Down)?;
            e.vault.burn(caller, shares)?;
            let received = e.env.withdraw(redeem)?;
            if received < min_out {
                return Err(OliveError::Slippage);
            }
            e.env.transfer_out(vault_asset.id, caller, received)?;
            e.ensure_healthy(caller)?;

            log::debug!("{} withdrew {} shares for {}", caller, shares, received);
            e.emit(Event::PositionWithdrawn {
                account: caller,
                shares,
                amount: received,
            });
            Ok(received)
        })
    }

    /// Move position shares; the sender must stay at hf >= 1
    pub fn transfer_position(
        &mut self,
        from: AccountId,
        to: AccountId,
        shares: u128,
        now: u64,
    ) -> Result<()> {
        self.transact(|e| {
            e.ensure_enabled()?;
            if from.is_null() || to.is_null() || shares == 0 {
                return Err(OliveError::InvalidArgument);
            }
            e.accrue(now)?;
            if shares > e.vault.shares_of(from) {
                return Err(OliveError::InsufficientShares);
            }
            e.vault.move_shares(from, to, shares)?;
            e.ensure_healthy(from)?;
            e.emit(Event::PositionTransferred { from, to, shares });
            Ok(())
        })
    }
}
