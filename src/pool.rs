//! Lending pool ledger
//!
//! Supply and debt positions are shares against two compounding indices.
//! `pending_reserve` and `bad_debt` are kept at 18 decimals; cash and every
//! amount crossing the public API are in the base asset's native units.
//!
//! Rounding always favors the pool:
//! - supply mints shares rounded down
//! - withdraw burns shares rounded up
//! - owed debt is rounded up to a whole native unit
//! - a partial repay burns debt shares rounded down
//!
//! Borrowed debt shares round down at sub-native precision so that repaying
//! exactly what was borrowed clears the position.

use crate::access::Capability;
use crate::engine::{Engine, Event};
use crate::error::{OliveError, Result};
use crate::external::{AccountId, AssetLedger, Collaborators};
use crate::rate::{compound_interest, RateModel};
use crate::wad::{from_wad, mul_div, to_wad, Rounding, Wad, WAD};
use std::collections::BTreeMap;

/// Result of settling debt against seized collateral
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settlement {
    /// Native amount taken from the payer
    pub paid: u128,
    /// Native shortfall force-discharged and recorded as bad debt
    pub bad_debt: u128,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolState {
    model: RateModel,
    reserve_factor: Wad,
    decimals: u8,

    pub total_supply_shares: u128,
    pub total_debt_shares: u128,
    pub liquidity_index: Wad,
    pub debt_index: Wad,
    pub last_accrual: u64,
    /// Unminted protocol fee (18 decimals)
    pub pending_reserve: u128,
    /// Unrecovered shortfall (18 decimals)
    pub bad_debt: u128,
    /// Base asset held by the pool (native units)
    pub cash: u128,

    supply: BTreeMap<AccountId, u128>,
    debt: BTreeMap<AccountId, u128>,
}

impl PoolState {
    pub fn new(model: RateModel, reserve_factor: Wad, decimals: u8, now: u64) -> Self {
        Self {
            model,
            reserve_factor,
            decimals,
            total_supply_shares: 0,
            total_debt_shares: 0,
            liquidity_index: Wad::ONE,
            debt_index: Wad::ONE,
            last_accrual: now,
            pending_reserve: 0,
            bad_debt: 0,
            cash: 0,
            supply: BTreeMap::new(),
            debt: BTreeMap::new(),
        }
    }

    pub fn model(&self) -> &RateModel {
        &self.model
    }

    pub fn supply_shares_of(&self, account: AccountId) -> u128 {
        self.supply.get(&account).copied().unwrap_or(0)
    }

    pub fn debt_shares_of(&self, account: AccountId) -> u128 {
        self.debt.get(&account).copied().unwrap_or(0)
    }

    pub fn debtors(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.debt.keys().copied()
    }

    /// Σ supply shares at the liquidity index (18 decimals)
    pub fn total_supply_value(&self) -> Result<u128> {
        self.liquidity_index
            .apply(self.total_supply_shares, Rounding::Down)
    }

    /// Σ debt shares at the debt index (18 decimals)
    pub fn total_debt_value(&self) -> Result<u128> {
        self.debt_index.apply(self.total_debt_shares, Rounding::Down)
    }

    /// Debt value over supply value, capped at 1.0; zero with no supply
    pub fn utilization(&self) -> Result<Wad> {
        let supplied = self.total_supply_value()?;
        if supplied == 0 {
            return Ok(Wad::ZERO);
        }
        let borrowed = self.total_debt_value()?;
        Ok(Wad::from_ratio(borrowed, supplied)?.min(Wad::ONE))
    }

    /// Cash not earmarked for the protocol reserve
    pub fn available_liquidity(&self) -> Result<u128> {
        let reserved = from_wad(self.pending_reserve, self.decimals, Rounding::Up)?;
        Ok(self.cash.saturating_sub(reserved))
    }

    /// Redeemable supply value in native units
    pub fn balance_of(&self, account: AccountId) -> Result<u128> {
        let value = self
            .liquidity_index
            .apply(self.supply_shares_of(account), Rounding::Down)?;
        from_wad(value, self.decimals, Rounding::Down)
    }

    /// Owed debt in native units
    pub fn debt_of(&self, account: AccountId) -> Result<u128> {
        let value = self
            .debt_index
            .apply(self.debt_shares_of(account), Rounding::Up)?;
        from_wad(value, self.decimals, Rounding::Up)
    }

    pub fn reserve(&self) -> Result<u128> {
        from_wad(self.pending_reserve, self.decimals, Rounding::Down)
    }

    pub fn bad_debt_amount(&self) -> Result<u128> {
        from_wad(self.bad_debt, self.decimals, Rounding::Up)
    }

    pub fn borrow_rate(&self) -> Result<Wad> {
        self.model.borrow_rate(self.utilization()?)
    }

    /// Supplier rate net of the reserve factor
    pub fn supply_rate(&self) -> Result<Wad> {
        let kept = Wad::ONE.checked_sub(self.reserve_factor)?;
        self.model
            .supply_rate(self.utilization()?)?
            .mul(kept, Rounding::Down)
    }

    /// Grow both indices to `now` and book the protocol's cut of borrower
    /// interest, then recover outstanding bad debt from the reserve.
    ///
    /// Returns the bad debt recovered, in native units.
    pub fn accrue(&mut self, now: u64) -> Result<u128> {
        if now < self.last_accrual {
            return Err(OliveError::InvalidArgument);
        }
        if now > self.last_accrual {
            self.grow_indices(now)?;
        }

        let recovered = self.recover_bad_debt()?;
        from_wad(recovered, self.decimals, Rounding::Down)
    }

    fn grow_indices(&mut self, now: u64) -> Result<()> {
        let borrow_rate = self.borrow_rate()?;
        let supply_rate = self.supply_rate()?;
        let debt_growth = compound_interest(borrow_rate, self.last_accrual, now)?;
        let liquidity_growth = compound_interest(supply_rate, self.last_accrual, now)?;

        let debt_before = self.total_debt_value()?;
        let supply_before = self.total_supply_value()?;

        self.debt_index = self.debt_index.mul(debt_growth, Rounding::Down)?;
        self.liquidity_index = self.liquidity_index.mul(liquidity_growth, Rounding::Down)?;

        let debt_interest = self.total_debt_value()?.saturating_sub(debt_before);
        let supply_interest = self.total_supply_value()?.saturating_sub(supply_before);
        self.pending_reserve = self
            .pending_reserve
            .checked_add(debt_interest.saturating_sub(supply_interest))
            .ok_or(OliveError::MathOverflow)?;

        log::trace!(
            "accrued {}s: borrow rate {}, debt index {}, liquidity index {}",
            now - self.last_accrual,
            borrow_rate,
            self.debt_index,
            self.liquidity_index
        );
        self.last_accrual = now;
        Ok(())
    }

    /// Move min(bad debt, pending reserve) from the reserve back to suppliers
    fn recover_bad_debt(&mut self) -> Result<u128> {
        let recovered = self.bad_debt.min(self.pending_reserve);
        if recovered == 0 || self.total_supply_shares == 0 {
            return Ok(0);
        }
        let supplied = self.total_supply_value()?;
        if supplied == 0 {
            return Ok(0);
        }
        let grown = supplied
            .checked_add(recovered)
            .ok_or(OliveError::MathOverflow)?;
        self.liquidity_index = Wad(mul_div(
            self.liquidity_index.raw(),
            grown,
            supplied,
            Rounding::Down,
        )?);
        self.pending_reserve -= recovered;
        self.bad_debt -= recovered;
        Ok(recovered)
    }

    /// Socialise `shortfall` (18 decimals) across suppliers by writing the
    /// liquidity index down, and record it as bad debt.
    fn write_down(&mut self, shortfall: u128) -> Result<()> {
        let supplied = self.total_supply_value()?;
        if supplied > 0 {
            let remaining = supplied.saturating_sub(shortfall);
            let index = mul_div(self.liquidity_index.raw(), remaining, supplied, Rounding::Down)?;
            // A zero index would make every later share computation divide by zero.
            self.liquidity_index = Wad(index.max(1));
        }
        self.bad_debt = self
            .bad_debt
            .checked_add(shortfall)
            .ok_or(OliveError::MathOverflow)?;
        Ok(())
    }

    // ── Ledger mutations (callers accrue first) ──

    pub(crate) fn mint_supply(&mut self, account: AccountId, amount: u128) -> Result<u128> {
        let value = to_wad(amount, self.decimals)?;
        let shares = mul_div(value, WAD, self.liquidity_index.raw(), Rounding::Down)?;
        if shares == 0 {
            return Err(OliveError::InvalidArgument);
        }
        credit(&mut self.supply, account, shares)?;
        self.total_supply_shares = checked_add(self.total_supply_shares, shares)?;
        self.cash = checked_add(self.cash, amount)?;
        Ok(shares)
    }

    pub(crate) fn burn_supply(&mut self, account: AccountId, amount: u128) -> Result<u128> {
        if amount == 0 {
            return Err(OliveError::InvalidArgument);
        }
        if self.available_liquidity()? < amount {
            return Err(OliveError::InsufficientLiquidity);
        }
        if self.balance_of(account)? < amount {
            return Err(OliveError::InsufficientShares);
        }
        let value = to_wad(amount, self.decimals)?;
        let held = self.supply_shares_of(account);
        let shares = mul_div(value, WAD, self.liquidity_index.raw(), Rounding::Up)?.min(held);
        debit(&mut self.supply, account, shares)?;
        self.total_supply_shares -= shares;
        self.cash -= amount;
        Ok(shares)
    }

    pub(crate) fn open_debt(&mut self, account: AccountId, amount: u128) -> Result<u128> {
        if amount == 0 {
            return Err(OliveError::InvalidArgument);
        }
        if self.available_liquidity()? < amount {
            return Err(OliveError::InsufficientLiquidity);
        }
        let value = to_wad(amount, self.decimals)?;
        let shares = mul_div(value, WAD, self.debt_index.raw(), Rounding::Up)?;
        if shares == 0 {
            return Err(OliveError::InvalidArgument);
        }
        credit(&mut self.debt, account, shares)?;
        self.total_debt_shares = checked_add(self.total_debt_shares, shares)?;
        self.cash -= amount;
        Ok(shares)
    }

    /// Pay down up to `amount` of `account`'s debt; returns the amount accepted
    pub(crate) fn close_debt(&mut self, account: AccountId, amount: u128) -> Result<u128> {
        let owed = self.debt_of(account)?;
        let paid = amount.min(owed);
        if paid == 0 {
            return Ok(0);
        }
        let held = self.debt_shares_of(account);
        let shares = if paid == owed {
            held
        } else {
            let value = to_wad(paid, self.decimals)?;
            mul_div(value, WAD, self.debt_index.raw(), Rounding::Down)?.min(held)
        };
        debit(&mut self.debt, account, shares)?;
        self.total_debt_shares -= shares;
        self.cash = checked_add(self.cash, paid)?;
        Ok(paid)
    }

    /// Pay `min(repay, settle, owed)`; when the collateral (`settle`) cannot
    /// cover the debt, force-discharge the rest as bad debt.
    pub(crate) fn settle_debt(
        &mut self,
        account: AccountId,
        repay: u128,
        settle: u128,
    ) -> Result<Settlement> {
        let owed = self.debt_of(account)?;
        let paid = self.close_debt(account, repay.min(settle))?;
        if settle >= owed {
            return Ok(Settlement { paid, bad_debt: 0 });
        }

        let remaining = self.debt_shares_of(account);
        if remaining == 0 {
            return Ok(Settlement { paid, bad_debt: 0 });
        }
        let shortfall = self.debt_index.apply(remaining, Rounding::Up)?;
        debit(&mut self.debt, account, remaining)?;
        self.total_debt_shares -= remaining;
        self.write_down(shortfall)?;

        Ok(Settlement {
            paid,
            bad_debt: from_wad(shortfall, self.decimals, Rounding::Up)?,
        })
    }

    /// Convert the whole pending reserve into supply shares for `treasury`
    pub(crate) fn mint_reserve(&mut self, treasury: AccountId) -> Result<u128> {
        if self.pending_reserve == 0 {
            return Ok(0);
        }
        let shares = mul_div(
            self.pending_reserve,
            WAD,
            self.liquidity_index.raw(),
            Rounding::Down,
        )?;
        let minted = from_wad(self.pending_reserve, self.decimals, Rounding::Down)?;
        credit(&mut self.supply, treasury, shares)?;
        self.total_supply_shares = checked_add(self.total_supply_shares, shares)?;
        self.pending_reserve = 0;
        Ok(minted)
    }
}

fn checked_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(OliveError::MathOverflow)
}

fn credit(book: &mut BTreeMap<AccountId, u128>, account: AccountId, shares: u128) -> Result<()> {
    let entry = book.entry(account).or_insert(0);
    *entry = checked_add(*entry, shares)?;
    Ok(())
}

fn debit(book: &mut BTreeMap<AccountId, u128>, account: AccountId, shares: u128) -> Result<()> {
    let held = book.get(&account).copied().unwrap_or(0);
    let left = held
        .checked_sub(shares)
        .ok_or(OliveError::InsufficientShares)?;
    if left == 0 {
        book.remove(&account);
    } else {
        book.insert(account, left);
    }
    Ok(())
}

// ============================================================================
// Pool entry points
// ============================================================================

impl<C: Collaborators> Engine<C> {
    /// Deposit `amount` of the base asset as interest-bearing supply
    pub fn supply(&mut self, caller: AccountId, amount: u128, now: u64) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            if caller.is_null() || amount == 0 {
                return Err(OliveError::InvalidArgument);
            }
            e.accrue(now)?;
            e.env.transfer_in(e.config.base.id, caller, amount)?;
            let shares = e.pool.mint_supply(caller, amount)?;
            log::debug!("{} supplied {} for {} shares", caller, amount, shares);
            e.emit(Event::Supplied {
                account: caller,
                amount,
                shares,
            });
            Ok(shares)
        })
    }

    /// Redeem `amount` of supplied base asset; returns shares burned
    pub fn withdraw_supply(&mut self, caller: AccountId, amount: u128, now: u64) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            if caller.is_null() {
                return Err(OliveError::InvalidArgument);
            }
            e.accrue(now)?;
            let shares = e.pool.burn_supply(caller, amount)?;
            e.env.transfer_out(e.config.base.id, caller, amount)?;
            log::debug!("{} withdrew {} supply ({} shares)", caller, amount, shares);
            e.emit(Event::SupplyWithdrawn {
                account: caller,
                amount,
                shares,
            });
            Ok(shares)
        })
    }

    /// Open debt for `on_behalf` and pay the proceeds to `receiver`
    pub fn borrow(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        receiver: AccountId,
        amount: u128,
        now: u64,
    ) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            e.require(caller, Capability::Borrow)?;
            if on_behalf.is_null() || receiver.is_null() || amount == 0 {
                return Err(OliveError::InvalidArgument);
            }
            e.accrue(now)?;
            let shares = e.pool.open_debt(on_behalf, amount)?;
            e.env.transfer_out(e.config.base.id, receiver, amount)?;
            log::debug!("{} borrowed {} for {}", caller, amount, on_behalf);
            e.emit(Event::Borrowed {
                account: on_behalf,
                amount,
                shares,
            });
            Ok(shares)
        })
    }

    /// Repay up to `amount` of `on_behalf`'s debt from `payer`
    ///
    /// Only `min(amount, owed)` is taken from the payer; the excess never
    /// leaves their balance. Returns the amount accepted.
    pub fn repay(
        &mut self,
        payer: AccountId,
        on_behalf: AccountId,
        amount: u128,
        now: u64,
    ) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            if payer.is_null() || on_behalf.is_null() || amount == 0 {
                return Err(OliveError::InvalidArgument);
            }
            e.accrue(now)?;
            let paid = e.pool.close_debt(on_behalf, amount)?;
            if paid > 0 {
                e.env.transfer_in(e.config.base.id, payer, paid)?;
            }
            log::debug!("{} repaid {} for {}", payer, paid, on_behalf);
            e.emit(Event::Repaid {
                account: on_behalf,
                amount: paid,
            });
            Ok(paid)
        })
    }

    /// Liquidation-path repayment that discharges debt only up to what the
    /// seized collateral (`settle`) can justify, recording the rest as bad debt
    pub fn repay_with_settle(
        &mut self,
        caller: AccountId,
        payer: AccountId,
        on_behalf: AccountId,
        repay: u128,
        settle: u128,
        now: u64,
    ) -> Result<Settlement> {
        self.transact(|e| {
            e.ensure_enabled()?;
            e.require(caller, Capability::Settle)?;
            if payer.is_null() || on_behalf.is_null() || repay == 0 {
                return Err(OliveError::InvalidArgument);
            }
            e.accrue(now)?;
            e.settle_account(payer, on_behalf, repay, settle)
        })
    }

    pub(crate) fn settle_account(
        &mut self,
        payer: AccountId,
        on_behalf: AccountId,
        repay: u128,
        settle: u128,
    ) -> Result<Settlement> {
        let settlement = self.pool.settle_debt(on_behalf, repay, settle)?;
        if settlement.paid > 0 {
            self.env
                .transfer_in(self.config.base.id, payer, settlement.paid)?;
        }
        self.emit(Event::Repaid {
            account: on_behalf,
            amount: settlement.paid,
        });
        if settlement.bad_debt > 0 {
            log::warn!(
                "bad debt of {} recorded against {}",
                settlement.bad_debt,
                on_behalf
            );
            self.emit(Event::BadDebtRecorded {
                account: on_behalf,
                amount: settlement.bad_debt,
            });
        }
        Ok(settlement)
    }

    /// Mint the pending reserve to the treasury as supply shares
    pub fn mint_fees(&mut self, caller: AccountId, now: u64) -> Result<u128> {
        self.transact(|e| {
            e.ensure_enabled()?;
            e.require(caller, Capability::Governance)?;
            e.accrue(now)?;
            let treasury = e.config.treasury;
            let minted = e.pool.mint_reserve(treasury)?;
            log::info!("minted {} of reserve to treasury {}", minted, treasury);
            e.emit(Event::FeesMinted {
                treasury,
                amount: minted,
            });
            Ok(minted)
        })
    }

    // ── Views, computed as if accrued at `now` ──

    pub(crate) fn pool_at(&self, now: u64) -> Result<PoolState> {
        let mut pool = self.pool.clone();
        pool.accrue(now)?;
        Ok(pool)
    }

    pub fn utilization(&self, now: u64) -> Result<Wad> {
        self.pool_at(now)?.utilization()
    }

    pub fn reserve(&self, now: u64) -> Result<u128> {
        self.pool_at(now)?.reserve()
    }

    pub fn bad_debt(&self, now: u64) -> Result<u128> {
        self.pool_at(now)?.bad_debt_amount()
    }

    pub fn balance_of(&self, account: AccountId, now: u64) -> Result<u128> {
        self.pool_at(now)?.balance_of(account)
    }

    pub fn debt_of(&self, account: AccountId, now: u64) -> Result<u128> {
        self.pool_at(now)?.debt_of(account)
    }

    pub fn available_liquidity(&self, now: u64) -> Result<u128> {
        self.pool_at(now)?.available_liquidity()
    }

    pub fn borrow_rate(&self, now: u64) -> Result<Wad> {
        self.pool_at(now)?.borrow_rate()
    }

    pub fn supply_rate(&self, now: u64) -> Result<Wad> {
        self.pool_at(now)?.supply_rate()
    }
}
