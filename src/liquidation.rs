//! Liquidation of unhealthy positions
//!
//! The liquidator repays part or all of an account's debt and receives the
//! repaid value in position shares plus a bonus. A cut of the bonus goes to
//! the treasury and whatever is left stays with the account. When the
//! repaid value reaches the whole position, the liquidator takes every share
//! and the pool writes off whatever the position could not cover.

use crate::access::Capability;
use crate::engine::{Engine, Event};
use crate::error::{OliveError, Result};
use crate::external::{AccountId, AssetLedger, Collaborators, YieldStrategy};
use crate::wad::{from_wad, Rounding, Wad};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiquidationOutcome {
    /// Base asset taken from the liquidator (native units)
    pub repaid: u128,
    /// Position shares removed from the account
    pub seized_shares: u128,
    /// Shares credited to the liquidator (before any redemption)
    pub liquidator_shares: u128,
    pub treasury_shares: u128,
    /// Vault asset paid to the liquidator when not restaking (native units)
    pub redeemed: u128,
    /// Debt force-discharged into pool bad debt (native units)
    pub bad_debt: u128,
}

impl<C: Collaborators> Engine<C> {
    /// Liquidator-only: repay up to `repay_amount` of `account`'s debt in
    /// exchange for its position shares. Requires `hf(account) < 1`.
    pub fn liquidation(
        &mut self,
        caller: AccountId,
        account: AccountId,
        repay_amount: u128,
        restake: bool,
        now: u64,
    ) -> Result<LiquidationOutcome> {
        self.transact(|e| {
            e.ensure_enabled()?;
            e.require(caller, Capability::Liquidator)?;
            if account.is_null() || repay_amount == 0 || caller == account {
                return Err(OliveError::InvalidArgument);
            }
            e.accrue(now)?;

            let hf = e.health_now(account)?;
            if hf >= Wad::ONE {
                return Err(OliveError::HealthFactorViolation);
            }
            let owed = e.pool.debt_of(account)?;
            let repay = repay_amount.min(owed);
            if repay == 0 {
                return Err(OliveError::InvalidArgument);
            }

            let risk = e.config.risk;
            let v = e.valuation()?;
            let position = e.vault.shares_of(account);
            let repay_shares = match v.shares_for_value(v.debt_value(repay)?, Rounding::Up) {
                Ok(shares) => shares,
                // Worthless shares: the whole position is seized.
                Err(OliveError::HealthFactorViolation) => position,
                Err(err) => return Err(err),
            };

            let mut outcome = LiquidationOutcome::default();
            if repay_shares >= position {
                let settle = v.base_for_value(v.position_value(position)?, Rounding::Up)?;
                let settlement = e.settle_account(caller, account, repay, settle)?;
                e.vault.move_shares(account, caller, position)?;
                outcome.repaid = settlement.paid;
                outcome.bad_debt = settlement.bad_debt;
                outcome.seized_shares = position;
                outcome.liquidator_shares = position;
            } else {
                let remaining = position - repay_shares;
                let bonus = risk
                    .liquidator_bonus
                    .apply(repay_shares, Rounding::Down)?
                    .min(remaining);
                let fee = risk.liquidation_fee.apply(bonus, Rounding::Down)?;
                let to_liquidator = repay_shares + bonus - fee;

                let paid = e.pool.close_debt(account, repay)?;
                e.env.transfer_in(e.config.base.id, caller, paid)?;
                e.emit(Event::Repaid {
                    account,
                    amount: paid,
                });
                e.vault.move_shares(account, caller, to_liquidator)?;
                if fee > 0 {
                    let treasury = e.config.treasury;
                    e.vault.move_shares(account, treasury, fee)?;
                }
                outcome.repaid = paid;
                outcome.seized_shares = repay_shares + bonus;
                outcome.liquidator_shares = to_liquidator;
                outcome.treasury_shares = fee;
            }

            if !restake && outcome.liquidator_shares > 0 {
                let vault_asset = e.config.vault_asset;
                let assets = v.assets_for(outcome.liquidator_shares)?;
                let redeem = from_wad(assets, vault_asset.decimals, Rounding::Down)?;
                e.vault.burn(caller, outcome.liquidator_shares)?;
                let received = e.env.withdraw(redeem)?;
                e.env.transfer_out(vault_asset.id, caller, received)?;
                outcome.redeemed = received;
            }

            log::info!(
                "liquidated {} (hf {}): repaid {}, seized {} shares, liquidator {}, treasury {}, bad debt {}",
                account,
                hf,
                outcome.repaid,
                outcome.seized_shares,
                outcome.liquidator_shares,
                outcome.treasury_shares,
                outcome.bad_debt
            );
            e.emit(Event::Liquidated {
                account,
                liquidator: caller,
                repaid: outcome.repaid,
                seized_shares: outcome.seized_shares,
            });
            Ok(outcome)
        })
    }

    /// Accounts currently below hf 1 at `now`
    pub fn liquidatable_accounts(&self, now: u64) -> Result<Vec<(AccountId, Wad)>> {
        let pool = self.pool_at(now)?;
        let v = self.valuation()?;
        let threshold = self.config.risk.liquidation_threshold;
        let mut out = Vec::new();
        for account in pool.debtors() {
            let hf = v.health(self.vault.shares_of(account), pool.debt_of(account)?, threshold)?;
            if hf < Wad::ONE {
                out.push((account, hf));
            }
        }
        out.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(out)
    }
}
