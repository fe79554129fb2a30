//! The ledger engine
//!
//! One `Engine` owns the pool, the vault and the wired collaborators. Every
//! public mutating entry point runs inside [`Engine::transact`]: the engine
//! (collaborators included) is snapshotted first and restored if the
//! operation returns an error, so a failure anywhere leaves no trace.

use crate::access::{AccessControl, Capability};
use crate::config::EngineConfig;
use crate::error::{OliveError, Result};
use crate::external::{AccountId, Collaborators};
use crate::pool::PoolState;
use crate::vault::VaultState;
use crate::wad::Wad;

/// Journal entry for a committed state transition. Amounts are native units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Supplied {
        account: AccountId,
        amount: u128,
        shares: u128,
    },
    SupplyWithdrawn {
        account: AccountId,
        amount: u128,
        shares: u128,
    },
    Borrowed {
        account: AccountId,
        amount: u128,
        shares: u128,
    },
    Repaid {
        account: AccountId,
        amount: u128,
    },
    FeesMinted {
        treasury: AccountId,
        amount: u128,
    },
    /// Shortfall force-discharged from an account's debt
    BadDebtRecorded {
        account: AccountId,
        amount: u128,
    },
    /// Bad debt paid back out of the pending reserve
    BadDebtRecovered {
        amount: u128,
    },
    Deposited {
        account: AccountId,
        amount: u128,
        shares: u128,
        leverage: Wad,
    },
    Rebalanced {
        account: AccountId,
        leverage: Wad,
        borrowed: u128,
        repaid: u128,
    },
    PositionWithdrawn {
        account: AccountId,
        shares: u128,
        amount: u128,
    },
    PositionTransferred {
        from: AccountId,
        to: AccountId,
        shares: u128,
    },
    Harvested {
        claimed: u128,
        reinvested: u128,
        pps: Wad,
    },
    PpsDecreased {
        from: Wad,
        to: Wad,
    },
    Liquidated {
        account: AccountId,
        liquidator: AccountId,
        repaid: u128,
        seized_shares: u128,
    },
    EnabledChanged {
        enabled: bool,
    },
}

#[derive(Clone, Debug)]
pub struct Engine<C: Collaborators> {
    pub(crate) config: EngineConfig,
    pub(crate) pool: PoolState,
    pub(crate) vault: VaultState,
    pub(crate) env: C,
    pub(crate) enabled: bool,
    pub(crate) events: Vec<Event>,
}

impl<C: Collaborators> Engine<C> {
    /// Validate `config` and start both ledgers at time `now`
    pub fn new(config: EngineConfig, env: C, now: u64) -> Result<Self> {
        config.validate()?;
        let pool = PoolState::new(config.rate, config.reserve_factor, config.base.decimals, now);
        log::info!(
            "engine initialised: base {:?}, vault asset {:?}, threshold {}",
            config.base.id,
            config.vault_asset.id,
            config.risk.liquidation_threshold
        );
        Ok(Self {
            config,
            pool,
            vault: VaultState::new(),
            env,
            enabled: true,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &PoolState {
        &self.pool
    }

    pub fn vault(&self) -> &VaultState {
        &self.vault
    }

    pub fn env(&self) -> &C {
        &self.env
    }

    /// Direct access to the collaborators (prices, balances, roles)
    pub fn env_mut(&mut self) -> &mut C {
        &mut self.env
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        core::mem::take(&mut self.events)
    }

    /// Run `op` atomically: on `Err` every mutation, including collaborator
    /// state, is discarded.
    pub fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        match op(self) {
            Ok(out) => Ok(out),
            Err(e) => {
                log::debug!("operation aborted, rolling back: {}", e);
                *self = snapshot;
                Err(e)
            }
        }
    }

    /// Global circuit breaker
    pub fn set_enabled(&mut self, caller: AccountId, enabled: bool) -> Result<()> {
        self.transact(|e| {
            e.require(caller, Capability::Governance)?;
            e.enabled = enabled;
            log::info!("protocol {}", if enabled { "enabled" } else { "disabled" });
            e.emit(Event::EnabledChanged { enabled });
            Ok(())
        })
    }

    // ── Guards ──

    pub(crate) fn ensure_enabled(&self) -> Result<()> {
        if !self.enabled {
            return Err(OliveError::Disabled);
        }
        Ok(())
    }

    pub(crate) fn require(&self, caller: AccountId, capability: Capability) -> Result<()> {
        if !self.env.is_authorized(caller, capability) {
            log::debug!("{} lacks {:?}", caller, capability);
            return Err(OliveError::Unauthorized);
        }
        Ok(())
    }

    /// Soft-launch allow-list for entry points that open or grow exposure
    pub(crate) fn ensure_depositor(&self, caller: AccountId) -> Result<()> {
        if self.config.soft_launch {
            self.require(caller, Capability::Depositor)?;
        }
        Ok(())
    }

    /// `deadline == 0` disables the check
    pub(crate) fn check_deadline(deadline: u64, now: u64) -> Result<()> {
        if deadline != 0 && now > deadline {
            return Err(OliveError::DeadlineExpired);
        }
        Ok(())
    }

    pub(crate) fn guard_same_block(&mut self, account: AccountId, now: u64) -> Result<()> {
        if self.config.same_block_guard && self.vault.last_action_of(account) == Some(now) {
            return Err(OliveError::SameBlockTransaction);
        }
        self.vault.record_action(account, now);
        Ok(())
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Accrue pool interest up to `now`; must run before any balance is read
    pub(crate) fn accrue(&mut self, now: u64) -> Result<()> {
        let recovered = self.pool.accrue(now)?;
        if recovered > 0 {
            log::info!("recovered {} bad debt from reserve", recovered);
            self.emit(Event::BadDebtRecovered { amount: recovered });
        }
        Ok(())
    }
}
