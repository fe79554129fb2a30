//! Capability-based access control
//!
//! Every privileged entry point asks the [`AccessControl`] collaborator
//! before touching state. `RoleRegistry` is the in-memory implementation
//! used by the simulated environment.

use crate::external::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Borrow from the pool directly (vault manager / keeper contracts)
    Borrow,
    /// Settle debt against seized collateral
    Settle,
    /// Run harvest
    Keeper,
    /// Liquidate unhealthy positions
    Liquidator,
    /// Mint fees, flip the circuit breaker
    Governance,
    /// Soft-launch allow-list for deposit/leverage
    Depositor,
}

pub trait AccessControl {
    fn is_authorized(&self, caller: AccountId, capability: Capability) -> bool;
}

/// Owner holds every capability; everyone else needs an explicit grant
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleRegistry {
    owner: AccountId,
    grants: BTreeMap<Capability, BTreeSet<AccountId>>,
}

impl RoleRegistry {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            grants: BTreeMap::new(),
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn set_owner(&mut self, owner: AccountId) {
        self.owner = owner;
    }

    pub fn grant(&mut self, account: AccountId, capability: Capability) {
        self.grants.entry(capability).or_default().insert(account);
    }

    pub fn revoke(&mut self, account: AccountId, capability: Capability) {
        if let Some(set) = self.grants.get_mut(&capability) {
            set.remove(&account);
        }
    }

    pub fn holders(&self, capability: Capability) -> impl Iterator<Item = AccountId> + '_ {
        self.grants
            .get(&capability)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }
}

impl AccessControl for RoleRegistry {
    fn is_authorized(&self, caller: AccountId, capability: Capability) -> bool {
        if caller.is_null() {
            return false;
        }
        caller == self.owner
            || self
                .grants
                .get(&capability)
                .map_or(false, |set| set.contains(&caller))
    }
}
