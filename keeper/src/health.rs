//! Position health snapshots

use olive::{AccountId, Collaborators, Engine, Wad};
use serde::Serialize;

/// Health of one vault position at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionHealth {
    pub account: AccountId,
    /// Health factor; `Wad::MAX` with no debt
    pub hf: Wad,
    pub shares: u128,
    /// Owed base asset (native units)
    pub debt: u128,
    pub last_update: u64,
}

impl PositionHealth {
    pub fn is_liquidatable(&self) -> bool {
        self.hf < Wad::ONE
    }
}

/// Health of every open position at `now`
///
/// Positions whose health cannot be computed are skipped and logged.
pub fn snapshot<C: Collaborators>(engine: &Engine<C>, now: u64) -> Vec<PositionHealth> {
    let accounts: Vec<AccountId> = engine.vault().positions().map(|(a, _)| a).collect();
    let mut out = Vec::with_capacity(accounts.len());
    for account in accounts {
        let hf = match engine.hf(account, now) {
            Ok(hf) => hf,
            Err(e) => {
                log::warn!("Failed to compute health of {}: {}", account, e);
                continue;
            }
        };
        let debt = match engine.debt_of(account, now) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Failed to read debt of {}: {}", account, e);
                continue;
            }
        };
        out.push(PositionHealth {
            account,
            hf,
            shares: engine.position_shares_of(account),
            debt,
            last_update: now,
        });
    }
    out
}
