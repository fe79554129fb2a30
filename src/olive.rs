//! Olive: accounting core of a leveraged yield protocol
//!
//! A lending pool lends a base asset against compounding indices; a
//! leveraged vault lets depositors borrow from it to amplify exposure to an
//! external yield strategy, and liquidates them when their health factor
//! drops below one. One [`Engine`] owns both ledgers and executes every
//! operation atomically against injected collaborators.

pub mod access;
pub mod config;
pub mod engine;
pub mod error;
pub mod external;
pub mod harvest;
pub mod liquidation;
pub mod pool;
pub mod rate;
pub mod sim;
pub mod vault;
pub mod wad;

pub use access::{AccessControl, Capability, RoleRegistry};
pub use config::{AssetConfig, EngineConfig, RiskParams};
pub use engine::{Engine, Event};
pub use error::{OliveError, Result};
pub use external::{
    AccountId, AssetId, AssetLedger, Collaborators, Exchange, PriceOracle, RewardDistributor,
    RewardsRouter, YieldStrategy,
};
pub use harvest::HarvestReport;
pub use liquidation::LiquidationOutcome;
pub use pool::{PoolState, Settlement};
pub use rate::{compound_interest, simple_interest, RateModel, SECONDS_PER_YEAR};
pub use sim::{FailPoint, SimEnv, CUSTODY};
pub use vault::{Valuation, VaultState};
pub use wad::{from_wad, mul_div, to_wad, Rounding, Wad, WAD};

#[cfg(test)]
mod tests;

#[cfg(kani)]
mod kani_proofs;
