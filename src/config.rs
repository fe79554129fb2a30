//! Engine configuration
//!
//! Loaded from TOML. Fixed-point fields are written as decimal strings
//! (`liquidation_threshold = "0.9"`) and parsed exactly.

use crate::error::{OliveError, Result};
use crate::external::{AccountId, AssetId};
use crate::rate::RateModel;
use crate::wad::{Wad, WAD_DECIMALS};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub id: AssetId,
    /// Native decimal precision (6 for a USDC-like base asset)
    pub decimals: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParams {
    /// hf = position value * threshold / debt value
    pub liquidation_threshold: Wad,
    pub min_leverage: Wad,
    pub max_leverage: Wad,
    /// Extra position shares paid to a liquidator, as a fraction of the seized shares
    pub liquidator_bonus: Wad,
    /// Fraction of the liquidator bonus routed to the treasury
    pub liquidation_fee: Wad,
    pub treasury_cut_on_harvest: Wad,
    pub reward_cut_on_harvest: Wad,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub treasury: AccountId,
    pub reward_distributor: AccountId,
    /// Share of borrower interest kept by the protocol
    pub reserve_factor: Wad,
    /// Restrict deposit/leverage to holders of `Capability::Depositor`
    #[serde(default)]
    pub soft_launch: bool,
    /// Reject a second vault operation by the same account at the same timestamp
    #[serde(default)]
    pub same_block_guard: bool,
    /// Asset the pool lends
    pub base: AssetConfig,
    /// Asset the strategy manages; position shares are claims on it
    pub vault_asset: AssetConfig,
    /// Asset the rewards router pays harvest yield in
    pub reward_asset: AssetConfig,
    pub rate: RateModel,
    pub risk: RiskParams,
}

impl EngineConfig {
    /// Parameters of the reference deployment: 6-decimal base, 18-decimal
    /// vault and reward assets, 0.9 threshold, leverage up to 5x.
    pub fn default_local() -> Self {
        Self {
            treasury: AccountId(9_001),
            reward_distributor: AccountId(9_002),
            reserve_factor: Wad::from_bps(1_000),
            soft_launch: false,
            same_block_guard: false,
            base: AssetConfig {
                id: AssetId(1),
                decimals: 6,
            },
            vault_asset: AssetConfig {
                id: AssetId(2),
                decimals: 18,
            },
            reward_asset: AssetConfig {
                id: AssetId(3),
                decimals: 18,
            },
            rate: RateModel::new(
                Wad::from_bps(300),
                Wad::from_bps(300),
                Wad::from_bps(300),
                Wad::from_bps(8_000),
            ),
            risk: RiskParams {
                liquidation_threshold: Wad::from_bps(9_000),
                min_leverage: Wad::ONE,
                max_leverage: Wad::from_int(5),
                liquidator_bonus: Wad::from_bps(500),
                liquidation_fee: Wad::from_bps(2_000),
                treasury_cut_on_harvest: Wad::from_bps(2_800),
                reward_cut_on_harvest: Wad::from_bps(200),
            },
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: EngineConfig = toml::from_str(s).map_err(|e| {
            log::error!("failed to parse engine config: {}", e);
            OliveError::InvalidConfig
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|_| OliveError::InvalidConfig)
    }

    pub fn validate(&self) -> Result<()> {
        for asset in [self.base, self.vault_asset, self.reward_asset] {
            if asset.decimals > WAD_DECIMALS {
                return Err(OliveError::InvalidConfig);
            }
        }
        if self.base.id == self.vault_asset.id {
            return Err(OliveError::InvalidConfig);
        }
        self.rate.validate()?;
        if self.reserve_factor > Wad::ONE {
            return Err(OliveError::InvalidConfig);
        }

        let r = &self.risk;
        if r.liquidation_threshold < Wad::from_bps(5_000) || r.liquidation_threshold >= Wad::ONE {
            return Err(OliveError::InvalidConfig);
        }
        if r.min_leverage < Wad::ONE || r.max_leverage < r.min_leverage {
            return Err(OliveError::InvalidConfig);
        }
        if r.liquidator_bonus > Wad::ONE || r.liquidation_fee > Wad::ONE {
            return Err(OliveError::InvalidConfig);
        }
        let cuts = r
            .treasury_cut_on_harvest
            .checked_add(r.reward_cut_on_harvest)?;
        if cuts > Wad::ONE {
            return Err(OliveError::InvalidConfig);
        }

        if self.treasury.is_null() || self.reward_distributor.is_null() {
            return Err(OliveError::InvalidConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        treasury = 77
        reward_distributor = 78
        reserve_factor = "0.1"
        soft_launch = true

        [base]
        id = 1
        decimals = 6

        [vault_asset]
        id = 2
        decimals = 18

        [reward_asset]
        id = 3
        decimals = 18

        [rate]
        r0 = "0.03"
        r1 = "0.06"
        r2 = "0.08"
        u_optimal = "0.9"

        [risk]
        liquidation_threshold = "0.9"
        min_leverage = "1"
        max_leverage = "10"
        liquidator_bonus = "0.05"
        liquidation_fee = "0.2"
        treasury_cut_on_harvest = "0.28"
        reward_cut_on_harvest = "0.02"
    "#;

    #[test]
    fn parses_sample() {
        let cfg = EngineConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.treasury, AccountId(77));
        assert_eq!(cfg.base.decimals, 6);
        assert_eq!(cfg.rate.u_optimal, Wad::from_bps(9_000));
        assert_eq!(cfg.risk.max_leverage, Wad::from_int(10));
        assert!(cfg.soft_launch);
        assert!(!cfg.same_block_guard);
    }

    #[test]
    fn toml_round_trip() {
        let cfg = EngineConfig::default_local();
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn rejects_low_threshold() {
        let mut cfg = EngineConfig::default_local();
        cfg.risk.liquidation_threshold = Wad::from_bps(1_000);
        assert_eq!(cfg.validate(), Err(OliveError::InvalidConfig));
    }

    #[test]
    fn rejects_zero_max_leverage() {
        let mut cfg = EngineConfig::default_local();
        cfg.risk.max_leverage = Wad::ZERO;
        assert_eq!(cfg.validate(), Err(OliveError::InvalidConfig));
    }

    #[test]
    fn rejects_null_treasury() {
        let mut cfg = EngineConfig::default_local();
        cfg.treasury = AccountId::NULL;
        assert_eq!(cfg.validate(), Err(OliveError::InvalidConfig));
    }

    #[test]
    fn rejects_excess_decimals() {
        let mut cfg = EngineConfig::default_local();
        cfg.base.decimals = 19;
        assert_eq!(cfg.validate(), Err(OliveError::InvalidConfig));
    }

    #[test]
    fn rejects_malformed_fixed_point() {
        let bad = SAMPLE.replace(r#"r0 = "0.03""#, r#"r0 = "zero""#);
        assert_eq!(
            EngineConfig::from_toml_str(&bad),
            Err(OliveError::InvalidConfig)
        );
    }
}
