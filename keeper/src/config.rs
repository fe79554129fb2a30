//! Keeper configuration

use olive::{AccountId, EngineConfig, OliveError};
use serde::{Deserialize, Serialize};
use std::path::Path;

const CONFIG_ENV: &str = "OLIVE_KEEPER_CONFIG";
const DEFAULT_PATH: &str = "~/.config/olive/keeper.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse keeper config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("engine config rejected: {0}")]
    Engine(#[from] OliveError),

    #[error("invalid keeper config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Seconds between ticks
    pub poll_interval_secs: u64,

    /// Account holding the keeper capability (harvest)
    pub keeper_account: AccountId,

    /// Account holding the liquidator capability
    pub liquidator_account: AccountId,

    /// Protocol owner of the local deployment
    pub owner_account: AccountId,

    /// Cap on liquidations attempted per tick
    pub max_liquidations_per_tick: usize,

    /// Keep seized shares as a position instead of redeeming them
    #[serde(default)]
    pub restake: bool,

    /// Base asset (native units) minted to the liquidator of a local deployment
    #[serde(default)]
    pub liquidator_float: u64,

    /// Engine parameters as TOML; the reference deployment when absent
    #[serde(default)]
    pub engine_config_path: Option<String>,
}

impl KeeperConfig {
    /// Load from `$OLIVE_KEEPER_CONFIG`, else `~/.config/olive/keeper.toml`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_PATH.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let contents = read_expanded(path)?;
        let config: KeeperConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be positive"));
        }
        if self.max_liquidations_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "max_liquidations_per_tick must be positive",
            ));
        }
        if self.keeper_account.is_null()
            || self.liquidator_account.is_null()
            || self.owner_account.is_null()
        {
            return Err(ConfigError::Invalid("accounts must be non-null"));
        }
        Ok(())
    }

    /// Engine parameters named by `engine_config_path`
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        match &self.engine_config_path {
            Some(path) => Ok(EngineConfig::from_toml_str(&read_expanded(path)?)?),
            None => Ok(EngineConfig::default_local()),
        }
    }

    /// Local simulation defaults
    pub fn default_local() -> Self {
        Self {
            poll_interval_secs: 10,
            keeper_account: AccountId(100),
            liquidator_account: AccountId(101),
            owner_account: AccountId(1),
            max_liquidations_per_tick: 10,
            restake: false,
            liquidator_float: 1_000_000_000_000, // 1M at 6 decimals
            engine_config_path: None,
        }
    }
}

fn read_expanded(path: &str) -> Result<String, ConfigError> {
    let expanded = shellexpand::tilde(path);
    std::fs::read_to_string(Path::new(expanded.as_ref())).map_err(|source| ConfigError::Io {
        path: expanded.to_string(),
        source,
    })
}
