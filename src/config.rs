//! Engine configuration loading and validation.
//!
//! Configuration is read from a TOML file. Every section is optional and
//! defaults to the module defaults:
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "pretty"      # or "json"
//!
//! [bet]
//! batch_settlement_count = 1000
//! max_bet_by_uid_query_count = 10
//! min_amount = 1000000
//! bet_fee = 100
//!
//! [house]
//! min_deposit = 100
//! house_participation_fee = "0.1"
//!
//! [market]
//! allowed_odds_kinds = ["decimal", "fractional", "moneyline"]
//! max_odds_count = 32
//!
//! [ovm]
//! keys = ["<hex ed25519 public key>"]
//! threshold = 1
//!
//! [[accounts]]
//! address = "house"
//! balance = 1000000
//! ```
//!
//! TOML integers are 64-bit; amounts are widened on the way into the engine.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::engine::Genesis;
use crate::error::{EngineError, Result};
use crate::ovm::OvmKeySet;
use crate::types::params::{
    DEFAULT_BATCH_SETTLEMENT_COUNT, DEFAULT_BET_FEE, DEFAULT_MAX_BET_BY_UID_QUERY_COUNT,
    DEFAULT_MAX_ODDS_COUNT, DEFAULT_MIN_BET_AMOUNT, DEFAULT_MIN_DEPOSIT,
};
use crate::types::{Amount, BetParams, HouseParams, MarketParams, OddsKind, PlacementConstraints};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub bet: BetConfig,
    #[serde(default)]
    pub house: HouseConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub ovm: Option<OvmConfig>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".into()
}

fn default_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber. `RUST_LOG` overrides the level.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BetConfig {
    #[serde(default = "default_batch_settlement_count")]
    pub batch_settlement_count: u32,
    #[serde(default = "default_max_bet_by_uid_query_count")]
    pub max_bet_by_uid_query_count: u32,
    #[serde(default = "default_min_amount")]
    pub min_amount: i64,
    #[serde(default = "default_bet_fee")]
    pub bet_fee: i64,
}

const fn default_batch_settlement_count() -> u32 {
    DEFAULT_BATCH_SETTLEMENT_COUNT
}

const fn default_max_bet_by_uid_query_count() -> u32 {
    DEFAULT_MAX_BET_BY_UID_QUERY_COUNT
}

const fn default_min_amount() -> i64 {
    DEFAULT_MIN_BET_AMOUNT as i64
}

const fn default_bet_fee() -> i64 {
    DEFAULT_BET_FEE as i64
}

impl Default for BetConfig {
    fn default() -> Self {
        Self {
            batch_settlement_count: default_batch_settlement_count(),
            max_bet_by_uid_query_count: default_max_bet_by_uid_query_count(),
            min_amount: default_min_amount(),
            bet_fee: default_bet_fee(),
        }
    }
}

impl From<&BetConfig> for BetParams {
    fn from(config: &BetConfig) -> Self {
        Self {
            batch_settlement_count: config.batch_settlement_count,
            max_bet_by_uid_query_count: config.max_bet_by_uid_query_count,
            placement_constraints: PlacementConstraints {
                min_amount: Amount::from(config.min_amount),
                bet_fee: Amount::from(config.bet_fee),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HouseConfig {
    #[serde(default = "default_min_deposit")]
    pub min_deposit: i64,
    /// Fraction of every deposit kept as fee (e.g. "0.1").
    #[serde(default = "default_participation_fee")]
    pub house_participation_fee: Decimal,
}

const fn default_min_deposit() -> i64 {
    DEFAULT_MIN_DEPOSIT as i64
}

fn default_participation_fee() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            min_deposit: default_min_deposit(),
            house_participation_fee: default_participation_fee(),
        }
    }
}

impl From<&HouseConfig> for HouseParams {
    fn from(config: &HouseConfig) -> Self {
        Self {
            min_deposit: Amount::from(config.min_deposit),
            house_participation_fee: config.house_participation_fee,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_allowed_odds_kinds")]
    pub allowed_odds_kinds: Vec<OddsKind>,
    #[serde(default = "default_max_odds_count")]
    pub max_odds_count: u32,
}

fn default_allowed_odds_kinds() -> Vec<OddsKind> {
    OddsKind::ALL.to_vec()
}

const fn default_max_odds_count() -> u32 {
    DEFAULT_MAX_ODDS_COUNT
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            allowed_odds_kinds: default_allowed_odds_kinds(),
            max_odds_count: default_max_odds_count(),
        }
    }
}

impl From<&MarketConfig> for MarketParams {
    fn from(config: &MarketConfig) -> Self {
        Self {
            allowed_odds_kinds: config.allowed_odds_kinds.clone(),
            max_odds_count: config.max_odds_count,
        }
    }
}

/// Oracle public keys (hex) and signature threshold.
#[derive(Debug, Clone, Deserialize)]
pub struct OvmConfig {
    pub keys: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

const fn default_threshold() -> u32 {
    1
}

/// Genesis balance.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub address: String,
    pub balance: i64,
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| EngineError::ParamInvalidType {
            param: "config".into(),
            reason: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        BetParams::from(&self.bet).validate()?;
        HouseParams::from(&self.house).validate()?;
        MarketParams::from(&self.market).validate()?;
        if let Some(ovm) = &self.ovm {
            OvmKeySet::new(ovm.keys.clone(), ovm.threshold)?;
        }
        for account in &self.accounts {
            if account.balance < 0 {
                return Err(EngineError::ParamOutOfRange {
                    param: "accounts.balance",
                    reason: format!("{} has negative balance {}", account.address, account.balance),
                });
            }
        }
        Ok(())
    }

    /// Genesis state described by this configuration.
    pub fn genesis(&self) -> Result<Genesis> {
        let ovm = match &self.ovm {
            Some(c) => Some(OvmKeySet::new(c.keys.clone(), c.threshold)?),
            None => None,
        };
        Ok(Genesis {
            bet: BetParams::from(&self.bet),
            house: HouseParams::from(&self.house),
            market: MarketParams::from(&self.market),
            ovm,
            balances: self
                .accounts
                .iter()
                .map(|a| (a.address.clone(), Amount::from(a.balance)))
                .collect(),
        })
    }
}
