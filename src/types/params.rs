//! Module parameters and their validation.
//!
//! Defaults:
//!
//! | Module | Parameter | Default |
//! |--------|-----------|---------|
//! | bet | `batch_settlement_count` | 1000 |
//! | bet | `max_bet_by_uid_query_count` | 10 |
//! | bet | `placement_constraints.min_amount` | 1_000_000 |
//! | bet | `placement_constraints.bet_fee` | 100 |
//! | house | `min_deposit` | 100 |
//! | house | `house_participation_fee` | 0.1 |
//! | market | `allowed_odds_kinds` | all |
//! | market | `max_odds_count` | 32 |

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::odds::OddsKind;
use crate::types::Amount;

pub const DEFAULT_BATCH_SETTLEMENT_COUNT: u32 = 1000;
pub const DEFAULT_MAX_BET_BY_UID_QUERY_COUNT: u32 = 10;
pub const DEFAULT_MIN_BET_AMOUNT: Amount = 1_000_000;
pub const DEFAULT_BET_FEE: Amount = 100;
pub const DEFAULT_MIN_DEPOSIT: Amount = 100;
pub const DEFAULT_MAX_ODDS_COUNT: u32 = 32;

// ============================================================================
// Bet
// ============================================================================

/// Bet placement limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConstraints {
    pub min_amount: Amount,
    pub bet_fee: Amount,
}

/// Bet module parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetParams {
    pub batch_settlement_count: u32,
    pub max_bet_by_uid_query_count: u32,
    pub placement_constraints: PlacementConstraints,
}

impl Default for BetParams {
    fn default() -> Self {
        Self {
            batch_settlement_count: DEFAULT_BATCH_SETTLEMENT_COUNT,
            max_bet_by_uid_query_count: DEFAULT_MAX_BET_BY_UID_QUERY_COUNT,
            placement_constraints: PlacementConstraints {
                min_amount: DEFAULT_MIN_BET_AMOUNT,
                bet_fee: DEFAULT_BET_FEE,
            },
        }
    }
}

impl BetParams {
    pub fn validate(&self) -> Result<()> {
        if self.batch_settlement_count == 0 {
            return Err(out_of_range("batch_settlement_count", "must be positive"));
        }
        if self.max_bet_by_uid_query_count == 0 {
            return Err(out_of_range("max_bet_by_uid_query_count", "must be positive"));
        }
        if self.placement_constraints.min_amount <= 1 {
            return Err(out_of_range(
                "placement_constraints.min_amount",
                format!("must be more than one, got {}", self.placement_constraints.min_amount),
            ));
        }
        if self.placement_constraints.bet_fee < 0 {
            return Err(out_of_range(
                "placement_constraints.bet_fee",
                format!("can not be negative, got {}", self.placement_constraints.bet_fee),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// House
// ============================================================================

/// House module parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseParams {
    pub min_deposit: Amount,
    pub house_participation_fee: Decimal,
}

impl Default for HouseParams {
    fn default() -> Self {
        Self {
            min_deposit: DEFAULT_MIN_DEPOSIT,
            // 0.1
            house_participation_fee: Decimal::new(1, 1),
        }
    }
}

impl HouseParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_deposit <= 1 {
            return Err(out_of_range(
                "min_deposit",
                format!("must be positive and more than one, got {}", self.min_deposit),
            ));
        }
        let fee = self.house_participation_fee;
        if fee < Decimal::ZERO || fee >= Decimal::ONE {
            return Err(out_of_range(
                "house_participation_fee",
                format!("must be in [0, 1), got {}", fee),
            ));
        }
        if fee.scale() > crate::types::dec::PRECISION {
            return Err(out_of_range(
                "house_participation_fee",
                "more than 18 fractional digits",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Market
// ============================================================================

/// Market module parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    pub allowed_odds_kinds: Vec<OddsKind>,
    pub max_odds_count: u32,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            allowed_odds_kinds: OddsKind::ALL.to_vec(),
            max_odds_count: DEFAULT_MAX_ODDS_COUNT,
        }
    }
}

impl MarketParams {
    pub fn validate(&self) -> Result<()> {
        if self.allowed_odds_kinds.is_empty() {
            return Err(out_of_range("allowed_odds_kinds", "at least one kind is required"));
        }
        if self.max_odds_count < 2 {
            return Err(out_of_range(
                "max_odds_count",
                format!("a market needs at least two outcomes, got {}", self.max_odds_count),
            ));
        }
        Ok(())
    }

    pub fn allows(&self, kind: OddsKind) -> bool {
        self.allowed_odds_kinds.contains(&kind)
    }
}

fn out_of_range(param: &'static str, reason: impl Into<String>) -> EngineError {
    EngineError::ParamOutOfRange {
        param,
        reason: reason.into(),
    }
}
