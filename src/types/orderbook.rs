//! Order-book records: one book per market, one participation per house
//! deposit, and exposure records per odds.
//!
//! ## Liability model
//!
//! A participation backs every odds of its market but only one odds can
//! win, so its worst-case loss is its largest single-odds exposure:
//!
//! ```text
//! locked_liability      = max(exposure on each odds)
//! current_round_liquidity = liquidity - locked_liability
//! capacity on odds o    = current_round_max_loss - exposure on o
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Amount;

/// Order book status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderBookStatus {
    Active,
    Settled,
}

/// Per-market liquidity book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub market_uid: String,
    /// Index assigned to the most recent participation (starts at 0, first is 1).
    pub participation_index: u64,
    pub odds_count: u32,
    pub status: OrderBookStatus,
    /// Sum of effective liquidity of every participation.
    pub total_liquidity: Amount,
}

impl OrderBook {
    pub fn new(market_uid: impl Into<String>, odds_count: u32) -> Self {
        Self {
            market_uid: market_uid.into(),
            participation_index: 0,
            odds_count,
            status: OrderBookStatus::Active,
            total_liquidity: 0,
        }
    }

    /// Reserve the next participation index.
    pub fn next_index(&mut self) -> u64 {
        self.participation_index += 1;
        self.participation_index
    }
}

/// One house deposit round backing a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub index: u64,
    pub market_uid: String,
    pub depositor: String,
    /// Effective liquidity (deposit minus participation fee).
    pub liquidity: Amount,
    pub fee: Amount,
    pub current_round_liquidity: Amount,
    pub current_round_max_loss: Amount,
    /// Largest exposure over all odds.
    pub locked_liability: Amount,
    /// Stakes attributed to this participation over its lifetime.
    pub total_bet_amount: Amount,
    /// Realized profit (positive) or loss (negative) from settled bets.
    pub actual_profit: Amount,
    pub is_settled: bool,
}

impl Participation {
    pub fn new(
        index: u64,
        market_uid: impl Into<String>,
        depositor: impl Into<String>,
        liquidity: Amount,
        fee: Amount,
    ) -> Self {
        Self {
            index,
            market_uid: market_uid.into(),
            depositor: depositor.into(),
            liquidity,
            fee,
            current_round_liquidity: liquidity,
            current_round_max_loss: liquidity,
            locked_liability: 0,
            total_bet_amount: 0,
            actual_profit: 0,
            is_settled: false,
        }
    }

    /// Remaining capacity against an odds on which `exposure` is locked.
    #[inline]
    pub fn capacity(&self, exposure: Amount) -> Amount {
        (self.current_round_max_loss - exposure).max(0)
    }

    /// Recompute liquidity after the locked liability changed.
    pub fn relock(&mut self, locked_liability: Amount) {
        self.locked_liability = locked_liability;
        self.current_round_liquidity = self.liquidity - locked_liability;
    }

    /// Amount the depositor may take out once settled, before withdrawals.
    pub fn settled_balance(&self) -> Amount {
        self.liquidity + self.actual_profit
    }
}

/// Per-(market, odds) view of which participations may back the odds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OddsExposure {
    pub market_uid: String,
    pub odds_uid: String,
    /// Participation indices in deposit order.
    pub fulfillment_queue: Vec<u64>,
    /// Payout profit locked across all participations.
    pub total_locked: Amount,
}

impl OddsExposure {
    pub fn new(market_uid: impl Into<String>, odds_uid: impl Into<String>) -> Self {
        Self {
            market_uid: market_uid.into(),
            odds_uid: odds_uid.into(),
            fulfillment_queue: Vec::new(),
            total_locked: 0,
        }
    }

    /// Insert keeping the queue ordered by index.
    pub fn enqueue(&mut self, index: u64) {
        if let Err(pos) = self.fulfillment_queue.binary_search(&index) {
            self.fulfillment_queue.insert(pos, index);
        }
    }

    pub fn dequeue(&mut self, index: u64) {
        self.fulfillment_queue.retain(|i| *i != index);
    }
}

/// Exposure of one participation on one odds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationExposure {
    pub market_uid: String,
    pub odds_uid: String,
    pub participation_index: u64,
    /// Payout profit currently locked.
    pub exposure: Amount,
    /// Stake currently attributed.
    pub bet_amount: Amount,
    /// Capacity on this odds is exhausted.
    pub is_fulfilled: bool,
    pub is_settled: bool,
}

impl ParticipationExposure {
    pub fn new(market_uid: impl Into<String>, odds_uid: impl Into<String>, index: u64) -> Self {
        Self {
            market_uid: market_uid.into(),
            odds_uid: odds_uid.into(),
            participation_index: index,
            exposure: 0,
            bet_amount: 0,
            is_fulfilled: false,
            is_settled: false,
        }
    }
}
