//! Market entity and its status machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::odds::OddsKind;
use crate::types::Amount;

/// Market status.
///
/// ```text
/// ACTIVE ──resolve──> RESULT_DECLARED ──queue drained──> RESOLVED
///   │                      │
///   ├──cancel──────────────┴──> CANCELED
///   └──abort───────────────┴──> ABORTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
    Active,
    ResultDeclared,
    Resolved,
    Canceled,
    Aborted,
}

impl MarketStatus {
    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MarketStatus::Resolved | MarketStatus::Canceled | MarketStatus::Aborted
        )
    }

    /// Pending bets of a market in this status may be settled.
    pub fn is_settleable(self) -> bool {
        matches!(
            self,
            MarketStatus::ResultDeclared | MarketStatus::Canceled | MarketStatus::Aborted
        )
    }

    /// Bets are refunded instead of won or lost.
    pub fn is_refund(self) -> bool {
        matches!(self, MarketStatus::Canceled | MarketStatus::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarketStatus::Active => "ACTIVE",
            MarketStatus::ResultDeclared => "RESULT_DECLARED",
            MarketStatus::Resolved => "RESOLVED",
            MarketStatus::Canceled => "CANCELED",
            MarketStatus::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outcome of a market, quoted in one odds convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOdds {
    pub uid: String,
    pub kind: OddsKind,
    pub value: String,
    /// Cap on the total payout profit locked against this outcome.
    #[serde(default)]
    pub max_loss: Option<Amount>,
    #[serde(default)]
    pub meta: String,
}

impl MarketOdds {
    pub fn new(uid: impl Into<String>, kind: OddsKind, value: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind,
            value: value.into(),
            max_loss: None,
            meta: String::new(),
        }
    }

    pub fn with_max_loss(mut self, max_loss: Amount) -> Self {
        self.max_loss = Some(max_loss);
        self
    }

    /// Same quote and cap as `other` (meta is informational).
    pub fn same_terms(&self, other: &MarketOdds) -> bool {
        self.kind == other.kind && self.value == other.value && self.max_loss == other.max_loss
    }
}

/// A real-world event with mutually exclusive outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub uid: String,
    pub status: MarketStatus,
    /// Unix seconds; placement closes here when non-zero.
    pub start_ts: u64,
    pub end_ts: u64,
    pub odds: Vec<MarketOdds>,
    pub winner_odds_uid: Option<String>,
    pub meta: String,
    /// Address that submitted the oracle message.
    pub creator: String,
    pub resolution_ts: Option<u64>,
}

impl Market {
    pub fn find_odds(&self, odds_uid: &str) -> Option<&MarketOdds> {
        self.odds.iter().find(|o| o.uid == odds_uid)
    }

    pub fn odds_uids(&self) -> Vec<String> {
        self.odds.iter().map(|o| o.uid.clone()).collect()
    }

    /// Bets can no longer be placed at `now`.
    pub fn placement_closed(&self, now: u64) -> bool {
        self.status != MarketStatus::Active || (self.start_ts > 0 && now >= self.start_ts)
    }

    /// Whether `odds_uid` is the declared winner.
    pub fn is_winner(&self, odds_uid: &str) -> bool {
        self.winner_odds_uid.as_deref() == Some(odds_uid)
    }
}
