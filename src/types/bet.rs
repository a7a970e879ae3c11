//! Bet entity, its fulfillments and the settlement queue item.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::dec::checked_add;
use crate::types::odds::OddsKind;
use crate::types::Amount;

/// Lifecycle status of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    /// Liability locked, waiting for the market outcome
    Pending,
    /// Won or lost and paid out
    Settled,
    /// Refunded because the market was canceled or aborted
    Canceled,
}

/// Outcome recorded on settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetResult {
    Pending,
    Won,
    Lost,
    Refunded,
}

/// The share of a bet backed by one participation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetFulfillment {
    pub participation_index: u64,
    /// Depositor of the participation, kept for event reporting.
    pub participant: String,
    /// Part of the bettor's stake attributed to this participation.
    pub bet_amount: Amount,
    /// Profit this participation owes if the bet wins.
    pub payout_profit: Amount,
}

/// A placed bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub uid: String,
    pub bettor: String,
    pub market_uid: String,
    pub odds_uid: String,
    pub odds_kind: OddsKind,
    pub odds_value: String,
    /// Stake in atoms (excludes fee).
    pub amount: Amount,
    pub fee: Amount,
    pub payout_profit: Amount,
    pub fulfillments: Vec<BetFulfillment>,
    pub status: BetStatus,
    pub result: BetResult,
    /// Placement sequence within the market.
    pub seq: u64,
    pub created_at: u64,
    pub settled_at: Option<u64>,
    pub settled_height: Option<u64>,
}

impl Bet {
    pub fn is_pending(&self) -> bool {
        self.status == BetStatus::Pending
    }

    /// Total payout the bettor receives when the bet wins.
    pub fn payout(&self) -> Result<Amount> {
        checked_add(self.amount, self.payout_profit, "bet payout")
    }

    pub fn fulfilled_amount(&self) -> Amount {
        self.fulfillments.iter().map(|f| f.bet_amount).sum()
    }

    pub fn fulfilled_profit(&self) -> Amount {
        self.fulfillments.iter().map(|f| f.payout_profit).sum()
    }
}

/// Entry in a market's FIFO settlement queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementQueueItem {
    pub market_uid: String,
    pub seq: u64,
    pub bet_uid: String,
    pub bettor: String,
}

/// Reference from a bet UID (or market sequence) to its bet key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRef {
    pub bettor: String,
    pub bet_uid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bet() -> Bet {
        Bet {
            uid: "b1".into(),
            bettor: "alice".into(),
            market_uid: "m1".into(),
            odds_uid: "a".into(),
            odds_kind: OddsKind::Decimal,
            odds_value: "2.0".into(),
            amount: 100,
            fee: 1,
            payout_profit: 100,
            fulfillments: vec![
                BetFulfillment { participation_index: 1, participant: "h1".into(), bet_amount: 60, payout_profit: 60 },
                BetFulfillment { participation_index: 2, participant: "h2".into(), bet_amount: 40, payout_profit: 40 },
            ],
            status: BetStatus::Pending,
            result: BetResult::Pending,
            seq: 1,
            created_at: 0,
            settled_at: None,
            settled_height: None,
        }
    }

    #[test]
    fn test_fulfillment_sums() {
        let b = bet();
        assert_eq!(b.fulfilled_amount(), b.amount);
        assert_eq!(b.fulfilled_profit(), b.payout_profit);
        assert_eq!(b.payout().unwrap(), 200);
        assert!(b.is_pending());
    }

    #[test]
    fn test_payout_overflow_is_an_error() {
        let mut b = bet();
        b.amount = Amount::MAX - 50;
        let err = b.payout().unwrap_err();
        assert_eq!(err.code(), "ARITHMETIC_OVERFLOW");

        b.amount = Amount::MAX - 100;
        assert_eq!(b.payout().unwrap(), Amount::MAX);
    }

    #[test]
    fn test_bincode_roundtrip_is_deterministic() {
        let b = bet();
        let bytes1 = bincode::serialize(&b).unwrap();
        let bytes2 = bincode::serialize(&b).unwrap();
        assert_eq!(bytes1, bytes2);
        let back: Bet = bincode::deserialize(&bytes1).unwrap();
        assert_eq!(back, b);
    }
}
