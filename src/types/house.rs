//! House ledger records: deposits, withdrawals and delegated authorizations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Amount;

/// A house deposit into a market, one per participation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub depositor: String,
    /// Address that signed the deposit (differs from `depositor` under an authorization).
    pub creator: String,
    pub market_uid: String,
    pub participation_index: u64,
    /// Gross amount taken from the depositor.
    pub amount: Amount,
    pub fee: Amount,
    /// Effective liquidity (amount minus fee).
    pub liquidity: Amount,
    pub withdrawal_count: u64,
    pub total_withdrawn: Amount,
    pub created_at: u64,
}

/// Withdrawal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalMode {
    /// Take everything that is withdrawable.
    Full,
    /// Take part of it.
    Partial,
}

/// A withdrawal from a settled participation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: u64,
    pub depositor: String,
    pub creator: String,
    pub market_uid: String,
    pub participation_index: u64,
    pub amount: Amount,
    pub mode: WithdrawalMode,
    pub height: u64,
}

/// What a delegated grant allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationKind {
    Deposit,
    Withdraw,
}

impl AuthorizationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorizationKind::Deposit => "DEPOSIT",
            AuthorizationKind::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for AuthorizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability letting `grantee` act for `granter` on one market, up to
/// `spend_limit` atoms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub granter: String,
    pub grantee: String,
    pub market_uid: String,
    pub kind: AuthorizationKind,
    pub spend_limit: Amount,
}

impl Authorization {
    /// Consume `amount` of the allowance; returns `None` if it is not enough.
    pub fn spend(&mut self, amount: Amount) -> Option<Amount> {
        if amount > self.spend_limit {
            return None;
        }
        self.spend_limit -= amount;
        Some(self.spend_limit)
    }

    pub fn is_exhausted(&self) -> bool {
        self.spend_limit <= 0
    }
}
