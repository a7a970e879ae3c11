//! Messages accepted by the engine and events it emits.
//!
//! User messages are signed by the host (the `creator`/`bettor` field is the
//! authenticated signer). Oracle messages wrap a multi-signed ticket whose
//! payload is one of the `*Payload` types below.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::bet::BetResult;
use crate::types::house::{AuthorizationKind, WithdrawalMode};
use crate::types::market::{MarketOdds, MarketStatus};
use crate::types::odds::OddsKind;
use crate::types::Amount;

// ============================================================================
// User messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeposit {
    pub creator: String,
    pub depositor: String,
    pub market_uid: String,
    pub amount: Amount,
}

impl MsgDeposit {
    /// Deposit signed by the depositor itself.
    pub fn new(depositor: impl Into<String>, market_uid: impl Into<String>, amount: Amount) -> Self {
        let depositor = depositor.into();
        Self {
            creator: depositor.clone(),
            depositor,
            market_uid: market_uid.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWithdraw {
    pub creator: String,
    pub depositor: String,
    pub market_uid: String,
    pub participation_index: u64,
    pub amount: Amount,
    pub mode: WithdrawalMode,
}

impl MsgWithdraw {
    pub fn new(
        depositor: impl Into<String>,
        market_uid: impl Into<String>,
        participation_index: u64,
        amount: Amount,
        mode: WithdrawalMode,
    ) -> Self {
        let depositor = depositor.into();
        Self {
            creator: depositor.clone(),
            depositor,
            market_uid: market_uid.into(),
            participation_index,
            amount,
            mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgPlaceBet {
    pub bettor: String,
    pub bet_uid: String,
    pub market_uid: String,
    pub odds_uid: String,
    pub odds_value: String,
    pub odds_kind: OddsKind,
    pub amount: Amount,
    /// Oracle-signed authorization for exactly this bet.
    pub ticket: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgGrantAuthorization {
    pub granter: String,
    pub grantee: String,
    pub market_uid: String,
    pub kind: AuthorizationKind,
    pub spend_limit: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRevokeAuthorization {
    pub granter: String,
    pub grantee: String,
    pub market_uid: String,
    pub kind: AuthorizationKind,
}

/// Oracle message: the payload travels inside the signed ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgOracle {
    pub creator: String,
    pub ticket: String,
}

impl MsgOracle {
    pub fn new(creator: impl Into<String>, ticket: impl Into<String>) -> Self {
        Self {
            creator: creator.into(),
            ticket: ticket.into(),
        }
    }
}

/// Every message the engine dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    Deposit(MsgDeposit),
    Withdraw(MsgWithdraw),
    PlaceBet(MsgPlaceBet),
    GrantAuthorization(MsgGrantAuthorization),
    RevokeAuthorization(MsgRevokeAuthorization),
    AddMarket(MsgOracle),
    UpdateMarket(MsgOracle),
    ResolveMarket(MsgOracle),
    CancelMarket(MsgOracle),
    AbortMarket(MsgOracle),
    UpdateOvmKeys(MsgOracle),
}

impl Msg {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Msg::Deposit(_) => "deposit",
            Msg::Withdraw(_) => "withdraw",
            Msg::PlaceBet(_) => "place_bet",
            Msg::GrantAuthorization(_) => "grant_authorization",
            Msg::RevokeAuthorization(_) => "revoke_authorization",
            Msg::AddMarket(_) => "add_market",
            Msg::UpdateMarket(_) => "update_market",
            Msg::ResolveMarket(_) => "resolve_market",
            Msg::CancelMarket(_) => "cancel_market",
            Msg::AbortMarket(_) => "abort_market",
            Msg::UpdateOvmKeys(_) => "update_ovm_keys",
        }
    }
}

// ============================================================================
// Oracle payloads
// ============================================================================

/// Action a ticket authorizes.
///
/// Signed inside every payload; a handler only accepts tickets issued for
/// its own action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    AddMarket,
    UpdateMarket,
    ResolveMarket,
    CancelMarket,
    AbortMarket,
    UpdateOvmKeys,
    PlaceBet,
}

impl TicketKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketKind::AddMarket => "add_market",
            TicketKind::UpdateMarket => "update_market",
            TicketKind::ResolveMarket => "resolve_market",
            TicketKind::CancelMarket => "cancel_market",
            TicketKind::AbortMarket => "abort_market",
            TicketKind::UpdateOvmKeys => "update_ovm_keys",
            TicketKind::PlaceBet => "place_bet",
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddMarketPayload {
    pub kind: TicketKind,
    pub uid: String,
    pub start_ts: u64,
    pub end_ts: u64,
    pub odds: Vec<MarketOdds>,
    #[serde(default)]
    pub meta: String,
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMarketPayload {
    pub kind: TicketKind,
    pub uid: String,
    pub start_ts: u64,
    pub end_ts: u64,
    pub odds: Vec<MarketOdds>,
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveMarketPayload {
    pub kind: TicketKind,
    pub uid: String,
    pub winner_odds_uid: String,
    pub resolution_ts: u64,
    pub exp: u64,
}

/// Shared by cancel and abort; `kind` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloseMarketPayload {
    pub kind: TicketKind,
    pub uid: String,
    #[serde(default)]
    pub reason: String,
    pub exp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateOvmKeysPayload {
    pub kind: TicketKind,
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
    pub exp: u64,
}

/// Authorization for one specific bet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BetTicketPayload {
    pub kind: TicketKind,
    pub bet_uid: String,
    pub market_uid: String,
    pub odds_uid: String,
    pub odds_value: String,
    pub odds_kind: OddsKind,
    /// Cap on the bet's payout profit; zero means no cap.
    #[serde(default)]
    pub max_loss: Amount,
    pub exp: u64,
}

// ============================================================================
// Events
// ============================================================================

/// Observable outcome of a handler or of end-block processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    MarketCreated {
        uid: String,
        odds_count: u32,
    },
    MarketUpdated {
        uid: String,
    },
    MarketResolved {
        uid: String,
        winner_odds_uid: String,
    },
    MarketCanceled {
        uid: String,
        reason: String,
    },
    MarketAborted {
        uid: String,
        reason: String,
    },
    MarketSettled {
        uid: String,
        status: MarketStatus,
    },
    Deposited {
        depositor: String,
        market_uid: String,
        participation_index: u64,
        amount: Amount,
        fee: Amount,
        liquidity: Amount,
    },
    Withdrawn {
        depositor: String,
        market_uid: String,
        participation_index: u64,
        withdrawal_id: u64,
        amount: Amount,
    },
    BetPlaced {
        bettor: String,
        bet_uid: String,
        market_uid: String,
        amount: Amount,
        payout_profit: Amount,
        fulfillments: u32,
    },
    BetSettled {
        bettor: String,
        bet_uid: String,
        market_uid: String,
        result: BetResult,
        paid_to_bettor: Amount,
    },
    AuthorizationGranted {
        granter: String,
        grantee: String,
        market_uid: String,
        kind: AuthorizationKind,
        spend_limit: Amount,
    },
    AuthorizationRevoked {
        granter: String,
        grantee: String,
        market_uid: String,
        kind: AuthorizationKind,
    },
    OvmKeysUpdated {
        key_count: u32,
    },
}

/// Result of a committed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxResponse {
    pub events: Vec<Event>,
}
