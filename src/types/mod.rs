//! Core data types of the wagering engine.
//!
//! ## Types
//!
//! - [`OddsKind`]: decimal, fractional and moneyline odds arithmetic
//! - [`Market`], [`MarketOdds`], [`MarketStatus`]: oracle-governed events
//! - [`OrderBook`], [`Participation`], [`OddsExposure`], [`ParticipationExposure`]: house liquidity
//! - [`Deposit`], [`Withdrawal`], [`Authorization`]: house ledger
//! - [`Bet`], [`BetFulfillment`], [`SettlementQueueItem`]: bets
//! - [`BlockReceipt`]: end-of-block summary
//!
//! ## Numbers
//!
//! Token quantities are [`Amount`] atoms (`i128`). Ratios are
//! `rust_decimal::Decimal` with at most 18 fractional digits (see [`dec`]).

pub mod dec;
pub mod odds;
pub mod market;
pub mod orderbook;
pub mod house;
pub mod bet;
pub mod params;
pub mod msgs;
mod receipt;

/// Token quantity in atoms.
pub type Amount = i128;

pub use odds::OddsKind;
pub use market::{Market, MarketOdds, MarketStatus};
pub use orderbook::{OddsExposure, OrderBook, OrderBookStatus, Participation, ParticipationExposure};
pub use house::{Authorization, AuthorizationKind, Deposit, Withdrawal, WithdrawalMode};
pub use bet::{Bet, BetFulfillment, BetRef, BetResult, BetStatus, SettlementQueueItem};
pub use params::{BetParams, HouseParams, MarketParams, PlacementConstraints};
pub use msgs::{Event, Msg, TxResponse};
pub use receipt::BlockReceipt;
