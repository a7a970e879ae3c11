//! House order books.
//!
//! ## Architecture
//!
//! Each market owns one [`OrderBook`](crate::types::OrderBook). Every house
//! deposit appends a [`Participation`](crate::types::Participation) that
//! backs all odds of the market; per odds, an
//! [`OddsExposure`](crate::types::OddsExposure) keeps the fulfillment queue
//! of participations that can still take liability on it.
//!
//! ## Components
//!
//! - [`liquidity`]: book creation, participations, odds rebalancing
//! - [`placement`]: allocating a bet's payout profit across participations
//! - [`settlement`]: releasing liability and closing the book
//! - [`query`]: read-only access
//!
//! ## Operations
//!
//! | Operation | Reads | Writes |
//! |-----------|-------|--------|
//! | Add participation | book, one exposure per odds | participation, book, exposures |
//! | Place bet | queue walk until covered | touched participations and exposures |
//! | Settle bet | one exposure per fulfillment | same |

pub mod liquidity;
pub mod placement;
pub mod settlement;
pub mod query;

pub use liquidity::{add_participation, init_order_book, rebalance_odds};
pub use placement::{commit, fulfill, plan, FulfillmentPlan};
pub use settlement::{settle_bet_exposures, settle_participations};
