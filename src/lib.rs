//! # Wagerbook
//!
//! Deterministic sports-wagering engine: oracle-managed markets, house
//! liquidity order books and batched bet settlement.
//!
//! ## Architecture
//!
//! - **Types**: odds arithmetic, entities, messages, parameters
//! - **Store**: ordered byte-keyed store with a transactional cache
//! - **Bank**: balances and module accounts
//! - **OVM**: oracle key set and multi-signed tickets
//! - **Market / OrderBook / House / Bet**: the state-machine components
//! - **Engine**: block lifecycle and atomic message dispatch
//!
//! ## Design Principles
//!
//! 1. **Determinism**: identical inputs produce identical state roots
//! 2. **No Floating Point**: integer atoms and 18-digit decimals truncated toward zero
//! 3. **Atomicity**: a failed message leaves no trace
//! 4. **Synchronous Execution**: one message at a time, no async

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: odds, markets, bets, order-book records, messages
pub mod types;

/// Error type with stable codes
pub mod error;

/// Key-value store, cache overlay and key layout
pub mod store;

/// Balances and module accounts
pub mod bank;

/// Oracle keys and signed tickets
pub mod ovm;

/// Market lifecycle
pub mod market;

/// House order books: liquidity, placement, settlement of exposures
pub mod orderbook;

/// House deposits, withdrawals and authorizations
pub mod house;

/// Bet placement and batched settlement
pub mod bet;

/// Engine facade
pub mod engine;

/// TOML configuration and logging
pub mod config;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::EngineConfig;
pub use engine::{Engine, Genesis};
pub use error::{EngineError, Result};
pub use types::{Amount, BlockReceipt, Event, Msg, OddsKind, TxResponse};
