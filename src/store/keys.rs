//! Persisted key layout.
//!
//! Every key starts with an ASCII entity prefix (`M/`, `OB/`, ...). Variable
//! fields follow with a big-endian `u16` length, so a string component is
//! at most [`MAX_COMPONENT_LEN`] bytes; integers are fixed-width
//! big-endian `u64`. Prefix iteration over such keys yields entities in a
//! deterministic order, and integer components (participation index, queue
//! sequence) iterate numerically.
//!
//! | Prefix | Key | Value |
//! |--------|-----|-------|
//! | `M/` | market | `Market` |
//! | `OB/` | market | `OrderBook` |
//! | `PART/` | market, index | `Participation` |
//! | `OE/` | market, odds | `OddsExposure` |
//! | `PE/` | market, odds, index | `ParticipationExposure` |
//! | `DEP/` | depositor, market, index | `Deposit` |
//! | `WD/` | depositor, market, index, id | `Withdrawal` |
//! | `AUTHZ/` | granter, grantee, kind, market | `Authorization` |
//! | `B/` | bettor, uid | `Bet` |
//! | `BUID/` | uid | `BetRef` |
//! | `BM/` | market, seq | `BetRef` |
//! | `SQ/` | market, seq | `SettlementQueueItem` |
//! | `SQC/` | market | `u64` last sequence |
//! | `SM/` | market | market uid (settleable) |
//! | `PARAMS/` | module | params |
//! | `OVM/` | `keys` | `OvmKeySet` |
//! | `BANK/` | address | balance |

use crate::error::{EngineError, Result};
use crate::types::AuthorizationKind;

/// Longest string component a key can frame.
pub const MAX_COMPONENT_LEN: usize = u16::MAX as usize;

pub const MARKET: &[u8] = b"M/";
pub const ORDER_BOOK: &[u8] = b"OB/";
pub const PARTICIPATION: &[u8] = b"PART/";
pub const ODDS_EXPOSURE: &[u8] = b"OE/";
pub const PARTICIPATION_EXPOSURE: &[u8] = b"PE/";
pub const DEPOSIT: &[u8] = b"DEP/";
pub const WITHDRAWAL: &[u8] = b"WD/";
pub const AUTHORIZATION: &[u8] = b"AUTHZ/";
pub const BET: &[u8] = b"B/";
pub const BET_UID: &[u8] = b"BUID/";
pub const BET_BY_MARKET: &[u8] = b"BM/";
pub const SETTLEMENT_QUEUE: &[u8] = b"SQ/";
pub const SETTLEMENT_SEQ: &[u8] = b"SQC/";
pub const SETTLEABLE_MARKET: &[u8] = b"SM/";
pub const PARAMS: &[u8] = b"PARAMS/";
pub const OVM: &[u8] = b"OVM/";
pub const BANK: &[u8] = b"BANK/";

/// Incremental key builder.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    pub fn new(prefix: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(prefix.len() + 32);
        buf.extend_from_slice(prefix);
        Self { buf }
    }

    /// Append a length-prefixed string component.
    ///
    /// Fails on components longer than [`MAX_COMPONENT_LEN`] bytes.
    pub fn str(mut self, s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| EngineError::KeyTooLong {
            len: bytes.len(),
            max: MAX_COMPONENT_LEN,
        })?;
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(bytes);
        Ok(self)
    }

    /// Append a fixed-width big-endian integer component.
    pub fn u64(mut self, n: u64) -> Self {
        self.buf.extend_from_slice(&n.to_be_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// Decode the trailing big-endian `u64` of a key.
pub fn trailing_u64(key: &[u8]) -> Option<u64> {
    let start = key.len().checked_sub(8)?;
    let bytes: [u8; 8] = key[start..].try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

// ============================================================================
// Market / order book
// ============================================================================

pub fn market(uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(MARKET).str(uid)?.build())
}

pub fn order_book(market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(ORDER_BOOK).str(market_uid)?.build())
}

pub fn participation(market_uid: &str, index: u64) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(PARTICIPATION).str(market_uid)?.u64(index).build())
}

pub fn participations_of(market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(PARTICIPATION).str(market_uid)?.build())
}

pub fn odds_exposure(market_uid: &str, odds_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(ODDS_EXPOSURE).str(market_uid)?.str(odds_uid)?.build())
}

pub fn odds_exposures_of(market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(ODDS_EXPOSURE).str(market_uid)?.build())
}

pub fn participation_exposure(market_uid: &str, odds_uid: &str, index: u64) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(PARTICIPATION_EXPOSURE)
        .str(market_uid)?
        .str(odds_uid)?
        .u64(index)
        .build())
}

pub fn participation_exposures_of(market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(PARTICIPATION_EXPOSURE).str(market_uid)?.build())
}

pub fn participation_exposures_of_odds(market_uid: &str, odds_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(PARTICIPATION_EXPOSURE).str(market_uid)?.str(odds_uid)?.build())
}

// ============================================================================
// House
// ============================================================================

pub fn deposit(depositor: &str, market_uid: &str, index: u64) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(DEPOSIT).str(depositor)?.str(market_uid)?.u64(index).build())
}

pub fn deposits_of(depositor: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(DEPOSIT).str(depositor)?.build())
}

pub fn withdrawal(depositor: &str, market_uid: &str, index: u64, id: u64) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(WITHDRAWAL)
        .str(depositor)?
        .str(market_uid)?
        .u64(index)
        .u64(id)
        .build())
}

pub fn withdrawals_of(depositor: &str, market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(WITHDRAWAL).str(depositor)?.str(market_uid)?.build())
}

pub fn authorization(
    granter: &str,
    grantee: &str,
    kind: AuthorizationKind,
    market_uid: &str,
) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(AUTHORIZATION)
        .str(granter)?
        .str(grantee)?
        .str(kind.as_str())?
        .str(market_uid)?
        .build())
}

// ============================================================================
// Bets
// ============================================================================

pub fn bet(bettor: &str, uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(BET).str(bettor)?.str(uid)?.build())
}

pub fn bet_uid(uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(BET_UID).str(uid)?.build())
}

pub fn bet_by_market(market_uid: &str, seq: u64) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(BET_BY_MARKET).str(market_uid)?.u64(seq).build())
}

pub fn bets_by_market(market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(BET_BY_MARKET).str(market_uid)?.build())
}

pub fn settlement_item(market_uid: &str, seq: u64) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(SETTLEMENT_QUEUE).str(market_uid)?.u64(seq).build())
}

pub fn settlement_queue(market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(SETTLEMENT_QUEUE).str(market_uid)?.build())
}

pub fn settlement_seq(market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(SETTLEMENT_SEQ).str(market_uid)?.build())
}

pub fn settleable_market(market_uid: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(SETTLEABLE_MARKET).str(market_uid)?.build())
}

// ============================================================================
// Params, oracle, bank
// ============================================================================

pub fn params(module: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(PARAMS).str(module)?.build())
}

pub fn ovm_keys() -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(OVM).str("keys")?.build())
}

pub fn balance(address: &str) -> Result<Vec<u8>> {
    Ok(KeyBuilder::new(BANK).str(address)?.build())
}
