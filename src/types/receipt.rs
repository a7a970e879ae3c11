//! Block receipt summarizing end-of-block settlement.
//!
//! The receipt is SSZ-encoded so every validator produces identical
//! bytes; the state root commits to the whole ordered store.

use ssz_rs::prelude::*;
use sha2::{Sha256, Digest};

/// Receipt produced at the end of every block.
///
/// ## State Root
///
/// The 32-byte state root is a SHA-256 hash over the ordered key/value
/// contents of the store after settlement (see
/// [`crate::store::KvStore::state_root`]).
///
/// ## Example
///
/// ```
/// use wagerbook::types::BlockReceipt;
///
/// let receipt = BlockReceipt::new(
///     7,                      // height
///     3,                      // bets_settled
///     1,                      // markets_settled
///     [0u8; 32],              // state_root
///     1703577600,             // timestamp
/// );
/// assert!(!receipt.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct BlockReceipt {
    /// Block height
    pub height: u64,

    /// Bets settled (won, lost or refunded) during end block
    pub bets_settled: u64,

    /// Markets whose settlement queue drained during end block
    pub markets_settled: u64,

    /// State root after end block (SHA-256, 32 bytes)
    pub state_root: [u8; 32],

    /// Block time in unix seconds
    pub timestamp: u64,
}

impl BlockReceipt {
    pub fn new(
        height: u64,
        bets_settled: u64,
        markets_settled: u64,
        state_root: [u8; 32],
        timestamp: u64,
    ) -> Self {
        Self {
            height,
            bets_settled,
            markets_settled,
            state_root,
            timestamp,
        }
    }

    /// Compute SHA-256 hash of the given data
    pub fn compute_hash(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    /// Get the state root as a hex string
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }

    /// Nothing was settled in this block.
    pub fn is_empty(&self) -> bool {
        self.bets_settled == 0 && self.markets_settled == 0
    }

    /// Deterministic SSZ encoding of the receipt.
    pub fn encode(&self) -> Vec<u8> {
        // fixed-size container of basic types; serialization can not fail
        ssz_rs::serialize(self).unwrap_or_default()
    }
}
