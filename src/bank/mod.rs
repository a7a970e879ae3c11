//! Token balances and module-owned pools.
//!
//! The engine only needs atomic debit/credit between addresses. Balances
//! live in the same ordered store as the rest of the state (under `BANK/`),
//! so a transfer made by a failing handler is discarded together with the
//! handler's other writes.

use tracing::trace;

use crate::error::{EngineError, Result};
use crate::store::{apply_writes, get_value, keys, set_value, CacheStore, KvStore};
use crate::types::dec::checked_add;
use crate::types::Amount;

/// Escrow for pending bet stakes.
pub const BET_RESERVE: &str = "bet_reserve";
/// Escrow for house liquidity and realized house profit.
pub const HOUSE_RESERVE: &str = "house_reserve";
/// Destination of bet fees and house participation fees.
pub const FEE_COLLECTOR: &str = "fee_collector";

/// One leg of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub amount: Amount,
}

impl Transfer {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: Amount) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }
}

/// Account and balance subsystem.
pub trait Bank {
    fn balance(&self, store: &dyn KvStore, address: &str) -> Result<Amount>;

    fn send(&self, store: &mut dyn KvStore, from: &str, to: &str, amount: Amount) -> Result<()>;

    /// Apply every transfer or none of them.
    fn multi_send(&self, store: &mut dyn KvStore, transfers: &[Transfer]) -> Result<()>;

    /// Credit new tokens (genesis and tests).
    fn mint(&self, store: &mut dyn KvStore, address: &str, amount: Amount) -> Result<()>;
}

/// [`Bank`] keeping balances in the engine store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreBank;

impl StoreBank {
    fn write(store: &mut dyn KvStore, address: &str, balance: Amount) -> Result<()> {
        let key = keys::balance(address)?;
        if balance == 0 {
            store.delete(&key);
            Ok(())
        } else {
            set_value(store, key, &balance)
        }
    }
}

impl Bank for StoreBank {
    fn balance(&self, store: &dyn KvStore, address: &str) -> Result<Amount> {
        Ok(get_value::<Amount>(store, &keys::balance(address)?)?.unwrap_or(0))
    }

    fn send(&self, store: &mut dyn KvStore, from: &str, to: &str, amount: Amount) -> Result<()> {
        if amount < 0 {
            return Err(EngineError::InvariantViolation(format!(
                "negative transfer of {} from {} to {}",
                amount, from, to
            )));
        }
        if amount == 0 || from == to {
            return Ok(());
        }

        let from_balance = self.balance(store, from)?;
        if from_balance < amount {
            return Err(EngineError::InsufficientFunds {
                address: from.to_string(),
                balance: from_balance,
                required: amount,
            });
        }
        Self::write(store, from, from_balance - amount)?;

        let to_balance = self.balance(store, to)?;
        Self::write(store, to, checked_add(to_balance, amount, "bank credit")?)?;

        trace!(from, to, amount = %amount, "transfer");
        Ok(())
    }

    fn multi_send(&self, store: &mut dyn KvStore, transfers: &[Transfer]) -> Result<()> {
        let writes = {
            let mut cache = CacheStore::new(&*store);
            for t in transfers {
                self.send(&mut cache, &t.from, &t.to, t.amount)?;
            }
            cache.into_writes()
        };
        apply_writes(store, writes);
        Ok(())
    }

    fn mint(&self, store: &mut dyn KvStore, address: &str, amount: Amount) -> Result<()> {
        if amount < 0 {
            return Err(EngineError::InvariantViolation(format!(
                "negative mint of {} to {}",
                amount, address
            )));
        }
        let balance = self.balance(store, address)?;
        Self::write(store, address, checked_add(balance, amount, "mint")?)
    }
}
