//! Execution context handed to every handler.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bank::{Bank, Transfer};
use crate::error::Result;
use crate::store::{get_value, keys, set_value, values_with_prefix, KvStore};
use crate::types::{Amount, BetParams, Event, HouseParams, MarketParams};

/// Height and time of the block being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockInfo {
    pub height: u64,
    /// Unix seconds
    pub time: u64,
}

/// Store, bank and block clock for one transaction (or one end block).
///
/// Components are free functions over a `Ctx`; they never hold references
/// to each other.
pub struct Ctx<'a> {
    pub store: &'a mut dyn KvStore,
    pub bank: &'a dyn Bank,
    pub block: BlockInfo,
    pub events: Vec<Event>,
}

impl<'a> Ctx<'a> {
    pub fn new(store: &'a mut dyn KvStore, bank: &'a dyn Bank, block: BlockInfo) -> Self {
        Self {
            store,
            bank,
            block,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.block.time
    }

    #[inline]
    pub fn height(&self) -> u64 {
        self.block.height
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    // ========================================================================
    // Typed store access
    // ========================================================================

    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        get_value(&*self.store, key)
    }

    pub fn set<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<()> {
        set_value(&mut *self.store, key, value)
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.store.delete(key);
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.store.has(key)
    }

    pub fn list<T: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>> {
        values_with_prefix(&*self.store, prefix)
    }

    // ========================================================================
    // Bank
    // ========================================================================

    pub fn balance(&self, address: &str) -> Result<Amount> {
        self.bank.balance(&*self.store, address)
    }

    pub fn send(&mut self, from: &str, to: &str, amount: Amount) -> Result<()> {
        self.bank.send(&mut *self.store, from, to, amount)
    }

    pub fn multi_send(&mut self, transfers: &[Transfer]) -> Result<()> {
        self.bank.multi_send(&mut *self.store, transfers)
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    pub fn bet_params(&self) -> Result<BetParams> {
        Ok(self.get(&keys::params("bet")?)?.unwrap_or_default())
    }

    pub fn house_params(&self) -> Result<HouseParams> {
        Ok(self.get(&keys::params("house")?)?.unwrap_or_default())
    }

    pub fn market_params(&self) -> Result<MarketParams> {
        Ok(self.get(&keys::params("market")?)?.unwrap_or_default())
    }
}
