//! Read-only access to order-book records.

use crate::error::{EngineError, Result};
use crate::store::{get_value, keys, values_with_prefix, KvStore};
use crate::types::{OddsExposure, OrderBook, Participation, ParticipationExposure};

pub fn order_book(store: &dyn KvStore, market_uid: &str) -> Result<OrderBook> {
    get_value(store, &keys::order_book(market_uid)?)?
        .ok_or_else(|| EngineError::MarketNotFound(market_uid.to_string()))
}

pub fn participation(store: &dyn KvStore, market_uid: &str, index: u64) -> Result<Participation> {
    get_value(store, &keys::participation(market_uid, index)?)?.ok_or_else(|| {
        EngineError::ParticipationNotFound {
            market_uid: market_uid.to_string(),
            index,
        }
    })
}

/// Participations of a market in index order.
pub fn participations(store: &dyn KvStore, market_uid: &str) -> Result<Vec<Participation>> {
    values_with_prefix(store, &keys::participations_of(market_uid)?)
}

pub fn odds_exposure(store: &dyn KvStore, market_uid: &str, odds_uid: &str) -> Result<OddsExposure> {
    get_value(store, &keys::odds_exposure(market_uid, odds_uid)?)?.ok_or_else(|| {
        EngineError::MarketInvalidOddsUid {
            market_uid: market_uid.to_string(),
            odds_uid: odds_uid.to_string(),
        }
    })
}

pub fn odds_exposures(store: &dyn KvStore, market_uid: &str) -> Result<Vec<OddsExposure>> {
    values_with_prefix(store, &keys::odds_exposures_of(market_uid)?)
}

pub fn participation_exposure(
    store: &dyn KvStore,
    market_uid: &str,
    odds_uid: &str,
    index: u64,
) -> Result<Option<ParticipationExposure>> {
    get_value(store, &keys::participation_exposure(market_uid, odds_uid, index)?)
}

/// Every participation exposure of a market, grouped by odds.
pub fn participation_exposures(
    store: &dyn KvStore,
    market_uid: &str,
) -> Result<Vec<ParticipationExposure>> {
    values_with_prefix(store, &keys::participation_exposures_of(market_uid)?)
}

/// Largest exposure of participation `index` over `odds_uids`.
pub fn max_exposure<'a>(
    store: &dyn KvStore,
    market_uid: &str,
    odds_uids: impl IntoIterator<Item = &'a str>,
    index: u64,
) -> Result<crate::types::Amount> {
    let mut max = 0;
    for odds_uid in odds_uids {
        if let Some(pe) = participation_exposure(store, market_uid, odds_uid, index)? {
            max = max.max(pe.exposure);
        }
    }
    Ok(max)
}
