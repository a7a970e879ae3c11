//! Order-book creation, house participations and odds rebalancing.

use tracing::{debug, info};

use crate::engine::Ctx;
use crate::error::{EngineError, Result};
use crate::orderbook::query;
use crate::store::keys;
use crate::types::dec::checked_add;
use crate::types::{
    Amount, Market, MarketOdds, OddsExposure, OrderBook, OrderBookStatus, Participation,
};

/// Create the book and an empty exposure per odds for a new market.
pub fn init_order_book(ctx: &mut Ctx<'_>, market: &Market) -> Result<()> {
    let book = OrderBook::new(&market.uid, market.odds.len() as u32);
    ctx.set(keys::order_book(&market.uid)?, &book)?;

    for odds in &market.odds {
        let oe = OddsExposure::new(&market.uid, &odds.uid);
        ctx.set(keys::odds_exposure(&market.uid, &odds.uid)?, &oe)?;
    }

    debug!(market_uid = %market.uid, odds_count = market.odds.len(), "order book created");
    Ok(())
}

/// Append a participation backing every odds of `market`.
///
/// Returns the new participation index.
pub fn add_participation(
    ctx: &mut Ctx<'_>,
    market: &Market,
    depositor: &str,
    liquidity: Amount,
    fee: Amount,
) -> Result<u64> {
    let mut book = query::order_book(&*ctx.store, &market.uid)?;
    if book.status != OrderBookStatus::Active {
        return Err(EngineError::MarketNotActive {
            uid: market.uid.clone(),
            status: market.status.to_string(),
        });
    }

    let index = book.next_index();
    book.total_liquidity = checked_add(book.total_liquidity, liquidity, "order book liquidity")?;

    let participation = Participation::new(index, &market.uid, depositor, liquidity, fee);
    ctx.set(keys::participation(&market.uid, index)?, &participation)?;
    ctx.set(keys::order_book(&market.uid)?, &book)?;

    for odds in &market.odds {
        let mut oe = query::odds_exposure(&*ctx.store, &market.uid, &odds.uid)?;
        oe.enqueue(index);
        ctx.set(keys::odds_exposure(&market.uid, &odds.uid)?, &oe)?;
    }

    info!(
        market_uid = %market.uid,
        participation_index = index,
        depositor,
        liquidity = %liquidity,
        "participation added"
    );
    Ok(index)
}

/// Bring exposures in line with a replaced odds list.
///
/// Removed odds lose their exposure records. New or re-quoted odds get a
/// fresh queue holding every unsettled participation. Callers guarantee
/// that none of the touched odds carries locked exposure.
pub fn rebalance_odds(
    ctx: &mut Ctx<'_>,
    market_uid: &str,
    previous: &[MarketOdds],
    next: &[MarketOdds],
) -> Result<()> {
    for old in previous {
        if !next.iter().any(|o| o.uid == old.uid) {
            clear_odds(ctx, market_uid, &old.uid)?;
            ctx.delete(&keys::odds_exposure(market_uid, &old.uid)?);
        }
    }

    let participations = query::participations(&*ctx.store, market_uid)?;
    for odds in next {
        let unchanged = previous
            .iter()
            .any(|old| old.uid == odds.uid && old.same_terms(odds));
        if unchanged {
            continue;
        }

        clear_odds(ctx, market_uid, &odds.uid)?;
        let mut oe = OddsExposure::new(market_uid, &odds.uid);
        for p in participations.iter().filter(|p| !p.is_settled) {
            oe.enqueue(p.index);
        }
        ctx.set(keys::odds_exposure(market_uid, &odds.uid)?, &oe)?;
    }

    let mut book = query::order_book(&*ctx.store, market_uid)?;
    book.odds_count = next.len() as u32;
    ctx.set(keys::order_book(market_uid)?, &book)?;

    debug!(market_uid, odds_count = next.len(), "odds rebalanced");
    Ok(())
}

fn clear_odds(ctx: &mut Ctx<'_>, market_uid: &str, odds_uid: &str) -> Result<()> {
    let prefix = keys::participation_exposures_of_odds(market_uid, odds_uid)?;
    for (key, _) in ctx.store.prefix_iter(&prefix) {
        ctx.delete(&key);
    }
    Ok(())
}
