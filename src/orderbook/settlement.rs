//! Releasing locked liability when bets settle, and closing the book.

use tracing::{debug, info};

use crate::engine::Ctx;
use crate::error::{EngineError, Result};
use crate::orderbook::placement::unlock;
use crate::orderbook::query;
use crate::store::keys;
use crate::types::dec::{checked_add, checked_sub};
use crate::types::{Bet, BetResult, Market, OrderBookStatus};

/// Apply a settled bet to every participation that backed it.
///
/// - `Won`: the participation pays the fulfillment's profit
///   (`actual_profit -= payout_profit`)
/// - `Lost`: the participation keeps the bettor's stake share
///   (`actual_profit += bet_amount`)
/// - `Refunded`: no profit or loss
///
/// In every case the fulfillment's exposure is released and the
/// participation's locked liability recomputed.
pub fn settle_bet_exposures(
    ctx: &mut Ctx<'_>,
    market: &Market,
    bet: &Bet,
    result: BetResult,
) -> Result<()> {
    let odds_uids: Vec<&str> = market.odds.iter().map(|o| o.uid.as_str()).collect();

    for f in &bet.fulfillments {
        let index = f.participation_index;
        let mut exposure = query::participation_exposure(&*ctx.store, &market.uid, &bet.odds_uid, index)?
            .ok_or_else(|| {
                EngineError::InvariantViolation(format!(
                    "bet {} references missing exposure of participation {} on odds {}",
                    bet.uid, index, bet.odds_uid
                ))
            })?;
        unlock(&mut exposure, f.payout_profit, f.bet_amount)?;
        ctx.set(
            keys::participation_exposure(&market.uid, &bet.odds_uid, index)?,
            &exposure,
        )?;

        let mut participation = query::participation(&*ctx.store, &market.uid, index)?;
        match result {
            BetResult::Won => {
                participation.actual_profit =
                    checked_sub(participation.actual_profit, f.payout_profit, "actual profit")?;
            }
            BetResult::Lost => {
                participation.actual_profit =
                    checked_add(participation.actual_profit, f.bet_amount, "actual profit")?;
            }
            BetResult::Refunded | BetResult::Pending => {}
        }

        let locked = query::max_exposure(&*ctx.store, &market.uid, odds_uids.iter().copied(), index)?;
        participation.relock(locked);
        ctx.set(keys::participation(&market.uid, index)?, &participation)?;

        debug!(
            market_uid = %market.uid,
            bet_uid = %bet.uid,
            participation_index = index,
            ?result,
            actual_profit = %participation.actual_profit,
            "fulfillment settled"
        );
    }

    let mut oe = query::odds_exposure(&*ctx.store, &market.uid, &bet.odds_uid)?;
    oe.total_locked = checked_sub(oe.total_locked, bet.fulfilled_profit(), "odds exposure")?;
    ctx.set(keys::odds_exposure(&market.uid, &bet.odds_uid)?, &oe)?;
    Ok(())
}

/// Mark every participation and exposure of a drained market settled.
///
/// Returns the number of participations settled.
pub fn settle_participations(ctx: &mut Ctx<'_>, market: &Market) -> Result<u32> {
    let mut settled = 0;
    for mut participation in query::participations(&*ctx.store, &market.uid)? {
        if participation.is_settled {
            continue;
        }
        participation.is_settled = true;
        participation.relock(0);
        ctx.set(keys::participation(&market.uid, participation.index)?, &participation)?;
        settled += 1;
    }

    for mut exposure in query::participation_exposures(&*ctx.store, &market.uid)? {
        if exposure.exposure != 0 {
            return Err(EngineError::InvariantViolation(format!(
                "exposure {} left on odds {} of market {} after settlement",
                exposure.exposure, exposure.odds_uid, market.uid
            )));
        }
        if !exposure.is_settled {
            exposure.is_settled = true;
            ctx.set(
                keys::participation_exposure(&market.uid, &exposure.odds_uid, exposure.participation_index)?,
                &exposure,
            )?;
        }
    }

    let mut book = query::order_book(&*ctx.store, &market.uid)?;
    book.status = OrderBookStatus::Settled;
    ctx.set(keys::order_book(&market.uid)?, &book)?;

    info!(market_uid = %market.uid, participations = settled, "order book settled");
    Ok(settled)
}
