//! Liability allocation for a new bet.
//!
//! ## Algorithm
//!
//! The fulfillment queue of the bet's odds is walked in participation
//! order. Each participation takes as much of the remaining payout profit
//! as its capacity on that odds allows:
//!
//! ```text
//! take       = min(profit_remaining, max_loss - exposure(P, odds))
//! take_stake = stake * take / profit          (truncated)
//! ```
//!
//! The fulfillment that completes the profit takes the remaining stake, so
//! the stake shares always add up to the bet amount exactly.
//!
//! The allocation is first computed as a [`FulfillmentPlan`] from reads
//! only, then written. A bet that can not be covered leaves no writes.

use tracing::debug;

use crate::engine::Ctx;
use crate::error::{EngineError, Result};
use crate::orderbook::query;
use crate::store::keys;
use crate::types::dec::{checked_add, checked_sub, prorate};
use crate::types::{
    Amount, BetFulfillment, Market, MarketOdds, OddsExposure, Participation,
    ParticipationExposure,
};

/// One participation's share of a bet, before it is written.
#[derive(Debug, Clone)]
struct PlannedFill {
    participation: Participation,
    exposure: ParticipationExposure,
    take: Amount,
    take_stake: Amount,
}

/// Allocation of a bet across participations.
#[derive(Debug, Clone)]
pub struct FulfillmentPlan {
    odds_exposure: OddsExposure,
    fills: Vec<PlannedFill>,
    payout_profit: Amount,
}

impl FulfillmentPlan {
    /// Fulfillments the bet will record.
    pub fn fulfillments(&self) -> Vec<BetFulfillment> {
        self.fills
            .iter()
            .map(|f| BetFulfillment {
                participation_index: f.participation.index,
                participant: f.participation.depositor.clone(),
                bet_amount: f.take_stake,
                payout_profit: f.take,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }
}

/// Compute how a bet of `stake` paying `payout_profit` would be covered.
pub fn plan(
    ctx: &Ctx<'_>,
    market: &Market,
    odds: &MarketOdds,
    stake: Amount,
    payout_profit: Amount,
) -> Result<FulfillmentPlan> {
    let store = &*ctx.store;
    let oe = query::odds_exposure(store, &market.uid, &odds.uid)?;

    if let Some(max_loss) = odds.max_loss {
        let locked_after = checked_add(oe.total_locked, payout_profit, "odds exposure")?;
        if locked_after > max_loss {
            return Err(EngineError::InsufficientLiquidity {
                required: payout_profit,
                available: (max_loss - oe.total_locked).max(0),
            });
        }
    }

    let mut profit_remaining = payout_profit;
    let mut stake_remaining = stake;
    let mut fills = Vec::new();

    for &index in &oe.fulfillment_queue {
        if profit_remaining == 0 {
            break;
        }

        let participation = query::participation(store, &market.uid, index)?;
        if participation.is_settled {
            continue;
        }
        let exposure = query::participation_exposure(store, &market.uid, &odds.uid, index)?
            .unwrap_or_else(|| ParticipationExposure::new(&market.uid, &odds.uid, index));

        let capacity = participation.capacity(exposure.exposure);
        if capacity <= 0 {
            continue;
        }

        let take = profit_remaining.min(capacity);
        let take_stake = if take == profit_remaining {
            stake_remaining
        } else {
            prorate(stake, take, payout_profit)?.min(stake_remaining)
        };

        profit_remaining -= take;
        stake_remaining -= take_stake;
        fills.push(PlannedFill {
            participation,
            exposure,
            take,
            take_stake,
        });
    }

    if profit_remaining > 0 {
        return Err(EngineError::InsufficientLiquidity {
            required: payout_profit,
            available: payout_profit - profit_remaining,
        });
    }

    Ok(FulfillmentPlan {
        odds_exposure: oe,
        fills,
        payout_profit,
    })
}

/// Write a plan: lock exposure on every participation it touches.
pub fn commit(ctx: &mut Ctx<'_>, plan: FulfillmentPlan) -> Result<Vec<BetFulfillment>> {
    let fulfillments = plan.fulfillments();
    let FulfillmentPlan {
        mut odds_exposure,
        fills,
        payout_profit,
    } = plan;
    let market_uid = odds_exposure.market_uid.clone();
    let odds_uid = odds_exposure.odds_uid.clone();

    for fill in fills {
        let PlannedFill {
            mut participation,
            mut exposure,
            take,
            take_stake,
        } = fill;
        let index = participation.index;

        exposure.exposure = checked_add(exposure.exposure, take, "participation exposure")?;
        exposure.bet_amount = checked_add(exposure.bet_amount, take_stake, "participation bet amount")?;
        if participation.capacity(exposure.exposure) == 0 {
            exposure.is_fulfilled = true;
            odds_exposure.dequeue(index);
        }

        participation.total_bet_amount =
            checked_add(participation.total_bet_amount, take_stake, "participation bet total")?;
        participation.relock(participation.locked_liability.max(exposure.exposure));
        if participation.current_round_liquidity < 0 {
            return Err(EngineError::InvariantViolation(format!(
                "participation {} of market {} over-locked: liquidity {}, locked {}",
                index, market_uid, participation.liquidity, participation.locked_liability
            )));
        }

        debug!(
            market_uid = %market_uid,
            odds_uid = %odds_uid,
            participation_index = index,
            take = %take,
            take_stake = %take_stake,
            fulfilled = exposure.is_fulfilled,
            "liability locked"
        );

        ctx.set(keys::participation_exposure(&market_uid, &odds_uid, index)?, &exposure)?;
        ctx.set(keys::participation(&market_uid, index)?, &participation)?;
    }

    odds_exposure.total_locked = checked_add(odds_exposure.total_locked, payout_profit, "odds exposure")?;
    ctx.set(keys::odds_exposure(&market_uid, &odds_uid)?, &odds_exposure)?;

    Ok(fulfillments)
}

/// Plan and commit in one step.
pub fn fulfill(
    ctx: &mut Ctx<'_>,
    market: &Market,
    odds: &MarketOdds,
    stake: Amount,
    payout_profit: Amount,
) -> Result<Vec<BetFulfillment>> {
    if payout_profit <= 0 || stake <= 0 {
        return Err(EngineError::InvalidAmount(payout_profit.min(stake)));
    }
    let plan = plan(ctx, market, odds, stake, payout_profit)?;
    commit(ctx, plan)
}

/// Release `amount` of locked profit and `stake` of attributed stake.
pub(crate) fn unlock(exposure: &mut ParticipationExposure, amount: Amount, stake: Amount) -> Result<()> {
    exposure.exposure = checked_sub(exposure.exposure, amount, "participation exposure")?;
    exposure.bet_amount = checked_sub(exposure.bet_amount, stake, "participation bet amount")?;
    if exposure.exposure < 0 || exposure.bet_amount < 0 {
        return Err(EngineError::InvariantViolation(format!(
            "negative exposure on odds {} of market {} for participation {}",
            exposure.odds_uid, exposure.market_uid, exposure.participation_index
        )));
    }
    Ok(())
}
