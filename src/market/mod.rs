//! Market lifecycle.
//!
//! Every transition is driven by an oracle message whose ticket meets the
//! signature threshold:
//!
//! | Message | From | To |
//! |---------|------|----|
//! | add | (none) | ACTIVE |
//! | update | ACTIVE | ACTIVE |
//! | resolve | ACTIVE | RESULT_DECLARED |
//! | cancel | ACTIVE, RESULT_DECLARED | CANCELED |
//! | abort | ACTIVE, RESULT_DECLARED | ABORTED |
//!
//! RESULT_DECLARED becomes RESOLVED in end block once the market's
//! settlement queue is drained. Resolving, canceling and aborting mark the
//! market settleable.

use std::collections::BTreeSet;

use tracing::info;

use crate::engine::Ctx;
use crate::error::{EngineError, Result};
use crate::orderbook;
use crate::ovm::verify_ticket;
use crate::store::{get_value, keys, values_with_prefix, values_with_prefix_limit, KvStore};
use crate::types::msgs::{
    AddMarketPayload, CloseMarketPayload, MsgOracle, ResolveMarketPayload, TicketKind,
    UpdateMarketPayload,
};
use crate::types::{Event, Market, MarketOdds, MarketParams, MarketStatus};

// ============================================================================
// Queries
// ============================================================================

pub fn get_market(store: &dyn KvStore, uid: &str) -> Result<Market> {
    get_value(store, &keys::market(uid)?)?.ok_or_else(|| EngineError::MarketNotFound(uid.to_string()))
}

/// Markets in key order, skipping `offset` and returning at most `limit`.
pub fn list_markets(store: &dyn KvStore, offset: usize, limit: usize) -> Result<Vec<Market>> {
    values_with_prefix_limit(store, keys::MARKET, offset, limit)
}

/// UIDs of markets waiting for end-block settlement.
pub fn settleable_markets(store: &dyn KvStore) -> Result<Vec<String>> {
    values_with_prefix(store, keys::SETTLEABLE_MARKET)
}

// ============================================================================
// Validation
// ============================================================================

fn validate_odds(uid: &str, odds: &[MarketOdds], params: &MarketParams) -> Result<()> {
    if odds.len() < 2 {
        return Err(EngineError::MarketInvalid(format!(
            "market {} needs at least two odds, got {}",
            uid,
            odds.len()
        )));
    }
    if odds.len() > params.max_odds_count as usize {
        return Err(EngineError::MarketInvalid(format!(
            "market {} has {} odds, maximum is {}",
            uid,
            odds.len(),
            params.max_odds_count
        )));
    }

    let mut seen = BTreeSet::new();
    for o in odds {
        if o.uid.is_empty() {
            return Err(EngineError::MarketInvalid(format!("market {} has an odds without uid", uid)));
        }
        if !seen.insert(o.uid.as_str()) {
            return Err(EngineError::MarketInvalid(format!(
                "market {} repeats odds {}",
                uid, o.uid
            )));
        }
        if !params.allows(o.kind) {
            return Err(EngineError::MarketInvalid(format!(
                "odds kind {} is not allowed",
                o.kind
            )));
        }
        o.kind.validate(&o.value)?;
        if let Some(max_loss) = o.max_loss {
            if max_loss <= 0 {
                return Err(EngineError::MarketInvalid(format!(
                    "odds {} max loss must be positive, got {}",
                    o.uid, max_loss
                )));
            }
        }
    }
    Ok(())
}

fn validate_schedule(uid: &str, start_ts: u64, end_ts: u64, now: u64) -> Result<()> {
    if end_ts != 0 && end_ts <= start_ts {
        return Err(EngineError::MarketInvalid(format!(
            "market {} ends at {} before it starts at {}",
            uid, end_ts, start_ts
        )));
    }
    if end_ts != 0 && end_ts <= now {
        return Err(EngineError::MarketInvalid(format!(
            "market {} ends at {} which is not after block time {}",
            uid, end_ts, now
        )));
    }
    Ok(())
}

fn save(ctx: &mut Ctx<'_>, market: &Market) -> Result<()> {
    ctx.set(keys::market(&market.uid)?, market)
}

fn mark_settleable(ctx: &mut Ctx<'_>, uid: &str) -> Result<()> {
    ctx.set(keys::settleable_market(uid)?, &uid.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

pub fn add_market(ctx: &mut Ctx<'_>, msg: &MsgOracle) -> Result<()> {
    let payload: AddMarketPayload = verify_ticket(ctx, &msg.ticket, TicketKind::AddMarket)?;

    if payload.uid.is_empty() {
        return Err(EngineError::MarketInvalid("empty market uid".into()));
    }
    if ctx.has(&keys::market(&payload.uid)?) {
        return Err(EngineError::MarketAlreadyExists(payload.uid));
    }
    validate_odds(&payload.uid, &payload.odds, &ctx.market_params()?)?;
    validate_schedule(&payload.uid, payload.start_ts, payload.end_ts, ctx.now())?;

    let market = Market {
        uid: payload.uid,
        status: MarketStatus::Active,
        start_ts: payload.start_ts,
        end_ts: payload.end_ts,
        odds: payload.odds,
        winner_odds_uid: None,
        meta: payload.meta,
        creator: msg.creator.clone(),
        resolution_ts: None,
    };
    save(ctx, &market)?;
    orderbook::init_order_book(ctx, &market)?;

    info!(
        market_uid = %market.uid,
        odds_count = market.odds.len(),
        start_ts = market.start_ts,
        "market created"
    );
    ctx.emit(Event::MarketCreated {
        uid: market.uid.clone(),
        odds_count: market.odds.len() as u32,
    });
    Ok(())
}

/// Replace schedule and odds of an active market.
///
/// Odds that are removed or re-quoted must carry no locked exposure.
pub fn update_market(ctx: &mut Ctx<'_>, msg: &MsgOracle) -> Result<()> {
    let payload: UpdateMarketPayload = verify_ticket(ctx, &msg.ticket, TicketKind::UpdateMarket)?;
    let mut market = get_market(&*ctx.store, &payload.uid)?;

    if market.status != MarketStatus::Active {
        return Err(EngineError::MarketNotActive {
            uid: market.uid,
            status: market.status.to_string(),
        });
    }
    if market.placement_closed(ctx.now()) {
        return Err(EngineError::MarketPlacementClosed(market.uid));
    }
    validate_odds(&market.uid, &payload.odds, &ctx.market_params()?)?;
    validate_schedule(&market.uid, payload.start_ts, payload.end_ts, ctx.now())?;

    for old in &market.odds {
        let unchanged = payload
            .odds
            .iter()
            .any(|o| o.uid == old.uid && o.same_terms(old));
        if unchanged {
            continue;
        }
        let oe = orderbook::query::odds_exposure(&*ctx.store, &market.uid, &old.uid)?;
        if oe.total_locked > 0 {
            return Err(EngineError::OddsUpdateLocked {
                market_uid: market.uid.clone(),
                odds_uid: old.uid.clone(),
            });
        }
    }

    orderbook::rebalance_odds(ctx, &market.uid, &market.odds, &payload.odds)?;

    market.start_ts = payload.start_ts;
    market.end_ts = payload.end_ts;
    market.odds = payload.odds;
    save(ctx, &market)?;

    info!(market_uid = %market.uid, odds_count = market.odds.len(), "market updated");
    ctx.emit(Event::MarketUpdated { uid: market.uid });
    Ok(())
}

pub fn resolve_market(ctx: &mut Ctx<'_>, msg: &MsgOracle) -> Result<()> {
    let payload: ResolveMarketPayload = verify_ticket(ctx, &msg.ticket, TicketKind::ResolveMarket)?;
    let mut market = get_market(&*ctx.store, &payload.uid)?;

    if market.status != MarketStatus::Active {
        return Err(EngineError::MarketStatusTransition {
            uid: market.uid,
            from: market.status.to_string(),
            to: MarketStatus::ResultDeclared.to_string(),
        });
    }
    if market.find_odds(&payload.winner_odds_uid).is_none() {
        return Err(EngineError::MarketInvalidOddsUid {
            market_uid: market.uid,
            odds_uid: payload.winner_odds_uid,
        });
    }

    market.status = MarketStatus::ResultDeclared;
    market.winner_odds_uid = Some(payload.winner_odds_uid.clone());
    market.resolution_ts = Some(payload.resolution_ts);
    save(ctx, &market)?;
    mark_settleable(ctx, &market.uid)?;

    info!(
        market_uid = %market.uid,
        winner_odds_uid = %payload.winner_odds_uid,
        resolution_ts = payload.resolution_ts,
        "market result declared"
    );
    ctx.emit(Event::MarketResolved {
        uid: market.uid,
        winner_odds_uid: payload.winner_odds_uid,
    });
    Ok(())
}

pub fn cancel_market(ctx: &mut Ctx<'_>, msg: &MsgOracle) -> Result<()> {
    close_market(ctx, msg, MarketStatus::Canceled)
}

pub fn abort_market(ctx: &mut Ctx<'_>, msg: &MsgOracle) -> Result<()> {
    close_market(ctx, msg, MarketStatus::Aborted)
}

/// Move a market to a refunding terminal status.
///
/// Bets already settled under a declared result stay settled; only the
/// remaining queue is refunded.
fn close_market(ctx: &mut Ctx<'_>, msg: &MsgOracle, to: MarketStatus) -> Result<()> {
    let kind = match to {
        MarketStatus::Aborted => TicketKind::AbortMarket,
        _ => TicketKind::CancelMarket,
    };
    let payload: CloseMarketPayload = verify_ticket(ctx, &msg.ticket, kind)?;
    let mut market = get_market(&*ctx.store, &payload.uid)?;

    if !matches!(market.status, MarketStatus::Active | MarketStatus::ResultDeclared) {
        return Err(EngineError::MarketStatusTransition {
            uid: market.uid,
            from: market.status.to_string(),
            to: to.to_string(),
        });
    }

    market.status = to;
    save(ctx, &market)?;
    mark_settleable(ctx, &market.uid)?;

    info!(market_uid = %market.uid, status = %to, reason = %payload.reason, "market closed");
    let event = match to {
        MarketStatus::Aborted => Event::MarketAborted {
            uid: market.uid,
            reason: payload.reason,
        },
        _ => Event::MarketCanceled {
            uid: market.uid,
            reason: payload.reason,
        },
    };
    ctx.emit(event);
    Ok(())
}
