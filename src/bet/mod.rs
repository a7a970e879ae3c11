//! Bet placement, queries and batched settlement.
//!
//! ## Placement
//!
//! 1. The oracle ticket must verify and describe exactly this bet
//! 2. The market must be active with placement open
//! 3. The quoted odds must equal the market's current odds
//! 4. The order book covers the payout profit
//! 5. Stake moves to `bet_reserve`, fee to the fee collector
//!
//! Every bet is appended to its market's settlement queue under a
//! per-market sequence number, so settlement order equals placement order.
//!
//! ## Settlement
//!
//! At end block, each settleable market drains up to
//! `batch_settlement_count` queue items. A market whose queue is empty has
//! its participations settled and, if its result was declared, becomes
//! RESOLVED.

use tracing::{debug, info};

use crate::bank::{Transfer, BET_RESERVE, FEE_COLLECTOR, HOUSE_RESERVE};
use crate::engine::Ctx;
use crate::error::{EngineError, Result};
use crate::market::{get_market, settleable_markets};
use crate::orderbook;
use crate::ovm::verify_ticket;
use crate::store::{get_value, keys, values_with_prefix_limit, KvStore};
use crate::types::msgs::{BetTicketPayload, MsgPlaceBet, TicketKind};
use crate::types::{
    Amount, Bet, BetRef, BetResult, BetStatus, Event, Market, MarketStatus, SettlementQueueItem,
};

// ============================================================================
// Queries
// ============================================================================

pub fn get_bet(store: &dyn KvStore, bettor: &str, uid: &str) -> Result<Bet> {
    get_value(store, &keys::bet(bettor, uid)?)?.ok_or_else(|| EngineError::BetNotFound {
        bettor: bettor.to_string(),
        uid: uid.to_string(),
    })
}

pub fn get_bet_by_uid(store: &dyn KvStore, uid: &str) -> Result<Option<Bet>> {
    match get_value::<BetRef>(store, &keys::bet_uid(uid)?)? {
        Some(r) => get_value(store, &keys::bet(&r.bettor, &r.bet_uid)?),
        None => Ok(None),
    }
}

/// Bets for a list of UIDs. Unknown UIDs are skipped; at most `cap` UIDs
/// are looked up.
pub fn bets_by_uids(store: &dyn KvStore, uids: &[String], cap: u32) -> Result<Vec<Bet>> {
    let mut bets = Vec::new();
    for uid in uids.iter().take(cap as usize) {
        if let Some(bet) = get_bet_by_uid(store, uid)? {
            bets.push(bet);
        }
    }
    Ok(bets)
}

/// Bets of a market in placement order.
pub fn bets_by_market(store: &dyn KvStore, market_uid: &str, offset: usize, limit: usize) -> Result<Vec<Bet>> {
    let refs: Vec<BetRef> =
        values_with_prefix_limit(store, &keys::bets_by_market(market_uid)?, offset, limit)?;
    refs.iter()
        .map(|r| get_bet(store, &r.bettor, &r.bet_uid))
        .collect()
}

/// Bets still waiting in the settlement queue, oldest first.
pub fn pending_bets(store: &dyn KvStore, market_uid: &str, offset: usize, limit: usize) -> Result<Vec<Bet>> {
    let items: Vec<SettlementQueueItem> =
        values_with_prefix_limit(store, &keys::settlement_queue(market_uid)?, offset, limit)?;
    items
        .iter()
        .map(|item| get_bet(store, &item.bettor, &item.bet_uid))
        .collect()
}

/// The oldest `limit` entries of a market's settlement queue.
pub fn settlement_queue(store: &dyn KvStore, market_uid: &str, limit: usize) -> Result<Vec<SettlementQueueItem>> {
    values_with_prefix_limit(store, &keys::settlement_queue(market_uid)?, 0, limit)
}

pub fn settlement_queue_len(store: &dyn KvStore, market_uid: &str) -> Result<usize> {
    Ok(store.prefix_count(&keys::settlement_queue(market_uid)?))
}

// ============================================================================
// Placement
// ============================================================================

fn check_ticket(msg: &MsgPlaceBet, ticket: &BetTicketPayload) -> Result<()> {
    let mismatch = if ticket.bet_uid != msg.bet_uid {
        Some("bet uid")
    } else if ticket.market_uid != msg.market_uid {
        Some("market uid")
    } else if ticket.odds_uid != msg.odds_uid {
        Some("odds uid")
    } else if ticket.odds_value != msg.odds_value {
        Some("odds value")
    } else if ticket.odds_kind != msg.odds_kind {
        Some("odds kind")
    } else {
        None
    };
    match mismatch {
        Some(field) => Err(EngineError::TicketInvalid(format!(
            "ticket {} does not match bet {}",
            field, msg.bet_uid
        ))),
        None => Ok(()),
    }
}

fn next_seq(ctx: &mut Ctx<'_>, market_uid: &str) -> Result<u64> {
    let key = keys::settlement_seq(market_uid)?;
    let seq = ctx.get::<u64>(&key)?.unwrap_or(0) + 1;
    ctx.set(key, &seq)?;
    Ok(seq)
}

/// Place a bet and lock its payout profit on the market's order book.
pub fn place_bet(ctx: &mut Ctx<'_>, msg: &MsgPlaceBet) -> Result<Bet> {
    let ticket: BetTicketPayload = verify_ticket(ctx, &msg.ticket, TicketKind::PlaceBet)?;
    check_ticket(msg, &ticket)?;

    if msg.bet_uid.is_empty() {
        return Err(EngineError::TicketInvalid("empty bet uid".into()));
    }
    if ctx.has(&keys::bet_uid(&msg.bet_uid)?) {
        return Err(EngineError::BetUidExists(msg.bet_uid.clone()));
    }

    let market = get_market(&*ctx.store, &msg.market_uid)?;
    if market.status != MarketStatus::Active {
        return Err(EngineError::MarketNotActive {
            uid: market.uid,
            status: market.status.to_string(),
        });
    }
    if market.placement_closed(ctx.now()) {
        return Err(EngineError::MarketPlacementClosed(market.uid));
    }

    let odds = market
        .find_odds(&msg.odds_uid)
        .ok_or_else(|| EngineError::MarketInvalidOddsUid {
            market_uid: market.uid.clone(),
            odds_uid: msg.odds_uid.clone(),
        })?;
    if odds.kind != msg.odds_kind || odds.value != msg.odds_value {
        return Err(EngineError::MarketOddsMismatch {
            market_uid: market.uid.clone(),
            odds_uid: odds.uid.clone(),
            reason: format!(
                "quoted {} {}, market has {} {}",
                msg.odds_kind, msg.odds_value, odds.kind, odds.value
            ),
        });
    }

    let constraints = ctx.bet_params()?.placement_constraints;
    if msg.amount < constraints.min_amount {
        return Err(EngineError::BetAmountTooLow {
            amount: msg.amount,
            min: constraints.min_amount,
        });
    }

    let payout_profit = odds.kind.payout_profit(&odds.value, msg.amount)?;
    if payout_profit <= 0 {
        return Err(EngineError::BetPayoutProfitZero(msg.bet_uid.clone()));
    }
    if ticket.max_loss > 0 && payout_profit > ticket.max_loss {
        return Err(EngineError::TicketInvalid(format!(
            "payout profit {} exceeds ticket max loss {}",
            payout_profit, ticket.max_loss
        )));
    }

    let fulfillments = orderbook::fulfill(ctx, &market, odds, msg.amount, payout_profit)?;

    ctx.multi_send(&[
        Transfer::new(&msg.bettor, BET_RESERVE, msg.amount),
        Transfer::new(&msg.bettor, FEE_COLLECTOR, constraints.bet_fee),
    ])?;

    let seq = next_seq(ctx, &market.uid)?;
    let bet = Bet {
        uid: msg.bet_uid.clone(),
        bettor: msg.bettor.clone(),
        market_uid: market.uid.clone(),
        odds_uid: odds.uid.clone(),
        odds_kind: odds.kind,
        odds_value: odds.value.clone(),
        amount: msg.amount,
        fee: constraints.bet_fee,
        payout_profit,
        fulfillments,
        status: BetStatus::Pending,
        result: BetResult::Pending,
        seq,
        created_at: ctx.now(),
        settled_at: None,
        settled_height: None,
    };

    let bet_ref = BetRef {
        bettor: bet.bettor.clone(),
        bet_uid: bet.uid.clone(),
    };
    ctx.set(keys::bet(&bet.bettor, &bet.uid)?, &bet)?;
    ctx.set(keys::bet_uid(&bet.uid)?, &bet_ref)?;
    ctx.set(keys::bet_by_market(&market.uid, seq)?, &bet_ref)?;
    ctx.set(
        keys::settlement_item(&market.uid, seq)?,
        &SettlementQueueItem {
            market_uid: market.uid.clone(),
            seq,
            bet_uid: bet.uid.clone(),
            bettor: bet.bettor.clone(),
        },
    )?;

    info!(
        bettor = %bet.bettor,
        bet_uid = %bet.uid,
        market_uid = %bet.market_uid,
        odds_uid = %bet.odds_uid,
        amount = %bet.amount,
        payout_profit = %bet.payout_profit,
        fulfillments = bet.fulfillments.len(),
        seq,
        "bet placed"
    );
    ctx.emit(Event::BetPlaced {
        bettor: bet.bettor.clone(),
        bet_uid: bet.uid.clone(),
        market_uid: bet.market_uid.clone(),
        amount: bet.amount,
        payout_profit: bet.payout_profit,
        fulfillments: bet.fulfillments.len() as u32,
    });
    Ok(bet)
}

// ============================================================================
// Settlement
// ============================================================================

/// Bets and markets settled by one end-block pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementSummary {
    pub bets_settled: u32,
    pub markets_settled: u32,
}

fn outcome(market: &Market, bet: &Bet) -> Result<BetResult> {
    match market.status {
        MarketStatus::Canceled | MarketStatus::Aborted => Ok(BetResult::Refunded),
        MarketStatus::ResultDeclared | MarketStatus::Resolved => {
            if market.is_winner(&bet.odds_uid) {
                Ok(BetResult::Won)
            } else {
                Ok(BetResult::Lost)
            }
        }
        MarketStatus::Active => Err(EngineError::MarketStatusTransition {
            uid: market.uid.clone(),
            from: market.status.to_string(),
            to: "settlement".into(),
        }),
    }
}

/// Settle one bet against its market's outcome.
///
/// Returns `false` when the bet was already settled.
pub fn settle_bet(ctx: &mut Ctx<'_>, market: &Market, bettor: &str, bet_uid: &str) -> Result<bool> {
    let mut bet = get_bet(&*ctx.store, bettor, bet_uid)?;
    if !bet.is_pending() {
        debug!(bet_uid, "bet already settled");
        return Ok(false);
    }

    let result = outcome(market, &bet)?;
    orderbook::settle_bet_exposures(ctx, market, &bet, result)?;

    let (transfers, paid, status): (Vec<Transfer>, Amount, BetStatus) = match result {
        BetResult::Won => {
            let profit = bet.fulfilled_profit();
            (
                vec![
                    Transfer::new(BET_RESERVE, &bet.bettor, bet.amount),
                    Transfer::new(HOUSE_RESERVE, &bet.bettor, profit),
                ],
                bet.payout()?,
                BetStatus::Settled,
            )
        }
        BetResult::Lost => (
            vec![Transfer::new(BET_RESERVE, HOUSE_RESERVE, bet.amount)],
            0,
            BetStatus::Settled,
        ),
        BetResult::Refunded | BetResult::Pending => (
            vec![Transfer::new(BET_RESERVE, &bet.bettor, bet.amount)],
            bet.amount,
            BetStatus::Canceled,
        ),
    };
    ctx.multi_send(&transfers)?;

    bet.status = status;
    bet.result = result;
    bet.settled_at = Some(ctx.now());
    bet.settled_height = Some(ctx.height());
    ctx.set(keys::bet(&bet.bettor, &bet.uid)?, &bet)?;

    debug!(
        bet_uid = %bet.uid,
        market_uid = %market.uid,
        ?result,
        paid = %paid,
        "bet settled"
    );
    ctx.emit(Event::BetSettled {
        bettor: bet.bettor,
        bet_uid: bet.uid,
        market_uid: market.uid.clone(),
        result,
        paid_to_bettor: paid,
    });
    Ok(true)
}

/// Close a market whose settlement queue is empty.
fn finish_market(ctx: &mut Ctx<'_>, mut market: Market) -> Result<()> {
    orderbook::settle_participations(ctx, &market)?;
    if market.status == MarketStatus::ResultDeclared {
        market.status = MarketStatus::Resolved;
        ctx.set(keys::market(&market.uid)?, &market)?;
    }
    ctx.delete(&keys::settleable_market(&market.uid)?);

    info!(market_uid = %market.uid, status = %market.status, "market settled");
    ctx.emit(Event::MarketSettled {
        uid: market.uid,
        status: market.status,
    });
    Ok(())
}

/// Drain settlement queues of settleable markets.
pub fn batch_settlement(ctx: &mut Ctx<'_>) -> Result<SettlementSummary> {
    let batch = ctx.bet_params()?.batch_settlement_count as usize;
    let mut summary = SettlementSummary::default();

    for market_uid in settleable_markets(&*ctx.store)? {
        let market = get_market(&*ctx.store, &market_uid)?;
        if !market.status.is_settleable() {
            continue;
        }

        // one past the batch tells whether the queue drains this block
        let queue = settlement_queue(&*ctx.store, &market_uid, batch.saturating_add(1))?;
        let drained = queue.len() <= batch;
        for item in queue.into_iter().take(batch) {
            if settle_bet(ctx, &market, &item.bettor, &item.bet_uid)? {
                summary.bets_settled += 1;
            }
            ctx.delete(&keys::settlement_item(&market_uid, item.seq)?);
        }

        if drained {
            finish_market(ctx, market)?;
            summary.markets_settled += 1;
        }
    }

    if summary.bets_settled > 0 || summary.markets_settled > 0 {
        info!(
            height = ctx.height(),
            bets = summary.bets_settled,
            markets = summary.markets_settled,
            "batch settlement"
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{Bank, StoreBank};
    use crate::engine::BlockInfo;
    use crate::ovm::{public_key_hex, sign_ticket, store_keys, OvmKeySet};
    use crate::store::MemStore;
    use crate::types::{BetParams, MarketOdds, OddsKind, PlacementConstraints};
    use ed25519_dalek::SigningKey;

    fn oracle() -> SigningKey {
        SigningKey::from_bytes(&[7; 32])
    }

    fn setup(store: &mut MemStore) {
        let bank = StoreBank;
        bank.mint(store, "alice", 10_000).unwrap();
        let mut ctx = Ctx::new(store, &bank, BlockInfo::default());

        let params = BetParams {
            placement_constraints: PlacementConstraints { min_amount: 10, bet_fee: 1 },
            ..BetParams::default()
        };
        ctx.set(keys::params("bet").unwrap(), &params).unwrap();
        store_keys(&mut ctx, &OvmKeySet::new(vec![public_key_hex(&oracle())], 1).unwrap()).unwrap();

        let m = Market {
            uid: "m1".into(),
            status: MarketStatus::Active,
            start_ts: 0,
            end_ts: 0,
            odds: vec![
                MarketOdds::new("a", OddsKind::Decimal, "2.0"),
                MarketOdds::new("b", OddsKind::Decimal, "2.0"),
            ],
            winner_odds_uid: None,
            meta: String::new(),
            creator: "oracle".into(),
            resolution_ts: None,
        };
        ctx.set(keys::market(&m.uid).unwrap(), &m).unwrap();
        orderbook::init_order_book(&mut ctx, &m).unwrap();
        orderbook::add_participation(&mut ctx, &m, "house", 900, 100).unwrap();
        ctx.bank.mint(&mut *ctx.store, HOUSE_RESERVE, 900).unwrap();
    }

    fn bet_msg(uid: &str, odds_uid: &str, amount: Amount) -> MsgPlaceBet {
        let payload = BetTicketPayload {
            kind: TicketKind::PlaceBet,
            bet_uid: uid.into(),
            market_uid: "m1".into(),
            odds_uid: odds_uid.into(),
            odds_value: "2.0".into(),
            odds_kind: OddsKind::Decimal,
            max_loss: 0,
            exp: 1_000,
        };
        MsgPlaceBet {
            bettor: "alice".into(),
            bet_uid: uid.into(),
            market_uid: "m1".into(),
            odds_uid: odds_uid.into(),
            odds_value: "2.0".into(),
            odds_kind: OddsKind::Decimal,
            amount,
            ticket: sign_ticket(&payload, &[oracle()]).unwrap(),
        }
    }

    fn block() -> BlockInfo {
        BlockInfo { height: 2, time: 100 }
    }

    fn declare(ctx: &mut Ctx<'_>, status: MarketStatus, winner: Option<&str>) {
        let mut m = get_market(&*ctx.store, "m1").unwrap();
        m.status = status;
        m.winner_odds_uid = winner.map(str::to_string);
        ctx.set(keys::market("m1").unwrap(), &m).unwrap();
        ctx.set(keys::settleable_market("m1").unwrap(), &"m1".to_string()).unwrap();
    }

    #[test]
    fn test_place_bet_records_and_escrows() {
        let mut store = MemStore::new();
        setup(&mut store);
        let bank = StoreBank;
        let mut ctx = Ctx::new(&mut store, &bank, block());

        let bet = place_bet(&mut ctx, &bet_msg("b1", "a", 100)).unwrap();
        assert_eq!(bet.payout_profit, 100);
        assert_eq!(bet.seq, 1);
        assert_eq!(bet.fulfilled_amount(), 100);

        assert_eq!(ctx.balance("alice").unwrap(), 9_899);
        assert_eq!(ctx.balance(BET_RESERVE).unwrap(), 100);
        assert_eq!(ctx.balance(FEE_COLLECTOR).unwrap(), 1);
        assert_eq!(settlement_queue_len(&*ctx.store, "m1").unwrap(), 1);
        assert_eq!(get_bet_by_uid(&*ctx.store, "b1").unwrap().unwrap(), bet);

        let err = place_bet(&mut ctx, &bet_msg("b1", "a", 100)).unwrap_err();
        assert_eq!(err.code(), "BET_UID_EXISTS");
    }

    #[test]
    fn test_place_bet_rejections() {
        let mut store = MemStore::new();
        setup(&mut store);
        let bank = StoreBank;
        let mut ctx = Ctx::new(&mut store, &bank, block());

        assert_eq!(place_bet(&mut ctx, &bet_msg("b1", "a", 9)).unwrap_err().code(), "BET_AMOUNT_TOO_LOW");
        assert_eq!(place_bet(&mut ctx, &bet_msg("b2", "z", 100)).unwrap_err().code(), "MARKET_INVALID_ODDS_UID");

        let mut tampered = bet_msg("b3", "a", 100);
        tampered.odds_value = "3.0".into();
        assert_eq!(place_bet(&mut ctx, &tampered).unwrap_err().code(), "TICKET_INVALID");

        let mut unsigned = bet_msg("b4", "a", 100);
        unsigned.ticket = sign_ticket(&"x", &[SigningKey::from_bytes(&[9; 32])]).unwrap();
        assert_eq!(
            place_bet(&mut ctx, &unsigned).unwrap_err().code(),
            "TICKET_SIGNATURE_THRESHOLD_UNMET"
        );

        assert_eq!(
            place_bet(&mut ctx, &bet_msg("b5", "a", 901)).unwrap_err().code(),
            "INSUFFICIENT_LIQUIDITY"
        );
    }

    #[test]
    fn test_odds_mismatch_after_requote() {
        let mut store = MemStore::new();
        setup(&mut store);
        let bank = StoreBank;
        let mut ctx = Ctx::new(&mut store, &bank, block());

        let mut m = get_market(&*ctx.store, "m1").unwrap();
        m.odds[0].value = "2.5".into();
        ctx.set(keys::market("m1").unwrap(), &m).unwrap();

        let err = place_bet(&mut ctx, &bet_msg("b1", "a", 100)).unwrap_err();
        assert_eq!(err.code(), "MARKET_ODDS_MISMATCH");
    }

    #[test]
    fn test_ticket_max_loss_caps_profit() {
        let mut store = MemStore::new();
        setup(&mut store);
        let bank = StoreBank;
        let mut ctx = Ctx::new(&mut store, &bank, block());

        let mut msg = bet_msg("b1", "a", 100);
        let payload = BetTicketPayload {
            kind: TicketKind::PlaceBet,
            bet_uid: "b1".into(),
            market_uid: "m1".into(),
            odds_uid: "a".into(),
            odds_value: "2.0".into(),
            odds_kind: OddsKind::Decimal,
            max_loss: 50,
            exp: 1_000,
        };
        msg.ticket = sign_ticket(&payload, &[oracle()]).unwrap();
        assert_eq!(place_bet(&mut ctx, &msg).unwrap_err().code(), "TICKET_INVALID");
    }

    #[test]
    fn test_batch_settles_fifo_and_resolves() {
        let mut store = MemStore::new();
        setup(&mut store);
        let bank = StoreBank;
        let mut ctx = Ctx::new(&mut store, &bank, block());

        let params = BetParams {
            batch_settlement_count: 2,
            placement_constraints: PlacementConstraints { min_amount: 10, bet_fee: 1 },
            ..BetParams::default()
        };
        ctx.set(keys::params("bet").unwrap(), &params).unwrap();

        place_bet(&mut ctx, &bet_msg("b1", "a", 100)).unwrap();
        place_bet(&mut ctx, &bet_msg("b2", "b", 100)).unwrap();
        place_bet(&mut ctx, &bet_msg("b3", "a", 50)).unwrap();
        declare(&mut ctx, MarketStatus::ResultDeclared, Some("a"));

        let first = batch_settlement(&mut ctx).unwrap();
        assert_eq!(first, SettlementSummary { bets_settled: 2, markets_settled: 0 });
        assert_eq!(settlement_queue(&*ctx.store, "m1", 10).unwrap().len(), 1);
        let pending = pending_bets(&*ctx.store, "m1", 0, 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].uid, "b3");

        let second = batch_settlement(&mut ctx).unwrap();
        assert_eq!(second, SettlementSummary { bets_settled: 1, markets_settled: 1 });
        assert_eq!(get_market(&*ctx.store, "m1").unwrap().status, MarketStatus::Resolved);
        assert!(settleable_markets(&*ctx.store).unwrap().is_empty());

        assert_eq!(get_bet(&*ctx.store, "alice", "b1").unwrap().result, BetResult::Won);
        assert_eq!(get_bet(&*ctx.store, "alice", "b2").unwrap().result, BetResult::Lost);
        // 10_000 - 250 stake - 3 fees + 200 + 100 paid back on the two winners
        assert_eq!(ctx.balance("alice").unwrap(), 10_047);
        assert_eq!(ctx.balance(BET_RESERVE).unwrap(), 0);

        let order: Vec<u64> = bets_by_market(&*ctx.store, "m1", 0, 10)
            .unwrap()
            .iter()
            .map(|b| b.seq)
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    /// Records how much of the settlement queue each scan reads.
    struct QueueScans {
        inner: MemStore,
        full_scans: std::cell::Cell<usize>,
        largest_page: std::cell::Cell<usize>,
    }

    impl QueueScans {
        fn is_queue(prefix: &[u8]) -> bool {
            prefix.starts_with(&keys::settlement_queue("m1").unwrap())
        }
    }

    impl KvStore for QueueScans {
        fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
            self.inner.set(key, value)
        }

        fn delete(&mut self, key: &[u8]) {
            self.inner.delete(key)
        }

        fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
            if Self::is_queue(prefix) {
                self.full_scans.set(self.full_scans.get() + 1);
            }
            self.inner.prefix_iter(prefix)
        }

        fn prefix_iter_limit(&self, prefix: &[u8], offset: usize, limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
            let page = self.inner.prefix_iter_limit(prefix, offset, limit);
            if Self::is_queue(prefix) {
                self.largest_page.set(self.largest_page.get().max(page.len()));
            }
            page
        }

        fn prefix_count(&self, prefix: &[u8]) -> usize {
            self.inner.prefix_count(prefix)
        }
    }

    #[test]
    fn test_batch_settlement_reads_one_batch_of_the_queue() {
        let mut inner = MemStore::new();
        setup(&mut inner);
        let mut store = QueueScans {
            inner,
            full_scans: Default::default(),
            largest_page: Default::default(),
        };
        let bank = StoreBank;
        let mut ctx = Ctx::new(&mut store, &bank, block());
        let params = BetParams {
            batch_settlement_count: 2,
            placement_constraints: PlacementConstraints { min_amount: 10, bet_fee: 1 },
            ..BetParams::default()
        };
        ctx.set(keys::params("bet").unwrap(), &params).unwrap();

        for i in 0..6 {
            place_bet(&mut ctx, &bet_msg(&format!("b{}", i), "a", 10)).unwrap();
        }
        declare(&mut ctx, MarketStatus::ResultDeclared, Some("b"));

        let summary = batch_settlement(&mut ctx).unwrap();
        assert_eq!(summary, SettlementSummary { bets_settled: 2, markets_settled: 0 });
        assert_eq!(settlement_queue_len(&*ctx.store, "m1").unwrap(), 4);
        drop(ctx);

        assert_eq!(store.full_scans.get(), 0);
        assert_eq!(store.largest_page.get(), 3);
    }

    #[test]
    fn test_settle_bet_is_idempotent() {
        let mut store = MemStore::new();
        setup(&mut store);
        let bank = StoreBank;
        let mut ctx = Ctx::new(&mut store, &bank, block());

        place_bet(&mut ctx, &bet_msg("b1", "a", 100)).unwrap();
        declare(&mut ctx, MarketStatus::Canceled, None);
        let market = get_market(&*ctx.store, "m1").unwrap();

        assert!(settle_bet(&mut ctx, &market, "alice", "b1").unwrap());
        let root = ctx.store.state_root();
        assert!(!settle_bet(&mut ctx, &market, "alice", "b1").unwrap());
        assert_eq!(ctx.store.state_root(), root);

        let bet = get_bet(&*ctx.store, "alice", "b1").unwrap();
        assert_eq!(bet.status, BetStatus::Canceled);
        assert_eq!(bet.result, BetResult::Refunded);
        assert_eq!(ctx.balance("alice").unwrap(), 9_999);
    }

    #[test]
    fn test_bets_by_uids_is_capped() {
        let mut store = MemStore::new();
        setup(&mut store);
        let bank = StoreBank;
        let mut ctx = Ctx::new(&mut store, &bank, block());

        place_bet(&mut ctx, &bet_msg("b1", "a", 10)).unwrap();
        place_bet(&mut ctx, &bet_msg("b2", "a", 10)).unwrap();
        let uids = vec!["b1".to_string(), "missing".to_string(), "b2".to_string()];
        assert_eq!(bets_by_uids(&*ctx.store, &uids, 10).unwrap().len(), 2);
        assert_eq!(bets_by_uids(&*ctx.store, &uids, 1).unwrap().len(), 1);
    }
}
