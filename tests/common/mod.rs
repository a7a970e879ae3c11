//! Shared harness: a chain with one oracle key that signs every ticket.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use serde::Serialize;

use wagerbook::engine::{Engine, Genesis};
use wagerbook::ovm::{public_key_hex, sign_ticket, OvmKeySet};
use wagerbook::types::msgs::{
    AddMarketPayload, BetTicketPayload, CloseMarketPayload, MsgDeposit, MsgOracle, MsgPlaceBet,
    MsgWithdraw, ResolveMarketPayload, TicketKind, UpdateMarketPayload,
};
use wagerbook::types::{
    Amount, BetParams, BlockReceipt, Event, MarketOdds, Msg, OddsKind, PlacementConstraints,
    TxResponse, WithdrawalMode,
};
use wagerbook::Result;

pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const BLOCK_SECONDS: u64 = 5;
pub const TICKET_TTL: u64 = 3_600;

pub fn oracle_key() -> SigningKey {
    SigningKey::from_bytes(&[42; 32])
}

/// Bet params with small amounts and no bet fee.
pub fn small_bets() -> BetParams {
    BetParams {
        placement_constraints: PlacementConstraints { min_amount: 10, bet_fee: 0 },
        ..BetParams::default()
    }
}

pub fn two_way(value: &str) -> Vec<MarketOdds> {
    vec![
        MarketOdds::new("A", OddsKind::Decimal, value),
        MarketOdds::new("B", OddsKind::Decimal, value),
    ]
}

pub struct Chain {
    pub engine: Engine,
    pub oracle: SigningKey,
    pub height: u64,
    pub time: u64,
}

impl Chain {
    pub fn new(balances: &[(&str, Amount)]) -> Self {
        Self::with_params(balances, small_bets())
    }

    pub fn with_params(balances: &[(&str, Amount)], bet: BetParams) -> Self {
        let oracle = oracle_key();
        let genesis = Genesis {
            bet,
            ovm: Some(OvmKeySet::new(vec![public_key_hex(&oracle)], 1).unwrap()),
            balances: balances.iter().map(|(a, b)| (a.to_string(), *b)).collect(),
            ..Genesis::default()
        };
        let mut engine = Engine::from_genesis(&genesis).unwrap();
        engine.begin_block(1, GENESIS_TIME);
        Self {
            engine,
            oracle,
            height: 1,
            time: GENESIS_TIME,
        }
    }

    /// End the current block, check invariants and open the next one.
    pub fn next_block(&mut self) -> (BlockReceipt, Vec<Event>) {
        let out = self.engine.end_block().unwrap();
        self.engine.check_invariants().unwrap();
        self.height += 1;
        self.time += BLOCK_SECONDS;
        self.engine.begin_block(self.height, self.time);
        out
    }

    pub fn ticket<T: Serialize>(&self, payload: &T) -> String {
        sign_ticket(payload, std::slice::from_ref(&self.oracle)).unwrap()
    }

    pub fn exp(&self) -> u64 {
        self.time + TICKET_TTL
    }

    fn oracle_msg<T: Serialize>(&self, payload: &T) -> MsgOracle {
        MsgOracle::new("oracle", self.ticket(payload))
    }

    pub fn add_market(&mut self, uid: &str, odds: Vec<MarketOdds>) -> Result<TxResponse> {
        self.add_market_at(uid, odds, 0)
    }

    pub fn add_market_at(&mut self, uid: &str, odds: Vec<MarketOdds>, start_ts: u64) -> Result<TxResponse> {
        let payload = AddMarketPayload {
            kind: TicketKind::AddMarket,
            uid: uid.into(),
            start_ts,
            end_ts: 0,
            odds,
            meta: String::new(),
            exp: self.exp(),
        };
        let msg = Msg::AddMarket(self.oracle_msg(&payload));
        self.engine.deliver(&msg)
    }

    pub fn update_market(&mut self, uid: &str, odds: Vec<MarketOdds>) -> Result<TxResponse> {
        let payload = UpdateMarketPayload {
            kind: TicketKind::UpdateMarket,
            uid: uid.into(),
            start_ts: 0,
            end_ts: 0,
            odds,
            exp: self.exp(),
        };
        let msg = Msg::UpdateMarket(self.oracle_msg(&payload));
        self.engine.deliver(&msg)
    }

    pub fn resolve(&mut self, uid: &str, winner: &str) -> Result<TxResponse> {
        let payload = ResolveMarketPayload {
            kind: TicketKind::ResolveMarket,
            uid: uid.into(),
            winner_odds_uid: winner.into(),
            resolution_ts: self.time,
            exp: self.exp(),
        };
        let msg = Msg::ResolveMarket(self.oracle_msg(&payload));
        self.engine.deliver(&msg)
    }

    pub fn cancel(&mut self, uid: &str) -> Result<TxResponse> {
        let payload = CloseMarketPayload {
            kind: TicketKind::CancelMarket,
            uid: uid.into(),
            reason: "postponed".into(),
            exp: self.exp(),
        };
        let msg = Msg::CancelMarket(self.oracle_msg(&payload));
        self.engine.deliver(&msg)
    }

    pub fn abort(&mut self, uid: &str) -> Result<TxResponse> {
        let payload = CloseMarketPayload {
            kind: TicketKind::AbortMarket,
            uid: uid.into(),
            reason: "invalid".into(),
            exp: self.exp(),
        };
        let msg = Msg::AbortMarket(self.oracle_msg(&payload));
        self.engine.deliver(&msg)
    }

    pub fn deposit(&mut self, house: &str, market_uid: &str, amount: Amount) -> Result<TxResponse> {
        self.engine
            .deliver(&Msg::Deposit(MsgDeposit::new(house, market_uid, amount)))
    }

    pub fn withdraw(
        &mut self,
        house: &str,
        market_uid: &str,
        index: u64,
        amount: Amount,
        mode: WithdrawalMode,
    ) -> Result<TxResponse> {
        self.engine.deliver(&Msg::Withdraw(MsgWithdraw::new(
            house, market_uid, index, amount, mode,
        )))
    }

    /// Place a bet at the market's current quote for `odds_uid`.
    pub fn bet(&mut self, bettor: &str, bet_uid: &str, market_uid: &str, odds_uid: &str, amount: Amount) -> Result<TxResponse> {
        let market = self.engine.market(market_uid)?;
        let (kind, value) = match market.find_odds(odds_uid) {
            Some(o) => (o.kind, o.value.clone()),
            None => (OddsKind::Decimal, "2.0".to_string()),
        };
        self.bet_quoted(bettor, bet_uid, market_uid, odds_uid, kind, &value, amount)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn bet_quoted(
        &mut self,
        bettor: &str,
        bet_uid: &str,
        market_uid: &str,
        odds_uid: &str,
        kind: OddsKind,
        value: &str,
        amount: Amount,
    ) -> Result<TxResponse> {
        let payload = BetTicketPayload {
            kind: TicketKind::PlaceBet,
            bet_uid: bet_uid.into(),
            market_uid: market_uid.into(),
            odds_uid: odds_uid.into(),
            odds_value: value.into(),
            odds_kind: kind,
            max_loss: 0,
            exp: self.exp(),
        };
        let msg = MsgPlaceBet {
            bettor: bettor.into(),
            bet_uid: bet_uid.into(),
            market_uid: market_uid.into(),
            odds_uid: odds_uid.into(),
            odds_value: value.into(),
            odds_kind: kind,
            amount,
            ticket: self.ticket(&payload),
        };
        self.engine.deliver(&Msg::PlaceBet(msg))
    }

    pub fn balance(&self, address: &str) -> Amount {
        self.engine.balance(address).unwrap()
    }
}
