//! Wagering engine facade.
//!
//! ## Design Principles
//!
//! 1. **Determinism**: same genesis and same message sequence give the same
//!    state root on every validator
//! 2. **Atomic messages**: each message runs against a cache over the
//!    committed store; its writes (bank transfers included) are applied only
//!    if the handler succeeds
//! 3. **Single-threaded**: one message at a time, in block order
//!
//! ## Block Flow
//!
//! ```text
//! begin_block(height, time)
//!   deliver(msg)*        handlers: market, house, bet, ovm
//! end_block()            batch settlement, receipt
//! ```
//!
//! ## Example
//!
//! ```
//! use wagerbook::engine::{Engine, Genesis};
//!
//! let mut engine = Engine::from_genesis(&Genesis::default()).unwrap();
//! engine.begin_block(1, 1_700_000_000);
//! let (receipt, events) = engine.end_block().unwrap();
//! assert_eq!(receipt.height, 1);
//! assert!(events.is_empty());
//! ```

pub mod context;
mod invariants;

pub use context::{BlockInfo, Ctx};
pub use invariants::check_invariants;

use tracing::{debug, info, warn};

use crate::bank::{Bank, StoreBank};
use crate::bet::{self, SettlementSummary};
use crate::error::Result;
use crate::house;
use crate::market;
use crate::orderbook::query;
use crate::ovm::{self, OvmKeySet};
use crate::store::{keys, CacheStore, KvStore, MemStore};
use crate::types::{
    Amount, Authorization, AuthorizationKind, Bet, BetParams, BlockReceipt, Deposit, Event,
    HouseParams, Market, MarketParams, Msg, OrderBook, Participation, ParticipationExposure,
    TxResponse, Withdrawal,
};

/// Initial state of a chain.
#[derive(Debug, Clone, Default)]
pub struct Genesis {
    pub bet: BetParams,
    pub house: HouseParams,
    pub market: MarketParams,
    /// Oracle key set; without one every oracle message is rejected.
    pub ovm: Option<OvmKeySet>,
    pub balances: Vec<(String, Amount)>,
}

/// Route a message to its handler.
fn dispatch(ctx: &mut Ctx<'_>, msg: &Msg) -> Result<()> {
    match msg {
        Msg::Deposit(m) => house::deposit(ctx, m).map(|_| ()),
        Msg::Withdraw(m) => house::withdraw(ctx, m).map(|_| ()),
        Msg::GrantAuthorization(m) => house::grant_authorization(ctx, m),
        Msg::RevokeAuthorization(m) => house::revoke_authorization(ctx, m),
        Msg::PlaceBet(m) => bet::place_bet(ctx, m).map(|_| ()),
        Msg::AddMarket(m) => market::add_market(ctx, m),
        Msg::UpdateMarket(m) => market::update_market(ctx, m),
        Msg::ResolveMarket(m) => market::resolve_market(ctx, m),
        Msg::CancelMarket(m) => market::cancel_market(ctx, m),
        Msg::AbortMarket(m) => market::abort_market(ctx, m),
        Msg::UpdateOvmKeys(m) => ovm::update_keys(ctx, m),
    }
}

/// Deterministic wagering state machine.
pub struct Engine {
    store: MemStore,
    bank: StoreBank,
    block: BlockInfo,
    /// Messages delivered in the current block.
    tx_count: u64,
}

impl Engine {
    /// Engine with an empty store and default parameters.
    pub fn new() -> Self {
        Self {
            store: MemStore::new(),
            bank: StoreBank,
            block: BlockInfo::default(),
            tx_count: 0,
        }
    }

    pub fn from_genesis(genesis: &Genesis) -> Result<Self> {
        genesis.bet.validate()?;
        genesis.house.validate()?;
        genesis.market.validate()?;

        let mut engine = Self::new();
        {
            let mut ctx = Ctx::new(&mut engine.store, &engine.bank, engine.block);
            ctx.set(keys::params("bet")?, &genesis.bet)?;
            ctx.set(keys::params("house")?, &genesis.house)?;
            ctx.set(keys::params("market")?, &genesis.market)?;
            if let Some(set) = &genesis.ovm {
                ovm::store_keys(&mut ctx, set)?;
            }
        }
        for (address, amount) in &genesis.balances {
            engine.bank.mint(&mut engine.store, address, *amount)?;
        }

        info!(
            accounts = genesis.balances.len(),
            oracle_keys = genesis.ovm.as_ref().map_or(0, |s| s.keys.len()),
            state_root = %hex::encode(engine.state_root()),
            "genesis applied"
        );
        Ok(engine)
    }

    // ========================================================================
    // Block lifecycle
    // ========================================================================

    pub fn begin_block(&mut self, height: u64, time: u64) {
        self.block = BlockInfo { height, time };
        self.tx_count = 0;
        debug!(height, time, "begin block");
    }

    /// Execute one message atomically.
    ///
    /// On error nothing is written and the error is returned to the caller.
    pub fn deliver(&mut self, msg: &Msg) -> Result<TxResponse> {
        self.tx_count += 1;
        let mut cache = CacheStore::new(&self.store);
        let (result, events) = {
            let mut ctx = Ctx::new(&mut cache, &self.bank, self.block);
            let result = dispatch(&mut ctx, msg);
            (result, ctx.events)
        };

        match result {
            Ok(()) => {
                let writes = cache.into_writes();
                debug!(msg = msg.name(), writes = writes.len(), events = events.len(), "tx committed");
                self.store.apply(writes);
                Ok(TxResponse { events })
            }
            Err(e) => {
                warn!(
                    height = self.block.height,
                    msg = msg.name(),
                    code = e.code(),
                    error = %e,
                    "tx rejected"
                );
                Err(e)
            }
        }
    }

    /// Run batch settlement and seal the block.
    pub fn end_block(&mut self) -> Result<(BlockReceipt, Vec<Event>)> {
        let mut cache = CacheStore::new(&self.store);
        let (result, events) = {
            let mut ctx = Ctx::new(&mut cache, &self.bank, self.block);
            let result = bet::batch_settlement(&mut ctx);
            (result, ctx.events)
        };
        let summary: SettlementSummary = result?;
        let writes = cache.into_writes();
        self.store.apply(writes);

        let receipt = BlockReceipt::new(
            self.block.height,
            summary.bets_settled as u64,
            summary.markets_settled as u64,
            self.state_root(),
            self.block.time,
        );
        info!(
            height = receipt.height,
            txs = self.tx_count,
            bets_settled = receipt.bets_settled,
            markets_settled = receipt.markets_settled,
            state_root = %receipt.state_root_hex(),
            "end block"
        );
        Ok((receipt, events))
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn block(&self) -> BlockInfo {
        self.block
    }

    pub fn state_root(&self) -> [u8; 32] {
        self.store.state_root()
    }

    pub fn store(&self) -> &dyn KvStore {
        &self.store
    }

    /// Verify the accounting invariants over the committed state.
    pub fn check_invariants(&self) -> Result<()> {
        check_invariants(&self.store, &self.bank)
    }

    /// Credit tokens outside any message (genesis top-ups, tests).
    pub fn mint(&mut self, address: &str, amount: Amount) -> Result<()> {
        self.bank.mint(&mut self.store, address, amount)
    }

    pub fn balance(&self, address: &str) -> Result<Amount> {
        self.bank.balance(&self.store, address)
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    fn ctx(&mut self) -> Ctx<'_> {
        Ctx::new(&mut self.store, &self.bank, self.block)
    }

    pub fn bet_params(&self) -> Result<BetParams> {
        Ok(crate::store::get_value(&self.store, &keys::params("bet")?)?.unwrap_or_default())
    }

    pub fn house_params(&self) -> Result<HouseParams> {
        Ok(crate::store::get_value(&self.store, &keys::params("house")?)?.unwrap_or_default())
    }

    pub fn market_params(&self) -> Result<MarketParams> {
        Ok(crate::store::get_value(&self.store, &keys::params("market")?)?.unwrap_or_default())
    }

    pub fn set_bet_params(&mut self, params: BetParams) -> Result<()> {
        params.validate()?;
        self.ctx().set(keys::params("bet")?, &params)
    }

    pub fn set_house_params(&mut self, params: HouseParams) -> Result<()> {
        params.validate()?;
        self.ctx().set(keys::params("house")?, &params)
    }

    pub fn set_market_params(&mut self, params: MarketParams) -> Result<()> {
        params.validate()?;
        self.ctx().set(keys::params("market")?, &params)
    }

    pub fn ovm_keys(&self) -> Result<OvmKeySet> {
        ovm::load_keys(&self.store)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn market(&self, uid: &str) -> Result<Market> {
        market::get_market(&self.store, uid)
    }

    pub fn markets(&self, offset: usize, limit: usize) -> Result<Vec<Market>> {
        market::list_markets(&self.store, offset, limit)
    }

    pub fn order_book(&self, market_uid: &str) -> Result<OrderBook> {
        query::order_book(&self.store, market_uid)
    }

    pub fn participations(&self, market_uid: &str) -> Result<Vec<Participation>> {
        query::participations(&self.store, market_uid)
    }

    pub fn participation_exposures(&self, market_uid: &str) -> Result<Vec<ParticipationExposure>> {
        query::participation_exposures(&self.store, market_uid)
    }

    pub fn deposit(&self, depositor: &str, market_uid: &str, index: u64) -> Result<Deposit> {
        house::get_deposit(&self.store, depositor, market_uid, index)
    }

    pub fn deposits(&self, depositor: &str) -> Result<Vec<Deposit>> {
        house::deposits_of(&self.store, depositor)
    }

    pub fn withdrawals(&self, depositor: &str, market_uid: &str) -> Result<Vec<Withdrawal>> {
        house::withdrawals_of(&self.store, depositor, market_uid)
    }

    pub fn withdrawable(&self, depositor: &str, market_uid: &str, index: u64) -> Result<Amount> {
        house::withdrawable(&self.store, depositor, market_uid, index)
    }

    pub fn authorization(
        &self,
        granter: &str,
        grantee: &str,
        kind: AuthorizationKind,
        market_uid: &str,
    ) -> Result<Option<Authorization>> {
        house::get_authorization(&self.store, granter, grantee, kind, market_uid)
    }

    pub fn bet(&self, bettor: &str, uid: &str) -> Result<Bet> {
        bet::get_bet(&self.store, bettor, uid)
    }

    /// Bets by UID, looking up at most `max_bet_by_uid_query_count` UIDs.
    pub fn bets_by_uids(&self, uids: &[String]) -> Result<Vec<Bet>> {
        let cap = self.bet_params()?.max_bet_by_uid_query_count;
        bet::bets_by_uids(&self.store, uids, cap)
    }

    pub fn bets_by_market(&self, market_uid: &str, offset: usize, limit: usize) -> Result<Vec<Bet>> {
        bet::bets_by_market(&self.store, market_uid, offset, limit)
    }

    pub fn pending_bets(&self, market_uid: &str, offset: usize, limit: usize) -> Result<Vec<Bet>> {
        bet::pending_bets(&self.store, market_uid, offset, limit)
    }

    pub fn settlement_queue_len(&self, market_uid: &str) -> Result<usize> {
        bet::settlement_queue_len(&self.store, market_uid)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ovm::{public_key_hex, sign_ticket};
    use crate::types::msgs::{AddMarketPayload, MsgDeposit, MsgOracle, TicketKind};
    use crate::types::{MarketOdds, MarketStatus, OddsKind};
    use ed25519_dalek::SigningKey;

    fn oracle() -> SigningKey {
        SigningKey::from_bytes(&[3; 32])
    }

    fn engine() -> Engine {
        let genesis = Genesis {
            ovm: Some(OvmKeySet::new(vec![public_key_hex(&oracle())], 1).unwrap()),
            balances: vec![("house".into(), 5_000)],
            ..Genesis::default()
        };
        Engine::from_genesis(&genesis).unwrap()
    }

    fn add_market(uid: &str) -> Msg {
        let payload = AddMarketPayload {
            kind: TicketKind::AddMarket,
            uid: uid.into(),
            start_ts: 0,
            end_ts: 0,
            odds: vec![
                MarketOdds::new("a", OddsKind::Decimal, "2.0"),
                MarketOdds::new("b", OddsKind::Decimal, "2.0"),
            ],
            meta: String::new(),
            exp: 10_000,
        };
        Msg::AddMarket(MsgOracle::new("oracle", sign_ticket(&payload, &[oracle()]).unwrap()))
    }

    #[test]
    fn test_genesis_rejects_invalid_params() {
        let genesis = Genesis {
            bet: BetParams {
                batch_settlement_count: 0,
                ..BetParams::default()
            },
            ..Genesis::default()
        };
        assert_eq!(Engine::from_genesis(&genesis).err().map(|e| e.code()), Some("PARAM_OUT_OF_RANGE"));
    }

    #[test]
    fn test_deliver_commits_on_success() {
        let mut engine = engine();
        engine.begin_block(1, 100);

        let resp = engine.deliver(&add_market("m1")).unwrap();
        assert!(matches!(resp.events[0], Event::MarketCreated { .. }));
        assert_eq!(engine.market("m1").unwrap().status, MarketStatus::Active);

        engine.deliver(&Msg::Deposit(MsgDeposit::new("house", "m1", 1_000))).unwrap();
        assert_eq!(engine.participations("m1").unwrap().len(), 1);
        engine.check_invariants().unwrap();
    }

    #[test]
    fn test_failed_message_leaves_no_writes() {
        let mut engine = engine();
        engine.begin_block(1, 100);
        engine.deliver(&add_market("m1")).unwrap();
        let root = engine.state_root();

        let err = engine.deliver(&add_market("m1")).unwrap_err();
        assert_eq!(err.code(), "MARKET_ALREADY_EXISTS");
        let err = engine
            .deliver(&Msg::Deposit(MsgDeposit::new("house", "m1", 9_000)))
            .unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(engine.state_root(), root);
    }

    #[test]
    fn test_end_block_receipt() {
        let mut engine = engine();
        engine.begin_block(4, 400);
        let (receipt, events) = engine.end_block().unwrap();
        assert_eq!(receipt.height, 4);
        assert_eq!(receipt.timestamp, 400);
        assert_eq!(receipt.bets_settled, 0);
        assert_eq!(receipt.state_root, engine.state_root());
        assert!(events.is_empty());
    }

    #[test]
    fn test_set_params_validates() {
        let mut engine = engine();
        let mut params = engine.house_params().unwrap();
        params.min_deposit = 1;
        assert!(engine.set_house_params(params).is_err());

        let mut params = engine.bet_params().unwrap();
        params.max_bet_by_uid_query_count = 3;
        engine.set_bet_params(params).unwrap();
        assert_eq!(engine.bet_params().unwrap().max_bet_by_uid_query_count, 3);
    }
}
