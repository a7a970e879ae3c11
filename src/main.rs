//! Wagerbook - demo binary
//!
//! Runs one scripted wagering round against a fresh engine: an oracle
//! lists a market, a house deposits liquidity, two bettors take opposite
//! sides, the oracle resolves and end block settles everything.

use std::path::PathBuf;

use clap::Parser;
use ed25519_dalek::SigningKey;
use serde::Serialize;
use tracing::info;

use wagerbook::ovm::{public_key_hex, sign_ticket, OvmKeySet};
use wagerbook::types::msgs::{
    AddMarketPayload, BetTicketPayload, MsgDeposit, MsgOracle, MsgPlaceBet, MsgWithdraw,
    ResolveMarketPayload, TicketKind,
};
use wagerbook::types::{Amount, BlockReceipt, MarketOdds, WithdrawalMode};
use wagerbook::{Engine, EngineConfig, Msg, OddsKind, Result};

const DEMO_TIME: u64 = 1_703_577_600;
const BLOCK_SECONDS: u64 = 5;

#[derive(Parser, Debug)]
#[command(name = "wagerbook", about = "Run a scripted wagering round")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `logging.level`
    #[arg(long)]
    log_level: Option<String>,

    /// Overrides `logging.format` (pretty or json)
    #[arg(long)]
    format: Option<String>,
}

struct Demo {
    engine: Engine,
    oracle: SigningKey,
    height: u64,
    time: u64,
}

impl Demo {
    fn oracle_msg<T: Serialize>(&self, payload: &T) -> Result<MsgOracle> {
        let ticket = sign_ticket(payload, std::slice::from_ref(&self.oracle))?;
        Ok(MsgOracle::new("oracle", ticket))
    }

    fn bet(&mut self, bettor: &str, uid: &str, odds_uid: &str, value: &str, amount: Amount) -> Result<()> {
        let payload = BetTicketPayload {
            kind: TicketKind::PlaceBet,
            bet_uid: uid.into(),
            market_uid: "demo".into(),
            odds_uid: odds_uid.into(),
            odds_value: value.into(),
            odds_kind: OddsKind::Decimal,
            max_loss: 0,
            exp: self.time + 60,
        };
        let msg = MsgPlaceBet {
            bettor: bettor.into(),
            bet_uid: uid.into(),
            market_uid: "demo".into(),
            odds_uid: odds_uid.into(),
            odds_value: value.into(),
            odds_kind: OddsKind::Decimal,
            amount,
            ticket: sign_ticket(&payload, std::slice::from_ref(&self.oracle))?,
        };
        self.engine.deliver(&Msg::PlaceBet(msg))?;
        Ok(())
    }

    fn next_block(&mut self) -> Result<BlockReceipt> {
        let (receipt, events) = self.engine.end_block()?;
        for event in &events {
            info!(?event, "end block");
        }
        self.engine.check_invariants()?;
        self.height += 1;
        self.time += BLOCK_SECONDS;
        self.engine.begin_block(self.height, self.time);
        Ok(receipt)
    }
}

fn print_receipt(receipt: &BlockReceipt) {
    println!(
        "  block {:>3}  bets settled {:>3}  markets settled {:>2}  root {}",
        receipt.height,
        receipt.bets_settled,
        receipt.markets_settled,
        receipt.state_root_hex()
    );
}

fn run(config: &EngineConfig) -> Result<()> {
    let oracle = SigningKey::from_bytes(&BlockReceipt::compute_hash(b"wagerbook demo oracle"));
    let mut genesis = config.genesis()?;
    genesis.ovm = Some(OvmKeySet::new(vec![public_key_hex(&oracle)], 1)?);
    let min_bet = genesis.bet.placement_constraints.min_amount;
    for (address, balance) in [("house", 1_000 * min_bet), ("alice", 10 * min_bet), ("bob", 10 * min_bet)] {
        if !genesis.balances.iter().any(|(a, _)| a == address) {
            genesis.balances.push((address.to_string(), balance));
        }
    }

    let mut demo = Demo {
        engine: Engine::from_genesis(&genesis)?,
        oracle,
        height: 1,
        time: DEMO_TIME,
    };
    demo.engine.begin_block(demo.height, demo.time);

    println!("Listing market and funding the house...");
    let add = AddMarketPayload {
        kind: TicketKind::AddMarket,
        uid: "demo".into(),
        start_ts: 0,
        end_ts: 0,
        odds: vec![
            MarketOdds::new("home", OddsKind::Decimal, "1.8"),
            MarketOdds::new("away", OddsKind::Decimal, "2.2"),
        ],
        meta: "home vs away".into(),
        exp: demo.time + 60,
    };
    let msg = demo.oracle_msg(&add)?;
    demo.engine.deliver(&Msg::AddMarket(msg))?;
    demo.engine
        .deliver(&Msg::Deposit(MsgDeposit::new("house", "demo", 100 * min_bet)))?;
    print_receipt(&demo.next_block()?);

    println!("Placing bets...");
    demo.bet("alice", "alice-1", "home", "1.8", 5 * min_bet)?;
    demo.bet("bob", "bob-1", "away", "2.2", 3 * min_bet)?;
    print_receipt(&demo.next_block()?);

    println!("Resolving market (home wins)...");
    let resolve = ResolveMarketPayload {
        kind: TicketKind::ResolveMarket,
        uid: "demo".into(),
        winner_odds_uid: "home".into(),
        resolution_ts: demo.time,
        exp: demo.time + 60,
    };
    let msg = demo.oracle_msg(&resolve)?;
    demo.engine.deliver(&Msg::ResolveMarket(msg))?;
    print_receipt(&demo.next_block()?);

    println!("Withdrawing house balance...");
    let available = demo.engine.withdrawable("house", "demo", 1)?;
    demo.engine.deliver(&Msg::Withdraw(MsgWithdraw::new(
        "house",
        "demo",
        1,
        available,
        WithdrawalMode::Full,
    )))?;
    print_receipt(&demo.next_block()?);

    println!();
    for address in ["house", "alice", "bob"] {
        println!("  {:<6} {:>24}", address, demo.engine.balance(address)?);
    }
    println!("  final state root {}", hex::encode(demo.engine.state_root()));
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}", path.display(), e);
                std::process::exit(2);
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.format {
        config.logging.format = format;
    }
    config.logging.init();

    println!("===========================================");
    println!("  Wagerbook - scripted round");
    println!("===========================================");
    println!();

    if let Err(e) = run(&config) {
        eprintln!("demo failed [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}
