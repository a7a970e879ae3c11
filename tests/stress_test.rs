//! Randomized stress tests for the wagering engine.
//!
//! These tests verify:
//! 1. Accounting invariants hold after every block under random load
//! 2. No handler ever reports an invariant violation
//! 3. Token supply is conserved
//! 4. Determinism is preserved across runs
//!
//! ## Running Stress Tests
//!
//! ```bash
//! cargo test --release --test stress_test -- --nocapture
//! ```

mod common;

use std::time::Instant;

use common::Chain;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use wagerbook::bank::{BET_RESERVE, FEE_COLLECTOR, HOUSE_RESERVE};
use wagerbook::types::{Amount, BetParams, MarketOdds, OddsKind, PlacementConstraints, WithdrawalMode};
use wagerbook::Result;

// ============================================================================
// TEST CONSTANTS
// ============================================================================

const HOUSES: usize = 4;
const BETTORS: usize = 8;
const HOUSE_FUNDS: Amount = 1_000_000;
const BETTOR_FUNDS: Amount = 200_000;

/// Quotes markets are built from.
const QUOTES: [(OddsKind, &str); 7] = [
    (OddsKind::Decimal, "1.5"),
    (OddsKind::Decimal, "2.0"),
    (OddsKind::Decimal, "3.25"),
    (OddsKind::Fractional, "5/2"),
    (OddsKind::Fractional, "1/4"),
    (OddsKind::Moneyline, "-150"),
    (OddsKind::Moneyline, "+120"),
];

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

#[derive(Debug, Default)]
struct Stats {
    accepted: u64,
    rejected: u64,
    bets_settled: u64,
    markets_settled: u64,
}

impl Stats {
    fn record<T>(&mut self, result: Result<T>) {
        match result {
            Ok(_) => self.accepted += 1,
            Err(e) => {
                assert!(!e.is_fatal(), "handler reported {}", e);
                self.rejected += 1;
            }
        }
    }
}

fn house(i: usize) -> String {
    format!("house{}", i)
}

fn bettor(i: usize) -> String {
    format!("bettor{}", i)
}

fn all_accounts() -> Vec<String> {
    let mut accounts: Vec<String> = (0..HOUSES).map(house).collect();
    accounts.extend((0..BETTORS).map(bettor));
    accounts.extend([BET_RESERVE, HOUSE_RESERVE, FEE_COLLECTOR].iter().map(|s| s.to_string()));
    accounts
}

fn total_supply(chain: &Chain) -> Amount {
    all_accounts().iter().map(|a| chain.balance(a)).sum()
}

fn random_odds(rng: &mut ChaCha8Rng) -> Vec<MarketOdds> {
    let count = rng.gen_range(2..=4);
    (0..count)
        .map(|i| {
            let (kind, value) = QUOTES[rng.gen_range(0..QUOTES.len())];
            let odds = MarketOdds::new(format!("o{}", i), kind, value);
            if rng.gen_bool(0.2) {
                odds.with_max_loss(rng.gen_range(5_000..50_000))
            } else {
                odds
            }
        })
        .collect()
}

/// Run `blocks` random blocks and return the final state root.
fn simulate(seed: u64, blocks: u64) -> ([u8; 32], Stats) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut balances: Vec<(String, Amount)> = (0..HOUSES).map(|i| (house(i), HOUSE_FUNDS)).collect();
    balances.extend((0..BETTORS).map(|i| (bettor(i), BETTOR_FUNDS)));
    let refs: Vec<(&str, Amount)> = balances.iter().map(|(a, b)| (a.as_str(), *b)).collect();

    let params = BetParams {
        batch_settlement_count: 25,
        placement_constraints: PlacementConstraints { min_amount: 10, bet_fee: 3 },
        ..BetParams::default()
    };
    let mut chain = Chain::with_params(&refs, params);
    let supply = total_supply(&chain);

    let mut stats = Stats::default();
    let mut open: Vec<String> = Vec::new();
    let mut closed: Vec<String> = Vec::new();
    let mut market_seq = 0u64;
    let mut bet_seq = 0u64;

    for _ in 0..blocks {
        if open.len() < 3 || rng.gen_bool(0.2) {
            market_seq += 1;
            let uid = format!("m{}", market_seq);
            let result = chain.add_market(&uid, random_odds(&mut rng));
            if result.is_ok() {
                open.push(uid);
            }
            stats.record(result);
        }

        for _ in 0..rng.gen_range(0..4) {
            let market = &open[rng.gen_range(0..open.len())];
            let h = house(rng.gen_range(0..HOUSES));
            let amount = rng.gen_range(50..20_000);
            let result = chain.deposit(&h, market, amount);
            stats.record(result);
        }

        for _ in 0..rng.gen_range(0..12) {
            let market_uid = open[rng.gen_range(0..open.len())].clone();
            let market = chain.engine.market(&market_uid).unwrap();
            let odds_uid = market.odds[rng.gen_range(0..market.odds.len())].uid.clone();
            bet_seq += 1;
            let b = bettor(rng.gen_range(0..BETTORS));
            let amount = rng.gen_range(5..4_000);
            let result = chain.bet(&b, &format!("bet{}", bet_seq), &market_uid, &odds_uid, amount);
            stats.record(result);
        }

        if open.len() > 2 && rng.gen_bool(0.35) {
            let uid = open.remove(rng.gen_range(0..open.len()));
            let result = match rng.gen_range(0..10) {
                0 => chain.cancel(&uid),
                1 => chain.abort(&uid),
                _ => {
                    let market = chain.engine.market(&uid).unwrap();
                    let winner = market.odds[rng.gen_range(0..market.odds.len())].uid.clone();
                    chain.resolve(&uid, &winner)
                }
            };
            stats.record(result);
            closed.push(uid);
        }

        for i in 0..HOUSES {
            let h = house(i);
            for deposit in chain.engine.deposits(&h).unwrap() {
                if !closed.contains(&deposit.market_uid) || !rng.gen_bool(0.5) {
                    continue;
                }
                let available = chain
                    .engine
                    .withdrawable(&h, &deposit.market_uid, deposit.participation_index)
                    .unwrap();
                if available <= 0 {
                    continue;
                }
                let result = chain.withdraw(
                    &h,
                    &deposit.market_uid,
                    deposit.participation_index,
                    available,
                    WithdrawalMode::Full,
                );
                stats.record(result);
            }
        }

        let (receipt, _) = chain.next_block();
        stats.bets_settled += receipt.bets_settled;
        stats.markets_settled += receipt.markets_settled;
        assert_eq!(total_supply(&chain), supply, "supply changed at height {}", receipt.height);
    }

    (chain.engine.state_root(), stats)
}

// ============================================================================
// STRESS TESTS
// ============================================================================

/// Random markets, deposits, bets, resolutions and withdrawals.
///
/// # Verification
/// - Invariants hold after every block (checked by `Chain::next_block`)
/// - No handler fails with an invariant violation
/// - Supply is conserved
/// - Settlement actually happens
#[test]
fn stress_random_rounds() {
    println!("\n=== STRESS TEST: random wagering rounds ===\n");

    let start = Instant::now();
    let (root, stats) = simulate(42, 300);
    let elapsed = start.elapsed();

    println!("  Elapsed time:      {:>12.2?}", elapsed);
    println!("  Accepted txs:      {:>12}", stats.accepted);
    println!("  Rejected txs:      {:>12}", stats.rejected);
    println!("  Bets settled:      {:>12}", stats.bets_settled);
    println!("  Markets settled:   {:>12}", stats.markets_settled);
    println!("  State root:        {}", hex::encode(root));

    assert!(stats.accepted > 0);
    assert!(stats.bets_settled > 0, "Expected some bets to settle");
    assert!(stats.markets_settled > 0, "Expected some markets to settle");

    println!("\n=== STRESS TEST PASSED ===\n");
}

/// Verify determinism: Same sequence produces identical state root.
#[test]
fn verify_determinism() {
    const BLOCKS: u64 = 60;
    const SEED: u64 = 12345;

    let (root1, _) = simulate(SEED, BLOCKS);
    let (root2, _) = simulate(SEED, BLOCKS);
    println!("  Run 1 state root: {}", hex::encode(root1));
    println!("  Run 2 state root: {}", hex::encode(root2));
    assert_eq!(root1, root2, "State roots must match for determinism");

    let (root3, _) = simulate(SEED + 1, BLOCKS);
    println!("  Different seed:   {}", hex::encode(root3));
    assert_ne!(root1, root3, "Different seeds should produce different roots");
}
