//! Accounting invariants over committed state.
//!
//! | Check | Holds when |
//! |-------|------------|
//! | participation | `current_round_liquidity + locked_liability = liquidity`, liquidity never negative, locked = max exposure while unsettled |
//! | odds exposure | `total_locked = Σ exposure` of its participations |
//! | bet | `Σ fulfillment stake = amount`, `Σ fulfillment profit = payout_profit` |
//! | house reserve | `= Σ (liquidity + actual_profit - withdrawn)` |
//! | bet reserve | `= Σ` stakes of pending bets |

use std::collections::BTreeMap;

use crate::bank::{Bank, BET_RESERVE, HOUSE_RESERVE};
use crate::error::{EngineError, Result};
use crate::store::{keys, values_with_prefix, KvStore};
use crate::types::{
    Amount, Bet, Deposit, OddsExposure, Participation, ParticipationExposure,
};

fn violation(msg: String) -> EngineError {
    EngineError::InvariantViolation(msg)
}

/// Check every invariant; the first failure is returned.
pub fn check_invariants(store: &dyn KvStore, bank: &dyn Bank) -> Result<()> {
    let participations: Vec<Participation> = values_with_prefix(store, keys::PARTICIPATION)?;
    let exposures: Vec<ParticipationExposure> = values_with_prefix(store, keys::PARTICIPATION_EXPOSURE)?;
    let odds_exposures: Vec<OddsExposure> = values_with_prefix(store, keys::ODDS_EXPOSURE)?;
    let deposits: Vec<Deposit> = values_with_prefix(store, keys::DEPOSIT)?;
    let bets: Vec<Bet> = values_with_prefix(store, keys::BET)?;

    // (market, index) -> largest exposure
    let mut max_exposure: BTreeMap<(&str, u64), Amount> = BTreeMap::new();
    // (market, odds) -> summed exposure
    let mut odds_sum: BTreeMap<(&str, &str), Amount> = BTreeMap::new();
    for pe in &exposures {
        if pe.exposure < 0 || pe.bet_amount < 0 {
            return Err(violation(format!(
                "negative exposure for participation {} on {}/{}",
                pe.participation_index, pe.market_uid, pe.odds_uid
            )));
        }
        let max = max_exposure
            .entry((pe.market_uid.as_str(), pe.participation_index))
            .or_insert(0);
        *max = (*max).max(pe.exposure);
        *odds_sum
            .entry((pe.market_uid.as_str(), pe.odds_uid.as_str()))
            .or_insert(0) += pe.exposure;
    }

    for p in &participations {
        if p.current_round_liquidity + p.locked_liability != p.liquidity {
            return Err(violation(format!(
                "participation {} of {}: {} + {} != {}",
                p.index, p.market_uid, p.current_round_liquidity, p.locked_liability, p.liquidity
            )));
        }
        if p.current_round_liquidity < 0 {
            return Err(violation(format!(
                "participation {} of {} has negative liquidity {}",
                p.index, p.market_uid, p.current_round_liquidity
            )));
        }
        let expected = max_exposure
            .get(&(p.market_uid.as_str(), p.index))
            .copied()
            .unwrap_or(0);
        if !p.is_settled && p.locked_liability != expected {
            return Err(violation(format!(
                "participation {} of {} locks {} but its largest exposure is {}",
                p.index, p.market_uid, p.locked_liability, expected
            )));
        }
    }

    for oe in &odds_exposures {
        let sum = odds_sum
            .get(&(oe.market_uid.as_str(), oe.odds_uid.as_str()))
            .copied()
            .unwrap_or(0);
        if oe.total_locked != sum {
            return Err(violation(format!(
                "odds {}/{} locks {} but exposures sum to {}",
                oe.market_uid, oe.odds_uid, oe.total_locked, sum
            )));
        }
    }

    let mut pending_stakes: Amount = 0;
    for b in &bets {
        if b.fulfilled_amount() != b.amount {
            return Err(violation(format!(
                "bet {} stake {} split as {}",
                b.uid,
                b.amount,
                b.fulfilled_amount()
            )));
        }
        if b.fulfilled_profit() != b.payout_profit {
            return Err(violation(format!(
                "bet {} profit {} covered by {}",
                b.uid,
                b.payout_profit,
                b.fulfilled_profit()
            )));
        }
        if b.is_pending() {
            pending_stakes += b.amount;
        }
    }

    let withdrawn: BTreeMap<(&str, u64), Amount> = deposits
        .iter()
        .map(|d| ((d.market_uid.as_str(), d.participation_index), d.total_withdrawn))
        .collect();
    let mut house_expected: Amount = 0;
    for p in &participations {
        let taken = withdrawn
            .get(&(p.market_uid.as_str(), p.index))
            .copied()
            .unwrap_or(0);
        house_expected += p.liquidity + p.actual_profit - taken;
    }

    let house = bank.balance(store, HOUSE_RESERVE)?;
    if house != house_expected {
        return Err(violation(format!(
            "house reserve holds {} but participations account for {}",
            house, house_expected
        )));
    }
    let escrow = bank.balance(store, BET_RESERVE)?;
    if escrow != pending_stakes {
        return Err(violation(format!(
            "bet reserve holds {} but pending stakes are {}",
            escrow, pending_stakes
        )));
    }
    Ok(())
}
