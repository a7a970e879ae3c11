//! Odds arithmetic for the three quoting conventions.
//!
//! Each convention is a pair of pure functions over the quoted value
//! string:
//!
//! - `calculate_payout(value, stake)` - total payout (stake + profit)
//! - `calculate_bet_amount(value, profit)` - stake needed for a profit
//!
//! | Kind | Value | Profit for stake `s` |
//! |------|-------|----------------------|
//! | Decimal | `d > 1` | `s * (d - 1)` |
//! | Fractional | `p/q` | `s * p / q` |
//! | Moneyline | `m != 0` | `s * m / 100` if `m > 0`, else `s * 100 / abs(m)` |
//!
//! All intermediate values are 18-digit decimals; truncation to atoms
//! happens at the caller.
//!
//! ```
//! use wagerbook::types::odds::OddsKind;
//! use rust_decimal::Decimal;
//!
//! let payout = OddsKind::Fractional.calculate_payout("5/2", 10).unwrap();
//! assert_eq!(payout, Decimal::from(35));
//! ```

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::dec::{self, parse_dec};
use crate::types::Amount;

/// Odds quoting convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsKind {
    /// European style, e.g. `2.5`
    Decimal,
    /// British style, e.g. `5/2`
    Fractional,
    /// American style, e.g. `+150` or `-200`
    Moneyline,
}

impl OddsKind {
    /// All supported kinds, in canonical order.
    pub const ALL: [OddsKind; 3] = [OddsKind::Decimal, OddsKind::Fractional, OddsKind::Moneyline];

    /// Lowercase name used in messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            OddsKind::Decimal => "decimal",
            OddsKind::Fractional => "fractional",
            OddsKind::Moneyline => "moneyline",
        }
    }

    /// Total payout (stake plus profit) for `amount` at the quoted value.
    pub fn calculate_payout(self, value: &str, amount: Amount) -> Result<Decimal> {
        let stake = dec::from_amount(amount)?;
        match self {
            OddsKind::Decimal => {
                let d = parse_decimal_odds(value)?;
                dec::mul(d, stake)
            }
            OddsKind::Fractional => {
                let (p, q) = parse_fraction(value)?;
                dec::add(stake, dec::mul_div(stake, p, q)?)
            }
            OddsKind::Moneyline => {
                let m = parse_moneyline(value)?;
                let profit = if m.is_sign_positive() {
                    dec::mul_div(stake, m, Decimal::ONE_HUNDRED)?
                } else {
                    dec::mul_div(stake, Decimal::ONE_HUNDRED, m.abs())?
                };
                dec::add(stake, profit.abs())
            }
        }
    }

    /// Stake required to win `profit` at the quoted value.
    pub fn calculate_bet_amount(self, value: &str, profit: Decimal) -> Result<Decimal> {
        match self {
            OddsKind::Decimal => {
                let d = parse_decimal_odds(value)?;
                dec::div(profit, dec::sub(d, Decimal::ONE)?)
            }
            OddsKind::Fractional => {
                let (p, q) = parse_fraction(value)?;
                dec::mul_div(profit, q, p)
            }
            OddsKind::Moneyline => {
                let m = parse_moneyline(value)?;
                let stake = if m.is_sign_positive() {
                    dec::mul_div(profit, Decimal::ONE_HUNDRED, m)?
                } else {
                    dec::mul_div(profit, m.abs(), Decimal::ONE_HUNDRED)?
                };
                Ok(stake.abs())
            }
        }
    }

    /// Profit part of the payout, truncated toward zero to whole atoms.
    ///
    /// Computed directly from the exact product, so stakes whose payout
    /// needs more than 28 significant digits still truncate correctly.
    pub fn payout_profit(self, value: &str, amount: Amount) -> Result<Amount> {
        match self {
            OddsKind::Decimal => {
                let d = parse_decimal_odds(value)?;
                dec::mul_div_atoms(amount, dec::sub(d, Decimal::ONE)?, Decimal::ONE)
            }
            OddsKind::Fractional => {
                let (p, q) = parse_fraction(value)?;
                dec::mul_div_atoms(amount, p, q)
            }
            OddsKind::Moneyline => {
                let m = parse_moneyline(value)?;
                if m.is_sign_positive() {
                    dec::mul_div_atoms(amount, m, Decimal::ONE_HUNDRED)
                } else {
                    dec::mul_div_atoms(amount, Decimal::ONE_HUNDRED, m.abs())
                }
            }
        }
    }

    /// Validate the quoted value without computing anything.
    pub fn validate(self, value: &str) -> Result<()> {
        match self {
            OddsKind::Decimal => parse_decimal_odds(value).map(|_| ()),
            OddsKind::Fractional => parse_fraction(value).map(|_| ()),
            OddsKind::Moneyline => parse_moneyline(value).map(|_| ()),
        }
    }
}

impl fmt::Display for OddsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn format_error(kind: OddsKind, value: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidOddsFormat {
        kind: kind.name(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_decimal_odds(value: &str) -> Result<Decimal> {
    let d = parse_dec(value)
        .ok_or_else(|| format_error(OddsKind::Decimal, value, "not a decimal number"))?;
    if d <= Decimal::ZERO {
        return Err(EngineError::OddsNotPositive(value.to_string()));
    }
    if d <= Decimal::ONE {
        return Err(EngineError::OddsLessOrEqualOne(value.to_string()));
    }
    Ok(d)
}

fn parse_integer(kind: OddsKind, value: &str, part: &str) -> Result<Decimal> {
    let n: i128 = part
        .trim()
        .parse()
        .map_err(|_| format_error(kind, value, format!("invalid integer '{}'", part)))?;
    dec::from_amount(n)
}

/// `p/q` with both parts strictly positive integers.
fn parse_fraction(value: &str) -> Result<(Decimal, Decimal)> {
    let kind = OddsKind::Fractional;
    let mut parts = value.split('/');
    let (first, second) = match (parts.next(), parts.next(), parts.next()) {
        (Some(first), Some(second), None) => (first, second),
        _ => return Err(format_error(kind, value, "expected two parts separated by '/'")),
    };

    let p = parse_integer(kind, value, first)?;
    let q = parse_integer(kind, value, second)?;
    if p <= Decimal::ZERO || q <= Decimal::ZERO {
        return Err(EngineError::OddsNotPositive(value.to_string()));
    }
    Ok((p, q))
}

fn parse_moneyline(value: &str) -> Result<Decimal> {
    let m = parse_integer(OddsKind::Moneyline, value, value)?;
    if m.is_zero() {
        return Err(EngineError::OddsZero);
    }
    Ok(m)
}
