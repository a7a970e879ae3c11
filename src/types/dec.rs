//! Fixed-point decimal helpers.
//!
//! ## Overview
//!
//! Token quantities are whole atoms ([`Amount`]); ratios such as odds and
//! fees are `rust_decimal::Decimal` values carrying at most 18 fractional
//! digits. Every multiply and divide is checked and truncated toward zero
//! at [`PRECISION`] digits, so every validator computes identical values.
//!
//! ## Examples
//!
//! ```
//! use wagerbook::types::dec::{parse_dec, mul, to_amount_trunc, from_amount};
//!
//! let fee = parse_dec("0.1").unwrap();
//! let share = mul(from_amount(1000).unwrap(), fee).unwrap();
//! assert_eq!(to_amount_trunc(share).unwrap(), 100);
//! ```

use std::str::FromStr;

use alloy_primitives::U512;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::error::{EngineError, Result};
use crate::types::Amount;

/// Number of fractional digits kept by every decimal operation.
pub const PRECISION: u32 = 18;

// ============================================================================
// Conversion Functions
// ============================================================================

/// Parse a decimal string, rejecting more than [`PRECISION`] fractional digits.
///
/// ```
/// use wagerbook::types::dec::parse_dec;
///
/// assert!(parse_dec("2.5").is_some());
/// assert!(parse_dec("abc").is_none());
/// assert!(parse_dec("0.0000000000000000001").is_none());
/// ```
pub fn parse_dec(s: &str) -> Option<Decimal> {
    let d = Decimal::from_str(s.trim()).ok()?;
    if d.scale() > PRECISION {
        return None;
    }
    Some(d)
}

/// Convert whole atoms into a decimal.
pub fn from_amount(amount: Amount) -> Result<Decimal> {
    Decimal::try_from_i128_with_scale(amount, 0)
        .map_err(|_| EngineError::ArithmeticOverflow("amount to decimal"))
}

/// Truncate a decimal toward zero and convert it to whole atoms.
pub fn to_amount_trunc(d: Decimal) -> Result<Amount> {
    d.trunc()
        .to_i128()
        .ok_or(EngineError::ArithmeticOverflow("decimal to amount"))
}

// ============================================================================
// Arithmetic Functions
// ============================================================================
//
// `Decimal` keeps a 96-bit mantissa and rounds half-up when a result needs
// more. Products and quotients are therefore computed exactly on 512-bit
// magnitudes and truncated once; a result that still does not fit a
// `Decimal` is an overflow, never a rounded value.

/// Largest `Decimal` mantissa (2^96 - 1).
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// Sign, mantissa magnitude and scale.
fn parts(d: Decimal) -> (bool, U512, u32) {
    let negative = d.is_sign_negative() && !d.is_zero();
    (negative, U512::from(d.mantissa().unsigned_abs()), d.scale())
}

fn pow10(exp: u32) -> Result<U512> {
    let ten = U512::from(10u64);
    (0..exp)
        .try_fold(U512::from(1u64), |acc, _| acc.checked_mul(ten))
        .ok_or(EngineError::ArithmeticOverflow("power of ten"))
}

/// Exact `a * b / c` truncated toward zero at `scale` fractional digits.
fn mul_div_wide(a: Decimal, b: Decimal, c: Decimal, scale: u32) -> Result<(bool, U512)> {
    if c.is_zero() {
        return Err(EngineError::ArithmeticOverflow("decimal division by zero"));
    }
    let overflow = || EngineError::ArithmeticOverflow("decimal multiply");
    let (a_neg, a_mag, a_scale) = parts(a);
    let (b_neg, b_mag, b_scale) = parts(b);
    let (c_neg, c_mag, c_scale) = parts(c);

    let mut num = a_mag.checked_mul(b_mag).ok_or_else(overflow)?;
    let mut den = c_mag;
    let shift = i64::from(scale) + i64::from(c_scale) - i64::from(a_scale) - i64::from(b_scale);
    if shift >= 0 {
        num = num.checked_mul(pow10(shift as u32)?).ok_or_else(overflow)?;
    } else {
        den = den.checked_mul(pow10(shift.unsigned_abs() as u32)?).ok_or_else(overflow)?;
    }
    let quotient = num.checked_div(den).ok_or_else(overflow)?;
    Ok((a_neg ^ b_neg ^ c_neg, quotient))
}

/// Rebuild a `Decimal`, dropping trailing zeros. Fails if the value needs
/// more than 96 mantissa bits.
fn to_decimal(negative: bool, mut mag: U512, mut scale: u32) -> Result<Decimal> {
    if mag.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let ten = U512::from(10u64);
    while scale > 0 && (mag % ten).is_zero() {
        mag = mag / ten;
        scale -= 1;
    }
    let m = u128::try_from(mag)
        .ok()
        .filter(|m| *m <= MAX_MANTISSA)
        .ok_or(EngineError::ArithmeticOverflow("decimal out of range"))? as i128;
    Decimal::try_from_i128_with_scale(if negative { -m } else { m }, scale)
        .map_err(|_| EngineError::ArithmeticOverflow("decimal out of range"))
}

/// Exact `a * b / c`, truncated to [`PRECISION`].
pub fn mul_div(a: Decimal, b: Decimal, c: Decimal) -> Result<Decimal> {
    let (negative, mag) = mul_div_wide(a, b, c, PRECISION)?;
    to_decimal(negative, mag, PRECISION)
}

/// Checked multiply, truncated to [`PRECISION`].
pub fn mul(a: Decimal, b: Decimal) -> Result<Decimal> {
    mul_div(a, b, Decimal::ONE)
}

/// Checked divide, truncated to [`PRECISION`].
///
/// Division by zero is reported as an overflow.
pub fn div(a: Decimal, b: Decimal) -> Result<Decimal> {
    mul_div(a, Decimal::ONE, b)
}

fn add_exact(a: Decimal, b: Decimal) -> Result<Decimal> {
    let overflow = || EngineError::ArithmeticOverflow("decimal add");
    let (a_neg, a_mag, a_scale) = parts(a);
    let (b_neg, b_mag, b_scale) = parts(b);
    let scale = a_scale.max(b_scale);
    let a_mag = a_mag.checked_mul(pow10(scale - a_scale)?).ok_or_else(overflow)?;
    let b_mag = b_mag.checked_mul(pow10(scale - b_scale)?).ok_or_else(overflow)?;

    let (negative, mag) = if a_neg == b_neg {
        (a_neg, a_mag.checked_add(b_mag).ok_or_else(overflow)?)
    } else if a_mag >= b_mag {
        (a_neg, a_mag.checked_sub(b_mag).ok_or_else(overflow)?)
    } else {
        (b_neg, b_mag.checked_sub(a_mag).ok_or_else(overflow)?)
    };
    to_decimal(negative, mag, scale)
}

/// Checked add.
pub fn add(a: Decimal, b: Decimal) -> Result<Decimal> {
    add_exact(a, b)
}

/// Checked subtract.
pub fn sub(a: Decimal, b: Decimal) -> Result<Decimal> {
    add_exact(a, -b)
}

/// `amount * num / den` computed exactly and truncated toward zero to
/// whole atoms.
pub fn mul_div_atoms(amount: Amount, num: Decimal, den: Decimal) -> Result<Amount> {
    let (negative, mag) = mul_div_wide(from_amount(amount)?, num, den, 0)?;
    let atoms = u128::try_from(mag)
        .ok()
        .and_then(|m| i128::try_from(m).ok())
        .ok_or(EngineError::ArithmeticOverflow("decimal to amount"))?;
    Ok(if negative { -atoms } else { atoms })
}

/// `amount * numerator / denominator`, truncated toward zero to whole atoms.
///
/// Used to prorate stakes across fulfillments.
///
/// ```
/// use wagerbook::types::dec::prorate;
///
/// assert_eq!(prorate(100, 1, 3).unwrap(), 33);
/// assert_eq!(prorate(-100, 1, 3).unwrap(), -33);
/// ```
pub fn prorate(amount: Amount, numerator: Amount, denominator: Amount) -> Result<Amount> {
    mul_div_atoms(amount, from_amount(numerator)?, from_amount(denominator)?)
}

// ============================================================================
// Checked Amount Helpers
// ============================================================================

/// Checked atom addition with a labelled overflow error.
#[inline]
pub fn checked_add(a: Amount, b: Amount, what: &'static str) -> Result<Amount> {
    a.checked_add(b).ok_or(EngineError::ArithmeticOverflow(what))
}

/// Checked atom subtraction with a labelled overflow error.
#[inline]
pub fn checked_sub(a: Amount, b: Amount, what: &'static str) -> Result<Amount> {
    a.checked_sub(b).ok_or(EngineError::ArithmeticOverflow(what))
}
