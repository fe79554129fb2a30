//! 18-decimal fixed-point arithmetic
//!
//! Indices, rates, prices, PPS and health factors are all `Wad` values.
//! Products are formed in a 256-bit intermediate (two u128 limbs) so that
//! `a * b / d` is exact before the final rounding step, and the rounding
//! direction is always chosen explicitly by the caller.

use crate::error::{OliveError, Result};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

/// 1.0 in 18-decimal fixed point
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Number of decimals every share and index uses
pub const WAD_DECIMALS: u8 = 18;

const LO_MASK: u128 = u64::MAX as u128;

/// Rounding direction for a division
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Toward zero (favors the protocol when crediting a caller)
    Down,
    /// Away from zero (favors the protocol when debiting a caller)
    Up,
}

/// Full 128x128 -> 256 bit product as (hi, lo)
///
/// Splits both operands into 64-bit limbs; every partial product fits in a
/// u128 and the middle column can carry at most two bits into `hi`.
#[inline]
pub fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    let (a0, a1) = (a & LO_MASK, a >> 64);
    let (b0, b1) = (b & LO_MASK, b >> 64);

    let p00 = a0 * b0;
    let p01 = a0 * b1;
    let p10 = a1 * b0;
    let p11 = a1 * b1;

    let mid = (p00 >> 64) + (p01 & LO_MASK) + (p10 & LO_MASK);
    let lo = (p00 & LO_MASK) | (mid << 64);
    let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);
    (hi, lo)
}

/// Divide the 256-bit value (hi, lo) by `d`, returning (quotient, remainder)
///
/// Requires `hi < d`, which guarantees the quotient fits in a u128.
fn div_wide(hi: u128, lo: u128, d: u128) -> (u128, u128) {
    let mut rem = hi;
    let mut quot = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quot <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quot |= 1;
        }
    }
    (quot, rem)
}

/// Compute `a * b / d` with a 256-bit intermediate
///
/// # Errors
/// * `InvalidArgument` if `d == 0`
/// * `MathOverflow` if the rounded quotient does not fit in a u128
pub fn mul_div(a: u128, b: u128, d: u128, rounding: Rounding) -> Result<u128> {
    if d == 0 {
        return Err(OliveError::InvalidArgument);
    }
    let (hi, lo) = widening_mul(a, b);
    let (quot, rem) = if hi == 0 {
        (lo / d, lo % d)
    } else if hi >= d {
        return Err(OliveError::MathOverflow);
    } else {
        div_wide(hi, lo, d)
    };
    match rounding {
        Rounding::Up if rem != 0 => quot.checked_add(1).ok_or(OliveError::MathOverflow),
        _ => Ok(quot),
    }
}

/// 10^(18 - decimals): multiplier from native units to WAD
#[inline]
pub fn decimal_factor(decimals: u8) -> Result<u128> {
    if decimals > WAD_DECIMALS {
        return Err(OliveError::InvalidArgument);
    }
    Ok(10u128.pow(u32::from(WAD_DECIMALS - decimals)))
}

/// Rescale a native asset amount to 18 decimals (always exact)
pub fn to_wad(amount: u128, decimals: u8) -> Result<u128> {
    amount
        .checked_mul(decimal_factor(decimals)?)
        .ok_or(OliveError::MathOverflow)
}

/// Rescale an 18-decimal value back to native units
pub fn from_wad(value: u128, decimals: u8, rounding: Rounding) -> Result<u128> {
    mul_div(value, 1, decimal_factor(decimals)?, rounding)
}

/// Unsigned 18-decimal fixed-point number
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Wad(pub u128);

impl Wad {
    pub const ZERO: Wad = Wad(0);
    pub const ONE: Wad = Wad(WAD);
    /// Also used as the "infinite" health factor of a debt-free position
    pub const MAX: Wad = Wad(u128::MAX);

    #[inline]
    pub const fn from_int(x: u128) -> Self {
        Wad(x * WAD)
    }

    /// Basis points (1 bp = 0.0001)
    #[inline]
    pub const fn from_bps(bps: u128) -> Self {
        Wad(bps * (WAD / 10_000))
    }

    #[inline]
    pub const fn raw(self) -> u128 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `num / den` as a Wad, rounded down
    pub fn from_ratio(num: u128, den: u128) -> Result<Self> {
        mul_div(num, WAD, den, Rounding::Down).map(Wad)
    }

    pub fn mul(self, other: Wad, rounding: Rounding) -> Result<Self> {
        mul_div(self.0, other.0, WAD, rounding).map(Wad)
    }

    pub fn div(self, other: Wad, rounding: Rounding) -> Result<Self> {
        mul_div(self.0, WAD, other.0, rounding).map(Wad)
    }

    /// Scale a plain integer by this factor
    pub fn apply(self, x: u128, rounding: Rounding) -> Result<u128> {
        mul_div(x, self.0, WAD, rounding)
    }

    pub fn checked_add(self, other: Wad) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Wad)
            .ok_or(OliveError::MathOverflow)
    }

    pub fn checked_sub(self, other: Wad) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Wad)
            .ok_or(OliveError::MathOverflow)
    }

    #[inline]
    pub fn saturating_sub(self, other: Wad) -> Self {
        Wad(self.0.saturating_sub(other.0))
    }

    /// Lossy conversion for logs and keeper reports
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / WAD as f64
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Wad::MAX {
            return write!(f, "inf");
        }
        let int = self.0 / WAD;
        let frac = self.0 % WAD;
        if frac == 0 {
            return write!(f, "{}", int);
        }
        let digits = format!("{:018}", frac);
        write!(f, "{}.{}", int, digits.trim_end_matches('0'))
    }
}

impl FromStr for Wad {
    type Err = OliveError;

    /// Parses "1", "0.9", "1.030454499968633951"; at most 18 fractional digits
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "inf" {
            return Ok(Wad::MAX);
        }
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if int_part.is_empty()
            || !all_digits(int_part)
            || !all_digits(frac_part)
            || frac_part.len() > usize::from(WAD_DECIMALS)
        {
            return Err(OliveError::InvalidConfig);
        }

        let int: u128 = int_part.parse().map_err(|_| OliveError::InvalidConfig)?;
        let mut frac: u128 = 0;
        if !frac_part.is_empty() {
            frac = frac_part.parse().map_err(|_| OliveError::InvalidConfig)?;
            frac *= 10u128.pow((usize::from(WAD_DECIMALS) - frac_part.len()) as u32);
        }
        int.checked_mul(WAD)
            .and_then(|v| v.checked_add(frac))
            .map(Wad)
            .ok_or(OliveError::MathOverflow)
    }
}

impl TryFrom<String> for Wad {
    type Error = OliveError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Wad> for String {
    fn from(w: Wad) -> String {
        w.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const M: u128 = u128::MAX;

    #[test]
    fn widening_mul_of_max() {
        assert_eq!(widening_mul(M, M), (M - 1, 1));
        assert_eq!(widening_mul(1 << 64, 1 << 64), (1, 0));
    }

    #[test]
    fn mul_div_wide_intermediate() {
        assert_eq!(mul_div(M, M, M, Rounding::Down).unwrap(), M);
        assert_eq!(mul_div(1 << 100, 1 << 100, 1 << 90, Rounding::Up).unwrap(), 1 << 110);
        // (2^129 - 2) / 4
        assert_eq!(mul_div(M, 2, 4, Rounding::Down).unwrap(), (1 << 127) - 1);
        assert_eq!(mul_div(M, 2, 4, Rounding::Up).unwrap(), 1 << 127);
    }

    #[test]
    fn mul_div_quotient_overflow() {
        assert_eq!(mul_div(M, 2, 1, Rounding::Down), Err(OliveError::MathOverflow));
        assert_eq!(mul_div(M, M, M - 1, Rounding::Down), Err(OliveError::MathOverflow));
        // (2^129 - 1) / 2 floors to u128::MAX; rounding up does not fit
        let a = 97_223_533_405_982_418_132_392_744_980_505_203_273;
        assert_eq!(mul_div(a, 7, 2, Rounding::Down).unwrap(), M);
        assert_eq!(mul_div(a, 7, 2, Rounding::Up), Err(OliveError::MathOverflow));
    }

    #[test]
    fn mul_div_zero_divisor() {
        assert_eq!(mul_div(1, 1, 0, Rounding::Down), Err(OliveError::InvalidArgument));
        assert_eq!(mul_div(0, 0, 0, Rounding::Up), Err(OliveError::InvalidArgument));
    }

    #[test]
    fn from_wad_rounding() {
        let value = 1_500_000_000_000;
        assert_eq!(from_wad(value, 6, Rounding::Down).unwrap(), 1);
        assert_eq!(from_wad(value, 6, Rounding::Up).unwrap(), 2);
        assert_eq!(from_wad(2_000_000_000_000, 6, Rounding::Up).unwrap(), 2);
        assert_eq!(from_wad(value, 18, Rounding::Up).unwrap(), value);
        assert_eq!(from_wad(value, 19, Rounding::Down), Err(OliveError::InvalidArgument));
    }

    #[test]
    fn to_wad_overflow() {
        assert_eq!(to_wad(7, 6).unwrap(), 7_000_000_000_000);
        assert_eq!(to_wad(M, 0), Err(OliveError::MathOverflow));
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("0.9".parse::<Wad>().unwrap(), Wad::from_bps(9_000));
        assert_eq!(Wad::from_bps(15_000).to_string(), "1.5");
        assert_eq!(Wad::MAX.to_string(), "inf");
        assert!("1.0000000000000000001".parse::<Wad>().is_err());
        assert!(".5".parse::<Wad>().is_err());
    }
}
