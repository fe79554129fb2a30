//! Kinked interest rate model and interest growth factors

use crate::error::{OliveError, Result};
use crate::wad::{mul_div, Rounding, Wad, WAD};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_YEAR: u128 = 31_536_000;

/// Piecewise-linear borrow curve with a slope change at `u_optimal`
///
/// All fields are annualised rates except `u_optimal`, which is a
/// utilization in (0, 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateModel {
    /// Base rate at zero utilization
    pub r0: Wad,
    /// Rate added linearly up to the kink
    pub r1: Wad,
    /// Rate added linearly from the kink to full utilization
    pub r2: Wad,
    pub u_optimal: Wad,
}

impl RateModel {
    pub fn new(r0: Wad, r1: Wad, r2: Wad, u_optimal: Wad) -> Self {
        Self { r0, r1, r2, u_optimal }
    }

    pub fn validate(&self) -> Result<()> {
        if self.u_optimal.is_zero() || self.u_optimal >= Wad::ONE {
            return Err(OliveError::InvalidConfig);
        }
        // Keep r0 + r1 + r2 representable.
        self.r0.checked_add(self.r1)?.checked_add(self.r2)?;
        Ok(())
    }

    /// Annual borrow rate at utilization `u` (clamped to 1.0)
    pub fn borrow_rate(&self, u: Wad) -> Result<Wad> {
        let u = u.min(Wad::ONE);
        if u <= self.u_optimal {
            let slope = mul_div(self.r1.0, u.0, self.u_optimal.0, Rounding::Down)?;
            return self.r0.checked_add(Wad(slope));
        }
        let excess = u.0 - self.u_optimal.0;
        let span = WAD - self.u_optimal.0;
        let slope = mul_div(self.r2.0, excess, span, Rounding::Down)?;
        self.r0.checked_add(self.r1)?.checked_add(Wad(slope))
    }

    /// Annual supply rate before the reserve factor: borrow rate times utilization
    pub fn supply_rate(&self, u: Wad) -> Result<Wad> {
        let u = u.min(Wad::ONE);
        self.borrow_rate(u)?.mul(u, Rounding::Down)
    }
}

fn elapsed(t0: u64, t1: u64) -> Result<u128> {
    t1.checked_sub(t0)
        .map(u128::from)
        .ok_or(OliveError::InvalidArgument)
}

/// `1 + rate * (t1 - t0) / year`
pub fn simple_interest(rate: Wad, t0: u64, t1: u64) -> Result<Wad> {
    let dt = elapsed(t0, t1)?;
    let growth = mul_div(rate.0, dt, SECONDS_PER_YEAR, Rounding::Down)?;
    Wad::ONE.checked_add(Wad(growth))
}

/// Continuously-compounded growth factor `exp(rate * (t1 - t0) / year)`
///
/// Evaluated as the first four terms of the binomial expansion of
/// `(1 + rate/year)^dt` with the per-second rate floored at WAD precision.
/// The result is never below [`simple_interest`] over the same window.
pub fn compound_interest(rate: Wad, t0: u64, t1: u64) -> Result<Wad> {
    let dt = elapsed(t0, t1)?;
    if rate.is_zero() || dt == 0 {
        return Ok(Wad::ONE);
    }
    let simple = simple_interest(rate, t0, t1)?;

    let rps = rate.0 / SECONDS_PER_YEAR;
    let linear = rps.checked_mul(dt).ok_or(OliveError::MathOverflow)?;

    let (quadratic, cubic) = if dt < 2 {
        (0, 0)
    } else {
        let pairs = dt * (dt - 1);
        let rps_sq = rps.checked_mul(rps).ok_or(OliveError::MathOverflow)?;
        let quadratic = mul_div(pairs, rps_sq, 2 * WAD, Rounding::Down)?;
        let triples = mul_div(pairs, rps_sq, WAD, Rounding::Down)?;
        let tail = (dt - 2).checked_mul(rps).ok_or(OliveError::MathOverflow)?;
        let cubic = mul_div(triples, tail, 6 * WAD, Rounding::Down)?;
        (quadratic, cubic)
    };

    let growth = linear
        .checked_add(quadratic)
        .and_then(|v| v.checked_add(cubic))
        .ok_or(OliveError::MathOverflow)?;
    let compound = Wad::ONE.checked_add(Wad(growth))?;
    Ok(compound.max(simple))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> RateModel {
        RateModel::new(
            Wad::from_bps(300),
            Wad::from_bps(600),
            Wad::from_bps(800),
            Wad::from_bps(9_000),
        )
    }

    #[test]
    fn borrow_rate_table() {
        let m = model();
        assert_eq!(m.borrow_rate(Wad::ZERO).unwrap(), Wad::from_bps(300));
        assert_eq!(m.borrow_rate(Wad::from_bps(4_500)).unwrap(), Wad::from_bps(600));
        assert_eq!(m.borrow_rate(Wad::from_bps(6_000)).unwrap(), Wad::from_bps(700));
        assert_eq!(m.borrow_rate(Wad::from_bps(9_000)).unwrap(), Wad::from_bps(900));
        assert_eq!(m.borrow_rate(Wad::ONE).unwrap(), Wad::from_bps(1_700));
    }

    #[test]
    fn supply_rate_scales_with_utilization() {
        let m = model();
        assert_eq!(m.supply_rate(Wad::ZERO).unwrap(), Wad::ZERO);
        // 0.06 * 0.45
        assert_eq!(m.supply_rate(Wad::from_bps(4_500)).unwrap(), Wad::from_bps(270));
        // 0.07 * 0.6
        assert_eq!(m.supply_rate(Wad::from_bps(6_000)).unwrap(), Wad::from_bps(420));
        // 0.09 * 0.9
        assert_eq!(m.supply_rate(Wad::from_bps(9_000)).unwrap(), Wad::from_bps(810));
        assert_eq!(m.supply_rate(Wad::ONE).unwrap(), Wad::from_bps(1_700));
    }

    #[test]
    fn utilization_above_one_is_clamped() {
        let m = model();
        assert_eq!(m.borrow_rate(Wad::from_int(2)).unwrap(), Wad::from_bps(1_700));
    }

    #[test]
    fn simple_interest_one_year() {
        let r = simple_interest(Wad::from_bps(300), 0, SECONDS_PER_YEAR as u64).unwrap();
        assert_eq!(r, Wad::from_bps(10_300));
    }

    #[test]
    fn compound_interest_one_year() {
        let r = compound_interest(Wad::from_bps(300), 0, SECONDS_PER_YEAR as u64).unwrap();
        assert_eq!(r, Wad(1_030_454_499_968_633_951));
    }

    #[test]
    fn identity_cases() {
        assert_eq!(compound_interest(Wad::ZERO, 0, 1_000).unwrap(), Wad::ONE);
        assert_eq!(compound_interest(Wad::from_bps(300), 50, 50).unwrap(), Wad::ONE);
        assert_eq!(simple_interest(Wad::from_bps(300), 50, 50).unwrap(), Wad::ONE);
    }

    #[test]
    fn inverted_window_rejected() {
        assert_eq!(
            simple_interest(Wad::from_bps(300), 10, 5),
            Err(OliveError::InvalidArgument)
        );
        assert_eq!(
            compound_interest(Wad::from_bps(300), 10, 5),
            Err(OliveError::InvalidArgument)
        );
    }

    #[test]
    fn validate_rejects_bad_kink() {
        let mut m = model();
        m.u_optimal = Wad::ONE;
        assert_eq!(m.validate(), Err(OliveError::InvalidConfig));
        m.u_optimal = Wad::ZERO;
        assert_eq!(m.validate(), Err(OliveError::InvalidConfig));
    }
}
