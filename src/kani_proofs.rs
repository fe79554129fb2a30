use super::*;

/// mul_div(Up) is mul_div(Down) plus one exactly when there is a remainder
#[kani::proof]
fn proof_mul_div_rounding_contract() {
    let a: u64 = kani::any();
    let b: u64 = kani::any();
    let d: u64 = kani::any();
    kani::assume(d > 0);

    let (a, b, d) = (a as u128, b as u128, d as u128);
    let down = mul_div(a, b, d, Rounding::Down).unwrap();
    let up = mul_div(a, b, d, Rounding::Up).unwrap();

    assert_eq!(down, a * b / d);
    if (a * b) % d == 0 {
        assert_eq!(up, down);
    } else {
        assert_eq!(up, down + 1);
    }
}

/// The limb product agrees with native multiplication whenever it fits
#[kani::proof]
fn proof_widening_mul_matches_native() {
    let a: u64 = kani::any();
    let b: u64 = kani::any();
    let (hi, lo) = wad::widening_mul(a as u128, b as u128);
    assert_eq!(hi, 0);
    assert_eq!(lo, (a as u128) * (b as u128));
}

/// Borrow rate is non-decreasing in utilization
#[kani::proof]
fn proof_borrow_rate_monotonic() {
    let model = RateModel::new(
        Wad::from_bps(300),
        Wad::from_bps(600),
        Wad::from_bps(800),
        Wad::from_bps(9_000),
    );
    let u1: u16 = kani::any();
    let u2: u16 = kani::any();
    kani::assume(u1 <= u2 && u2 <= 10_000);

    let r1 = model.borrow_rate(Wad::from_bps(u1 as u128)).unwrap();
    let r2 = model.borrow_rate(Wad::from_bps(u2 as u128)).unwrap();
    assert!(r1 <= r2);
}

/// Rescaling to WAD and back is lossless for every decimal precision
#[kani::proof]
fn proof_decimal_round_trip() {
    let amount: u64 = kani::any();
    let decimals: u8 = kani::any();
    kani::assume(decimals <= 18);

    let wad = to_wad(amount as u128, decimals).unwrap();
    assert_eq!(
        from_wad(wad, decimals, Rounding::Down).unwrap(),
        amount as u128
    );
    assert_eq!(from_wad(wad, decimals, Rounding::Up).unwrap(), amount as u128);
}
