//! Property tests for the pool and vault
//! Run with: cargo test --test fuzzing
//!
//! These tests use proptest to generate random inputs and verify invariants hold.

use olive::*;
use proptest::prelude::*;

const E6: u128 = 1_000_000;
const YEAR: u64 = SECONDS_PER_YEAR as u64;

const OWNER: AccountId = AccountId(1);
const ALICE: AccountId = AccountId(10);
const BOB: AccountId = AccountId(11);
const KEEPER: AccountId = AccountId(30);
const DESK: AccountId = AccountId(40);

fn setup() -> Engine<SimEnv> {
    let cfg = EngineConfig::default_local();
    let mut env = SimEnv::for_config(&cfg, OWNER);
    env.grant(KEEPER, Capability::Keeper);
    env.grant(DESK, Capability::Borrow);
    for who in [ALICE, BOB] {
        env.mint(cfg.base.id, who, 10_000_000 * E6);
        env.mint(cfg.vault_asset.id, who, 10_000_000 * WAD);
    }
    Engine::new(cfg, env, 0).unwrap()
}

// Annual rates between 0% and 100%
fn rate_strategy() -> impl Strategy<Value = Wad> {
    (0u128..=WAD).prop_map(Wad)
}

// Up to five years
fn window_strategy() -> impl Strategy<Value = u64> {
    0u64..5 * YEAR
}

// Base asset amounts from 1 to 1M
fn base_amount_strategy() -> impl Strategy<Value = u128> {
    E6..1_000_000 * E6
}

// Vault asset amounts from 1 to 10k
fn vault_amount_strategy() -> impl Strategy<Value = u128> {
    WAD..10_000 * WAD
}

// Leverage from 1x to 5x in basis points
fn leverage_strategy() -> impl Strategy<Value = Wad> {
    (10_000u128..=50_000).prop_map(Wad::from_bps)
}

// Prices from 0.01 to 2.00
fn price_strategy() -> impl Strategy<Value = u128> {
    100u128..20_000
}

proptest! {
    #[test]
    fn fuzz_mul_div_rounding_gap(a in any::<u64>(), b in any::<u64>(), d in 1u64..=u64::MAX) {
        let down = mul_div(a as u128, b as u128, d as u128, Rounding::Down).unwrap();
        let up = mul_div(a as u128, b as u128, d as u128, Rounding::Up).unwrap();
        prop_assert!(up - down <= 1);
        prop_assert_eq!(down, (a as u128) * (b as u128) / (d as u128));
    }
}

proptest! {
    #[test]
    fn fuzz_compound_at_least_simple(rate in rate_strategy(), dt in window_strategy()) {
        let simple = simple_interest(rate, 0, dt).unwrap();
        let compound = compound_interest(rate, 0, dt).unwrap();
        prop_assert!(compound >= simple);
    }
}

proptest! {
    #[test]
    fn fuzz_borrow_rate_monotonic(u1 in 0u128..=10_000, u2 in 0u128..=10_000) {
        let model = EngineConfig::default_local().rate;
        let (lo, hi) = if u1 <= u2 { (u1, u2) } else { (u2, u1) };
        let r_lo = model.borrow_rate(Wad::from_bps(lo)).unwrap();
        let r_hi = model.borrow_rate(Wad::from_bps(hi)).unwrap();
        prop_assert!(r_lo <= r_hi);
        prop_assert!(model.supply_rate(Wad::from_bps(hi)).unwrap() <= r_hi);
    }
}

// Indices only ever grow while no bad debt is recorded
proptest! {
    #[test]
    fn fuzz_indices_non_decreasing(
        supplied in base_amount_strategy(),
        borrow_pct in 0u128..=100,
        steps in prop::collection::vec(1u64..YEAR, 1..8)
    ) {
        let mut e = setup();
        e.supply(ALICE, supplied, 0).unwrap();
        let borrowed = supplied * borrow_pct / 100;
        if borrowed > 0 {
            e.borrow(DESK, BOB, BOB, borrowed, 0).unwrap();
        }

        let mut now = 0;
        let mut debt_index = e.pool().debt_index;
        let mut liquidity_index = e.pool().liquidity_index;
        for step in steps {
            now += step;
            e.supply(BOB, E6, now).unwrap();
            prop_assert!(e.pool().debt_index >= debt_index);
            prop_assert!(e.pool().liquidity_index >= liquidity_index);
            debt_index = e.pool().debt_index;
            liquidity_index = e.pool().liquidity_index;
        }
        prop_assert!(e.debt_of(BOB, now).unwrap() >= borrowed);
    }
}

proptest! {
    #[test]
    fn fuzz_hf_monotonic_in_price(
        amount in vault_amount_strategy(),
        leverage in leverage_strategy(),
        p1 in price_strategy(),
        p2 in price_strategy()
    ) {
        let mut e = setup();
        e.supply(BOB, 1_000_000 * E6, 0).unwrap();
        e.deposit(ALICE, amount, leverage, 0, 0, 0).unwrap();
        prop_assert!(e.hf(ALICE, 0).unwrap() >= Wad::ONE);

        let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        let asset = e.config().vault_asset.id;
        e.env_mut().set_price(asset, Wad::from_bps(lo));
        let hf_lo = e.hf(ALICE, 0).unwrap();
        e.env_mut().set_price(asset, Wad::from_bps(hi));
        let hf_hi = e.hf(ALICE, 0).unwrap();
        prop_assert!(hf_lo <= hf_hi);
    }
}

proptest! {
    #[test]
    fn fuzz_harvest_never_lowers_pps(
        amount in vault_amount_strategy(),
        leverage in leverage_strategy(),
        rewards in 0u128..1_000 * WAD
    ) {
        let mut e = setup();
        e.supply(BOB, 1_000_000 * E6, 0).unwrap();
        e.deposit(ALICE, amount, leverage, 0, 0, 0).unwrap();
        e.env_mut().add_rewards(rewards);

        let report = e.harvest(KEEPER, 1).unwrap();
        prop_assert!(report.pps_after >= report.pps_before);
        prop_assert_eq!(report.treasury_cut + report.reward_cut + report.reinvested, report.claimed);
    }
}

// A failing collaborator leaves the whole engine untouched
proptest! {
    #[test]
    fn fuzz_failed_deposit_leaves_no_trace(
        amount in vault_amount_strategy(),
        leverage in leverage_strategy(),
        point in prop::sample::select(vec![
            FailPoint::TransferIn,
            FailPoint::Price,
            FailPoint::StrategyDeposit,
            FailPoint::Swap,
        ])
    ) {
        let mut e = setup();
        e.supply(BOB, 1_000_000 * E6, 0).unwrap();
        let pool = e.pool().clone();
        let vault = e.vault().clone();
        let events = e.events().len();
        let asset = e.config().vault_asset.id;
        let held = e.env().balance_of(asset, ALICE);

        e.env_mut().fail_on(point);
        let res = e.deposit(ALICE, amount, leverage, 0, 0, 5);
        if leverage > Wad::ONE || point != FailPoint::Swap {
            prop_assert_eq!(res, Err(OliveError::CollaboratorFailure));
            prop_assert_eq!(e.pool(), &pool);
            prop_assert_eq!(e.vault(), &vault);
            prop_assert_eq!(e.events().len(), events);
            prop_assert_eq!(e.env().balance_of(asset, ALICE), held);
        }
    }
}
