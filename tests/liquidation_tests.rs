//! Liquidation scenarios
//!
//! Every scenario starts from the same position: 100 of the vault asset
//! levered 5x, i.e. 500 position shares against 400 base of debt, with
//! threshold 0.9, liquidator bonus 5% and a 20% liquidation fee on the bonus.
//! The vault asset price is then dropped to push hf below one.

use olive::*;

const E6: u128 = 1_000_000;
const T: u64 = 1_000;

const OWNER: AccountId = AccountId(1);
const ALICE: AccountId = AccountId(10);
const BOB: AccountId = AccountId(11);
const LIQUIDATOR: AccountId = AccountId(20);

fn levered_position() -> Engine<SimEnv> {
    let cfg = EngineConfig::default_local();
    let mut env = SimEnv::for_config(&cfg, OWNER);
    env.grant(LIQUIDATOR, Capability::Liquidator);
    for who in [ALICE, BOB, LIQUIDATOR] {
        env.mint(cfg.base.id, who, 100_000 * E6);
        env.mint(cfg.vault_asset.id, who, 100_000 * WAD);
    }
    let mut e = Engine::new(cfg, env, T).unwrap();
    e.supply(BOB, 10_000 * E6, T).unwrap();
    e.deposit(ALICE, 100 * WAD, Wad::from_int(5), 0, 0, T).unwrap();
    assert_eq!(e.position_shares_of(ALICE), 500 * WAD);
    assert_eq!(e.debt_of(ALICE, T).unwrap(), 400 * E6);
    e
}

fn set_vault_price(e: &mut Engine<SimEnv>, bps: u128) {
    let asset = e.config().vault_asset.id;
    e.env_mut().set_price(asset, Wad::from_bps(bps));
}

fn base_of(e: &Engine<SimEnv>, who: AccountId) -> u128 {
    e.env().balance_of(e.config().base.id, who)
}

fn vault_asset_of(e: &Engine<SimEnv>, who: AccountId) -> u128 {
    e.env().balance_of(e.config().vault_asset.id, who)
}

#[test]
fn test_partial_seizure_with_bonus_and_fee() {
    let mut e = levered_position();
    set_vault_price(&mut e, 8_500);
    // 425 * 0.9 / 400
    assert_eq!(e.hf(ALICE, T).unwrap(), Wad(956_250_000_000_000_000));

    let out = e.liquidation(LIQUIDATOR, ALICE, 400 * E6, true, T).unwrap();
    assert_eq!(out.repaid, 400 * E6);
    // 400 / 0.85, rounded against the account
    let repay_shares = 470_588_235_294_117_647_059;
    let bonus = 23_529_411_764_705_882_352;
    assert_eq!(out.seized_shares, repay_shares + bonus);
    assert_eq!(out.treasury_shares, 4_705_882_352_941_176_470);
    assert_eq!(out.liquidator_shares, 489_411_764_705_882_352_941);
    assert_eq!(out.redeemed, 0);
    assert_eq!(out.bad_debt, 0);

    let treasury = e.config().treasury;
    assert_eq!(e.position_shares_of(LIQUIDATOR), out.liquidator_shares);
    assert_eq!(e.position_shares_of(treasury), out.treasury_shares);
    assert_eq!(e.position_shares_of(ALICE), 5_882_352_941_176_470_589);
    assert_eq!(e.debt_of(ALICE, T).unwrap(), 0);
    assert_eq!(base_of(&e, LIQUIDATOR), 100_000 * E6 - 400 * E6);
    assert_eq!(e.vault().total_shares, 500 * WAD);
}

#[test]
fn test_bonus_capped_by_remaining_position() {
    let mut e = levered_position();
    set_vault_price(&mut e, 8_300);

    let out = e.liquidation(LIQUIDATOR, ALICE, 400 * E6, true, T).unwrap();
    assert_eq!(out.seized_shares, 500 * WAD);
    assert_eq!(out.treasury_shares, 3_614_457_831_325_301_204);
    assert_eq!(out.liquidator_shares, 496_385_542_168_674_698_796);
    assert_eq!(e.position_shares_of(ALICE), 0);
    assert_eq!(e.debt_of(ALICE, T).unwrap(), 0);
}

#[test]
fn test_partial_repay_leaves_remaining_debt() {
    let mut e = levered_position();
    set_vault_price(&mut e, 8_500);

    let out = e.liquidation(LIQUIDATOR, ALICE, 100 * E6, true, T).unwrap();
    assert_eq!(out.repaid, 100 * E6);
    assert_eq!(e.debt_of(ALICE, T).unwrap(), 300 * E6);
    assert!(e.position_shares_of(ALICE) < 500 * WAD - out.liquidator_shares);
}

#[test]
fn test_full_seizure_covers_debt() {
    let mut e = levered_position();
    set_vault_price(&mut e, 8_000);

    let out = e.liquidation(LIQUIDATOR, ALICE, 400 * E6, true, T).unwrap();
    assert_eq!(out.repaid, 400 * E6);
    assert_eq!(out.seized_shares, 500 * WAD);
    assert_eq!(out.liquidator_shares, 500 * WAD);
    assert_eq!(out.treasury_shares, 0);
    assert_eq!(out.bad_debt, 0);
    assert_eq!(e.bad_debt(T).unwrap(), 0);
    assert_eq!(e.position_shares_of(LIQUIDATOR), 500 * WAD);
}

#[test]
fn test_underwater_position_records_bad_debt() {
    let mut e = levered_position();
    set_vault_price(&mut e, 6_000);

    let vault_before = vault_asset_of(&e, LIQUIDATOR);
    let out = e.liquidation(LIQUIDATOR, ALICE, 400 * E6, false, T).unwrap();
    // Collateral is worth 300; the liquidator pays only that.
    assert_eq!(out.repaid, 300 * E6);
    assert_eq!(out.bad_debt, 100 * E6);
    assert_eq!(out.redeemed, 500 * WAD);
    assert_eq!(base_of(&e, LIQUIDATOR), 100_000 * E6 - 300 * E6);
    assert_eq!(vault_asset_of(&e, LIQUIDATOR), vault_before + 500 * WAD);

    assert_eq!(e.debt_of(ALICE, T).unwrap(), 0);
    assert_eq!(e.position_shares_of(ALICE), 0);
    assert_eq!(e.position_shares_of(LIQUIDATOR), 0);
    assert_eq!(e.vault().total_shares, 0);
    assert_eq!(e.env().strategy_holdings(), 0);

    // Suppliers absorb the loss.
    assert_eq!(e.bad_debt(T).unwrap(), 100 * E6);
    assert_eq!(e.balance_of(BOB, T).unwrap(), 9_900 * E6);
    assert!(e.events().iter().any(|ev| matches!(
        ev,
        Event::BadDebtRecorded { account, amount } if *account == ALICE && *amount == 100 * E6
    )));
}

#[test]
fn test_redeem_instead_of_restake() {
    let mut e = levered_position();
    set_vault_price(&mut e, 8_500);

    let vault_before = vault_asset_of(&e, LIQUIDATOR);
    let out = e.liquidation(LIQUIDATOR, ALICE, 400 * E6, false, T).unwrap();
    assert_eq!(out.redeemed, out.liquidator_shares);
    assert_eq!(vault_asset_of(&e, LIQUIDATOR), vault_before + out.redeemed);
    assert_eq!(e.position_shares_of(LIQUIDATOR), 0);
}

#[test]
fn test_healthy_position_cannot_be_liquidated() {
    let mut e = levered_position();
    assert_eq!(
        e.liquidation(LIQUIDATOR, ALICE, 400 * E6, true, T),
        Err(OliveError::HealthFactorViolation)
    );
    // No debt at all.
    assert_eq!(
        e.liquidation(LIQUIDATOR, BOB, 1, true, T),
        Err(OliveError::HealthFactorViolation)
    );
}

#[test]
fn test_liquidation_requires_role() {
    let mut e = levered_position();
    set_vault_price(&mut e, 8_500);
    assert_eq!(
        e.liquidation(BOB, ALICE, 400 * E6, true, T),
        Err(OliveError::Unauthorized)
    );
    assert_eq!(
        e.liquidation(LIQUIDATOR, LIQUIDATOR, 400 * E6, true, T),
        Err(OliveError::InvalidArgument)
    );
    assert_eq!(
        e.liquidation(LIQUIDATOR, ALICE, 0, true, T),
        Err(OliveError::InvalidArgument)
    );
    assert_eq!(e.position_shares_of(ALICE), 500 * WAD);
}

#[test]
fn test_liquidation_rolls_back_on_failed_redeem() {
    let mut e = levered_position();
    set_vault_price(&mut e, 8_500);
    e.env_mut().fail_on(FailPoint::StrategyWithdraw);

    let base_before = base_of(&e, LIQUIDATOR);
    assert_eq!(
        e.liquidation(LIQUIDATOR, ALICE, 400 * E6, false, T),
        Err(OliveError::CollaboratorFailure)
    );
    assert_eq!(e.position_shares_of(ALICE), 500 * WAD);
    assert_eq!(e.debt_of(ALICE, T).unwrap(), 400 * E6);
    assert_eq!(base_of(&e, LIQUIDATOR), base_before);
}

#[test]
fn test_liquidatable_scan() {
    let mut e = levered_position();
    assert!(e.liquidatable_accounts(T).unwrap().is_empty());
    set_vault_price(&mut e, 8_500);
    let list = e.liquidatable_accounts(T).unwrap();
    assert_eq!(list, vec![(ALICE, Wad(956_250_000_000_000_000))]);
}

#[test]
fn test_bad_debt_recovered_from_later_reserve() {
    let mut e = levered_position();
    set_vault_price(&mut e, 6_000);
    e.liquidation(LIQUIDATOR, ALICE, 400 * E6, false, T).unwrap();
    assert_eq!(e.bad_debt(T).unwrap(), 100 * E6);

    // A new borrower pays interest; the protocol's cut goes to bad debt first.
    e.deposit(BOB, 1_000 * WAD, Wad::from_int(2), 0, 0, T).unwrap();
    let later = T + SECONDS_PER_YEAR as u64;
    let outstanding = e.bad_debt(later).unwrap();
    assert!(outstanding < 100 * E6);
    assert!(outstanding > 90 * E6);
    assert_eq!(e.reserve(later).unwrap(), 0);

    e.take_events();
    e.supply(BOB, E6, later).unwrap();
    assert!(e
        .events()
        .iter()
        .any(|ev| matches!(ev, Event::BadDebtRecovered { .. })));
    assert_eq!(e.bad_debt(later).unwrap(), outstanding);
}

#[test]
fn test_mint_fees_after_same_instant_bad_debt() {
    let mut e = levered_position();
    let later = T + SECONDS_PER_YEAR as u64;
    e.supply(BOB, E6, later).unwrap();
    let reserve = e.reserve(later).unwrap();
    assert!(reserve > 0);

    set_vault_price(&mut e, 6_000);
    let out = e.liquidation(LIQUIDATOR, ALICE, 500 * E6, false, later).unwrap();
    assert!(out.bad_debt > reserve);

    // The reserve goes to bad debt first, whether or not time has passed.
    let outstanding = e.bad_debt(later).unwrap();
    assert!(outstanding < out.bad_debt);
    assert_eq!(e.reserve(later).unwrap(), 0);

    e.take_events();
    assert_eq!(e.mint_fees(OWNER, later).unwrap(), 0);
    assert_eq!(e.bad_debt(later).unwrap(), outstanding);
    let treasury = e.config().treasury;
    assert_eq!(e.balance_of(treasury, later).unwrap(), 0);
    assert!(e
        .events()
        .iter()
        .any(|ev| matches!(ev, Event::BadDebtRecovered { .. })));
}
