//! Property-based checks of the pool invariants.
//!
//! 1. **Product non-decreasing**: `reserve0 * reserve1` never falls across
//!    a swap.
//! 2. **Share accounting**: `Σ share_balances == total_shares` after any mix
//!    of deposits, withdrawals and share transfers.
//! 3. **Proportional withdrawal**: burning `s` of `T` shares returns at most
//!    `s / T` of each reserve.
//! 4. **Round trip loses value**: A→B→A returns no more than was put in.
//! 5. **Share round trip**: withdrawing `s` shares and re-depositing the
//!    returned amounts mints back at most `s`, and short of `s` by no more
//!    than `ceil(T / min(r0', r1'))`, where `r'` are the reserves after the
//!    withdrawal. When the withdrawal divides the reserves exactly, nothing
//!    is lost.

use dexcore_ledger::{InMemoryLedger, Ledger};
use dexcore_types::{AccountId, Amount, TokenId, TokenPair};
use proptest::prelude::*;

use crate::math;
use crate::{Pool, SwapInput};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn tok_a() -> TokenId {
    TokenId::new("A")
}

fn tok_b() -> TokenId {
    TokenId::new("B")
}

fn seeded_pool(ra: Amount, rb: Amount) -> (Pool, InMemoryLedger, AccountId) {
    let Ok(pair) = TokenPair::new(tok_a(), tok_b()) else {
        panic!("valid pair");
    };
    let mut pool = Pool::new(pair);
    let mut ledger = InMemoryLedger::new();
    let lp = AccountId::new();
    let mut events = Vec::new();
    let ok = ledger.mint(&tok_a(), pool.account(), ra).is_ok()
        && ledger.mint(&tok_b(), pool.account(), rb).is_ok()
        && pool
            .provide_liquidity(&ledger, ra, rb, lp, &mut events)
            .is_ok();
    assert!(ok, "seed pool");
    (pool, ledger, lp)
}

fn swap_in(
    pool: &mut Pool,
    ledger: &mut InMemoryLedger,
    token: &TokenId,
    amount: Amount,
    trader: AccountId,
) -> Option<Amount> {
    ledger.mint(token, trader, amount).ok()?;
    ledger.transfer(token, trader, pool.account(), amount).ok()?;
    let mut events = Vec::new();
    pool.swap(
        ledger,
        token,
        SwapInput::Trusted(amount),
        trader,
        trader,
        &mut events,
    )
    .ok()
    .map(|o| o.amount_out)
}

/// Reserve values in [10_000, 10^24] to cover 18-decimal tokens.
fn reserve_strategy() -> impl Strategy<Value = u128> {
    10_000u128..=1_000_000_000_000_000_000_000_000u128
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_product_never_decreases(
        ra in reserve_strategy(),
        rb in reserve_strategy(),
        swaps in prop::collection::vec((any::<bool>(), 1u128..1_000_000_000u128), 1..12),
    ) {
        let (mut pool, mut ledger, _) = seeded_pool(ra, rb);
        let trader = AccountId::new();
        for (a_to_b, amount) in swaps {
            let (r0, r1) = pool.reserves();
            let k_before = math::product(r0, r1);
            let token = if a_to_b { tok_a() } else { tok_b() };
            let _ = swap_in(&mut pool, &mut ledger, &token, amount, trader);
            let (n0, n1) = pool.reserves();
            prop_assert!(math::product(n0, n1) >= k_before);
            prop_assert_eq!(n0, ledger.balance_of(&tok_a(), pool.account()));
            prop_assert_eq!(n1, ledger.balance_of(&tok_b(), pool.account()));
        }
    }

    #[test]
    fn prop_round_trip_loses_value(
        ra in reserve_strategy(),
        rb in reserve_strategy(),
        divisor in 10u128..10_000u128,
    ) {
        let amount = (ra / divisor).max(1);
        let (mut pool, mut ledger, _) = seeded_pool(ra, rb);
        let trader = AccountId::new();
        let Some(received_b) = swap_in(&mut pool, &mut ledger, &tok_a(), amount, trader) else {
            return Ok(());
        };
        let Some(final_a) = swap_in(&mut pool, &mut ledger, &tok_b(), received_b, trader) else {
            return Ok(());
        };
        prop_assert!(
            final_a <= amount,
            "round-trip should lose value: final={} > original={}",
            final_a, amount
        );
    }

    #[test]
    fn prop_share_accounting_holds(
        ra in 1_000u128..1_000_000_000u128,
        rb in 1_000u128..1_000_000_000u128,
        ops in prop::collection::vec((0u8..3, 1u128..1_000_000u128), 1..20),
    ) {
        let (mut pool, mut ledger, lp) = seeded_pool(ra, rb);
        let other = AccountId::new();
        let mut events = Vec::new();
        for (op, amount) in ops {
            match op {
                0 => {
                    let (r0, r1) = pool.reserves();
                    let Ok(b) = math::quote(amount, r0.max(1), r1.max(1)) else { continue };
                    let account = pool.account();
                    if ledger.mint(&tok_a(), account, amount).is_ok()
                        && ledger.mint(&tok_b(), account, b).is_ok()
                    {
                        let _ = pool.provide_liquidity(&ledger, amount, b, other, &mut events);
                        pool_sync_check(&pool, &ledger)?;
                    }
                }
                1 => {
                    let held = pool.shares_of(lp);
                    let total_before = pool.total_shares();
                    let (r0, r1) = pool.reserves();
                    let burn = amount.min(held);
                    if let Ok((out0, out1)) =
                        pool.withdraw_liquidity(&mut ledger, burn, lp, lp, &mut events)
                    {
                        prop_assert!(math::product(out0, total_before) <= math::product(r0, burn));
                        prop_assert!(math::product(out1, total_before) <= math::product(r1, burn));
                    }
                }
                _ => {
                    let _ = pool.transfer_shares(lp, other, amount, &mut events);
                }
            }
            prop_assert_eq!(pool.share_sum(), pool.total_shares());
            prop_assert!(!pool.is_locked());
        }
    }
}

fn pool_sync_check(pool: &Pool, ledger: &InMemoryLedger) -> Result<(), TestCaseError> {
    let (r0, r1) = pool.reserves();
    prop_assert!(r0 <= ledger.balance_of(&tok_a(), pool.account()));
    prop_assert!(r1 <= ledger.balance_of(&tok_b(), pool.account()));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_withdraw_then_redeposit_keeps_shares(
        ra in reserve_strategy(),
        rb in reserve_strategy(),
        permille in 1u128..1_000u128,
    ) {
        let (mut pool, mut ledger, lp) = seeded_pool(ra, rb);
        let total = pool.total_shares();
        let held = pool.shares_of(lp);
        let burn = (held / 1_000 * permille).clamp(1, held.min(total - 1));
        let before = pool.shares_of(lp);
        let mut events = Vec::new();

        let Ok((out0, out1)) = pool.withdraw_liquidity(&mut ledger, burn, lp, lp, &mut events)
        else {
            return Ok(());
        };
        let (r0, r1) = pool.reserves();
        prop_assert!(r0 > 0 && r1 > 0);
        let worst_loss = total.div_ceil(r0.min(r1));

        let account = pool.account();
        prop_assert!(ledger.transfer(&tok_a(), lp, account, out0).is_ok());
        prop_assert!(ledger.transfer(&tok_b(), lp, account, out1).is_ok());
        let minted = pool
            .provide_liquidity(&ledger, out0, out1, lp, &mut events)
            .unwrap_or(0);
        let after = pool.shares_of(lp);

        prop_assert_eq!(after, before - burn + minted);
        prop_assert!(after <= before, "re-deposit minted {} for {} burned", minted, burn);
        prop_assert!(
            before - after <= worst_loss,
            "lost {} shares, bound {}",
            before - after,
            worst_loss
        );
        prop_assert_eq!(pool.share_sum(), pool.total_shares());
    }

    #[test]
    fn prop_exact_withdrawal_round_trips_every_share(
        unit0 in 1u128..1_000_000u128,
        unit1 in 1u128..1_000_000u128,
        parts in 2u128..64u128,
        taken in 1u128..64u128,
    ) {
        // Square reserves give an exact initial supply, so burning
        // `taken / parts` of it divides both reserves exactly.
        let taken = taken.min(parts - 1);
        let (mut pool, mut ledger, lp) = seeded_pool(unit0 * unit0 * parts, unit1 * unit1 * parts);
        let total = pool.total_shares();
        prop_assert_eq!(total, unit0 * unit1 * parts);
        prop_assert_eq!(pool.shares_of(lp), total);
        let burn = total / parts * taken;
        let mut events = Vec::new();

        let Ok((out0, out1)) = pool.withdraw_liquidity(&mut ledger, burn, lp, lp, &mut events)
        else {
            return Ok(());
        };
        let account = pool.account();
        prop_assert!(ledger.transfer(&tok_a(), lp, account, out0).is_ok());
        prop_assert!(ledger.transfer(&tok_b(), lp, account, out1).is_ok());
        let minted = pool.provide_liquidity(&ledger, out0, out1, lp, &mut events);
        prop_assert_eq!(minted.ok(), Some(burn));
        prop_assert_eq!(pool.shares_of(lp), total);
    }
}
