//! A single constant-product pool.
//!
//! The pool's reserves live in the ledger under the pool's derived account.
//! `reserve0`/`reserve1` mirror those balances and are resynchronised after
//! every mutation, so they never drift from what the ledger reports.
//!
//! ## Operations
//!
//! | Operation            | Reserves        | Shares               |
//! |----------------------|-----------------|----------------------|
//! | `provide_liquidity`  | grow            | minted to `minter`   |
//! | `withdraw_liquidity` | shrink          | burned from `owner`  |
//! | `swap`               | `k` never falls | unchanged            |
//! | share transfers      | unchanged       | moved between holders|
//!
//! Every mutation runs under a [`PoolGuard`]; acquiring the guard while it
//! is already held fails with `PoolLocked`.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use dexcore_ledger::Ledger;
use dexcore_types::{
    AccountId, Amount, DexError, DexEvent, EventSink, PoolId, Result, TokenId, TokenPair,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::math;

/// How the pool learns the size of a swap's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapInput {
    /// The caller asserts the amount; the pool checks that its balance
    /// grew by at least that much.
    Trusted(Amount),
    /// The pool takes its balance delta as the input.
    Measured,
}

/// Result of a single-pool swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub amount_in: Amount,
    pub amount_out: Amount,
}

/// Reserves, LP shares and allowances for one token pair.
#[derive(Debug, Clone)]
pub struct Pool {
    id: PoolId,
    pair: TokenPair,
    account: AccountId,
    reserve0: Amount,
    reserve1: Amount,
    total_shares: Amount,
    share_balances: BTreeMap<AccountId, Amount>,
    /// `(owner, spender) → allowance`
    share_allowances: BTreeMap<(AccountId, AccountId), Amount>,
    locked: bool,
}

// ---------------------------------------------------------------------------
// Reentrancy guard
// ---------------------------------------------------------------------------

/// Exclusive access to a pool for the duration of one mutation. Dropping the
/// guard releases the lock on every exit path.
#[derive(Debug)]
pub struct PoolGuard<'a> {
    pool: &'a mut Pool,
}

impl Deref for PoolGuard<'_> {
    type Target = Pool;

    fn deref(&self) -> &Pool {
        self.pool
    }
}

impl DerefMut for PoolGuard<'_> {
    fn deref_mut(&mut self) -> &mut Pool {
        self.pool
    }
}

impl Drop for PoolGuard<'_> {
    fn drop(&mut self) {
        self.pool.locked = false;
    }
}

impl Pool {
    /// An empty pool for `pair`.
    #[must_use]
    pub fn new(pair: TokenPair) -> Self {
        let id = PoolId::for_pair(&pair);
        Self {
            id,
            account: id.account(),
            pair,
            reserve0: 0,
            reserve1: 0,
            total_shares: 0,
            share_balances: BTreeMap::new(),
            share_allowances: BTreeMap::new(),
            locked: false,
        }
    }

    /// Acquire the reentrancy guard.
    ///
    /// # Errors
    /// `PoolLocked` if the guard is already held.
    pub fn lock(&mut self) -> Result<PoolGuard<'_>> {
        if self.locked {
            return Err(DexError::PoolLocked(self.id));
        }
        self.locked = true;
        Ok(PoolGuard { pool: self })
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn id(&self) -> PoolId {
        self.id
    }

    #[must_use]
    pub fn pair(&self) -> &TokenPair {
        &self.pair
    }

    /// Ledger account holding the reserves.
    #[must_use]
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// `(reserve0, reserve1)` in canonical token order.
    #[must_use]
    pub fn reserves(&self) -> (Amount, Amount) {
        (self.reserve0, self.reserve1)
    }

    /// `(reserve_of(token), reserve_of(other))`.
    pub fn reserves_for(&self, token: &TokenId) -> Result<(Amount, Amount)> {
        if self.pair.is_token0(token) {
            Ok((self.reserve0, self.reserve1))
        } else if self.pair.contains(token) {
            Ok((self.reserve1, self.reserve0))
        } else {
            Err(self.not_in_pool(token))
        }
    }

    #[must_use]
    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    #[must_use]
    pub fn shares_of(&self, holder: AccountId) -> Amount {
        self.share_balances.get(&holder).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn share_allowance(&self, owner: AccountId, spender: AccountId) -> Amount {
        self.share_allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(0)
    }

    /// Non-zero share holders.
    pub fn share_holders(&self) -> impl Iterator<Item = (AccountId, Amount)> + '_ {
        self.share_balances.iter().map(|(k, v)| (*k, *v))
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Price of one unit of `base` in units of the other token.
    ///
    /// # Errors
    /// `InsufficientLiquidity` while either reserve is empty.
    pub fn spot_price(&self, base: &TokenId) -> Result<Decimal> {
        let (reserve_base, reserve_quote) = self.reserves_for(base)?;
        if reserve_base == 0 || reserve_quote == 0 {
            return Err(DexError::InsufficientLiquidity);
        }
        let base = Decimal::from_u128(reserve_base)
            .ok_or(DexError::ArithmeticOverflow("spot price"))?;
        let quote = Decimal::from_u128(reserve_quote)
            .ok_or(DexError::ArithmeticOverflow("spot price"))?;
        quote
            .checked_div(base)
            .ok_or(DexError::ArithmeticOverflow("spot price"))
    }

    /// Sum of all share balances. Equals `total_shares` between operations.
    #[must_use]
    pub fn share_sum(&self) -> Amount {
        self.share_balances
            .values()
            .fold(0, |acc, v| acc.saturating_add(*v))
    }

    // =================================================================
    // Liquidity
    // =================================================================

    /// Mint shares for `amount0`/`amount1` already delivered to the pool's
    /// ledger account.
    ///
    /// First deposit mints `floor(sqrt(amount0 * amount1))`; later deposits
    /// mint the smaller of the two proportional share counts.
    pub fn provide_liquidity<L: Ledger>(
        &mut self,
        ledger: &L,
        amount0: Amount,
        amount1: Amount,
        minter: AccountId,
        events: &mut impl EventSink,
    ) -> Result<Amount> {
        let mut pool = self.lock()?;
        let (balance0, balance1) = pool.ledger_balances(ledger);
        pool.ensure_received(pool.pair.token0(), balance0, pool.reserve0, amount0)?;
        pool.ensure_received(pool.pair.token1(), balance1, pool.reserve1, amount1)?;

        let minted = if pool.total_shares == 0 {
            let minted = math::sqrt_product(amount0, amount1)?;
            if minted == 0 {
                return Err(DexError::InsufficientInitialLiquidity);
            }
            minted
        } else {
            if pool.reserve0 == 0 || pool.reserve1 == 0 {
                return Err(DexError::InsufficientLiquidity);
            }
            let by0 = math::mul_div(amount0, pool.total_shares, pool.reserve0)?;
            let by1 = math::mul_div(amount1, pool.total_shares, pool.reserve1)?;
            by0.min(by1)
        };
        if minted == 0 {
            return Err(DexError::ZeroLiquidityMinted);
        }

        let total_shares = pool
            .total_shares
            .checked_add(minted)
            .ok_or(DexError::ArithmeticOverflow("total shares"))?;
        let holder = pool.shares_of(minter) + minted;
        pool.total_shares = total_shares;
        pool.share_balances.insert(minter, holder);
        pool.reserve0 = balance0;
        pool.reserve1 = balance1;

        events.emit(DexEvent::PoolMinted {
            pool: pool.id,
            provider: minter,
            shares_minted: minted,
            amount0,
            amount1,
        });
        pool.emit_sync(events);
        info!(
            pool = %pool.id,
            minter = %minter,
            amount0,
            amount1,
            minted,
            total_shares,
            "Liquidity provided"
        );
        Ok(minted)
    }

    /// Burn `shares` held by `owner` and send the proportional reserves to
    /// `to`. Rounding remainders stay in the pool.
    pub fn withdraw_liquidity<L: Ledger>(
        &mut self,
        ledger: &mut L,
        shares: Amount,
        owner: AccountId,
        to: AccountId,
        events: &mut impl EventSink,
    ) -> Result<(Amount, Amount)> {
        let mut pool = self.lock()?;
        let held = pool.shares_of(owner);
        if shares == 0 || shares > held {
            return Err(DexError::InsufficientShares {
                requested: shares,
                held,
            });
        }
        let amount0 = math::mul_div(pool.reserve0, shares, pool.total_shares)?;
        let amount1 = math::mul_div(pool.reserve1, shares, pool.total_shares)?;
        if amount0 == 0 || amount1 == 0 {
            return Err(DexError::InsufficientLiquidityBurned);
        }

        let (token0, token1, account) = (
            pool.pair.token0().clone(),
            pool.pair.token1().clone(),
            pool.account,
        );
        ledger.transfer(&token0, account, to, amount0)?;
        ledger.transfer(&token1, account, to, amount1)?;

        pool.set_shares(owner, held - shares);
        pool.total_shares -= shares;
        pool.sync(ledger);

        events.emit(DexEvent::PoolBurned {
            pool: pool.id,
            provider: owner,
            shares_burned: shares,
            amount0_out: amount0,
            amount1_out: amount1,
        });
        pool.emit_sync(events);
        info!(
            pool = %pool.id,
            owner = %owner,
            to = %to,
            shares,
            amount0,
            amount1,
            "Liquidity withdrawn"
        );
        Ok((amount0, amount1))
    }

    // =================================================================
    // Swap
    // =================================================================

    /// Swap input of `token_in` (already sent to the pool account) for the
    /// other token, delivered to `to`.
    pub fn swap<L: Ledger>(
        &mut self,
        ledger: &mut L,
        token_in: &TokenId,
        input: SwapInput,
        sender: AccountId,
        to: AccountId,
        events: &mut impl EventSink,
    ) -> Result<SwapOutcome> {
        let mut pool = self.lock()?;
        let (reserve_in, reserve_out) = pool.reserves_for(token_in)?;
        let token_out = pool
            .pair
            .other(token_in)
            .cloned()
            .ok_or_else(|| pool.not_in_pool(token_in))?;

        let balance_in = ledger.balance_of(token_in, pool.account);
        let received =
            balance_in
                .checked_sub(reserve_in)
                .ok_or_else(|| DexError::ReserveMismatch {
                    reason: format!(
                        "{}: {token_in} balance {balance_in} below reserve {reserve_in}",
                        pool.id
                    ),
                })?;
        let amount_in = match input {
            SwapInput::Trusted(asserted) => {
                if asserted == 0 {
                    return Err(DexError::InsufficientInputAmount);
                }
                if received < asserted {
                    return Err(DexError::KInvariant {
                        reason: format!(
                            "{}: received {received} {token_in}, asserted {asserted}",
                            pool.id
                        ),
                    });
                }
                asserted
            }
            SwapInput::Measured => received,
        };

        let amount_out = math::get_amount_out(amount_in, reserve_in, reserve_out)?;
        if amount_out == 0 {
            return Err(DexError::InsufficientOutputAmount {
                actual: 0,
                minimum: 1,
            });
        }
        debug!(
            pool = %pool.id,
            token_in = %token_in,
            amount_in,
            amount_out,
            reserve_in,
            reserve_out,
            "Swap quoted"
        );

        let account = pool.account;
        ledger.transfer(&token_out, account, to, amount_out)?;

        let k_before = math::product(pool.reserve0, pool.reserve1);
        let (balance0, balance1) = pool.ledger_balances(ledger);
        if math::product(balance0, balance1) < k_before {
            return Err(DexError::KInvariant {
                reason: format!("{}: product decreased", pool.id),
            });
        }
        pool.reserve0 = balance0;
        pool.reserve1 = balance1;

        let in_is_0 = pool.pair.is_token0(token_in);
        events.emit(DexEvent::Swap {
            pool: pool.id,
            sender,
            amount0_in: if in_is_0 { amount_in } else { 0 },
            amount1_in: if in_is_0 { 0 } else { amount_in },
            amount0_out: if in_is_0 { 0 } else { amount_out },
            amount1_out: if in_is_0 { amount_out } else { 0 },
            recipient: to,
        });
        pool.emit_sync(events);
        info!(
            pool = %pool.id,
            token_in = %token_in,
            token_out = %token_out,
            amount_in,
            amount_out,
            "Swap executed"
        );

        Ok(SwapOutcome {
            token_in: token_in.clone(),
            token_out,
            amount_in,
            amount_out,
        })
    }

    // =================================================================
    // LP share transfers
    // =================================================================

    /// Set `spender`'s allowance over `owner`'s shares.
    pub fn approve_shares(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<()> {
        let mut pool = self.lock()?;
        pool.share_allowances.insert((owner, spender), amount);
        debug!(pool = %pool.id, owner = %owner, spender = %spender, amount, "Shares approved");
        Ok(())
    }

    pub fn transfer_shares(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        events: &mut impl EventSink,
    ) -> Result<()> {
        let mut pool = self.lock()?;
        pool.move_shares(from, to, amount, events)
    }

    /// Move `amount` of `from`'s shares to `to` on behalf of `spender`.
    pub fn transfer_shares_from(
        &mut self,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        events: &mut impl EventSink,
    ) -> Result<()> {
        let mut pool = self.lock()?;
        let held = pool.shares_of(from);
        if amount > held {
            return Err(DexError::InsufficientShares {
                requested: amount,
                held,
            });
        }
        pool.spend_allowance(from, spender, amount)?;
        pool.move_shares(from, to, amount, events)
    }

    /// Consume `amount` of `spender`'s allowance over `owner`'s shares.
    ///
    /// # Errors
    /// `InsufficientShareAllowance` if the allowance is too small.
    pub fn spend_share_allowance(
        &mut self,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<()> {
        let mut pool = self.lock()?;
        pool.spend_allowance(owner, spender, amount)
    }

    // ---------------------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------------------

    fn not_in_pool(&self, token: &TokenId) -> DexError {
        DexError::TokenNotInPool {
            token: token.clone(),
            pool: self.id,
        }
    }

    fn ledger_balances<L: Ledger>(&self, ledger: &L) -> (Amount, Amount) {
        (
            ledger.balance_of(self.pair.token0(), self.account),
            ledger.balance_of(self.pair.token1(), self.account),
        )
    }

    fn ensure_received(
        &self,
        token: &TokenId,
        balance: Amount,
        reserve: Amount,
        amount: Amount,
    ) -> Result<()> {
        let expected = reserve
            .checked_add(amount)
            .ok_or(DexError::ArithmeticOverflow("reserve"))?;
        if balance < expected {
            return Err(DexError::ReserveMismatch {
                reason: format!(
                    "{}: deposit of {amount} {token} not received (balance {balance}, reserve {reserve})",
                    self.id
                ),
            });
        }
        Ok(())
    }

    /// Mirror the ledger balances into the reserves.
    fn sync<L: Ledger>(&mut self, ledger: &L) {
        let (balance0, balance1) = self.ledger_balances(ledger);
        self.reserve0 = balance0;
        self.reserve1 = balance1;
    }

    fn emit_sync(&self, events: &mut impl EventSink) {
        events.emit(DexEvent::Sync {
            pool: self.id,
            reserve0: self.reserve0,
            reserve1: self.reserve1,
        });
    }

    fn set_shares(&mut self, holder: AccountId, amount: Amount) {
        if amount == 0 {
            self.share_balances.remove(&holder);
        } else {
            self.share_balances.insert(holder, amount);
        }
    }

    fn spend_allowance(&mut self, owner: AccountId, spender: AccountId, amount: Amount) -> Result<()> {
        let approved = self.share_allowance(owner, spender);
        if approved < amount {
            return Err(DexError::InsufficientShareAllowance {
                needed: amount,
                approved,
            });
        }
        // An allowance of `Amount::MAX` never decreases.
        if approved != Amount::MAX {
            self.share_allowances
                .insert((owner, spender), approved - amount);
        }
        Ok(())
    }

    fn move_shares(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        events: &mut impl EventSink,
    ) -> Result<()> {
        let held = self.shares_of(from);
        if amount > held {
            return Err(DexError::InsufficientShares {
                requested: amount,
                held,
            });
        }
        if from != to {
            self.set_shares(from, held - amount);
            let received = self.shares_of(to) + amount;
            self.set_shares(to, received);
        }
        events.emit(DexEvent::SharesTransferred {
            pool: self.id,
            from,
            to,
            amount,
        });
        Ok(())
    }
}
