//! The exchange context: one owner for all mutable state.
//!
//! Every public operation runs under a [`Checkpoint`] of [`ExchangeState`].
//! On `Err` the journal is rolled back and the events staged during the call
//! are dropped; on `Ok` the journal is discarded and the staged events are
//! committed to the [`EventLog`]. No caller ever observes a partially applied
//! operation, and the undo cost is bounded by what the operation wrote.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dexcore_amm::{Pool, Registry};
use dexcore_ledger::{Checkpoint, Ledger};
use dexcore_router::{
    AddLiquidityRequest, LiquidityAdded, LiquidityRemoved, RemoveLiquidityRequest, Router,
    RouterContext, SwapRequest,
};
use dexcore_types::{
    AccountId, Amount, Clock, DexError, DexEvent, EventLog, ExchangeConfig, Order, OrderId,
    PoolId, Result, SystemClock, TokenId, TokenPair,
};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::{CreateOrderRequest, OrderBook, OrderExecution};

/// Everything an operation may mutate, journaled as one unit.
#[derive(Debug, Clone)]
pub struct ExchangeState<L> {
    pub ledger: L,
    pub registry: Registry,
    pub book: OrderBook,
}

impl<L: Checkpoint> Checkpoint for ExchangeState<L> {
    fn checkpoint(&mut self) {
        self.ledger.checkpoint();
        self.registry.checkpoint();
        self.book.checkpoint();
    }

    fn commit(&mut self) {
        self.ledger.commit();
        self.registry.commit();
        self.book.commit();
    }

    fn rollback(&mut self) {
        self.ledger.rollback();
        self.registry.rollback();
        self.book.rollback();
    }
}

/// Single-threaded exchange engine. Wrap it in [`SharedExchange`] to share
/// it between threads.
#[derive(Debug)]
pub struct Exchange<L, C = SystemClock> {
    state: ExchangeState<L>,
    router: Router,
    clock: C,
    log: EventLog,
    config: ExchangeConfig,
}

impl<L: Ledger + Checkpoint, C: Clock> Exchange<L, C> {
    /// # Errors
    /// `Configuration` if `config` does not validate.
    pub fn new(ledger: L, clock: C, config: ExchangeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: ExchangeState {
                ledger,
                registry: Registry::new(),
                book: OrderBook::new(config.max_open_orders_per_owner),
            },
            router: Router::new(config.max_path_len),
            clock,
            log: EventLog::new(config.event_log_capacity)?,
            config,
        })
    }

    /// Run `op` atomically: commit its events on success, roll the journal
    /// back on failure.
    fn atomically<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut ExchangeState<L>, &Router, &mut Vec<DexEvent>, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let now = self.clock.now();
        self.state.checkpoint();
        let mut staged = Vec::new();
        match op(&mut self.state, &self.router, &mut staged, now) {
            Ok(value) => {
                self.state.commit();
                debug!(op = name, events = staged.len(), "Operation committed");
                self.log.commit(staged, now);
                Ok(value)
            }
            Err(err) => {
                self.state.rollback();
                warn!(op = name, error = %err, "Operation rolled back");
                Err(err)
            }
        }
    }

    // =================================================================
    // Pools and liquidity
    // =================================================================

    /// Explicitly create the pool for `(a, b)`.
    pub fn create_pool(&mut self, a: &TokenId, b: &TokenId) -> Result<PoolId> {
        self.atomically("create_pool", |state, _, events, _| {
            state.registry.create_pool(a, b, events)
        })
    }

    pub fn add_liquidity(
        &mut self,
        caller: AccountId,
        req: &AddLiquidityRequest,
    ) -> Result<LiquidityAdded> {
        self.atomically("add_liquidity", |state, router, events, now| {
            let mut ctx = RouterContext::new(&mut state.registry, &mut state.ledger, events, now);
            router.add_liquidity(&mut ctx, caller, req)
        })
    }

    pub fn remove_liquidity(
        &mut self,
        caller: AccountId,
        req: &RemoveLiquidityRequest,
    ) -> Result<LiquidityRemoved> {
        self.atomically("remove_liquidity", |state, router, events, now| {
            let mut ctx = RouterContext::new(&mut state.registry, &mut state.ledger, events, now);
            router.remove_liquidity(&mut ctx, caller, req)
        })
    }

    /// Let `spender` move up to `amount` of `owner`'s LP shares in the
    /// `(a, b)` pool.
    pub fn approve_shares(
        &mut self,
        a: &TokenId,
        b: &TokenId,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.atomically("approve_shares", |state, _, _, _| {
            state
                .registry
                .pool_mut(a, b)?
                .approve_shares(owner, spender, amount)
        })
    }

    pub fn transfer_shares(
        &mut self,
        a: &TokenId,
        b: &TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.atomically("transfer_shares", |state, _, events, _| {
            state
                .registry
                .pool_mut(a, b)?
                .transfer_shares(from, to, amount, events)
        })
    }

    pub fn transfer_shares_from(
        &mut self,
        a: &TokenId,
        b: &TokenId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.atomically("transfer_shares_from", |state, _, events, _| {
            state
                .registry
                .pool_mut(a, b)?
                .transfer_shares_from(spender, from, to, amount, events)
        })
    }

    // =================================================================
    // Swaps
    // =================================================================

    /// Pure quote; mutates nothing.
    pub fn get_amounts_out(&self, amount_in: Amount, path: &[TokenId]) -> Result<Vec<Amount>> {
        self.router
            .get_amounts_out(&self.state.registry, amount_in, path)
    }

    pub fn swap_exact_tokens_for_tokens(
        &mut self,
        caller: AccountId,
        req: &SwapRequest,
    ) -> Result<Vec<Amount>> {
        self.atomically("swap_exact_tokens_for_tokens", |state, router, events, now| {
            let mut ctx = RouterContext::new(&mut state.registry, &mut state.ledger, events, now);
            router.swap_exact_tokens_for_tokens(&mut ctx, caller, req)
        })
    }

    pub fn swap_exact_tokens_for_tokens_supporting_fee_on_transfer_tokens(
        &mut self,
        caller: AccountId,
        req: &SwapRequest,
    ) -> Result<Amount> {
        self.atomically(
            "swap_exact_tokens_for_tokens_supporting_fee_on_transfer_tokens",
            |state, router, events, now| {
                let mut ctx =
                    RouterContext::new(&mut state.registry, &mut state.ledger, events, now);
                router.swap_exact_tokens_for_tokens_supporting_fee_on_transfer_tokens(
                    &mut ctx, caller, req,
                )
            },
        )
    }

    // =================================================================
    // Orders
    // =================================================================

    pub fn create_order(&mut self, owner: AccountId, req: &CreateOrderRequest) -> Result<OrderId> {
        self.atomically("create_order", |state, _, events, now| {
            let mut ctx = RouterContext::new(&mut state.registry, &mut state.ledger, events, now);
            state.book.create_order(&mut ctx, owner, req)
        })
    }

    pub fn cancel_order(&mut self, caller: AccountId, id: OrderId) -> Result<()> {
        self.atomically("cancel_order", |state, _, events, now| {
            let mut ctx = RouterContext::new(&mut state.registry, &mut state.ledger, events, now);
            state.book.cancel_order(&mut ctx, caller, id)
        })
    }

    pub fn execute_order(&mut self, keeper: AccountId, id: OrderId) -> Result<OrderExecution> {
        self.atomically("execute_order", |state, router, events, now| {
            let mut ctx = RouterContext::new(&mut state.registry, &mut state.ledger, events, now);
            state.book.execute_order(router, &mut ctx, keeper, id)
        })
    }

    // =================================================================
    // Invariants
    // =================================================================

    /// Check, for every pool, that reserves equal the ledger balances of the
    /// pool account and that share balances sum to total shares; and that
    /// custody covers every open order's escrow.
    pub fn verify_invariants(&self) -> Result<()> {
        let ledger = &self.state.ledger;
        for pool in self.state.registry.pools() {
            let (reserve0, reserve1) = pool.reserves();
            let pair = pool.pair();
            let balance0 = ledger.balance_of(pair.token0(), pool.account());
            let balance1 = ledger.balance_of(pair.token1(), pool.account());
            if (reserve0, reserve1) != (balance0, balance1) {
                return Err(DexError::ReserveMismatch {
                    reason: format!(
                        "{} ({pair}): reserves ({reserve0}, {reserve1}) != balances ({balance0}, {balance1})",
                        pool.id()
                    ),
                });
            }
            let sum = pool.share_sum();
            if sum != pool.total_shares() {
                return Err(DexError::ShareInvariantViolation {
                    reason: format!(
                        "{}: share balances sum to {sum}, total is {}",
                        pool.id(),
                        pool.total_shares()
                    ),
                });
            }
        }
        let custody = self.state.book.account();
        for (token, escrowed) in self.state.book.escrowed() {
            let held = ledger.balance_of(&token, custody);
            if held < escrowed {
                return Err(DexError::ReserveMismatch {
                    reason: format!("custody holds {held} {token}, open orders escrow {escrowed}"),
                });
            }
        }
        Ok(())
    }

    // =================================================================
    // Accessors
    // =================================================================

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.state.ledger
    }

    /// Direct ledger access for balance holders (minting, approvals). A
    /// transfer into a pool account is absorbed by that pool's next
    /// operation.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.state.ledger
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    #[must_use]
    pub fn book(&self) -> &OrderBook {
        &self.state.book
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.log
    }

    #[must_use]
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    #[must_use]
    pub fn pool(&self, a: &TokenId, b: &TokenId) -> Option<&Pool> {
        self.state.registry.get_pool(a, b)
    }

    #[must_use]
    pub fn all_pairs(&self) -> Vec<TokenPair> {
        self.state.registry.all_pairs()
    }

    /// Price of one `base` in `quote` from the pool's reserves.
    pub fn spot_price(&self, base: &TokenId, quote: &TokenId) -> Result<Decimal> {
        self.state.registry.pool(base, quote)?.spot_price(base)
    }

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.state.book.order(id)
    }

    pub fn orders_by_owner(&self, owner: AccountId) -> impl Iterator<Item = &Order> {
        self.state.book.orders_by_owner(owner)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.state.book.open_orders()
    }
}

// ---------------------------------------------------------------------------
// SharedExchange
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe handle. All callers are linearized by one mutex,
/// so operations on the same pool or order never interleave.
#[derive(Debug)]
pub struct SharedExchange<L, C = SystemClock> {
    inner: Arc<Mutex<Exchange<L, C>>>,
}

impl<L, C> Clone for SharedExchange<L, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Ledger + Checkpoint, C: Clock> SharedExchange<L, C> {
    #[must_use]
    pub fn new(exchange: Exchange<L, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(exchange)),
        }
    }

    /// Run `f` with exclusive access to the exchange.
    ///
    /// # Errors
    /// `Internal` if a previous holder panicked, otherwise whatever `f`
    /// returns.
    pub fn with<T>(&self, f: impl FnOnce(&mut Exchange<L, C>) -> Result<T>) -> Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| DexError::Internal("exchange mutex poisoned".into()))?;
        f(&mut guard)
    }

    pub fn execute_order(&self, keeper: AccountId, id: OrderId) -> Result<OrderExecution> {
        self.with(|ex| ex.execute_order(keeper, id))
    }

    pub fn cancel_order(&self, caller: AccountId, id: OrderId) -> Result<()> {
        self.with(|ex| ex.cancel_order(caller, id))
    }

    pub fn swap_exact_tokens_for_tokens(
        &self,
        caller: AccountId,
        req: &SwapRequest,
    ) -> Result<Vec<Amount>> {
        self.with(|ex| ex.swap_exact_tokens_for_tokens(caller, req))
    }
}
