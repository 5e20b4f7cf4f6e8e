//! The exchange router.

use dexcore_amm::{Registry, SwapInput, math};
use dexcore_ledger::Ledger;
use dexcore_types::{AccountId, Amount, DexError, Result, TokenId, constants};
use tracing::{debug, info, warn};

use crate::{
    AddLiquidityRequest, LiquidityAdded, LiquidityRemoved, RemoveLiquidityRequest, RouterContext,
    SwapRequest,
};

/// Stateless router. Its only state is the spender identity users approve
/// and the path-length limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    account: AccountId,
    max_path_len: usize,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(constants::DEFAULT_MAX_PATH_LEN)
    }
}

impl Router {
    #[must_use]
    pub fn new(max_path_len: usize) -> Self {
        Self {
            account: AccountId::derived(constants::ROUTER_ACCOUNT_TAG),
            max_path_len,
        }
    }

    /// The account users approve so the router can pull their tokens and
    /// LP shares.
    #[must_use]
    pub fn account(&self) -> AccountId {
        self.account
    }

    #[must_use]
    pub fn max_path_len(&self) -> usize {
        self.max_path_len
    }

    // =================================================================
    // Liquidity
    // =================================================================

    /// Deposit into the `(token_a, token_b)` pool, creating it if needed.
    ///
    /// For a non-empty pool only the ratio-consistent part of the desired
    /// amounts is pulled; the excess never leaves the caller.
    pub fn add_liquidity<L: Ledger>(
        &self,
        ctx: &mut RouterContext<'_, L>,
        caller: AccountId,
        req: &AddLiquidityRequest,
    ) -> Result<LiquidityAdded> {
        ctx.ensure_not_expired(req.deadline)?;
        if req.amount_a_desired == 0 && req.amount_b_desired == 0 {
            return Err(DexError::InsufficientAmountsReceivedAfterFees);
        }

        let pool = ctx
            .registry
            .get_or_create_pool(&req.token_a, &req.token_b, ctx.events)?;
        let (reserve_a, reserve_b) = pool.reserves_for(&req.token_a)?;
        let (amount_a, amount_b) = optimal_amounts(
            req.amount_a_desired,
            req.amount_b_desired,
            reserve_a,
            reserve_b,
        )?;

        let account = pool.account();
        let received_a = self.pull(ctx.ledger, &req.token_a, caller, account, amount_a)?;
        let received_b = self.pull(ctx.ledger, &req.token_b, caller, account, amount_b)?;
        if received_a == 0 && received_b == 0 {
            return Err(DexError::InsufficientAmountsReceivedAfterFees);
        }

        let (amount0, amount1) = if pool.pair().is_token0(&req.token_a) {
            (received_a, received_b)
        } else {
            (received_b, received_a)
        };
        let shares = pool.provide_liquidity(&*ctx.ledger, amount0, amount1, req.to, ctx.events)?;

        info!(
            pool = %pool.id(),
            caller = %caller,
            to = %req.to,
            amount_a,
            amount_b,
            received_a,
            received_b,
            shares,
            "Liquidity added"
        );
        Ok(LiquidityAdded {
            pool: pool.id(),
            amount_a,
            amount_b,
            shares,
        })
    }

    /// Burn `req.shares` of the caller's LP shares, spending the allowance
    /// the caller granted the router, and pay the reserves out to the
    /// caller.
    pub fn remove_liquidity<L: Ledger>(
        &self,
        ctx: &mut RouterContext<'_, L>,
        caller: AccountId,
        req: &RemoveLiquidityRequest,
    ) -> Result<LiquidityRemoved> {
        ctx.ensure_not_expired(req.deadline)?;
        if req.shares == 0 {
            return Err(DexError::InsufficientLiquidityBurned);
        }

        let pool = ctx.registry.pool_mut(&req.token_a, &req.token_b)?;
        let held = pool.shares_of(caller);
        if req.shares > held {
            return Err(DexError::InsufficientShares {
                requested: req.shares,
                held,
            });
        }
        let approved = pool.share_allowance(caller, self.account);
        if approved < req.shares {
            return Err(DexError::InsufficientShareAllowance {
                needed: req.shares,
                approved,
            });
        }

        let (amount0, amount1) =
            pool.withdraw_liquidity(ctx.ledger, req.shares, caller, caller, ctx.events)?;
        pool.spend_share_allowance(caller, self.account, req.shares)?;

        let (amount_a, amount_b) = if pool.pair().is_token0(&req.token_a) {
            (amount0, amount1)
        } else {
            (amount1, amount0)
        };
        info!(
            pool = %pool.id(),
            caller = %caller,
            shares = req.shares,
            amount_a,
            amount_b,
            "Liquidity removed"
        );
        Ok(LiquidityRemoved {
            pool: pool.id(),
            amount_a,
            amount_b,
        })
    }

    // =================================================================
    // Quotes
    // =================================================================

    /// Output of every hop for `amount_in` along `path`. `amounts[0]` is
    /// `amount_in`; the last entry is the final output.
    pub fn get_amounts_out(
        &self,
        registry: &Registry,
        amount_in: Amount,
        path: &[TokenId],
    ) -> Result<Vec<Amount>> {
        self.validate_path(path)?;
        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        let mut current = amount_in;
        for hop in path.windows(2) {
            let pool = registry.pool(&hop[0], &hop[1])?;
            let (reserve_in, reserve_out) = pool.reserves_for(&hop[0])?;
            current = math::get_amount_out(current, reserve_in, reserve_out)?;
            amounts.push(current);
        }
        debug!(amount_in, ?amounts, "Amounts quoted");
        Ok(amounts)
    }

    // =================================================================
    // Swaps
    // =================================================================

    /// Exact-input swap with amounts fixed by an up-front quote. Every pool
    /// checks it received exactly what the quote assumed, so fee-on-transfer
    /// tokens fail with `KInvariant`.
    pub fn swap_exact_tokens_for_tokens<L: Ledger>(
        &self,
        ctx: &mut RouterContext<'_, L>,
        caller: AccountId,
        req: &SwapRequest,
    ) -> Result<Vec<Amount>> {
        ctx.ensure_not_expired(req.deadline)?;
        let amounts = self.get_amounts_out(ctx.registry, req.amount_in, &req.path)?;
        let amount_out = amounts.last().copied().unwrap_or_default();
        if amount_out < req.amount_out_min {
            warn!(
                amount_out,
                minimum = req.amount_out_min,
                "Swap rejected: quote below minimum"
            );
            return Err(DexError::InsufficientOutputAmount {
                actual: amount_out,
                minimum: req.amount_out_min,
            });
        }

        let first = ctx.registry.pool(&req.path[0], &req.path[1])?.account();
        ctx.ledger
            .transfer_from(&req.path[0], self.account, caller, first, req.amount_in)?;
        self.run_hops(ctx, caller, &req.path, req.to, |i| {
            SwapInput::Trusted(amounts[i])
        })?;

        info!(
            caller = %caller,
            to = %req.to,
            hops = req.path.len() - 1,
            amount_in = req.amount_in,
            amount_out,
            "Swap completed"
        );
        Ok(amounts)
    }

    /// Exact-input swap where every pool measures its own input. The
    /// slippage bound applies to the recipient's actual balance increase,
    /// which is returned.
    pub fn swap_exact_tokens_for_tokens_supporting_fee_on_transfer_tokens<L: Ledger>(
        &self,
        ctx: &mut RouterContext<'_, L>,
        caller: AccountId,
        req: &SwapRequest,
    ) -> Result<Amount> {
        ctx.ensure_not_expired(req.deadline)?;
        self.validate_path(&req.path)?;
        for hop in req.path.windows(2) {
            ctx.registry.pool(&hop[0], &hop[1])?;
        }

        let first = ctx.registry.pool(&req.path[0], &req.path[1])?.account();
        ctx.ledger
            .transfer_from(&req.path[0], self.account, caller, first, req.amount_in)?;

        let token_out = &req.path[req.path.len() - 1];
        let before = ctx.ledger.balance_of(token_out, req.to);
        self.run_hops(ctx, caller, &req.path, req.to, |_| SwapInput::Measured)?;
        let received = ctx
            .ledger
            .balance_of(token_out, req.to)
            .saturating_sub(before);

        if received < req.amount_out_min {
            warn!(
                received,
                minimum = req.amount_out_min,
                "Swap rejected: received below minimum"
            );
            return Err(DexError::InsufficientOutputAmount {
                actual: received,
                minimum: req.amount_out_min,
            });
        }
        info!(
            caller = %caller,
            to = %req.to,
            hops = req.path.len() - 1,
            amount_in = req.amount_in,
            received,
            "Fee-on-transfer swap completed"
        );
        Ok(received)
    }

    // ---------------------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------------------

    fn validate_path(&self, path: &[TokenId]) -> Result<()> {
        if path.len() < constants::MIN_PATH_LEN {
            return Err(DexError::InvalidPath {
                reason: format!("path has {} tokens, need at least 2", path.len()),
            });
        }
        if path.len() > self.max_path_len {
            return Err(DexError::InvalidPath {
                reason: format!(
                    "path has {} tokens, maximum is {}",
                    path.len(),
                    self.max_path_len
                ),
            });
        }
        Ok(())
    }

    /// Pull `amount` of `token` from `from` into `to`, returning what `to`
    /// actually received.
    fn pull<L: Ledger>(
        &self,
        ledger: &mut L,
        token: &TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<Amount> {
        if amount == 0 {
            return Ok(0);
        }
        let before = ledger.balance_of(token, to);
        ledger.transfer_from(token, self.account, from, to, amount)?;
        Ok(ledger.balance_of(token, to).saturating_sub(before))
    }

    /// Swap through every hop of `path`. Intermediate outputs go straight to
    /// the next pool; the last goes to `to`.
    fn run_hops<L: Ledger>(
        &self,
        ctx: &mut RouterContext<'_, L>,
        sender: AccountId,
        path: &[TokenId],
        to: AccountId,
        input: impl Fn(usize) -> SwapInput,
    ) -> Result<()> {
        let hops = path.len() - 1;
        for i in 0..hops {
            let recipient = if i + 1 < hops {
                ctx.registry.pool(&path[i + 1], &path[i + 2])?.account()
            } else {
                to
            };
            let pool = ctx.registry.pool_mut(&path[i], &path[i + 1])?;
            let outcome = pool.swap(
                ctx.ledger,
                &path[i],
                input(i),
                sender,
                recipient,
                ctx.events,
            )?;
            debug!(
                hop = i,
                pool = %pool.id(),
                amount_in = outcome.amount_in,
                amount_out = outcome.amount_out,
                recipient = %recipient,
                "Hop executed"
            );
        }
        Ok(())
    }
}

/// Uniswap-v2 `quote` policy: keep the desired amount of one side and take
/// the ratio-consistent amount of the other.
fn optimal_amounts(
    a_desired: Amount,
    b_desired: Amount,
    reserve_a: Amount,
    reserve_b: Amount,
) -> Result<(Amount, Amount)> {
    if reserve_a == 0 && reserve_b == 0 {
        return Ok((a_desired, b_desired));
    }
    if reserve_a == 0 || reserve_b == 0 {
        return Err(DexError::InsufficientLiquidity);
    }
    let b_optimal = math::mul_div(a_desired, reserve_b, reserve_a)?;
    if b_optimal <= b_desired {
        return Ok((a_desired, b_optimal));
    }
    let a_optimal = math::mul_div(b_desired, reserve_a, reserve_b)?;
    Ok((a_optimal, b_desired))
}
