//! Read-side projection rebuilt purely from the event stream.
//!
//! This is what an indexer or frontend does: fold `DexEvent`s into pool
//! reserves, LP share balances, order statuses and a price history, without
//! ever reading engine state.

use std::collections::BTreeMap;

use dexcore_amm::Registry;
use dexcore_types::{
    AccountId, Amount, DexError, DexEvent, OrderId, OrderStatus, PoolId, Result, TokenId,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::debug;

use crate::OrderBook;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolView {
    pub token0: TokenId,
    pub token1: TokenId,
    pub reserve0: Amount,
    pub reserve1: Amount,
    pub total_shares: Amount,
    pub shares: BTreeMap<AccountId, Amount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderView {
    pub owner: AccountId,
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub amount_in: Amount,
    pub amount_out_min: Amount,
    pub status: OrderStatus,
}

/// One price observation: `token1` per `token0` after a `Sync`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePoint {
    /// Position of the `Sync` event in the replayed stream.
    pub index: usize,
    pub pool: PoolId,
    pub price: Decimal,
}

/// Derived market state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketView {
    pools: BTreeMap<PoolId, PoolView>,
    orders: BTreeMap<OrderId, OrderView>,
    prices: Vec<PricePoint>,
    applied: usize,
}

impl MarketView {
    /// Fold `events` from an empty view.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a DexEvent>) -> Result<Self> {
        let mut view = Self::default();
        for event in events {
            view.apply(event)?;
        }
        Ok(view)
    }

    /// Apply one event.
    ///
    /// # Errors
    /// `Internal` if the event references a pool or order the view has not
    /// seen, or moves more shares than a holder has.
    pub fn apply(&mut self, event: &DexEvent) -> Result<()> {
        let index = self.applied;
        match event {
            DexEvent::PoolCreated {
                pool,
                token0,
                token1,
            } => {
                self.pools.insert(
                    *pool,
                    PoolView {
                        token0: token0.clone(),
                        token1: token1.clone(),
                        reserve0: 0,
                        reserve1: 0,
                        total_shares: 0,
                        shares: BTreeMap::new(),
                    },
                );
            }
            DexEvent::PoolMinted {
                pool,
                provider,
                shares_minted,
                ..
            } => {
                let view = self.pool_mut(pool)?;
                view.total_shares = view
                    .total_shares
                    .checked_add(*shares_minted)
                    .ok_or_else(|| replay_error(index, "total shares overflow"))?;
                *view.shares.entry(*provider).or_insert(0) += *shares_minted;
            }
            DexEvent::PoolBurned {
                pool,
                provider,
                shares_burned,
                ..
            } => {
                let view = self.pool_mut(pool)?;
                debit(&mut view.shares, *provider, *shares_burned)
                    .ok_or_else(|| replay_error(index, "burn exceeds holder shares"))?;
                view.total_shares = view
                    .total_shares
                    .checked_sub(*shares_burned)
                    .ok_or_else(|| replay_error(index, "burn exceeds total shares"))?;
            }
            DexEvent::SharesTransferred {
                pool,
                from,
                to,
                amount,
            } => {
                let view = self.pool_mut(pool)?;
                debit(&mut view.shares, *from, *amount)
                    .ok_or_else(|| replay_error(index, "transfer exceeds holder shares"))?;
                *view.shares.entry(*to).or_insert(0) += *amount;
                view.shares.retain(|_, v| *v > 0);
            }
            DexEvent::Sync {
                pool,
                reserve0,
                reserve1,
            } => {
                let view = self.pool_mut(pool)?;
                view.reserve0 = *reserve0;
                view.reserve1 = *reserve1;
                if let Some(price) = ratio(*reserve1, *reserve0) {
                    self.prices.push(PricePoint {
                        index,
                        pool: *pool,
                        price,
                    });
                } else {
                    debug!(pool = %pool, reserve0, reserve1, "No price point for sync");
                }
            }
            DexEvent::Swap { .. } => {}
            DexEvent::OrderCreated {
                id,
                owner,
                token_in,
                token_out,
                amount_in,
                amount_out_min,
            } => {
                self.orders.insert(
                    *id,
                    OrderView {
                        owner: *owner,
                        token_in: token_in.clone(),
                        token_out: token_out.clone(),
                        amount_in: *amount_in,
                        amount_out_min: *amount_out_min,
                        status: OrderStatus::Open,
                    },
                );
            }
            DexEvent::OrderFilled { id } => self.set_status(*id, OrderStatus::Filled, index)?,
            DexEvent::OrderCancelled { id } => {
                self.set_status(*id, OrderStatus::Cancelled, index)?;
            }
        }
        self.applied += 1;
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn pool(&self, id: &PoolId) -> Option<&PoolView> {
        self.pools.get(id)
    }

    pub fn pools(&self) -> impl Iterator<Item = (&PoolId, &PoolView)> {
        self.pools.iter()
    }

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<&OrderView> {
        self.orders.get(&id)
    }

    /// Orders created by `owner`, oldest first, like a frontend filtering
    /// `OrderCreated` by owner.
    pub fn orders_by_owner(&self, owner: AccountId) -> impl Iterator<Item = (OrderId, &OrderView)> {
        self.orders
            .iter()
            .filter(move |(_, o)| o.owner == owner)
            .map(|(id, o)| (*id, o))
    }

    /// Price history of one pool, oldest first.
    pub fn price_history(&self, pool: PoolId) -> impl Iterator<Item = &PricePoint> {
        self.prices.iter().filter(move |p| p.pool == pool)
    }

    /// Number of events applied.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Compare against live engine state.
    ///
    /// # Errors
    /// `Internal` describing the first difference found.
    pub fn verify_against(&self, registry: &Registry, book: &OrderBook) -> Result<()> {
        if self.pools.len() != registry.len() {
            return Err(DexError::Internal(format!(
                "replay has {} pools, engine has {}",
                self.pools.len(),
                registry.len()
            )));
        }
        for pool in registry.pools() {
            let view = self
                .pools
                .get(&pool.id())
                .ok_or_else(|| DexError::Internal(format!("replay is missing {}", pool.id())))?;
            let live_shares: BTreeMap<AccountId, Amount> = pool.share_holders().collect();
            if (view.reserve0, view.reserve1) != pool.reserves()
                || view.total_shares != pool.total_shares()
                || view.shares != live_shares
            {
                return Err(DexError::Internal(format!(
                    "replay of {} diverges from engine state",
                    pool.id()
                )));
            }
        }
        if self.orders.len() != book.len() {
            return Err(DexError::Internal(format!(
                "replay has {} orders, engine has {}",
                self.orders.len(),
                book.len()
            )));
        }
        for order in book.orders() {
            let matches = self.orders.get(&order.id).is_some_and(|v| {
                v.status == order.status
                    && v.owner == order.owner
                    && v.amount_in == order.amount_in
                    && v.amount_out_min == order.amount_out_min
            });
            if !matches {
                return Err(DexError::Internal(format!(
                    "replay of {} diverges from engine state",
                    order.id
                )));
            }
        }
        Ok(())
    }

    fn pool_mut(&mut self, id: &PoolId) -> Result<&mut PoolView> {
        let index = self.applied;
        self.pools
            .get_mut(id)
            .ok_or_else(|| replay_error(index, &format!("unknown {id}")))
    }

    fn set_status(&mut self, id: OrderId, status: OrderStatus, index: usize) -> Result<()> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| replay_error(index, &format!("unknown {id}")))?;
        if !order.status.can_transition_to(status) {
            return Err(replay_error(
                index,
                &format!("{id} cannot move from {} to {status}", order.status),
            ));
        }
        order.status = status;
        Ok(())
    }
}

fn debit(shares: &mut BTreeMap<AccountId, Amount>, holder: AccountId, amount: Amount) -> Option<()> {
    let held = shares.get(&holder).copied().unwrap_or(0);
    let left = held.checked_sub(amount)?;
    if left == 0 {
        shares.remove(&holder);
    } else {
        shares.insert(holder, left);
    }
    Some(())
}

fn ratio(numerator: Amount, denominator: Amount) -> Option<Decimal> {
    if numerator == 0 || denominator == 0 {
        return None;
    }
    Decimal::from_u128(numerator)?.checked_div(Decimal::from_u128(denominator)?)
}

fn replay_error(index: usize, reason: &str) -> DexError {
    DexError::Internal(format!("replay event #{index}: {reason}"))
}
