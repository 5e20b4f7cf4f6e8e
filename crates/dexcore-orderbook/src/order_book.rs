//! Resting limit orders settled against the AMM.
//!
//! The book escrows each order's input in its own custody account. Any
//! keeper may execute an open order once the router's live quote meets the
//! order's minimum; the swap pays the owner directly.

use std::collections::{BTreeMap, HashMap};

use dexcore_ledger::{Checkpoint, Ledger};
use dexcore_router::{Router, RouterContext, SwapRequest};
use dexcore_types::{
    AccountId, Amount, DexError, DexEvent, Order, OrderId, OrderStatus, Result, TokenId,
    constants,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Parameters of a new limit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub token_in: TokenId,
    pub token_out: TokenId,
    pub amount_in: Amount,
    pub amount_out_min: Amount,
}

/// Result of a successful `execute_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExecution {
    pub id: OrderId,
    pub owner: AccountId,
    pub amount_in: Amount,
    /// What the owner actually received.
    pub amount_out: Amount,
}

/// Limit-order book with custody.
#[derive(Debug, Clone)]
pub struct OrderBook {
    account: AccountId,
    orders: BTreeMap<OrderId, Order>,
    next_id: OrderId,
    max_open_per_owner: usize,
    /// `owner → number of Open orders`
    open_counts: HashMap<AccountId, usize>,
    journal: Option<BookJournal>,
}

/// Undo record for one checkpoint: orders with `id >= next_id` were created
/// under it, `finished` holds pre-images of orders it moved out of `Open`.
#[derive(Debug, Clone)]
struct BookJournal {
    next_id: OrderId,
    finished: Vec<Order>,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new(constants::DEFAULT_MAX_OPEN_ORDERS_PER_OWNER)
    }
}

impl OrderBook {
    #[must_use]
    pub fn new(max_open_per_owner: usize) -> Self {
        Self {
            account: AccountId::derived(constants::ORDER_BOOK_ACCOUNT_TAG),
            orders: BTreeMap::new(),
            next_id: OrderId::default(),
            max_open_per_owner,
            open_counts: HashMap::new(),
            journal: None,
        }
    }

    /// Custody account holding escrowed inputs. Owners approve this account
    /// before creating orders.
    #[must_use]
    pub fn account(&self) -> AccountId {
        self.account
    }

    // =================================================================
    // Lifecycle
    // =================================================================

    /// Escrow the input and record a new `Open` order. No price check.
    ///
    /// The stored `amount_in` is what custody actually received, which is
    /// less than requested for fee-on-transfer tokens.
    pub fn create_order<L: Ledger>(
        &mut self,
        ctx: &mut RouterContext<'_, L>,
        owner: AccountId,
        req: &CreateOrderRequest,
    ) -> Result<OrderId> {
        if req.amount_in == 0 {
            return Err(DexError::InvalidOrder {
                reason: "amount_in must be positive".into(),
            });
        }
        if req.token_in == req.token_out {
            return Err(DexError::InvalidOrder {
                reason: format!("token_in and token_out are both {}", req.token_in),
            });
        }
        if self.open_count(owner) >= self.max_open_per_owner {
            return Err(DexError::OrderLimitExceeded {
                limit: self.max_open_per_owner,
            });
        }

        let before = ctx.ledger.balance_of(&req.token_in, self.account);
        ctx.ledger.transfer_from(
            &req.token_in,
            self.account,
            owner,
            self.account,
            req.amount_in,
        )?;
        let received = ctx
            .ledger
            .balance_of(&req.token_in, self.account)
            .saturating_sub(before);
        if received == 0 {
            return Err(DexError::InvalidOrder {
                reason: "nothing arrived in custody".into(),
            });
        }

        let id = self.next_id;
        self.next_id = id.next();
        let order = Order {
            id,
            owner,
            token_in: req.token_in.clone(),
            token_out: req.token_out.clone(),
            amount_in: received,
            amount_out_min: req.amount_out_min,
            status: OrderStatus::Open,
            created_at: ctx.now,
            updated_at: ctx.now,
        };
        ctx.events.push(DexEvent::OrderCreated {
            id,
            owner,
            token_in: order.token_in.clone(),
            token_out: order.token_out.clone(),
            amount_in: received,
            amount_out_min: order.amount_out_min,
        });
        info!(
            order = %id,
            owner = %owner,
            token_in = %order.token_in,
            token_out = %order.token_out,
            amount_in = received,
            amount_out_min = order.amount_out_min,
            "Order created"
        );
        self.orders.insert(id, order);
        *self.open_counts.entry(owner).or_insert(0) += 1;
        Ok(id)
    }

    /// Return the escrow to the owner and mark the order `Cancelled`.
    pub fn cancel_order<L: Ledger>(
        &mut self,
        ctx: &mut RouterContext<'_, L>,
        caller: AccountId,
        id: OrderId,
    ) -> Result<()> {
        let order = self.orders.get(&id).ok_or(DexError::OrderNotFound(id))?;
        if order.owner != caller {
            return Err(DexError::NotOwner(id));
        }
        order.ensure_open()?;

        ctx.ledger
            .transfer(&order.token_in, self.account, order.owner, order.amount_in)?;
        let owner = order.owner;
        self.finish(id, OrderStatus::Cancelled, ctx.now)?;
        ctx.events.push(DexEvent::OrderCancelled { id });
        info!(order = %id, owner = %owner, "Order cancelled");
        Ok(())
    }

    /// Fill an open order through the router if the live quote meets its
    /// minimum. Permissionless.
    ///
    /// The minimum is passed through to the router, so the amount the owner
    /// actually receives is what the bound is checked against.
    pub fn execute_order<L: Ledger>(
        &mut self,
        router: &Router,
        ctx: &mut RouterContext<'_, L>,
        keeper: AccountId,
        id: OrderId,
    ) -> Result<OrderExecution> {
        let order = self.orders.get(&id).ok_or(DexError::OrderNotFound(id))?;
        order.ensure_open()?;

        let path = vec![order.token_in.clone(), order.token_out.clone()];
        let amounts = router.get_amounts_out(ctx.registry, order.amount_in, &path)?;
        let quoted = amounts.last().copied().unwrap_or_default();
        if quoted < order.amount_out_min {
            warn!(
                order = %id,
                keeper = %keeper,
                quoted,
                minimum = order.amount_out_min,
                "Order not executable yet"
            );
            return Err(DexError::PriceNotMet {
                id,
                quoted,
                minimum: order.amount_out_min,
            });
        }

        ctx.ledger
            .approve(&order.token_in, self.account, router.account(), order.amount_in);
        let req = SwapRequest {
            amount_in: order.amount_in,
            amount_out_min: order.amount_out_min,
            path,
            to: order.owner,
            deadline: ctx.now,
        };
        let (owner, amount_in) = (order.owner, order.amount_in);
        let amount_out = router
            .swap_exact_tokens_for_tokens_supporting_fee_on_transfer_tokens(
                ctx,
                self.account,
                &req,
            )?;

        self.finish(id, OrderStatus::Filled, ctx.now)?;
        ctx.events.push(DexEvent::OrderFilled { id });
        info!(
            order = %id,
            owner = %owner,
            keeper = %keeper,
            amount_in,
            amount_out,
            "Order filled"
        );
        Ok(OrderExecution {
            id,
            owner,
            amount_in,
            amount_out,
        })
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Every order of `owner`, any status, oldest first.
    pub fn orders_by_owner(&self, owner: AccountId) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(move |o| o.owner == owner)
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(|o| o.is_open())
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    #[must_use]
    pub fn open_count(&self, owner: AccountId) -> usize {
        self.open_counts.get(&owner).copied().unwrap_or(0)
    }

    /// Id the next created order will get.
    #[must_use]
    pub fn next_id(&self) -> OrderId {
        self.next_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Sum of open orders' escrow per input token.
    #[must_use]
    pub fn escrowed(&self) -> BTreeMap<TokenId, Amount> {
        let mut totals = BTreeMap::new();
        for order in self.open_orders() {
            let total: &mut Amount = totals.entry(order.token_in.clone()).or_insert(0);
            *total = total.saturating_add(order.amount_in);
        }
        totals
    }

    fn finish(
        &mut self,
        id: OrderId,
        status: OrderStatus,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or(DexError::OrderNotFound(id))?;
        if let Some(journal) = self.journal.as_mut() {
            journal.finished.push(order.clone());
        }
        match status {
            OrderStatus::Filled => order.mark_filled(at)?,
            OrderStatus::Cancelled => order.mark_cancelled(at)?,
            OrderStatus::Open => {
                return Err(DexError::Internal(format!("{id} cannot move back to OPEN")));
            }
        }
        let owner = order.owner;
        self.release_slot(owner);
        Ok(())
    }

    fn release_slot(&mut self, owner: AccountId) {
        if let Some(count) = self.open_counts.get_mut(&owner) {
            *count = count.saturating_sub(1);
        }
    }
}

impl Checkpoint for OrderBook {
    fn checkpoint(&mut self) {
        self.journal = Some(BookJournal {
            next_id: self.next_id,
            finished: Vec::new(),
        });
    }

    fn commit(&mut self) {
        self.journal = None;
    }

    fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        let created = self.orders.split_off(&journal.next_id);
        for order in created.values().filter(|o| o.is_open()) {
            self.release_slot(order.owner);
        }
        for before in journal.finished.into_iter().rev() {
            if before.id >= journal.next_id {
                continue;
            }
            if before.is_open() {
                *self.open_counts.entry(before.owner).or_insert(0) += 1;
            }
            self.orders.insert(before.id, before);
        }
        self.next_id = journal.next_id;
        debug!(dropped = created.len(), "Order book rolled back");
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use dexcore_amm::Registry;
    use dexcore_ledger::InMemoryLedger;
    use dexcore_router::AddLiquidityRequest;

    use super::*;

    fn tok(s: &str) -> TokenId {
        TokenId::new(s)
    }

    struct Fixture {
        router: Router,
        book: OrderBook,
        registry: Registry,
        ledger: InMemoryLedger,
        events: Vec<DexEvent>,
        alice: AccountId,
    }

    impl Fixture {
        /// 100k/100k A/B pool; alice holds A and B and approved book and router.
        fn new(max_open: usize) -> Self {
            let router = Router::default();
            let book = OrderBook::new(max_open);
            let mut ledger = InMemoryLedger::new();
            let alice = AccountId::new();
            for t in ["A", "B"] {
                ledger.mint(&tok(t), alice, 1_000_000).unwrap();
                ledger.approve(&tok(t), alice, router.account(), Amount::MAX);
                ledger.approve(&tok(t), alice, book.account(), Amount::MAX);
            }
            let mut f = Self {
                router,
                book,
                registry: Registry::new(),
                ledger,
                events: Vec::new(),
                alice,
            };
            let req = AddLiquidityRequest {
                token_a: tok("A"),
                token_b: tok("B"),
                amount_a_desired: 100_000,
                amount_b_desired: 100_000,
                to: alice,
                deadline: Utc::now() + chrono::Duration::minutes(1),
            };
            let router = f.router.clone();
            router.add_liquidity(&mut f.ctx(), alice, &req).unwrap();
            f.events.clear();
            f
        }

        fn ctx(&mut self) -> RouterContext<'_, InMemoryLedger> {
            RouterContext::new(&mut self.registry, &mut self.ledger, &mut self.events, Utc::now())
        }

        fn create(&mut self, amount_in: Amount, min: Amount) -> Result<OrderId> {
            let req = CreateOrderRequest {
                token_in: tok("A"),
                token_out: tok("B"),
                amount_in,
                amount_out_min: min,
            };
            let alice = self.alice;
            let mut book = std::mem::take(&mut self.book);
            let result = book.create_order(&mut self.ctx(), alice, &req);
            self.book = book;
            result
        }

        fn execute(&mut self, id: OrderId) -> Result<OrderExecution> {
            let router = self.router.clone();
            let mut book = std::mem::take(&mut self.book);
            let result = book.execute_order(&router, &mut self.ctx(), AccountId::new(), id);
            self.book = book;
            result
        }

        fn cancel(&mut self, caller: AccountId, id: OrderId) -> Result<()> {
            let mut book = std::mem::take(&mut self.book);
            let result = book.cancel_order(&mut self.ctx(), caller, id);
            self.book = book;
            result
        }
    }

    #[test]
    fn ids_start_at_zero_and_escrow_is_held() {
        let mut f = Fixture::new(10);
        assert_eq!(f.create(10, 15).unwrap(), OrderId(0));
        assert_eq!(f.create(20, 1).unwrap(), OrderId(1));
        assert_eq!(f.ledger.balance_of(&tok("A"), f.book.account()), 30);
        assert_eq!(f.book.open_count(f.alice), 2);
        assert_eq!(f.book.escrowed().get(&tok("A")), Some(&30));
        assert!(matches!(f.events[0], DexEvent::OrderCreated { id: OrderId(0), .. }));
    }

    #[test]
    fn invalid_orders_rejected() {
        let mut f = Fixture::new(10);
        assert!(matches!(f.create(0, 1), Err(DexError::InvalidOrder { .. })));
        let req = CreateOrderRequest {
            token_in: tok("A"),
            token_out: tok("A"),
            amount_in: 5,
            amount_out_min: 1,
        };
        let alice = f.alice;
        let mut book = std::mem::take(&mut f.book);
        let err = book.create_order(&mut f.ctx(), alice, &req).unwrap_err();
        assert!(matches!(err, DexError::InvalidOrder { .. }));
        assert!(book.is_empty());
    }

    #[test]
    fn open_order_limit_enforced() {
        let mut f = Fixture::new(2);
        f.create(1, 1).unwrap();
        f.create(1, 1).unwrap();
        assert!(matches!(
            f.create(1, 1),
            Err(DexError::OrderLimitExceeded { limit: 2 })
        ));
        let alice = f.alice;
        f.cancel(alice, OrderId(0)).unwrap();
        assert!(f.create(1, 1).is_ok());
    }

    #[test]
    fn rollback_undoes_creations_and_status_changes() {
        let mut f = Fixture::new(10);
        let kept = f.create(10, 1).unwrap();
        let alice = f.alice;

        f.book.checkpoint();
        f.create(20, 1).unwrap();
        f.cancel(alice, kept).unwrap();
        assert_eq!(f.book.open_count(alice), 1);
        f.book.rollback();

        assert_eq!(f.book.len(), 1);
        assert_eq!(f.book.next_id(), OrderId(1));
        assert_eq!(f.book.order(kept).unwrap().status, OrderStatus::Open);
        assert_eq!(f.book.open_count(alice), 1);
        assert_eq!(f.book.escrowed().get(&tok("A")), Some(&10));

        // Ids freed by the rollback are handed out again.
        assert_eq!(f.create(5, 1).unwrap(), OrderId(1));
    }

    #[test]
    fn commit_keeps_book_changes() {
        let mut f = Fixture::new(10);
        f.book.checkpoint();
        let id = f.create(10, 1).unwrap();
        f.book.commit();
        f.book.rollback();
        assert!(f.book.order(id).is_some());
        assert_eq!(f.book.next_id(), OrderId(1));
    }

    #[test]
    fn cancel_returns_escrow_once() {
        let mut f = Fixture::new(10);
        let id = f.create(500, 1_000).unwrap();
        let alice = f.alice;
        let before = f.ledger.balance_of(&tok("A"), alice);

        assert!(matches!(
            f.cancel(AccountId::new(), id),
            Err(DexError::NotOwner(_))
        ));
        f.cancel(alice, id).unwrap();
        assert_eq!(f.ledger.balance_of(&tok("A"), alice), before + 500);
        assert_eq!(f.book.order(id).unwrap().status, OrderStatus::Cancelled);

        let err = f.cancel(alice, id).unwrap_err();
        assert!(matches!(
            err,
            DexError::OrderNotOpen {
                status: OrderStatus::Cancelled,
                ..
            }
        ));
        assert!(matches!(
            f.cancel(alice, OrderId(99)),
            Err(DexError::OrderNotFound(_))
        ));
    }

    #[test]
    fn execute_waits_for_price() {
        let mut f = Fixture::new(10);
        let id = f.create(10, 15).unwrap();
        let err = f.execute(id).unwrap_err();
        assert!(matches!(err, DexError::PriceNotMet { quoted: 9, minimum: 15, .. }));
        assert!(f.book.order(id).unwrap().is_open());
    }

    #[test]
    fn execute_fills_and_pays_owner() {
        let mut f = Fixture::new(10);
        let id = f.create(1_000, 900).unwrap();
        let alice = f.alice;
        let before = f.ledger.balance_of(&tok("B"), alice);
        let exec = f.execute(id).unwrap();
        assert_eq!(exec.amount_in, 1_000);
        assert!(exec.amount_out >= 900);
        assert_eq!(f.ledger.balance_of(&tok("B"), alice) - before, exec.amount_out);
        assert_eq!(f.book.order(id).unwrap().status, OrderStatus::Filled);
        assert_eq!(f.book.open_count(alice), 0);
        assert_eq!(f.ledger.balance_of(&tok("A"), f.book.account()), 0);
        assert!(matches!(f.events.last(), Some(DexEvent::OrderFilled { .. })));

        assert!(matches!(
            f.execute(id),
            Err(DexError::OrderNotOpen {
                status: OrderStatus::Filled,
                ..
            })
        ));
    }

    #[test]
    fn queries_filter_by_owner_and_status() {
        let mut f = Fixture::new(10);
        f.create(10, 15).unwrap();
        let second = f.create(1_000, 1).unwrap();
        f.execute(second).unwrap();
        assert_eq!(f.book.orders_by_owner(f.alice).count(), 2);
        assert_eq!(f.book.orders_by_owner(AccountId::new()).count(), 0);
        let open: Vec<OrderId> = f.book.open_orders().map(|o| o.id).collect();
        assert_eq!(open, vec![OrderId(0)]);
    }
}
