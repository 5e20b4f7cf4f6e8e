//! # dexcore-orderbook
//!
//! Limit orders that settle against the AMM, and the [`Exchange`] that ties
//! every component together.
//!
//! ## Architecture
//!
//! ```text
//!   Exchange ── atomically(checkpoint → op → commit | rollback)
//!     ├── OrderBook ── execute_order ──▶ Router ──▶ Pool(s)
//!     ├── Registry                          │
//!     ├── Ledger ◀──────── transfers ───────┘
//!     └── EventLog ──▶ MarketView::replay (read side)
//! ```
//!
//! ## Order lifecycle
//!
//! 1. `create_order`: escrow the input in the book's custody account
//! 2. `execute_order`: any keeper; fills once the live quote meets the
//!    order's minimum, paying the owner directly
//! 3. `cancel_order`: owner only; returns the escrow

pub mod exchange;
pub mod order_book;
pub mod replay;

pub use exchange::{Exchange, ExchangeState, SharedExchange};
pub use order_book::{CreateOrderRequest, OrderBook, OrderExecution};
pub use replay::{MarketView, OrderView, PoolView, PricePoint};
