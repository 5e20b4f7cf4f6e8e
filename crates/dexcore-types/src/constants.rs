//! System-wide constants for the dexcore exchange engine.

/// Swap fee numerator: the pool keeps `1 - 997/1000` = 0.3% of every input.
pub const FEE_NUMERATOR: u128 = 997;

/// Swap fee denominator.
pub const FEE_DENOMINATOR: u128 = 1000;

/// Basis-point denominator used for ledger transfer taxes (10 000 = 100%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Minimum swap path length (`[token_in, token_out]`).
pub const MIN_PATH_LEN: usize = 2;

/// Default maximum swap path length (tokens, not hops).
pub const DEFAULT_MAX_PATH_LEN: usize = 4;

/// Default number of committed events retained by the event log.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1_000_000;

/// Default maximum open orders per owner.
pub const DEFAULT_MAX_OPEN_ORDERS_PER_OWNER: usize = 200;

/// Domain tag for the router's spender account.
pub const ROUTER_ACCOUNT_TAG: &[u8] = b"router";

/// Domain tag for the order book's custody account.
pub const ORDER_BOOK_ACCOUNT_TAG: &[u8] = b"order-book";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "dexcore";
