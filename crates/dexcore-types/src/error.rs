//! Error types for the dexcore exchange engine.
//!
//! All errors use the `DEX_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Router / path errors
//! - 2xx: Pool errors
//! - 3xx: Ledger errors
//! - 4xx: Order book errors
//! - 8xx: Invariant violations
//! - 9xx: General / internal errors
//!
//! Every variant is a local, caller-triggerable condition. The engine never
//! retries; a failing operation is rolled back and the error surfaces as-is.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Amount, OrderId, OrderStatus, PoolId, TokenId};

/// Central error enum for all dexcore operations.
#[derive(Debug, Error)]
pub enum DexError {
    // =================================================================
    // Router Errors (1xx)
    // =================================================================
    /// The call arrived after its deadline.
    #[error("DEX_ERR_100: Expired: deadline {deadline} passed (now {now})")]
    Expired {
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// A swap path is too short, too long, or repeats a token in one hop.
    #[error("DEX_ERR_101: Invalid path: {reason}")]
    InvalidPath { reason: String },

    /// A pair was formed from one token twice.
    #[error("DEX_ERR_102: Identical tokens: {0}")]
    IdenticalTokens(TokenId),

    /// No pool exists for the requested pair.
    #[error("DEX_ERR_103: Pool not found for {token_a}/{token_b}")]
    PoolNotFound { token_a: TokenId, token_b: TokenId },

    /// Explicit pool creation for a pair that already has one.
    #[error("DEX_ERR_104: Pool already exists: {0}")]
    PoolExists(PoolId),

    /// Realized or quoted output is below the caller's slippage bound.
    #[error("DEX_ERR_105: Insufficient output amount: got {actual}, minimum {minimum}")]
    InsufficientOutputAmount { actual: Amount, minimum: Amount },

    /// Both desired liquidity amounts were zero, or nothing arrived at the pool.
    #[error("DEX_ERR_106: Insufficient amounts received after fees")]
    InsufficientAmountsReceivedAfterFees,

    /// Attempt to remove zero liquidity.
    #[error("DEX_ERR_107: Insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    // =================================================================
    // Pool Errors (2xx)
    // =================================================================
    /// Zero swap input.
    #[error("DEX_ERR_200: Insufficient input amount")]
    InsufficientInputAmount,

    /// A reserve is empty, or the swap would drain it.
    #[error("DEX_ERR_201: Insufficient liquidity")]
    InsufficientLiquidity,

    /// The first deposit's geometric mean rounds to zero.
    #[error("DEX_ERR_202: Insufficient initial liquidity")]
    InsufficientInitialLiquidity,

    /// A later deposit is too small (or one-sided) to mint a single share.
    #[error("DEX_ERR_203: Zero liquidity minted")]
    ZeroLiquidityMinted,

    /// Withdrawal or share transfer larger than the holder's balance.
    #[error("DEX_ERR_204: Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: Amount, held: Amount },

    /// Spender's LP-share allowance is too small.
    #[error("DEX_ERR_205: Insufficient share allowance: need {needed}, approved {approved}")]
    InsufficientShareAllowance { needed: Amount, approved: Amount },

    /// The pool's reentrancy guard is already held.
    #[error("DEX_ERR_206: Pool locked: {0}")]
    PoolLocked(PoolId),

    /// The constant-product check failed, or the pool did not receive the
    /// input it was promised.
    #[error("DEX_ERR_207: K invariant: {reason}")]
    KInvariant { reason: String },

    /// The token is not part of the pool's pair.
    #[error("DEX_ERR_208: Token {token} is not in pool {pool}")]
    TokenNotInPool { token: TokenId, pool: PoolId },

    // =================================================================
    // Ledger Errors (3xx)
    // =================================================================
    /// Account balance too small for a transfer.
    #[error("DEX_ERR_300: Insufficient balance of {token}: need {needed}, have {available}")]
    InsufficientBalance {
        token: TokenId,
        needed: Amount,
        available: Amount,
    },

    /// Spender allowance too small for `transfer_from`.
    #[error("DEX_ERR_301: Insufficient allowance of {token}: need {needed}, approved {approved}")]
    InsufficientAllowance {
        token: TokenId,
        needed: Amount,
        approved: Amount,
    },

    // =================================================================
    // Order Book Errors (4xx)
    // =================================================================
    /// Unknown order id.
    #[error("DEX_ERR_400: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order failed validation at creation.
    #[error("DEX_ERR_401: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// Only the owner may cancel an order.
    #[error("DEX_ERR_402: Not owner of {0}")]
    NotOwner(OrderId),

    /// The order already reached a terminal state.
    #[error("DEX_ERR_403: Order {id} is not open (status {status})")]
    OrderNotOpen { id: OrderId, status: OrderStatus },

    /// The live quote does not satisfy the order's minimum output yet.
    #[error("DEX_ERR_404: Price not met for {id}: quoted {quoted}, minimum {minimum}")]
    PriceNotMet {
        id: OrderId,
        quoted: Amount,
        minimum: Amount,
    },

    /// Too many open orders for this owner.
    #[error("DEX_ERR_405: Open order limit {limit} reached")]
    OrderLimitExceeded { limit: usize },

    // =================================================================
    // Invariant Violations (8xx)
    // =================================================================
    /// Tracked reserves differ from the pool account's ledger balance.
    #[error("DEX_ERR_800: Reserve mismatch: {reason}")]
    ReserveMismatch { reason: String },

    /// Sum of LP share balances differs from total shares.
    #[error("DEX_ERR_801: Share invariant violation: {reason}")]
    ShareInvariantViolation { reason: String },

    /// Ledger supply no longer equals minted minus burned.
    #[error("DEX_ERR_802: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// Reserve or share arithmetic left the representable range.
    #[error("DEX_ERR_803: Arithmetic overflow: {0}")]
    ArithmeticOverflow(&'static str),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("DEX_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("DEX_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid value, missing field, ...).
    #[error("DEX_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DexError>;

impl From<serde_json::Error> for DexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
