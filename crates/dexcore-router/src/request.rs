//! Router call parameters and results.

use chrono::{DateTime, Utc};
use dexcore_types::{AccountId, Amount, PoolId, TokenId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityRequest {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub amount_a_desired: Amount,
    pub amount_b_desired: Amount,
    /// Receives the minted shares.
    pub to: AccountId,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityRequest {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub shares: Amount,
    pub deadline: DateTime<Utc>,
}

/// Exact-input swap along `path` (`path[0]` in, `path[last]` out).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub amount_in: Amount,
    pub amount_out_min: Amount,
    pub path: Vec<TokenId>,
    pub to: AccountId,
    pub deadline: DateTime<Utc>,
}

/// Amounts pulled from the caller (in request token order) and shares
/// minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityAdded {
    pub pool: PoolId,
    pub amount_a: Amount,
    pub amount_b: Amount,
    pub shares: Amount,
}

/// Amounts paid out, in request token order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityRemoved {
    pub pool: PoolId,
    pub amount_a: Amount,
    pub amount_b: Amount,
}
