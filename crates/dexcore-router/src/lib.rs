//! # dexcore-router
//!
//! Stateless orchestration on top of the pools.
//!
//! ## Architecture
//!
//! The router owns nothing but its spender identity. Each call receives a
//! [`RouterContext`] (registry, ledger, staged events, current time) and:
//! 1. Checks the deadline once at entry
//! 2. Computes liquidity or swap amounts from live reserves
//! 3. Pulls the caller's tokens via `transfer_from` (the caller must have
//!    approved the router's account)
//! 4. Invokes the pool mutations hop by hop
//! 5. Enforces the caller's slippage bound
//!
//! ## Swap paths
//!
//! - **Trusted**: amounts are quoted up front and each pool verifies it
//!   received what was asserted. Rejects fee-on-transfer tokens.
//! - **Supporting fee-on-transfer**: each pool measures its own input and
//!   the slippage bound is checked against what the recipient actually
//!   received.

pub mod context;
pub mod request;
pub mod router;

pub use context::RouterContext;
pub use request::{
    AddLiquidityRequest, LiquidityAdded, LiquidityRemoved, RemoveLiquidityRequest, SwapRequest,
};
pub use router::Router;
