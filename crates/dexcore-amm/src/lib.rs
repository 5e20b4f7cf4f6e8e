//! # dexcore-amm
//!
//! Constant-product pools and the registry that owns them.
//!
//! ```text
//!   Registry ── TokenPair ──▶ Pool { reserve0, reserve1, total_shares }
//!                               │
//!                               ├── provide_liquidity / withdraw_liquidity
//!                               ├── swap (Trusted | Measured input)
//!                               └── LP share transfers + allowances
//! ```
//!
//! Pools never hold tokens themselves: reserves live in the ledger under the
//! pool's derived account and are mirrored after every mutation. All curve
//! math is in [`math`] and is exact integer arithmetic with 256-bit
//! intermediates.

pub mod math;
pub mod pool;
pub mod registry;

pub use pool::{Pool, PoolGuard, SwapInput, SwapOutcome};
pub use registry::Registry;

#[cfg(test)]
mod proptest_invariants;
