//! # dexcore-types
//!
//! Shared types, errors, and configuration for the **dexcore** exchange
//! engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TokenId`], [`AccountId`], [`PoolId`], [`OrderId`], [`Amount`]
//! - **Pairs**: [`TokenPair`] (canonically ordered)
//! - **Order model**: [`Order`], [`OrderStatus`]
//! - **Events**: [`DexEvent`], [`EventSink`], [`EventLog`], [`EventRecord`]
//! - **Time**: [`Clock`], [`SystemClock`]
//! - **Configuration**: [`ExchangeConfig`]
//! - **Errors**: [`DexError`] with `DEX_ERR_` prefix codes
//! - **Constants**: fee schedule and defaults

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod order;
pub mod pair;

// Re-export all primary types at crate root for ergonomic imports:
//   use dexcore_types::{TokenId, AccountId, DexEvent, ...};

pub use clock::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use order::*;
pub use pair::*;

// Constants are accessed via `dexcore_types::constants::FOO`
// (not re-exported to avoid name collisions).
