//! # dexcore-ledger
//!
//! The fungible-token ledger seen by the exchange core.
//!
//! The core never owns token balances. It moves them through the [`Ledger`]
//! trait (`balance_of`, `allowance`, `transfer`, `transfer_from`,
//! `approve`) and trusts nothing but the balances the ledger reports back.
//!
//! ```text
//!   Router / OrderBook ──transfer_from──▶ Ledger ◀──balance_of── Pool
//!                                         │
//!                               InMemoryLedger (reference adapter)
//!                               ├── per-token transfer tax (burned)
//!                               ├── SupplyConservation (minted - burned)
//!                               └── Checkpoint (undo journal)
//! ```
//!
//! [`InMemoryLedger`] is both the reference adapter and the test double,
//! including fee-on-transfer tokens.

pub mod journal;
pub mod ledger;
pub mod memory;
pub mod supply;

pub use journal::Checkpoint;
pub use ledger::Ledger;
pub use memory::InMemoryLedger;
pub use supply::SupplyConservation;
