//! Borrowed state a router call operates on.

use chrono::{DateTime, Utc};
use dexcore_amm::Registry;
use dexcore_ledger::Ledger;
use dexcore_types::{DexError, DexEvent, Result};

/// Everything one router or order-book call may touch. Events are staged in
/// `events` and only become visible once the caller commits them.
pub struct RouterContext<'a, L: Ledger> {
    pub registry: &'a mut Registry,
    pub ledger: &'a mut L,
    pub events: &'a mut Vec<DexEvent>,
    pub now: DateTime<Utc>,
}

impl<'a, L: Ledger> RouterContext<'a, L> {
    pub fn new(
        registry: &'a mut Registry,
        ledger: &'a mut L,
        events: &'a mut Vec<DexEvent>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            registry,
            ledger,
            events,
            now,
        }
    }

    /// # Errors
    /// `Expired` if `now` is past `deadline`.
    pub fn ensure_not_expired(&self, deadline: DateTime<Utc>) -> Result<()> {
        if self.now > deadline {
            return Err(DexError::Expired {
                deadline,
                now: self.now,
            });
        }
        Ok(())
    }
}
