//! Limit orders resting in the order book.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  execute   ┌────────┐
//!   │ OPEN ├───────────▶│ FILLED │
//!   └──┬───┘            └────────┘
//!      │ cancel
//!      ▼
//!   ┌───────────┐
//!   │ CANCELLED │
//!   └───────────┘
//! ```
//!
//! Both terminal states are final: nothing about an order changes after it
//! leaves `Open`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, DexError, OrderId, Result, TokenId};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Escrow held, waiting for a keeper.
    Open,
    /// Swapped through the router; output delivered to the owner.
    Filled,
    /// Escrow returned to the owner.
    Cancelled,
}

impl OrderStatus {
    /// Can an order move from `self` to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Open, Self::Filled | Self::Cancelled))
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A limit order: sell `amount_in` of `token_in` for at least
/// `amount_out_min` of `token_out`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: AccountId,
    pub token_in: TokenId,
    pub token_out: TokenId,
    /// Amount held in custody for this order.
    pub amount_in: Amount,
    pub amount_out_min: Amount,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Fails with `OrderNotOpen` unless the order is still open.
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DexError::OrderNotOpen {
                id: self.id,
                status: self.status,
            })
        }
    }

    /// Transition to `Filled`.
    ///
    /// # Errors
    /// Returns `OrderNotOpen` if the order is already terminal.
    pub fn mark_filled(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(OrderStatus::Filled, at)
    }

    /// Transition to `Cancelled`.
    ///
    /// # Errors
    /// Returns `OrderNotOpen` if the order is already terminal.
    pub fn mark_cancelled(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(OrderStatus::Cancelled, at)
    }

    fn transition(&mut self, target: OrderStatus, at: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(DexError::OrderNotOpen {
                id: self.id,
                status: self.status,
            });
        }
        self.status = target;
        self.updated_at = at;
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy(id: u64, owner: AccountId, amount_in: Amount, amount_out_min: Amount) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId(id),
            owner,
            token_in: TokenId::new("TKA"),
            token_out: TokenId::new("TKB"),
            amount_in,
            amount_out_min,
            status: OrderStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", OrderStatus::Open), "OPEN");
        assert_eq!(format!("{}", OrderStatus::Filled), "FILLED");
        assert_eq!(format!("{}", OrderStatus::Cancelled), "CANCELLED");
    }

    #[test]
    fn only_open_transitions() {
        assert!(OrderStatus::Open.can_transition_to(OrderStatus::Filled));
        assert!(OrderStatus::Open.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Filled.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Filled));
        assert!(!OrderStatus::Open.can_transition_to(OrderStatus::Open));
    }

    #[test]
    fn terminal_state_is_final() {
        let mut order = Order::dummy(0, AccountId::new(), 10, 15);
        order.mark_filled(Utc::now()).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);

        let err = order.mark_cancelled(Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            DexError::OrderNotOpen {
                status: OrderStatus::Filled,
                ..
            }
        ));
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn double_cancel_rejected() {
        let mut order = Order::dummy(1, AccountId::new(), 10, 15);
        order.mark_cancelled(Utc::now()).unwrap();
        assert!(order.ensure_open().is_err());
        assert!(order.mark_cancelled(Utc::now()).is_err());
    }

    #[test]
    fn order_serde_roundtrip() {
        let order = Order::dummy(9, AccountId::new(), 1_000, 990);
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }
}
