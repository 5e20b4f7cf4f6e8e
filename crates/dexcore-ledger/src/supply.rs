//! Supply conservation invariant checker.
//!
//! Invariant enforced by the in-memory ledger:
//! ```text
//! ∀ token: Σ(balances) == Σ(minted) - Σ(burned)
//! ```
//!
//! Transfers move tokens between accounts and never change supply. The only
//! burn is the tax taken by fee-on-transfer tokens.

use std::collections::{BTreeSet, HashMap};

use dexcore_types::{Amount, DexError, Result, TokenId};

/// Per-token mint and burn totals.
#[derive(Debug, Clone, Default)]
pub struct SupplyConservation {
    minted: HashMap<TokenId, Amount>,
    burned: HashMap<TokenId, Amount>,
}

impl SupplyConservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mint(&mut self, token: &TokenId, amount: Amount) -> Result<()> {
        let total = self.minted.entry(token.clone()).or_insert(0);
        *total = total
            .checked_add(amount)
            .ok_or(DexError::ArithmeticOverflow("minted supply"))?;
        Ok(())
    }

    pub fn record_burn(&mut self, token: &TokenId, amount: Amount) -> Result<()> {
        let total = self.burned.entry(token.clone()).or_insert(0);
        *total = total
            .checked_add(amount)
            .ok_or(DexError::ArithmeticOverflow("burned supply"))?;
        Ok(())
    }

    #[must_use]
    pub fn total_minted(&self, token: &TokenId) -> Amount {
        self.minted.get(token).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_burned(&self, token: &TokenId) -> Amount {
        self.burned.get(token).copied().unwrap_or(0)
    }

    /// Expected circulating supply: minted - burned.
    pub fn expected_supply(&self, token: &TokenId) -> Result<Amount> {
        let minted = self.total_minted(token);
        let burned = self.total_burned(token);
        minted
            .checked_sub(burned)
            .ok_or_else(|| DexError::SupplyInvariantViolation {
                reason: format!("Token {token}: burned {burned} exceeds minted {minted}"),
            })
    }

    /// Compare the actual sum of balances against the expected supply.
    ///
    /// # Errors
    /// Returns [`DexError::SupplyInvariantViolation`] if they differ.
    pub fn verify(&self, token: &TokenId, actual_supply: Amount) -> Result<()> {
        let expected = self.expected_supply(token)?;
        if actual_supply != expected {
            return Err(DexError::SupplyInvariantViolation {
                reason: format!(
                    "Token {token}: actual supply {actual_supply} != expected {expected} \
                     (minted={}, burned={})",
                    self.total_minted(token),
                    self.total_burned(token),
                ),
            });
        }
        Ok(())
    }

    /// Every token that was ever minted or burned, sorted.
    #[must_use]
    pub fn tracked_tokens(&self) -> Vec<TokenId> {
        let tokens: BTreeSet<TokenId> = self
            .minted
            .keys()
            .chain(self.burned.keys())
            .cloned()
            .collect();
        tokens.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &str) -> TokenId {
        TokenId::new(s)
    }

    #[test]
    fn empty_supply_is_zero() {
        let sc = SupplyConservation::new();
        assert_eq!(sc.expected_supply(&tok("A")).unwrap(), 0);
        assert!(sc.verify(&tok("A"), 0).is_ok());
    }

    #[test]
    fn mint_and_burn_move_expected() {
        let mut sc = SupplyConservation::new();
        sc.record_mint(&tok("A"), 1_000).unwrap();
        sc.record_mint(&tok("A"), 500).unwrap();
        sc.record_burn(&tok("A"), 30).unwrap();
        assert_eq!(sc.expected_supply(&tok("A")).unwrap(), 1_470);
        assert!(sc.verify(&tok("A"), 1_470).is_ok());
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut sc = SupplyConservation::new();
        sc.record_mint(&tok("A"), 10).unwrap();
        let err = sc.verify(&tok("A"), 11).unwrap_err();
        assert!(matches!(err, DexError::SupplyInvariantViolation { .. }));
    }

    #[test]
    fn overburn_is_a_violation() {
        let mut sc = SupplyConservation::new();
        sc.record_burn(&tok("A"), 1).unwrap();
        assert!(sc.expected_supply(&tok("A")).is_err());
    }

    #[test]
    fn mint_overflow_detected() {
        let mut sc = SupplyConservation::new();
        sc.record_mint(&tok("A"), Amount::MAX).unwrap();
        let err = sc.record_mint(&tok("A"), 1).unwrap_err();
        assert!(matches!(err, DexError::ArithmeticOverflow(_)));
    }

    #[test]
    fn tokens_tracked_independently() {
        let mut sc = SupplyConservation::new();
        sc.record_mint(&tok("B"), 5).unwrap();
        sc.record_mint(&tok("A"), 50).unwrap();
        assert_eq!(sc.tracked_tokens(), vec![tok("A"), tok("B")]);
        assert!(sc.verify(&tok("B"), 5).is_ok());
        assert!(sc.verify(&tok("A"), 50).is_ok());
    }
}
