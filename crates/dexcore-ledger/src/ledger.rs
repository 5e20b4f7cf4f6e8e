//! The ledger interface consumed by pools, the router and the order book.

use dexcore_types::{AccountId, Amount, Result, TokenId};

/// Fungible balance store with an allowance model.
///
/// Implementations must apply each call atomically: a failing transfer
/// leaves every balance and allowance untouched. A transfer may deliver
/// less than `amount` to the recipient (fee-on-transfer tokens); callers
/// that care measure the recipient's balance delta.
pub trait Ledger {
    /// Balance of `account` in `token`. Unknown accounts hold zero.
    fn balance_of(&self, token: &TokenId, account: AccountId) -> Amount;

    /// Amount `spender` may move out of `owner`'s balance.
    fn allowance(&self, token: &TokenId, owner: AccountId, spender: AccountId) -> Amount;

    /// Move `amount` from `from` to `to`.
    ///
    /// # Errors
    /// `InsufficientBalance` if `from` holds less than `amount`.
    fn transfer(
        &mut self,
        token: &TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()>;

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    ///
    /// # Errors
    /// `InsufficientAllowance` or `InsufficientBalance`.
    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()>;

    /// Set `spender`'s allowance over `owner`'s balance to `amount`.
    fn approve(&mut self, token: &TokenId, owner: AccountId, spender: AccountId, amount: Amount);
}
