//! In-memory reference ledger.
//!
//! Balances live in a `HashMap<(TokenId, AccountId), Amount>`. Every
//! mutation validates first and writes second, so a failing call leaves the
//! ledger untouched.
//!
//! Tokens can carry a transfer tax in basis points. The tax is deducted from
//! what the recipient receives and burned, which is how fee-on-transfer
//! tokens behave from the exchange's point of view.
//!
//! Under a [`Checkpoint`] every overwritten balance, allowance and tax rate
//! is journaled, so rollback touches only the keys the operation wrote.

use std::collections::HashMap;
use std::hash::Hash;

use dexcore_types::{AccountId, Amount, DexError, Result, TokenId, constants};
use tracing::{debug, info};

use crate::{Checkpoint, Ledger, SupplyConservation};

/// Reference [`Ledger`] adapter and test double.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<(TokenId, AccountId), Amount>,
    allowances: HashMap<(TokenId, AccountId, AccountId), Amount>,
    /// `TokenId → tax in basis points`
    transfer_tax_bps: HashMap<TokenId, u16>,
    supply: SupplyConservation,
    journal: Option<LedgerJournal>,
}

#[derive(Debug, Clone)]
struct LedgerJournal {
    entries: Vec<LedgerUndo>,
    /// Supply counters at the checkpoint. One entry per token.
    supply: SupplyConservation,
}

/// Prior value of one overwritten key. `None` means the key was absent.
#[derive(Debug, Clone)]
enum LedgerUndo {
    Balance((TokenId, AccountId), Option<Amount>),
    Allowance((TokenId, AccountId, AccountId), Option<Amount>),
    TransferTax(TokenId, Option<u16>),
}

impl InMemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` new tokens in `account`.
    pub fn mint(&mut self, token: &TokenId, account: AccountId, amount: Amount) -> Result<()> {
        let current = self.balance_of(token, account);
        let updated = current
            .checked_add(amount)
            .ok_or(DexError::ArithmeticOverflow("ledger balance"))?;
        self.supply.record_mint(token, amount)?;
        self.write_balance(token, account, updated);
        info!(token = %token, account = %account, amount, "Minted");
        Ok(())
    }

    /// Make `token` a fee-on-transfer token taking `bps` / 10 000 of every
    /// transfer.
    ///
    /// # Errors
    /// `Configuration` if `bps` exceeds 10 000.
    pub fn set_transfer_tax(&mut self, token: &TokenId, bps: u16) -> Result<()> {
        if u128::from(bps) > constants::BPS_DENOMINATOR {
            return Err(DexError::Configuration(format!(
                "transfer tax {bps} bps exceeds {}",
                constants::BPS_DENOMINATOR
            )));
        }
        let prev = if bps == 0 {
            self.transfer_tax_bps.remove(token)
        } else {
            self.transfer_tax_bps.insert(token.clone(), bps)
        };
        self.journaled(LedgerUndo::TransferTax(token.clone(), prev));
        Ok(())
    }

    #[must_use]
    pub fn transfer_tax_bps(&self, token: &TokenId) -> u16 {
        self.transfer_tax_bps.get(token).copied().unwrap_or(0)
    }

    /// Sum of all balances of `token`.
    #[must_use]
    pub fn total_supply(&self, token: &TokenId) -> Amount {
        self.balances
            .iter()
            .filter(|((t, _), _)| t == token)
            .map(|(_, amount)| *amount)
            .fold(0, Amount::saturating_add)
    }

    /// Check `Σ balances == minted - burned` for every token ever minted.
    pub fn verify_supply(&self) -> Result<()> {
        for token in self.supply.tracked_tokens() {
            self.supply.verify(&token, self.total_supply(&token))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }

    fn tax_on(&self, token: &TokenId, amount: Amount) -> Amount {
        let bps = u128::from(self.transfer_tax_bps(token));
        // bps <= 10_000, so this only overflows for amounts near u128::MAX.
        amount
            .checked_mul(bps)
            .map_or(amount / constants::BPS_DENOMINATOR * bps, |v| {
                v / constants::BPS_DENOMINATOR
            })
    }

    fn move_balance(
        &mut self,
        token: &TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(DexError::InsufficientBalance {
                token: token.clone(),
                needed: amount,
                available,
            });
        }
        let tax = self.tax_on(token, amount);
        let received = amount - tax;

        if from != to {
            let to_balance = self
                .balance_of(token, to)
                .checked_add(received)
                .ok_or(DexError::ArithmeticOverflow("ledger balance"))?;
            self.write_balance(token, from, available - amount);
            self.write_balance(token, to, to_balance);
        } else {
            self.write_balance(token, from, available - tax);
        }
        if tax > 0 {
            self.supply.record_burn(token, tax)?;
        }

        debug!(
            token = %token,
            from = %from,
            to = %to,
            amount,
            received,
            tax,
            "Transfer"
        );
        Ok(())
    }

    fn write_balance(&mut self, token: &TokenId, account: AccountId, amount: Amount) {
        let key = (token.clone(), account);
        let prev = self.balances.insert(key.clone(), amount);
        self.journaled(LedgerUndo::Balance(key, prev));
    }

    fn write_allowance(
        &mut self,
        token: &TokenId,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) {
        let key = (token.clone(), owner, spender);
        let prev = self.allowances.insert(key.clone(), amount);
        self.journaled(LedgerUndo::Allowance(key, prev));
    }

    fn journaled(&mut self, undo: LedgerUndo) {
        if let Some(journal) = self.journal.as_mut() {
            journal.entries.push(undo);
        }
    }
}

impl Checkpoint for InMemoryLedger {
    fn checkpoint(&mut self) {
        self.journal = Some(LedgerJournal {
            entries: Vec::new(),
            supply: self.supply.clone(),
        });
    }

    fn commit(&mut self) {
        self.journal = None;
    }

    fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        let undone = journal.entries.len();
        for undo in journal.entries.into_iter().rev() {
            match undo {
                LedgerUndo::Balance(key, prev) => restore(&mut self.balances, key, prev),
                LedgerUndo::Allowance(key, prev) => restore(&mut self.allowances, key, prev),
                LedgerUndo::TransferTax(token, prev) => {
                    restore(&mut self.transfer_tax_bps, token, prev);
                }
            }
        }
        self.supply = journal.supply;
        debug!(undone, "Ledger rolled back");
    }
}

fn restore<K: Eq + Hash, V>(map: &mut HashMap<K, V>, key: K, prev: Option<V>) {
    match prev {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl Ledger for InMemoryLedger {
    fn balance_of(&self, token: &TokenId, account: AccountId) -> Amount {
        self.balances
            .get(&(token.clone(), account))
            .copied()
            .unwrap_or(0)
    }

    fn allowance(&self, token: &TokenId, owner: AccountId, spender: AccountId) -> Amount {
        self.allowances
            .get(&(token.clone(), owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        self.move_balance(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<()> {
        let approved = self.allowance(token, from, spender);
        if approved < amount {
            return Err(DexError::InsufficientAllowance {
                token: token.clone(),
                needed: amount,
                approved,
            });
        }
        self.move_balance(token, from, to, amount)?;
        // An allowance of `Amount::MAX` never decreases.
        if approved != Amount::MAX {
            self.write_allowance(token, from, spender, approved - amount);
        }
        Ok(())
    }

    fn approve(&mut self, token: &TokenId, owner: AccountId, spender: AccountId, amount: Amount) {
        self.write_allowance(token, owner, spender, amount);
        debug!(token = %token, owner = %owner, spender = %spender, amount, "Approved");
    }
}
