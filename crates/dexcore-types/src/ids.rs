//! Identifiers used throughout dexcore.
//!
//! User accounts use UUIDv7 for time-ordered sorting. Protocol accounts
//! (router, order book custody, pools) are derived deterministically from a
//! domain-separated SHA-256 hash, so every replica computes the same ids.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::TokenPair;

/// Exact integer token quantity.
pub type Amount = u128;

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Opaque fungible-asset identifier (symbol or contract address).
///
/// The derived `Ord` is the canonical order used to decide which token of a
/// pair is `token0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Ledger account: a user, a pool's custody account, the router or the
/// order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    /// Fresh user account (UUIDv7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Deterministic protocol account derived from a domain tag.
    ///
    /// `SHA-256("dexcore:account:v1:" || tag)[..16]`
    #[must_use]
    pub fn derived(tag: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"dexcore:account:v1:");
        hasher.update(tag);
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash[..16]);
        Self::from_bytes(bytes)
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0.as_bytes()[..4])
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PoolId
// ---------------------------------------------------------------------------

/// Deterministic pool identifier: a hash of the canonical token pair.
///
/// Like a CREATE2 address, anyone can compute a pool's id (and its custody
/// account) from the two token ids alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PoolId(pub [u8; 32]);

impl PoolId {
    /// `SHA-256("dexcore:pool:v2:" || len(token0) || token0 || len(token1) || token1)`
    ///
    /// Lengths are `u64` little-endian, so no two pairs frame to the same
    /// bytes whatever characters the token ids contain.
    #[must_use]
    pub fn for_pair(pair: &TokenPair) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"dexcore:pool:v2:");
        for token in [pair.token0(), pair.token1()] {
            let bytes = token.as_str().as_bytes();
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        let hash = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    /// The ledger account holding this pool's reserves.
    #[must_use]
    pub fn account(&self) -> AccountId {
        AccountId::derived(&self.0)
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool:{}", hex::encode(&self.0[..8]))
    }
}

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Sequential order identifier. The first order is `OrderId(0)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct OrderId(pub u64);

impl OrderId {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_uniqueness() {
        assert_ne!(AccountId::new(), AccountId::new());
    }

    #[test]
    fn derived_accounts_are_stable_and_distinct() {
        let a = AccountId::derived(b"router");
        let b = AccountId::derived(b"router");
        let c = AccountId::derived(b"order-book");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn pool_id_ignores_argument_order() {
        let ab = TokenPair::new(TokenId::new("AAA"), TokenId::new("BBB")).unwrap();
        let ba = TokenPair::new(TokenId::new("BBB"), TokenId::new("AAA")).unwrap();
        assert_eq!(PoolId::for_pair(&ab), PoolId::for_pair(&ba));
        assert_eq!(PoolId::for_pair(&ab).account(), PoolId::for_pair(&ba).account());
    }

    #[test]
    fn pool_id_framing_prevents_ambiguity() {
        let p1 = TokenPair::new(TokenId::new("AB"), TokenId::new("C")).unwrap();
        let p2 = TokenPair::new(TokenId::new("A"), TokenId::new("BC")).unwrap();
        assert_ne!(PoolId::for_pair(&p1), PoolId::for_pair(&p2));

        // Token ids may contain NUL, so a separator byte alone is not enough.
        let p3 = TokenPair::new(TokenId::new("A\0B"), TokenId::new("C")).unwrap();
        let p4 = TokenPair::new(TokenId::new("A"), TokenId::new("B\0C")).unwrap();
        assert_ne!(PoolId::for_pair(&p3), PoolId::for_pair(&p4));
        assert_ne!(PoolId::for_pair(&p3).account(), PoolId::for_pair(&p4).account());
    }

    #[test]
    fn order_id_next() {
        assert_eq!(OrderId(5).next(), OrderId(6));
        assert_eq!(OrderId::default(), OrderId(0));
    }

    #[test]
    fn serde_roundtrips() {
        let acct = AccountId::new();
        let json = serde_json::to_string(&acct).unwrap();
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(acct, back);

        let token = TokenId::new("WETH");
        let json = serde_json::to_string(&token).unwrap();
        let back: TokenId = serde_json::from_str(&json).unwrap();
        assert_eq!(token, back);
    }
}
