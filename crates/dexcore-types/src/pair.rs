//! Canonically ordered token pairs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DexError, Result, TokenId};

/// An unordered pair of distinct tokens stored in canonical order
/// (`token0 < token1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TokenPair {
    token0: TokenId,
    token1: TokenId,
}

impl TokenPair {
    /// Canonicalize `(a, b)`.
    ///
    /// # Errors
    /// Returns [`DexError::IdenticalTokens`] if `a == b`.
    pub fn new(a: TokenId, b: TokenId) -> Result<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self {
                token0: a,
                token1: b,
            }),
            std::cmp::Ordering::Greater => Ok(Self {
                token0: b,
                token1: a,
            }),
            std::cmp::Ordering::Equal => Err(DexError::IdenticalTokens(a)),
        }
    }

    #[must_use]
    pub fn token0(&self) -> &TokenId {
        &self.token0
    }

    #[must_use]
    pub fn token1(&self) -> &TokenId {
        &self.token1
    }

    #[must_use]
    pub fn contains(&self, token: &TokenId) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    /// Whether `token` is `token0` of this pair.
    #[must_use]
    pub fn is_token0(&self, token: &TokenId) -> bool {
        self.token0 == *token
    }

    /// The counterpart of `token`, or `None` if `token` is not in the pair.
    #[must_use]
    pub fn other(&self, token: &TokenId) -> Option<&TokenId> {
        if self.token0 == *token {
            Some(&self.token1)
        } else if self.token1 == *token {
            Some(&self.token0)
        } else {
            None
        }
    }
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.token0, self.token1)
    }
}
