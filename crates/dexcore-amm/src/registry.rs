//! Pool registry: exactly one pool per unordered token pair.

use std::collections::{BTreeMap, HashMap};

use dexcore_ledger::Checkpoint;
use dexcore_types::{DexError, DexEvent, EventSink, PoolId, Result, TokenId, TokenPair};
use tracing::{debug, info};

use crate::Pool;

/// Maps canonical pairs to pools. Committed entries are never replaced or
/// removed; only a rollback drops a pool created under the same checkpoint.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pools: BTreeMap<PoolId, Pool>,
    by_pair: HashMap<TokenPair, PoolId>,
    /// Pool ids in creation order.
    created: Vec<PoolId>,
    /// Pre-image of every pool touched since the checkpoint; `None` for
    /// pools created after it.
    journal: Option<BTreeMap<PoolId, Option<Pool>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The pool for `(a, b)` in either order, created empty if missing.
    pub fn get_or_create_pool(
        &mut self,
        a: &TokenId,
        b: &TokenId,
        events: &mut impl EventSink,
    ) -> Result<&mut Pool> {
        let pair = TokenPair::new(a.clone(), b.clone())?;
        let existing = self.by_pair.get(&pair).copied();
        let id = match existing {
            Some(id) => id,
            None => self.insert(pair, events)?,
        };
        self.by_id_mut(id)
    }

    /// Create the pool for `(a, b)`.
    ///
    /// # Errors
    /// `PoolExists` if the pair already has a pool; `IdenticalTokens` if
    /// `a == b`.
    pub fn create_pool(
        &mut self,
        a: &TokenId,
        b: &TokenId,
        events: &mut impl EventSink,
    ) -> Result<PoolId> {
        let pair = TokenPair::new(a.clone(), b.clone())?;
        if let Some(id) = self.by_pair.get(&pair) {
            return Err(DexError::PoolExists(*id));
        }
        self.insert(pair, events)
    }

    /// Lookup without creation. `None` for unknown or identical tokens.
    #[must_use]
    pub fn get_pool(&self, a: &TokenId, b: &TokenId) -> Option<&Pool> {
        let pair = TokenPair::new(a.clone(), b.clone()).ok()?;
        self.by_pair.get(&pair).and_then(|id| self.pools.get(id))
    }

    /// Like [`get_pool`](Self::get_pool) but fails with `PoolNotFound`.
    pub fn pool(&self, a: &TokenId, b: &TokenId) -> Result<&Pool> {
        TokenPair::new(a.clone(), b.clone())?;
        self.get_pool(a, b).ok_or_else(|| not_found(a, b))
    }

    pub fn pool_mut(&mut self, a: &TokenId, b: &TokenId) -> Result<&mut Pool> {
        let pair = TokenPair::new(a.clone(), b.clone())?;
        let id = *self.by_pair.get(&pair).ok_or_else(|| not_found(a, b))?;
        self.by_id_mut(id)
    }

    #[must_use]
    pub fn by_id(&self, id: &PoolId) -> Option<&Pool> {
        self.pools.get(id)
    }

    /// Pools in creation order.
    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.created.iter().filter_map(|id| self.pools.get(id))
    }

    /// Pairs in creation order.
    #[must_use]
    pub fn all_pairs(&self) -> Vec<TokenPair> {
        self.pools().map(|p| p.pair().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Register a new pool for `pair`. Never replaces a pool already stored
    /// under the same id.
    fn insert(&mut self, pair: TokenPair, events: &mut impl EventSink) -> Result<PoolId> {
        let pool = Pool::new(pair.clone());
        let id = pool.id();
        if let Some(existing) = self.pools.get(&id) {
            return Err(DexError::Internal(format!(
                "{id} already holds {}, refusing to register {pair}",
                existing.pair()
            )));
        }
        events.emit(DexEvent::PoolCreated {
            pool: id,
            token0: pair.token0().clone(),
            token1: pair.token1().clone(),
        });
        info!(pool = %id, pair = %pair, account = %pool.account(), "Pool created");
        if let Some(journal) = self.journal.as_mut() {
            journal.insert(id, None);
        }
        self.pools.insert(id, pool);
        self.by_pair.insert(pair, id);
        self.created.push(id);
        Ok(id)
    }

    /// Every mutable pool access goes through here, so this is where the
    /// journal takes its pre-image.
    fn by_id_mut(&mut self, id: PoolId) -> Result<&mut Pool> {
        let pool = self
            .pools
            .get_mut(&id)
            .ok_or_else(|| DexError::Internal(format!("registry index points at missing {id}")))?;
        if let Some(journal) = self.journal.as_mut() {
            journal.entry(id).or_insert_with(|| Some(pool.clone()));
        }
        Ok(pool)
    }
}

impl Checkpoint for Registry {
    fn checkpoint(&mut self) {
        self.journal = Some(BTreeMap::new());
    }

    fn commit(&mut self) {
        self.journal = None;
    }

    fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for (id, before) in journal {
            match before {
                Some(pool) => {
                    self.pools.insert(id, pool);
                }
                None => {
                    if let Some(pool) = self.pools.remove(&id) {
                        self.by_pair.remove(pool.pair());
                    }
                    self.created.retain(|created| *created != id);
                    debug!(pool = %id, "Pool creation rolled back");
                }
            }
        }
    }
}

fn not_found(a: &TokenId, b: &TokenId) -> DexError {
    DexError::PoolNotFound {
        token_a: a.clone(),
        token_b: b.clone(),
    }
}

#[cfg(test)]
mod tests {
    use dexcore_types::AccountId;

    use super::*;

    fn tok(s: &str) -> TokenId {
        TokenId::new(s)
    }

    #[test]
    fn one_pool_per_pair_in_either_order() {
        let mut registry = Registry::new();
        let mut events = Vec::new();
        let id_ab = registry
            .get_or_create_pool(&tok("A"), &tok("B"), &mut events)
            .unwrap()
            .id();
        let id_ba = registry
            .get_or_create_pool(&tok("B"), &tok("A"), &mut events)
            .unwrap()
            .id();
        assert_eq!(id_ab, id_ba);
        assert_eq!(registry.len(), 1);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DexEvent::PoolCreated { token0, .. } if token0.as_str() == "A"));
    }

    #[test]
    fn create_pool_twice_rejected() {
        let mut registry = Registry::new();
        let mut events = Vec::new();
        let id = registry.create_pool(&tok("B"), &tok("A"), &mut events).unwrap();
        let err = registry
            .create_pool(&tok("A"), &tok("B"), &mut events)
            .unwrap_err();
        assert!(matches!(err, DexError::PoolExists(existing) if existing == id));
    }

    #[test]
    fn pairs_with_embedded_nul_keep_their_own_pools() {
        let mut registry = Registry::new();
        let mut events = Vec::new();
        let first = registry
            .create_pool(&tok("A\0B"), &tok("C"), &mut events)
            .unwrap();
        let second = registry
            .create_pool(&tok("A"), &tok("B\0C"), &mut events)
            .unwrap();
        assert_ne!(first, second);
        assert_ne!(first.account(), second.account());
        assert_eq!(registry.len(), 2);

        let pool = registry.pool(&tok("A\0B"), &tok("C")).unwrap();
        assert_eq!(pool.id(), first);
        assert_eq!(pool.pair().token0().as_str(), "A\0B");
        assert_eq!(pool.pair().token1().as_str(), "C");
    }

    #[test]
    fn rollback_drops_new_pools_and_restores_touched_ones() {
        let mut registry = Registry::new();
        let mut events = Vec::new();
        registry.create_pool(&tok("A"), &tok("B"), &mut events).unwrap();
        let (owner, spender) = (AccountId::new(), AccountId::new());

        registry.checkpoint();
        registry.create_pool(&tok("C"), &tok("D"), &mut events).unwrap();
        let pool = registry.pool_mut(&tok("A"), &tok("B")).unwrap();
        pool.approve_shares(owner, spender, 50).unwrap();
        let pool = registry.pool_mut(&tok("B"), &tok("A")).unwrap();
        pool.approve_shares(owner, spender, 90).unwrap();
        registry.rollback();

        assert_eq!(registry.len(), 1);
        assert!(registry.get_pool(&tok("C"), &tok("D")).is_none());
        assert_eq!(registry.pools().count(), 1);
        let pool = registry.pool(&tok("A"), &tok("B")).unwrap();
        assert_eq!(pool.share_allowance(owner, spender), 0);

        // The pair is free again.
        registry.create_pool(&tok("D"), &tok("C"), &mut events).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn commit_keeps_new_pools() {
        let mut registry = Registry::new();
        let mut events = Vec::new();
        registry.checkpoint();
        registry.create_pool(&tok("A"), &tok("B"), &mut events).unwrap();
        registry.commit();
        registry.rollback();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn insert_never_replaces_a_stored_pool() {
        let mut registry = Registry::new();
        let mut events = Vec::new();
        let id = registry.create_pool(&tok("A"), &tok("B"), &mut events).unwrap();
        // Drop the pair index only, so the id is still taken in `pools`.
        registry.by_pair.clear();

        let err = registry
            .create_pool(&tok("A"), &tok("B"), &mut events)
            .unwrap_err();
        assert!(matches!(err, DexError::Internal(_)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.by_id(&id).unwrap().pair().token0().as_str(), "A");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn identical_tokens_rejected() {
        let mut registry = Registry::new();
        let mut events: Vec<DexEvent> = Vec::new();
        assert!(matches!(
            registry.get_or_create_pool(&tok("A"), &tok("A"), &mut events),
            Err(DexError::IdenticalTokens(_))
        ));
        assert!(registry.get_pool(&tok("A"), &tok("A")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_without_creation() {
        let mut registry = Registry::new();
        assert!(registry.get_pool(&tok("A"), &tok("B")).is_none());
        assert!(matches!(
            registry.pool(&tok("A"), &tok("B")),
            Err(DexError::PoolNotFound { .. })
        ));
        assert!(registry.pool_mut(&tok("A"), &tok("B")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn all_pairs_in_creation_order() {
        let mut registry = Registry::new();
        let mut events = Vec::new();
        registry.create_pool(&tok("Y"), &tok("Z"), &mut events).unwrap();
        registry.create_pool(&tok("A"), &tok("B"), &mut events).unwrap();
        let pairs: Vec<String> = registry
            .all_pairs()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(pairs, vec!["Y/Z", "A/B"]);
    }
}
