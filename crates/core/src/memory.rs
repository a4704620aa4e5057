//! Owner-isolated in-memory storage for dev/test repositories.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::entity::OwnedEntity;
use crate::id::UserId;

/// In-memory store keyed by `(owner, id)`.
///
/// Every read takes the owner, so cross-owner lookups return nothing.
#[derive(Debug)]
pub struct InMemoryOwnedStore<V: OwnedEntity> {
    inner: RwLock<HashMap<(UserId, V::Id), V>>,
}

impl<V: OwnedEntity> Default for InMemoryOwnedStore<V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> InMemoryOwnedStore<V>
where
    V: OwnedEntity + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: &UserId, id: &V::Id) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(owner.clone(), id.clone())).cloned()
    }

    /// Find an entity by id regardless of owner (internal consumers only).
    pub fn get_any(&self, id: &V::Id) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.iter()
            .find(|((_, k), _)| k == id)
            .map(|(_, v)| v.clone())
    }

    pub fn upsert(&self, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((value.owner_id().clone(), value.id().clone()), value);
        }
    }

    /// Remove an entity; returns whether it existed.
    pub fn remove(&self, owner: &UserId, id: &V::Id) -> bool {
        match self.inner.write() {
            Ok(mut map) => map.remove(&(owner.clone(), id.clone())).is_some(),
            Err(_) => false,
        }
    }

    pub fn list(&self, owner: &UserId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((o, _), v)| if o == owner { Some(v.clone()) } else { None })
            .collect()
    }

    /// All entities across owners matching `predicate`.
    pub fn find_all(&self, predicate: impl Fn(&V) -> bool) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };
        map.values().filter(|v| predicate(v)).cloned().collect()
    }
}
