//! In-process ordered store.
//!
//! Holds every item's slot in a `HashMap`. Exclusive access comes from the
//! `&mut self` receiver, so no locking is needed; wrap it in a
//! `tokio::sync::Mutex` to share it between tasks.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use super::{OrderedStore, OrderingError, PositionRange, Slot};

#[derive(Debug, Clone)]
pub struct MemoryOrderedStore<S, I> {
    kind: &'static str,
    scopes: HashSet<S>,
    items: HashMap<I, Slot<S>>,
    writes: u64,
}

impl<S, I> MemoryOrderedStore<S, I>
where
    S: Clone + Debug + Eq + Hash,
    I: Clone + Debug + Eq + Hash + Ord,
{
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            scopes: HashSet::new(),
            items: HashMap::new(),
            writes: 0,
        }
    }

    pub fn add_scope(&mut self, scope: S) {
        self.scopes.insert(scope);
    }

    /// Write an item directly, bypassing the engine (used after `insert_at`)
    pub fn put(&mut self, id: I, scope: S, position: i32) {
        self.items.insert(id, Slot::new(scope, position));
    }

    pub fn get(&self, id: &I) -> Option<&Slot<S>> {
        self.items.get(id)
    }

    /// Items of a scope sorted by position (ties broken by id)
    pub fn ordered(&self, scope: &S) -> Vec<(I, i32)> {
        let mut entries: Vec<(I, i32)> = self
            .items
            .iter()
            .filter(|(_, slot)| slot.scope == *scope)
            .map(|(id, slot)| (id.clone(), slot.position))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    /// True when the positions of `scope` are exactly `0..n`
    pub fn is_dense(&self, scope: &S) -> bool {
        self.ordered(scope)
            .iter()
            .enumerate()
            .all(|(expected, (_, position))| *position == expected as i32)
    }

    /// True when no two items of `scope` share a position
    pub fn has_unique_positions(&self, scope: &S) -> bool {
        let ordered = self.ordered(scope);
        ordered.windows(2).all(|pair| pair[0].1 != pair[1].1)
    }

    /// Number of item rows written through the engine so far
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

#[async_trait]
impl<S, I> OrderedStore for MemoryOrderedStore<S, I>
where
    S: Clone + Debug + Eq + Hash + Send + Sync,
    I: Clone + Debug + Eq + Hash + Ord + Send + Sync,
{
    type Id = I;
    type Scope = S;

    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn slot_of(&mut self, id: &I) -> Result<Option<Slot<S>>, OrderingError> {
        Ok(self.items.get(id).cloned())
    }

    async fn scope_exists(&mut self, scope: &S) -> Result<bool, OrderingError> {
        Ok(self.scopes.contains(scope))
    }

    async fn len(&mut self, scope: &S) -> Result<i32, OrderingError> {
        let count = self.items.values().filter(|slot| slot.scope == *scope).count();
        Ok(count as i32)
    }

    async fn shift(&mut self, scope: &S, range: PositionRange, delta: i32) -> Result<u64, OrderingError> {
        let mut touched = 0;
        for slot in self.items.values_mut() {
            if slot.scope == *scope && range.contains(slot.position) {
                slot.position += delta;
                touched += 1;
            }
        }
        self.writes += touched;
        Ok(touched)
    }

    async fn place(&mut self, id: &I, slot: &Slot<S>) -> Result<(), OrderingError> {
        let entry = self
            .items
            .get_mut(id)
            .ok_or_else(|| OrderingError::NotFound(format!("{} {:?}", self.kind, id)))?;
        *entry = slot.clone();
        self.writes += 1;
        Ok(())
    }

    async fn delete(&mut self, id: &I) -> Result<(), OrderingError> {
        self.items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| OrderingError::NotFound(format!("{} {:?}", self.kind, id)))
    }
}
