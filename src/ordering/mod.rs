//! Dense, zero-based sibling ordering.
//!
//! Every positioned entity (kanban columns and cards, sales stages and
//! opportunities, departments under a parent) keeps a `position` that is
//! unique within its scope. After any operation the live positions of a scope
//! are exactly `0..n`. The shifting rules live here once; storage backends only
//! provide range updates and point reads through [`OrderedStore`].

pub mod memory;
pub mod postgres;

use std::fmt::Debug;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryOrderedStore;
pub use postgres::{OrderedTable, PgOrderedStore};

#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid position {0}: positions are zero-based")]
    InvalidPosition(i32),

    #[error("Conflicting state: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Where an item currently sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot<S> {
    pub scope: S,
    pub position: i32,
}

impl<S> Slot<S> {
    pub fn new(scope: S, position: i32) -> Self {
        Self { scope, position }
    }
}

/// Inclusive position range inside one scope. `end: None` is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRange {
    pub start: i32,
    pub end: Option<i32>,
}

impl PositionRange {
    /// Every position `>= start`
    pub fn starting_at(start: i32) -> Self {
        Self { start, end: None }
    }

    /// Positions in `start..=end`
    pub fn between(start: i32, end: i32) -> Self {
        Self { start, end: Some(end) }
    }

    pub fn contains(&self, position: i32) -> bool {
        position >= self.start && self.end.map_or(true, |end| position <= end)
    }
}

/// Behavior when a requested position lies past the end of the scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Clamp to the last valid slot, keeping positions dense
    #[default]
    Clamp,
    /// Write the requested position as-is, leaving a gap
    Allow,
}

impl FromStr for GapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(GapPolicy::Clamp),
            "allow" | "gap" => Ok(GapPolicy::Allow),
            other => Err(format!("unknown gap policy '{}'", other)),
        }
    }
}

/// Storage primitives the reorder engine needs.
///
/// Implementations are expected to run every call of one engine operation
/// against the same transaction (or the same exclusive borrow, for the
/// in-memory store) so the shift-then-write sequence is atomic.
#[async_trait]
pub trait OrderedStore: Send {
    type Id: Clone + Debug + Send + Sync;
    type Scope: Clone + Debug + PartialEq + Send + Sync;

    /// Human readable name of the ordered entity, used in error messages
    fn kind(&self) -> &'static str;

    async fn slot_of(&mut self, id: &Self::Id) -> Result<Option<Slot<Self::Scope>>, OrderingError>;

    async fn scope_exists(&mut self, scope: &Self::Scope) -> Result<bool, OrderingError>;

    /// Number of live items in the scope
    async fn len(&mut self, scope: &Self::Scope) -> Result<i32, OrderingError>;

    /// Add `delta` to the position of every item of `scope` inside `range`.
    /// Returns the number of items touched.
    async fn shift(
        &mut self,
        scope: &Self::Scope,
        range: PositionRange,
        delta: i32,
    ) -> Result<u64, OrderingError>;

    /// Write the scope and position of an existing item
    async fn place(&mut self, id: &Self::Id, slot: &Slot<Self::Scope>) -> Result<(), OrderingError>;

    async fn delete(&mut self, id: &Self::Id) -> Result<(), OrderingError>;

    /// Serialize writers of the given scopes until the surrounding transaction ends
    async fn lock_scopes(&mut self, _scopes: &[Self::Scope]) -> Result<(), OrderingError> {
        Ok(())
    }
}

/// The reorder engine. Stateless apart from its policy.
#[derive(Debug, Clone, Copy)]
pub struct Reorderer {
    policy: GapPolicy,
    max_lock_attempts: u32,
}

impl Default for Reorderer {
    fn default() -> Self {
        Self::new(GapPolicy::Clamp)
    }
}

impl Reorderer {
    pub fn new(policy: GapPolicy) -> Self {
        Self {
            policy,
            max_lock_attempts: 3,
        }
    }

    pub fn with_max_lock_attempts(mut self, attempts: u32) -> Self {
        self.max_lock_attempts = attempts.max(1);
        self
    }

    pub fn from_config() -> Self {
        let ordering = &crate::config::config().ordering;
        Self::new(ordering.gap_policy).with_max_lock_attempts(ordering.max_lock_attempts)
    }

    pub fn policy(&self) -> GapPolicy {
        self.policy
    }

    /// Reserve `position` in `scope` for a new item by shifting every item at or
    /// after it up by one. Returns the position the caller must write.
    pub async fn insert_at<S: OrderedStore>(
        &self,
        store: &mut S,
        scope: &S::Scope,
        position: i32,
    ) -> Result<i32, OrderingError> {
        ensure_non_negative(position)?;
        if !store.scope_exists(scope).await? {
            return Err(OrderingError::NotFound(format!("{} scope {:?}", store.kind(), scope)));
        }
        store.lock_scopes(std::slice::from_ref(scope)).await?;

        let len = store.len(scope).await?;
        let target = self.settle(position, len);
        // A gapped scope can hold items at or past `len`, so the shift always runs
        let shifted = store.shift(scope, PositionRange::starting_at(target), 1).await?;
        tracing::debug!("Reserved {} position {} in {:?} ({} shifted)", store.kind(), target, scope, shifted);
        Ok(target)
    }

    /// Like [`Reorderer::insert_at`], appending when no position is given
    pub async fn insert_or_append<S: OrderedStore>(
        &self,
        store: &mut S,
        scope: &S::Scope,
        position: Option<i32>,
    ) -> Result<i32, OrderingError> {
        match position {
            Some(position) => self.insert_at(store, scope, position).await,
            None => {
                if !store.scope_exists(scope).await? {
                    return Err(OrderingError::NotFound(format!("{} scope {:?}", store.kind(), scope)));
                }
                store.lock_scopes(std::slice::from_ref(scope)).await?;
                store.len(scope).await
            }
        }
    }

    /// Rotate an item to `new_position` inside its current scope.
    /// Only the items between the old and new position are rewritten.
    pub async fn move_within<S: OrderedStore>(
        &self,
        store: &mut S,
        id: &S::Id,
        new_position: i32,
    ) -> Result<Slot<S::Scope>, OrderingError> {
        ensure_non_negative(new_position)?;
        let slot = self.locked_slot(store, id, None).await?;

        let len = store.len(&slot.scope).await?;
        let target = self.settle(new_position, len - 1);
        if target == slot.position {
            return Ok(slot);
        }

        if slot.position < target {
            store
                .shift(&slot.scope, PositionRange::between(slot.position + 1, target), -1)
                .await?;
        } else {
            store
                .shift(&slot.scope, PositionRange::between(target, slot.position - 1), 1)
                .await?;
        }

        let moved = Slot::new(slot.scope, target);
        store.place(id, &moved).await?;
        tracing::debug!("Moved {} {:?} from {} to {}", store.kind(), id, slot.position, target);
        Ok(moved)
    }

    /// Move an item into `target_scope` at `new_position`, closing the gap in
    /// its old scope. Falls back to [`Reorderer::move_within`] when the scope is
    /// unchanged.
    pub async fn move_across<S: OrderedStore>(
        &self,
        store: &mut S,
        id: &S::Id,
        target_scope: &S::Scope,
        new_position: i32,
    ) -> Result<Slot<S::Scope>, OrderingError> {
        ensure_non_negative(new_position)?;
        self.relocate(store, id, target_scope, Some(new_position)).await
    }

    /// Like [`Reorderer::move_across`]. Without a position the item stays put
    /// when the scope is unchanged and goes to the end of a new scope.
    pub async fn move_or_append<S: OrderedStore>(
        &self,
        store: &mut S,
        id: &S::Id,
        target_scope: &S::Scope,
        position: Option<i32>,
    ) -> Result<Slot<S::Scope>, OrderingError> {
        if let Some(position) = position {
            ensure_non_negative(position)?;
        }
        self.relocate(store, id, target_scope, position).await
    }

    /// `position: None` appends at the target's length, read under the lock
    async fn relocate<S: OrderedStore>(
        &self,
        store: &mut S,
        id: &S::Id,
        target_scope: &S::Scope,
        position: Option<i32>,
    ) -> Result<Slot<S::Scope>, OrderingError> {
        if !store.scope_exists(target_scope).await? {
            return Err(OrderingError::NotFound(format!(
                "Target {} scope {:?}",
                store.kind(),
                target_scope
            )));
        }

        let slot = self.locked_slot(store, id, Some(target_scope)).await?;
        if slot.scope == *target_scope {
            return match position {
                Some(position) => self.move_within(store, id, position).await,
                None => Ok(slot),
            };
        }

        let len = store.len(target_scope).await?;
        let target = match position {
            Some(position) => self.settle(position, len),
            None => len,
        };

        // Both range updates land before the moved row is written
        store
            .shift(&slot.scope, PositionRange::starting_at(slot.position + 1), -1)
            .await?;
        store
            .shift(target_scope, PositionRange::starting_at(target), 1)
            .await?;

        let moved = Slot::new(target_scope.clone(), target);
        store.place(id, &moved).await?;
        tracing::debug!(
            "Moved {} {:?} from {:?}@{} to {:?}@{}",
            store.kind(),
            id,
            slot.scope,
            slot.position,
            target_scope,
            target
        );
        Ok(moved)
    }

    /// Delete an item and compact the positions after it. Returns the slot it held.
    pub async fn remove<S: OrderedStore>(
        &self,
        store: &mut S,
        id: &S::Id,
    ) -> Result<Slot<S::Scope>, OrderingError> {
        let slot = self.locked_slot(store, id, None).await?;
        store.delete(id).await?;
        store
            .shift(&slot.scope, PositionRange::starting_at(slot.position + 1), -1)
            .await?;
        tracing::debug!("Removed {} {:?} from {:?}@{}", store.kind(), id, slot.scope, slot.position);
        Ok(slot)
    }

    /// Read the item's slot, lock its scope (plus `also`), and confirm the item
    /// did not change scope while the lock was pending.
    async fn locked_slot<S: OrderedStore>(
        &self,
        store: &mut S,
        id: &S::Id,
        also: Option<&S::Scope>,
    ) -> Result<Slot<S::Scope>, OrderingError> {
        let kind = store.kind();
        let mut slot = store
            .slot_of(id)
            .await?
            .ok_or_else(|| OrderingError::NotFound(format!("{} {:?}", kind, id)))?;

        for _ in 0..self.max_lock_attempts {
            let mut scopes = vec![slot.scope.clone()];
            if let Some(other) = also {
                if *other != slot.scope {
                    scopes.push(other.clone());
                }
            }
            store.lock_scopes(&scopes).await?;

            let current = store
                .slot_of(id)
                .await?
                .ok_or_else(|| OrderingError::NotFound(format!("{} {:?}", kind, id)))?;
            if current.scope == slot.scope {
                return Ok(current);
            }
            tracing::warn!("{} {:?} changed scope while waiting for a lock, retrying", kind, id);
            slot = current;
        }

        Err(OrderingError::Conflict(format!(
            "{} {:?} kept moving between scopes",
            kind, id
        )))
    }

    fn settle(&self, requested: i32, max: i32) -> i32 {
        match self.policy {
            GapPolicy::Clamp => requested.min(max.max(0)),
            GapPolicy::Allow => requested,
        }
    }
}

fn ensure_non_negative(position: i32) -> Result<(), OrderingError> {
    if position < 0 {
        return Err(OrderingError::InvalidPosition(position));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    type Store = MemoryOrderedStore<&'static str, &'static str>;

    fn board(names: &[&'static str]) -> Store {
        let mut store = Store::new("column");
        store.add_scope("board");
        for (i, name) in names.iter().enumerate() {
            store.put(name, "board", i as i32);
        }
        store
    }

    fn names(store: &Store, scope: &'static str) -> Vec<&'static str> {
        store.ordered(&scope).into_iter().map(|(id, _)| id).collect()
    }

    #[tokio::test]
    async fn move_then_delete_keeps_columns_dense() {
        let mut store = board(&["Backlog", "Doing", "Done"]);
        let engine = Reorderer::default();

        engine.move_within(&mut store, &"Doing", 0).await.unwrap();
        assert_eq!(names(&store, "board"), vec!["Doing", "Backlog", "Done"]);
        assert!(store.is_dense(&"board"));

        engine.remove(&mut store, &"Backlog").await.unwrap();
        assert_eq!(store.ordered(&"board"), vec![("Doing", 0), ("Done", 1)]);
    }

    #[tokio::test]
    async fn insert_at_end_leaves_existing_positions_alone() {
        let mut store = board(&["a", "b", "c"]);
        let engine = Reorderer::default();

        let reserved = engine.insert_at(&mut store, &"board", 3).await.unwrap();
        assert_eq!(reserved, 3);
        assert_eq!(store.ordered(&"board"), vec![("a", 0), ("b", 1), ("c", 2)]);
    }

    #[tokio::test]
    async fn insert_in_middle_shifts_tail() {
        let mut store = board(&["a", "b", "c"]);
        let engine = Reorderer::default();

        let reserved = engine.insert_at(&mut store, &"board", 1).await.unwrap();
        store.put("new", "board", reserved);
        assert_eq!(names(&store, "board"), vec!["a", "new", "b", "c"]);
        assert!(store.is_dense(&"board"));
    }

    #[tokio::test]
    async fn insert_past_end_clamps_by_default() {
        let mut store = board(&["a", "b"]);
        let reserved = Reorderer::default().insert_at(&mut store, &"board", 10).await.unwrap();
        assert_eq!(reserved, 2);
    }

    #[tokio::test]
    async fn insert_past_end_leaves_gap_when_allowed() {
        let mut store = board(&["a", "b"]);
        let engine = Reorderer::new(GapPolicy::Allow);
        let reserved = engine.insert_at(&mut store, &"board", 10).await.unwrap();
        store.put("far", "board", reserved);
        assert_eq!(reserved, 10);
        assert!(!store.is_dense(&"board"));
    }

    #[tokio::test]
    async fn insert_into_gap_shifts_the_item_already_there() {
        let mut store = board(&["a"]);
        let engine = Reorderer::new(GapPolicy::Allow);

        let far = engine.insert_at(&mut store, &"board", 5).await.unwrap();
        store.put("far", "board", far);
        let again = engine.insert_at(&mut store, &"board", 5).await.unwrap();
        store.put("new", "board", again);

        assert_eq!(store.ordered(&"board"), vec![("a", 0), ("new", 5), ("far", 6)]);
        assert!(store.has_unique_positions(&"board"));
    }

    #[tokio::test]
    async fn move_to_same_position_is_noop() {
        let mut store = board(&["a", "b", "c"]);
        let before = store.ordered(&"board");

        let slot = Reorderer::default().move_within(&mut store, &"b", 1).await.unwrap();
        assert_eq!(slot, Slot::new("board", 1));
        assert_eq!(store.ordered(&"board"), before);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn move_forward_only_touches_the_rotated_range() {
        let mut store = board(&["a", "b", "c", "d", "e"]);
        Reorderer::default().move_within(&mut store, &"b", 3).await.unwrap();

        assert_eq!(names(&store, "board"), vec!["a", "c", "d", "b", "e"]);
        // two siblings shifted plus the moved item itself
        assert_eq!(store.writes(), 3);
    }

    #[tokio::test]
    async fn move_backward_rotates_range_up() {
        let mut store = board(&["a", "b", "c", "d", "e"]);
        Reorderer::default().move_within(&mut store, &"d", 1).await.unwrap();
        assert_eq!(names(&store, "board"), vec!["a", "d", "b", "c", "e"]);
        assert!(store.is_dense(&"board"));
    }

    #[tokio::test]
    async fn move_across_round_trip_restores_both_scopes() {
        let mut store = board(&["a", "b", "x", "c"]);
        store.add_scope("other");
        store.put("p", "other", 0);
        store.put("q", "other", 1);
        let engine = Reorderer::default();

        let original_board = store.ordered(&"board");
        let original_other = store.ordered(&"other");

        let moved = engine.move_across(&mut store, &"x", &"other", 0).await.unwrap();
        assert_eq!(moved, Slot::new("other", 0));
        assert_eq!(names(&store, "board"), vec!["a", "b", "c"]);
        assert_eq!(names(&store, "other"), vec!["x", "p", "q"]);
        assert!(store.is_dense(&"board"));
        assert!(store.is_dense(&"other"));

        engine.move_across(&mut store, &"x", &"board", 2).await.unwrap();
        assert_eq!(store.ordered(&"board"), original_board);
        assert_eq!(store.ordered(&"other"), original_other);
    }

    #[tokio::test]
    async fn move_across_to_same_scope_behaves_like_move_within() {
        let mut store = board(&["a", "b", "c"]);
        Reorderer::default().move_across(&mut store, &"a", &"board", 2).await.unwrap();
        assert_eq!(names(&store, "board"), vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn move_or_append_goes_to_end_of_new_scope() {
        let mut store = board(&["a", "b"]);
        store.add_scope("other");
        store.put("p", "other", 0);
        let engine = Reorderer::default();

        let same = engine.move_or_append(&mut store, &"a", &"board", None).await.unwrap();
        assert_eq!(same, Slot::new("board", 0));
        assert_eq!(store.writes(), 0);

        let moved = engine.move_or_append(&mut store, &"a", &"other", None).await.unwrap();
        assert_eq!(moved, Slot::new("other", 1));
        assert_eq!(names(&store, "other"), vec!["p", "a"]);
        assert_eq!(store.ordered(&"board"), vec![("b", 0)]);
    }

    #[tokio::test]
    async fn unknown_references_are_not_found() {
        let mut store = board(&["a"]);
        let engine = Reorderer::default();

        let err = engine.move_within(&mut store, &"ghost", 0).await.unwrap_err();
        assert!(matches!(err, OrderingError::NotFound(_)));

        let err = engine.move_across(&mut store, &"a", &"nowhere", 0).await.unwrap_err();
        assert!(matches!(err, OrderingError::NotFound(_)));

        let err = engine.insert_at(&mut store, &"nowhere", 0).await.unwrap_err();
        assert!(matches!(err, OrderingError::NotFound(_)));
    }

    #[tokio::test]
    async fn negative_positions_are_rejected() {
        let mut store = board(&["a"]);
        let err = Reorderer::default().insert_at(&mut store, &"board", -1).await.unwrap_err();
        assert!(matches!(err, OrderingError::InvalidPosition(-1)));
    }

    #[test]
    fn parses_gap_policy() {
        assert_eq!("clamp".parse::<GapPolicy>(), Ok(GapPolicy::Clamp));
        assert_eq!(" Allow ".parse::<GapPolicy>(), Ok(GapPolicy::Allow));
        assert!("sometimes".parse::<GapPolicy>().is_err());
    }

    #[test]
    fn position_range_bounds_are_inclusive() {
        let range = PositionRange::between(2, 4);
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));
        assert!(PositionRange::starting_at(3).contains(i32::MAX));
    }

    /// Runs `on_lock` against the wrapped store every time a scope lock is
    /// taken, standing in for a writer that commits while the lock is pending.
    struct Interfering {
        inner: Store,
        on_lock: Box<dyn FnMut(&mut Store) + Send>,
    }

    #[async_trait]
    impl OrderedStore for Interfering {
        type Id = &'static str;
        type Scope = &'static str;

        fn kind(&self) -> &'static str {
            self.inner.kind()
        }

        async fn slot_of(&mut self, id: &Self::Id) -> Result<Option<Slot<Self::Scope>>, OrderingError> {
            self.inner.slot_of(id).await
        }

        async fn scope_exists(&mut self, scope: &Self::Scope) -> Result<bool, OrderingError> {
            self.inner.scope_exists(scope).await
        }

        async fn len(&mut self, scope: &Self::Scope) -> Result<i32, OrderingError> {
            self.inner.len(scope).await
        }

        async fn shift(&mut self, scope: &Self::Scope, range: PositionRange, delta: i32) -> Result<u64, OrderingError> {
            self.inner.shift(scope, range, delta).await
        }

        async fn place(&mut self, id: &Self::Id, slot: &Slot<Self::Scope>) -> Result<(), OrderingError> {
            self.inner.place(id, slot).await
        }

        async fn delete(&mut self, id: &Self::Id) -> Result<(), OrderingError> {
            self.inner.delete(id).await
        }

        async fn lock_scopes(&mut self, _scopes: &[Self::Scope]) -> Result<(), OrderingError> {
            (self.on_lock)(&mut self.inner);
            Ok(())
        }
    }

    fn two_boards() -> Store {
        let mut store = board(&["a", "b"]);
        store.add_scope("other");
        store.put("p", "other", 0);
        store
    }

    #[tokio::test]
    async fn item_moved_during_lock_wait_is_reread_once() {
        let mut moved_once = false;
        let mut store = Interfering {
            inner: two_boards(),
            on_lock: Box::new(move |inner| {
                if !moved_once {
                    moved_once = true;
                    inner.put("a", "other", 1);
                }
            }),
        };

        let slot = Reorderer::default().move_within(&mut store, &"a", 0).await.unwrap();
        assert_eq!(slot.scope, "other");
        assert_eq!(store.inner.ordered(&"other"), vec![("a", 0), ("p", 1)]);
    }

    #[tokio::test]
    async fn item_that_keeps_moving_is_a_conflict() {
        let mut store = Interfering {
            inner: two_boards(),
            on_lock: Box::new(|inner| {
                let next = match inner.get(&"a").map(|slot| slot.scope) {
                    Some("board") => "other",
                    _ => "board",
                };
                inner.put("a", next, 9);
            }),
        };

        let engine = Reorderer::default().with_max_lock_attempts(3);
        let err = engine.move_across(&mut store, &"a", &"other", 0).await.unwrap_err();
        assert!(matches!(err, OrderingError::Conflict(_)));
    }

    #[tokio::test]
    async fn append_point_is_read_after_locking_the_target() {
        let mut appended = false;
        let mut store = Interfering {
            inner: two_boards(),
            on_lock: Box::new(move |inner| {
                if !appended {
                    appended = true;
                    inner.put("late", "other", 1);
                }
            }),
        };

        let slot = Reorderer::default()
            .move_or_append(&mut store, &"a", &"other", None)
            .await
            .unwrap();
        assert_eq!(slot, Slot::new("other", 2));
        assert_eq!(names(&store.inner, "other"), vec!["p", "late", "a"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert { scope: usize, position: i32 },
        Move { item: usize, scope: usize, position: i32 },
        Remove { item: usize },
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 0..8i32).prop_map(|(scope, position)| Op::Insert { scope, position }),
            (0..32usize, 0..3usize, 0..8i32)
                .prop_map(|(item, scope, position)| Op::Move { item, scope, position }),
            (0..32usize).prop_map(|item| Op::Remove { item }),
        ]
    }

    /// Apply `ops` to three scopes, calling `check` on the store after each step
    async fn replay(policy: GapPolicy, ops: Vec<Op>, check: impl Fn(&MemoryOrderedStore<u32, u32>, u32)) {
        let scopes = [0u32, 1, 2];
        let mut store: MemoryOrderedStore<u32, u32> = MemoryOrderedStore::new("item");
        for scope in scopes {
            store.add_scope(scope);
        }
        let engine = Reorderer::new(policy);
        let mut live: Vec<u32> = Vec::new();
        let mut next_id = 0u32;

        for op in ops {
            match op {
                Op::Insert { scope, position } => {
                    let reserved = engine.insert_at(&mut store, &scopes[scope], position).await.unwrap();
                    store.put(next_id, scopes[scope], reserved);
                    live.push(next_id);
                    next_id += 1;
                }
                Op::Move { item, scope, position } if !live.is_empty() => {
                    let id = live[item % live.len()];
                    engine.move_across(&mut store, &id, &scopes[scope], position).await.unwrap();
                }
                Op::Remove { item } if !live.is_empty() => {
                    let id = live.remove(item % live.len());
                    engine.remove(&mut store, &id).await.unwrap();
                }
                _ => {}
            }
            for scope in scopes {
                check(&store, scope);
            }
        }
    }

    fn block_on(future: impl std::future::Future<Output = ()>) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(future);
    }

    proptest! {
        #[test]
        fn random_sequences_keep_every_scope_dense(ops in prop::collection::vec(arb_op(), 1..60)) {
            block_on(replay(GapPolicy::Clamp, ops, |store, scope| {
                assert!(store.is_dense(&scope), "scope {} lost density: {:?}", scope, store.ordered(&scope));
            }));
        }

        #[test]
        fn gapped_sequences_never_share_a_position(ops in prop::collection::vec(arb_op(), 1..60)) {
            block_on(replay(GapPolicy::Allow, ops, |store, scope| {
                assert!(
                    store.has_unique_positions(&scope),
                    "scope {} has duplicates: {:?}",
                    scope,
                    store.ordered(&scope)
                );
            }));
        }
    }
}
