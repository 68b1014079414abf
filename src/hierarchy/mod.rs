//! Department tree maintenance.
//!
//! Departments form a forest through `parent_id`. Each node stores its
//! `level` (depth from its root) so reads never walk the tree; the manager
//! keeps that materialized value correct when nodes are created or moved, and
//! refuses moves that would make a node its own ancestor. Sibling order uses
//! the shared reorder engine with the parent id (or `None` for roots) as scope.

pub mod memory;
pub mod postgres;
pub mod tree;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ordering::{OrderedStore, OrderingError, Reorderer};

pub use memory::MemoryDepartmentStore;
pub use postgres::{DepartmentDetails, PgDepartmentStore};
pub use tree::{build_tree, TreeItem, TreeNode};

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Conflicting state: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<OrderingError> for HierarchyError {
    fn from(err: OrderingError) -> Self {
        match err {
            OrderingError::NotFound(what) => HierarchyError::NotFound(what),
            OrderingError::InvalidPosition(position) => {
                HierarchyError::InvalidMove(format!("position {} is negative", position))
            }
            OrderingError::Conflict(msg) => HierarchyError::Conflict(msg),
            OrderingError::Database(e) => HierarchyError::Database(e),
        }
    }
}

/// Structural fields of a department
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentNode {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub level: i32,
    pub position: i32,
}

/// Storage the hierarchy manager runs against. Sibling positions come from
/// the [`OrderedStore`] supertrait, scoped by parent id.
#[async_trait]
pub trait DepartmentStore: OrderedStore<Id = Uuid, Scope = Option<Uuid>> {
    /// Non-structural payload written alongside a new node
    type Details: Send + Sync;

    async fn node(&mut self, id: Uuid) -> Result<Option<DepartmentNode>, HierarchyError>;

    async fn child_ids(&mut self, id: Uuid) -> Result<Vec<Uuid>, HierarchyError>;

    async fn insert_node(&mut self, node: &DepartmentNode, details: &Self::Details) -> Result<(), HierarchyError>;

    async fn set_level(&mut self, id: Uuid, level: i32) -> Result<(), HierarchyError>;

    async fn member_count(&mut self, id: Uuid) -> Result<i64, HierarchyError>;

    async fn user_exists(&mut self, user: Uuid) -> Result<bool, HierarchyError>;

    /// Users currently flagged as head of the department
    async fn head_ids(&mut self, department: Uuid) -> Result<Vec<Uuid>, HierarchyError>;

    /// Clear the head flag of whoever heads the department. Returns how many rows changed.
    async fn clear_head(&mut self, department: Uuid) -> Result<u64, HierarchyError>;

    /// Flag the user as head and manager of the department and move them into it
    async fn assign_head(&mut self, department: Uuid, user: Uuid) -> Result<(), HierarchyError>;

    /// Serialize structural changes to the whole tree for the rest of the transaction
    async fn lock_tree(&mut self) -> Result<(), HierarchyError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyManager {
    reorderer: Reorderer,
}

impl HierarchyManager {
    pub fn new(reorderer: Reorderer) -> Self {
        Self { reorderer }
    }

    /// Create a node under `parent_id` (or as a root). With a position, later
    /// siblings shift up; without one the node is appended.
    pub async fn create<S: DepartmentStore>(
        &self,
        store: &mut S,
        parent_id: Option<Uuid>,
        position: Option<i32>,
        details: &S::Details,
    ) -> Result<DepartmentNode, HierarchyError> {
        store.lock_tree().await?;
        let level = self.level_under(store, parent_id).await?;
        let position = self
            .reorderer
            .insert_or_append(store, &parent_id, position)
            .await?;

        let node = DepartmentNode {
            id: Uuid::new_v4(),
            parent_id,
            level,
            position,
        };
        store.insert_node(&node, details).await?;
        tracing::info!("Created department {} at level {} position {}", node.id, level, position);
        Ok(node)
    }

    /// Re-parent a node and recompute the level of its whole subtree.
    ///
    /// Without a position the node keeps its place when the parent is
    /// unchanged and is appended otherwise.
    pub async fn move_node<S: DepartmentStore>(
        &self,
        store: &mut S,
        id: Uuid,
        new_parent_id: Option<Uuid>,
        new_position: Option<i32>,
    ) -> Result<DepartmentNode, HierarchyError> {
        store.lock_tree().await?;
        let node = store
            .node(id)
            .await?
            .ok_or_else(|| HierarchyError::NotFound(format!("Department {}", id)))?;

        if let Some(parent) = new_parent_id {
            if parent == id {
                return Err(HierarchyError::InvalidMove(
                    "a department cannot be its own parent".to_string(),
                ));
            }
            if self.is_descendant(store, id, parent).await? {
                return Err(HierarchyError::InvalidMove(format!(
                    "department {} is a descendant of {}",
                    parent, id
                )));
            }
        }

        let level = self.level_under(store, new_parent_id).await?;
        let target = match new_position {
            Some(position) => position,
            None if node.parent_id == new_parent_id => node.position,
            None => store.len(&new_parent_id).await?,
        };

        let slot = self
            .reorderer
            .move_across(store, &id, &new_parent_id, target)
            .await?;
        store.set_level(id, level).await?;
        let cascaded = self.recalculate_levels(store, id).await?;

        tracing::info!(
            "Moved department {} under {:?} at position {} (level {}, {} descendants updated)",
            id,
            new_parent_id,
            slot.position,
            level,
            cascaded
        );

        Ok(DepartmentNode {
            id,
            parent_id: slot.scope,
            level,
            position: slot.position,
        })
    }

    /// True when `candidate` sits somewhere below `ancestor`
    pub async fn is_descendant<S: DepartmentStore>(
        &self,
        store: &mut S,
        ancestor: Uuid,
        candidate: Uuid,
    ) -> Result<bool, HierarchyError> {
        let mut stack = store.child_ids(ancestor).await?;
        let mut seen = HashSet::from([ancestor]);

        while let Some(current) = stack.pop() {
            if current == candidate {
                return Ok(true);
            }
            if !seen.insert(current) {
                continue;
            }
            stack.extend(store.child_ids(current).await?);
        }
        Ok(false)
    }

    /// Walk the subtree below `root` top-down, setting every level to its
    /// parent's plus one. Returns the number of descendants written.
    pub async fn recalculate_levels<S: DepartmentStore>(
        &self,
        store: &mut S,
        root: Uuid,
    ) -> Result<u64, HierarchyError> {
        let root = store
            .node(root)
            .await?
            .ok_or_else(|| HierarchyError::NotFound(format!("Department {}", root)))?;

        let mut work = vec![(root.id, root.level)];
        let mut seen = HashSet::from([root.id]);
        let mut updated = 0;

        while let Some((id, level)) = work.pop() {
            for child in store.child_ids(id).await? {
                if !seen.insert(child) {
                    continue;
                }
                store.set_level(child, level + 1).await?;
                updated += 1;
                work.push((child, level + 1));
            }
        }
        Ok(updated)
    }

    /// Make `user` the single head of `department`, clearing any previous head first
    pub async fn set_head<S: DepartmentStore>(
        &self,
        store: &mut S,
        department: Uuid,
        user: Uuid,
    ) -> Result<(), HierarchyError> {
        if store.node(department).await?.is_none() {
            return Err(HierarchyError::NotFound(format!("Department {}", department)));
        }
        if !store.user_exists(user).await? {
            return Err(HierarchyError::NotFound(format!("User {}", user)));
        }

        let cleared = store.clear_head(department).await?;
        store.assign_head(department, user).await?;
        tracing::info!("User {} is now head of department {} ({} previous head cleared)", user, department, cleared);
        Ok(())
    }

    pub async fn current_head<S: DepartmentStore>(
        &self,
        store: &mut S,
        department: Uuid,
    ) -> Result<Option<Uuid>, HierarchyError> {
        let heads = store.head_ids(department).await?;
        match heads.as_slice() {
            [] => Ok(None),
            [head] => Ok(Some(*head)),
            _ => Err(HierarchyError::Conflict(format!(
                "department {} has {} heads",
                department,
                heads.len()
            ))),
        }
    }

    /// Delete a leaf department with no members and compact its siblings
    pub async fn remove<S: DepartmentStore>(&self, store: &mut S, id: Uuid) -> Result<(), HierarchyError> {
        store.lock_tree().await?;
        if store.node(id).await?.is_none() {
            return Err(HierarchyError::NotFound(format!("Department {}", id)));
        }
        if !store.child_ids(id).await?.is_empty() {
            return Err(HierarchyError::PreconditionFailed(
                "department still has sub-departments; move or remove them first".to_string(),
            ));
        }
        if store.member_count(id).await? > 0 {
            return Err(HierarchyError::PreconditionFailed(
                "department still has members; move or remove them first".to_string(),
            ));
        }

        self.reorderer.remove(store, &id).await?;
        tracing::info!("Removed department {}", id);
        Ok(())
    }

    async fn level_under<S: DepartmentStore>(
        &self,
        store: &mut S,
        parent_id: Option<Uuid>,
    ) -> Result<i32, HierarchyError> {
        match parent_id {
            None => Ok(0),
            Some(parent) => store
                .node(parent)
                .await?
                .map(|p| p.level + 1)
                .ok_or_else(|| HierarchyError::NotFound(format!("Parent department {}", parent))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tree {
        store: MemoryDepartmentStore,
        manager: HierarchyManager,
    }

    impl Tree {
        fn new() -> Self {
            Self {
                store: MemoryDepartmentStore::new(),
                manager: HierarchyManager::default(),
            }
        }

        async fn add(&mut self, parent: Option<Uuid>) -> DepartmentNode {
            self.manager.create(&mut self.store, parent, None, &()).await.unwrap()
        }

        fn level(&self, id: Uuid) -> i32 {
            self.store.get(id).unwrap().level
        }
    }

    #[tokio::test]
    async fn create_computes_level_from_parent() {
        let mut tree = Tree::new();
        let root = tree.add(None).await;
        let a = tree.add(Some(root.id)).await;
        let b = tree.add(Some(a.id)).await;

        assert_eq!((root.level, a.level, b.level), (0, 1, 2));
        assert_eq!(root.position, 0);
    }

    #[tokio::test]
    async fn create_under_missing_parent_is_not_found() {
        let mut tree = Tree::new();
        let err = tree
            .manager
            .create(&mut tree.store, Some(Uuid::new_v4()), None, &())
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_at_position_shifts_siblings() {
        let mut tree = Tree::new();
        let root = tree.add(None).await;
        let first = tree.add(Some(root.id)).await;
        let second = tree.add(Some(root.id)).await;

        let wedged = tree.manager.create(&mut tree.store, Some(root.id), Some(0), &()).await.unwrap();

        assert_eq!(wedged.position, 0);
        assert_eq!(tree.store.get(first.id).unwrap().position, 1);
        assert_eq!(tree.store.get(second.id).unwrap().position, 2);
    }

    #[tokio::test]
    async fn move_rejects_cycles() {
        let mut tree = Tree::new();
        let root = tree.add(None).await;
        let a = tree.add(Some(root.id)).await;
        let b = tree.add(Some(a.id)).await;

        let err = tree.manager.move_node(&mut tree.store, a.id, Some(b.id), None).await.unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidMove(_)));

        let err = tree.manager.move_node(&mut tree.store, a.id, Some(a.id), None).await.unwrap_err();
        assert!(matches!(err, HierarchyError::InvalidMove(_)));

        // nothing changed
        assert_eq!(tree.store.get(a.id).unwrap().parent_id, Some(root.id));
        assert_eq!(tree.level(b.id), 2);
    }

    #[tokio::test]
    async fn moving_to_root_cascades_levels() {
        let mut tree = Tree::new();
        let root = tree.add(None).await;
        let a = tree.add(Some(root.id)).await;
        let b = tree.add(Some(a.id)).await;

        let moved = tree.manager.move_node(&mut tree.store, a.id, None, None).await.unwrap();

        assert_eq!(moved.level, 0);
        assert_eq!(moved.parent_id, None);
        assert_eq!(moved.position, 1);
        assert_eq!(tree.level(a.id), 0);
        assert_eq!(tree.level(b.id), 1);
        assert_eq!(tree.level(root.id), 0);
    }

    #[tokio::test]
    async fn moving_deeper_cascades_whole_subtree() {
        let mut tree = Tree::new();
        let left = tree.add(None).await;
        let right = tree.add(None).await;
        let child = tree.add(Some(right.id)).await;
        let grandchild = tree.add(Some(child.id)).await;
        let deeper = tree.add(Some(left.id)).await;

        tree.manager.move_node(&mut tree.store, right.id, Some(deeper.id), Some(0)).await.unwrap();

        assert_eq!(tree.level(right.id), 2);
        assert_eq!(tree.level(child.id), 3);
        assert_eq!(tree.level(grandchild.id), 4);
        // the old root scope was compacted
        assert_eq!(tree.store.get(left.id).unwrap().position, 0);
    }

    #[tokio::test]
    async fn move_keeps_sibling_positions_dense() {
        let mut tree = Tree::new();
        let root = tree.add(None).await;
        let a = tree.add(Some(root.id)).await;
        let b = tree.add(Some(root.id)).await;
        let c = tree.add(Some(root.id)).await;
        let other = tree.add(None).await;

        tree.manager.move_node(&mut tree.store, a.id, Some(other.id), None).await.unwrap();
        assert_eq!(tree.store.get(b.id).unwrap().position, 0);
        assert_eq!(tree.store.get(c.id).unwrap().position, 1);
        assert_eq!(tree.store.get(a.id).unwrap().position, 0);

        tree.manager.move_node(&mut tree.store, c.id, Some(root.id), Some(0)).await.unwrap();
        assert_eq!(tree.store.get(c.id).unwrap().position, 0);
        assert_eq!(tree.store.get(b.id).unwrap().position, 1);
    }

    #[tokio::test]
    async fn set_head_replaces_previous_head() {
        let mut tree = Tree::new();
        let dept = tree.add(None).await;
        let first = tree.store.add_user();
        let second = tree.store.add_user();

        tree.manager.set_head(&mut tree.store, dept.id, first).await.unwrap();
        tree.manager.set_head(&mut tree.store, dept.id, second).await.unwrap();

        assert_eq!(tree.manager.current_head(&mut tree.store, dept.id).await.unwrap(), Some(second));
        let previous = tree.store.member(first).unwrap();
        assert!(!previous.is_department_head);
        assert_eq!(previous.managed_department_id, None);
        let current = tree.store.member(second).unwrap();
        assert!(current.is_department_head && current.is_manager);
        assert_eq!(current.department_id, Some(dept.id));
    }

    #[tokio::test]
    async fn set_head_for_unknown_user_keeps_previous_head() {
        let mut tree = Tree::new();
        let dept = tree.add(None).await;
        let head = tree.store.add_user();
        tree.manager.set_head(&mut tree.store, dept.id, head).await.unwrap();

        let err = tree.manager.set_head(&mut tree.store, dept.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, HierarchyError::NotFound(_)));
        assert_eq!(tree.manager.current_head(&mut tree.store, dept.id).await.unwrap(), Some(head));
    }

    #[tokio::test]
    async fn department_without_head_reports_none() {
        let mut tree = Tree::new();
        let dept = tree.add(None).await;
        assert_eq!(tree.manager.current_head(&mut tree.store, dept.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_requires_leaf_without_members() {
        let mut tree = Tree::new();
        let root = tree.add(None).await;
        let child = tree.add(Some(root.id)).await;

        let err = tree.manager.remove(&mut tree.store, root.id).await.unwrap_err();
        assert!(matches!(err, HierarchyError::PreconditionFailed(_)));
        assert!(tree.store.get(root.id).is_some());
        assert_eq!(tree.store.get(child.id).unwrap().parent_id, Some(root.id));

        let user = tree.store.add_user();
        tree.store.add_member(user, child.id);
        let err = tree.manager.remove(&mut tree.store, child.id).await.unwrap_err();
        assert!(matches!(err, HierarchyError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn remove_compacts_siblings() {
        let mut tree = Tree::new();
        let a = tree.add(None).await;
        let b = tree.add(None).await;
        let c = tree.add(None).await;

        tree.manager.remove(&mut tree.store, a.id).await.unwrap();

        assert!(tree.store.get(a.id).is_none());
        assert_eq!(tree.store.get(b.id).unwrap().position, 0);
        assert_eq!(tree.store.get(c.id).unwrap().position, 1);
    }

    #[tokio::test]
    async fn is_descendant_walks_every_branch() {
        let mut tree = Tree::new();
        let root = tree.add(None).await;
        let left = tree.add(Some(root.id)).await;
        let right = tree.add(Some(root.id)).await;
        let leaf = tree.add(Some(right.id)).await;

        assert!(tree.manager.is_descendant(&mut tree.store, root.id, leaf.id).await.unwrap());
        assert!(!tree.manager.is_descendant(&mut tree.store, left.id, leaf.id).await.unwrap());
        assert!(!tree.manager.is_descendant(&mut tree.store, leaf.id, root.id).await.unwrap());
    }
}
