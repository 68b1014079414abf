//! In-process department store used by the unit tests and by callers that
//! want to validate a restructuring before committing it.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use super::{DepartmentNode, DepartmentStore, HierarchyError};
use crate::ordering::{OrderedStore, OrderingError, PositionRange, Slot};

/// Department-related flags of one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberRecord {
    pub department_id: Option<Uuid>,
    pub managed_department_id: Option<Uuid>,
    pub is_department_head: bool,
    pub is_manager: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDepartmentStore {
    nodes: HashMap<Uuid, DepartmentNode>,
    users: HashMap<Uuid, MemberRecord>,
}

impl MemoryDepartmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<&DepartmentNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DepartmentNode> {
        self.nodes.values()
    }

    /// Register a user with no department and return its id
    pub fn add_user(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.users.insert(id, MemberRecord::default());
        id
    }

    pub fn add_member(&mut self, user: Uuid, department: Uuid) {
        self.users.entry(user).or_default().department_id = Some(department);
    }

    pub fn member(&self, user: Uuid) -> Option<&MemberRecord> {
        self.users.get(&user)
    }
}

#[async_trait]
impl OrderedStore for MemoryDepartmentStore {
    type Id = Uuid;
    type Scope = Option<Uuid>;

    fn kind(&self) -> &'static str {
        "Department"
    }

    async fn slot_of(&mut self, id: &Uuid) -> Result<Option<Slot<Option<Uuid>>>, OrderingError> {
        Ok(self.nodes.get(id).map(|n| Slot::new(n.parent_id, n.position)))
    }

    async fn scope_exists(&mut self, scope: &Option<Uuid>) -> Result<bool, OrderingError> {
        Ok(scope.map_or(true, |parent| self.nodes.contains_key(&parent)))
    }

    async fn len(&mut self, scope: &Option<Uuid>) -> Result<i32, OrderingError> {
        Ok(self.nodes.values().filter(|n| n.parent_id == *scope).count() as i32)
    }

    async fn shift(&mut self, scope: &Option<Uuid>, range: PositionRange, delta: i32) -> Result<u64, OrderingError> {
        let mut touched = 0;
        for node in self.nodes.values_mut() {
            if node.parent_id == *scope && range.contains(node.position) {
                node.position += delta;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn place(&mut self, id: &Uuid, slot: &Slot<Option<Uuid>>) -> Result<(), OrderingError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| OrderingError::NotFound(format!("Department {}", id)))?;
        node.parent_id = slot.scope;
        node.position = slot.position;
        Ok(())
    }

    async fn delete(&mut self, id: &Uuid) -> Result<(), OrderingError> {
        self.nodes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| OrderingError::NotFound(format!("Department {}", id)))
    }
}

#[async_trait]
impl DepartmentStore for MemoryDepartmentStore {
    type Details = ();

    async fn node(&mut self, id: Uuid) -> Result<Option<DepartmentNode>, HierarchyError> {
        Ok(self.nodes.get(&id).cloned())
    }

    async fn child_ids(&mut self, id: Uuid) -> Result<Vec<Uuid>, HierarchyError> {
        let mut children: Vec<&DepartmentNode> = self.nodes.values().filter(|n| n.parent_id == Some(id)).collect();
        children.sort_by_key(|n| n.position);
        Ok(children.into_iter().map(|n| n.id).collect())
    }

    async fn insert_node(&mut self, node: &DepartmentNode, _details: &()) -> Result<(), HierarchyError> {
        self.nodes.insert(node.id, node.clone());
        Ok(())
    }

    async fn set_level(&mut self, id: Uuid, level: i32) -> Result<(), HierarchyError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| HierarchyError::NotFound(format!("Department {}", id)))?;
        node.level = level;
        Ok(())
    }

    async fn member_count(&mut self, id: Uuid) -> Result<i64, HierarchyError> {
        Ok(self.users.values().filter(|u| u.department_id == Some(id)).count() as i64)
    }

    async fn user_exists(&mut self, user: Uuid) -> Result<bool, HierarchyError> {
        Ok(self.users.contains_key(&user))
    }

    async fn head_ids(&mut self, department: Uuid) -> Result<Vec<Uuid>, HierarchyError> {
        let mut heads: Vec<Uuid> = self
            .users
            .iter()
            .filter(|(_, u)| u.is_department_head && u.managed_department_id == Some(department))
            .map(|(id, _)| *id)
            .collect();
        heads.sort();
        Ok(heads)
    }

    async fn clear_head(&mut self, department: Uuid) -> Result<u64, HierarchyError> {
        let mut cleared = 0;
        for user in self.users.values_mut() {
            if user.is_department_head && user.managed_department_id == Some(department) {
                user.is_department_head = false;
                user.managed_department_id = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn assign_head(&mut self, department: Uuid, user: Uuid) -> Result<(), HierarchyError> {
        let record = self
            .users
            .get_mut(&user)
            .ok_or_else(|| HierarchyError::NotFound(format!("User {}", user)))?;
        record.department_id = Some(department);
        record.managed_department_id = Some(department);
        record.is_department_head = true;
        record.is_manager = true;
        Ok(())
    }
}
