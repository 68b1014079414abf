//! Department store over the `departments` and `users` tables, bound to one transaction.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{DepartmentNode, DepartmentStore, HierarchyError};
use crate::ordering::postgres::lock_keys;
use crate::ordering::{OrderedStore, OrderingError, PositionRange, Slot};

/// Descriptive columns written when a department row is created
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentDetails {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

pub struct PgDepartmentStore<'a, 'c> {
    tx: &'a mut Transaction<'c, Postgres>,
}

impl<'a, 'c> PgDepartmentStore<'a, 'c> {
    pub fn new(tx: &'a mut Transaction<'c, Postgres>) -> Self {
        Self { tx }
    }
}

fn scope_key(scope: &Option<Uuid>) -> String {
    match scope {
        Some(parent) => format!("departments:{}", parent),
        None => "departments:root".to_string(),
    }
}

#[async_trait]
impl<'a, 'c> OrderedStore for PgDepartmentStore<'a, 'c> {
    type Id = Uuid;
    type Scope = Option<Uuid>;

    fn kind(&self) -> &'static str {
        "Department"
    }

    async fn slot_of(&mut self, id: &Uuid) -> Result<Option<Slot<Option<Uuid>>>, OrderingError> {
        let row: Option<(Option<Uuid>, i32)> =
            sqlx::query_as("SELECT parent_id, position FROM departments WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **self.tx)
                .await?;
        Ok(row.map(|(parent, position)| Slot::new(parent, position)))
    }

    async fn scope_exists(&mut self, scope: &Option<Uuid>) -> Result<bool, OrderingError> {
        let Some(parent) = scope else {
            return Ok(true);
        };
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM departments WHERE id = $1)")
            .bind(parent)
            .fetch_one(&mut **self.tx)
            .await?;
        Ok(exists)
    }

    async fn len(&mut self, scope: &Option<Uuid>) -> Result<i32, OrderingError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM departments WHERE parent_id IS NOT DISTINCT FROM $1")
                .bind(scope)
                .fetch_one(&mut **self.tx)
                .await?;
        Ok(i32::try_from(count).unwrap_or(i32::MAX))
    }

    async fn shift(&mut self, scope: &Option<Uuid>, range: PositionRange, delta: i32) -> Result<u64, OrderingError> {
        let result = sqlx::query(
            "UPDATE departments SET position = position + $1, updated_at = NOW() \
             WHERE parent_id IS NOT DISTINCT FROM $2 AND position >= $3 AND ($4::int IS NULL OR position <= $4)",
        )
        .bind(delta)
        .bind(scope)
        .bind(range.start)
        .bind(range.end)
        .execute(&mut **self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn place(&mut self, id: &Uuid, slot: &Slot<Option<Uuid>>) -> Result<(), OrderingError> {
        let result = sqlx::query(
            "UPDATE departments SET parent_id = $2, position = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(slot.scope)
        .bind(slot.position)
        .execute(&mut **self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(OrderingError::NotFound(format!("Department {}", id)));
        }
        Ok(())
    }

    async fn delete(&mut self, id: &Uuid) -> Result<(), OrderingError> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&mut **self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(OrderingError::NotFound(format!("Department {}", id)));
        }
        Ok(())
    }

    async fn lock_scopes(&mut self, scopes: &[Option<Uuid>]) -> Result<(), OrderingError> {
        lock_keys(&mut *self.tx, scopes.iter().map(scope_key).collect()).await?;
        Ok(())
    }
}

#[async_trait]
impl<'a, 'c> DepartmentStore for PgDepartmentStore<'a, 'c> {
    type Details = DepartmentDetails;

    async fn node(&mut self, id: Uuid) -> Result<Option<DepartmentNode>, HierarchyError> {
        let node = sqlx::query_as::<_, DepartmentNode>(
            "SELECT id, parent_id, level, position FROM departments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut **self.tx)
        .await?;
        Ok(node)
    }

    async fn child_ids(&mut self, id: Uuid) -> Result<Vec<Uuid>, HierarchyError> {
        let ids = sqlx::query_scalar("SELECT id FROM departments WHERE parent_id = $1 ORDER BY position")
            .bind(id)
            .fetch_all(&mut **self.tx)
            .await?;
        Ok(ids)
    }

    async fn insert_node(&mut self, node: &DepartmentNode, details: &DepartmentDetails) -> Result<(), HierarchyError> {
        sqlx::query(
            "INSERT INTO departments (id, name, description, color, icon, parent_id, level, position) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(node.id)
        .bind(&details.name)
        .bind(&details.description)
        .bind(&details.color)
        .bind(&details.icon)
        .bind(node.parent_id)
        .bind(node.level)
        .bind(node.position)
        .execute(&mut **self.tx)
        .await?;
        Ok(())
    }

    async fn set_level(&mut self, id: Uuid, level: i32) -> Result<(), HierarchyError> {
        sqlx::query("UPDATE departments SET level = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(level)
            .execute(&mut **self.tx)
            .await?;
        Ok(())
    }

    async fn member_count(&mut self, id: Uuid) -> Result<i64, HierarchyError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE department_id = $1")
            .bind(id)
            .fetch_one(&mut **self.tx)
            .await?;
        Ok(count)
    }

    async fn user_exists(&mut self, user: Uuid) -> Result<bool, HierarchyError> {
        let exists = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user)
            .fetch_one(&mut **self.tx)
            .await?;
        Ok(exists)
    }

    async fn head_ids(&mut self, department: Uuid) -> Result<Vec<Uuid>, HierarchyError> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM users WHERE managed_department_id = $1 AND is_department_head ORDER BY id",
        )
        .bind(department)
        .fetch_all(&mut **self.tx)
        .await?;
        Ok(ids)
    }

    async fn clear_head(&mut self, department: Uuid) -> Result<u64, HierarchyError> {
        let result = sqlx::query(
            "UPDATE users SET is_department_head = FALSE, managed_department_id = NULL, updated_at = NOW() \
             WHERE managed_department_id = $1 AND is_department_head",
        )
        .bind(department)
        .execute(&mut **self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn assign_head(&mut self, department: Uuid, user: Uuid) -> Result<(), HierarchyError> {
        let result = sqlx::query(
            "UPDATE users SET department_id = $1, managed_department_id = $1, \
             is_department_head = TRUE, is_manager = TRUE, updated_at = NOW() WHERE id = $2",
        )
        .bind(department)
        .bind(user)
        .execute(&mut **self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HierarchyError::NotFound(format!("User {}", user)));
        }
        Ok(())
    }

    async fn lock_tree(&mut self) -> Result<(), HierarchyError> {
        lock_keys(&mut *self.tx, vec!["departments:tree".to_string()]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_share_one_lock_key() {
        assert_eq!(scope_key(&None), "departments:root");
        let parent = Uuid::nil();
        assert_eq!(
            scope_key(&Some(parent)),
            "departments:00000000-0000-0000-0000-000000000000"
        );
    }
}
