use std::collections::{HashMap, HashSet};

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{found, violates, ServiceError, UNIQUE_VIOLATION};
use crate::api::roles::{AssignRole, CreateRole, UpdateRole};
use crate::auth::{PermissionGrant, DEFAULT_ROLES};
use crate::database::models::{Role, RoleDetail, ROLE_COLUMNS};

/// Roles and their permission grants.
///
/// Seeded roles are marked as system roles and cannot be edited or removed
/// through the API.
pub struct RoleService {
    pool: PgPool,
}

impl RoleService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, dto: CreateRole) -> Result<RoleDetail, ServiceError> {
        let name = dto.name.trim();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING {}",
            ROLE_COLUMNS
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(name)
            .bind(&dto.description)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| duplicate_name(e, name))?;
        let permissions = replace_grants(&mut tx, role.id, &dto.permissions).await?;

        tx.commit().await?;
        tracing::info!("Created role {} ({}) with {} grants", role.id, role.name, permissions.len());
        Ok(RoleDetail {
            role,
            permissions,
            user_count: 0,
        })
    }

    /// Newest role first
    pub async fn list(&self) -> Result<Vec<RoleDetail>, ServiceError> {
        let sql = format!("SELECT {} FROM roles ORDER BY created_at DESC", ROLE_COLUMNS);
        let roles = sqlx::query_as::<_, Role>(&sql).fetch_all(&self.pool).await?;

        let mut grants = load_grants(&self.pool, None).await?;
        let counts: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT role_id, COUNT(*) FROM users WHERE role_id IS NOT NULL GROUP BY role_id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        Ok(roles
            .into_iter()
            .map(|role| RoleDetail {
                permissions: grants.remove(&role.id).unwrap_or_default(),
                user_count: counts.get(&role.id).copied().unwrap_or(0),
                role,
            })
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<RoleDetail, ServiceError> {
        let role = self.fetch(id).await?;
        let permissions = load_grants(&self.pool, Some(id))
            .await?
            .remove(&id)
            .unwrap_or_default();
        let user_count = self.user_count(id).await?;
        Ok(RoleDetail {
            role,
            permissions,
            user_count,
        })
    }

    /// `permissions`, when given, replaces every grant of the role
    pub async fn update(&self, id: Uuid, dto: UpdateRole) -> Result<RoleDetail, ServiceError> {
        let existing = self.fetch(id).await?;
        ensure_editable(&existing)?;

        let name = dto.name.as_deref().map(str::trim);
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE roles SET name = COALESCE($2, name), description = COALESCE($3, description), \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            ROLE_COLUMNS
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .bind(name)
            .bind(&dto.description)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| duplicate_name(e, name.unwrap_or(&existing.name)))?;
        if let Some(grants) = &dto.permissions {
            replace_grants(&mut tx, id, grants).await?;
        }
        tx.commit().await?;

        tracing::info!("Updated role {} ({})", role.id, role.name);
        self.get(id).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let role = self.fetch(id).await?;
        ensure_editable(&role)?;

        let holders = self.user_count(id).await?;
        if holders > 0 {
            return Err(ServiceError::BadRequest(format!(
                "Role {} is still assigned to {} user(s); reassign them first",
                role.name, holders
            )));
        }

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::info!("Deleted role {} ({})", id, role.name);
        Ok(())
    }

    pub async fn assign(&self, dto: AssignRole) -> Result<(), ServiceError> {
        self.fetch(dto.role_id).await?;
        let result = sqlx::query("UPDATE users SET role_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(dto.user_id)
            .bind(dto.role_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("User", dto.user_id));
        }
        tracing::info!("Assigned role {} to user {}", dto.role_id, dto.user_id);
        Ok(())
    }

    /// Grants of the user's role, conditions included. Empty without a role.
    pub async fn permissions_of(&self, user_id: Uuid) -> Result<Vec<PermissionGrant>, ServiceError> {
        let role_id: Option<Option<Uuid>> = sqlx::query_scalar("SELECT role_id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match found(role_id, "User", user_id)? {
            Some(role_id) => Ok(load_grants(&self.pool, Some(role_id))
                .await?
                .remove(&role_id)
                .unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Create the built-in roles that do not exist yet; returns how many were created
    pub async fn create_defaults(&self) -> Result<usize, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut created = 0;
        for template in &DEFAULT_ROLES {
            let id: Option<Uuid> = sqlx::query_scalar(
                "INSERT INTO roles (name, description, is_system) VALUES ($1, $2, TRUE) \
                 ON CONFLICT (name) DO NOTHING RETURNING id",
            )
            .bind(template.name)
            .bind(template.description)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(id) = id {
                let grants: Vec<PermissionGrant> = template.grants.iter().copied().map(Into::into).collect();
                replace_grants(&mut tx, id, &grants).await?;
                created += 1;
            }
        }
        tx.commit().await?;
        tracing::info!("Default roles: {} created", created);
        Ok(created)
    }

    /// Look up a role by name, for the bootstrap command
    pub async fn find_by_name(&self, name: &str) -> Result<Role, ServiceError> {
        let sql = format!("SELECT {} FROM roles WHERE name = $1", ROLE_COLUMNS);
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        found(role, "Role", name)
    }

    async fn fetch(&self, id: Uuid) -> Result<Role, ServiceError> {
        let sql = format!("SELECT {} FROM roles WHERE id = $1", ROLE_COLUMNS);
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(role, "Role", id)
    }

    async fn user_count(&self, id: Uuid) -> Result<i64, ServiceError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn ensure_editable(role: &Role) -> Result<(), ServiceError> {
    if role.is_system {
        return Err(ServiceError::Forbidden(format!("Role {} is a system role", role.name)));
    }
    Ok(())
}

fn duplicate_name(err: sqlx::Error, name: &str) -> ServiceError {
    if violates(&err, UNIQUE_VIOLATION) {
        return ServiceError::Conflict(format!("A role named \"{}\" already exists", name));
    }
    err.into()
}

/// Repeated `(action, resource)` pairs keep their first occurrence
fn distinct_grants(grants: &[PermissionGrant]) -> Vec<PermissionGrant> {
    let mut seen = HashSet::new();
    grants
        .iter()
        .filter(|grant| seen.insert(grant.permission()))
        .cloned()
        .collect()
}

async fn replace_grants(
    tx: &mut Transaction<'_, Postgres>,
    role_id: Uuid,
    grants: &[PermissionGrant],
) -> Result<Vec<PermissionGrant>, ServiceError> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;

    let grants = distinct_grants(grants);
    for grant in &grants {
        sqlx::query("INSERT INTO role_permissions (role_id, action, resource, conditions) VALUES ($1, $2, $3, $4)")
            .bind(role_id)
            .bind(grant.action.as_str())
            .bind(grant.resource.as_str())
            .bind(&grant.conditions)
            .execute(&mut **tx)
            .await?;
    }
    Ok(grants)
}

/// Grants keyed by role, for one role or all of them. Rows with an unknown
/// action or resource are skipped with a warning.
async fn load_grants(pool: &PgPool, role_id: Option<Uuid>) -> Result<HashMap<Uuid, Vec<PermissionGrant>>, ServiceError> {
    let rows: Vec<(Uuid, String, String, Option<serde_json::Value>)> = sqlx::query_as(
        "SELECT role_id, action, resource, conditions FROM role_permissions \
         WHERE $1::uuid IS NULL OR role_id = $1 ORDER BY role_id, action, resource",
    )
    .bind(role_id)
    .fetch_all(pool)
    .await?;

    let mut grants: HashMap<Uuid, Vec<PermissionGrant>> = HashMap::new();
    for (role, action, resource, conditions) in rows {
        let Ok(action) = action.parse() else {
            tracing::warn!("Ignoring permission row of role {}: unknown action {}", role, action);
            continue;
        };
        let Ok(resource) = resource.parse() else {
            tracing::warn!("Ignoring permission row of role {}: unknown resource {}", role, resource);
            continue;
        };
        grants.entry(role).or_default().push(PermissionGrant {
            action,
            resource,
            conditions,
        });
    }
    Ok(grants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{PermissionAction, PermissionResource};
    use chrono::Utc;
    use serde_json::json;

    fn grant(action: PermissionAction, resource: PermissionResource) -> PermissionGrant {
        PermissionGrant {
            action,
            resource,
            conditions: None,
        }
    }

    #[test]
    fn repeated_grants_collapse_to_the_first() {
        let mut scoped = grant(PermissionAction::Read, PermissionResource::Users);
        scoped.conditions = Some(json!({"department": "own"}));
        let grants = vec![
            scoped.clone(),
            grant(PermissionAction::Update, PermissionResource::Users),
            grant(PermissionAction::Read, PermissionResource::Users),
        ];

        let distinct = distinct_grants(&grants);
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0], scoped);
    }

    #[test]
    fn system_roles_are_read_only() {
        let now = Utc::now();
        let mut role = Role {
            id: Uuid::new_v4(),
            name: "Super Admin".into(),
            description: None,
            is_system: true,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(ensure_editable(&role), Err(ServiceError::Forbidden(_))));
        role.is_system = false;
        assert!(ensure_editable(&role).is_ok());
    }
}
