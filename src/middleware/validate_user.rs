use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::auth::{check_permission, Permission, PermissionAction, PermissionResource};
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;

/// Shared pool, injected so handlers do not reach for the singleton themselves
#[derive(Clone)]
pub struct DbPool(pub PgPool);

/// Active user behind the token, with the permissions of their role
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub permissions: Vec<Permission>,
}

impl CurrentUser {
    pub fn can(&self, action: PermissionAction, resource: PermissionResource) -> bool {
        check_permission(&self.permissions, action, resource)
    }

    /// Forbidden unless the role grants `action` on `resource`
    pub fn require(&self, action: PermissionAction, resource: PermissionResource) -> Result<(), ApiError> {
        if self.can(action, resource) {
            return Ok(());
        }
        tracing::warn!("User {} lacks {} on {}", self.email, action, resource);
        Err(ApiError::forbidden(format!(
            "Missing permission {} on {}",
            action, resource
        )))
    }
}

/// Middleware that checks the token's user still exists and is active, then
/// loads their role permissions
pub async fn validate_user_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?;

    let pool = DatabaseManager::pool().await?;

    let row = sqlx::query("SELECT id, email, is_active, role_id FROM users WHERE id = $1")
        .bind(auth_user.id)
        .fetch_optional(&pool)
        .await?;

    let row = row.ok_or_else(|| {
        tracing::warn!("User validation failed: user {} ({}) not found", auth_user.email, auth_user.id);
        ApiError::unauthorized("User no longer exists")
    })?;

    let is_active: bool = row.get("is_active");
    if !is_active {
        tracing::warn!("User validation failed: user {} is inactive", auth_user.email);
        return Err(ApiError::forbidden("User account is inactive"));
    }

    let role_id: Option<Uuid> = row.get("role_id");
    let permissions = match role_id {
        Some(role_id) => load_permissions(&pool, role_id).await?,
        None => Vec::new(),
    };

    let current = CurrentUser {
        id: row.get("id"),
        email: row.get("email"),
        permissions,
    };
    tracing::debug!(
        "User validation successful: {} with {} permissions",
        current.email,
        current.permissions.len()
    );

    request.extensions_mut().insert(current);
    request.extensions_mut().insert(DbPool(pool));
    Ok(next.run(request).await)
}

/// Rows with an unknown action or resource are skipped with a warning
async fn load_permissions(pool: &PgPool, role_id: Uuid) -> Result<Vec<Permission>, ApiError> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT action, resource FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .fetch_all(pool)
            .await?;

    let permissions = rows
        .iter()
        .filter_map(|(action, resource)| match Permission::parse(action, resource) {
            Ok(permission) => Some(permission),
            Err(e) => {
                tracing::warn!("Ignoring permission row of role {}: {}", role_id, e);
                None
            }
        })
        .collect();
    Ok(permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use PermissionAction::*;
    use PermissionResource::*;

    fn user(permissions: Vec<Permission>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "ops@example.com".to_string(),
            permissions,
        }
    }

    #[test]
    fn require_follows_role_grants() {
        let seller = user(vec![Permission::new(Manage, SalesOpportunities)]);
        assert!(seller.require(Delete, SalesOpportunities).is_ok());

        let err = seller.require(Read, Users).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn user_without_role_can_do_nothing() {
        assert!(!user(Vec::new()).can(Read, KanbanBoards));
    }
}
