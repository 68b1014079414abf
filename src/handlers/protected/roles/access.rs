use axum::extract::Extension;
use axum::Json;
use serde_json::{json, Value};

use crate::api::parse_valid;
use crate::api::roles::{AssignRole, CheckPermission};
use crate::auth::{PermissionAction, PermissionGrant, PermissionResource};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::RoleService;

/// POST /api/roles/assign - Give a user a role
pub async fn assign(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<Value> {
    user.require(PermissionAction::Manage, PermissionResource::Users)?;
    let dto: AssignRole = parse_valid(payload)?;

    RoleService::new(pool).assign(dto).await?;
    Ok(ApiResponse::success(json!({ "message": "Role assigned" })))
}

/// POST /api/roles/check-permission - Whether the caller's role grants an action
pub async fn check(Extension(user): Extension<CurrentUser>, Json(payload): Json<Value>) -> ApiResult<Value> {
    let dto: CheckPermission = parse_valid(payload)?;
    let allowed = user.can(dto.action, dto.resource);
    Ok(ApiResponse::success(json!({ "hasPermission": allowed })))
}

/// GET /api/roles/me/permissions - The caller's grants with their conditions
pub async fn mine(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<PermissionGrant>> {
    let grants = RoleService::new(pool).permissions_of(user.id).await?;
    Ok(ApiResponse::success(grants))
}

/// POST /api/roles/create-defaults - Seed the built-in roles that are missing
pub async fn create_defaults(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Value> {
    user.require(PermissionAction::Manage, PermissionResource::Roles)?;
    let created = RoleService::new(pool).create_defaults().await?;
    Ok(ApiResponse::success(json!({ "created": created })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Permission;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn router(permissions: Vec<Permission>) -> Router {
        let user = CurrentUser {
            id: Uuid::new_v4(),
            email: "lead@example.com".to_string(),
            permissions,
        };
        Router::new()
            .route("/api/roles/check-permission", post(check))
            .layer(Extension(user))
    }

    async fn ask(router: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/api/roles/check-permission")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn check_answers_from_the_callers_role() {
        let grants = vec![Permission::new(PermissionAction::Manage, PermissionResource::KanbanCards)];

        let (status, body) = ask(router(grants.clone()), json!({"action": "DELETE", "resource": "KANBAN_CARDS"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["hasPermission"], true);

        let (_, body) = ask(router(grants), json!({"action": "READ", "resource": "REPORTS"})).await;
        assert_eq!(body["data"]["hasPermission"], false);
    }

    #[tokio::test]
    async fn check_rejects_unknown_actions() {
        let (status, body) = ask(router(Vec::new()), json!({"action": "FLY", "resource": "USERS"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_JSON");
    }
}
