use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::parse_valid;
use crate::api::roles::{CreateRole, UpdateRole};
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::RoleDetail;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::RoleService;

/// POST /api/roles - Create a role with its permission grants
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<RoleDetail> {
    user.require(PermissionAction::Create, PermissionResource::Roles)?;
    let dto: CreateRole = parse_valid(payload)?;

    let role = RoleService::new(pool).create(dto).await?;
    Ok(ApiResponse::created(role))
}

/// GET /api/roles - List roles with grants and user counts
pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<RoleDetail>> {
    user.require(PermissionAction::Read, PermissionResource::Roles)?;
    let roles = RoleService::new(pool).list().await?;
    Ok(ApiResponse::success(roles))
}

/// GET /api/roles/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<RoleDetail> {
    user.require(PermissionAction::Read, PermissionResource::Roles)?;
    let role = RoleService::new(pool).get(id).await?;
    Ok(ApiResponse::success(role))
}

/// PATCH /api/roles/:id - Rename, redescribe or replace the grants of a non-system role
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<RoleDetail> {
    user.require(PermissionAction::Update, PermissionResource::Roles)?;
    let dto: UpdateRole = parse_valid(payload)?;

    let role = RoleService::new(pool).update(id, dto).await?;
    Ok(ApiResponse::success(role))
}

/// DELETE /api/roles/:id - Delete a non-system role nobody holds
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::Roles)?;
    RoleService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}
