use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::users::{CreateUser, UpdateUser};
use crate::api::{parse_valid, Page, PageQuery};
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::UserAccount;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::UserService;

/// POST /api/users - Create an account with a hashed password
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<UserAccount> {
    user.require(PermissionAction::Create, PermissionResource::Users)?;
    let dto: CreateUser = parse_valid(payload)?;

    let account = UserService::new(pool).create(dto).await?;
    Ok(ApiResponse::created(account))
}

/// GET /api/users?page=&limit= - Accounts, newest first
pub async fn list(
    Query(query): Query<PageQuery>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Page<UserAccount>> {
    user.require(PermissionAction::Read, PermissionResource::Users)?;
    let page = UserService::new(pool).list(query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/users/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<UserAccount> {
    user.require(PermissionAction::Read, PermissionResource::Users)?;
    let account = UserService::new(pool).get(id).await?;
    Ok(ApiResponse::success(account))
}

/// PATCH /api/users/:id - Update profile fields, role or status
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<UserAccount> {
    user.require(PermissionAction::Update, PermissionResource::Users)?;
    let dto: UpdateUser = parse_valid(payload)?;

    let account = UserService::new(pool).update(id, dto).await?;
    Ok(ApiResponse::success(account))
}

/// DELETE /api/users/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::Users)?;
    UserService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}
