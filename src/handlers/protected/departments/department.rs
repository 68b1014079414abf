use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::departments::{CreateDepartment, MoveDepartment, UpdateDepartment};
use crate::api::parse_valid;
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::{Department, DepartmentDetail, OrgUnit};
use crate::hierarchy::TreeNode;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::DepartmentService;

/// POST /api/departments - Create a department, as a root or under `parentId`
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<Department> {
    user.require(PermissionAction::Create, PermissionResource::Users)?;
    let dto: CreateDepartment = parse_valid(payload)?;

    let department = DepartmentService::new(pool).create(dto).await?;
    Ok(ApiResponse::created(department))
}

/// GET /api/departments - Flat list ordered by level, then position
pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<Department>> {
    user.require(PermissionAction::Read, PermissionResource::Users)?;
    let departments = DepartmentService::new(pool).list().await?;
    Ok(ApiResponse::success(departments))
}

/// GET /api/departments/organizational-structure - Nested department tree with members
pub async fn structure(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<TreeNode<OrgUnit>>> {
    user.require(PermissionAction::Read, PermissionResource::Users)?;
    let tree = DepartmentService::new(pool).organizational_structure().await?;
    Ok(ApiResponse::success(tree))
}

/// GET /api/departments/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<DepartmentDetail> {
    user.require(PermissionAction::Read, PermissionResource::Users)?;
    let department = DepartmentService::new(pool).get(id).await?;
    Ok(ApiResponse::success(department))
}

/// PATCH /api/departments/:id - A `parentId` key moves the department
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<Department> {
    user.require(PermissionAction::Update, PermissionResource::Users)?;
    let dto: UpdateDepartment = parse_valid(payload)?;

    let department = DepartmentService::new(pool).update(id, dto).await?;
    Ok(ApiResponse::success(department))
}

/// PATCH /api/departments/:id/move - Re-parent and/or reorder
pub async fn move_to(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<Department> {
    user.require(PermissionAction::Update, PermissionResource::Users)?;
    let dto: MoveDepartment = parse_valid(payload)?;

    let department = DepartmentService::new(pool).move_department(id, dto).await?;
    Ok(ApiResponse::success(department))
}

/// DELETE /api/departments/:id - Leaf departments without members only
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::Users)?;
    DepartmentService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}
