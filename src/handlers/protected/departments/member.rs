use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::departments::AddUserToDepartment;
use crate::api::parse_valid;
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::{UserHierarchy, UserSummary};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::DepartmentService;

/// POST /api/departments/add-user - Place a user in a department, optionally as head or manager
pub async fn add(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<UserSummary> {
    user.require(PermissionAction::Update, PermissionResource::Users)?;
    let dto: AddUserToDepartment = parse_valid(payload)?;

    let member = DepartmentService::new(pool).add_user(dto).await?;
    Ok(ApiResponse::success(member))
}

/// DELETE /api/departments/:id/users/:user_id
pub async fn remove(
    Path((department_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Update, PermissionResource::Users)?;
    DepartmentService::new(pool).remove_user(department_id, user_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/departments/:id/set-head/:user_id - Replace the department head
pub async fn set_head(
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<UserSummary> {
    user.require(PermissionAction::Update, PermissionResource::Users)?;
    let head = DepartmentService::new(pool).set_head(id, user_id).await?;
    Ok(ApiResponse::success(head))
}

/// GET /api/departments/:id/hierarchy - Reporting lines inside a department
pub async fn hierarchy(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<UserHierarchy> {
    user.require(PermissionAction::Read, PermissionResource::Users)?;
    let tree = DepartmentService::new(pool).user_hierarchy(id).await?;
    Ok(ApiResponse::success(tree))
}
