use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::kanban::{CreateColumn, MoveColumn, UpdateColumn};
use crate::api::parse_valid;
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::KanbanColumn;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::KanbanService;

/// POST /api/kanban/boards/:id/columns - Add a column, at `position` or appended
pub async fn post(
    Path(board_id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<KanbanColumn> {
    user.require(PermissionAction::Create, PermissionResource::KanbanBoards)?;
    let dto: CreateColumn = parse_valid(payload)?;

    let column = KanbanService::new(pool).create_column(board_id, dto).await?;
    Ok(ApiResponse::created(column))
}

/// PATCH /api/kanban/columns/:id - Update a column; `position` reorders it
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<KanbanColumn> {
    user.require(PermissionAction::Update, PermissionResource::KanbanBoards)?;
    let dto: UpdateColumn = parse_valid(payload)?;

    let column = KanbanService::new(pool).update_column(id, dto).await?;
    Ok(ApiResponse::success(column))
}

/// PATCH /api/kanban/columns/:id/move - Move a column within its board
pub async fn move_to(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<KanbanColumn> {
    user.require(PermissionAction::Update, PermissionResource::KanbanBoards)?;
    let dto: MoveColumn = parse_valid(payload)?;

    let column = KanbanService::new(pool).move_column(id, dto.new_position).await?;
    Ok(ApiResponse::success(column))
}

/// DELETE /api/kanban/columns/:id - Delete a column and close the gap it leaves
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::KanbanBoards)?;
    KanbanService::new(pool).delete_column(id).await?;
    Ok(ApiResponse::no_content())
}
