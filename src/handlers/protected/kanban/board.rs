use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::kanban::{CreateBoard, UpdateBoard};
use crate::api::parse_valid;
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::{BoardDetail, BoardSummary, KanbanBoard};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::KanbanService;

/// POST /api/kanban/boards - Create a board
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<KanbanBoard> {
    user.require(PermissionAction::Create, PermissionResource::KanbanBoards)?;
    let dto: CreateBoard = parse_valid(payload)?;

    let board = KanbanService::new(pool).create_board(dto).await?;
    Ok(ApiResponse::created(board))
}

/// GET /api/kanban/boards - List active boards with their columns and card counts
pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<BoardSummary>> {
    user.require(PermissionAction::Read, PermissionResource::KanbanBoards)?;
    let boards = KanbanService::new(pool).list_boards().await?;
    Ok(ApiResponse::success(boards))
}

/// GET /api/kanban/boards/:id - Board with ordered columns and cards
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<BoardDetail> {
    user.require(PermissionAction::Read, PermissionResource::KanbanBoards)?;
    let board = KanbanService::new(pool).get_board(id).await?;
    Ok(ApiResponse::success(board))
}

/// PATCH /api/kanban/boards/:id - Update board name, description or active flag
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<KanbanBoard> {
    user.require(PermissionAction::Update, PermissionResource::KanbanBoards)?;
    let dto: UpdateBoard = parse_valid(payload)?;

    let board = KanbanService::new(pool).update_board(id, dto).await?;
    Ok(ApiResponse::success(board))
}

/// DELETE /api/kanban/boards/:id - Delete a board with its columns and cards
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::KanbanBoards)?;
    KanbanService::new(pool).delete_board(id).await?;
    Ok(ApiResponse::no_content())
}
