use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::kanban::CommentBody;
use crate::api::parse_valid;
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::CardComment;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::KanbanService;

/// POST /api/kanban/cards/:id/comments - Comment on a card
pub async fn post(
    Path(card_id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<CardComment> {
    user.require(PermissionAction::Create, PermissionResource::KanbanCards)?;
    let dto: CommentBody = parse_valid(payload)?;

    let comment = KanbanService::new(pool).create_comment(card_id, dto, user.id).await?;
    Ok(ApiResponse::created(comment))
}

/// PATCH /api/kanban/comments/:id - Edit one of your own comments
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<CardComment> {
    user.require(PermissionAction::Update, PermissionResource::KanbanCards)?;
    let dto: CommentBody = parse_valid(payload)?;

    let comment = KanbanService::new(pool).update_comment(id, dto, user.id).await?;
    Ok(ApiResponse::success(comment))
}

/// DELETE /api/kanban/comments/:id - Delete one of your own comments
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::KanbanCards)?;
    KanbanService::new(pool).delete_comment(id, user.id).await?;
    Ok(ApiResponse::no_content())
}
