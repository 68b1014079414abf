use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::kanban::{CreateCard, MoveCard, UpdateCard};
use crate::api::parse_valid;
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::{CardDetail, KanbanCard};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::KanbanService;

/// POST /api/kanban/columns/:id/cards - Create a card in a column
pub async fn post(
    Path(column_id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<KanbanCard> {
    user.require(PermissionAction::Create, PermissionResource::KanbanCards)?;
    let dto: CreateCard = parse_valid(payload)?;

    let card = KanbanService::new(pool).create_card(column_id, dto, user.id).await?;
    Ok(ApiResponse::created(card))
}

/// GET /api/kanban/cards/:id - Card with comments and recent activity
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<CardDetail> {
    user.require(PermissionAction::Read, PermissionResource::KanbanCards)?;
    let card = KanbanService::new(pool).get_card(id).await?;
    Ok(ApiResponse::success(card))
}

/// PATCH /api/kanban/cards/:id - Update a card
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<KanbanCard> {
    user.require(PermissionAction::Update, PermissionResource::KanbanCards)?;
    let dto: UpdateCard = parse_valid(payload)?;

    let card = KanbanService::new(pool).update_card(id, dto, user.id).await?;
    Ok(ApiResponse::success(card))
}

/// PATCH /api/kanban/cards/:id/move - Move a card within or across columns
pub async fn move_to(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<KanbanCard> {
    user.require(PermissionAction::Update, PermissionResource::KanbanCards)?;
    let dto: MoveCard = parse_valid(payload)?;

    let card = KanbanService::new(pool).move_card(id, dto, user.id).await?;
    Ok(ApiResponse::success(card))
}

/// DELETE /api/kanban/cards/:id - Delete a card
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::KanbanCards)?;
    KanbanService::new(pool).delete_card(id).await?;
    Ok(ApiResponse::no_content())
}
