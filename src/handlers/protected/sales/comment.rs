use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::parse_valid;
use crate::api::sales::{CreateSalesComment, UpdateSalesComment};
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::SalesComment;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::SalesService;

/// POST /api/sales/opportunities/:id/comments
pub async fn post(
    Path(opportunity_id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesComment> {
    user.require(PermissionAction::Create, PermissionResource::SalesOpportunities)?;
    let dto: CreateSalesComment = parse_valid(payload)?;

    let comment = SalesService::new(pool)
        .create_comment(opportunity_id, dto, user.id)
        .await?;
    Ok(ApiResponse::created(comment))
}

/// PATCH /api/sales/comments/:id - Only the author may edit
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesComment> {
    user.require(PermissionAction::Update, PermissionResource::SalesOpportunities)?;
    let dto: UpdateSalesComment = parse_valid(payload)?;

    let comment = SalesService::new(pool).update_comment(id, dto, user.id).await?;
    Ok(ApiResponse::success(comment))
}

/// DELETE /api/sales/comments/:id - Only the author may delete
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::SalesOpportunities)?;
    SalesService::new(pool).delete_comment(id, user.id).await?;
    Ok(ApiResponse::no_content())
}
