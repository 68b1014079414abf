use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::parse_valid;
use crate::api::sales::{CreateActivity, UpdateActivity};
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::SalesActivity;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::SalesService;

/// POST /api/sales/opportunities/:id/activities - Schedule an activity
pub async fn post(
    Path(opportunity_id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesActivity> {
    user.require(PermissionAction::Create, PermissionResource::SalesOpportunities)?;
    let dto: CreateActivity = parse_valid(payload)?;

    let activity = SalesService::new(pool)
        .create_activity(opportunity_id, dto, user.id)
        .await?;
    Ok(ApiResponse::created(activity))
}

/// PATCH /api/sales/activities/:id - Only the assignee may edit
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesActivity> {
    user.require(PermissionAction::Update, PermissionResource::SalesOpportunities)?;
    let dto: UpdateActivity = parse_valid(payload)?;

    let activity = SalesService::new(pool).update_activity(id, dto, user.id).await?;
    Ok(ApiResponse::success(activity))
}

/// PATCH /api/sales/activities/:id/complete - Mark done now
pub async fn complete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<SalesActivity> {
    user.require(PermissionAction::Update, PermissionResource::SalesOpportunities)?;
    let activity = SalesService::new(pool).complete_activity(id, user.id).await?;
    Ok(ApiResponse::success(activity))
}

/// DELETE /api/sales/activities/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::SalesOpportunities)?;
    SalesService::new(pool).delete_activity(id, user.id).await?;
    Ok(ApiResponse::no_content())
}
