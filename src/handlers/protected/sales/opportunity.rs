use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::parse_valid;
use crate::api::sales::{CreateOpportunity, MoveOpportunity, UpdateOpportunity};
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::{OpportunityDetail, SalesOpportunity};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::SalesService;

/// POST /api/sales/opportunities - Create an opportunity in the stage named by `stageId`
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesOpportunity> {
    user.require(PermissionAction::Create, PermissionResource::SalesOpportunities)?;
    let dto: CreateOpportunity = parse_valid(payload)?;

    let opportunity = SalesService::new(pool).create_opportunity(dto, user.id).await?;
    Ok(ApiResponse::created(opportunity))
}

/// GET /api/sales/opportunities/:id - Opportunity with comments and activities
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<OpportunityDetail> {
    user.require(PermissionAction::Read, PermissionResource::SalesOpportunities)?;
    let opportunity = SalesService::new(pool).get_opportunity(id).await?;
    Ok(ApiResponse::success(opportunity))
}

/// PATCH /api/sales/opportunities/:id
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesOpportunity> {
    user.require(PermissionAction::Update, PermissionResource::SalesOpportunities)?;
    let dto: UpdateOpportunity = parse_valid(payload)?;

    let opportunity = SalesService::new(pool).update_opportunity(id, dto, user.id).await?;
    Ok(ApiResponse::success(opportunity))
}

/// PATCH /api/sales/opportunities/:id/move - Move to another stage, appended unless a position is given
pub async fn move_to(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesOpportunity> {
    user.require(PermissionAction::Update, PermissionResource::SalesOpportunities)?;
    let dto: MoveOpportunity = parse_valid(payload)?;

    let opportunity = SalesService::new(pool).move_opportunity(id, dto).await?;
    Ok(ApiResponse::success(opportunity))
}

/// DELETE /api/sales/opportunities/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::SalesOpportunities)?;
    SalesService::new(pool).delete_opportunity(id).await?;
    Ok(ApiResponse::no_content())
}
