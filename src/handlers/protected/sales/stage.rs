use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::parse_valid;
use crate::api::sales::{CreateStage, MoveStage, UpdateStage};
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::SalesStage;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::SalesService;

/// POST /api/sales/pipelines/:id/stages - Add a stage to a pipeline
pub async fn post(
    Path(pipeline_id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesStage> {
    user.require(PermissionAction::Create, PermissionResource::SalesPipeline)?;
    let dto: CreateStage = parse_valid(payload)?;

    let stage = SalesService::new(pool).create_stage(pipeline_id, dto).await?;
    Ok(ApiResponse::created(stage))
}

/// PATCH /api/sales/stages/:id
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesStage> {
    user.require(PermissionAction::Update, PermissionResource::SalesPipeline)?;
    let dto: UpdateStage = parse_valid(payload)?;

    let stage = SalesService::new(pool).update_stage(id, dto).await?;
    Ok(ApiResponse::success(stage))
}

/// PATCH /api/sales/stages/:id/move - Reorder a stage within its pipeline
pub async fn move_to(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesStage> {
    user.require(PermissionAction::Update, PermissionResource::SalesPipeline)?;
    let dto: MoveStage = parse_valid(payload)?;

    let stage = SalesService::new(pool).move_stage(id, dto.new_position).await?;
    Ok(ApiResponse::success(stage))
}

/// DELETE /api/sales/stages/:id - Only empty stages can be deleted
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::SalesPipeline)?;
    SalesService::new(pool).delete_stage(id).await?;
    Ok(ApiResponse::no_content())
}
