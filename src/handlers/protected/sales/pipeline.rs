use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::parse_valid;
use crate::api::sales::{CreatePipeline, UpdatePipeline};
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::{PipelineDetail, SalesPipeline};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::SalesService;

/// POST /api/sales/pipelines - Create a pipeline
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesPipeline> {
    user.require(PermissionAction::Create, PermissionResource::SalesPipeline)?;
    let dto: CreatePipeline = parse_valid(payload)?;

    let pipeline = SalesService::new(pool).create_pipeline(dto).await?;
    Ok(ApiResponse::created(pipeline))
}

/// GET /api/sales/pipelines - Active pipelines, newest first, with stages and opportunities
pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<PipelineDetail>> {
    user.require(PermissionAction::Read, PermissionResource::SalesPipeline)?;
    let pipelines = SalesService::new(pool).list_pipelines().await?;
    Ok(ApiResponse::success(pipelines))
}

/// GET /api/sales/pipelines/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<PipelineDetail> {
    user.require(PermissionAction::Read, PermissionResource::SalesPipeline)?;
    let pipeline = SalesService::new(pool).get_pipeline(id).await?;
    Ok(ApiResponse::success(pipeline))
}

/// PATCH /api/sales/pipelines/:id
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SalesPipeline> {
    user.require(PermissionAction::Update, PermissionResource::SalesPipeline)?;
    let dto: UpdatePipeline = parse_valid(payload)?;

    let pipeline = SalesService::new(pool).update_pipeline(id, dto).await?;
    Ok(ApiResponse::success(pipeline))
}

/// DELETE /api/sales/pipelines/:id - Soft delete; the pipeline is deactivated and returned
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<SalesPipeline> {
    user.require(PermissionAction::Delete, PermissionResource::SalesPipeline)?;
    let pipeline = SalesService::new(pool).delete_pipeline(id).await?;
    Ok(ApiResponse::success(pipeline))
}
