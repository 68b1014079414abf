use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::feedback::{CreateFeedback, UpdateFeedback};
use crate::api::{parse_valid, Page, PageQuery};
use crate::database::models::FeedbackView;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::FeedbackService;

/// POST /api/feedback - Leave feedback, optionally anonymous
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<FeedbackView> {
    let dto: CreateFeedback = parse_valid(payload)?;
    let feedback = FeedbackService::new(pool).create(user.id, dto).await?;
    Ok(ApiResponse::created(feedback))
}

/// GET /api/feedback?page=&limit= - All feedback, newest first
pub async fn list(
    Query(query): Query<PageQuery>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Page<FeedbackView>> {
    let page = FeedbackService::new(pool).list(user.id, query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/feedback/my?page=&limit= - The caller's feedback
pub async fn mine(
    Query(query): Query<PageQuery>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Page<FeedbackView>> {
    let page = FeedbackService::new(pool).list_own(user.id, query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/feedback/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<FeedbackView> {
    let feedback = FeedbackService::new(pool).get(user.id, id).await?;
    Ok(ApiResponse::success(feedback))
}

/// PATCH /api/feedback/:id - Author only
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<FeedbackView> {
    let dto: UpdateFeedback = parse_valid(payload)?;
    let feedback = FeedbackService::new(pool).update(user.id, id, dto).await?;
    Ok(ApiResponse::success(feedback))
}

/// DELETE /api/feedback/:id - Author only
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    FeedbackService::new(pool).delete(user.id, id).await?;
    Ok(ApiResponse::no_content())
}
