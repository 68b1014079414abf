use axum::extract::{Extension, Path, Query};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::PageQuery;
use crate::database::models::{FeedbackStats, FeedbackView};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::FeedbackService;

/// POST /api/feedback/:id/vote - Cast or withdraw the caller's vote
pub async fn toggle(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Value> {
    let voted = FeedbackService::new(pool).toggle_vote(user.id, id).await?;
    Ok(ApiResponse::success(json!({ "voted": voted })))
}

/// GET /api/feedback/stats - Totals, this month's count, average rating and breakdowns
pub async fn stats(Extension(DbPool(pool)): Extension<DbPool>) -> ApiResult<FeedbackStats> {
    let stats = FeedbackService::new(pool).stats().await?;
    Ok(ApiResponse::success(stats))
}

/// GET /api/feedback/top-suggestions?limit= - Suggestions with the most votes
pub async fn top_suggestions(
    Query(query): Query<PageQuery>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<FeedbackView>> {
    let suggestions = FeedbackService::new(pool).top_suggestions(user.id, query).await?;
    Ok(ApiResponse::success(suggestions))
}
