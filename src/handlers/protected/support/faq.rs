use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::support::{CreateFaq, FaqQuery, UpdateFaq};
use crate::api::{parse_valid, Page};
use crate::auth::{PermissionAction, PermissionResource};
use crate::database::models::Faq;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::SupportService;

// Editing the FAQ is an administrative task: writers need UPDATE on users,
// removal needs DELETE on users. Reading is open to every signed-in user.

/// POST /api/support/faqs - Add an FAQ entry
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<Faq> {
    user.require(PermissionAction::Update, PermissionResource::Users)?;
    let dto: CreateFaq = parse_valid(payload)?;

    let faq = SupportService::new(pool).create_faq(dto).await?;
    Ok(ApiResponse::created(faq))
}

/// GET /api/support/faqs?page=&limit=&category=&search= - Active entries
pub async fn list(
    Query(query): Query<FaqQuery>,
    Extension(DbPool(pool)): Extension<DbPool>,
) -> ApiResult<Page<Faq>> {
    let page = SupportService::new(pool).list_faqs(query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/support/faqs/categories
pub async fn categories(Extension(DbPool(pool)): Extension<DbPool>) -> ApiResult<Vec<String>> {
    let categories = SupportService::new(pool).faq_categories().await?;
    Ok(ApiResponse::success(categories))
}

/// GET /api/support/faqs/:id - Read one entry, counting the view
pub async fn get(Path(id): Path<Uuid>, Extension(DbPool(pool)): Extension<DbPool>) -> ApiResult<Faq> {
    let faq = SupportService::new(pool).get_faq(id).await?;
    Ok(ApiResponse::success(faq))
}

/// PATCH /api/support/faqs/:id
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<Faq> {
    user.require(PermissionAction::Update, PermissionResource::Users)?;
    let dto: UpdateFaq = parse_valid(payload)?;

    let faq = SupportService::new(pool).update_faq(id, dto).await?;
    Ok(ApiResponse::success(faq))
}

/// DELETE /api/support/faqs/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    user.require(PermissionAction::Delete, PermissionResource::Users)?;
    SupportService::new(pool).delete_faq(id).await?;
    Ok(ApiResponse::no_content())
}
