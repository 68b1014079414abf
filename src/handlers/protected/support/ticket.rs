use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::api::support::{CreateTicket, UpdateTicket};
use crate::api::{parse_valid, Page, PageQuery};
use crate::database::models::SupportTicket;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::services::SupportService;

// Tickets are private to their author, so no role permission is checked here.

/// POST /api/support/tickets - Open a ticket
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SupportTicket> {
    let dto: CreateTicket = parse_valid(payload)?;
    let ticket = SupportService::new(pool).create_ticket(user.id, dto).await?;
    Ok(ApiResponse::created(ticket))
}

/// GET /api/support/tickets?page=&limit= - The caller's tickets, newest first
pub async fn list(
    Query(query): Query<PageQuery>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Page<SupportTicket>> {
    let page = SupportService::new(pool).list_tickets(user.id, query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/support/tickets/:id
pub async fn get(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<SupportTicket> {
    let ticket = SupportService::new(pool).get_ticket(user.id, id).await?;
    Ok(ApiResponse::success(ticket))
}

/// PATCH /api/support/tickets/:id
pub async fn patch(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<SupportTicket> {
    let dto: UpdateTicket = parse_valid(payload)?;
    let ticket = SupportService::new(pool).update_ticket(user.id, id, dto).await?;
    Ok(ApiResponse::success(ticket))
}

/// DELETE /api/support/tickets/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    SupportService::new(pool).delete_ticket(user.id, id).await?;
    Ok(ApiResponse::no_content())
}
