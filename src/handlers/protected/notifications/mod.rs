//! Inbox endpoints. Every route acts on the caller's own notifications only.

use std::convert::Infallible;

use axum::extract::{Extension, Path};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api::notifications::{CreateNotification, MarkAsRead};
use crate::api::parse_valid;
use crate::database::models::Notification;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, DbPool};
use crate::notifications::NotificationHub;
use crate::services::notification_service::Affected;
use crate::services::NotificationService;

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

/// POST /api/notifications - Store and broadcast a notification for `userId`
pub async fn post(
    Extension(DbPool(pool)): Extension<DbPool>,
    Json(payload): Json<Value>,
) -> ApiResult<Notification> {
    let dto: CreateNotification = parse_valid(payload)?;
    let notification = NotificationService::new(pool).create(dto.into()).await?;
    Ok(ApiResponse::created(notification))
}

/// GET /api/notifications
pub async fn list(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<Notification>> {
    let notifications = NotificationService::new(pool).list(user.id).await?;
    Ok(ApiResponse::success(notifications))
}

/// GET /api/notifications/unread
pub async fn unread(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Vec<Notification>> {
    let notifications = NotificationService::new(pool).unread(user.id).await?;
    Ok(ApiResponse::success(notifications))
}

/// GET /api/notifications/unread/count
pub async fn unread_count(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<UnreadCount> {
    let count = NotificationService::new(pool).unread_count(user.id).await?;
    Ok(ApiResponse::success(UnreadCount { count }))
}

/// PATCH /api/notifications/mark-read
pub async fn mark_read(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<Value>,
) -> ApiResult<Affected> {
    let dto: MarkAsRead = parse_valid(payload)?;
    let affected = NotificationService::new(pool)
        .mark_read(user.id, &dto.notification_ids)
        .await?;
    Ok(ApiResponse::success(affected))
}

/// PATCH /api/notifications/mark-all-read
pub async fn mark_all_read(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Affected> {
    let affected = NotificationService::new(pool).mark_all_read(user.id).await?;
    Ok(ApiResponse::success(affected))
}

/// DELETE /api/notifications/:id
pub async fn delete(
    Path(id): Path<Uuid>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<()> {
    NotificationService::new(pool).delete(user.id, id).await?;
    Ok(ApiResponse::no_content())
}

/// DELETE /api/notifications
pub async fn delete_all(
    Extension(DbPool(pool)): Extension<DbPool>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Affected> {
    let affected = NotificationService::new(pool).delete_all(user.id).await?;
    Ok(ApiResponse::success(affected))
}

/// GET /api/notifications/stream - Server-sent events, one `notification` event per new entry
pub async fn stream(
    Extension(user): Extension<CurrentUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("User {} opened a notification stream", user.email);
    let events = NotificationHub::global().stream_for(user.id).filter_map(|notification| async move {
        match Event::default().event("notification").json_data(&notification) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::error!("Failed to encode notification {}: {}", notification.id, e);
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    #[tokio::test]
    async fn stream_answers_with_an_event_stream() {
        let user = CurrentUser {
            id: Uuid::new_v4(),
            email: "listener@example.com".to_string(),
            permissions: Vec::new(),
        };
        let app = Router::new()
            .route("/api/notifications/stream", get(stream))
            .layer(Extension(user));

        let response = app
            .oneshot(Request::get("/api/notifications/stream").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    }
}
