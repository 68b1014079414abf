use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{found, ServiceError};
use crate::database::models::Notification;
use crate::notifications::{NewNotification, NotificationDispatcher, NotificationHub};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, notification_type, title, message, metadata, action_url, is_read, read_at, created_at";

/// Result of a bulk read/delete
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Affected {
    pub count: u64,
}

/// Notification inbox of each user, plus fan-out through the [`NotificationHub`]
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
    hub: NotificationHub,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hub: NotificationHub::global().clone(),
        }
    }

    pub async fn create(&self, notification: NewNotification) -> Result<Notification, ServiceError> {
        let sql = format!(
            "INSERT INTO notifications (user_id, notification_type, title, message, metadata, action_url) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        let stored = sqlx::query_as::<_, Notification>(&sql)
            .bind(notification.user_id)
            .bind(notification.notification_type.as_str())
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.metadata)
            .bind(&notification.action_url)
            .fetch_one(&self.pool)
            .await?;

        let delivered = self.hub.publish(stored.clone());
        tracing::info!(
            "Notification {} ({}) created for user {} ({} live subscribers)",
            stored.id,
            stored.notification_type,
            stored.user_id,
            delivered
        );
        Ok(stored)
    }

    /// Newest first
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Notification>, ServiceError> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn unread(&self, user_id: Uuid) -> Result<Vec<Notification>, ServiceError> {
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = $1 AND NOT is_read ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64, ServiceError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Only notifications owned by `user_id` are touched
    pub async fn mark_read(&self, user_id: Uuid, ids: &[Uuid]) -> Result<Affected, ServiceError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() \
             WHERE user_id = $1 AND id = ANY($2) AND NOT is_read",
        )
        .bind(user_id)
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(Affected {
            count: result.rows_affected(),
        })
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<Affected, ServiceError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(Affected {
            count: result.rows_affected(),
        })
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let deleted: Option<Uuid> =
            sqlx::query_scalar("DELETE FROM notifications WHERE id = $1 AND user_id = $2 RETURNING id")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        found(deleted, "Notification", id)?;
        Ok(())
    }

    pub async fn delete_all(&self, user_id: Uuid) -> Result<Affected, ServiceError> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(Affected {
            count: result.rows_affected(),
        })
    }
}

#[async_trait]
impl NotificationDispatcher for NotificationService {
    async fn dispatch(&self, notification: NewNotification) -> Result<Notification, ServiceError> {
        self.create(notification).await
    }
}
