use std::collections::BTreeMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::{found, ServiceError};
use crate::api::feedback::{CreateFeedback, FeedbackType, UpdateFeedback};
use crate::api::{Page, PageQuery};
use crate::database::models::{Feedback, FeedbackStats, FeedbackView, FeedbackViewRow};

const FEEDBACK_COLUMNS: &str = "id, user_id, feedback_type, category, title, description, rating, priority, status, \
     is_anonymous, created_at, updated_at";

/// Feedback joined with its author and votes, as seen by the user bound to `$1`
const VIEW_SELECT: &str = "SELECT f.id, f.user_id, f.feedback_type, f.category, f.title, f.description, f.rating, \
     f.priority, f.status, f.is_anonymous, f.created_at, f.updated_at, \
     (SELECT COUNT(*) FROM feedback_votes v WHERE v.feedback_id = f.id) AS votes_count, \
     EXISTS (SELECT 1 FROM feedback_votes v WHERE v.feedback_id = f.id AND v.user_id = $1) AS has_voted, \
     u.first_name AS author_first_name, u.last_name AS author_last_name, u.avatar AS author_avatar \
     FROM feedback f JOIN users u ON u.id = f.user_id";

/// Product feedback with one vote per user per entry.
pub struct FeedbackService {
    pool: PgPool,
}

impl FeedbackService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: Uuid, dto: CreateFeedback) -> Result<FeedbackView, ServiceError> {
        let sql = format!(
            "INSERT INTO feedback (user_id, feedback_type, category, title, description, rating, priority, is_anonymous) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            FEEDBACK_COLUMNS
        );
        let feedback = sqlx::query_as::<_, Feedback>(&sql)
            .bind(user_id)
            .bind(dto.feedback_type.as_str())
            .bind(dto.category.as_str())
            .bind(dto.title.trim())
            .bind(dto.description.trim())
            .bind(dto.rating)
            .bind(dto.priority.as_str())
            .bind(dto.is_anonymous)
            .fetch_one(&self.pool)
            .await?;
        tracing::info!("User {} left {} feedback {}", user_id, feedback.feedback_type, feedback.id);
        self.get(user_id, feedback.id).await
    }

    /// Everyone's feedback, newest first
    pub async fn list(&self, viewer: Uuid, query: PageQuery) -> Result<Page<FeedbackView>, ServiceError> {
        let sql = format!("{} ORDER BY f.created_at DESC LIMIT $2 OFFSET $3", VIEW_SELECT);
        let rows = sqlx::query_as::<_, FeedbackViewRow>(&sql)
            .bind(viewer)
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
            .fetch_one(&self.pool)
            .await?;
        Ok(query.into_page(rows.into_iter().map(Into::into).collect(), total))
    }

    /// The viewer's own feedback, anonymous entries included
    pub async fn list_own(&self, viewer: Uuid, query: PageQuery) -> Result<Page<FeedbackView>, ServiceError> {
        let sql = format!(
            "{} WHERE f.user_id = $1 ORDER BY f.created_at DESC LIMIT $2 OFFSET $3",
            VIEW_SELECT
        );
        let rows = sqlx::query_as::<_, FeedbackViewRow>(&sql)
            .bind(viewer)
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback WHERE user_id = $1")
            .bind(viewer)
            .fetch_one(&self.pool)
            .await?;
        Ok(query.into_page(rows.into_iter().map(Into::into).collect(), total))
    }

    pub async fn get(&self, viewer: Uuid, id: Uuid) -> Result<FeedbackView, ServiceError> {
        let sql = format!("{} WHERE f.id = $2", VIEW_SELECT);
        let row = sqlx::query_as::<_, FeedbackViewRow>(&sql)
            .bind(viewer)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        found(row, "Feedback", id).map(Into::into)
    }

    pub async fn update(&self, user_id: Uuid, id: Uuid, dto: UpdateFeedback) -> Result<FeedbackView, ServiceError> {
        self.ensure_author(user_id, id).await?;
        sqlx::query(
            "UPDATE feedback SET status = COALESCE($2, status), title = COALESCE($3, title), \
             description = COALESCE($4, description), rating = COALESCE($5, rating), \
             priority = COALESCE($6, priority), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(dto.status.map(|s| s.as_str()))
        .bind(dto.title.as_deref().map(str::trim))
        .bind(dto.description.as_deref().map(str::trim))
        .bind(dto.rating)
        .bind(dto.priority.map(|p| p.as_str()))
        .execute(&self.pool)
        .await?;
        self.get(user_id, id).await
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        self.ensure_author(user_id, id).await?;
        sqlx::query("DELETE FROM feedback WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        tracing::info!("User {} deleted feedback {}", user_id, id);
        Ok(())
    }

    /// Add the user's vote, or take it back if already cast. Returns whether
    /// the user now has a vote on the entry.
    pub async fn toggle_vote(&self, user_id: Uuid, id: Uuid) -> Result<bool, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM feedback WHERE id = $1 FOR SHARE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        found(exists, "Feedback", id)?;

        let removed = sqlx::query("DELETE FROM feedback_votes WHERE feedback_id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            sqlx::query(
                "INSERT INTO feedback_votes (feedback_id, user_id) VALUES ($1, $2) \
                 ON CONFLICT (feedback_id, user_id) DO NOTHING",
            )
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        let voted = removed == 0;
        tracing::debug!("User {} vote on feedback {}: {}", user_id, id, voted);
        Ok(voted)
    }

    pub async fn stats(&self) -> Result<FeedbackStats, ServiceError> {
        let (total, this_month, average_rating): (i64, i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE created_at >= date_trunc('month', NOW())), \
             COALESCE(ROUND(AVG(rating), 2), 0) FROM feedback",
        )
        .fetch_one(&self.pool)
        .await?;

        let by_type = self.tally("feedback_type").await?;
        let by_status = self.tally("status").await?;
        Ok(FeedbackStats {
            total,
            this_month,
            average_rating,
            by_type,
            by_status,
        })
    }

    /// Most voted suggestions first; `query.limit()` caps the count
    pub async fn top_suggestions(&self, viewer: Uuid, query: PageQuery) -> Result<Vec<FeedbackView>, ServiceError> {
        let sql = format!(
            "{} WHERE f.feedback_type = $2 ORDER BY votes_count DESC, f.created_at DESC LIMIT $3",
            VIEW_SELECT
        );
        let rows = sqlx::query_as::<_, FeedbackViewRow>(&sql)
            .bind(viewer)
            .bind(FeedbackType::Suggestion.as_str())
            .bind(query.limit())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn ensure_author(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let author: Option<Uuid> = sqlx::query_scalar("SELECT user_id FROM feedback WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        if found(author, "Feedback", id)? != user_id {
            return Err(ServiceError::Forbidden("Feedback can only be changed by its author".to_string()));
        }
        Ok(())
    }

    /// Entry counts grouped by a text column of `feedback`
    async fn tally(&self, column: &'static str) -> Result<BTreeMap<String, i64>, ServiceError> {
        let sql = format!("SELECT {0}, COUNT(*) FROM feedback GROUP BY {0}", column);
        let rows: Vec<(String, i64)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }
}
