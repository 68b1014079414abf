use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub feedback_type: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub rating: i32,
    pub priority: String,
    pub status: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAuthor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

/// A feedback entry as listed to a user: vote tally, whether that user
/// voted, and the author unless the entry is anonymous
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub votes_count: i64,
    pub has_voted: bool,
    pub user: Option<FeedbackAuthor>,
}

/// Flat row behind [`FeedbackView`]
#[derive(Debug, Clone, FromRow)]
pub struct FeedbackViewRow {
    #[sqlx(flatten)]
    pub feedback: Feedback,
    pub votes_count: i64,
    pub has_voted: bool,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_avatar: Option<String>,
}

impl From<FeedbackViewRow> for FeedbackView {
    fn from(row: FeedbackViewRow) -> Self {
        let user = (!row.feedback.is_anonymous).then(|| FeedbackAuthor {
            id: row.feedback.user_id,
            first_name: row.author_first_name,
            last_name: row.author_last_name,
            avatar: row.author_avatar,
        });
        Self {
            feedback: row.feedback,
            votes_count: row.votes_count,
            has_voted: row.has_voted,
            user,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub total: i64,
    pub this_month: i64,
    pub average_rating: Decimal,
    pub by_type: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(is_anonymous: bool) -> FeedbackViewRow {
        let now = Utc::now();
        FeedbackViewRow {
            feedback: Feedback {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                feedback_type: "BUG".into(),
                category: "UI".into(),
                title: "Button overlaps".into(),
                description: "The save button overlaps the footer".into(),
                rating: 2,
                priority: "HIGH".into(),
                status: "UNDER_REVIEW".into(),
                is_anonymous,
                created_at: now,
                updated_at: now,
            },
            votes_count: 3,
            has_voted: true,
            author_first_name: "Ana".into(),
            author_last_name: "Lima".into(),
            author_avatar: None,
        }
    }

    #[test]
    fn anonymous_entries_hide_their_author() {
        let view = FeedbackView::from(row(true));
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["user"].is_null());
        assert_eq!(json["type"], "BUG");
        assert_eq!(json["votesCount"], 3);
        assert_eq!(json["hasVoted"], true);
    }

    #[test]
    fn named_entries_carry_their_author() {
        let source = row(false);
        let author_id = source.feedback.user_id;
        let view = FeedbackView::from(source);
        let user = view.user.unwrap();
        assert_eq!(user.id, author_id);
        assert_eq!(user.first_name, "Ana");
    }
}
