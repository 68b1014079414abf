use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::validate::{FieldErrors, Validate};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBoard {
    pub name: String,
    pub description: Option<String>,
}

impl Validate for CreateBoard {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("name", &self.name, 2, None);
        errors.finish("Invalid board")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBoard {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl Validate for UpdateBoard {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("name", self.name.as_deref(), 2, None);
        errors.finish("Invalid board")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateColumn {
    pub name: String,
    pub position: i32,
    pub color: Option<String>,
    pub limit: Option<i32>,
}

impl Validate for CreateColumn {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("name", &self.name, 1, None);
        errors.non_negative("position", Some(self.position));
        errors.positive("limit", self.limit);
        errors.finish("Invalid column")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateColumn {
    pub name: Option<String>,
    pub position: Option<i32>,
    pub color: Option<String>,
    pub limit: Option<i32>,
}

impl Validate for UpdateColumn {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("name", self.name.as_deref(), 1, None);
        errors.non_negative("position", self.position);
        errors.positive("limit", self.limit);
        errors.finish("Invalid column")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveColumn {
    pub new_position: i32,
}

impl Validate for MoveColumn {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.non_negative("newPosition", Some(self.new_position));
        errors.finish("Invalid move")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCard {
    pub title: String,
    pub description: Option<String>,
    pub position: i32,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Validate for CreateCard {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("title", &self.title, 1, None);
        errors.non_negative("position", Some(self.position));
        errors.finish("Invalid card")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCard {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
}

impl Validate for UpdateCard {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("title", self.title.as_deref(), 1, None);
        errors.non_negative("position", self.position);
        errors.finish("Invalid card")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCard {
    pub target_column_id: Uuid,
    pub new_position: i32,
}

impl Validate for MoveCard {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.non_negative("newPosition", Some(self.new_position));
        errors.finish("Invalid move")
    }
}

/// Body of both comment create and comment update
#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
}

impl Validate for CommentBody {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("content", &self.content, 1, None);
        errors.finish("Invalid comment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validate::parse_valid;
    use serde_json::json;

    #[test]
    fn card_defaults_priority_and_tags() {
        let card: CreateCard = parse_valid(json!({"title": "Ship it", "position": 0})).unwrap();
        assert_eq!(card.priority, Priority::Medium);
        assert!(card.tags.is_empty());
    }

    #[test]
    fn rejects_negative_positions_with_field_error() {
        let err = parse_valid::<MoveCard>(json!({
            "targetColumnId": Uuid::nil(),
            "newPosition": -3
        }))
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_json()["field_errors"]["newPosition"], "Must be zero or greater");
    }

    #[test]
    fn unknown_priority_is_invalid_json() {
        let err = parse_valid::<CreateCard>(json!({"title": "x", "position": 0, "priority": "SOMEDAY"})).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_JSON");
    }

    #[test]
    fn column_limit_must_be_positive() {
        let err = parse_valid::<CreateColumn>(json!({"name": "Doing", "position": 1, "limit": 0})).unwrap_err();
        assert_eq!(err.to_json()["field_errors"]["limit"], "Must be greater than zero");
    }
}
