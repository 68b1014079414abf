use serde::Deserialize;

use super::support::TicketPriority;
use super::validate::{FieldErrors, Validate};
use crate::error::ApiError;

/// Stars given with a feedback entry
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
    Suggestion,
    Bug,
    Compliment,
    Complaint,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Suggestion => "SUGGESTION",
            FeedbackType::Bug => "BUG",
            FeedbackType::Compliment => "COMPLIMENT",
            FeedbackType::Complaint => "COMPLAINT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackCategory {
    Ui,
    Performance,
    Feature,
    Integration,
    Documentation,
    Other,
}

impl FeedbackCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackCategory::Ui => "UI",
            FeedbackCategory::Performance => "PERFORMANCE",
            FeedbackCategory::Feature => "FEATURE",
            FeedbackCategory::Integration => "INTEGRATION",
            FeedbackCategory::Documentation => "DOCUMENTATION",
            FeedbackCategory::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    UnderReview,
    Planned,
    InProgress,
    Fixed,
    Acknowledged,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::UnderReview => "UNDER_REVIEW",
            FeedbackStatus::Planned => "PLANNED",
            FeedbackStatus::InProgress => "IN_PROGRESS",
            FeedbackStatus::Fixed => "FIXED",
            FeedbackStatus::Acknowledged => "ACKNOWLEDGED",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedback {
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    pub category: FeedbackCategory,
    pub title: String,
    pub description: String,
    pub rating: i32,
    #[serde(default)]
    pub priority: TicketPriority,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl Validate for CreateFeedback {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("title", &self.title, 3, Some(200));
        errors.length("description", &self.description, 10, Some(5000));
        rating(&mut errors, Some(self.rating));
        errors.finish("Invalid feedback")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedback {
    pub status: Option<FeedbackStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub rating: Option<i32>,
    pub priority: Option<TicketPriority>,
}

impl Validate for UpdateFeedback {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("title", self.title.as_deref(), 3, Some(200));
        errors.optional_length("description", self.description.as_deref(), 10, Some(5000));
        rating(&mut errors, self.rating);
        errors.finish("Invalid feedback")
    }
}

fn rating(errors: &mut FieldErrors, value: Option<i32>) {
    if value.is_some_and(|v| !(0..=MAX_RATING).contains(&v)) {
        errors.add("rating", format!("Must be between 0 and {}", MAX_RATING));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_valid;
    use serde_json::json;

    #[test]
    fn create_reads_type_key_and_defaults() {
        let dto: CreateFeedback = parse_valid(json!({
            "type": "SUGGESTION",
            "category": "UI",
            "title": "Dark mode",
            "description": "Please add a dark theme",
            "rating": 4
        }))
        .unwrap();
        assert_eq!(dto.feedback_type, FeedbackType::Suggestion);
        assert_eq!(dto.priority, TicketPriority::Medium);
        assert!(!dto.is_anonymous);
    }

    #[test]
    fn rating_is_bounded() {
        let err = parse_valid::<UpdateFeedback>(json!({"rating": 6})).unwrap_err();
        assert_eq!(err.to_json()["field_errors"]["rating"], "Must be between 0 and 5");
        assert!(parse_valid::<UpdateFeedback>(json!({"rating": 0})).is_ok());
    }

    #[test]
    fn status_names_match_storage() {
        let dto: UpdateFeedback = parse_valid(json!({"status": "UNDER_REVIEW"})).unwrap();
        assert_eq!(dto.status.map(|s| s.as_str()), Some("UNDER_REVIEW"));
    }
}
