use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::kanban::Priority;
use super::validate::{FieldErrors, Validate};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Call,
    Email,
    Meeting,
    Task,
    Note,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Call => "CALL",
            ActivityType::Email => "EMAIL",
            ActivityType::Meeting => "MEETING",
            ActivityType::Task => "TASK",
            ActivityType::Note => "NOTE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Scheduled => "SCHEDULED",
            ActivityStatus::Completed => "COMPLETED",
            ActivityStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePipeline {
    pub name: String,
    pub description: Option<String>,
}

impl Validate for CreatePipeline {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("name", &self.name, 1, None);
        errors.finish("Invalid pipeline")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePipeline {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl Validate for UpdatePipeline {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("name", self.name.as_deref(), 1, None);
        errors.finish("Invalid pipeline")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStage {
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub color: Option<String>,
}

impl Validate for CreateStage {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("name", &self.name, 1, None);
        errors.non_negative("position", Some(self.position));
        errors.hex_color("color", self.color.as_deref());
        errors.finish("Invalid stage")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStage {
    pub name: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
    pub color: Option<String>,
}

impl Validate for UpdateStage {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("name", self.name.as_deref(), 1, None);
        errors.non_negative("position", self.position);
        errors.hex_color("color", self.color.as_deref());
        errors.finish("Invalid stage")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveStage {
    pub new_position: i32,
}

impl Validate for MoveStage {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.non_negative("newPosition", Some(self.new_position));
        errors.finish("Invalid move")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpportunity {
    pub title: String,
    pub description: Option<String>,
    pub company: String,
    pub contact: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub value: Option<Decimal>,
    pub stage_id: Uuid,
    pub position: Option<i32>,
    #[serde(default)]
    pub priority: Priority,
    pub assigned_to_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Validate for CreateOpportunity {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("title", &self.title, 1, None);
        errors.length("company", &self.company, 1, None);
        errors.length("contact", &self.contact, 1, None);
        errors.email("email", self.email.as_deref());
        if self.value.is_some_and(|v| v.is_sign_negative()) {
            errors.add("value", "Must be zero or greater");
        }
        errors.non_negative("position", self.position);
        errors.finish("Invalid opportunity")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOpportunity {
    pub title: Option<String>,
    pub description: Option<String>,
    pub company: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub value: Option<Decimal>,
    pub stage_id: Option<Uuid>,
    pub position: Option<i32>,
    pub priority: Option<Priority>,
    pub assigned_to_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
}

impl Validate for UpdateOpportunity {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("title", self.title.as_deref(), 1, None);
        errors.optional_length("company", self.company.as_deref(), 1, None);
        errors.optional_length("contact", self.contact.as_deref(), 1, None);
        errors.email("email", self.email.as_deref());
        if self.value.is_some_and(|v| v.is_sign_negative()) {
            errors.add("value", "Must be zero or greater");
        }
        errors.non_negative("position", self.position);
        errors.finish("Invalid opportunity")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOpportunity {
    pub stage_id: Uuid,
    pub position: Option<i32>,
}

impl Validate for MoveOpportunity {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.non_negative("position", self.position);
        errors.finish("Invalid move")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSalesComment {
    pub content: String,
    #[serde(default)]
    pub is_pinned: bool,
}

impl Validate for CreateSalesComment {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("content", &self.content, 1, None);
        errors.finish("Invalid comment")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSalesComment {
    pub content: Option<String>,
    pub is_pinned: Option<bool>,
}

impl Validate for UpdateSalesComment {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("content", self.content.as_deref(), 1, None);
        errors.finish("Invalid comment")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_date: DateTime<Utc>,
    pub scheduled_time: String,
    /// Defaults to the acting user
    pub assigned_to_id: Option<Uuid>,
}

impl Validate for CreateActivity {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("title", &self.title, 1, None);
        errors.clock_time("scheduledTime", Some(&self.scheduled_time));
        errors.finish("Invalid activity")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivity {
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub scheduled_time: Option<String>,
    pub status: Option<ActivityStatus>,
    pub completed_date: Option<DateTime<Utc>>,
    pub completed_time: Option<String>,
}

impl Validate for UpdateActivity {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("title", self.title.as_deref(), 1, None);
        errors.clock_time("scheduledTime", self.scheduled_time.as_deref());
        errors.clock_time("completedTime", self.completed_time.as_deref());
        errors.finish("Invalid activity")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validate::parse_valid;
    use serde_json::json;

    #[test]
    fn opportunity_requires_company_and_contact() {
        let err = parse_valid::<CreateOpportunity>(json!({
            "title": "Renewal",
            "company": "",
            "contact": " ",
            "stageId": Uuid::nil(),
            "value": -10
        }))
        .unwrap_err();
        let fields = &err.to_json()["field_errors"];
        assert!(fields.get("company").is_some());
        assert!(fields.get("contact").is_some());
        assert_eq!(fields["value"], "Must be zero or greater");
    }

    #[test]
    fn opportunity_value_accepts_numbers_and_strings() {
        let a: CreateOpportunity = parse_valid(json!({
            "title": "A", "company": "Acme", "contact": "Rui", "stageId": Uuid::nil(), "value": 1500
        }))
        .unwrap();
        let b: CreateOpportunity = parse_valid(json!({
            "title": "B", "company": "Acme", "contact": "Rui", "stageId": Uuid::nil(), "value": "1500.00"
        }))
        .unwrap();
        assert_eq!(a.value, b.value);
        assert_eq!(a.position, None);
    }

    #[test]
    fn activity_checks_time_and_type() {
        let ok: CreateActivity = parse_valid(json!({
            "type": "MEETING",
            "title": "Kickoff",
            "scheduledDate": "2024-05-01T14:00:00Z",
            "scheduledTime": "14:00"
        }))
        .unwrap();
        assert_eq!(ok.activity_type, ActivityType::Meeting);

        let err = parse_valid::<CreateActivity>(json!({
            "type": "MEETING",
            "title": "Kickoff",
            "scheduledDate": "2024-05-01T14:00:00Z",
            "scheduledTime": "2pm"
        }))
        .unwrap_err();
        assert!(err.to_json()["field_errors"].get("scheduledTime").is_some());
    }

    #[test]
    fn stage_color_must_be_hex() {
        let err = parse_valid::<CreateStage>(json!({"name": "Won", "position": 0, "color": "green"})).unwrap_err();
        assert!(err.to_json()["field_errors"].get("color").is_some());
    }
}
