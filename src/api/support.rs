use serde::Deserialize;

use super::pagination::PageQuery;
use super::validate::{FieldErrors, Validate};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketCategory {
    Technical,
    Billing,
    Feature,
    Other,
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Technical => "TECHNICAL",
            TicketCategory::Billing => "BILLING",
            TicketCategory::Feature => "FEATURE",
            TicketCategory::Other => "OTHER",
        }
    }
}

/// Shared by support tickets and feedback entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "LOW",
            TicketPriority::Medium => "MEDIUM",
            TicketPriority::High => "HIGH",
            TicketPriority::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "OPEN",
            TicketStatus::InProgress => "IN_PROGRESS",
            TicketStatus::Closed => "CLOSED",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicket {
    pub subject: String,
    pub description: String,
    pub category: TicketCategory,
    #[serde(default)]
    pub priority: TicketPriority,
}

impl Validate for CreateTicket {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("subject", &self.subject, 5, Some(200));
        errors.length("description", &self.description, 10, Some(5000));
        errors.finish("Invalid ticket")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicket {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<String>,
}

impl Validate for UpdateTicket {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("subject", self.subject.as_deref(), 5, Some(200));
        errors.optional_length("description", self.description.as_deref(), 10, Some(5000));
        errors.finish("Invalid ticket")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFaq {
    pub question: String,
    pub answer: String,
    pub category: String,
    #[serde(default)]
    pub position: i32,
    pub is_active: Option<bool>,
}

impl Validate for CreateFaq {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("question", &self.question, 10, Some(500));
        errors.length("answer", &self.answer, 10, Some(5000));
        errors.length("category", &self.category, 2, Some(50));
        errors.non_negative("position", Some(self.position));
        errors.finish("Invalid FAQ")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFaq {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
    pub position: Option<i32>,
    pub is_active: Option<bool>,
}

impl Validate for UpdateFaq {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("question", self.question.as_deref(), 10, Some(500));
        errors.optional_length("answer", self.answer.as_deref(), 10, Some(5000));
        errors.optional_length("category", self.category.as_deref(), 2, Some(50));
        errors.non_negative("position", self.position);
        errors.finish("Invalid FAQ")
    }
}

/// `GET /api/support/faqs` filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaqQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl FaqQuery {
    pub fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    /// `ILIKE` pattern for the search term, with LIKE metacharacters escaped
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref().map(str::trim).filter(|term| !term.is_empty())?;
        let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        Some(format!("%{}%", escaped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_valid;
    use serde_json::json;

    #[test]
    fn ticket_priority_defaults_to_medium() {
        let dto: CreateTicket = parse_valid(json!({
            "subject": "Cannot export",
            "description": "The export button does nothing",
            "category": "TECHNICAL"
        }))
        .unwrap();
        assert_eq!(dto.priority, TicketPriority::Medium);
        assert_eq!(dto.category.as_str(), "TECHNICAL");
    }

    #[test]
    fn short_ticket_text_is_rejected() {
        let err = parse_valid::<CreateTicket>(json!({
            "subject": "Help",
            "description": "Broken",
            "category": "OTHER"
        }))
        .unwrap_err();
        let fields = &err.to_json()["field_errors"];
        assert_eq!(fields["subject"], "Must be at least 5 characters");
        assert_eq!(fields["description"], "Must be at least 10 characters");
    }

    #[test]
    fn ticket_status_uses_screaming_case() {
        let dto: UpdateTicket = parse_valid(json!({"status": "IN_PROGRESS"})).unwrap();
        assert_eq!(dto.status, Some(TicketStatus::InProgress));
        assert!(parse_valid::<UpdateTicket>(json!({"status": "DONE"})).is_err());
    }

    #[test]
    fn faq_position_must_not_be_negative() {
        let err = parse_valid::<UpdateFaq>(json!({"position": -1})).unwrap_err();
        assert_eq!(err.to_json()["field_errors"]["position"], "Must be zero or greater");
    }

    #[test]
    fn search_pattern_escapes_wildcards() {
        let query = FaqQuery {
            search: Some(" 100%_off ".into()),
            ..Default::default()
        };
        assert_eq!(query.search_pattern().as_deref(), Some("%100\\%\\_off%"));
        assert_eq!(FaqQuery::default().search_pattern(), None);
        let blank = FaqQuery {
            search: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(blank.search_pattern(), None);
    }
}
