use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::validate::{FieldErrors, Validate};
use crate::error::ApiError;
use crate::notifications::{NewNotification, NotificationType};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotification {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub user_id: Uuid,
    pub metadata: Option<Value>,
    pub action_url: Option<String>,
}

impl From<CreateNotification> for NewNotification {
    fn from(dto: CreateNotification) -> Self {
        NewNotification {
            user_id: dto.user_id,
            notification_type: dto.notification_type,
            title: dto.title,
            message: dto.message,
            metadata: dto.metadata,
            action_url: dto.action_url,
        }
    }
}

impl Validate for CreateNotification {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("title", &self.title, 1, None);
        errors.length("message", &self.message, 1, None);
        if let Some(url) = self.action_url.as_deref() {
            if !url.starts_with('/') && url::Url::parse(url).is_err() {
                errors.add("actionUrl", "Must be an absolute URL or start with '/'");
            }
        }
        errors.finish("Invalid notification")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsRead {
    pub notification_ids: Vec<Uuid>,
}

impl Validate for MarkAsRead {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if self.notification_ids.is_empty() {
            errors.add("notificationIds", "At least one notification is required");
        }
        errors.finish("Invalid request")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validate::parse_valid;
    use serde_json::json;

    #[test]
    fn action_url_may_be_relative_or_absolute() {
        let base = json!({"type": "SYSTEM", "title": "Hi", "message": "There", "userId": Uuid::nil()});

        let mut relative = base.clone();
        relative["actionUrl"] = json!("/dashboard/kanban");
        assert!(parse_valid::<CreateNotification>(relative).is_ok());

        let mut absolute = base.clone();
        absolute["actionUrl"] = json!("https://crm.example.com/x");
        assert!(parse_valid::<CreateNotification>(absolute).is_ok());

        let mut bad = base;
        bad["actionUrl"] = json!("dashboard");
        assert!(parse_valid::<CreateNotification>(bad).is_err());
    }

    #[test]
    fn mark_as_read_needs_ids() {
        let err = parse_valid::<MarkAsRead>(json!({"notificationIds": []})).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
