use serde::Deserialize;
use uuid::Uuid;

use super::validate::{FieldErrors, Validate};
use crate::auth::{PermissionAction, PermissionGrant, PermissionResource};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRole {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<PermissionGrant>,
}

impl Validate for CreateRole {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("name", &self.name, 2, Some(100));
        errors.optional_length("description", self.description.as_deref(), 0, Some(500));
        if self.permissions.is_empty() {
            errors.add("permissions", "At least one permission is required");
        }
        errors.finish("Invalid role")
    }
}

/// `permissions`, when present, replaces the whole grant list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRole {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<PermissionGrant>>,
}

impl Validate for UpdateRole {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("name", self.name.as_deref(), 2, Some(100));
        errors.optional_length("description", self.description.as_deref(), 0, Some(500));
        if self.permissions.as_ref().is_some_and(Vec::is_empty) {
            errors.add("permissions", "At least one permission is required");
        }
        errors.finish("Invalid role")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

impl Validate for AssignRole {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckPermission {
    pub action: PermissionAction,
    pub resource: PermissionResource,
}

impl Validate for CheckPermission {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_valid;
    use serde_json::json;

    #[test]
    fn create_needs_a_name_and_a_grant() {
        let err = parse_valid::<CreateRole>(json!({"name": "X", "permissions": []})).unwrap_err();
        let fields = &err.to_json()["field_errors"];
        assert!(fields.get("name").is_some());
        assert_eq!(fields["permissions"], "At least one permission is required");
    }

    #[test]
    fn grants_parse_with_conditions() {
        let dto: CreateRole = parse_valid(json!({
            "name": "Support",
            "permissions": [{"action": "READ", "resource": "USERS", "conditions": {"own": true}}]
        }))
        .unwrap();
        assert_eq!(dto.permissions[0].action, PermissionAction::Read);
        assert_eq!(dto.permissions[0].conditions, Some(json!({"own": true})));
    }

    #[test]
    fn unknown_resource_is_rejected() {
        let err = parse_valid::<CheckPermission>(json!({"action": "READ", "resource": "SPACESHIPS"})).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_JSON");
    }
}
