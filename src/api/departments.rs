use serde::Deserialize;
use uuid::Uuid;

use super::validate::{double_option, FieldErrors, Validate};
use crate::error::ApiError;
use crate::hierarchy::DepartmentDetails;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartment {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub position: Option<i32>,
}

impl CreateDepartment {
    pub fn details(&self) -> DepartmentDetails {
        DepartmentDetails {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            color: self.color.clone(),
            icon: self.icon.clone(),
        }
    }
}

impl Validate for CreateDepartment {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.length("name", &self.name, 2, Some(100));
        errors.optional_length("description", self.description.as_deref(), 0, Some(500));
        errors.hex_color("color", self.color.as_deref());
        errors.non_negative("position", self.position);
        errors.finish("Invalid department")
    }
}

/// Partial update. A `parentId` key (even `null`) turns the update into a move.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepartment {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub position: Option<i32>,
    pub is_active: Option<bool>,
}

impl Validate for UpdateDepartment {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.optional_length("name", self.name.as_deref(), 2, Some(100));
        errors.optional_length("description", self.description.as_deref(), 0, Some(500));
        errors.hex_color("color", self.color.as_deref());
        errors.non_negative("position", self.position);
        errors.finish("Invalid department")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDepartment {
    /// `null` moves the department to the root level
    pub new_parent_id: Option<Uuid>,
    pub new_position: Option<i32>,
}

impl Validate for MoveDepartment {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.non_negative("newPosition", self.new_position);
        errors.finish("Invalid move")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserToDepartment {
    pub user_id: Uuid,
    pub department_id: Uuid,
    /// Job title inside the department
    #[serde(alias = "position")]
    pub job_title: Option<String>,
    #[serde(default)]
    pub is_manager: bool,
    #[serde(default)]
    pub is_department_head: bool,
    pub manager_id: Option<Uuid>,
}

impl Validate for AddUserToDepartment {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if self.manager_id == Some(self.user_id) {
            errors.add("managerId", "A user cannot be their own manager");
        }
        errors.finish("Invalid department membership")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validate::parse_valid;
    use serde_json::json;

    #[test]
    fn update_tells_root_move_from_no_move() {
        let plain: UpdateDepartment = parse_valid(json!({"name": "Finance"})).unwrap();
        assert!(plain.parent_id.is_none());

        let to_root: UpdateDepartment = parse_valid(json!({"parentId": null})).unwrap();
        assert_eq!(to_root.parent_id, Some(None));
    }

    #[test]
    fn create_validates_name_and_color() {
        let err = parse_valid::<CreateDepartment>(json!({"name": "X", "color": "#12"})).unwrap_err();
        let fields = &err.to_json()["field_errors"];
        assert_eq!(fields["name"], "Must be at least 2 characters");
        assert!(fields.get("color").is_some());
    }

    #[test]
    fn add_user_accepts_position_as_job_title() {
        let dto: AddUserToDepartment = parse_valid(json!({
            "userId": Uuid::new_v4(),
            "departmentId": Uuid::new_v4(),
            "position": "Analyst"
        }))
        .unwrap();
        assert_eq!(dto.job_title.as_deref(), Some("Analyst"));
        assert!(!dto.is_department_head);
    }
}
