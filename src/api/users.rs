use serde::Deserialize;
use uuid::Uuid;

use super::validate::{FieldErrors, Validate};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Inactive => "INACTIVE",
            UserStatus::Suspended => "SUSPENDED",
        }
    }

    /// Only active accounts pass the user-validation layer
    pub fn is_active(&self) -> bool {
        matches!(self, UserStatus::Active)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub job_title: Option<String>,
    pub role_id: Option<Uuid>,
}

impl Validate for CreateUser {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.email("email", Some(&self.email));
        if self.password.chars().count() < 6 {
            errors.add("password", "Must be at least 6 characters");
        }
        errors.length("firstName", &self.first_name, 2, None);
        errors.length("lastName", &self.last_name, 2, None);
        avatar_url(&mut errors, self.avatar.as_deref());
        errors.finish("Invalid user")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub job_title: Option<String>,
    pub role_id: Option<Uuid>,
    pub status: Option<UserStatus>,
}

impl Validate for UpdateUser {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.email("email", self.email.as_deref());
        errors.optional_length("firstName", self.first_name.as_deref(), 2, None);
        errors.optional_length("lastName", self.last_name.as_deref(), 2, None);
        avatar_url(&mut errors, self.avatar.as_deref());
        errors.finish("Invalid user")
    }
}

fn avatar_url(errors: &mut FieldErrors, avatar: Option<&str>) {
    if avatar.is_some_and(|url| url::Url::parse(url).is_err()) {
        errors.add("avatar", "Must be an absolute URL");
    }
}
