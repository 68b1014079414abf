use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::department::Department;

pub const USER_SUMMARY_COLUMNS: &str = "id, email, first_name, last_name, avatar, job_title, department_id, \
     managed_department_id, manager_id, is_manager, is_department_head";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub job_title: Option<String>,
    pub department_id: Option<Uuid>,
    pub managed_department_id: Option<Uuid>,
    pub manager_id: Option<Uuid>,
    pub is_manager: bool,
    pub is_department_head: bool,
}

impl UserSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A user and the people reporting to them
#[derive(Debug, Clone, Serialize)]
pub struct UserNode {
    #[serde(flatten)]
    pub user: UserSummary,
    pub subordinates: Vec<UserNode>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserHierarchy {
    pub department: Department,
    pub head: Option<UserNode>,
    pub users_without_manager: Vec<UserSummary>,
}

pub const USER_ACCOUNT_COLUMNS: &str = "u.id, u.email, u.first_name, u.last_name, u.phone, u.avatar, u.job_title, \
     u.status, u.is_active, u.role_id, r.name AS role_name, u.department_id, u.last_login_at, u.created_at, u.updated_at";

/// Administrative view of an account. The password hash never leaves the database.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub job_title: Option<String>,
    pub status: String,
    pub is_active: bool,
    pub role_id: Option<Uuid>,
    pub role_name: Option<String>,
    pub department_id: Option<Uuid>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
