use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::user::UserSummary;
use crate::hierarchy::TreeItem;

/// Columns selected for every [`Department`] read, including child and member counts
pub const DEPARTMENT_COLUMNS: &str = "d.id, d.name, d.description, d.color, d.icon, d.parent_id, d.level, \
     d.position, d.is_active, d.created_at, d.updated_at, \
     (SELECT COUNT(*) FROM departments c WHERE c.parent_id = d.id) AS children_count, \
     (SELECT COUNT(*) FROM users u WHERE u.department_id = d.id) AS users_count";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<Uuid>,
    pub level: i32,
    pub position: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub children_count: i64,
    pub users_count: i64,
}

impl TreeItem for Department {
    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn position(&self) -> i32 {
        self.position
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DepartmentRef {
    pub id: Uuid,
    pub name: String,
}

/// A department with its parent, ordered children, members and managers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentDetail {
    #[serde(flatten)]
    pub department: Department,
    pub parent: Option<DepartmentRef>,
    pub children: Vec<Department>,
    pub users: Vec<UserSummary>,
    pub managers: Vec<UserSummary>,
}

/// One department of the organizational chart with its members
#[derive(Debug, Clone, Serialize)]
pub struct OrgUnit {
    #[serde(flatten)]
    pub department: Department,
    pub users: Vec<UserSummary>,
}

impl TreeItem for OrgUnit {
    fn id(&self) -> Uuid {
        self.department.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.department.parent_id
    }

    fn position(&self) -> i32 {
        self.department.position
    }
}
