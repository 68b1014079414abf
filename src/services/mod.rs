//! Business operations behind the HTTP handlers.
//!
//! Each mutating operation opens one transaction, runs the ordering or
//! hierarchy engine against Postgres stores bound to that transaction, and
//! commits. Notifications go out after the commit.

pub mod department_service;
pub mod feedback_service;
pub mod kanban_service;
pub mod notification_service;
pub mod role_service;
pub mod sales_service;
pub mod support_service;
pub mod user_service;

use thiserror::Error;

use crate::database::DatabaseError;
use crate::hierarchy::HierarchyError;
use crate::ordering::OrderingError;

pub use department_service::DepartmentService;
pub use feedback_service::FeedbackService;
pub use kanban_service::KanbanService;
pub use notification_service::NotificationService;
pub use role_service::RoleService;
pub use sales_service::SalesService;
pub use support_service::SupportService;
pub use user_service::UserService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Ordering(#[from] OrderingError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} {} not found", what, id))
    }
}

/// Treat a missing row as `NotFound` for the named entity
pub(crate) fn found<T>(row: Option<T>, what: &str, id: impl std::fmt::Display) -> Result<T, ServiceError> {
    row.ok_or_else(|| ServiceError::not_found(what, id))
}

pub(crate) const UNIQUE_VIOLATION: &str = "23505";
pub(crate) const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Whether `err` is a Postgres error with the given SQLSTATE
pub(crate) fn violates(err: &sqlx::Error, code: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|actual| actual == code)
}
