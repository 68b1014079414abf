//! Request bodies accepted by the HTTP layer and their validation rules.

pub mod departments;
pub mod feedback;
pub mod kanban;
pub mod notifications;
pub mod pagination;
pub mod roles;
pub mod sales;
pub mod support;
pub mod users;
pub mod validate;

pub use pagination::{Page, PageQuery};
pub use validate::{parse_valid, Validate};
