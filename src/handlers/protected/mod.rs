// Handlers behind the JWT and user-validation layers, mounted under /api.
// Handlers for shared resources check the role permission before calling a
// service; personal resources (tickets, feedback) are checked by ownership.

pub mod departments;
pub mod feedback;
pub mod kanban;
pub mod notifications;
pub mod roles;
pub mod sales;
pub mod support;
pub mod users;
