pub mod department;
pub mod feedback;
pub mod kanban;
pub mod notification;
pub mod role;
pub mod sales;
pub mod support;
pub mod user;

pub use department::{Department, DepartmentDetail, DepartmentRef, OrgUnit, DEPARTMENT_COLUMNS};
pub use feedback::{Feedback, FeedbackAuthor, FeedbackStats, FeedbackView, FeedbackViewRow};
pub use kanban::{
    BoardDetail, BoardSummary, CardActivity, CardComment, CardDetail, ColumnSummary, ColumnWithCards, KanbanBoard,
    KanbanCard, KanbanColumn,
};
pub use notification::Notification;
pub use role::{Role, RoleDetail, ROLE_COLUMNS};
pub use sales::{
    OpportunityDetail, PipelineDetail, SalesActivity, SalesComment, SalesOpportunity, SalesPipeline, SalesStage,
    StageWithOpportunities,
};
pub use support::{Faq, SupportTicket, FAQ_COLUMNS, TICKET_COLUMNS};
pub use user::{UserAccount, UserHierarchy, UserNode, UserSummary, USER_ACCOUNT_COLUMNS, USER_SUMMARY_COLUMNS};
