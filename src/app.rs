use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, patch, post};
use axum::{middleware, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::config;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, validate_user_middleware};

/// Full HTTP surface: public routes plus everything under `/api` behind
/// token and user validation.
pub fn app() -> Router {
    let settings = config();

    let api = Router::new()
        .merge(kanban_routes())
        .merge(sales_routes())
        .merge(department_routes())
        .merge(notification_routes())
        .merge(account_routes())
        .merge(support_routes())
        .merge(feedback_routes())
        .layer(middleware::from_fn(validate_user_middleware))
        .layer(middleware::from_fn(jwt_auth_middleware));

    let mut router = Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(api)
        .layer(DefaultBodyLimit::max(settings.api.max_request_size_bytes))
        .layer(cors_layer(&settings.security.cors_origins));

    if settings.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

/// `*` in the origin list allows any origin; unparseable entries are dropped
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn kanban_routes() -> Router {
    use protected::kanban;

    Router::new()
        .route("/api/kanban/boards", post(kanban::board_post).get(kanban::board_list))
        .route(
            "/api/kanban/boards/:id",
            get(kanban::board_get)
                .patch(kanban::board_patch)
                .delete(kanban::board_delete),
        )
        .route("/api/kanban/boards/:id/columns", post(kanban::column_post))
        .route(
            "/api/kanban/columns/:id",
            patch(kanban::column_patch).delete(kanban::column_delete),
        )
        .route("/api/kanban/columns/:id/move", patch(kanban::column_move))
        .route("/api/kanban/columns/:id/cards", post(kanban::card_post))
        .route(
            "/api/kanban/cards/:id",
            get(kanban::card_get)
                .patch(kanban::card_patch)
                .delete(kanban::card_delete),
        )
        .route("/api/kanban/cards/:id/move", patch(kanban::card_move))
        .route("/api/kanban/cards/:id/comments", post(kanban::comment_post))
        .route(
            "/api/kanban/comments/:id",
            patch(kanban::comment_patch).delete(kanban::comment_delete),
        )
}

fn sales_routes() -> Router {
    use protected::sales;

    Router::new()
        .route("/api/sales/pipelines", post(sales::pipeline_post).get(sales::pipeline_list))
        .route(
            "/api/sales/pipelines/:id",
            get(sales::pipeline_get)
                .patch(sales::pipeline_patch)
                .delete(sales::pipeline_delete),
        )
        .route("/api/sales/pipelines/:id/stages", post(sales::stage_post))
        .route(
            "/api/sales/stages/:id",
            patch(sales::stage_patch).delete(sales::stage_delete),
        )
        .route("/api/sales/stages/:id/move", patch(sales::stage_move))
        .route("/api/sales/opportunities", post(sales::opportunity_post))
        .route(
            "/api/sales/opportunities/:id",
            get(sales::opportunity_get)
                .patch(sales::opportunity_patch)
                .delete(sales::opportunity_delete),
        )
        .route("/api/sales/opportunities/:id/move", patch(sales::opportunity_move))
        .route("/api/sales/opportunities/:id/comments", post(sales::comment_post))
        .route("/api/sales/opportunities/:id/activities", post(sales::activity_post))
        .route(
            "/api/sales/comments/:id",
            patch(sales::comment_patch).delete(sales::comment_delete),
        )
        .route(
            "/api/sales/activities/:id",
            patch(sales::activity_patch).delete(sales::activity_delete),
        )
        .route("/api/sales/activities/:id/complete", patch(sales::activity_complete))
}

fn department_routes() -> Router {
    use protected::departments;

    Router::new()
        .route(
            "/api/departments",
            post(departments::department_post).get(departments::department_list),
        )
        .route(
            "/api/departments/organizational-structure",
            get(departments::department_structure),
        )
        .route("/api/departments/add-user", post(departments::member_add))
        .route(
            "/api/departments/:id",
            get(departments::department_get)
                .patch(departments::department_patch)
                .delete(departments::department_delete),
        )
        .route("/api/departments/:id/hierarchy", get(departments::member_hierarchy))
        .route("/api/departments/:id/move", patch(departments::department_move))
        .route(
            "/api/departments/:id/users/:user_id",
            axum::routing::delete(departments::member_remove),
        )
        .route(
            "/api/departments/:id/set-head/:user_id",
            post(departments::member_set_head),
        )
}

fn notification_routes() -> Router {
    use protected::notifications;

    Router::new()
        .route(
            "/api/notifications",
            post(notifications::post)
                .get(notifications::list)
                .delete(notifications::delete_all),
        )
        .route("/api/notifications/stream", get(notifications::stream))
        .route("/api/notifications/unread", get(notifications::unread))
        .route("/api/notifications/unread/count", get(notifications::unread_count))
        .route("/api/notifications/mark-read", patch(notifications::mark_read))
        .route("/api/notifications/mark-all-read", patch(notifications::mark_all_read))
        .route("/api/notifications/:id", axum::routing::delete(notifications::delete))
}

fn account_routes() -> Router {
    use protected::{roles, users};

    Router::new()
        .route("/api/roles", post(roles::role_post).get(roles::role_list))
        .route("/api/roles/assign", post(roles::access_assign))
        .route("/api/roles/check-permission", post(roles::access_check))
        .route("/api/roles/me/permissions", get(roles::access_mine))
        .route("/api/roles/create-defaults", post(roles::access_create_defaults))
        .route(
            "/api/roles/:id",
            get(roles::role_get).patch(roles::role_patch).delete(roles::role_delete),
        )
        .route("/api/users", post(users::account_post).get(users::account_list))
        .route(
            "/api/users/:id",
            get(users::account_get)
                .patch(users::account_patch)
                .delete(users::account_delete),
        )
}

fn support_routes() -> Router {
    use protected::support;

    Router::new()
        .route("/api/support/tickets", post(support::ticket_post).get(support::ticket_list))
        .route(
            "/api/support/tickets/:id",
            get(support::ticket_get)
                .patch(support::ticket_patch)
                .delete(support::ticket_delete),
        )
        .route("/api/support/faqs", post(support::faq_post).get(support::faq_list))
        .route("/api/support/faqs/categories", get(support::faq_categories))
        .route(
            "/api/support/faqs/:id",
            get(support::faq_get).patch(support::faq_patch).delete(support::faq_delete),
        )
}

fn feedback_routes() -> Router {
    use protected::feedback;

    Router::new()
        .route("/api/feedback", post(feedback::entry_post).get(feedback::entry_list))
        .route("/api/feedback/my", get(feedback::entry_mine))
        .route("/api/feedback/stats", get(feedback::vote_stats))
        .route("/api/feedback/top-suggestions", get(feedback::vote_top_suggestions))
        .route(
            "/api/feedback/:id",
            get(feedback::entry_get)
                .patch(feedback::entry_patch)
                .delete(feedback::entry_delete),
        )
        .route("/api/feedback/:id/vote", post(feedback::vote_toggle))
}
