//! Routes reachable without a token.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;
use crate::middleware::ApiResponse;

/// GET / - Service name, version and route map
pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "CRM API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Kanban boards, sales pipelines, departments and notifications",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "kanban": "/api/kanban/* (protected)",
            "sales": "/api/sales/* (protected)",
            "departments": "/api/departments/* (protected)",
            "notifications": "/api/notifications/* (protected)",
            "roles": "/api/roles/* (protected)",
            "users": "/api/users/* (protected)",
            "support": "/api/support/* (protected)",
            "feedback": "/api/feedback/* (protected)",
        }
    }))
}

/// GET /health - 200 while the database answers, 503 otherwise
pub async fn health() -> impl IntoResponse {
    let now = Utc::now();

    match DatabaseManager::health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
