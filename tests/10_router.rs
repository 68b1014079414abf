mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use chrono::Duration;

use common::{send, token, TEST_SECRET};

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let (status, body) = send(Method::GET, "/", None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "CRM API");
    assert!(body["data"]["endpoints"]["kanban"].is_string());
    assert!(body["data"]["endpoints"]["feedback"].is_string());
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() -> Result<()> {
    for uri in [
        "/api/kanban/boards",
        "/api/sales/pipelines",
        "/api/departments",
        "/api/notifications/unread/count",
        "/api/notifications/stream",
        "/api/roles",
        "/api/users",
        "/api/support/faqs",
        "/api/feedback/stats",
    ] {
        let (status, body) = send(Method::GET, uri, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert_eq!(body["error"], true);
    }
    Ok(())
}

#[tokio::test]
async fn garbage_token_is_rejected() -> Result<()> {
    let (status, body) = send(Method::GET, "/api/kanban/boards", Some("not-a-jwt")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() -> Result<()> {
    let forged = token("someone-elses-secret", Duration::hours(1));
    let (status, _) = send(Method::GET, "/api/departments/organizational-structure", Some(&forged)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn expired_token_is_rejected() -> Result<()> {
    let expired = token(TEST_SECRET, Duration::hours(-3));
    let (status, _) = send(Method::DELETE, "/api/notifications", Some(&expired)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_not_found() -> Result<()> {
    let (status, _) = send(Method::GET, "/api/unknown", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
