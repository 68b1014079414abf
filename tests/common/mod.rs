#![allow(dead_code)]

use std::sync::Once;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crm_api::auth::Claims;

pub const TEST_SECRET: &str = "integration-test-secret";

static INIT: Once = Once::new();

/// Put the test secret in place. The config singleton reads the environment
/// once, so this runs before anything touches `config()`.
pub fn init() {
    INIT.call_once(|| {
        std::env::set_var("JWT_SECRET", TEST_SECRET);
        std::env::remove_var("APP_ENV");
    });
}

pub fn router() -> Router {
    init();
    crm_api::app::app()
}

pub fn token(secret: &str, ttl: Duration) -> String {
    token_for(secret, Uuid::new_v4(), "tester@example.com", ttl)
}

/// Token whose subject is an existing user
pub fn token_for(secret: &str, user_id: Uuid, email: &str, ttl: Duration) -> String {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).expect("sign token")
}

/// Send one request through the router and decode the JSON body (Null when empty)
pub async fn send(method: Method, uri: &str, bearer: Option<&str>) -> Result<(StatusCode, Value)> {
    send_json(method, uri, bearer, None).await
}

/// Like [`send`], with an optional JSON request body
pub async fn send_json(
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))?,
        None => builder.body(Body::empty())?,
    };
    let response = router().oneshot(request).await?;

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}
