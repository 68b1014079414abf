//! End-to-end scenarios against a real Postgres.
//!
//! Ignored by default; run with `DATABASE_URL=postgres://... cargo test -- --ignored`.
//! Every test creates its own users, boards and departments, so they can share
//! one database and run in parallel.

mod common;

use std::future::Future;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use uuid::Uuid;

use common::{send_json, token_for, TEST_SECRET};
use crm_api::database::DatabaseManager;

/// The pool singleton outlives any one test, so all of them share a runtime
fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("test runtime")
    })
}

/// Run `scenario` against the migrated database; a no-op without `DATABASE_URL`
fn with_database<F, Fut>(scenario: F) -> Result<()>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL is not set, skipping");
        return Ok(());
    }
    common::init();
    runtime().block_on(async {
        DatabaseManager::migrate().await.context("migrating the test database")?;
        scenario().await
    })
}

struct Actor {
    id: Uuid,
    token: String,
}

impl Actor {
    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        send_json(method, uri, Some(&self.token), body).await
    }
}

fn tag() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A fresh active user whose role holds exactly `grants`
async fn actor(grants: &[(&str, &str)]) -> Result<Actor> {
    let pool = DatabaseManager::pool().await?;
    let tag = tag();

    let role_id: Uuid = sqlx::query_scalar("INSERT INTO roles (name) VALUES ($1) RETURNING id")
        .bind(format!("role-{}", tag))
        .fetch_one(&pool)
        .await?;
    for (action, resource) in grants {
        sqlx::query("INSERT INTO role_permissions (role_id, action, resource) VALUES ($1, $2, $3)")
            .bind(role_id)
            .bind(action)
            .bind(resource)
            .execute(&pool)
            .await?;
    }

    let email = format!("{}@example.com", tag);
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email, first_name, last_name, role_id) VALUES ($1, 'Test', 'User', $2) RETURNING id",
    )
    .bind(&email)
    .bind(role_id)
    .fetch_one(&pool)
    .await?;

    Ok(Actor {
        id,
        token: token_for(TEST_SECRET, id, &email, Duration::hours(1)),
    })
}

async fn admin() -> Result<Actor> {
    actor(&[("MANAGE", "ALL")]).await
}

fn id_of(body: &Value) -> Result<String> {
    body["data"]["id"]
        .as_str()
        .map(str::to_string)
        .context("response carries no id")
}

async fn create_board(admin: &Actor, columns: &[&str]) -> Result<(String, Vec<String>)> {
    let (status, body) = admin
        .call(Method::POST, "/api/kanban/boards", Some(json!({ "name": format!("Board {}", tag()) })))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let board = id_of(&body)?;

    let mut ids = Vec::new();
    for (position, name) in columns.iter().enumerate() {
        let (status, body) = admin
            .call(
                Method::POST,
                &format!("/api/kanban/boards/{}/columns", board),
                Some(json!({ "name": name, "position": position })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        ids.push(id_of(&body)?);
    }
    Ok((board, ids))
}

/// `(name, position)` of each column and `(title, position)` of its cards, in board order
async fn board_layout(admin: &Actor, board: &str) -> Result<Vec<(String, i64, Vec<(String, i64)>)>> {
    let (status, body) = admin.call(Method::GET, &format!("/api/kanban/boards/{}", board), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let columns = body["data"]["columns"].as_array().context("board without columns")?;
    Ok(columns
        .iter()
        .map(|column| {
            let cards = column["cards"]
                .as_array()
                .map(|cards| {
                    cards
                        .iter()
                        .map(|card| {
                            let title = card["title"].as_str().unwrap_or_default().to_string();
                            (title, card["position"].as_i64().unwrap_or(-1))
                        })
                        .collect()
                })
                .unwrap_or_default();
            (
                column["name"].as_str().unwrap_or_default().to_string(),
                column["position"].as_i64().unwrap_or(-1),
                cards,
            )
        })
        .collect())
}

fn column_names(layout: &[(String, i64, Vec<(String, i64)>)]) -> Vec<(&str, i64)> {
    layout.iter().map(|(name, position, _)| (name.as_str(), *position)).collect()
}

fn card_titles(layout: &[(String, i64, Vec<(String, i64)>)], column: usize) -> Vec<(&str, i64)> {
    layout[column].2.iter().map(|(title, position)| (title.as_str(), *position)).collect()
}

async fn create_department(admin: &Actor, name: &str, parent: Option<&str>) -> Result<String> {
    let (status, body) = admin
        .call(
            Method::POST,
            "/api/departments",
            Some(json!({ "name": format!("{} {}", name, tag()), "parentId": parent })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    id_of(&body)
}

async fn department(admin: &Actor, id: &str) -> Result<Value> {
    let (status, body) = admin.call(Method::GET, &format!("/api/departments/{}", id), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    Ok(body["data"].clone())
}

#[test]
#[ignore]
fn moving_a_column_first_then_deleting_compacts_the_board() -> Result<()> {
    with_database(|| async {
        let admin = admin().await?;
        let (board, columns) = create_board(&admin, &["Backlog", "Doing", "Done"]).await?;

        let (status, _) = admin
            .call(
                Method::PATCH,
                &format!("/api/kanban/columns/{}/move", columns[1]),
                Some(json!({ "newPosition": 0 })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        let layout = board_layout(&admin, &board).await?;
        assert_eq!(column_names(&layout), vec![("Doing", 0), ("Backlog", 1), ("Done", 2)]);

        let (status, _) = admin
            .call(Method::DELETE, &format!("/api/kanban/columns/{}", columns[0]), None)
            .await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let layout = board_layout(&admin, &board).await?;
        assert_eq!(column_names(&layout), vec![("Doing", 0), ("Done", 1)]);
        Ok(())
    })
}

#[test]
#[ignore]
fn card_moved_across_and_back_restores_both_columns() -> Result<()> {
    with_database(|| async {
        let admin = admin().await?;
        let (board, columns) = create_board(&admin, &["Todo", "Review"]).await?;

        let mut cards = Vec::new();
        for (column, titles) in [(0, ["a0", "a1", "a2", "a3"].as_slice()), (1, ["b0", "b1"].as_slice())] {
            for (position, title) in titles.iter().enumerate() {
                let (status, body) = admin
                    .call(
                        Method::POST,
                        &format!("/api/kanban/columns/{}/cards", columns[column]),
                        Some(json!({ "title": title, "position": position })),
                    )
                    .await?;
                assert_eq!(status, StatusCode::CREATED, "{}", body);
                cards.push(id_of(&body)?);
            }
        }
        let before = board_layout(&admin, &board).await?;

        let moved = &cards[2];
        let (status, _) = admin
            .call(
                Method::PATCH,
                &format!("/api/kanban/cards/{}/move", moved),
                Some(json!({ "targetColumnId": columns[1], "newPosition": 0 })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        let during = board_layout(&admin, &board).await?;
        assert_eq!(card_titles(&during, 0), vec![("a0", 0), ("a1", 1), ("a3", 2)]);
        assert_eq!(card_titles(&during, 1), vec![("a2", 0), ("b0", 1), ("b1", 2)]);

        let (status, _) = admin
            .call(
                Method::PATCH,
                &format!("/api/kanban/cards/{}/move", moved),
                Some(json!({ "targetColumnId": columns[0], "newPosition": 2 })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board_layout(&admin, &board).await?, before);
        Ok(())
    })
}

#[test]
#[ignore]
fn department_moves_reject_cycles_and_cascade_levels() -> Result<()> {
    with_database(|| async {
        let admin = admin().await?;
        let root = create_department(&admin, "Root", None).await?;
        let a = create_department(&admin, "Sales", Some(&root)).await?;
        let b = create_department(&admin, "Inside Sales", Some(&a)).await?;
        assert_eq!(department(&admin, &b).await?["level"], 2);

        for target in [&b, &a] {
            let (status, body) = admin
                .call(
                    Method::PATCH,
                    &format!("/api/departments/{}/move", a),
                    Some(json!({ "newParentId": target })),
                )
                .await?;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        }
        assert_eq!(department(&admin, &a).await?["parentId"], json!(root));

        let (status, body) = admin
            .call(
                Method::PATCH,
                &format!("/api/departments/{}/move", a),
                Some(json!({ "newParentId": null })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(department(&admin, &a).await?["level"], 0);
        assert_eq!(department(&admin, &b).await?["level"], 1);
        Ok(())
    })
}

#[test]
#[ignore]
fn department_with_a_child_cannot_be_deleted() -> Result<()> {
    with_database(|| async {
        let admin = admin().await?;
        let parent = create_department(&admin, "Operations", None).await?;
        let child = create_department(&admin, "Logistics", Some(&parent)).await?;

        let (status, _) = admin
            .call(Method::DELETE, &format!("/api/departments/{}", parent), None)
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let detail = department(&admin, &parent).await?;
        assert_eq!(detail["childrenCount"], 1);
        assert_eq!(department(&admin, &child).await?["parentId"], json!(parent));
        Ok(())
    })
}

#[test]
#[ignore]
fn replacing_the_head_leaves_exactly_one() -> Result<()> {
    with_database(|| async {
        let admin = admin().await?;
        let dept = create_department(&admin, "Finance", None).await?;

        let mut users = Vec::new();
        for name in ["Ana", "Bruno"] {
            let (status, body) = admin
                .call(
                    Method::POST,
                    "/api/users",
                    Some(json!({
                        "email": format!("{}-{}@example.com", name.to_lowercase(), tag()),
                        "password": "s3cret-pass",
                        "firstName": name,
                        "lastName": "Souza"
                    })),
                )
                .await?;
            assert_eq!(status, StatusCode::CREATED, "{}", body);
            users.push(id_of(&body)?);
        }

        for user in &users {
            let (status, body) = admin
                .call(Method::POST, &format!("/api/departments/{}/set-head/{}", dept, user), None)
                .await?;
            assert_eq!(status, StatusCode::OK, "{}", body);
        }

        let pool = DatabaseManager::pool().await?;
        let heads: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM users WHERE managed_department_id = $1 AND is_department_head",
        )
        .bind(Uuid::parse_str(&dept)?)
        .fetch_all(&pool)
        .await?;
        assert_eq!(heads, vec![Uuid::parse_str(&users[1])?]);
        Ok(())
    })
}

#[test]
#[ignore]
fn duplicate_role_names_and_emails_conflict() -> Result<()> {
    with_database(|| async {
        let admin = admin().await?;

        let role = json!({
            "name": format!("Auditors {}", tag()),
            "permissions": [{ "action": "READ", "resource": "REPORTS" }]
        });
        let (status, body) = admin.call(Method::POST, "/api/roles", Some(role.clone())).await?;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["data"]["userCount"], 0);
        let (status, body) = admin.call(Method::POST, "/api/roles", Some(role)).await?;
        assert_eq!(status, StatusCode::CONFLICT, "{}", body);

        let user = json!({
            "email": format!("dup-{}@example.com", tag()),
            "password": "s3cret-pass",
            "firstName": "Carla",
            "lastName": "Dias"
        });
        let (status, _) = admin.call(Method::POST, "/api/users", Some(user.clone())).await?;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = admin.call(Method::POST, "/api/users", Some(user)).await?;
        assert_eq!(status, StatusCode::CONFLICT);
        Ok(())
    })
}

#[test]
#[ignore]
fn stored_grants_gate_each_route() -> Result<()> {
    with_database(|| async {
        let viewer = actor(&[("READ", "KANBAN_BOARDS")]).await?;

        let (status, _) = viewer.call(Method::GET, "/api/kanban/boards", None).await?;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = viewer
            .call(Method::POST, "/api/kanban/boards", Some(json!({ "name": "Nope" })))
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, body) = viewer.call(Method::GET, "/api/roles/me/permissions", None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([{ "action": "READ", "resource": "KANBAN_BOARDS" }]));
        Ok(())
    })
}

#[test]
#[ignore]
fn tickets_stay_private_and_votes_toggle() -> Result<()> {
    with_database(|| async {
        let author = actor(&[]).await?;
        let other = actor(&[]).await?;

        let (status, body) = author
            .call(
                Method::POST,
                "/api/support/tickets",
                Some(json!({
                    "subject": "Export fails",
                    "description": "CSV export returns an empty file",
                    "category": "TECHNICAL"
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["data"]["priority"], "MEDIUM");
        assert_eq!(body["data"]["userId"], json!(author.id));
        let ticket = id_of(&body)?;
        let (status, _) = other.call(Method::GET, &format!("/api/support/tickets/{}", ticket), None).await?;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = author
            .call(
                Method::POST,
                "/api/feedback",
                Some(json!({
                    "type": "SUGGESTION",
                    "category": "FEATURE",
                    "title": "Bulk edit",
                    "description": "Edit many cards at once",
                    "rating": 4,
                    "isAnonymous": true
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert!(body["data"]["user"].is_null());
        let feedback = id_of(&body)?;

        let vote = format!("/api/feedback/{}/vote", feedback);
        let (_, body) = other.call(Method::POST, &vote, None).await?;
        assert_eq!(body["data"]["voted"], true);
        let (_, body) = other.call(Method::GET, &format!("/api/feedback/{}", feedback), None).await?;
        assert_eq!(body["data"]["votesCount"], 1);
        assert_eq!(body["data"]["hasVoted"], true);

        let (_, body) = other.call(Method::POST, &vote, None).await?;
        assert_eq!(body["data"]["voted"], false);

        let (status, _) = other
            .call(Method::DELETE, &format!("/api/feedback/{}", feedback), None)
            .await?;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    })
}
