//! Common test utilities and helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Once;
use tower::ServiceExt;

use atrium::{db, AppState};

pub const ADMIN_EMAIL: &str = "admin@example.com";

static ENV: Once = Once::new();

/// Build an application over a fresh in-memory database.
///
/// The pool is pinned to one connection because each in-memory SQLite
/// connection is its own database.
pub async fn test_app() -> Router {
    ENV.call_once(|| {
        std::env::set_var("ADMIN_EMAIL", ADMIN_EMAIL);
        std::env::set_var("SESSION_SECRET", "integration-test-secret");
    });

    let options = SqliteConnectOptions::from_str(":memory:")
        .expect("valid connection string")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create test database");
    db::initialize_schema(&pool)
        .await
        .expect("Failed to apply schema");

    atrium::app(AppState::with_pool(pool))
}

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Pull a named cookie out of the response's Set-Cookie headers,
/// returned as `name=value` for use in a Cookie request header.
pub fn extract_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Create a GET request with an optional session cookie
pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    build(Request::builder().uri(uri), cookie, Body::empty())
}

/// Create a POST request with JSON body
pub fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    build(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json"),
        cookie,
        Body::from(serde_json::to_string(&body).expect("serializable body")),
    )
}

/// Create a PUT request with JSON body
pub fn put_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    build(
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("Content-Type", "application/json"),
        cookie,
        Body::from(serde_json::to_string(&body).expect("serializable body")),
    )
}

/// Create a DELETE request
pub fn delete_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    build(
        Request::builder().method("DELETE").uri(uri),
        cookie,
        Body::empty(),
    )
}

fn build(
    builder: axum::http::request::Builder,
    cookie: Option<&str>,
    body: Body,
) -> Request<Body> {
    let builder = match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    };
    builder.body(body).expect("valid request")
}

/// Register a user and return their session cookie.
pub async fn register(app: &Router, email: &str, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/register",
            None,
            serde_json::json!({
                "email": email,
                "username": username,
                "password": "correct-horse-battery",
            }),
        ))
        .await
        .expect("register request");
    assert!(
        response.status().is_success(),
        "registration failed: {}",
        response.status()
    );
    extract_cookie(&response, "atrium_session").expect("session cookie set")
}

/// Register the admin account (matches ADMIN_EMAIL) and return its cookie.
pub async fn register_admin(app: &Router) -> String {
    register(app, ADMIN_EMAIL, "admin").await
}

/// Create a workspace and return its id.
pub async fn create_workspace(app: &Router, cookie: &str, name: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/workspaces",
            Some(cookie),
            serde_json::json!({ "name": name }),
        ))
        .await
        .expect("create workspace");
    assert!(response.status().is_success());
    extract_json(response).await["id"]
        .as_str()
        .expect("workspace id")
        .to_string()
}
