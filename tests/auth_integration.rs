//! Account and profile integration tests.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn test_profile_update_persists() {
    let app = test_app().await;
    let alice = register(&app, "alice@example.com", "alice").await;

    let response = app
        .clone()
        .oneshot(put_json(
            "/auth/me",
            Some(&alice),
            json!({ "display_name": "Alice L.", "username": "alice_l" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["display_name"], "Alice L.");
    assert_eq!(body["username"], "alice_l");

    let response = app
        .clone()
        .oneshot(get_request("/auth/me", Some(&alice)))
        .await
        .unwrap();
    let body = extract_json(response).await;
    assert_eq!(body["display_name"], "Alice L.");
    assert_eq!(body["username"], "alice_l");
}

#[tokio::test]
async fn test_profile_update_rejects_taken_username() {
    let app = test_app().await;
    let alice = register(&app, "alice@example.com", "alice").await;
    register(&app, "bob@example.com", "bob").await;

    let response = app
        .clone()
        .oneshot(put_json(
            "/auth/me",
            Some(&alice),
            json!({ "username": "bob" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response).await;
    assert_eq!(body["error"]["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn test_profile_update_rejects_blank_fields() {
    let app = test_app().await;
    let alice = register(&app, "alice@example.com", "alice").await;

    let response = app
        .clone()
        .oneshot(put_json(
            "/auth/me",
            Some(&alice),
            json!({ "display_name": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_update_requires_session() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(put_json("/auth/me", None, json!({ "display_name": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
