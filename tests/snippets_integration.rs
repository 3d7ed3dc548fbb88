//! Snippet lifecycle integration tests: sharing, versions, taxonomy, bulk.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::*;

async fn create_snippet(app: &axum::Router, cookie: &str, ws: &str, title: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/workspaces/{}/snippets", ws),
            Some(cookie),
            json!({ "title": title, "content": "fn main() {}", "language": "rust" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_share_toggle_lifecycle() {
    let app = test_app().await;
    let owner = register(&app, "owner@example.com", "owner").await;
    let ws = create_workspace(&app, &owner, "Team").await;
    let id = create_snippet(&app, &owner, &ws, "hello").await;

    // Enable sharing: a share token appears.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/snippets/{}/share", id),
            Some(&owner),
            json!({ "is_public": true }),
        ))
        .await
        .unwrap();
    let body = extract_json(response).await;
    let share_id = body["share_id"].as_str().unwrap().to_string();
    assert!(!share_id.is_empty());

    // The public endpoint serves it without auth.
    let response = app
        .clone()
        .oneshot(get_request(&format!("/shared/{}", share_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response).await["title"], "hello");

    // Re-enabling keeps the same token.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/snippets/{}/share", id),
            Some(&owner),
            json!({ "is_public": true }),
        ))
        .await
        .unwrap();
    assert_eq!(extract_json(response).await["share_id"], share_id.as_str());

    // Disabling clears the token and kills the public URL.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/snippets/{}/share", id),
            Some(&owner),
            json!({ "is_public": false }),
        ))
        .await
        .unwrap();
    assert!(extract_json(response).await["share_id"].is_null());

    let response = app
        .clone()
        .oneshot(get_request(&format!("/shared/{}", share_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_content_edits_append_versions() {
    let app = test_app().await;
    let owner = register(&app, "owner@example.com", "owner").await;
    let ws = create_workspace(&app, &owner, "Team").await;
    let id = create_snippet(&app, &owner, &ws, "hello").await;

    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/snippets/{}", id),
            Some(&owner),
            json!({ "content": "fn main() { println!(\"hi\"); }" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/snippets/{}/versions", id), Some(&owner)))
        .await
        .unwrap();
    let versions = extract_json(response).await;
    assert_eq!(versions.as_array().unwrap().len(), 2);
    // Newest first.
    assert!(versions[0]["content"].as_str().unwrap().contains("println"));
}

#[tokio::test]
async fn test_category_delete_detaches_snippets() {
    let app = test_app().await;
    let owner = register(&app, "owner@example.com", "owner").await;
    let ws = create_workspace(&app, &owner, "Team").await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/workspaces/{}/categories", ws),
            Some(&owner),
            json!({ "name": "Utils" }),
        ))
        .await
        .unwrap();
    let category_id = extract_json(response).await["id"].as_str().unwrap().to_string();

    let snippet_id = create_snippet(&app, &owner, &ws, "helper").await;
    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/snippets/{}", snippet_id),
            Some(&owner),
            json!({ "category_id": category_id }),
        ))
        .await
        .unwrap();
    assert_eq!(extract_json(response).await["category_id"], category_id.as_str());

    let response = app
        .clone()
        .oneshot(delete_request(&format!("/categories/{}", category_id), Some(&owner)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Snippet survives, detached.
    let response = app
        .clone()
        .oneshot(get_request(&format!("/snippets/{}", snippet_id), Some(&owner)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(extract_json(response).await["category_id"].is_null());
}

#[tokio::test]
async fn test_bulk_archive_and_labels() {
    let app = test_app().await;
    let owner = register(&app, "owner@example.com", "owner").await;
    let ws = create_workspace(&app, &owner, "Team").await;

    let a = create_snippet(&app, &owner, &ws, "a").await;
    let b = create_snippet(&app, &owner, &ws, "b").await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/workspaces/{}/labels", ws),
            Some(&owner),
            json!({ "name": "wip", "color": "#FF0000" }),
        ))
        .await
        .unwrap();
    let label_id = extract_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/workspaces/{}/snippets/bulk", ws),
            Some(&owner),
            json!({ "operation": "archive", "snippet_ids": [a, b] }),
        ))
        .await
        .unwrap();
    assert_eq!(extract_json(response).await["affected"], 2);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/workspaces/{}/snippets/bulk", ws),
            Some(&owner),
            json!({ "operation": "add_label", "snippet_ids": [a, b], "label_id": label_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/snippets/{}", a), Some(&owner)))
        .await
        .unwrap();
    let detail = extract_json(response).await;
    assert_eq!(detail["is_archived"], true);
    assert_eq!(detail["labels"].as_array().unwrap().len(), 1);
    assert_eq!(detail["labels"][0]["name"], "wip");

    // Label operations without a label id are rejected up front.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/workspaces/{}/snippets/bulk", ws),
            Some(&owner),
            json!({ "operation": "add_label", "snippet_ids": [a] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_includes_labels() {
    let app = test_app().await;
    let owner = register(&app, "owner@example.com", "owner").await;
    let ws = create_workspace(&app, &owner, "Team").await;
    create_snippet(&app, &owner, &ws, "a").await;
    create_snippet(&app, &owner, &ws, "b").await;

    let response = app
        .clone()
        .oneshot(get_request(&format!("/workspaces/{}/snippets/export", ws), Some(&owner)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let export = extract_json(response).await;
    assert_eq!(export["workspace_id"], ws.as_str());
    assert_eq!(export["snippets"].as_array().unwrap().len(), 2);
    assert!(export["snippets"][0]["labels"].is_array());
}

#[tokio::test]
async fn test_tasks_complete_and_reopen() {
    let app = test_app().await;
    let owner = register(&app, "owner@example.com", "owner").await;
    let ws = create_workspace(&app, &owner, "Team").await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/workspaces/{}/tasks", ws),
            Some(&owner),
            json!({ "title": "Ship it", "priority": "high" }),
        ))
        .await
        .unwrap();
    let task = extract_json(response).await;
    let id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["status"], "todo");

    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/tasks/{}", id),
            Some(&owner),
            json!({ "status": "done" }),
        ))
        .await
        .unwrap();
    assert!(extract_json(response).await["completed_at"].is_string());

    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/tasks/{}", id),
            Some(&owner),
            json!({ "status": "in_progress" }),
        ))
        .await
        .unwrap();
    assert!(extract_json(response).await["completed_at"].is_null());
}
