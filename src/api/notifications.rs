//! Notification Routes
//!
//! Routes:
//! - GET /notifications - Feed for the current user with unread count
//! - POST /notifications/:id/read - Mark one read
//! - POST /notifications/read-all - Mark everything read
//! - POST /admin/notifications - Create (global or targeted)
//! - GET /admin/notifications - List all
//! - DELETE /admin/notifications/:id - Delete
//! - GET /admin/notifications/targeting - Users available as recipients

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{self, Notification};
use crate::middleware::SessionUser;
use crate::services::{NotificationDraft, NotificationFeed};
use crate::{AppState, Result};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_feed))
        .route("/:id/read", post(mark_read))
        .route("/read-all", post(mark_all_read))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_notification))
        .route("/:id", axum::routing::delete(delete_notification))
        .route("/targeting", get(targeting))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
    pub link: Option<String>,
    #[serde(default)]
    pub is_global: bool,
    pub expires_at: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

fn default_kind() -> String {
    "info".to_string()
}

/// Recipient option for the admin targeting picker.
#[derive(Debug, Serialize)]
pub struct TargetingOption {
    pub id: String,
    pub display_name: String,
    pub email: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn get_feed(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<NotificationFeed>> {
    let feed = state.notifications.feed(&user.user_id).await?;
    Ok(Json(feed))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    state.notifications.mark_read(&user.user_id, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    state.notifications.mark_all_read(&user.user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn create_notification(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateNotificationRequest>,
) -> Result<Json<Notification>> {
    let notification = state
        .notifications
        .create(
            NotificationDraft {
                title: request.title,
                content: request.content,
                kind: request.kind,
                link: request.link,
                is_global: request.is_global,
                expires_at: request.expires_at,
                recipients: request.recipients,
            },
            &user.user_id,
        )
        .await?;

    info!(notification_id = %notification.id, global = notification.is_global, "Notification created");

    Ok(Json(notification))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Notification>>> {
    let notifications = db::list_all(&state.db).await?;
    Ok(Json(notifications))
}

async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    db::delete_notification(&state.db, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn targeting(State(state): State<AppState>) -> Result<Json<Vec<TargetingOption>>> {
    let users = db::list_users(&state.db).await?;
    let options = users
        .into_iter()
        .map(|u| TargetingOption {
            id: u.id,
            display_name: u.display_name,
            email: u.email,
        })
        .collect();
    Ok(Json(options))
}
