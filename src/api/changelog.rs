//! Changelog Routes
//!
//! Routes:
//! - GET /changelog - Public release notes, newest first
//! - POST /admin/changelog - Create an entry
//! - PUT /admin/changelog/:id - Update an entry
//! - DELETE /admin/changelog/:id - Delete an entry

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::db::{self, ChangelogEntry};
use crate::middleware::SessionUser;
use crate::{AppState, Error, Result};

const TAGS: [&str; 3] = ["feature", "fix", "improvement"];

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/changelog", get(list_entries))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(create_entry))
        .route("/:id", put(update_entry).delete(delete_entry))
}

#[derive(Debug, Deserialize)]
pub struct ChangelogEntryRequest {
    pub version: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    pub published_at: Option<String>,
}

fn default_tag() -> String {
    "feature".to_string()
}

async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<ChangelogEntry>>> {
    let entries = db::list_changelog_entries(&state.db).await?;
    Ok(Json(entries))
}

async fn create_entry(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<ChangelogEntryRequest>,
) -> Result<Json<ChangelogEntry>> {
    validate(&request)?;
    let entry = db::create_changelog_entry(
        &state.db,
        db::CreateChangelogEntry {
            version: request.version,
            title: request.title,
            body: request.body,
            tag: request.tag,
            published_at: request.published_at,
            created_by_id: user.user_id,
        },
    )
    .await?;
    Ok(Json(entry))
}

async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChangelogEntryRequest>,
) -> Result<Json<ChangelogEntry>> {
    validate(&request)?;
    let entry = db::update_changelog_entry(
        &state.db,
        &id,
        &request.version,
        &request.title,
        &request.body,
        &request.tag,
    )
    .await?;
    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    db::delete_changelog_entry(&state.db, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

fn validate(request: &ChangelogEntryRequest) -> Result<()> {
    if request.version.trim().is_empty() || request.title.trim().is_empty() {
        return Err(Error::Validation(
            "Version and title are required".to_string(),
        ));
    }
    if !TAGS.contains(&request.tag.as_str()) {
        return Err(Error::Validation(format!("Invalid tag: {}", request.tag)));
    }
    Ok(())
}
