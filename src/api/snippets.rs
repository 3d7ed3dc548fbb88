//! Snippet Routes
//!
//! Snippet CRUD, flag toggles, sharing, versions, bulk operations, export,
//! and the workspace taxonomy (categories and labels).
//!
//! Routes:
//! - GET/POST /workspaces/:workspace_id/snippets
//! - POST /workspaces/:workspace_id/snippets/bulk
//! - GET /workspaces/:workspace_id/snippets/export
//! - GET/PUT/DELETE /snippets/:id
//! - POST /snippets/:id/{pin,favorite,archive,share}
//! - GET /snippets/:id/versions
//! - POST /snippets/:id/labels, DELETE /snippets/:id/labels/:label_id
//! - GET /shared/:share_id (public)
//! - Categories and labels: CRUD under the workspace plus /:id item routes

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{
    self, now_rfc3339, Category, Label, Snippet, SnippetFlag, SnippetVersion,
};
use crate::middleware::SessionUser;
use crate::{AppState, Error, Result};

use super::projects::require_editor;

pub fn workspace_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_snippets).post(create_snippet))
        .route("/bulk", post(bulk_operation))
        .route("/export", get(export_snippets))
}

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:id",
            get(get_snippet).put(update_snippet).delete(delete_snippet),
        )
        .route("/:id/pin", post(toggle_pin))
        .route("/:id/favorite", post(toggle_favorite))
        .route("/:id/archive", post(toggle_archive))
        .route("/:id/share", post(set_sharing))
        .route("/:id/versions", get(list_versions))
        .route("/:id/labels", post(add_label))
        .route("/:id/labels/:label_id", axum::routing::delete(remove_label))
}

/// Public share endpoint, no auth.
pub fn shared_routes() -> Router<AppState> {
    Router::new().route("/shared/:share_id", get(get_shared_snippet))
}

pub fn category_routes() -> Router<AppState> {
    Router::new().route("/", get(list_categories).post(create_category))
}

pub fn category_item_routes() -> Router<AppState> {
    Router::new().route("/:id", put(update_category).delete(delete_category))
}

pub fn label_routes() -> Router<AppState> {
    Router::new().route("/", get(list_labels).post(create_label))
}

pub fn label_item_routes() -> Router<AppState> {
    Router::new().route("/:id", put(update_label).delete(delete_label))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSnippetRequest {
    pub title: String,
    pub content: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub category_id: Option<String>,
}

fn default_language() -> String {
    "plain".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateSnippetRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
    #[serde(default, deserialize_with = "super::projects::double_option")]
    pub category_id: Option<Option<String>>,
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddLabelRequest {
    pub label_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    Archive,
    Unarchive,
    Delete,
    Favorite,
    Unfavorite,
    Pin,
    Unpin,
    AddLabel,
    RemoveLabel,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub operation: BulkOperation,
    pub snippet_ids: Vec<String>,
    pub label_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub affected: u64,
}

/// Snippet with its labels attached.
#[derive(Debug, Serialize)]
pub struct SnippetDetail {
    #[serde(flatten)]
    pub snippet: Snippet,
    pub labels: Vec<Label>,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub workspace_id: String,
    pub exported_at: String,
    pub snippets: Vec<SnippetDetail>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLabelRequest {
    pub name: String,
    #[serde(default = "default_label_color")]
    pub color: String,
}

fn default_label_color() -> String {
    "#6366F1".to_string()
}

// ============================================================================
// Snippet Handlers
// ============================================================================

async fn list_snippets(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<Snippet>>> {
    db::require_membership(&state.db, &workspace_id, &user.user_id).await?;
    let snippets = db::list_snippets(&state.db, &workspace_id).await?;
    Ok(Json(snippets))
}

async fn create_snippet(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateSnippetRequest>,
) -> Result<Json<Snippet>> {
    require_editor(&state, &workspace_id, &user).await?;
    if request.title.trim().is_empty() {
        return Err(Error::Validation("Snippet title is required".to_string()));
    }
    if let Some(category_id) = &request.category_id {
        require_category_in_workspace(&state, category_id, &workspace_id).await?;
    }

    let snippet = db::create_snippet(
        &state.db,
        db::CreateSnippet {
            workspace_id,
            category_id: request.category_id,
            title: request.title.trim().to_string(),
            content: request.content,
            language: request.language,
            created_by_id: user.user_id,
        },
    )
    .await?;

    info!(snippet_id = %snippet.id, "Snippet created");

    Ok(Json(snippet))
}

async fn get_snippet(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<SnippetDetail>> {
    let snippet = db::get_snippet(&state.db, &id).await?;
    db::require_membership(&state.db, &snippet.workspace_id, &user.user_id).await?;
    let labels = db::labels_for_snippet(&state.db, &id).await?;
    Ok(Json(SnippetDetail { snippet, labels }))
}

async fn update_snippet(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<UpdateSnippetRequest>,
) -> Result<Json<Snippet>> {
    let snippet = db::get_snippet(&state.db, &id).await?;
    require_editor(&state, &snippet.workspace_id, &user).await?;

    if let Some(Some(category_id)) = &request.category_id {
        require_category_in_workspace(&state, category_id, &snippet.workspace_id).await?;
    }

    let snippet = db::update_snippet(
        &state.db,
        &id,
        db::UpdateSnippet {
            title: request.title,
            content: request.content,
            language: request.language,
            category_id: request.category_id,
            position: request.position,
        },
        &user.user_id,
    )
    .await?;
    Ok(Json(snippet))
}

async fn delete_snippet(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    let snippet = db::get_snippet(&state.db, &id).await?;
    require_editor(&state, &snippet.workspace_id, &user).await?;
    db::delete_snippet(&state.db, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn toggle_pin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Snippet>> {
    toggle(&state, &id, &user, SnippetFlag::Pinned).await
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Snippet>> {
    toggle(&state, &id, &user, SnippetFlag::Favorite).await
}

async fn toggle_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Snippet>> {
    toggle(&state, &id, &user, SnippetFlag::Archived).await
}

async fn set_sharing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<ShareRequest>,
) -> Result<Json<Snippet>> {
    let snippet = db::get_snippet(&state.db, &id).await?;
    require_editor(&state, &snippet.workspace_id, &user).await?;
    let snippet = db::set_public(&state.db, &id, request.is_public).await?;
    Ok(Json(snippet))
}

async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<SnippetVersion>>> {
    let snippet = db::get_snippet(&state.db, &id).await?;
    db::require_membership(&state.db, &snippet.workspace_id, &user.user_id).await?;
    let versions = db::list_versions(&state.db, &id).await?;
    Ok(Json(versions))
}

async fn add_label(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<AddLabelRequest>,
) -> Result<Json<serde_json::Value>> {
    let snippet = db::get_snippet(&state.db, &id).await?;
    require_editor(&state, &snippet.workspace_id, &user).await?;
    require_label_in_workspace(&state, &request.label_id, &snippet.workspace_id).await?;
    db::add_snippet_label(&state.db, &id, &request.label_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn remove_label(
    State(state): State<AppState>,
    Path((id, label_id)): Path<(String, String)>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    let snippet = db::get_snippet(&state.db, &id).await?;
    require_editor(&state, &snippet.workspace_id, &user).await?;
    db::remove_snippet_label(&state.db, &id, &label_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn get_shared_snippet(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Json<Snippet>> {
    let snippet = db::get_snippet_by_share_id(&state.db, &share_id).await?;
    Ok(Json(snippet))
}

// ============================================================================
// Bulk and Export Handlers
// ============================================================================

async fn bulk_operation(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<BulkResponse>> {
    require_editor(&state, &workspace_id, &user).await?;
    if request.snippet_ids.is_empty() {
        return Err(Error::Validation("No snippets selected".to_string()));
    }

    let ids = &request.snippet_ids;
    let affected = match request.operation {
        BulkOperation::Archive => {
            db::bulk_set_flag(&state.db, &workspace_id, ids, SnippetFlag::Archived, true).await?
        }
        BulkOperation::Unarchive => {
            db::bulk_set_flag(&state.db, &workspace_id, ids, SnippetFlag::Archived, false).await?
        }
        BulkOperation::Favorite => {
            db::bulk_set_flag(&state.db, &workspace_id, ids, SnippetFlag::Favorite, true).await?
        }
        BulkOperation::Unfavorite => {
            db::bulk_set_flag(&state.db, &workspace_id, ids, SnippetFlag::Favorite, false).await?
        }
        BulkOperation::Pin => {
            db::bulk_set_flag(&state.db, &workspace_id, ids, SnippetFlag::Pinned, true).await?
        }
        BulkOperation::Unpin => {
            db::bulk_set_flag(&state.db, &workspace_id, ids, SnippetFlag::Pinned, false).await?
        }
        BulkOperation::Delete => db::bulk_delete(&state.db, &workspace_id, ids).await?,
        BulkOperation::AddLabel => {
            let label_id = require_bulk_label(&state, &request, &workspace_id).await?;
            db::bulk_add_label(&state.db, &workspace_id, ids, &label_id).await?;
            ids.len() as u64
        }
        BulkOperation::RemoveLabel => {
            let label_id = require_bulk_label(&state, &request, &workspace_id).await?;
            db::bulk_remove_label(&state.db, &workspace_id, ids, &label_id).await?;
            ids.len() as u64
        }
    };

    Ok(Json(BulkResponse { affected }))
}

async fn export_snippets(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<ExportResponse>> {
    db::require_membership(&state.db, &workspace_id, &user.user_id).await?;

    let snippets = db::list_snippets(&state.db, &workspace_id).await?;
    let mut detailed = Vec::with_capacity(snippets.len());
    for snippet in snippets {
        let labels = db::labels_for_snippet(&state.db, &snippet.id).await?;
        detailed.push(SnippetDetail { snippet, labels });
    }

    Ok(Json(ExportResponse {
        workspace_id,
        exported_at: now_rfc3339(),
        snippets: detailed,
    }))
}

// ============================================================================
// Category Handlers
// ============================================================================

async fn list_categories(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<Category>>> {
    db::require_membership(&state.db, &workspace_id, &user.user_id).await?;
    let categories = db::list_categories(&state.db, &workspace_id).await?;
    Ok(Json(categories))
}

async fn create_category(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<Json<Category>> {
    require_editor(&state, &workspace_id, &user).await?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Category name is required".to_string()));
    }
    let category = db::create_category(&state.db, &workspace_id, name, &user.user_id).await?;
    Ok(Json(category))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<Json<Category>> {
    let category = db::get_category(&state.db, &id).await?;
    require_editor(&state, &category.workspace_id, &user).await?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Category name is required".to_string()));
    }
    let category = db::update_category(&state.db, &id, name).await?;
    Ok(Json(category))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    let category = db::get_category(&state.db, &id).await?;
    require_editor(&state, &category.workspace_id, &user).await?;
    db::delete_category(&state.db, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ============================================================================
// Label Handlers
// ============================================================================

async fn list_labels(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<Label>>> {
    db::require_membership(&state.db, &workspace_id, &user.user_id).await?;
    let labels = db::list_labels(&state.db, &workspace_id).await?;
    Ok(Json(labels))
}

async fn create_label(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateLabelRequest>,
) -> Result<Json<Label>> {
    require_editor(&state, &workspace_id, &user).await?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Label name is required".to_string()));
    }
    let label =
        db::create_label(&state.db, &workspace_id, name, &request.color, &user.user_id).await?;
    Ok(Json(label))
}

async fn update_label(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateLabelRequest>,
) -> Result<Json<Label>> {
    let label = db::get_label(&state.db, &id).await?;
    require_editor(&state, &label.workspace_id, &user).await?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Label name is required".to_string()));
    }
    let label = db::update_label(&state.db, &id, name, &request.color).await?;
    Ok(Json(label))
}

async fn delete_label(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    let label = db::get_label(&state.db, &id).await?;
    require_editor(&state, &label.workspace_id, &user).await?;
    db::delete_label(&state.db, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ============================================================================
// Helpers
// ============================================================================

async fn toggle(
    state: &AppState,
    id: &str,
    user: &SessionUser,
    flag: SnippetFlag,
) -> Result<Json<Snippet>> {
    let snippet = db::get_snippet(&state.db, id).await?;
    require_editor(state, &snippet.workspace_id, user).await?;
    let snippet = db::toggle_flag(&state.db, id, flag).await?;
    Ok(Json(snippet))
}

async fn require_category_in_workspace(
    state: &AppState,
    category_id: &str,
    workspace_id: &str,
) -> Result<()> {
    let category = db::get_category(&state.db, category_id).await?;
    if category.workspace_id != workspace_id {
        return Err(Error::InvalidInput(
            "Category belongs to another workspace".to_string(),
        ));
    }
    Ok(())
}

async fn require_label_in_workspace(
    state: &AppState,
    label_id: &str,
    workspace_id: &str,
) -> Result<()> {
    let label = db::get_label(&state.db, label_id).await?;
    if label.workspace_id != workspace_id {
        return Err(Error::InvalidInput(
            "Label belongs to another workspace".to_string(),
        ));
    }
    Ok(())
}

async fn require_bulk_label(
    state: &AppState,
    request: &BulkRequest,
    workspace_id: &str,
) -> Result<String> {
    let label_id = request
        .label_id
        .clone()
        .ok_or_else(|| Error::Validation("label_id is required for label operations".to_string()))?;
    require_label_in_workspace(state, &label_id, workspace_id).await?;
    Ok(label_id)
}
