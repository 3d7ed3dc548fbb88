//! Project and Task Routes
//!
//! Routes (all session-protected, membership-checked):
//! - GET/POST /workspaces/:workspace_id/projects
//! - GET/PUT/DELETE /projects/:id
//! - GET/POST /workspaces/:workspace_id/tasks
//! - GET/PUT/DELETE /tasks/:id

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::db::{self, Project, Task, WorkspaceMember};
use crate::middleware::SessionUser;
use crate::{AppState, Error, Result};

const TASK_STATUSES: [&str; 3] = ["todo", "in_progress", "done"];
const TASK_PRIORITIES: [&str; 3] = ["low", "medium", "high"];
const PROJECT_STATUSES: [&str; 3] = ["active", "paused", "archived"];

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_projects).post(create_project))
}

pub fn item_routes() -> Router<AppState> {
    Router::new().route(
        "/:id",
        get(get_project).put(update_project).delete(delete_project),
    )
}

pub fn task_routes() -> Router<AppState> {
    Router::new().route("/", get(list_tasks).post(create_task))
}

pub fn task_item_routes() -> Router<AppState> {
    Router::new().route("/:id", get(get_task).put(update_task).delete(delete_task))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_project_status")]
    pub status: String,
}

fn default_project_status() -> String {
    "active".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub project_id: Option<String>,
    pub due_date: Option<String>,
    pub assigned_to_id: Option<String>,
}

fn default_priority() -> String {
    "medium".to_string()
}

/// Partial task update. Double-optional fields distinguish "leave alone"
/// (absent) from "clear" (null).
#[derive(Debug, Deserialize, Default)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<String>>,
}

/// Treat an explicit JSON null as Some(None) so it clears the field.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

// ============================================================================
// Project Handlers
// ============================================================================

async fn list_projects(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<Project>>> {
    db::require_membership(&state.db, &workspace_id, &user.user_id).await?;
    let projects = db::list_projects(&state.db, &workspace_id).await?;
    Ok(Json(projects))
}

async fn create_project(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<Json<Project>> {
    require_editor(&state, &workspace_id, &user).await?;
    if request.name.trim().is_empty() {
        return Err(Error::Validation("Project name is required".to_string()));
    }
    let project = db::create_project(
        &state.db,
        &workspace_id,
        request.name.trim(),
        &request.description,
        &user.user_id,
    )
    .await?;
    Ok(Json(project))
}

async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Project>> {
    let project = db::get_project(&state.db, &id).await?;
    db::require_membership(&state.db, &project.workspace_id, &user.user_id).await?;
    Ok(Json(project))
}

async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<Project>> {
    let project = db::get_project(&state.db, &id).await?;
    require_editor(&state, &project.workspace_id, &user).await?;
    if !PROJECT_STATUSES.contains(&request.status.as_str()) {
        return Err(Error::Validation(format!(
            "Invalid project status: {}",
            request.status
        )));
    }
    let project = db::update_project(
        &state.db,
        &id,
        request.name.trim(),
        &request.description,
        &request.status,
    )
    .await?;
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    let project = db::get_project(&state.db, &id).await?;
    require_editor(&state, &project.workspace_id, &user).await?;
    db::delete_project(&state.db, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ============================================================================
// Task Handlers
// ============================================================================

async fn list_tasks(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<Task>>> {
    db::require_membership(&state.db, &workspace_id, &user.user_id).await?;
    let tasks = db::list_tasks(&state.db, &workspace_id).await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<Json<Task>> {
    require_editor(&state, &workspace_id, &user).await?;
    if request.title.trim().is_empty() {
        return Err(Error::Validation("Task title is required".to_string()));
    }
    if !TASK_PRIORITIES.contains(&request.priority.as_str()) {
        return Err(Error::Validation(format!(
            "Invalid priority: {}",
            request.priority
        )));
    }
    if let Some(project_id) = &request.project_id {
        // The project must belong to the same workspace.
        let project = db::get_project(&state.db, project_id).await?;
        if project.workspace_id != workspace_id {
            return Err(Error::InvalidInput(
                "Project belongs to another workspace".to_string(),
            ));
        }
    }

    let task = db::create_task(
        &state.db,
        db::CreateTask {
            workspace_id,
            project_id: request.project_id,
            title: request.title.trim().to_string(),
            description: request.description,
            priority: request.priority,
            due_date: request.due_date,
            assigned_to_id: request.assigned_to_id,
            created_by_id: user.user_id,
        },
    )
    .await?;
    Ok(Json(task))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Task>> {
    let task = db::get_task(&state.db, &id).await?;
    db::require_membership(&state.db, &task.workspace_id, &user.user_id).await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    let task = db::get_task(&state.db, &id).await?;
    require_editor(&state, &task.workspace_id, &user).await?;

    if let Some(status) = &request.status {
        if !TASK_STATUSES.contains(&status.as_str()) {
            return Err(Error::Validation(format!("Invalid status: {}", status)));
        }
    }
    if let Some(priority) = &request.priority {
        if !TASK_PRIORITIES.contains(&priority.as_str()) {
            return Err(Error::Validation(format!("Invalid priority: {}", priority)));
        }
    }
    if let Some(Some(project_id)) = &request.project_id {
        let project = db::get_project(&state.db, project_id).await?;
        if project.workspace_id != task.workspace_id {
            return Err(Error::InvalidInput(
                "Project belongs to another workspace".to_string(),
            ));
        }
    }

    let task = db::update_task(
        &state.db,
        &id,
        db::UpdateTask {
            title: request.title,
            description: request.description,
            status: request.status,
            priority: request.priority,
            due_date: request.due_date,
            assigned_to_id: request.assigned_to_id,
            project_id: request.project_id,
        },
    )
    .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    let task = db::get_task(&state.db, &id).await?;
    require_editor(&state, &task.workspace_id, &user).await?;
    db::delete_task(&state.db, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ============================================================================
// Helpers
// ============================================================================

/// Membership check that also rejects read-only viewers.
pub(crate) async fn require_editor(
    state: &AppState,
    workspace_id: &str,
    user: &SessionUser,
) -> Result<WorkspaceMember> {
    let member = db::require_membership(&state.db, workspace_id, &user.user_id).await?;
    if !member.role_enum().can_edit_content() {
        return Err(Error::Forbidden);
    }
    Ok(member)
}
