//! Workspace Routes
//!
//! Workspace CRUD plus member and invite management.
//!
//! Routes (all session-protected):
//! - GET /workspaces - Workspaces the user belongs to
//! - POST /workspaces - Create a workspace (creator becomes owner)
//! - GET /workspaces/:id - Workspace details (members only)
//! - PUT /workspaces/:id - Update (owner only)
//! - DELETE /workspaces/:id - Delete (owner only)
//! - GET /workspaces/:id/members - Member listing
//! - PUT /workspaces/:id/members/:user_id - Change a member's role
//! - DELETE /workspaces/:id/members/:user_id - Remove a member (or leave)
//! - GET/POST /workspaces/:id/invites - Pending invites / invite by email
//! - POST /invites/:token/accept - Accept an invite

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use rand::RngCore;
use serde::Deserialize;
use tracing::info;

use crate::db::{
    self, MemberWithUser, Workspace, WorkspaceInvite, WorkspaceMember, WorkspaceRole,
};
use crate::middleware::SessionUser;
use crate::{AppState, Error, Result};

// Param name matches the sibling nests under /workspaces/:workspace_id
// so the flattened route table stays consistent.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workspaces).post(create_workspace))
        .route(
            "/:workspace_id",
            get(get_workspace).put(update_workspace).delete(delete_workspace),
        )
        .route("/:workspace_id/members", get(list_members))
        .route(
            "/:workspace_id/members/:user_id",
            put(update_member_role).delete(remove_member),
        )
        .route("/:workspace_id/invites", get(list_invites).post(create_invite))
}

pub fn invite_routes() -> Router<AppState> {
    Router::new().route("/:token/accept", post(accept_invite))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkspaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub email: String,
    #[serde(default = "default_invite_role")]
    pub role: String,
}

fn default_invite_role() -> String {
    "member".to_string()
}

// ============================================================================
// Workspace Handlers
// ============================================================================

async fn list_workspaces(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<Workspace>>> {
    let workspaces = db::list_user_workspaces(&state.db, &user.user_id).await?;
    Ok(Json(workspaces))
}

async fn create_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateWorkspaceRequest>,
) -> Result<Json<Workspace>> {
    let workspace =
        db::create_workspace(&state.db, &request.name, &request.description, &user.user_id)
            .await?;

    info!(workspace_id = %workspace.id, "Workspace created");

    Ok(Json(workspace))
}

async fn get_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Workspace>> {
    db::require_membership(&state.db, &id, &user.user_id).await?;
    let workspace = db::get_workspace(&state.db, &id).await?;
    Ok(Json(workspace))
}

async fn update_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<UpdateWorkspaceRequest>,
) -> Result<Json<Workspace>> {
    require_owner(&state, &id, &user.user_id).await?;
    let workspace =
        db::update_workspace(&state.db, &id, &request.name, &request.description).await?;
    Ok(Json(workspace))
}

async fn delete_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    require_owner(&state, &id, &user.user_id).await?;
    db::delete_workspace(&state.db, &id).await?;

    info!(workspace_id = %id, "Workspace deleted");

    Ok(Json(serde_json::json!({ "ok": true })))
}

// ============================================================================
// Member Handlers
// ============================================================================

async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<MemberWithUser>>> {
    db::require_membership(&state.db, &id, &user.user_id).await?;
    let members = db::list_members(&state.db, &id).await?;
    Ok(Json(members))
}

async fn update_member_role(
    State(state): State<AppState>,
    Path((id, target_user_id)): Path<(String, String)>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<UpdateMemberRoleRequest>,
) -> Result<Json<serde_json::Value>> {
    let member = db::require_membership(&state.db, &id, &user.user_id).await?;
    if !member.role_enum().can_manage_members() {
        return Err(Error::Forbidden);
    }

    let role = WorkspaceRole::parse(&request.role)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown role: {}", request.role)))?;

    // The owner seat never changes hands through this endpoint.
    let target = db::require_membership(&state.db, &id, &target_user_id).await?;
    if target.role_enum() == WorkspaceRole::Owner || role == WorkspaceRole::Owner {
        return Err(Error::Forbidden);
    }

    db::update_member_role(&state.db, &id, &target_user_id, role).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn remove_member(
    State(state): State<AppState>,
    Path((id, target_user_id)): Path<(String, String)>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<serde_json::Value>> {
    let member = db::require_membership(&state.db, &id, &user.user_id).await?;

    // Members may leave on their own; removing anyone else needs a manager.
    let leaving = target_user_id == user.user_id;
    if !leaving && !member.role_enum().can_manage_members() {
        return Err(Error::Forbidden);
    }

    let target = db::require_membership(&state.db, &id, &target_user_id).await?;
    if target.role_enum() == WorkspaceRole::Owner {
        return Err(Error::Forbidden);
    }

    db::remove_member(&state.db, &id, &target_user_id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ============================================================================
// Invite Handlers
// ============================================================================

async fn list_invites(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<Vec<WorkspaceInvite>>> {
    let member = db::require_membership(&state.db, &id, &user.user_id).await?;
    if !member.role_enum().can_manage_members() {
        return Err(Error::Forbidden);
    }
    let invites = db::list_invites(&state.db, &id).await?;
    Ok(Json(invites))
}

async fn create_invite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<CreateInviteRequest>,
) -> Result<Json<WorkspaceInvite>> {
    let member = db::require_membership(&state.db, &id, &user.user_id).await?;
    if !member.role_enum().can_manage_members() {
        return Err(Error::Forbidden);
    }

    let email = request.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::Validation("A valid email is required".to_string()));
    }

    let role = WorkspaceRole::parse(&request.role)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown role: {}", request.role)))?;
    if role == WorkspaceRole::Owner {
        return Err(Error::InvalidInput("Cannot invite an owner".to_string()));
    }

    if db::member_email_exists(&state.db, &id, &email).await? {
        return Err(Error::AlreadyExists(
            "This user is already a member".to_string(),
        ));
    }

    let invite =
        db::create_invite(&state.db, &id, &email, role, &user.user_id, &invite_token()).await?;

    info!(workspace_id = %id, invite_id = %invite.id, "Invite created");

    Ok(Json(invite))
}

async fn accept_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<WorkspaceMember>> {
    let invite = db::get_invite_by_token(&state.db, &token)
        .await?
        .ok_or_else(|| Error::NotFound("Invite not found".to_string()))?;

    if invite.accepted_at.is_some() {
        return Err(Error::Conflict("Invite already accepted".to_string()));
    }
    if invite.is_expired() {
        return Err(Error::Conflict("Invite has expired".to_string()));
    }
    if !invite.email.eq_ignore_ascii_case(&user.email) {
        return Err(Error::Forbidden);
    }

    let role = WorkspaceRole::parse(&invite.role).unwrap_or_default();
    let member = db::add_member(
        &state.db,
        &invite.workspace_id,
        &user.user_id,
        role,
        Some(&invite.invited_by),
    )
    .await?;
    db::mark_invite_accepted(&state.db, &invite.id).await?;

    info!(workspace_id = %invite.workspace_id, user_id = %user.user_id, "Invite accepted");

    Ok(Json(member))
}

// ============================================================================
// Helpers
// ============================================================================

async fn require_owner(state: &AppState, workspace_id: &str, user_id: &str) -> Result<()> {
    let member = db::require_membership(&state.db, workspace_id, user_id).await?;
    if member.role_enum() != WorkspaceRole::Owner {
        return Err(Error::Forbidden);
    }
    Ok(())
}

/// Random 32-byte hex invite token.
fn invite_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
