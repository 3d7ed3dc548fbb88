//! API Routes for Atrium
//!
//! This module combines all API routes into a single router.
//! Routes are organized by domain and apply appropriate middleware.

mod auth;
mod changelog;
mod notifications;
mod projects;
mod roadmap;
mod snippets;
pub mod status;
mod workspaces;

use axum::Router;

use crate::middleware::{require_admin, require_session};
use crate::AppState;

/// Build the complete API router.
///
/// Route structure:
/// - /health, /status - Health checks (public)
/// - /auth/* - Authentication (mixed public/protected)
/// - /changelog, /roadmap, /shared/* - Public read surface
/// - /workspaces/*, /tasks/*, /snippets/*, ... - Session-protected
/// - /notifications/* - Session-protected
/// - /admin/* - Admin-only management
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health and status endpoints (public)
        .merge(status::routes())
        // Authentication routes (mixed public/protected)
        .nest("/auth", auth::routes(state.clone()))
        // Public read-only surface (vote endpoint is cookie-keyed, not authed)
        .merge(changelog::public_routes())
        .merge(roadmap::public_routes())
        .merge(snippets::shared_routes())
        // Session-protected application routes
        .merge(protected_routes(state.clone()))
        // Admin management routes
        .nest("/admin", admin_routes(state))
}

/// Routes that require an authenticated session.
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Workspace CRUD, members, invites
        .nest("/workspaces", workspaces::routes())
        .nest("/invites", workspaces::invite_routes())
        // Workspace-scoped collections
        .nest("/workspaces/:workspace_id/projects", projects::routes())
        .nest("/workspaces/:workspace_id/tasks", projects::task_routes())
        .nest("/workspaces/:workspace_id/snippets", snippets::workspace_routes())
        .nest("/workspaces/:workspace_id/categories", snippets::category_routes())
        .nest("/workspaces/:workspace_id/labels", snippets::label_routes())
        // Item routes addressed by id alone
        .nest("/projects", projects::item_routes())
        .nest("/tasks", projects::task_item_routes())
        .nest("/snippets", snippets::item_routes())
        .nest("/categories", snippets::category_item_routes())
        .nest("/labels", snippets::label_item_routes())
        // Notification feed
        .nest("/notifications", notifications::routes())
        // Apply session authentication to all protected routes
        .layer(axum::middleware::from_fn_with_state(state, require_session))
}

/// Admin routes: session plus the admin flag.
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/notifications", notifications::admin_routes())
        .nest("/changelog", changelog::admin_routes())
        .nest("/roadmap", roadmap::admin_routes())
        .layer(axum::middleware::from_fn(require_admin))
        .layer(axum::middleware::from_fn_with_state(state, require_session))
}
