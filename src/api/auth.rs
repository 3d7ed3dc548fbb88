//! Authentication Routes
//!
//! Routes:
//! - POST /auth/register - Create an account and open a session
//! - POST /auth/login - Verify credentials and open a session
//! - POST /auth/logout - Close the current session
//! - GET /auth/me - Current user profile
//! - PUT /auth/me - Update display name / username

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::info;

use crate::config::config;
use crate::db::{self, User};
use crate::middleware::{require_session, SessionUser, SESSION_COOKIE_NAME};
use crate::services::hash_password;
use crate::{AppState, Error, Result};

/// Build auth routes. Register and login are public; the rest require a
/// session.
pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me).put(update_profile))
        .layer(axum::middleware::from_fn_with_state(state, require_session));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(protected)
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub display_name: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub username: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<User>)> {
    let email = request.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(Error::Validation("A valid email is required".to_string()));
    }
    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err(Error::Validation("Username is required".to_string()));
    }
    if request.password.len() < 8 {
        return Err(Error::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let is_admin = config()
        .admin_email
        .as_deref()
        .map(|admin| admin.eq_ignore_ascii_case(&email))
        .unwrap_or(false);

    let display_name = request
        .display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| username.clone());

    let user = db::create_user(
        &state.db,
        db::CreateUser {
            id: nanoid::nanoid!(),
            email,
            username,
            display_name,
            password_hash: hash_password(&request.password),
            is_admin,
        },
    )
    .await?;

    info!(user_id = %user.id, "User registered");

    let jar = open_session(&state, jar, &headers, &user.id).await?;
    Ok((jar, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<User>)> {
    let email = request.email.trim().to_lowercase();
    let user = state.auth.authenticate(&email, &request.password).await?;

    info!(user_id = %user.id, "User logged in");

    let jar = open_session(&state, jar, &headers, &user.id).await?;
    Ok((jar, Json(user)))
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        state.auth.revoke_session(cookie.value()).await?;
    }

    let removal = Cookie::build((SESSION_COOKIE_NAME, "")).path("/").build();
    Ok((
        jar.remove(removal),
        Json(serde_json::json!({ "ok": true })),
    ))
}

async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<User>> {
    let user = db::get_user(&state.db, &user.user_id).await?;
    Ok(Json(user))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    let display_name = request.display_name.map(|name| name.trim().to_string());
    if matches!(&display_name, Some(name) if name.is_empty()) {
        return Err(Error::Validation("Display name cannot be empty".to_string()));
    }
    let username = request.username.map(|name| name.trim().to_string());
    if matches!(&username, Some(name) if name.is_empty()) {
        return Err(Error::Validation("Username cannot be empty".to_string()));
    }

    let user = db::update_user(
        &state.db,
        &user.user_id,
        db::UpdateUser {
            display_name,
            username,
        },
    )
    .await?;

    info!(user_id = %user.id, "Profile updated");

    Ok(Json(user))
}

// ============================================================================
// Helpers
// ============================================================================

/// Issue a session and attach the cookie.
async fn open_session(
    state: &AppState,
    jar: CookieJar,
    headers: &HeaderMap,
    user_id: &str,
) -> Result<CookieJar> {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string());
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let session = state.auth.issue_session(user_id, ip_address, user_agent).await?;

    // Expiry is enforced server-side; the cookie itself is session-scoped.
    let cookie = Cookie::build((SESSION_COOKIE_NAME, session.id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok(jar.add(cookie))
}
