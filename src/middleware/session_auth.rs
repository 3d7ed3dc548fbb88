//! Session-based authentication middleware.
//!
//! Validates session cookies and injects the authenticated user into
//! request extensions.
//!
//! # Session Flow
//!
//! 1. User authenticates via `/auth/login` (or registers)
//! 2. Server creates a session row and sets the `atrium_session` cookie
//! 3. Subsequent requests include the cookie, validated by this middleware
//! 4. Session expires after the configured duration or on logout
//!
//! # Security Model
//!
//! - Session IDs are cryptographically random
//! - Sessions are stored server-side in the database
//! - Cookie is HttpOnly, SameSite=Lax
//! - Sessions can be invalidated server-side (logout, cleanup task)

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use axum_extra::extract::CookieJar;

use crate::{config::config, db, error::Error, AppState};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "atrium_session";

/// User context injected into request extensions after session validation.
#[derive(Clone, Debug)]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub is_admin: bool,
}

/// Middleware that requires a valid session.
///
/// Extracts the session ID from the cookie, validates it against the
/// database, and injects `SessionUser` into request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let session_id = jar
        .get(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .ok_or(Error::Unauthenticated)?;

    let session_user = validate_session(&state, &session_id).await?;

    req.extensions_mut().insert(session_user);

    Ok(next.run(req).await)
}

/// Middleware that requires the admin flag.
///
/// Must be layered AFTER `require_session`.
pub async fn require_admin(
    Extension(user): Extension<SessionUser>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    if !user.is_admin {
        return Err(Error::Forbidden);
    }

    Ok(next.run(req).await)
}

/// Validate a session ID and return the session user.
async fn validate_session(state: &AppState, session_id: &str) -> Result<SessionUser, Error> {
    let session = db::get_session(&state.db, session_id)
        .await?
        .ok_or(Error::Unauthenticated)?;

    if session.is_expired() {
        // Clean up the stale row off the request path
        let pool = state.db.clone();
        let sid = session_id.to_string();
        tokio::spawn(async move {
            let _ = db::delete_session(&pool, &sid).await;
        });
        return Err(Error::Unauthenticated);
    }

    let user = db::get_user(&state.db, &session.user_id)
        .await
        .map_err(|_| Error::Unauthenticated)?;

    // Sliding expiry: extend once the session is past the halfway point
    let max_age = chrono::Duration::seconds(config().session.max_age_seconds as i64);
    let halfway = chrono::Utc::now() + (max_age / 2);
    let expires_at = chrono::DateTime::parse_from_rfc3339(&session.expires_at)
        .map(|t| t.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    if expires_at < halfway {
        let new_expires = chrono::Utc::now() + max_age;
        let pool = state.db.clone();
        let sid = session_id.to_string();
        tokio::spawn(async move {
            let _ = db::touch_session(&pool, &sid, new_expires).await;
        });
    }

    Ok(SessionUser {
        user_id: user.id,
        email: user.email,
        username: user.username,
        display_name: user.display_name,
        is_admin: user.is_admin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_session, create_user, test_pool, CreateSession, CreateUser};
    use chrono::{Duration, Utc};

    async fn seeded_state() -> AppState {
        let pool = test_pool().await;
        create_user(
            &pool,
            CreateUser {
                id: "alice".to_string(),
                email: "alice@example.com".to_string(),
                username: "alice".to_string(),
                display_name: "Alice".to_string(),
                password_hash: "x".to_string(),
                is_admin: false,
            },
        )
        .await
        .unwrap();
        AppState::with_pool(pool)
    }

    async fn seed_session(state: &AppState, id: &str, expires_at: chrono::DateTime<Utc>) {
        create_session(
            &state.db,
            CreateSession {
                id: id.to_string(),
                user_id: "alice".to_string(),
                expires_at,
                ip_address: None,
                user_agent: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_valid_session_resolves_user() {
        let state = seeded_state().await;
        seed_session(&state, "s-live", Utc::now() + Duration::days(7)).await;

        let user = validate_session(&state, "s-live").await.unwrap();
        assert_eq!(user.user_id, "alice");
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn test_expired_session_rejected() {
        let state = seeded_state().await;
        seed_session(&state, "s-stale", Utc::now() - Duration::hours(1)).await;

        let err = validate_session(&state, "s-stale").await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let state = seeded_state().await;

        let err = validate_session(&state, "no-such-session").await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }
}
