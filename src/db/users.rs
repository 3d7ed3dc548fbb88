//! User and session database queries.
//!
//! Handles account records and server-side web sessions.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_rfc3339, DbPool};

// ============================================================================
// User Types
// ============================================================================

/// User record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a new user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: String,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Input for updating a user profile.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub display_name: Option<String>,
    pub username: Option<String>,
}

// ============================================================================
// Session Types
// ============================================================================

/// Web session record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires_at: String,
    pub created_at: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => expires < Utc::now(),
            // If we can't parse, treat as expired
            Err(_) => true,
        }
    }
}

/// Input for creating a session.
#[derive(Debug, Clone)]
pub struct CreateSession {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// ============================================================================
// User Queries
// ============================================================================

/// Create a new user.
pub async fn create_user(pool: &DbPool, input: CreateUser) -> Result<User> {
    let now = now_rfc3339();
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, username, display_name, password_hash, is_admin, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.email)
    .bind(&input.username)
    .bind(&input.display_name)
    .bind(&input.password_hash)
    .bind(input.is_admin)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::AlreadyExists("A user with this email or username already exists".to_string())
        }
        _ => Error::Database(e),
    })
}

/// Get a user by ID.
pub async fn get_user(pool: &DbPool, id: &str) -> Result<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
}

/// Get a user by email.
pub async fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Update a user profile.
pub async fn update_user(pool: &DbPool, id: &str, input: UpdateUser) -> Result<User> {
    let mut updates = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(display_name) = input.display_name {
        updates.push("display_name = ?");
        bindings.push(display_name);
    }
    if let Some(username) = input.username {
        updates.push("username = ?");
        bindings.push(username);
    }

    if updates.is_empty() {
        return get_user(pool, id).await;
    }

    updates.push("updated_at = ?");
    bindings.push(now_rfc3339());

    let query = format!(
        "UPDATE users SET {} WHERE id = ? RETURNING *",
        updates.join(", ")
    );

    let mut q = sqlx::query_as::<_, User>(&query);
    for binding in &bindings {
        q = q.bind(binding);
    }
    q = q.bind(id);

    q.fetch_optional(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Error::AlreadyExists("This username is already taken".to_string())
            }
            _ => Error::Database(e),
        })?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
}

/// List users for notification targeting (id, display name, email).
pub async fn list_users(pool: &DbPool) -> Result<Vec<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

// ============================================================================
// Session Queries
// ============================================================================

/// Create a new session.
pub async fn create_session(pool: &DbPool, input: CreateSession) -> Result<Session> {
    sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (id, user_id, expires_at, created_at, ip_address, user_agent)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&input.id)
    .bind(&input.user_id)
    .bind(
        input
            .expires_at
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    )
    .bind(now_rfc3339())
    .bind(&input.ip_address)
    .bind(&input.user_agent)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get a session by ID.
pub async fn get_session(pool: &DbPool, id: &str) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// Delete a session.
pub async fn delete_session(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Extend a session's expiry.
pub async fn touch_session(pool: &DbPool, id: &str, expires_at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
        .bind(expires_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete expired sessions.
pub async fn cleanup_expired_sessions(pool: &DbPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now_rfc3339())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
