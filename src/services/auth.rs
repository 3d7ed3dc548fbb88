//! Authentication service: password hashing and web sessions.
//!
//! Passwords are stored as `{salt}${digest}` where the digest is an
//! iterated salted SHA-256. Sessions are server-side rows keyed by a
//! random id that doubles as the cookie value.

use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::{self, CreateSession, DbPool, Session, User};
use crate::{config, Error, Result};

/// Iteration count for the password digest.
const HASH_ROUNDS: u32 = 10_000;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);
    format!("{}${}", salt, digest(&salt, password))
}

/// Verify a password against a stored `{salt}${digest}` value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    constant_time_eq(&digest(salt, password), expected)
}

fn digest(salt: &str, password: &str) -> String {
    let mut current = format!("{}{}", salt, password).into_bytes();
    for _ in 0..HASH_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(&current);
        current = hasher.finalize().to_vec();
    }
    hex::encode(current)
}

/// Compare two strings in constant time.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Session issuance and revocation.
#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
}

impl AuthService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Verify credentials and return the user.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let user = db::get_user_by_email(&self.db, email)
            .await?
            .ok_or(Error::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(Error::InvalidCredentials);
        }
        Ok(user)
    }

    /// Open a new session for a user.
    pub async fn issue_session(
        &self,
        user_id: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Session> {
        let max_age = config().session.max_age_seconds as i64;
        db::create_session(
            &self.db,
            CreateSession {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                expires_at: Utc::now() + Duration::seconds(max_age),
                ip_address,
                user_agent,
            },
        )
        .await
    }

    /// Close a session. Unknown ids are a no-op.
    pub async fn revoke_session(&self, session_id: &str) -> Result<()> {
        db::delete_session(&self.db, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn test_same_password_different_salts() {
        let a = hash_password("hunter2");
        let b = hash_password("hunter2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_stored_hash_rejected() {
        assert!(!verify_password("hunter2", "no-dollar-sign"));
        assert!(!verify_password("hunter2", ""));
    }
}
