//! Database layer for Atrium.
//!
//! Provides SQLite connection pooling and query modules
//! for all domain entities.

pub(crate) mod changelog;
pub(crate) mod notifications;
pub(crate) mod projects;
pub(crate) mod roadmap;
pub(crate) mod snippets;
pub(crate) mod users;
pub(crate) mod workspaces;

// Re-export all query modules
pub use changelog::*;
pub use notifications::*;
pub use projects::*;
pub use roadmap::*;
pub use snippets::*;
pub use users::*;
pub use workspaces::*;

use crate::Result;
use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Type alias for the SQLite connection pool.
pub type DbPool = sqlx::SqlitePool;

/// Current timestamp as a fixed-width RFC3339 string.
///
/// Millisecond precision with a `Z` suffix, so stored timestamps compare
/// correctly as strings in SQL.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Initialize the database connection pool.
///
/// Creates parent directories if needed and configures SQLite with
/// optimal settings for concurrent access.
pub async fn init_pool(path: &str) -> Result<DbPool> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    // Configure connection options with pragmas for performance
    let options = SqliteConnectOptions::from_str(path)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30))
        .foreign_keys(true)
        // Increase cache size (negative = KB)
        .pragma("cache_size", "-64000")
        .pragma("temp_store", "memory");

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await?;

    info!("Database pool initialized: {}", path);

    Ok(pool)
}

/// Initialize the database schema.
///
/// Applies the complete schema from schema.sql. Uses IF NOT EXISTS
/// clauses so it's safe to run multiple times.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    let schema = include_str!("../../schema.sql");

    info!("Initializing database schema");

    // Strip comment lines before splitting on ';' so punctuation inside a
    // comment never produces a phantom statement.
    let sql: String = schema
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    // Execute schema SQL (contains multiple statements)
    for statement in sql.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema initialized successfully");

    Ok(())
}

// In-memory SQLite gives each connection its own database, so test pools
// are pinned to a single connection.
#[cfg(test)]
pub(crate) async fn test_pool() -> DbPool {
    let options = SqliteConnectOptions::from_str(":memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    initialize_schema(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool_in_memory() {
        let pool = init_pool(":memory:").await.unwrap();
        assert!(pool.size() > 0);
    }

    #[tokio::test]
    async fn test_schema_initialization() {
        let pool = test_pool().await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

        for required in [
            "users",
            "sessions",
            "workspaces",
            "workspace_members",
            "workspace_invites",
            "projects",
            "tasks",
            "categories",
            "labels",
            "snippets",
            "snippet_labels",
            "snippet_versions",
            "notifications",
            "user_notifications",
            "changelog_entries",
            "roadmap_items",
        ] {
            assert!(table_names.contains(&required), "{} table missing", required);
        }
    }

    #[test]
    fn test_now_rfc3339_is_sortable() {
        let a = now_rfc3339();
        let b = now_rfc3339();
        assert!(a <= b);
        assert!(a.ends_with('Z'));
    }
}
