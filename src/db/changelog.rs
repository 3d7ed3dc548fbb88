//! Changelog entry database queries.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_rfc3339, DbPool};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub id: String,
    pub version: String,
    pub title: String,
    pub body: String,
    pub tag: String,
    pub published_at: String,
    pub created_by_id: String,
    pub created_at: String,
}

/// Input for creating a changelog entry.
#[derive(Debug, Clone)]
pub struct CreateChangelogEntry {
    pub version: String,
    pub title: String,
    pub body: String,
    pub tag: String,
    pub published_at: Option<String>,
    pub created_by_id: String,
}

pub async fn create_changelog_entry(
    pool: &DbPool,
    input: CreateChangelogEntry,
) -> Result<ChangelogEntry> {
    let now = now_rfc3339();
    sqlx::query_as::<_, ChangelogEntry>(
        r#"
        INSERT INTO changelog_entries (id, version, title, body, tag, published_at, created_by_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(&input.version)
    .bind(&input.title)
    .bind(&input.body)
    .bind(&input.tag)
    .bind(input.published_at.as_deref().unwrap_or(&now))
    .bind(&input.created_by_id)
    .bind(&now)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Public listing, newest release first.
pub async fn list_changelog_entries(pool: &DbPool) -> Result<Vec<ChangelogEntry>> {
    sqlx::query_as::<_, ChangelogEntry>(
        "SELECT * FROM changelog_entries ORDER BY published_at DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

pub async fn update_changelog_entry(
    pool: &DbPool,
    id: &str,
    version: &str,
    title: &str,
    body: &str,
    tag: &str,
) -> Result<ChangelogEntry> {
    sqlx::query_as::<_, ChangelogEntry>(
        r#"
        UPDATE changelog_entries SET version = ?, title = ?, body = ?, tag = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(version)
    .bind(title)
    .bind(body)
    .bind(tag)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Changelog entry not found: {}", id)))
}

pub async fn delete_changelog_entry(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM changelog_entries WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Changelog entry not found: {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{create_user, CreateUser};

    async fn seed_admin(pool: &DbPool) {
        create_user(
            pool,
            CreateUser {
                id: "admin".to_string(),
                email: "admin@example.com".to_string(),
                username: "admin".to_string(),
                display_name: "Admin".to_string(),
                password_hash: "x".to_string(),
                is_admin: true,
            },
        )
        .await
        .unwrap();
    }

    fn entry_input(version: &str, published_at: Option<&str>) -> CreateChangelogEntry {
        CreateChangelogEntry {
            version: version.to_string(),
            title: format!("Release {}", version),
            body: "Notes".to_string(),
            tag: "feature".to_string(),
            published_at: published_at.map(str::to_string),
            created_by_id: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_listing_newest_first() {
        let pool = test_pool().await;
        seed_admin(&pool).await;

        create_changelog_entry(&pool, entry_input("1.0.0", Some("2026-01-01T00:00:00.000Z")))
            .await
            .unwrap();
        create_changelog_entry(&pool, entry_input("1.1.0", Some("2026-06-01T00:00:00.000Z")))
            .await
            .unwrap();

        let entries = list_changelog_entries(&pool).await.unwrap();
        assert_eq!(entries[0].version, "1.1.0");
        assert_eq!(entries[1].version, "1.0.0");
    }

    #[tokio::test]
    async fn test_publish_defaults_to_now() {
        let pool = test_pool().await;
        seed_admin(&pool).await;

        let entry = create_changelog_entry(&pool, entry_input("2.0.0", None)).await.unwrap();
        assert!(!entry.published_at.is_empty());
        assert_eq!(entry.published_at, entry.created_at);
    }
}
