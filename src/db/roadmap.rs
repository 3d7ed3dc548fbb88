//! Roadmap item database queries.
//!
//! Items carry a denormalized vote counter. Vote identity is not stored
//! here; the signed-cookie ledger in `services::votes` decides whether an
//! adjustment is allowed.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_rfc3339, DbPool};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoadmapItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub quarter: String,
    pub votes: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub async fn create_roadmap_item(
    pool: &DbPool,
    title: &str,
    description: &str,
    status: &str,
    quarter: &str,
) -> Result<RoadmapItem> {
    let now = now_rfc3339();
    sqlx::query_as::<_, RoadmapItem>(
        r#"
        INSERT INTO roadmap_items (id, title, description, status, quarter, votes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(title)
    .bind(description)
    .bind(status)
    .bind(quarter)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn get_roadmap_item(pool: &DbPool, id: &str) -> Result<RoadmapItem> {
    sqlx::query_as::<_, RoadmapItem>("SELECT * FROM roadmap_items WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Roadmap item not found: {}", id)))
}

/// Public listing, most-voted first within status order.
pub async fn list_roadmap_items(pool: &DbPool) -> Result<Vec<RoadmapItem>> {
    sqlx::query_as::<_, RoadmapItem>(
        r#"
        SELECT * FROM roadmap_items
        ORDER BY CASE status
            WHEN 'in_progress' THEN 0
            WHEN 'planned' THEN 1
            ELSE 2
        END, votes DESC, created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

pub async fn update_roadmap_item(
    pool: &DbPool,
    id: &str,
    title: &str,
    description: &str,
    status: &str,
    quarter: &str,
) -> Result<RoadmapItem> {
    sqlx::query_as::<_, RoadmapItem>(
        r#"
        UPDATE roadmap_items
        SET title = ?, description = ?, status = ?, quarter = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(status)
    .bind(quarter)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Roadmap item not found: {}", id)))
}

pub async fn delete_roadmap_item(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM roadmap_items WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Roadmap item not found: {}", id)));
    }
    Ok(())
}

/// Adjust the denormalized vote counter.
///
/// The counter must mirror the cookie ledger exactly, so the delta is
/// applied as-is; a down vote on a fresh item legitimately yields -1.
pub async fn adjust_votes(pool: &DbPool, id: &str, delta: i64) -> Result<RoadmapItem> {
    sqlx::query_as::<_, RoadmapItem>(
        r#"
        UPDATE roadmap_items
        SET votes = votes + ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(delta)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Roadmap item not found: {}", id)))
}
