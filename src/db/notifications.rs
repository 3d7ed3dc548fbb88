//! Notification database queries.
//!
//! Notifications are either global (visible to everyone) or targeted at an
//! explicit recipient list. Read state lives in `user_notifications`: targeted
//! notifications get a row per recipient eagerly at creation, global ones get
//! a row lazily the first time a user marks them read.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_rfc3339, DbPool};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub content: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub link: Option<String>,
    pub is_global: bool,
    pub created_by_id: String,
    pub expires_at: Option<String>,
    pub created_at: String,
}

/// A notification as seen by one user, with their read state joined in.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserNotificationView {
    pub id: String,
    pub title: String,
    pub content: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub link: Option<String>,
    pub is_global: bool,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub is_read: bool,
    pub read_at: Option<String>,
}

/// Input for creating a notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub title: String,
    pub content: String,
    pub kind: String,
    pub link: Option<String>,
    pub is_global: bool,
    pub expires_at: Option<String>,
    pub created_by_id: String,
}

/// Create a notification.
///
/// Targeted notifications require recipients and fan out a read-state row per
/// recipient immediately. Global notifications write no per-user rows.
pub async fn create_notification(
    pool: &DbPool,
    input: CreateNotification,
    recipients: &[String],
) -> Result<Notification> {
    if !input.is_global && recipients.is_empty() {
        return Err(Error::Validation(
            "Targeted notifications require at least one recipient".to_string(),
        ));
    }

    let now = now_rfc3339();
    let notification = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (id, title, content, type, link, is_global, created_by_id, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.kind)
    .bind(&input.link)
    .bind(input.is_global)
    .bind(&input.created_by_id)
    .bind(&input.expires_at)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    if !input.is_global {
        for user_id in recipients {
            sqlx::query(
                r#"
                INSERT INTO user_notifications (id, user_id, notification_id, is_read, created_at)
                VALUES (?, ?, ?, 0, ?)
                "#,
            )
            .bind(nanoid::nanoid!())
            .bind(user_id)
            .bind(&notification.id)
            .bind(&now)
            .execute(pool)
            .await?;
        }
    }

    Ok(notification)
}

pub async fn get_notification(pool: &DbPool, id: &str) -> Result<Notification> {
    sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Notification not found: {}", id)))
}

/// Notifications visible to a user: global ones plus those targeted at them,
/// excluding expired entries, newest first.
pub async fn list_visible(pool: &DbPool, user_id: &str) -> Result<Vec<UserNotificationView>> {
    sqlx::query_as::<_, UserNotificationView>(
        r#"
        SELECT n.id, n.title, n.content, n.type, n.link, n.is_global, n.expires_at, n.created_at,
               COALESCE(un.is_read, 0) AS is_read, un.read_at
        FROM notifications n
        LEFT JOIN user_notifications un ON un.notification_id = n.id AND un.user_id = ?
        WHERE (n.is_global = 1 OR un.id IS NOT NULL)
          AND (n.expires_at IS NULL OR n.expires_at > ?)
        ORDER BY n.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(now_rfc3339())
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Count a user's unread read-state rows.
///
/// Global notifications the user has never touched have no row and do not
/// count, matching the lazy materialization model.
pub async fn unread_count(pool: &DbPool, user_id: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM user_notifications WHERE user_id = ? AND is_read = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Mark one notification read for one user.
///
/// For a global notification with no row yet this materializes the row
/// already read. A targeted notification must have a row; marking someone
/// else's targeted notification is NotFound.
pub async fn mark_read(pool: &DbPool, user_id: &str, notification_id: &str) -> Result<()> {
    let notification = get_notification(pool, notification_id).await?;
    let now = now_rfc3339();

    let updated = sqlx::query(
        r#"
        UPDATE user_notifications SET is_read = 1, read_at = ?
        WHERE user_id = ? AND notification_id = ? AND is_read = 0
        "#,
    )
    .bind(&now)
    .bind(user_id)
    .bind(notification_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() > 0 {
        return Ok(());
    }

    let existing: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM user_notifications WHERE user_id = ? AND notification_id = ?",
    )
    .bind(user_id)
    .bind(notification_id)
    .fetch_optional(pool)
    .await?;
    if existing.is_some() {
        // Already read.
        return Ok(());
    }

    if !notification.is_global {
        return Err(Error::NotFound(format!(
            "Notification not found: {}",
            notification_id
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO user_notifications (id, user_id, notification_id, is_read, read_at, created_at)
        VALUES (?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(user_id)
    .bind(notification_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark everything read for one user.
///
/// Two statements, not a transaction: flip existing unread rows, then insert
/// read rows for global notifications the user has never touched.
pub async fn mark_all_read(pool: &DbPool, user_id: &str) -> Result<()> {
    let now = now_rfc3339();

    sqlx::query(
        "UPDATE user_notifications SET is_read = 1, read_at = ? WHERE user_id = ? AND is_read = 0",
    )
    .bind(&now)
    .bind(user_id)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO user_notifications (id, user_id, notification_id, is_read, read_at, created_at)
        SELECT lower(hex(randomblob(16))), ?, n.id, 1, ?, ?
        FROM notifications n
        WHERE n.is_global = 1
          AND NOT EXISTS (
            SELECT 1 FROM user_notifications un
            WHERE un.user_id = ? AND un.notification_id = n.id
          )
        "#,
    )
    .bind(user_id)
    .bind(&now)
    .bind(&now)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Admin listing of every notification, newest first.
pub async fn list_all(pool: &DbPool) -> Result<Vec<Notification>> {
    sqlx::query_as::<_, Notification>("SELECT * FROM notifications ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Delete a notification. Read receipts cascade.
pub async fn delete_notification(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Notification not found: {}", id)));
    }
    Ok(())
}
