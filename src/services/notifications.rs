//! Notification service: validation and fan-out on top of the query layer.

use serde::Serialize;

use crate::db::{self, DbPool, Notification, UserNotificationView};
use crate::{Error, Result};

const VALID_KINDS: [&str; 4] = ["info", "success", "warning", "error"];

/// A user's notification feed with the unread counter.
#[derive(Debug, Serialize)]
pub struct NotificationFeed {
    pub notifications: Vec<UserNotificationView>,
    pub unread_count: i64,
}

/// Input accepted from the admin create endpoint.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub title: String,
    pub content: String,
    pub kind: String,
    pub link: Option<String>,
    pub is_global: bool,
    pub expires_at: Option<String>,
    pub recipients: Vec<String>,
}

#[derive(Clone)]
pub struct NotificationService {
    db: DbPool,
}

impl NotificationService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Validate and create a notification, fanning out to recipients when
    /// targeted.
    pub async fn create(&self, draft: NotificationDraft, created_by: &str) -> Result<Notification> {
        if draft.title.trim().is_empty() {
            return Err(Error::Validation("Title is required".to_string()));
        }
        if !VALID_KINDS.contains(&draft.kind.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid notification type: {}",
                draft.kind
            )));
        }

        db::create_notification(
            &self.db,
            db::CreateNotification {
                title: draft.title,
                content: draft.content,
                kind: draft.kind,
                link: draft.link,
                is_global: draft.is_global,
                expires_at: draft.expires_at,
                created_by_id: created_by.to_string(),
            },
            &draft.recipients,
        )
        .await
    }

    /// Visible notifications plus the unread counter for one user.
    pub async fn feed(&self, user_id: &str) -> Result<NotificationFeed> {
        let notifications = db::list_visible(&self.db, user_id).await?;
        let unread_count = db::unread_count(&self.db, user_id).await?;
        Ok(NotificationFeed {
            notifications,
            unread_count,
        })
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<()> {
        db::mark_read(&self.db, user_id, notification_id).await
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<()> {
        db::mark_all_read(&self.db, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{create_user, CreateUser};

    async fn seeded_service() -> NotificationService {
        let pool = test_pool().await;
        for name in ["admin", "alice"] {
            create_user(
                &pool,
                CreateUser {
                    id: name.to_string(),
                    email: format!("{}@example.com", name),
                    username: name.to_string(),
                    display_name: name.to_string(),
                    password_hash: "x".to_string(),
                    is_admin: name == "admin",
                },
            )
            .await
            .unwrap();
        }
        NotificationService::new(pool)
    }

    fn draft(kind: &str) -> NotificationDraft {
        NotificationDraft {
            title: "Maintenance".to_string(),
            content: "Tonight".to_string(),
            kind: kind.to_string(),
            link: None,
            is_global: true,
            expires_at: None,
            recipients: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_invalid_kind_rejected() {
        let service = seeded_service().await;
        let err = service.create(draft("shout"), "admin").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_feed_counts_only_materialized_unread() {
        let service = seeded_service().await;
        service.create(draft("info"), "admin").await.unwrap();

        // Global with no row yet: visible but not counted unread.
        let feed = service.feed("alice").await.unwrap();
        assert_eq!(feed.notifications.len(), 1);
        assert!(!feed.notifications[0].is_read);
        assert_eq!(feed.unread_count, 0);
    }
}
