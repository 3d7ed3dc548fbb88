//! Snippet database queries.
//!
//! Snippets are workspace-owned code blobs with pin/favorite/archive flags,
//! optional public sharing via a short share_id, manual ordering, an optional
//! category, and labels through a join table. Every content change appends an
//! immutable version row.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_rfc3339, DbPool};

/// Gap between manually-ordered snippets, leaving room to reorder
/// without renumbering.
const POSITION_GAP: i64 = 1000;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Snippet {
    pub id: String,
    pub workspace_id: String,
    pub category_id: Option<String>,
    pub title: String,
    pub content: String,
    pub language: String,
    pub is_public: bool,
    pub is_pinned: bool,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub share_id: Option<String>,
    pub position: i64,
    pub created_by_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SnippetVersion {
    pub id: String,
    pub snippet_id: String,
    pub content: String,
    pub created_by_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub created_by_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub color: String,
    pub created_by_id: String,
    pub created_at: String,
}

/// Input for creating a snippet.
#[derive(Debug, Clone)]
pub struct CreateSnippet {
    pub workspace_id: String,
    pub category_id: Option<String>,
    pub title: String,
    pub content: String,
    pub language: String,
    pub created_by_id: String,
}

/// Input for updating a snippet. None fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateSnippet {
    pub title: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
    pub category_id: Option<Option<String>>,
    pub position: Option<i64>,
}

/// Flag columns toggled individually and in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetFlag {
    Pinned,
    Favorite,
    Archived,
}

impl SnippetFlag {
    fn column(self) -> &'static str {
        match self {
            SnippetFlag::Pinned => "is_pinned",
            SnippetFlag::Favorite => "is_favorite",
            SnippetFlag::Archived => "is_archived",
        }
    }
}

// ============================================================================
// Snippet Queries
// ============================================================================

/// Create a snippet at the end of the workspace's manual order.
///
/// Also records the initial content as the first version.
pub async fn create_snippet(pool: &DbPool, input: CreateSnippet) -> Result<Snippet> {
    let now = now_rfc3339();
    let id = nanoid::nanoid!();

    let (max_position,): (Option<i64>,) =
        sqlx::query_as("SELECT MAX(position) FROM snippets WHERE workspace_id = ?")
            .bind(&input.workspace_id)
            .fetch_one(pool)
            .await?;
    let position = max_position.unwrap_or(0) + POSITION_GAP;

    let snippet = sqlx::query_as::<_, Snippet>(
        r#"
        INSERT INTO snippets (id, workspace_id, category_id, title, content, language,
                              position, created_by_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&id)
    .bind(&input.workspace_id)
    .bind(&input.category_id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.language)
    .bind(position)
    .bind(&input.created_by_id)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    record_version(pool, &id, &input.content, &input.created_by_id).await?;

    Ok(snippet)
}

pub async fn get_snippet(pool: &DbPool, id: &str) -> Result<Snippet> {
    sqlx::query_as::<_, Snippet>("SELECT * FROM snippets WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Snippet not found: {}", id)))
}

/// Look up a public snippet by its share token.
pub async fn get_snippet_by_share_id(pool: &DbPool, share_id: &str) -> Result<Snippet> {
    sqlx::query_as::<_, Snippet>(
        "SELECT * FROM snippets WHERE share_id = ? AND is_public = 1",
    )
    .bind(share_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound("Shared snippet not found".to_string()))
}

/// List snippets in a workspace in manual order, pinned first.
pub async fn list_snippets(pool: &DbPool, workspace_id: &str) -> Result<Vec<Snippet>> {
    sqlx::query_as::<_, Snippet>(
        r#"
        SELECT * FROM snippets WHERE workspace_id = ?
        ORDER BY is_pinned DESC, position ASC, created_at DESC
        "#,
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Apply a partial snippet update.
///
/// A content change appends a version row with the new content.
pub async fn update_snippet(
    pool: &DbPool,
    id: &str,
    input: UpdateSnippet,
    updated_by: &str,
) -> Result<Snippet> {
    let snippet = get_snippet(pool, id).await?;

    let content_changed = input
        .content
        .as_ref()
        .map(|c| *c != snippet.content)
        .unwrap_or(false);

    let title = input.title.unwrap_or(snippet.title);
    let content = input.content.unwrap_or(snippet.content);
    let language = input.language.unwrap_or(snippet.language);
    let category_id = input.category_id.unwrap_or(snippet.category_id);
    let position = input.position.unwrap_or(snippet.position);

    let updated = sqlx::query_as::<_, Snippet>(
        r#"
        UPDATE snippets
        SET title = ?, content = ?, language = ?, category_id = ?, position = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&content)
    .bind(&language)
    .bind(&category_id)
    .bind(position)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_one(pool)
    .await?;

    if content_changed {
        record_version(pool, id, &content, updated_by).await?;
    }

    Ok(updated)
}

pub async fn delete_snippet(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM snippets WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Snippet not found: {}", id)));
    }
    Ok(())
}

/// Toggle a boolean flag, returning the updated snippet.
pub async fn toggle_flag(pool: &DbPool, id: &str, flag: SnippetFlag) -> Result<Snippet> {
    let query = format!(
        "UPDATE snippets SET {col} = NOT {col}, updated_at = ? WHERE id = ? RETURNING *",
        col = flag.column()
    );
    sqlx::query_as::<_, Snippet>(&query)
        .bind(now_rfc3339())
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Snippet not found: {}", id)))
}

/// Set public visibility, managing the share token.
///
/// Turning sharing off clears share_id. Turning it on assigns a fresh
/// token only when none exists, so re-enabling keeps stable share URLs
/// within a single public period but not across them.
pub async fn set_public(pool: &DbPool, id: &str, is_public: bool) -> Result<Snippet> {
    let snippet = get_snippet(pool, id).await?;

    let share_id = if is_public {
        snippet.share_id.or_else(|| Some(nanoid::nanoid!(10)))
    } else {
        None
    };

    sqlx::query_as::<_, Snippet>(
        "UPDATE snippets SET is_public = ?, share_id = ?, updated_at = ? WHERE id = ? RETURNING *",
    )
    .bind(is_public)
    .bind(&share_id)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

// ============================================================================
// Bulk Operations
// ============================================================================

/// Set a flag on a batch of snippets within one workspace.
pub async fn bulk_set_flag(
    pool: &DbPool,
    workspace_id: &str,
    ids: &[String],
    flag: SnippetFlag,
    value: bool,
) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let query = format!(
        "UPDATE snippets SET {} = ?, updated_at = ? WHERE workspace_id = ? AND id IN ({})",
        flag.column(),
        placeholders
    );
    let mut q = sqlx::query(&query)
        .bind(value)
        .bind(now_rfc3339())
        .bind(workspace_id);
    for id in ids {
        q = q.bind(id);
    }
    Ok(q.execute(pool).await?.rows_affected())
}

/// Delete a batch of snippets within one workspace.
pub async fn bulk_delete(pool: &DbPool, workspace_id: &str, ids: &[String]) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let query = format!(
        "DELETE FROM snippets WHERE workspace_id = ? AND id IN ({})",
        placeholders
    );
    let mut q = sqlx::query(&query).bind(workspace_id);
    for id in ids {
        q = q.bind(id);
    }
    Ok(q.execute(pool).await?.rows_affected())
}

// ============================================================================
// Versions
// ============================================================================

async fn record_version(
    pool: &DbPool,
    snippet_id: &str,
    content: &str,
    created_by: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO snippet_versions (id, snippet_id, content, created_by_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(snippet_id)
    .bind(content)
    .bind(created_by)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// List a snippet's versions, newest first.
pub async fn list_versions(pool: &DbPool, snippet_id: &str) -> Result<Vec<SnippetVersion>> {
    sqlx::query_as::<_, SnippetVersion>(
        "SELECT * FROM snippet_versions WHERE snippet_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(snippet_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

// ============================================================================
// Categories
// ============================================================================

pub async fn create_category(
    pool: &DbPool,
    workspace_id: &str,
    name: &str,
    created_by: &str,
) -> Result<Category> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM categories WHERE workspace_id = ? AND name = ?")
            .bind(workspace_id)
            .bind(name)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Err(Error::AlreadyExists(format!(
            "Category already exists: {}",
            name
        )));
    }

    sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (id, workspace_id, name, created_by_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(workspace_id)
    .bind(name)
    .bind(created_by)
    .bind(now_rfc3339())
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn get_category(pool: &DbPool, id: &str) -> Result<Category> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Category not found: {}", id)))
}

pub async fn list_categories(pool: &DbPool, workspace_id: &str) -> Result<Vec<Category>> {
    sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE workspace_id = ? ORDER BY name ASC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

pub async fn update_category(pool: &DbPool, id: &str, name: &str) -> Result<Category> {
    sqlx::query_as::<_, Category>("UPDATE categories SET name = ? WHERE id = ? RETURNING *")
        .bind(name)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Category not found: {}", id)))
}

/// Delete a category. Referencing snippets survive with category_id nulled
/// by the FK's ON DELETE SET NULL.
pub async fn delete_category(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Category not found: {}", id)));
    }
    Ok(())
}

// ============================================================================
// Labels
// ============================================================================

pub async fn create_label(
    pool: &DbPool,
    workspace_id: &str,
    name: &str,
    color: &str,
    created_by: &str,
) -> Result<Label> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM labels WHERE workspace_id = ? AND name = ?")
            .bind(workspace_id)
            .bind(name)
            .fetch_optional(pool)
            .await?;
    if existing.is_some() {
        return Err(Error::AlreadyExists(format!(
            "Label already exists: {}",
            name
        )));
    }

    sqlx::query_as::<_, Label>(
        r#"
        INSERT INTO labels (id, workspace_id, name, color, created_by_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(workspace_id)
    .bind(name)
    .bind(color)
    .bind(created_by)
    .bind(now_rfc3339())
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn get_label(pool: &DbPool, id: &str) -> Result<Label> {
    sqlx::query_as::<_, Label>("SELECT * FROM labels WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Label not found: {}", id)))
}

pub async fn list_labels(pool: &DbPool, workspace_id: &str) -> Result<Vec<Label>> {
    sqlx::query_as::<_, Label>("SELECT * FROM labels WHERE workspace_id = ? ORDER BY name ASC")
        .bind(workspace_id)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

pub async fn update_label(pool: &DbPool, id: &str, name: &str, color: &str) -> Result<Label> {
    sqlx::query_as::<_, Label>(
        "UPDATE labels SET name = ?, color = ? WHERE id = ? RETURNING *",
    )
    .bind(name)
    .bind(color)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Label not found: {}", id)))
}

/// Delete a label. Join rows cascade; snippets are untouched.
pub async fn delete_label(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM labels WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Label not found: {}", id)));
    }
    Ok(())
}

/// Attach a label to a snippet. Already-attached is a no-op.
pub async fn add_snippet_label(pool: &DbPool, snippet_id: &str, label_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO snippet_labels (id, snippet_id, label_id)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(snippet_id)
    .bind(label_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_snippet_label(pool: &DbPool, snippet_id: &str, label_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM snippet_labels WHERE snippet_id = ? AND label_id = ?")
        .bind(snippet_id)
        .bind(label_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Labels attached to one snippet.
pub async fn labels_for_snippet(pool: &DbPool, snippet_id: &str) -> Result<Vec<Label>> {
    sqlx::query_as::<_, Label>(
        r#"
        SELECT l.* FROM labels l
        JOIN snippet_labels sl ON sl.label_id = l.id
        WHERE sl.snippet_id = ?
        ORDER BY l.name ASC
        "#,
    )
    .bind(snippet_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Attach a label to a batch of snippets within one workspace.
pub async fn bulk_add_label(
    pool: &DbPool,
    workspace_id: &str,
    ids: &[String],
    label_id: &str,
) -> Result<()> {
    for id in ids {
        // Skip ids outside the workspace rather than failing the batch.
        let owned: Option<(String,)> =
            sqlx::query_as("SELECT id FROM snippets WHERE id = ? AND workspace_id = ?")
                .bind(id)
                .bind(workspace_id)
                .fetch_optional(pool)
                .await?;
        if owned.is_some() {
            add_snippet_label(pool, id, label_id).await?;
        }
    }
    Ok(())
}

/// Detach a label from a batch of snippets within one workspace.
pub async fn bulk_remove_label(
    pool: &DbPool,
    workspace_id: &str,
    ids: &[String],
    label_id: &str,
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let query = format!(
        r#"
        DELETE FROM snippet_labels WHERE label_id = ?
        AND snippet_id IN (SELECT id FROM snippets WHERE workspace_id = ? AND id IN ({}))
        "#,
        placeholders
    );
    let mut q = sqlx::query(&query).bind(label_id).bind(workspace_id);
    for id in ids {
        q = q.bind(id);
    }
    q.execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{create_user, CreateUser};
    use crate::db::workspaces::create_workspace;

    async fn seed(pool: &DbPool) -> String {
        create_user(
            pool,
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
        create_workspace(pool, "Team", "", "alice").await.unwrap().id
    }

    fn snippet_input(ws: &str, title: &str) -> CreateSnippet {
        CreateSnippet {
            workspace_id: ws.to_string(),
            category_id: None,
            title: title.to_string(),
            content: "fn main() {}".to_string(),
            language: "rust".to_string(),
            created_by_id: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_position_gap_on_insert() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;

        let first = create_snippet(&pool, snippet_input(&ws, "a")).await.unwrap();
        let second = create_snippet(&pool, snippet_input(&ws, "b")).await.unwrap();

        assert_eq!(first.position, 1000);
        assert_eq!(second.position, 2000);
    }

    #[tokio::test]
    async fn test_version_appended_only_on_content_change() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;
        let snippet = create_snippet(&pool, snippet_input(&ws, "a")).await.unwrap();

        // Title-only update leaves the version history alone.
        update_snippet(
            &pool,
            &snippet.id,
            UpdateSnippet {
                title: Some("renamed".to_string()),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();
        assert_eq!(list_versions(&pool, &snippet.id).await.unwrap().len(), 1);

        update_snippet(
            &pool,
            &snippet.id,
            UpdateSnippet {
                content: Some("fn main() { println!(); }".to_string()),
                ..Default::default()
            },
            "alice",
        )
        .await
        .unwrap();
        let versions = list_versions(&pool, &snippet.id).await.unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn test_share_id_lifecycle() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;
        let snippet = create_snippet(&pool, snippet_input(&ws, "a")).await.unwrap();
        assert!(snippet.share_id.is_none());

        let shared = set_public(&pool, &snippet.id, true).await.unwrap();
        let token = shared.share_id.clone().unwrap();
        assert!(!token.is_empty());

        // Setting public again keeps the existing token.
        let again = set_public(&pool, &snippet.id, true).await.unwrap();
        assert_eq!(again.share_id.as_deref(), Some(token.as_str()));

        let found = get_snippet_by_share_id(&pool, &token).await.unwrap();
        assert_eq!(found.id, snippet.id);

        let hidden = set_public(&pool, &snippet.id, false).await.unwrap();
        assert!(hidden.share_id.is_none());
        assert!(get_snippet_by_share_id(&pool, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_category_delete_detaches_snippets() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;

        let category = create_category(&pool, &ws, "Utils", "alice").await.unwrap();
        let mut input = snippet_input(&ws, "a");
        input.category_id = Some(category.id.clone());
        let snippet = create_snippet(&pool, input).await.unwrap();

        delete_category(&pool, &category.id).await.unwrap();

        let snippet = get_snippet(&pool, &snippet.id).await.unwrap();
        assert!(snippet.category_id.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_category_name_rejected() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;

        create_category(&pool, &ws, "Utils", "alice").await.unwrap();
        let err = create_category(&pool, &ws, "Utils", "alice").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_bulk_archive_scoped_to_workspace() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;
        let other = create_workspace(&pool, "Other", "", "alice").await.unwrap().id;

        let mine = create_snippet(&pool, snippet_input(&ws, "a")).await.unwrap();
        let theirs = create_snippet(&pool, snippet_input(&other, "b")).await.unwrap();

        let changed = bulk_set_flag(
            &pool,
            &ws,
            &[mine.id.clone(), theirs.id.clone()],
            SnippetFlag::Archived,
            true,
        )
        .await
        .unwrap();
        assert_eq!(changed, 1);

        assert!(get_snippet(&pool, &mine.id).await.unwrap().is_archived);
        assert!(!get_snippet(&pool, &theirs.id).await.unwrap().is_archived);
    }

    #[tokio::test]
    async fn test_label_attach_detach() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;
        let snippet = create_snippet(&pool, snippet_input(&ws, "a")).await.unwrap();
        let label = create_label(&pool, &ws, "wip", "#FF0000", "alice").await.unwrap();

        add_snippet_label(&pool, &snippet.id, &label.id).await.unwrap();
        // Double attach is a no-op.
        add_snippet_label(&pool, &snippet.id, &label.id).await.unwrap();
        assert_eq!(labels_for_snippet(&pool, &snippet.id).await.unwrap().len(), 1);

        remove_snippet_label(&pool, &snippet.id, &label.id).await.unwrap();
        assert!(labels_for_snippet(&pool, &snippet.id).await.unwrap().is_empty());
    }
}
