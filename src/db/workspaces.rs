//! Workspace, membership, and invite database queries.
//!
//! The workspace is the tenant boundary: every domain entity hangs off one,
//! and membership role gates every mutation.

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_rfc3339, DbPool};

// ============================================================================
// Types
// ============================================================================

/// Membership role within a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Admin,
    #[default]
    Member,
    Viewer,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Owners and admins may invite and manage members.
    pub fn can_manage_members(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    /// Viewers are read-only; everyone else may mutate workspace content.
    pub fn can_edit_content(&self) -> bool {
        !matches!(self, Self::Viewer)
    }
}

/// Workspace record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_by_id: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Membership record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkspaceMember {
    pub id: String,
    pub workspace_id: String,
    pub user_id: String,
    pub role: String,
    pub invited_by: Option<String>,
    pub joined_at: String,
}

impl WorkspaceMember {
    pub fn role_enum(&self) -> WorkspaceRole {
        WorkspaceRole::parse(&self.role).unwrap_or_default()
    }
}

/// Membership joined with user identity, for member listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MemberWithUser {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: String,
    pub joined_at: String,
}

/// Pending invitation record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkspaceInvite {
    pub id: String,
    pub workspace_id: String,
    pub email: String,
    pub role: String,
    pub token: String,
    pub invited_by: String,
    pub expires_at: String,
    pub accepted_at: Option<String>,
    pub created_at: String,
}

impl WorkspaceInvite {
    pub fn is_expired(&self) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => expires < Utc::now(),
            Err(_) => true,
        }
    }
}

/// Turn a workspace name into a URL-friendly slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

// ============================================================================
// Workspace Queries
// ============================================================================

/// Create a workspace and add the creator as owner.
///
/// Two sequential writes; the membership insert follows the workspace insert.
pub async fn create_workspace(
    pool: &DbPool,
    name: &str,
    description: &str,
    created_by: &str,
) -> Result<Workspace> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(Error::Validation("Workspace name is required".to_string()));
    }

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM workspaces WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Err(Error::AlreadyExists(
            "A workspace with a similar name already exists".to_string(),
        ));
    }

    let now = now_rfc3339();
    let workspace = sqlx::query_as::<_, Workspace>(
        r#"
        INSERT INTO workspaces (id, name, slug, description, created_by_id, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(name)
    .bind(&slug)
    .bind(description)
    .bind(created_by)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO workspace_members (id, workspace_id, user_id, role, joined_at)
        VALUES (?, ?, ?, 'owner', ?)
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(&workspace.id)
    .bind(created_by)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(workspace)
}

/// Get a workspace by ID.
pub async fn get_workspace(pool: &DbPool, id: &str) -> Result<Workspace> {
    sqlx::query_as::<_, Workspace>("SELECT * FROM workspaces WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Workspace not found: {}", id)))
}

/// List workspaces the user belongs to.
pub async fn list_user_workspaces(pool: &DbPool, user_id: &str) -> Result<Vec<Workspace>> {
    sqlx::query_as::<_, Workspace>(
        r#"
        SELECT w.* FROM workspaces w
        INNER JOIN workspace_members m ON m.workspace_id = w.id
        WHERE m.user_id = ? AND w.is_active = 1
        ORDER BY w.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Update workspace name/description, regenerating the slug when renamed.
pub async fn update_workspace(
    pool: &DbPool,
    id: &str,
    name: &str,
    description: &str,
) -> Result<Workspace> {
    let workspace = get_workspace(pool, id).await?;

    let mut slug = workspace.slug.clone();
    if name != workspace.name {
        slug = slugify(name);
        if slug.is_empty() {
            return Err(Error::Validation("Workspace name is required".to_string()));
        }
        let clash: Option<(String,)> =
            sqlx::query_as("SELECT id FROM workspaces WHERE slug = ? AND id != ?")
                .bind(&slug)
                .bind(id)
                .fetch_optional(pool)
                .await?;
        if clash.is_some() {
            return Err(Error::AlreadyExists(
                "A workspace with a similar name already exists".to_string(),
            ));
        }
    }

    sqlx::query_as::<_, Workspace>(
        r#"
        UPDATE workspaces SET name = ?, slug = ?, description = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&slug)
    .bind(description)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Delete a workspace; FK cascades remove members, invites, and content.
pub async fn delete_workspace(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Workspace not found: {}", id)));
    }
    Ok(())
}

// ============================================================================
// Membership Queries
// ============================================================================

/// Look up a user's membership in a workspace.
pub async fn get_membership(
    pool: &DbPool,
    workspace_id: &str,
    user_id: &str,
) -> Result<Option<WorkspaceMember>> {
    sqlx::query_as::<_, WorkspaceMember>(
        "SELECT * FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
    )
    .bind(workspace_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::Database)
}

/// Membership lookup that fails with Forbidden when absent.
pub async fn require_membership(
    pool: &DbPool,
    workspace_id: &str,
    user_id: &str,
) -> Result<WorkspaceMember> {
    get_membership(pool, workspace_id, user_id)
        .await?
        .ok_or(Error::Forbidden)
}

/// List members with user identity.
pub async fn list_members(pool: &DbPool, workspace_id: &str) -> Result<Vec<MemberWithUser>> {
    sqlx::query_as::<_, MemberWithUser>(
        r#"
        SELECT m.user_id, u.username, u.display_name, u.email, m.role, m.joined_at
        FROM workspace_members m
        INNER JOIN users u ON u.id = m.user_id
        WHERE m.workspace_id = ?
        ORDER BY m.joined_at ASC
        "#,
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Insert a membership row.
pub async fn add_member(
    pool: &DbPool,
    workspace_id: &str,
    user_id: &str,
    role: WorkspaceRole,
    invited_by: Option<&str>,
) -> Result<WorkspaceMember> {
    sqlx::query_as::<_, WorkspaceMember>(
        r#"
        INSERT INTO workspace_members (id, workspace_id, user_id, role, invited_by, joined_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(workspace_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(invited_by)
    .bind(now_rfc3339())
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            Error::AlreadyExists("User is already a member of this workspace".to_string())
        }
        _ => Error::Database(e),
    })
}

/// Change a member's role.
pub async fn update_member_role(
    pool: &DbPool,
    workspace_id: &str,
    user_id: &str,
    role: WorkspaceRole,
) -> Result<()> {
    let result =
        sqlx::query("UPDATE workspace_members SET role = ? WHERE workspace_id = ? AND user_id = ?")
            .bind(role.as_str())
            .bind(workspace_id)
            .bind(user_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Member not found".to_string()));
    }
    Ok(())
}

/// Remove a member from a workspace.
pub async fn remove_member(pool: &DbPool, workspace_id: &str, user_id: &str) -> Result<()> {
    let result =
        sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
            .bind(workspace_id)
            .bind(user_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Member not found".to_string()));
    }
    Ok(())
}

/// Check whether a user with the given email is already a member.
pub async fn member_email_exists(pool: &DbPool, workspace_id: &str, email: &str) -> Result<bool> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT m.id FROM workspace_members m
        INNER JOIN users u ON u.id = m.user_id
        WHERE m.workspace_id = ? AND u.email = ?
        "#,
    )
    .bind(workspace_id)
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

// ============================================================================
// Invite Queries
// ============================================================================

/// Create a pending invite with a 7-day expiry.
pub async fn create_invite(
    pool: &DbPool,
    workspace_id: &str,
    email: &str,
    role: WorkspaceRole,
    invited_by: &str,
    token: &str,
) -> Result<WorkspaceInvite> {
    let pending: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT id FROM workspace_invites
        WHERE workspace_id = ? AND email = ? AND accepted_at IS NULL AND expires_at > ?
        "#,
    )
    .bind(workspace_id)
    .bind(email)
    .bind(now_rfc3339())
    .fetch_optional(pool)
    .await?;
    if pending.is_some() {
        return Err(Error::AlreadyExists(
            "An invitation has already been sent to this email".to_string(),
        ));
    }

    let expires_at = Utc::now() + Duration::days(7);
    sqlx::query_as::<_, WorkspaceInvite>(
        r#"
        INSERT INTO workspace_invites (id, workspace_id, email, role, token, invited_by, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(workspace_id)
    .bind(email)
    .bind(role.as_str())
    .bind(token)
    .bind(invited_by)
    .bind(expires_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    .bind(now_rfc3339())
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// Get an invite by its token.
pub async fn get_invite_by_token(pool: &DbPool, token: &str) -> Result<Option<WorkspaceInvite>> {
    sqlx::query_as::<_, WorkspaceInvite>("SELECT * FROM workspace_invites WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(Error::Database)
}

/// List pending invites for a workspace.
pub async fn list_invites(pool: &DbPool, workspace_id: &str) -> Result<Vec<WorkspaceInvite>> {
    sqlx::query_as::<_, WorkspaceInvite>(
        r#"
        SELECT * FROM workspace_invites
        WHERE workspace_id = ? AND accepted_at IS NULL AND expires_at > ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(workspace_id)
    .bind(now_rfc3339())
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Mark an invite accepted.
pub async fn mark_invite_accepted(pool: &DbPool, id: &str) -> Result<()> {
    sqlx::query("UPDATE workspace_invites SET accepted_at = ? WHERE id = ?")
        .bind(now_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete expired, unaccepted invites.
pub async fn cleanup_expired_invites(pool: &DbPool) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM workspace_invites WHERE accepted_at IS NULL AND expires_at < ?")
            .bind(now_rfc3339())
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{create_user, CreateUser};
    use rstest::rstest;

    async fn seed_user(pool: &DbPool, id: &str) {
        create_user(
            pool,
            CreateUser {
                id: id.to_string(),
                email: format!("{}@example.com", id),
                username: id.to_string(),
                display_name: id.to_string(),
                password_hash: "x".to_string(),
                is_admin: false,
            },
        )
        .await
        .unwrap();
    }

    #[rstest]
    #[case("My Team", "my-team")]
    #[case("  Ops / Infra  ", "ops-infra")]
    #[case("Déjà Vu", "d-j-vu")]
    fn test_slugify(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[tokio::test]
    async fn test_create_workspace_adds_owner_membership() {
        let pool = test_pool().await;
        seed_user(&pool, "alice").await;

        let ws = create_workspace(&pool, "My Team", "", "alice").await.unwrap();
        assert_eq!(ws.slug, "my-team");

        let membership = get_membership(&pool, &ws.id, "alice").await.unwrap().unwrap();
        assert_eq!(membership.role_enum(), WorkspaceRole::Owner);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let pool = test_pool().await;
        seed_user(&pool, "alice").await;

        create_workspace(&pool, "My Team", "", "alice").await.unwrap();
        let err = create_workspace(&pool, "My! Team", "", "alice").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_invite_flow() {
        let pool = test_pool().await;
        seed_user(&pool, "alice").await;
        seed_user(&pool, "bob").await;
        let ws = create_workspace(&pool, "Team", "", "alice").await.unwrap();

        let invite = create_invite(&pool, &ws.id, "bob@example.com", WorkspaceRole::Member, "alice", "tok-1")
            .await
            .unwrap();
        assert!(!invite.is_expired());

        // Second pending invite for the same email is rejected.
        let err = create_invite(&pool, &ws.id, "bob@example.com", WorkspaceRole::Member, "alice", "tok-2")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        add_member(&pool, &ws.id, "bob", WorkspaceRole::Member, Some("alice"))
            .await
            .unwrap();
        mark_invite_accepted(&pool, &invite.id).await.unwrap();

        let members = list_members(&pool, &ws.id).await.unwrap();
        assert_eq!(members.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_membership_rejected() {
        let pool = test_pool().await;
        seed_user(&pool, "alice").await;
        let ws = create_workspace(&pool, "Team", "", "alice").await.unwrap();

        let err = add_member(&pool, &ws.id, "alice", WorkspaceRole::Member, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_workspace_cascades_members() {
        let pool = test_pool().await;
        seed_user(&pool, "alice").await;
        let ws = create_workspace(&pool, "Team", "", "alice").await.unwrap();

        delete_workspace(&pool, &ws.id).await.unwrap();
        assert!(get_membership(&pool, &ws.id, "alice").await.unwrap().is_none());
    }
}
