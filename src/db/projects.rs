//! Project and task database queries.
//!
//! Workspace-scoped work items. Status and priority are plain strings
//! validated at the API boundary; there is no transition state machine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{now_rfc3339, DbPool};

/// Project record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    pub created_by_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Task record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub due_date: Option<String>,
    pub assigned_to_id: Option<String>,
    pub created_by_id: String,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a task.
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub workspace_id: String,
    pub project_id: Option<String>,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub due_date: Option<String>,
    pub assigned_to_id: Option<String>,
    pub created_by_id: String,
}

/// Input for updating a task. None fields keep their current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<Option<String>>,
    pub assigned_to_id: Option<Option<String>>,
    pub project_id: Option<Option<String>>,
}

// ============================================================================
// Project Queries
// ============================================================================

pub async fn create_project(
    pool: &DbPool,
    workspace_id: &str,
    name: &str,
    description: &str,
    created_by: &str,
) -> Result<Project> {
    let now = now_rfc3339();
    sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (id, workspace_id, name, description, status, created_by_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'active', ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(workspace_id)
    .bind(name)
    .bind(description)
    .bind(created_by)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn get_project(pool: &DbPool, id: &str) -> Result<Project> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Project not found: {}", id)))
}

pub async fn list_projects(pool: &DbPool, workspace_id: &str) -> Result<Vec<Project>> {
    sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE workspace_id = ? ORDER BY created_at DESC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

pub async fn update_project(
    pool: &DbPool,
    id: &str,
    name: &str,
    description: &str,
    status: &str,
) -> Result<Project> {
    sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects SET name = ?, description = ?, status = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(status)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Project not found: {}", id)))
}

/// Delete a project. Tasks keep their rows with project_id set to null.
pub async fn delete_project(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Project not found: {}", id)));
    }
    Ok(())
}

// ============================================================================
// Task Queries
// ============================================================================

pub async fn create_task(pool: &DbPool, input: CreateTask) -> Result<Task> {
    let now = now_rfc3339();
    sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, workspace_id, project_id, title, description, status, priority,
                           due_date, assigned_to_id, created_by_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'todo', ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(nanoid::nanoid!())
    .bind(&input.workspace_id)
    .bind(&input.project_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(&input.priority)
    .bind(&input.due_date)
    .bind(&input.assigned_to_id)
    .bind(&input.created_by_id)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn get_task(pool: &DbPool, id: &str) -> Result<Task> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Task not found: {}", id)))
}

pub async fn list_tasks(pool: &DbPool, workspace_id: &str) -> Result<Vec<Task>> {
    sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE workspace_id = ? ORDER BY created_at DESC",
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Apply a partial task update.
///
/// Stamps completed_at when status moves to `done` and clears it when it
/// moves away.
pub async fn update_task(pool: &DbPool, id: &str, input: UpdateTask) -> Result<Task> {
    let task = get_task(pool, id).await?;

    let title = input.title.unwrap_or(task.title);
    let description = input.description.unwrap_or(task.description);
    let status = input.status.unwrap_or(task.status);
    let priority = input.priority.unwrap_or(task.priority);
    let due_date = input.due_date.unwrap_or(task.due_date);
    let assigned_to_id = input.assigned_to_id.unwrap_or(task.assigned_to_id);
    let project_id = input.project_id.unwrap_or(task.project_id);

    let completed_at = if status == "done" {
        task.completed_at.or_else(|| Some(now_rfc3339()))
    } else {
        None
    };

    sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks
        SET title = ?, description = ?, status = ?, priority = ?, due_date = ?,
            assigned_to_id = ?, project_id = ?, completed_at = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(&title)
    .bind(&description)
    .bind(&status)
    .bind(&priority)
    .bind(&due_date)
    .bind(&assigned_to_id)
    .bind(&project_id)
    .bind(&completed_at)
    .bind(now_rfc3339())
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

pub async fn delete_task(pool: &DbPool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Task not found: {}", id)));
    }
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

    fn task_input(ws: &str, title: &str) -> CreateTask {
        CreateTask {
            workspace_id: ws.to_string(),
            project_id: None,
            title: title.to_string(),
            description: String::new(),
            priority: "medium".to_string(),
            due_date: None,
            assigned_to_id: None,
            created_by_id: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;

        let task = create_task(&pool, task_input(&ws, "Ship it")).await.unwrap();
        assert_eq!(task.status, "todo");
        assert!(task.completed_at.is_none());

        let done = update_task(
            &pool,
            &task.id,
            UpdateTask {
                status: Some("done".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(done.completed_at.is_some());

        // Reopening clears the completion stamp.
        let reopened = update_task(
            &pool,
            &task.id,
            UpdateTask {
                status: Some("todo".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_project_delete_detaches_tasks() {
        let pool = test_pool().await;
        let ws = seed(&pool).await;

        let project = create_project(&pool, &ws, "Launch", "", "alice").await.unwrap();
        let mut input = task_input(&ws, "Prep");
        input.project_id = Some(project.id.clone());
        let task = create_task(&pool, input).await.unwrap();

        delete_project(&pool, &project.id).await.unwrap();

        let task = get_task(&pool, &task.id).await.unwrap();
        assert!(task.project_id.is_none());
    }
}
