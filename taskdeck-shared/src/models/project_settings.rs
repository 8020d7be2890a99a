/// Per-project settings (1:1 with `projects`)
///
/// Created together with the project and never deleted on their own.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;

use super::task::TaskPriority;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(skip)]
    pub project_id: i64,

    /// Priority given to tasks created without one
    pub default_task_priority: TaskPriority,

    /// Lets plain members create tasks
    pub allow_member_task_creation: bool,

    /// Sends a notification to the assignee on (re)assignment
    pub notify_on_task_assignment: bool,

    pub updated_at: DateTime<Utc>,
}

/// Partial settings update
#[derive(Debug, Clone, Default)]
pub struct UpdateProjectSettings {
    pub default_task_priority: Option<TaskPriority>,
    pub allow_member_task_creation: Option<bool>,
    pub notify_on_task_assignment: Option<bool>,
}

impl ProjectSettings {
    /// Inserts the default row for a new project
    pub async fn create_default<'e, E>(executor: E, project_id: i64) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectSettings>(
            r#"
            INSERT INTO project_settings (project_id)
            VALUES ($1)
            RETURNING project_id, default_task_priority, allow_member_task_creation,
                      notify_on_task_assignment, updated_at
            "#,
        )
        .bind(project_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find<'e, E>(executor: E, project_id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectSettings>(
            r#"
            SELECT project_id, default_task_priority, allow_member_task_creation,
                   notify_on_task_assignment, updated_at
            FROM project_settings
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        project_id: i64,
        data: UpdateProjectSettings,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectSettings>(
            r#"
            UPDATE project_settings
            SET default_task_priority = COALESCE($2, default_task_priority),
                allow_member_task_creation = COALESCE($3, allow_member_task_creation),
                notify_on_task_assignment = COALESCE($4, notify_on_task_assignment),
                updated_at = NOW()
            WHERE project_id = $1
            RETURNING project_id, default_task_priority, allow_member_task_creation,
                      notify_on_task_assignment, updated_at
            "#,
        )
        .bind(project_id)
        .bind(data.default_task_priority)
        .bind(data.allow_member_task_creation)
        .bind(data.notify_on_task_assignment)
        .fetch_optional(executor)
        .await
    }
}
