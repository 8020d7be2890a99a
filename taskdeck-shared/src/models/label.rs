/// Project labels and their attachment to tasks
///
/// Label names are unique per project among live labels
/// (`uq_labels_project_name`, case-insensitive). Deleting a label soft-deletes
/// it; its task attachments stay in `task_labels` but are filtered out on read.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Name of the unique index on live label names
pub const LABEL_NAME_CONSTRAINT: &str = "uq_labels_project_name";

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    #[serde(skip)]
    pub id: i64,

    #[serde(rename = "id")]
    pub public_id: Uuid,

    #[serde(skip)]
    pub project_id: i64,

    pub name: String,

    /// `#RRGGBB`
    pub color: String,

    pub created_at: DateTime<Utc>,
}

/// True for `#RRGGBB` hex colors
pub fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

const LABEL_COLUMNS: &str = "l.id, l.public_id, l.project_id, l.name, l.color, l.created_at";

impl Label {
    pub async fn create<'e, E>(
        executor: E,
        project_id: i64,
        name: &str,
        color: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "INSERT INTO labels AS l (project_id, name, color)
             VALUES ($1, $2, $3)
             RETURNING {LABEL_COLUMNS}"
        );

        sqlx::query_as::<_, Label>(&sql)
            .bind(project_id)
            .bind(name.trim())
            .bind(color.to_ascii_uppercase())
            .fetch_one(executor)
            .await
    }

    /// Live label of the project by public id
    pub async fn find_in_project<'e, E>(
        executor: E,
        project_id: i64,
        public_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {LABEL_COLUMNS} FROM labels l
             WHERE l.public_id = $1 AND l.project_id = $2 AND l.deleted_at IS NULL"
        );

        sqlx::query_as::<_, Label>(&sql)
            .bind(public_id)
            .bind(project_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list_for_project<'e, E>(executor: E, project_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {LABEL_COLUMNS} FROM labels l
             WHERE l.project_id = $1 AND l.deleted_at IS NULL
             ORDER BY lower(l.name)"
        );

        sqlx::query_as::<_, Label>(&sql)
            .bind(project_id)
            .fetch_all(executor)
            .await
    }

    /// Live labels attached to a task
    pub async fn list_for_task<'e, E>(executor: E, task_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {LABEL_COLUMNS} FROM task_labels tl
             JOIN labels l ON l.id = tl.label_id AND l.deleted_at IS NULL
             WHERE tl.task_id = $1
             ORDER BY lower(l.name)"
        );

        sqlx::query_as::<_, Label>(&sql)
            .bind(task_id)
            .fetch_all(executor)
            .await
    }

    /// Attaches a label; returns false if it was already attached
    pub async fn attach<'e, E>(executor: E, task_id: i64, label_id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "INSERT INTO task_labels (task_id, label_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(label_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Detaches a label; returns false if it was not attached
    pub async fn detach<'e, E>(executor: E, task_id: i64, label_id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM task_labels WHERE task_id = $1 AND label_id = $2")
            .bind(task_id)
            .bind(label_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_validation() {
        assert!(is_valid_color("#1a2B3c"));
        assert!(is_valid_color("#FFFFFF"));
        assert!(!is_valid_color("FFFFFF"));
        assert!(!is_valid_color("#FFF"));
        assert!(!is_valid_color("#GGGGGG"));
        assert!(!is_valid_color("#FFFFFFF"));
    }
}
