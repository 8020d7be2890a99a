/// In-app notifications
///
/// Notifications are written by services alongside the mutation that caused
/// them and belong to a single recipient. Archiving hides a notification from
/// the default listing; nothing is ever deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::pagination::{Page, PageRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
pub enum NotificationType {
    TaskAssigned,
    Mentioned,
    CommentAdded,
    AddedToProject,
    RemovedFromProject,
    RoleChanged,
    TaskStatusChanged,
}

/// Notification as shown to its recipient
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(skip)]
    pub id: i64,

    #[serde(rename = "id")]
    pub public_id: Uuid,

    #[serde(skip)]
    pub recipient_id: i64,

    #[serde(rename = "initiatorId")]
    pub initiator_public_id: Option<Uuid>,

    #[serde(rename = "type")]
    pub kind: NotificationType,

    pub message: String,

    #[serde(rename = "taskId")]
    pub task_public_id: Option<Uuid>,

    #[serde(rename = "projectId")]
    pub project_public_id: Option<Uuid>,

    pub is_read: bool,

    pub is_archived: bool,

    pub created_at: DateTime<Utc>,
}

/// A notification to be written
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub initiator_id: Option<i64>,
    pub kind: NotificationType,
    pub message: String,
    pub task_id: Option<i64>,
    pub project_id: Option<i64>,
}

/// Listing options
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,

    #[serde(default)]
    pub include_archived: bool,
}

const NOTIFICATION_SELECT: &str = r#"
    SELECT n.id, n.public_id, n.recipient_id, i.public_id AS initiator_public_id,
           n.type AS kind, n.message, t.public_id AS task_public_id,
           p.public_id AS project_public_id, n.is_read, n.is_archived, n.created_at
    FROM notifications n
    LEFT JOIN accounts i ON i.id = n.initiator_id
    LEFT JOIN tasks t ON t.id = n.task_id
    LEFT JOIN projects p ON p.id = n.project_id
"#;

impl Notification {
    /// Writes one notification
    ///
    /// Self-notifications (initiator is the recipient) are skipped and return
    /// false.
    pub async fn create<'e, E>(executor: E, data: NewNotification) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        if data.initiator_id == Some(data.recipient_id) {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO notifications (recipient_id, initiator_id, type, message, task_id, project_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(data.recipient_id)
        .bind(data.initiator_id)
        .bind(data.kind)
        .bind(data.message)
        .bind(data.task_id)
        .bind(data.project_id)
        .execute(executor)
        .await?;

        Ok(true)
    }

    pub async fn list_for_recipient(
        pool: &sqlx::PgPool,
        recipient_id: i64,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications n
            WHERE n.recipient_id = $1
              AND (NOT $2 OR n.is_read = FALSE)
              AND ($3 OR n.is_archived = FALSE)
            "#,
        )
        .bind(recipient_id)
        .bind(filter.unread_only)
        .bind(filter.include_archived)
        .fetch_one(pool)
        .await?;

        let sql = format!(
            "{NOTIFICATION_SELECT}
             WHERE n.recipient_id = $1
               AND (NOT $2 OR n.is_read = FALSE)
               AND ($3 OR n.is_archived = FALSE)
             ORDER BY n.created_at DESC, n.id DESC
             LIMIT $4 OFFSET $5"
        );

        let items = sqlx::query_as::<_, Notification>(&sql)
            .bind(recipient_id)
            .bind(filter.unread_only)
            .bind(filter.include_archived)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok(Page::new(items, page, total))
    }

    /// Unread, unarchived notifications of a recipient
    pub async fn unread_count<'e, E>(executor: E, recipient_id: i64) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE AND is_archived = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(executor)
        .await
    }

    /// Marks one of the recipient's notifications read
    ///
    /// Returns `None` if it doesn't exist or belongs to someone else.
    pub async fn mark_read<'e, E>(
        executor: E,
        recipient_id: i64,
        public_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH updated AS (
                UPDATE notifications SET is_read = TRUE
                WHERE public_id = $1 AND recipient_id = $2
                RETURNING *
            )
            {}",
            NOTIFICATION_SELECT.replace("FROM notifications n", "FROM updated n")
        );

        sqlx::query_as::<_, Notification>(&sql)
            .bind(public_id)
            .bind(recipient_id)
            .fetch_optional(executor)
            .await
    }

    /// Marks every unread notification of the recipient read
    pub async fn mark_all_read<'e, E>(executor: E, recipient_id: i64) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn archive<'e, E>(
        executor: E,
        recipient_id: i64,
        public_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH updated AS (
                UPDATE notifications SET is_archived = TRUE, is_read = TRUE
                WHERE public_id = $1 AND recipient_id = $2
                RETURNING *
            )
            {}",
            NOTIFICATION_SELECT.replace("FROM notifications n", "FROM updated n")
        );

        sqlx::query_as::<_, Notification>(&sql)
            .bind(public_id)
            .bind(recipient_id)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_defaults() {
        let filter: NotificationFilter = serde_json::from_str("{}").unwrap();
        assert!(!filter.unread_only);
        assert!(!filter.include_archived);
    }

    #[test]
    fn test_type_json_names() {
        assert_eq!(
            serde_json::to_string(&NotificationType::AddedToProject).unwrap(),
            "\"AddedToProject\""
        );
    }
}
