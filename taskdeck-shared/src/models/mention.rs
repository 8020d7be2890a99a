/// Mentions of accounts inside comments
///
/// A mention is visible to the mentioned account only, and only while the
/// comment, its task and the project are live.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::pagination::{Page, PageRequest};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Mention {
    pub id: i64,
    pub public_id: Uuid,
    pub comment_id: i64,
    pub account_id: i64,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Mention with enough context for the recipient to navigate to it
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MentionView {
    #[serde(rename = "id")]
    pub public_id: Uuid,

    pub comment_id: Uuid,

    pub task_id: Uuid,

    pub project_id: Uuid,

    pub task_title: String,

    pub comment_excerpt: String,

    pub mentioned_by: Uuid,

    pub is_read: bool,

    pub read_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

const MENTION_VIEW_COLUMNS: &str = "mn.public_id, cm.public_id AS comment_id, t.public_id AS task_id, \
     p.public_id AS project_id, t.title AS task_title, \
     LEFT(cm.content, 140) AS comment_excerpt, au.public_id AS mentioned_by, \
     mn.is_read, mn.read_at, mn.created_at";

/// Keeps only mentions whose comment, task and project are live
const MENTION_JOINS: &str = "JOIN comments cm ON cm.id = mn.comment_id AND cm.deleted_at IS NULL \
     JOIN tasks t ON t.id = cm.task_id AND t.deleted_at IS NULL \
     JOIN projects p ON p.id = t.project_id AND p.deleted_at IS NULL \
     JOIN accounts au ON au.id = cm.author_id";

impl Mention {
    /// Records mentions of `account_ids` in a comment, skipping duplicates
    pub async fn create_many<'e, E>(
        executor: E,
        comment_id: i64,
        account_ids: &[i64],
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Mention>(
            r#"
            INSERT INTO mentions (comment_id, account_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT (comment_id, account_id) DO NOTHING
            RETURNING id, public_id, comment_id, account_id, is_read, read_at, created_at
            "#,
        )
        .bind(comment_id)
        .bind(account_ids)
        .fetch_all(executor)
        .await
    }

    /// Mentions addressed to an account, newest first
    pub async fn list_for_account(
        pool: &sqlx::PgPool,
        account_id: i64,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<MentionView>, sqlx::Error> {
        let count_sql = format!(
            "SELECT COUNT(*) FROM mentions mn {MENTION_JOINS}
             WHERE mn.account_id = $1 AND (NOT $2 OR mn.is_read = FALSE)"
        );

        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(account_id)
            .bind(unread_only)
            .fetch_one(pool)
            .await?;

        let sql = format!(
            "SELECT {MENTION_VIEW_COLUMNS} FROM mentions mn {MENTION_JOINS}
             WHERE mn.account_id = $1 AND (NOT $2 OR mn.is_read = FALSE)
             ORDER BY mn.created_at DESC, mn.id DESC
             LIMIT $3 OFFSET $4"
        );

        let items = sqlx::query_as::<_, MentionView>(&sql)
            .bind(account_id)
            .bind(unread_only)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok(Page::new(items, page, total))
    }

    /// Visible mention by public id, regardless of recipient
    pub async fn find_by_public_id<'e, E>(
        executor: E,
        public_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT mn.id, mn.public_id, mn.comment_id, mn.account_id, mn.is_read, mn.read_at, mn.created_at
             FROM mentions mn {MENTION_JOINS}
             WHERE mn.public_id = $1"
        );

        sqlx::query_as::<_, Mention>(&sql)
            .bind(public_id)
            .fetch_optional(executor)
            .await
    }

    /// Marks read; the first read time is kept on repeat calls
    pub async fn mark_read<'e, E>(executor: E, id: i64) -> Result<Option<MentionView>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH updated AS (
                UPDATE mentions SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
                WHERE id = $1
                RETURNING *
            )
            SELECT {MENTION_VIEW_COLUMNS} FROM updated mn {MENTION_JOINS}"
        );

        sqlx::query_as::<_, MentionView>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}
