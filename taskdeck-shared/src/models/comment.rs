/// Comments, replies and attachment metadata
///
/// Threading is one level deep: a comment may reply to a top-level comment of
/// the same task, never to a reply. Reads require the comment, its task and
/// the task's project to be live.
///
/// Attachments are metadata only; the file itself lives in external storage
/// referenced by `url`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::pagination::{Page, PageRequest};

const COMMENT_COLUMNS: &str = "cm.id, cm.public_id, cm.task_id, t.public_id AS task_public_id, \
     cm.author_id, au.public_id AS author_public_id, au.first_name AS author_first_name, \
     au.last_name AS author_last_name, cm.parent_comment_id, par.public_id AS parent_public_id, \
     cm.content, cm.created_at, cm.updated_at, cm.deleted_at";

const COMMENT_JOINS: &str = "JOIN tasks t ON t.id = cm.task_id \
     JOIN projects p ON p.id = t.project_id \
     JOIN accounts au ON au.id = cm.author_id \
     LEFT JOIN comments par ON par.id = cm.parent_comment_id";

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(skip)]
    pub id: i64,

    #[serde(rename = "id")]
    pub public_id: Uuid,

    #[serde(skip)]
    pub task_id: i64,

    #[serde(rename = "taskId")]
    pub task_public_id: Uuid,

    #[serde(skip)]
    pub author_id: i64,

    #[serde(rename = "authorId")]
    pub author_public_id: Uuid,

    pub author_first_name: String,

    pub author_last_name: String,

    #[serde(skip)]
    pub parent_comment_id: Option<i64>,

    #[serde(rename = "parentCommentId")]
    pub parent_public_id: Option<Uuid>,

    pub content: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub task_id: i64,
    pub author_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentAttachment {
    #[serde(skip)]
    pub id: i64,

    #[serde(rename = "id")]
    pub public_id: Uuid,

    #[serde(skip)]
    pub comment_id: i64,

    pub file_name: String,

    pub url: String,

    pub content_type: String,

    pub size_bytes: i64,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_comment_id.is_some()
    }

    pub async fn create<'e, E>(executor: E, data: CreateComment) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH cm AS (
                INSERT INTO comments (task_id, author_id, parent_comment_id, content)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT {COMMENT_COLUMNS} FROM cm {COMMENT_JOINS}"
        );

        sqlx::query_as::<_, Comment>(&sql)
            .bind(data.task_id)
            .bind(data.author_id)
            .bind(data.parent_comment_id)
            .bind(data.content)
            .fetch_one(executor)
            .await
    }

    /// Live comment on a live task of a live project
    pub async fn find_in_task<'e, E>(
        executor: E,
        task_id: i64,
        public_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments cm {COMMENT_JOINS}
             WHERE cm.public_id = $1 AND cm.task_id = $2
               AND cm.deleted_at IS NULL AND t.deleted_at IS NULL AND p.deleted_at IS NULL"
        );

        sqlx::query_as::<_, Comment>(&sql)
            .bind(public_id)
            .bind(task_id)
            .fetch_optional(executor)
            .await
    }

    /// Same as [`Comment::find_in_task`], with the comment row locked
    pub async fn lock_in_task<'e, E>(
        executor: E,
        task_id: i64,
        public_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments cm {COMMENT_JOINS}
             WHERE cm.public_id = $1 AND cm.task_id = $2
               AND cm.deleted_at IS NULL AND t.deleted_at IS NULL AND p.deleted_at IS NULL
             FOR UPDATE OF cm"
        );

        sqlx::query_as::<_, Comment>(&sql)
            .bind(public_id)
            .bind(task_id)
            .fetch_optional(executor)
            .await
    }

    /// Live comments of a task, oldest first
    pub async fn list_for_task(
        pool: &sqlx::PgPool,
        task_id: i64,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments cm WHERE cm.task_id = $1 AND cm.deleted_at IS NULL",
        )
        .bind(task_id)
        .fetch_one(pool)
        .await?;

        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments cm {COMMENT_JOINS}
             WHERE cm.task_id = $1 AND cm.deleted_at IS NULL
             ORDER BY cm.created_at, cm.id
             LIMIT $2 OFFSET $3"
        );

        let items = sqlx::query_as::<_, Comment>(&sql)
            .bind(task_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok(Page::new(items, page, total))
    }

    pub async fn update_content<'e, E>(
        executor: E,
        id: i64,
        content: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH cm AS (
                UPDATE comments SET content = $2, updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT {COMMENT_COLUMNS} FROM cm {COMMENT_JOINS}"
        );

        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .bind(content)
            .fetch_optional(executor)
            .await
    }
}

impl CommentAttachment {
    pub async fn add<'e, E>(
        executor: E,
        comment_id: i64,
        attachment: NewAttachment,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CommentAttachment>(
            r#"
            INSERT INTO comment_attachments (comment_id, file_name, url, content_type, size_bytes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, public_id, comment_id, file_name, url, content_type, size_bytes, created_at
            "#,
        )
        .bind(comment_id)
        .bind(attachment.file_name)
        .bind(attachment.url)
        .bind(attachment.content_type)
        .bind(attachment.size_bytes)
        .fetch_one(executor)
        .await
    }

    /// Attachments of several comments in one query
    pub async fn list_for_comments<'e, E>(
        executor: E,
        comment_ids: &[i64],
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CommentAttachment>(
            r#"
            SELECT id, public_id, comment_id, file_name, url, content_type, size_bytes, created_at
            FROM comment_attachments
            WHERE comment_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(comment_ids)
        .fetch_all(executor)
        .await
    }
}
