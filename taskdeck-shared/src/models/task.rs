/// Task model and database operations
///
/// Tasks belong to exactly one project. A task is visible only while both the
/// task and its project are live: every read joins `projects` with a
/// `deleted_at IS NULL` predicate, so deleting a project hides its tasks
/// without touching them.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('to_do', 'in_progress', 'in_review', 'done', 'blocked');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'urgent');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     public_id UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
///     project_id BIGINT NOT NULL REFERENCES projects(id),
///     title VARCHAR(200) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'to_do',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     assignee_id BIGINT REFERENCES accounts(id),
///     created_by BIGINT NOT NULL REFERENCES accounts(id),
///     due_date DATE,
///     progress SMALLINT NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
///     hours_spent DOUBLE PRECISION NOT NULL DEFAULT 0 CHECK (hours_spent >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::pagination::{Page, PageRequest};

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
pub enum TaskStatus {
    ToDo,
    InProgress,
    InReview,
    Done,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "ToDo",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::InReview => "InReview",
            TaskStatus::Done => "Done",
            TaskStatus::Blocked => "Blocked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Selected columns; expects `t` (tasks), `p` (projects), `c` (creator) and
/// `asg` (assignee, left join) in scope
const TASK_COLUMNS: &str = "t.id, t.public_id, t.project_id, p.public_id AS project_public_id, \
     t.title, t.description, t.status, t.priority, t.assignee_id, \
     asg.public_id AS assignee_public_id, t.created_by, c.public_id AS creator_public_id, \
     t.due_date, t.progress, t.hours_spent, t.created_at, t.updated_at, t.deleted_at";

const TASK_JOINS: &str = "JOIN projects p ON p.id = t.project_id \
     JOIN accounts c ON c.id = t.created_by \
     LEFT JOIN accounts asg ON asg.id = t.assignee_id";

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(skip)]
    pub id: i64,

    #[serde(rename = "id")]
    pub public_id: Uuid,

    #[serde(skip)]
    pub project_id: i64,

    #[serde(rename = "projectId")]
    pub project_public_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub status: TaskStatus,

    pub priority: TaskPriority,

    #[serde(skip)]
    pub assignee_id: Option<i64>,

    #[serde(rename = "assigneeId")]
    pub assignee_public_id: Option<Uuid>,

    #[serde(skip)]
    pub created_by: i64,

    #[serde(rename = "createdBy")]
    pub creator_public_id: Uuid,

    pub due_date: Option<NaiveDate>,

    /// Percent complete, 0 to 100
    pub progress: i16,

    /// Sum of live time-log hours
    pub hours_spent: f64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub assignee_id: Option<i64>,
    pub created_by: i64,
    pub due_date: Option<NaiveDate>,
}

/// Editable task fields; status and assignee have their own operations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i16>,
}

impl UpdateTask {
    pub fn is_empty(&self) -> bool {
        *self == UpdateTask::default()
    }
}

/// Filters for task listings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    /// Public id of the assignee
    pub assignee_id: Option<Uuid>,

    /// Case-insensitive substring of the title
    pub search: Option<String>,
}

impl Task {
    /// Snapshot of the user-editable fields, used for audit values
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "description": self.description,
            "priority": self.priority,
            "dueDate": self.due_date,
            "progress": self.progress,
        })
    }

    pub async fn create<'e, E>(executor: E, data: CreateTask) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH t AS (
                INSERT INTO tasks (project_id, title, description, priority, assignee_id, created_by, due_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT {TASK_COLUMNS} FROM t {TASK_JOINS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(data.project_id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.priority)
            .bind(data.assignee_id)
            .bind(data.created_by)
            .bind(data.due_date)
            .fetch_one(executor)
            .await
    }

    /// Finds a live task of a live project by public id
    pub async fn find_in_project<'e, E>(
        executor: E,
        project_id: i64,
        public_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t {TASK_JOINS}
             WHERE t.public_id = $1 AND t.project_id = $2
               AND t.deleted_at IS NULL AND p.deleted_at IS NULL"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(public_id)
            .bind(project_id)
            .fetch_optional(executor)
            .await
    }

    /// Live task by internal id, row-locked
    pub async fn lock_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks t {TASK_JOINS}
             WHERE t.id = $1 AND t.deleted_at IS NULL AND p.deleted_at IS NULL
             FOR UPDATE OF t"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists a project's live tasks newest-first
    pub async fn list_for_project(
        pool: &sqlx::PgPool,
        project_id: i64,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count_query = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) FROM tasks t {TASK_JOINS} WHERE "
        ));
        push_list_conditions(&mut count_query, project_id, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TASK_COLUMNS} FROM tasks t {TASK_JOINS} WHERE "
        ));
        push_list_conditions(&mut query, project_id, filter);
        query
            .push(" ORDER BY t.created_at DESC, t.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = query.build_query_as::<Task>().fetch_all(pool).await?;

        Ok(Page::new(items, page, total))
    }

    pub async fn update<'e, E>(
        executor: E,
        id: i64,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH t AS (
                UPDATE tasks
                SET title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    priority = COALESCE($4, priority),
                    due_date = COALESCE($5, due_date),
                    progress = COALESCE($6, progress),
                    updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT {TASK_COLUMNS} FROM t {TASK_JOINS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.priority)
            .bind(data.due_date)
            .bind(data.progress)
            .fetch_optional(executor)
            .await
    }

    pub async fn set_status<'e, E>(
        executor: E,
        id: i64,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH t AS (
                UPDATE tasks SET status = $2, updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT {TASK_COLUMNS} FROM t {TASK_JOINS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(executor)
            .await
    }

    /// Sets or clears the assignee
    pub async fn set_assignee<'e, E>(
        executor: E,
        id: i64,
        assignee_id: Option<i64>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH t AS (
                UPDATE tasks SET assignee_id = $2, updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT {TASK_COLUMNS} FROM t {TASK_JOINS}"
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(assignee_id)
            .fetch_optional(executor)
            .await
    }

    /// Adds `delta` hours (negative to subtract), never dropping below zero
    pub async fn add_hours<'e, E>(executor: E, id: i64, delta: f64) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE tasks SET hours_spent = GREATEST(0, hours_spent + $2), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(delta)
        .execute(executor)
        .await?;

        Ok(())
    }
}

fn push_list_conditions(query: &mut QueryBuilder<'_, Postgres>, project_id: i64, filter: &TaskFilter) {
    query
        .push("t.deleted_at IS NULL AND p.deleted_at IS NULL AND t.project_id = ")
        .push_bind(project_id);

    if let Some(status) = filter.status {
        query.push(" AND t.status = ").push_bind(status);
    }

    if let Some(priority) = filter.priority {
        query.push(" AND t.priority = ").push_bind(priority);
    }

    if let Some(assignee) = filter.assignee_id {
        query.push(" AND asg.public_id = ").push_bind(assignee);
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(" AND t.title ILIKE ")
            .push_bind(format!("%{}%", search.replace('%', "\\%").replace('_', "\\_")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_json_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::ToDo).unwrap(), "\"ToDo\"");
        assert_eq!(serde_json::to_string(&TaskStatus::InReview).unwrap(), "\"InReview\"");
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"Done\"").unwrap(),
            TaskStatus::Done
        );
        assert_eq!(TaskStatus::InProgress.as_str(), "InProgress");
    }

    #[test]
    fn test_filter_from_query_names() {
        let filter: TaskFilter =
            serde_json::from_str(r#"{"status":"Blocked","priority":"Urgent"}"#).unwrap();
        assert_eq!(filter.status, Some(TaskStatus::Blocked));
        assert_eq!(filter.priority, Some(TaskPriority::Urgent));
        assert!(filter.assignee_id.is_none());
    }

    #[test]
    fn test_update_task_is_empty() {
        assert!(UpdateTask::default().is_empty());
        assert!(!UpdateTask {
            progress: Some(50),
            ..Default::default()
        }
        .is_empty());
    }
}
