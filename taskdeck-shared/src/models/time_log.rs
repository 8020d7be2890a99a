/// Time logged against tasks
///
/// `hours` is derived from the interval on insert and never taken from a
/// client. The owning task's `hours_spent` is kept in step by the time-log
/// service in the same transaction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::pagination::{Page, PageRequest};

/// Longest interval a single log may cover
pub const MAX_LOG_HOURS: f64 = 24.0;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TimeLog {
    #[serde(skip)]
    pub id: i64,

    #[serde(rename = "id")]
    pub public_id: Uuid,

    #[serde(skip)]
    pub task_id: i64,

    #[serde(rename = "taskId")]
    pub task_public_id: Uuid,

    #[serde(skip)]
    pub account_id: i64,

    #[serde(rename = "accountId")]
    pub account_public_id: Uuid,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,

    pub hours: f64,

    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTimeLog {
    pub task_id: i64,
    pub account_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
}

/// Hours between `start` and `end`, rounded to two decimals
///
/// Returns `None` unless `end` is after `start` by enough to round to at
/// least 0.01 hours.
pub fn compute_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
    let seconds = (end - start).num_seconds();
    if seconds <= 0 {
        return None;
    }

    let hours = (seconds as f64 / 3600.0 * 100.0).round() / 100.0;
    (hours > 0.0).then_some(hours)
}

const TIME_LOG_COLUMNS: &str = "tl.id, tl.public_id, tl.task_id, t.public_id AS task_public_id, \
     tl.account_id, a.public_id AS account_public_id, tl.start_time, tl.end_time, tl.hours, \
     tl.description, tl.created_at";

const TIME_LOG_JOINS: &str = "JOIN tasks t ON t.id = tl.task_id JOIN accounts a ON a.id = tl.account_id";

impl TimeLog {
    /// Inserts a log with `hours` already computed by the caller
    pub async fn create<'e, E>(executor: E, data: CreateTimeLog, hours: f64) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH tl AS (
                INSERT INTO time_logs (task_id, account_id, start_time, end_time, hours, description)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {TIME_LOG_COLUMNS} FROM tl {TIME_LOG_JOINS}"
        );

        sqlx::query_as::<_, TimeLog>(&sql)
            .bind(data.task_id)
            .bind(data.account_id)
            .bind(data.start_time)
            .bind(data.end_time)
            .bind(hours)
            .bind(data.description)
            .fetch_one(executor)
            .await
    }

    pub async fn find_in_task<'e, E>(
        executor: E,
        task_id: i64,
        public_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {TIME_LOG_COLUMNS} FROM time_logs tl {TIME_LOG_JOINS}
             WHERE tl.public_id = $1 AND tl.task_id = $2 AND tl.deleted_at IS NULL"
        );

        sqlx::query_as::<_, TimeLog>(&sql)
            .bind(public_id)
            .bind(task_id)
            .fetch_optional(executor)
            .await
    }

    /// Live logs of a task, most recent interval first
    pub async fn list_for_task(
        pool: &sqlx::PgPool,
        task_id: i64,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM time_logs tl WHERE tl.task_id = $1 AND tl.deleted_at IS NULL",
        )
        .bind(task_id)
        .fetch_one(pool)
        .await?;

        let sql = format!(
            "SELECT {TIME_LOG_COLUMNS} FROM time_logs tl {TIME_LOG_JOINS}
             WHERE tl.task_id = $1 AND tl.deleted_at IS NULL
             ORDER BY tl.start_time DESC, tl.id DESC
             LIMIT $2 OFFSET $3"
        );

        let items = sqlx::query_as::<_, TimeLog>(&sql)
            .bind(task_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        Ok(Page::new(items, page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_compute_hours() {
        let start = Utc::now();
        assert_eq!(compute_hours(start, start + Duration::minutes(90)), Some(1.5));
        assert_eq!(compute_hours(start, start + Duration::minutes(20)), Some(0.33));
        assert_eq!(compute_hours(start, start + Duration::hours(8)), Some(8.0));
    }

    #[test]
    fn test_compute_hours_rejects_empty_or_inverted_interval() {
        let start = Utc::now();
        assert_eq!(compute_hours(start, start), None);
        assert_eq!(compute_hours(start, start - Duration::minutes(5)), None);
    }

    #[test]
    fn test_compute_hours_rejects_intervals_that_round_to_zero() {
        let start = Utc::now();
        assert_eq!(compute_hours(start, start + Duration::seconds(10)), None);
        assert_eq!(compute_hours(start, start + Duration::seconds(17)), None);
        assert_eq!(compute_hours(start, start + Duration::seconds(18)), Some(0.01));
    }
}
