/// Soft-delete and restore
///
/// Entities are never physically removed. Deleting sets `deleted_at = NOW()`;
/// restoring clears it. Every default repository read carries an explicit
/// `deleted_at IS NULL` predicate built from [`DeletedFilter`], and only admin
/// restore flows ask for [`DeletedFilter::Include`] or [`DeletedFilter::Only`].
///
/// Deleting a project does not sweep its tasks or comments. Child queries join
/// their parent chain with the same predicate, so children disappear with the
/// parent and come back when the parent is restored.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

/// Tables that carry a `deleted_at` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftDeleteTable {
    Accounts,
    Projects,
    Tasks,
    Comments,
    Labels,
    TimeLogs,
}

impl SoftDeleteTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            SoftDeleteTable::Accounts => "accounts",
            SoftDeleteTable::Projects => "projects",
            SoftDeleteTable::Tasks => "tasks",
            SoftDeleteTable::Comments => "comments",
            SoftDeleteTable::Labels => "labels",
            SoftDeleteTable::TimeLogs => "time_logs",
        }
    }
}

/// Which rows a query may see with respect to `deleted_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletedFilter {
    /// Live rows only (the standing filter)
    #[default]
    Exclude,

    /// Live and deleted rows
    Include,

    /// Deleted rows only
    Only,
}

impl DeletedFilter {
    /// SQL predicate for the `deleted_at` column of `alias`
    ///
    /// Always returns a complete boolean expression so callers can append it
    /// with `AND` unconditionally.
    pub fn predicate(&self, alias: &str) -> String {
        match self {
            DeletedFilter::Exclude => format!("{alias}.deleted_at IS NULL"),
            DeletedFilter::Include => "TRUE".to_string(),
            DeletedFilter::Only => format!("{alias}.deleted_at IS NOT NULL"),
        }
    }
}

/// Marks a live row deleted
///
/// Returns the timestamp written, or `None` when the row is missing or was
/// already deleted.
pub async fn soft_delete<'e, E>(
    executor: E,
    table: SoftDeleteTable,
    id: i64,
) -> Result<Option<DateTime<Utc>>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING deleted_at",
        table.table_name()
    );

    sqlx::query_scalar::<_, DateTime<Utc>>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Clears `deleted_at` on a deleted row
///
/// Returns false when the row is missing or not deleted.
pub async fn restore<'e, E>(executor: E, table: SoftDeleteTable, id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE {} SET deleted_at = NULL WHERE id = $1 AND deleted_at IS NOT NULL",
        table.table_name()
    );

    let result = sqlx::query(&sql).bind(id).execute(executor).await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_excludes_deleted() {
        assert_eq!(DeletedFilter::default(), DeletedFilter::Exclude);
        assert_eq!(DeletedFilter::Exclude.predicate("p"), "p.deleted_at IS NULL");
    }

    #[test]
    fn test_include_and_only_predicates() {
        assert_eq!(DeletedFilter::Include.predicate("t"), "TRUE");
        assert_eq!(DeletedFilter::Only.predicate("t"), "t.deleted_at IS NOT NULL");
    }

    #[test]
    fn test_table_names() {
        assert_eq!(SoftDeleteTable::Projects.table_name(), "projects");
        assert_eq!(SoftDeleteTable::TimeLogs.table_name(), "time_logs");
        assert_eq!(SoftDeleteTable::Accounts.table_name(), "accounts");
    }
}
