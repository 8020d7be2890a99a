/// Append-only audit trail
///
/// Every audit-worthy mutation appends exactly one row here through
/// [`ActivityLog::record`], on the same executor (transaction) as the
/// mutation. A failed append therefore rolls the mutation back.
///
/// Rows are immutable. The `activity_logs_immutable` trigger rejects any
/// `UPDATE` or `DELETE`, and this module exposes no operation that would
/// issue one.
///
/// # Example
///
/// ```no_run
/// use taskdeck_shared::models::activity_log::{ActivityLog, ActivityType, NewActivity};
///
/// # async fn example(pool: sqlx::PgPool) -> Result<(), sqlx::Error> {
/// let mut tx = pool.begin().await?;
/// // ... mutate inside `tx` ...
/// ActivityLog::record(
///     &mut *tx,
///     NewActivity::new(1, ActivityType::ProjectUpdated, "Updated project").project(10),
/// )
/// .await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::pagination::{Page, PageRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_type", rename_all = "snake_case")]
pub enum ActivityType {
    ProjectCreated,
    ProjectUpdated,
    ProjectStatusChanged,
    ProjectDeleted,
    ProjectRestored,
    TaskCreated,
    TaskUpdated,
    TaskStatusChanged,
    TaskAssigned,
    TaskDeleted,
    CommentAdded,
    CommentUpdated,
    CommentDeleted,
    MemberAdded,
    MemberRoleChanged,
    MemberRemoved,
    LabelCreated,
    LabelDeleted,
    LabelAttached,
    LabelDetached,
    TimeLogged,
    TimeLogDeleted,
}

/// A row to append
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub actor_id: i64,
    pub kind: ActivityType,
    pub description: String,
    pub project_id: Option<i64>,
    pub task_id: Option<i64>,
    pub old_value: Option<JsonValue>,
    pub new_value: Option<JsonValue>,
}

impl NewActivity {
    pub fn new(actor_id: i64, kind: ActivityType, description: impl Into<String>) -> Self {
        Self {
            actor_id,
            kind,
            description: description.into(),
            project_id: None,
            task_id: None,
            old_value: None,
            new_value: None,
        }
    }

    pub fn project(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn task(mut self, task_id: i64) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn old_value(mut self, value: JsonValue) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn new_value(mut self, value: JsonValue) -> Self {
        self.new_value = Some(value);
        self
    }

    /// Sets both sides of a change
    pub fn change(self, old: JsonValue, new: JsonValue) -> Self {
        self.old_value(old).new_value(new)
    }
}

/// Activity entry as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    #[serde(skip)]
    pub id: i64,

    #[serde(rename = "id")]
    pub public_id: Uuid,

    #[serde(rename = "actorId")]
    pub actor_public_id: Uuid,

    pub actor_name: String,

    #[serde(rename = "projectId")]
    pub project_public_id: Option<Uuid>,

    #[serde(rename = "taskId")]
    pub task_public_id: Option<Uuid>,

    #[serde(rename = "type")]
    pub kind: ActivityType,

    pub description: String,

    pub old_value: Option<JsonValue>,

    pub new_value: Option<JsonValue>,

    pub created_at: DateTime<Utc>,
}

/// Listing filters, all by public id
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub actor_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<ActivityType>,
}

const ACTIVITY_SELECT: &str = "SELECT al.id, al.public_id, a.public_id AS actor_public_id, \
     a.first_name || ' ' || a.last_name AS actor_name, p.public_id AS project_public_id, \
     t.public_id AS task_public_id, al.type AS kind, al.description, al.old_value, \
     al.new_value, al.created_at \
     FROM activity_logs al \
     JOIN accounts a ON a.id = al.actor_id \
     LEFT JOIN projects p ON p.id = al.project_id \
     LEFT JOIN tasks t ON t.id = al.task_id";

impl ActivityLog {
    /// Appends one row and returns its internal id
    pub async fn record<'e, E>(executor: E, entry: NewActivity) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO activity_logs (actor_id, project_id, task_id, type, description, old_value, new_value)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.project_id)
        .bind(entry.task_id)
        .bind(entry.kind)
        .bind(entry.description)
        .bind(entry.old_value)
        .bind(entry.new_value)
        .fetch_one(executor)
        .await?;

        tracing::debug!(activity_id = id, kind = ?entry.kind, "Recorded activity");

        Ok(id)
    }

    /// A project's activity, newest first
    pub async fn list_for_project(
        pool: &sqlx::PgPool,
        project_id: i64,
        filter: &ActivityFilter,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count_query = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM activity_logs al \
             JOIN accounts a ON a.id = al.actor_id \
             LEFT JOIN tasks t ON t.id = al.task_id WHERE ",
        );
        push_list_conditions(&mut count_query, project_id, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(ACTIVITY_SELECT);
        query.push(" WHERE ");
        push_list_conditions(&mut query, project_id, filter);
        query
            .push(" ORDER BY al.created_at DESC, al.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = query.build_query_as::<ActivityLog>().fetch_all(pool).await?;

        Ok(Page::new(items, page, total))
    }
}

fn push_list_conditions(
    query: &mut QueryBuilder<'_, Postgres>,
    project_id: i64,
    filter: &ActivityFilter,
) {
    query.push("al.project_id = ").push_bind(project_id);

    if let Some(actor) = filter.actor_id {
        query.push(" AND a.public_id = ").push_bind(actor);
    }

    if let Some(task) = filter.task_id {
        query.push(" AND t.public_id = ").push_bind(task);
    }

    if let Some(kind) = filter.kind {
        query.push(" AND al.type = ").push_bind(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_sets_correlation_and_values() {
        let entry = NewActivity::new(3, ActivityType::TaskStatusChanged, "Changed status")
            .project(10)
            .task(20)
            .change(json!("ToDo"), json!("Done"));

        assert_eq!(entry.actor_id, 3);
        assert_eq!(entry.project_id, Some(10));
        assert_eq!(entry.task_id, Some(20));
        assert_eq!(entry.old_value, Some(json!("ToDo")));
        assert_eq!(entry.new_value, Some(json!("Done")));
    }

    #[test]
    fn test_builder_defaults_are_empty() {
        let entry = NewActivity::new(1, ActivityType::ProjectCreated, "Created");
        assert!(entry.project_id.is_none());
        assert!(entry.task_id.is_none());
        assert!(entry.old_value.is_none());
        assert!(entry.new_value.is_none());
    }

    #[test]
    fn test_type_filter_from_query() {
        let filter: ActivityFilter = serde_json::from_str(r#"{"type":"MemberAdded"}"#).unwrap();
        assert_eq!(filter.kind, Some(ActivityType::MemberAdded));
    }
}
