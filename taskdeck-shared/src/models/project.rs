/// Project model and database operations
///
/// A project groups tasks, members, labels and settings. Its `visibility`
/// decides who may read it without a membership and its `status` can freeze
/// it (`Archived`). Projects are soft-deleted and may be restored by an admin.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_status AS ENUM ('active', 'archived', 'completed', 'on_hold');
/// CREATE TYPE project_visibility AS ENUM ('private', 'public', 'team');
///
/// CREATE TABLE projects (
///     id BIGSERIAL PRIMARY KEY,
///     public_id UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
///     name VARCHAR(200) NOT NULL,
///     description TEXT,
///     status project_status NOT NULL DEFAULT 'active',
///     visibility project_visibility NOT NULL DEFAULT 'private',
///     created_by BIGINT NOT NULL REFERENCES accounts(id),
///     start_date DATE,
///     end_date DATE,
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
use crate::db::soft_delete::DeletedFilter;

/// Lifecycle status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,

    /// Read/write frozen for everyone but admins
    Archived,

    Completed,

    OnHold,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "Active",
            ProjectStatus::Archived => "Archived",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::OnHold => "OnHold",
        }
    }
}

/// Read-access policy for accounts without a membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_visibility", rename_all = "snake_case")]
pub enum ProjectVisibility {
    /// Only the creator
    Private,

    /// Anyone signed in
    Public,

    /// The creator and active members
    Team,
}

impl ProjectVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectVisibility::Private => "Private",
            ProjectVisibility::Public => "Public",
            ProjectVisibility::Team => "Team",
        }
    }
}

const PROJECT_COLUMNS: &str = "p.id, p.public_id, p.name, p.description, p.status, p.visibility, \
     p.created_by, c.public_id AS creator_public_id, p.start_date, p.end_date, \
     p.created_at, p.updated_at, p.deleted_at";

/// Project row joined with its creator's public id
///
/// Serializes with public ids only.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub visibility: ProjectVisibility,
    #[serde(skip)]
    pub created_by: i64,
    #[serde(rename = "createdBy")]
    pub creator_public_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a project
#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub visibility: ProjectVisibility,
    pub created_by: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Editable project fields; `None` keeps the current value
///
/// Status changes go through [`Project::set_status`] so they can be audited
/// separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateProject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<ProjectVisibility>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl UpdateProject {
    pub fn is_empty(&self) -> bool {
        *self == UpdateProject::default()
    }
}

/// Filters for project listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,

    /// Case-insensitive substring of the name
    pub search: Option<String>,
}

/// Who is listing projects
#[derive(Debug, Clone, Copy)]
pub enum ProjectScope {
    /// Every project (admins)
    All,

    /// Projects the account can view: public ones, its own, and those where
    /// it holds an active membership
    VisibleTo(i64),
}

impl Project {
    /// Snapshot of the user-editable fields, used for audit values
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "status": self.status,
            "visibility": self.visibility,
            "startDate": self.start_date,
            "endDate": self.end_date,
        })
    }

    pub fn is_archived(&self) -> bool {
        self.status == ProjectStatus::Archived
    }

    /// Inserts a new project
    pub async fn create<'e, E>(executor: E, data: CreateProject) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH p AS (
                INSERT INTO projects (name, description, visibility, created_by, start_date, end_date)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {PROJECT_COLUMNS} FROM p JOIN accounts c ON c.id = p.created_by"
        );

        sqlx::query_as::<_, Project>(&sql)
            .bind(data.name)
            .bind(data.description)
            .bind(data.visibility)
            .bind(data.created_by)
            .bind(data.start_date)
            .bind(data.end_date)
            .fetch_one(executor)
            .await
    }

    /// Finds a project by public id under the given deleted filter
    pub async fn find_by_public_id<'e, E>(
        executor: E,
        public_id: Uuid,
        filter: DeletedFilter,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p JOIN accounts c ON c.id = p.created_by
             WHERE p.public_id = $1 AND {}",
            filter.predicate("p")
        );

        sqlx::query_as::<_, Project>(&sql)
            .bind(public_id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a live project by internal id
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p JOIN accounts c ON c.id = p.created_by
             WHERE p.id = $1 AND p.deleted_at IS NULL"
        );

        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Live project by internal id, row-locked for a read-modify-write
    pub async fn lock_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p JOIN accounts c ON c.id = p.created_by
             WHERE p.id = $1 AND p.deleted_at IS NULL
             FOR UPDATE OF p"
        );

        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Lists projects newest-first
    pub async fn list(
        pool: &sqlx::PgPool,
        scope: ProjectScope,
        deleted: DeletedFilter,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count_query =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p WHERE ");
        push_list_conditions(&mut count_query, scope, deleted, filter);
        let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p JOIN accounts c ON c.id = p.created_by WHERE "
        ));
        push_list_conditions(&mut query, scope, deleted, filter);
        query
            .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = query.build_query_as::<Project>().fetch_all(pool).await?;

        Ok(Page::new(items, page, total))
    }

    /// Applies a partial update to a live project
    pub async fn update<'e, E>(
        executor: E,
        id: i64,
        data: UpdateProject,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH p AS (
                UPDATE projects
                SET name = COALESCE($2, name),
                    description = COALESCE($3, description),
                    visibility = COALESCE($4, visibility),
                    start_date = COALESCE($5, start_date),
                    end_date = COALESCE($6, end_date),
                    updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT {PROJECT_COLUMNS} FROM p JOIN accounts c ON c.id = p.created_by"
        );

        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(data.name)
            .bind(data.description)
            .bind(data.visibility)
            .bind(data.start_date)
            .bind(data.end_date)
            .fetch_optional(executor)
            .await
    }

    /// Changes the status of a live project
    pub async fn set_status<'e, E>(
        executor: E,
        id: i64,
        status: ProjectStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH p AS (
                UPDATE projects SET status = $2, updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT {PROJECT_COLUMNS} FROM p JOIN accounts c ON c.id = p.created_by"
        );

        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(status)
            .fetch_optional(executor)
            .await
    }
}

fn push_list_conditions(
    query: &mut QueryBuilder<'_, Postgres>,
    scope: ProjectScope,
    deleted: DeletedFilter,
    filter: &ProjectFilter,
) {
    query.push(deleted.predicate("p"));

    if let ProjectScope::VisibleTo(account_id) = scope {
        query
            .push(" AND (p.visibility = 'public' OR p.created_by = ")
            .push_bind(account_id)
            .push(
                " OR EXISTS (SELECT 1 FROM project_members m \
                 WHERE m.project_id = p.id AND m.left_at IS NULL AND m.account_id = ",
            )
            .push_bind(account_id)
            .push("))");
    }

    if let Some(status) = filter.status {
        query.push(" AND p.status = ").push_bind(status);
    }

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(" AND p.name ILIKE ")
            .push_bind(format!("%{}%", search.replace('%', "\\%").replace('_', "\\_")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_pascal_case() {
        assert_eq!(serde_json::to_string(&ProjectStatus::OnHold).unwrap(), "\"OnHold\"");
        assert_eq!(
            serde_json::from_str::<ProjectStatus>("\"Archived\"").unwrap(),
            ProjectStatus::Archived
        );
        assert_eq!(ProjectStatus::OnHold.as_str(), "OnHold");
    }

    #[test]
    fn test_visibility_round_trip_names() {
        for visibility in [
            ProjectVisibility::Private,
            ProjectVisibility::Public,
            ProjectVisibility::Team,
        ] {
            let json = serde_json::to_string(&visibility).unwrap();
            assert_eq!(json, format!("\"{}\"", visibility.as_str()));
        }
    }

    #[test]
    fn test_serialization_hides_internal_ids() {
        let now = Utc::now();
        let project = Project {
            id: 42,
            public_id: Uuid::new_v4(),
            name: "Apollo".to_string(),
            description: None,
            status: ProjectStatus::Active,
            visibility: ProjectVisibility::Team,
            created_by: 7,
            creator_public_id: Uuid::new_v4(),
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["id"], project.public_id.to_string());
        assert_eq!(json["createdBy"], project.creator_public_id.to_string());
        assert_eq!(json["visibility"], "Team");
        assert!(json.get("creatorPublicId").is_none());
        assert!(json.get("publicId").is_none());
    }

    #[test]
    fn test_update_project_is_empty() {
        assert!(UpdateProject::default().is_empty());

        let update = UpdateProject {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
