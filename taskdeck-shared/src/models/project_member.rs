/// Project membership
///
/// A membership row is active while `left_at IS NULL`. Leaving a project
/// stamps `left_at` instead of deleting the row, so the history of who was on
/// a project is kept. The partial unique index `uq_project_members_active`
/// allows at most one active row per (project, account); rejoining after
/// leaving creates a new row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::pagination::{Page, PageRequest};

/// Name of the partial unique index guarding active memberships
pub const ACTIVE_MEMBERSHIP_CONSTRAINT: &str = "uq_project_members_active";

/// Role held inside one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Manager,
    Member,
}

impl MemberRole {
    /// Owner and Manager may change project content
    pub fn can_manage(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Manager)
    }

    /// Only Owner may delete
    pub fn can_delete(&self) -> bool {
        matches!(self, MemberRole::Owner)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "Owner",
            MemberRole::Manager => "Manager",
            MemberRole::Member => "Member",
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProjectMember {
    pub id: i64,
    pub public_id: Uuid,
    pub project_id: i64,
    pub account_id: i64,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

/// Active membership joined with the member's account
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    #[serde(rename = "id")]
    pub public_id: Uuid,

    pub account_id: Uuid,

    pub email: String,

    pub first_name: String,

    pub last_name: String,

    pub role: MemberRole,

    pub joined_at: DateTime<Utc>,
}

const MEMBER_COLUMNS: &str = "id, public_id, project_id, account_id, role, joined_at, left_at";

impl ProjectMember {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }

    /// Inserts an active membership
    ///
    /// # Errors
    ///
    /// An existing active membership surfaces as a unique violation on
    /// [`ACTIVE_MEMBERSHIP_CONSTRAINT`].
    pub async fn add<'e, E>(
        executor: E,
        project_id: i64,
        account_id: i64,
        role: MemberRole,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "INSERT INTO project_members (project_id, account_id, role)
             VALUES ($1, $2, $3)
             RETURNING {MEMBER_COLUMNS}"
        );

        sqlx::query_as::<_, ProjectMember>(&sql)
            .bind(project_id)
            .bind(account_id)
            .bind(role)
            .fetch_one(executor)
            .await
    }

    /// The account's active membership in the project, if any
    pub async fn find_active<'e, E>(
        executor: E,
        project_id: i64,
        account_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM project_members
             WHERE project_id = $1 AND account_id = $2 AND left_at IS NULL"
        );

        sqlx::query_as::<_, ProjectMember>(&sql)
            .bind(project_id)
            .bind(account_id)
            .fetch_optional(executor)
            .await
    }

    /// Same as [`ProjectMember::find_active`] with a row lock
    pub async fn lock_active<'e, E>(
        executor: E,
        project_id: i64,
        account_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM project_members
             WHERE project_id = $1 AND account_id = $2 AND left_at IS NULL
             FOR UPDATE"
        );

        sqlx::query_as::<_, ProjectMember>(&sql)
            .bind(project_id)
            .bind(account_id)
            .fetch_optional(executor)
            .await
    }

    /// Active members of a live project with live accounts
    pub async fn list_active(
        pool: &sqlx::PgPool,
        project_id: i64,
        page: PageRequest,
    ) -> Result<Page<MemberView>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM project_members m
            JOIN accounts a ON a.id = m.account_id AND a.deleted_at IS NULL
            WHERE m.project_id = $1 AND m.left_at IS NULL
            "#,
        )
        .bind(project_id)
        .fetch_one(pool)
        .await?;

        let items = sqlx::query_as::<_, MemberView>(
            r#"
            SELECT m.public_id, a.public_id AS account_id, a.email::TEXT AS email,
                   a.first_name, a.last_name, m.role, m.joined_at
            FROM project_members m
            JOIN accounts a ON a.id = m.account_id AND a.deleted_at IS NULL
            WHERE m.project_id = $1 AND m.left_at IS NULL
            ORDER BY m.joined_at, m.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(project_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(items, page, total))
    }

    /// Internal ids of every active member (notification fan-out)
    pub async fn active_account_ids<'e, E>(
        executor: E,
        project_id: i64,
    ) -> Result<Vec<i64>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            "SELECT account_id FROM project_members WHERE project_id = $1 AND left_at IS NULL",
        )
        .bind(project_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update_role<'e, E>(
        executor: E,
        id: i64,
        role: MemberRole,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "UPDATE project_members SET role = $2
             WHERE id = $1 AND left_at IS NULL
             RETURNING {MEMBER_COLUMNS}"
        );

        sqlx::query_as::<_, ProjectMember>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(executor)
            .await
    }

    /// Ends an active membership
    pub async fn leave<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE project_members SET left_at = NOW() WHERE id = $1 AND left_at IS NULL",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tiers() {
        assert!(MemberRole::Owner.can_manage());
        assert!(MemberRole::Owner.can_delete());

        assert!(MemberRole::Manager.can_manage());
        assert!(!MemberRole::Manager.can_delete());

        assert!(!MemberRole::Member.can_manage());
        assert!(!MemberRole::Member.can_delete());
    }

    #[test]
    fn test_role_json_names() {
        assert_eq!(serde_json::to_string(&MemberRole::Manager).unwrap(), "\"Manager\"");
        assert_eq!(
            serde_json::from_str::<MemberRole>("\"Member\"").unwrap(),
            MemberRole::Member
        );
    }
}
