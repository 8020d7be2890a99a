/// Account model and database operations
///
/// An account is a login identity. Emails are unique and case-insensitive
/// (CITEXT column plus normalization on the way in). Accounts carry a role
/// set; the `Admin` role grants the global bypass used by the authorization
/// gate.
///
/// The current refresh session lives on the account row as a SHA-256 hash of
/// the refresh token and its expiry. There is one session per account: logging
/// in again replaces it, and rotation swaps it atomically.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE accounts (
///     id BIGSERIAL PRIMARY KEY,
///     public_id UUID NOT NULL UNIQUE DEFAULT gen_random_uuid(),
///     email CITEXT NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     first_name VARCHAR(100) NOT NULL,
///     last_name VARCHAR(100) NOT NULL,
///     roles TEXT[] NOT NULL DEFAULT ARRAY['User'],
///     refresh_token_hash VARCHAR(64),
///     refresh_token_expires_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     deleted_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::soft_delete::DeletedFilter;

/// Role granting global administrative rights
pub const ADMIN_ROLE: &str = "Admin";

/// Role every registered account receives
pub const USER_ROLE: &str = "User";

const ACCOUNT_COLUMNS: &str = "a.id, a.public_id, a.email::TEXT AS email, a.password_hash, \
     a.first_name, a.last_name, a.roles, a.refresh_token_hash, a.refresh_token_expires_at, \
     a.created_at, a.updated_at, a.deleted_at";

/// Account row
///
/// Not serializable on purpose: responses are built from explicit view types
/// so the password hash and internal id never reach a client.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    /// Internal sequence, used only for joins
    pub id: i64,

    /// Identifier exposed to clients
    pub public_id: Uuid,

    pub email: String,

    /// Argon2id PHC string
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub roles: Vec<String>,

    /// SHA-256 hex of the current refresh token
    pub refresh_token_hash: Option<String>,

    pub refresh_token_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating an account
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
}

/// Profile fields an account may change about itself
#[derive(Debug, Clone, Default)]
pub struct UpdateAccount {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Trims and lowercases an email before it is stored or compared
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == ADMIN_ROLE)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Inserts a new account
    ///
    /// # Errors
    ///
    /// A duplicate email surfaces as a unique violation on `accounts_email_key`.
    pub async fn create<'e, E>(executor: E, data: CreateAccount) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH a AS (
                INSERT INTO accounts (email, password_hash, first_name, last_name, roles)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT {ACCOUNT_COLUMNS} FROM a"
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.roles)
            .fetch_one(executor)
            .await
    }

    /// Finds a live account by internal id
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.id = $1 AND a.deleted_at IS NULL");

        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds an account by public id under the given deleted filter
    pub async fn find_by_public_id<'e, E>(
        executor: E,
        public_id: Uuid,
        filter: DeletedFilter,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.public_id = $1 AND {}",
            filter.predicate("a")
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(public_id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a live account by email (case-insensitive)
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.email = $1::citext AND a.deleted_at IS NULL"
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(executor)
            .await
    }

    /// Live accounts among `public_ids`; unknown or deleted ids are skipped
    pub async fn find_many_by_public_ids<'e, E>(
        executor: E,
        public_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts a
             WHERE a.public_id = ANY($1) AND a.deleted_at IS NULL
             ORDER BY a.id"
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(public_ids)
            .fetch_all(executor)
            .await
    }

    /// Updates profile fields; `None` fields keep their value
    pub async fn update_profile<'e, E>(
        executor: E,
        id: i64,
        data: UpdateAccount,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "WITH a AS (
                UPDATE accounts
                SET first_name = COALESCE($2, first_name),
                    last_name = COALESCE($3, last_name),
                    updated_at = NOW()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING *
            )
            SELECT {ACCOUNT_COLUMNS} FROM a"
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .bind(data.first_name)
            .bind(data.last_name)
            .fetch_optional(executor)
            .await
    }

    /// Replaces the refresh session unconditionally (login)
    pub async fn set_refresh_session<'e, E>(
        executor: E,
        id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_token_hash = $2, refresh_token_expires_at = $3
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Swaps the refresh session only if the stored hash still equals
    /// `expected_hash`
    ///
    /// Two concurrent exchanges of the same token race on this statement;
    /// exactly one sees `true`.
    pub async fn rotate_refresh_session<'e, E>(
        executor: E,
        id: i64,
        expected_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET refresh_token_hash = $3, refresh_token_expires_at = $4
            WHERE id = $1
              AND deleted_at IS NULL
              AND refresh_token_hash = $2
              AND refresh_token_expires_at > NOW()
            "#,
        )
        .bind(id)
        .bind(expected_hash)
        .bind(new_hash)
        .bind(new_expires_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drops the refresh session (logout or detected reuse)
    pub async fn clear_refresh_session<'e, E>(executor: E, id: i64) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE accounts SET refresh_token_hash = NULL, refresh_token_expires_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(executor)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(roles: &[&str]) -> Account {
        let now = Utc::now();
        Account {
            id: 1,
            public_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_is_admin() {
        assert!(account(&[USER_ROLE, ADMIN_ROLE]).is_admin());
        assert!(!account(&[USER_ROLE]).is_admin());
        assert!(!account(&[]).is_admin());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_full_name() {
        assert_eq!(account(&[USER_ROLE]).full_name(), "Ada Lovelace");
    }
}
