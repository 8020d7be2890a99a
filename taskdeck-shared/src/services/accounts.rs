/// Account operations: registration, credentials and profile
///
/// Session tokens are issued by [`crate::auth::session`]; this module only
/// checks credentials and hands the verified account over.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::projects::require_admin;
use super::{conflict_on, ServiceError, ServiceResult};
use crate::auth::jwt::{TokenLifetimes, TokenPair};
use crate::auth::middleware::AuthContext;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::auth::session;
use crate::db::soft_delete::{self, DeletedFilter, SoftDeleteTable};
use crate::models::account::{normalize_email, Account, CreateAccount, UpdateAccount, USER_ROLE};

const EMAIL_CONSTRAINT: &str = "accounts_email_key";

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Account as returned to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.public_id,
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            roles: account.roles.clone(),
            created_at: account.created_at,
        }
    }
}

pub async fn register(pool: &PgPool, data: NewAccount) -> ServiceResult<Account> {
    if let Err(problems) = validate_password_strength(&data.password) {
        let mut errors = super::FieldErrors::new();
        errors.insert("password".to_string(), problems);
        return Err(ServiceError::Validation(errors));
    }

    let password_hash = hash_password(&data.password)?;

    let account = Account::create(
        pool,
        CreateAccount {
            email: normalize_email(&data.email),
            password_hash,
            first_name: data.first_name.trim().to_string(),
            last_name: data.last_name.trim().to_string(),
            roles: vec![USER_ROLE.to_string()],
        },
    )
    .await
    .map_err(conflict_on(EMAIL_CONSTRAINT, "Email is already registered"))?;

    info!(account_id = %account.public_id, "Account registered");

    Ok(account)
}

/// Verifies credentials and starts a new session
pub async fn login(
    pool: &PgPool,
    email: &str,
    password: &str,
    remember_me: bool,
    lifetimes: &TokenLifetimes,
    secret: &str,
) -> ServiceResult<(Account, TokenPair)> {
    let account = Account::find_by_email(pool, &normalize_email(email))
        .await?
        .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(password, &account.password_hash)? {
        warn!(account_id = %account.public_id, "Failed login attempt");
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let pair = session::start_session(pool, &account, remember_me, lifetimes, secret)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    Ok((account, pair))
}

pub async fn logout(pool: &PgPool, actor: &AuthContext) -> ServiceResult<()> {
    let account = me(pool, actor).await?;
    session::end_session(pool, &account)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))
}

pub async fn me(pool: &PgPool, actor: &AuthContext) -> ServiceResult<Account> {
    Account::find_by_id(pool, actor.account_id)
        .await?
        .filter(|account| !account.is_deleted())
        .ok_or_else(|| ServiceError::not_found("Account"))
}

pub async fn update_profile(pool: &PgPool, actor: &AuthContext, data: UpdateAccount) -> ServiceResult<Account> {
    let data = UpdateAccount {
        first_name: data.first_name.map(|s| s.trim().to_string()),
        last_name: data.last_name.map(|s| s.trim().to_string()),
    };

    Account::update_profile(pool, actor.account_id, data)
        .await?
        .ok_or_else(|| ServiceError::not_found("Account"))
}

/// Soft-deletes an account and drops its session (admin only)
pub async fn delete_account(pool: &PgPool, actor: &AuthContext, account_id: Uuid) -> ServiceResult<()> {
    require_admin(actor)?;

    if account_id == actor.account_public_id {
        return Err(ServiceError::BadRequest("You cannot delete your own account".to_string()));
    }

    let mut tx = pool.begin().await?;

    let account = Account::find_by_public_id(&mut *tx, account_id, DeletedFilter::Exclude)
        .await?
        .ok_or_else(|| ServiceError::not_found("Account"))?;

    soft_delete::soft_delete(&mut *tx, SoftDeleteTable::Accounts, account.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Account"))?;

    Account::clear_refresh_session(&mut *tx, account.id).await?;

    tx.commit().await?;

    info!(account_id = %account.public_id, admin_id = %actor.account_public_id, "Account deleted");

    Ok(())
}

/// Restores a soft-deleted account (admin only)
pub async fn restore_account(pool: &PgPool, actor: &AuthContext, account_id: Uuid) -> ServiceResult<Account> {
    require_admin(actor)?;

    let deleted = Account::find_by_public_id(pool, account_id, DeletedFilter::Only)
        .await?
        .ok_or_else(|| ServiceError::not_found("Deleted account"))?;

    if !soft_delete::restore(pool, SoftDeleteTable::Accounts, deleted.id).await? {
        return Err(ServiceError::not_found("Deleted account"));
    }

    info!(account_id = %deleted.public_id, admin_id = %actor.account_public_id, "Account restored");

    Account::find_by_id(pool, deleted.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Account"))
}
