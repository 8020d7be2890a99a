/// Refresh-session lifecycle
///
/// ```text
/// Anonymous --login--> Authenticated --refresh--> Refreshed --refresh--> ...
///                            |                        |
///                            +------ logout / reuse / expiry ------> Invalidated
/// ```
///
/// An account holds at most one refresh session, stored on its row as the
/// SHA-256 of the refresh token. Each refresh is single use: a successful
/// exchange swaps the stored hash for the new token's. Presenting a token that
/// no longer matches (a replay) or that has expired clears the session, and
/// the account has to log in again.
///
/// The authenticated account is always passed in; nothing here keeps state
/// between calls.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, warn};

use super::jwt::{self, JwtError, TokenLifetimes, TokenPair};
use crate::db::soft_delete::DeletedFilter;
use crate::models::account::Account;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unparseable, foreign or wrong-type token
    #[error("Invalid refresh token")]
    InvalidToken,

    #[error("Refresh token has expired")]
    Expired,

    /// Token does not match the stored session
    #[error("Refresh token is no longer valid")]
    Reused,

    #[error("Token error: {0}")]
    Token(#[from] JwtError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Hex SHA-256 of a refresh token, as stored on the account row
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Starts a new session for an authenticated account, replacing any previous one
pub async fn start_session(
    pool: &PgPool,
    account: &Account,
    remember_me: bool,
    lifetimes: &TokenLifetimes,
    secret: &str,
) -> Result<TokenPair, SessionError> {
    let pair = jwt::issue_token_pair(account.public_id, remember_me, lifetimes, secret)?;

    Account::set_refresh_session(
        pool,
        account.id,
        &hash_refresh_token(&pair.refresh_token),
        pair.refresh_expires_at,
    )
    .await?;

    info!(account_id = %account.public_id, remember_me, "Session started");

    Ok(pair)
}

/// Exchanges a refresh token for a new pair
///
/// # Errors
///
/// - [`SessionError::InvalidToken`] for anything that does not verify
/// - [`SessionError::Expired`] for an expired token (session cleared)
/// - [`SessionError::Reused`] for a token that is not the current one
///   (session cleared)
pub async fn refresh_session(
    pool: &PgPool,
    refresh_token: &str,
    lifetimes: &TokenLifetimes,
    secret: &str,
) -> Result<(Account, TokenPair), SessionError> {
    let claims = match jwt::validate_refresh_token(refresh_token, secret) {
        Ok(claims) => claims,
        Err(JwtError::Expired) => {
            expire_session(pool, refresh_token, secret).await?;
            return Err(SessionError::Expired);
        }
        Err(_) => return Err(SessionError::InvalidToken),
    };

    let account = Account::find_by_public_id(pool, claims.sub, DeletedFilter::Exclude)
        .await?
        .ok_or(SessionError::InvalidToken)?;

    let presented_hash = hash_refresh_token(refresh_token);

    if account.refresh_token_hash.as_deref() != Some(presented_hash.as_str()) {
        warn!(account_id = %account.public_id, "Refresh token reuse detected; clearing session");
        Account::clear_refresh_session(pool, account.id).await?;
        return Err(SessionError::Reused);
    }

    if account
        .refresh_token_expires_at
        .map_or(true, |expires_at| expires_at <= Utc::now())
    {
        Account::clear_refresh_session(pool, account.id).await?;
        return Err(SessionError::Expired);
    }

    let pair = jwt::issue_token_pair(account.public_id, claims.remember_me, lifetimes, secret)?;

    let rotated = Account::rotate_refresh_session(
        pool,
        account.id,
        &presented_hash,
        &hash_refresh_token(&pair.refresh_token),
        pair.refresh_expires_at,
    )
    .await?;

    // Lost a race with a concurrent exchange of the same token
    if !rotated {
        return Err(SessionError::Reused);
    }

    Ok((account, pair))
}

/// Ends the account's session (logout)
pub async fn end_session(pool: &PgPool, account: &Account) -> Result<(), SessionError> {
    Account::clear_refresh_session(pool, account.id).await?;
    info!(account_id = %account.public_id, "Session ended");
    Ok(())
}

/// Clears the session an expired token belonged to, if it is still current
async fn expire_session(pool: &PgPool, refresh_token: &str, secret: &str) -> Result<(), SessionError> {
    let Ok(claims) = jwt::validate_token_ignoring_expiry(refresh_token, secret) else {
        return Ok(());
    };

    if let Some(account) = Account::find_by_public_id(pool, claims.sub, DeletedFilter::Exclude).await? {
        if account.refresh_token_hash.as_deref() == Some(hash_refresh_token(refresh_token).as_str()) {
            Account::clear_refresh_session(pool, account.id).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = hash_refresh_token("token");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_refresh_token("token"));
        assert_ne!(hash, hash_refresh_token("token2"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            hash_refresh_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
