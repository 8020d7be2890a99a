/// Request authentication context
///
/// The API's auth layer pulls the access token from the `access_token`
/// cookie (or an `Authorization: Bearer` header), resolves it with
/// [`authenticate`] and stores the resulting [`AuthContext`] in the request
/// extensions. Handlers take `AuthContext` as an extractor; a request that
/// reached a protected handler without one is rejected with 401.
///
/// The token only carries the account's public id. The account itself is
/// loaded on every request, so a deleted account or a revoked admin role
/// takes effect immediately instead of when the token expires.
///
/// # Example
///
/// ```no_run
/// use taskdeck_shared::auth::middleware::AuthContext;
///
/// async fn whoami(auth: AuthContext) -> String {
///     format!("{} (admin: {})", auth.account_public_id, auth.is_admin)
/// }
/// ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::db::soft_delete::DeletedFilter;
use crate::models::account::Account;

/// Name of the cookie holding the access token
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Name of the cookie holding the refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// The authenticated actor of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Internal id, for queries
    pub account_id: i64,

    pub account_public_id: Uuid,

    /// Global administrator flag (bypasses the project gate)
    pub is_admin: bool,
}

impl AuthContext {
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: account.id,
            account_public_id: account.public_id,
            is_admin: account.is_admin(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredentials,

    #[error("Access token has expired")]
    Expired,

    #[error("Invalid access token")]
    InvalidToken,

    /// Token verified but the account is gone
    #[error("Account not found")]
    UnknownAccount,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Database(ref e) => {
                tracing::error!(error = %e, "Database error during authentication");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        };

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (
            status,
            Json(serde_json::json!({
                "message": message,
                "timestamp": chrono::Utc::now(),
            })),
        )
            .into_response()
    }
}

/// Token from `Authorization: Bearer <token>`, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves an access token to the live account it was issued for
pub async fn authenticate(pool: &PgPool, token: &str, secret: &str) -> Result<AuthContext, AuthError> {
    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::Expired,
        _ => AuthError::InvalidToken,
    })?;

    let account = Account::find_by_public_id(pool, claims.sub, DeletedFilter::Exclude)
        .await?
        .ok_or(AuthError::UnknownAccount)?;

    Ok(AuthContext::from_account(&account))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Expired.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::Database(sqlx::Error::RowNotFound).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_extractor_reads_extension() {
        let context = AuthContext {
            account_id: 5,
            account_public_id: Uuid::new_v4(),
            is_admin: false,
        };

        let mut request = axum::http::Request::builder().body(()).unwrap();
        request.extensions_mut().insert(context.clone());
        let (mut parts, _) = request.into_parts();

        let extracted = AuthContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, context);
    }

    #[tokio::test]
    async fn test_extractor_rejects_missing_context() {
        let request = axum::http::Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let result = AuthContext::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }
}
