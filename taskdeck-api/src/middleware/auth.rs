/// Authentication layer for protected routes
///
/// The access token is read from the `access_token` cookie, falling back to
/// an `Authorization: Bearer` header. A valid token for a live account puts an
/// [`AuthContext`] into the request extensions for handlers to extract.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use taskdeck_shared::auth::middleware::{
    authenticate, bearer_token, AuthContext, AuthError, ACCESS_TOKEN_COOKIE,
};
use tower_cookies::Cookies;

use crate::app::AppState;
use crate::error::ApiError;

pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = cookies
        .get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| bearer_token(req.headers()).map(String::from))
        .ok_or(AuthError::MissingCredentials)?;

    let context: AuthContext = authenticate(&state.db, &token, state.jwt_secret()).await?;

    tracing::debug!(account_id = %context.account_public_id, "Request authenticated");
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
