/// Account endpoints
///
/// - `POST /api/account/register`
/// - `POST /api/account/login` sets the `access_token` and `refresh_token` cookies
/// - `POST /api/account/refresh` rotates both cookies
/// - `POST /api/account/logout` ends the session and clears the cookies
/// - `GET /api/account/check-auth`, `GET /api/account/me`, `PUT /api/account/update`
/// - `DELETE /api/account/delete/:id`, `PATCH /api/account/restore/:id` (admin)
///
/// Both cookies are HTTP-only. The access token is also returned in the body
/// for clients that send it as a bearer token.

use axum::{
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskdeck_shared::auth::jwt::TokenPair;
use taskdeck_shared::auth::middleware::{AuthContext, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use taskdeck_shared::auth::session;
use taskdeck_shared::models::account::UpdateAccount;
use taskdeck_shared::services::accounts::{self, AccountProfile, NewAccount};
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{validate_request, ApiError, ApiResult};
use crate::extract::{Json, Path};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"), length(max = 255))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "First name must be 1 to 100 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1 to 100 characters"))]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1 to 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Last name must be 1 to 100 characters"))]
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub account: AccountProfile,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub remember_me: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAuthResponse {
    pub authenticated: bool,
    pub account_id: Uuid,
    pub is_admin: bool,
}

fn token_cookie(name: &'static str, value: String, expires_at: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    let seconds = (expires_at - Utc::now()).num_seconds().max(0);

    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(seconds))
        .build()
}

fn set_session_cookies(cookies: &Cookies, pair: &TokenPair, secure: bool) {
    cookies.add(token_cookie(
        ACCESS_TOKEN_COOKIE,
        pair.access_token.clone(),
        pair.access_expires_at,
        secure,
    ));
    cookies.add(token_cookie(
        REFRESH_TOKEN_COOKIE,
        pair.refresh_token.clone(),
        pair.refresh_expires_at,
        secure,
    ));
}

fn clear_session_cookies(cookies: &Cookies) {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        cookies.remove(Cookie::build(name).path("/").build());
    }
}

fn session_response(account: AccountProfile, pair: TokenPair) -> SessionResponse {
    SessionResponse {
        account,
        access_token: pair.access_token,
        access_token_expires_at: pair.access_expires_at,
        refresh_token_expires_at: pair.refresh_expires_at,
        remember_me: pair.remember_me,
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AccountProfile>)> {
    validate_request(&req)?;

    let account = accounts::register(
        &state.db,
        NewAccount {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(AccountProfile::from(&account))))
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    validate_request(&req)?;

    let (account, pair) = accounts::login(
        &state.db,
        &req.email,
        &req.password,
        req.remember_me,
        state.token_lifetimes(),
        state.jwt_secret(),
    )
    .await?;

    set_session_cookies(&cookies, &pair, state.config.api.cookie_secure);

    Ok(Json(session_response(AccountProfile::from(&account), pair)))
}

/// Exchanges the refresh cookie for a new pair
///
/// Any failure clears both cookies; the client has to log in again.
pub async fn refresh(State(state): State<AppState>, cookies: Cookies) -> ApiResult<Json<SessionResponse>> {
    let token = cookies
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Refresh token is missing".to_string()))?;

    match session::refresh_session(&state.db, &token, state.token_lifetimes(), state.jwt_secret()).await {
        Ok((account, pair)) => {
            set_session_cookies(&cookies, &pair, state.config.api.cookie_secure);
            Ok(Json(session_response(AccountProfile::from(&account), pair)))
        }
        Err(e) => {
            clear_session_cookies(&cookies);
            Err(e.into())
        }
    }
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
    cookies: Cookies,
) -> ApiResult<StatusCode> {
    accounts::logout(&state.db, &auth).await?;
    clear_session_cookies(&cookies);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn check_auth(auth: AuthContext) -> Json<CheckAuthResponse> {
    Json(CheckAuthResponse {
        authenticated: true,
        account_id: auth.account_public_id,
        is_admin: auth.is_admin,
    })
}

pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<AccountProfile>> {
    let account = accounts::me(&state.db, &auth).await?;
    Ok(Json(AccountProfile::from(&account)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UpdateAccountRequest>,
) -> ApiResult<Json<AccountProfile>> {
    validate_request(&req)?;

    let account = accounts::update_profile(
        &state.db,
        &auth,
        UpdateAccount {
            first_name: req.first_name,
            last_name: req.last_name,
        },
    )
    .await?;

    Ok(Json(AccountProfile::from(&account)))
}

pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    accounts::delete_account(&state.db, &auth, account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_account(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(account_id): Path<Uuid>,
) -> ApiResult<Json<AccountProfile>> {
    let account = accounts::restore_account(&state.db, &auth, account_id).await?;
    Ok(Json(AccountProfile::from(&account)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_cookie_flags() {
        let cookie = token_cookie(
            ACCESS_TOKEN_COOKIE,
            "abc".to_string(),
            Utc::now() + Duration::minutes(15),
            true,
        );

        assert_eq!(cookie.name(), "access_token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        let max_age = cookie.max_age().unwrap().whole_seconds();
        assert!(max_age > 14 * 60 && max_age <= 15 * 60);
    }

    #[test]
    fn test_expired_cookie_has_zero_max_age() {
        let cookie = token_cookie(REFRESH_TOKEN_COOKIE, "x".into(), Utc::now() - Duration::days(1), false);
        assert_eq!(cookie.max_age().unwrap().whole_seconds(), 0);
    }

    #[test]
    fn test_register_request_validation() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "nope",
            "password": "short",
            "firstName": "",
            "lastName": "Lovelace"
        }))
        .unwrap();

        let Err(ApiError::Validation(errors)) = validate_request(&req) else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
        assert!(errors.contains_key("firstName"));
        assert!(!errors.contains_key("lastName"));
    }
}
