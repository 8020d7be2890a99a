/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`. Errors from the shared crate convert
/// into [`ApiError`], which renders the common envelope:
///
/// ```json
/// { "message": "...", "errors": { "field": ["..."] }, "timestamp": "..." }
/// ```
///
/// `errors` is present only on 422 responses. Internal errors are logged and
/// replaced with a generic message.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use taskdeck_shared::auth::authorization::AuthzError;
use taskdeck_shared::auth::jwt::JwtError;
use taskdeck_shared::auth::middleware::AuthError;
use taskdeck_shared::auth::password::PasswordError;
use taskdeck_shared::auth::session::SessionError;
use taskdeck_shared::services::{FieldErrors, ServiceError};
use validator::{Validate, ValidationErrors};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,

    pub timestamp: DateTime<Utc>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, errors) = match self {
            ApiError::Validation(errors) => ("Validation failed".to_string(), Some(errors)),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                ("An internal error occurred".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let body = Json(ErrorResponse {
            message,
            errors,
            timestamp: Utc::now(),
        });

        (status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::ProjectArchived => {
                ApiError::Forbidden("Project is archived and cannot be changed".to_string())
            }
            ServiceError::BadRequest(msg) => ApiError::BadRequest(msg),
            ServiceError::Validation(errors) => ApiError::Validation(errors),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            ServiceError::Database(e) => ApiError::Internal(format!("Database error: {}", e)),
            ServiceError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ServiceError::from(err).into()
    }
}

/// Every refresh-flow failure is a 400 and forces a new login
impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Database(e) => ApiError::Internal(format!("Database error: {}", e)),
            SessionError::Token(JwtError::CreateError(e)) => ApiError::Internal(e),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Database(e) => ApiError::Internal(format!("Database error: {}", e)),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(e) => ApiError::Internal(format!("Token creation failed: {}", e)),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(format!("Password operation failed: {}", err))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(format!("Database error: {}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Runs `validator` rules on a request body, turning failures into a 422
pub fn validate_request<T: Validate>(request: &T) -> ApiResult<()> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(field_errors(&e)))
}

fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code))
                })
                .collect();
            (camel_case(&field), messages)
        })
        .collect()
}

/// `end_time` -> `endTime`, matching the JSON field names clients send
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct SignupForm {
        #[validate(length(min = 1, message = "Name is required"))]
        project_name: String,

        #[validate(email)]
        email: String,
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Validation(FieldErrors::new()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(ServiceError::ProjectArchived).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(SessionError::Reused).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SessionError::Expired).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::MissingCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("end_time"), "endTime");
        assert_eq!(camel_case("parent_comment_id"), "parentCommentId");
        assert_eq!(camel_case("email"), "email");
    }

    #[test]
    fn test_validate_request_collects_fields() {
        let form = SignupForm {
            project_name: String::new(),
            email: "not-an-email".to_string(),
        };

        let Err(ApiError::Validation(errors)) = validate_request(&form) else {
            panic!("expected validation error");
        };
        assert_eq!(errors["projectName"], vec!["Name is required".to_string()]);
        assert!(errors.contains_key("email"));
    }

    #[tokio::test]
    async fn test_envelope_omits_errors_outside_validation() {
        let json = body_json(ApiError::Forbidden("nope".into()).into_response()).await;
        assert_eq!(json["message"], "nope");
        assert!(json.get("errors").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let response = ApiError::Internal("connection refused on 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["message"], "An internal error occurred");
    }
}
