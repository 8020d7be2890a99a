/// Transactional operations
///
/// Each mutating operation follows the same shape:
///
/// 1. run the authorization gate for the actor
/// 2. open a transaction and lock the rows it will change
/// 3. apply the mutation
/// 4. append exactly one activity row on the same transaction
/// 5. write any notifications, then commit
///
/// Dropping the future before commit rolls the transaction back, so a
/// cancelled request never leaves a half-applied change or an audit row for
/// a change that did not happen.

use std::collections::BTreeMap;

use crate::auth::authorization::AuthzError;
use crate::auth::password::PasswordError;

pub mod accounts;
pub mod comments;
pub mod labels;
pub mod members;
pub mod mentions;
pub mod notifications;
pub mod projects;
pub mod tasks;
pub mod time_logs;

/// Per-field validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Project is archived")]
    ProjectArchived,

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        ServiceError::NotFound(format!("{} not found", what))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    /// Single-field validation failure
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ServiceError::Validation(errors)
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotFound => ServiceError::not_found("Project"),
            AuthzError::Forbidden(message) => ServiceError::Forbidden(message),
            AuthzError::ProjectArchived => ServiceError::ProjectArchived,
            AuthzError::Database(e) => ServiceError::Database(e),
        }
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// True if `err` is a unique violation of `constraint`
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Maps a unique violation of `constraint` to `Conflict(message)`
pub(crate) fn conflict_on(constraint: &'static str, message: &'static str) -> impl Fn(sqlx::Error) -> ServiceError {
    move |err| {
        if is_unique_violation(&err, constraint) {
            ServiceError::Conflict(message.to_string())
        } else {
            ServiceError::Database(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authz_errors_map_to_service_errors() {
        assert!(matches!(
            ServiceError::from(AuthzError::NotFound),
            ServiceError::NotFound(ref m) if m == "Project not found"
        ));
        assert!(matches!(
            ServiceError::from(AuthzError::Forbidden("no".to_string())),
            ServiceError::Forbidden(ref m) if m == "no"
        ));
        assert!(matches!(
            ServiceError::from(AuthzError::ProjectArchived),
            ServiceError::ProjectArchived
        ));
    }

    #[test]
    fn test_field_error() {
        let ServiceError::Validation(errors) = ServiceError::field("endTime", "must be later") else {
            panic!("expected validation error");
        };
        assert_eq!(errors["endTime"], vec!["must be later".to_string()]);
    }

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound, "accounts_email_key"));
        let mapped = conflict_on("accounts_email_key", "Email taken")(sqlx::Error::RowNotFound);
        assert!(matches!(mapped, ServiceError::Database(_)));
    }
}
