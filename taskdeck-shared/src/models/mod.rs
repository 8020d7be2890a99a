/// Database models for TaskDeck
///
/// One module per table (or tight table group). Each model carries its
/// queries as associated async functions that take any `PgExecutor`, so the
/// same call works against the pool or inside a transaction.
///
/// Internal `BIGSERIAL` ids are skipped during serialization; clients only
/// ever see `public_id` values.
///
/// # Models
///
/// - `account`: Login identities, roles and the refresh session
/// - `project`: Projects with status and visibility
/// - `project_member`: Active and past memberships with roles
/// - `project_settings`: Per-project defaults
/// - `task`: Tasks with status, priority, assignee and hours
/// - `label`: Project labels and task attachments
/// - `comment`: Comments, replies and attachment metadata
/// - `mention`: Accounts mentioned in comments
/// - `time_log`: Time logged against tasks
/// - `notification`: In-app notifications
/// - `activity_log`: Append-only audit trail

pub mod account;
pub mod activity_log;
pub mod comment;
pub mod label;
pub mod mention;
pub mod notification;
pub mod project;
pub mod project_member;
pub mod project_settings;
pub mod task;
pub mod time_log;
