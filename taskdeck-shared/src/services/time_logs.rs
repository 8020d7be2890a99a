/// Time-log operations
///
/// Logging time needs the task's assignee or the manage tier. Hours come from
/// the interval; the task's `hours_spent` moves with every insert and delete
/// inside the same transaction.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::tasks::load_task;
use super::{ServiceError, ServiceResult};
use crate::auth::authorization::{authorize_project, authorize_project_locked, AccessLevel, ProjectLock};
use crate::auth::middleware::AuthContext;
use crate::db::pagination::{Page, PageRequest};
use crate::db::soft_delete::{self, SoftDeleteTable};
use crate::models::activity_log::{ActivityLog, ActivityType, NewActivity};
use crate::models::task::Task;
use crate::models::time_log::{compute_hours, CreateTimeLog, TimeLog, MAX_LOG_HOURS};

#[derive(Debug, Clone)]
pub struct NewTimeLog {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: Option<String>,
}

/// Hours for a log interval, or a validation error
fn interval_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> ServiceResult<f64> {
    let hours = match compute_hours(start, end) {
        Some(hours) => hours,
        None if end > start => {
            return Err(ServiceError::field("endTime", "Logged interval is too short to record"))
        }
        None => return Err(ServiceError::field("endTime", "End time must be after the start time")),
    };

    if hours > MAX_LOG_HOURS {
        return Err(ServiceError::field(
            "endTime",
            format!("A single log cannot exceed {} hours", MAX_LOG_HOURS),
        ));
    }

    Ok(hours)
}

pub async fn list(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    page: PageRequest,
) -> ServiceResult<Page<TimeLog>> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;
    let task = load_task(pool, &grant, task_id).await?;

    Ok(TimeLog::list_for_task(pool, task.id, page).await?)
}

pub async fn create(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    data: NewTimeLog,
) -> ServiceResult<TimeLog> {
    let hours = interval_hours(data.start_time, data.end_time)?;

    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::View, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    let task = Task::lock_by_id(&mut *tx, task.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    if !grant.can_log_time(task.assignee_id) {
        return Err(ServiceError::forbidden(
            "Only the assignee or a project manager can log time on this task",
        ));
    }

    let log = TimeLog::create(
        &mut *tx,
        CreateTimeLog {
            task_id: task.id,
            account_id: actor.account_id,
            start_time: data.start_time,
            end_time: data.end_time,
            description: data.description,
        },
        hours,
    )
    .await?;

    Task::add_hours(&mut *tx, task.id, hours).await?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::TimeLogged,
            format!("Logged {:.2} hours on \"{}\"", hours, task.title),
        )
        .project(task.project_id)
        .task(task.id)
        .new_value(json!({ "timeLogId": log.public_id, "hours": hours })),
    )
    .await?;

    tx.commit().await?;

    Ok(log)
}

pub async fn delete(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    time_log_id: Uuid,
) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::View, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    Task::lock_by_id(&mut *tx, task.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    let log = TimeLog::find_in_task(&mut *tx, task.id, time_log_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Time log"))?;

    if !grant.can_delete_time_log(log.account_id) {
        return Err(ServiceError::forbidden(
            "Only the author or a project manager can delete this time log",
        ));
    }

    soft_delete::soft_delete(&mut *tx, SoftDeleteTable::TimeLogs, log.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Time log"))?;

    Task::add_hours(&mut *tx, task.id, -log.hours).await?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::TimeLogDeleted,
            format!("Removed {:.2} logged hours from \"{}\"", log.hours, task.title),
        )
        .project(task.project_id)
        .task(task.id)
        .old_value(json!({ "timeLogId": log.public_id, "hours": log.hours })),
    )
    .await?;

    tx.commit().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_interval_hours() {
        let start = Utc::now();
        assert_eq!(interval_hours(start, start + Duration::minutes(45)).unwrap(), 0.75);
    }

    #[test]
    fn test_interval_must_be_positive() {
        let start = Utc::now();
        let err = interval_hours(start, start).unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("endTime"));
    }

    #[test]
    fn test_interval_rounding_to_zero_is_rejected() {
        let start = Utc::now();
        let err = interval_hours(start, start + Duration::seconds(10)).unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors["endTime"], vec!["Logged interval is too short to record".to_string()]);
    }

    #[test]
    fn test_interval_upper_bound() {
        let start = Utc::now();
        assert!(interval_hours(start, start + Duration::hours(24)).is_ok());
        assert!(matches!(
            interval_hours(start, start + Duration::hours(25)),
            Err(ServiceError::Validation(_))
        ));
    }
}
