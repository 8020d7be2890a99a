/// Task operations
///
/// Content changes need the manage tier. A status change is also open to
/// the task's assignee. Plain members may create tasks when the project's
/// settings allow it.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::auth::authorization::{
    authorize_project, authorize_project_locked, AccessLevel, ProjectGrant, ProjectLock,
};
use crate::auth::middleware::AuthContext;
use crate::db::pagination::{Page, PageRequest};
use crate::db::soft_delete::{self, DeletedFilter, SoftDeleteTable};
use crate::models::account::Account;
use crate::models::activity_log::{ActivityLog, ActivityType, NewActivity};
use crate::models::label::Label;
use crate::models::notification::{NewNotification, Notification, NotificationType};
use crate::models::project_member::ProjectMember;
use crate::models::project_settings::ProjectSettings;
use crate::models::task::{CreateTask, Task, TaskFilter, TaskPriority, TaskStatus, UpdateTask};

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

/// Task with its labels
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub labels: Vec<Label>,
}

/// Live task of an authorized project
pub(crate) async fn load_task<'e, E>(executor: E, grant: &ProjectGrant, task_id: Uuid) -> ServiceResult<Task>
where
    E: PgExecutor<'e>,
{
    Task::find_in_project(executor, grant.project_id(), task_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))
}

/// Internal id of an assignee, who must be the creator or an active member
async fn resolve_assignee(
    conn: &mut PgConnection,
    grant: &ProjectGrant,
    assignee: Uuid,
) -> ServiceResult<i64> {
    let account = Account::find_by_public_id(&mut *conn, assignee, DeletedFilter::Exclude)
        .await?
        .ok_or_else(|| ServiceError::field("assigneeId", "Assignee does not exist"))?;

    let participant = grant.is_creator(account.id)
        || ProjectMember::find_active(&mut *conn, grant.project_id(), account.id)
            .await?
            .is_some();

    if !participant {
        return Err(ServiceError::field(
            "assigneeId",
            "Assignee must be a member of the project",
        ));
    }

    Ok(account.id)
}

async fn load_settings(conn: &mut PgConnection, project_id: i64) -> ServiceResult<ProjectSettings> {
    ProjectSettings::find(conn, project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project settings"))
}

pub async fn list(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    filter: &TaskFilter,
    page: PageRequest,
) -> ServiceResult<Page<Task>> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;
    Ok(Task::list_for_project(pool, grant.project_id(), filter, page).await?)
}

pub async fn get(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
) -> ServiceResult<TaskDetails> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;
    let task = load_task(pool, &grant, task_id).await?;
    let labels = Label::list_for_task(pool, task.id).await?;

    Ok(TaskDetails { task, labels })
}

pub async fn create(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    data: NewTask,
) -> ServiceResult<Task> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::View, ProjectLock::Share).await?;
    let settings = load_settings(&mut tx, grant.project_id()).await?;

    if !grant.can_manage() && !(settings.allow_member_task_creation && grant.role().active) {
        return Err(ServiceError::forbidden(
            "You do not have permission to create tasks in this project",
        ));
    }

    let assignee_id = match data.assignee_id {
        Some(assignee) => Some(resolve_assignee(&mut tx, &grant, assignee).await?),
        None => None,
    };

    let task = Task::create(
        &mut *tx,
        CreateTask {
            project_id: grant.project_id(),
            title: data.title.trim().to_string(),
            description: data.description,
            priority: data.priority.unwrap_or(settings.default_task_priority),
            assignee_id,
            created_by: actor.account_id,
            due_date: data.due_date,
        },
    )
    .await?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::TaskCreated,
            format!("Created task \"{}\"", task.title),
        )
        .project(task.project_id)
        .task(task.id)
        .new_value(task.snapshot()),
    )
    .await?;

    if let (Some(assignee), true) = (task.assignee_id, settings.notify_on_task_assignment) {
        notify_assignee(&mut tx, actor, &task, assignee).await?;
    }

    tx.commit().await?;

    info!(task_id = %task.public_id, project_id = %grant.project_public_id(), "Task created");

    Ok(task)
}

pub async fn update(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    data: UpdateTask,
) -> ServiceResult<Task> {
    if data.is_empty() {
        return Err(ServiceError::BadRequest("No fields to update".to_string()));
    }
    if let Some(progress) = data.progress {
        if !(0..=100).contains(&progress) {
            return Err(ServiceError::field("progress", "Progress must be between 0 and 100"));
        }
    }

    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    let before = Task::lock_by_id(&mut *tx, task.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    let after = Task::update(&mut *tx, before.id, data)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::TaskUpdated,
            format!("Updated task \"{}\"", after.title),
        )
        .project(after.project_id)
        .task(after.id)
        .change(before.snapshot(), after.snapshot()),
    )
    .await?;

    tx.commit().await?;

    Ok(after)
}

pub async fn change_status(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    status: TaskStatus,
) -> ServiceResult<Task> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::View, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    let before = Task::lock_by_id(&mut *tx, task.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    if !grant.can_change_task_status(before.assignee_id) {
        return Err(ServiceError::forbidden(
            "Only managers or the assignee can change the task status",
        ));
    }

    if before.status == status {
        return Ok(before);
    }

    let after = Task::set_status(&mut *tx, before.id, status)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::TaskStatusChanged,
            format!(
                "Changed status of \"{}\" from {} to {}",
                after.title,
                before.status.as_str(),
                after.status.as_str()
            ),
        )
        .project(after.project_id)
        .task(after.id)
        .change(json!(before.status), json!(after.status)),
    )
    .await?;

    let mut recipients = vec![after.created_by];
    if let Some(assignee) = after.assignee_id {
        if assignee != after.created_by {
            recipients.push(assignee);
        }
    }

    for recipient in recipients {
        Notification::create(
            &mut *tx,
            NewNotification {
                recipient_id: recipient,
                initiator_id: Some(actor.account_id),
                kind: NotificationType::TaskStatusChanged,
                message: format!("\"{}\" moved to {}", after.title, after.status.as_str()),
                task_id: Some(after.id),
                project_id: Some(after.project_id),
            },
        )
        .await?;
    }

    tx.commit().await?;

    Ok(after)
}

/// Sets or clears the assignee
pub async fn assign(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    assignee: Option<Uuid>,
) -> ServiceResult<Task> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    let before = Task::lock_by_id(&mut *tx, task.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    let assignee_id = match assignee {
        Some(assignee) => Some(resolve_assignee(&mut tx, &grant, assignee).await?),
        None => None,
    };

    if before.assignee_id == assignee_id {
        return Ok(before);
    }

    let after = Task::set_assignee(&mut *tx, before.id, assignee_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    let description = match after.assignee_public_id {
        Some(_) => format!("Assigned \"{}\"", after.title),
        None => format!("Unassigned \"{}\"", after.title),
    };

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(actor.account_id, ActivityType::TaskAssigned, description)
            .project(after.project_id)
            .task(after.id)
            .change(
                json!({ "assigneeId": before.assignee_public_id }),
                json!({ "assigneeId": after.assignee_public_id }),
            ),
    )
    .await?;

    let settings = load_settings(&mut tx, after.project_id).await?;
    if let (Some(assignee), true) = (after.assignee_id, settings.notify_on_task_assignment) {
        notify_assignee(&mut tx, actor, &after, assignee).await?;
    }

    tx.commit().await?;

    Ok(after)
}

pub async fn delete(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    let task = Task::lock_by_id(&mut *tx, task.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    soft_delete::soft_delete(&mut *tx, SoftDeleteTable::Tasks, task.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Task"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::TaskDeleted,
            format!("Deleted task \"{}\"", task.title),
        )
        .project(task.project_id)
        .task(task.id)
        .old_value(task.snapshot()),
    )
    .await?;

    tx.commit().await?;

    info!(task_id = %task.public_id, "Task deleted");

    Ok(())
}

async fn notify_assignee(
    conn: &mut PgConnection,
    actor: &AuthContext,
    task: &Task,
    assignee: i64,
) -> ServiceResult<()> {
    Notification::create(
        conn,
        NewNotification {
            recipient_id: assignee,
            initiator_id: Some(actor.account_id),
            kind: NotificationType::TaskAssigned,
            message: format!("You were assigned \"{}\"", task.title),
            task_id: Some(task.id),
            project_id: Some(task.project_id),
        },
    )
    .await?;

    Ok(())
}
