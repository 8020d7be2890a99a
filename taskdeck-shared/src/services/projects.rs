/// Project operations
///
/// Creating a project also makes the creator an Owner member and creates
/// the settings row, all in one transaction with the `ProjectCreated`
/// activity.

use chrono::NaiveDate;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::auth::authorization::{
    authorize_project, authorize_project_locked, AccessLevel, ProjectLock, ResolvedRole,
};
use crate::auth::middleware::AuthContext;
use crate::db::pagination::{Page, PageRequest};
use crate::db::soft_delete::{self, DeletedFilter, SoftDeleteTable};
use crate::models::activity_log::{ActivityFilter, ActivityLog, ActivityType, NewActivity};
use crate::models::project::{
    CreateProject, Project, ProjectFilter, ProjectScope, ProjectStatus, ProjectVisibility,
    UpdateProject,
};
use crate::models::project_member::{MemberRole, ProjectMember};
use crate::models::project_settings::{ProjectSettings, UpdateProjectSettings};

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub visibility: Option<ProjectVisibility>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ServiceResult<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ServiceError::field("endDate", "End date must not be before the start date"));
        }
    }
    Ok(())
}

pub async fn create(pool: &PgPool, actor: &AuthContext, data: NewProject) -> ServiceResult<Project> {
    check_dates(data.start_date, data.end_date)?;

    let mut tx = pool.begin().await?;

    let project = Project::create(
        &mut *tx,
        CreateProject {
            name: data.name.trim().to_string(),
            description: data.description,
            visibility: data.visibility.unwrap_or(ProjectVisibility::Private),
            created_by: actor.account_id,
            start_date: data.start_date,
            end_date: data.end_date,
        },
    )
    .await?;

    ProjectMember::add(&mut *tx, project.id, actor.account_id, MemberRole::Owner).await?;
    ProjectSettings::create_default(&mut *tx, project.id).await?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::ProjectCreated,
            format!("Created project \"{}\"", project.name),
        )
        .project(project.id)
        .new_value(project.snapshot()),
    )
    .await?;

    tx.commit().await?;

    info!(project_id = %project.public_id, account_id = %actor.account_public_id, "Project created");

    Ok(project)
}

pub async fn get(pool: &PgPool, actor: &AuthContext, project_id: Uuid) -> ServiceResult<Project> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;

    Project::find_by_id(pool, grant.project_id())
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))
}

/// Projects the actor can view (every live project for admins)
pub async fn list(
    pool: &PgPool,
    actor: &AuthContext,
    filter: &ProjectFilter,
    page: PageRequest,
) -> ServiceResult<Page<Project>> {
    let scope = if actor.is_admin {
        ProjectScope::All
    } else {
        ProjectScope::VisibleTo(actor.account_id)
    };

    Ok(Project::list(pool, scope, DeletedFilter::Exclude, filter, page).await?)
}

/// Soft-deleted projects (admin only)
pub async fn list_deleted(
    pool: &PgPool,
    actor: &AuthContext,
    filter: &ProjectFilter,
    page: PageRequest,
) -> ServiceResult<Page<Project>> {
    require_admin(actor)?;
    Ok(Project::list(pool, ProjectScope::All, DeletedFilter::Only, filter, page).await?)
}

/// The actor's role in a project
pub async fn role(pool: &PgPool, actor: &AuthContext, project_id: Uuid) -> ServiceResult<ResolvedRole> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;
    Ok(grant.role())
}

pub async fn update(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    data: UpdateProject,
) -> ServiceResult<Project> {
    if data.is_empty() {
        return Err(ServiceError::BadRequest("No fields to update".to_string()));
    }

    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Update).await?;

    let before = Project::lock_by_id(&mut *tx, grant.project_id())
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))?;

    check_dates(
        data.start_date.or(before.start_date),
        data.end_date.or(before.end_date),
    )?;

    let after = Project::update(&mut *tx, before.id, data)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::ProjectUpdated,
            format!("Updated project \"{}\"", after.name),
        )
        .project(after.id)
        .change(before.snapshot(), after.snapshot()),
    )
    .await?;

    tx.commit().await?;

    Ok(after)
}

/// Changes the status; archiving needs the delete tier
///
/// An archived project cannot change status here, see [`unarchive`].
pub async fn change_status(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    status: ProjectStatus,
) -> ServiceResult<Project> {
    let level = if status == ProjectStatus::Archived {
        AccessLevel::Delete
    } else {
        AccessLevel::Manage
    };
    let mut tx = pool.begin().await?;
    let grant = authorize_project_locked(&mut tx, actor, project_id, level, ProjectLock::Update).await?;

    set_status(tx, actor, grant.project_id(), status).await
}

/// Brings an archived project back to `Active`
pub async fn unarchive(pool: &PgPool, actor: &AuthContext, project_id: Uuid) -> ServiceResult<Project> {
    let mut tx = pool.begin().await?;
    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Unarchive, ProjectLock::Update).await?;

    if grant.access().status != ProjectStatus::Archived {
        return Err(ServiceError::BadRequest("Project is not archived".to_string()));
    }

    set_status(tx, actor, grant.project_id(), ProjectStatus::Active).await
}

/// Applies a status change inside the gate's transaction and commits it
async fn set_status(
    mut tx: Transaction<'_, Postgres>,
    actor: &AuthContext,
    project_id: i64,
    status: ProjectStatus,
) -> ServiceResult<Project> {
    let before = Project::lock_by_id(&mut *tx, project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))?;

    if before.status == status {
        return Ok(before);
    }

    let after = Project::set_status(&mut *tx, project_id, status)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::ProjectStatusChanged,
            format!(
                "Changed project status from {} to {}",
                before.status.as_str(),
                after.status.as_str()
            ),
        )
        .project(project_id)
        .change(json!(before.status), json!(after.status)),
    )
    .await?;

    tx.commit().await?;

    info!(project_id = %after.public_id, status = after.status.as_str(), "Project status changed");

    Ok(after)
}

/// Soft-deletes a project; its children disappear with it
pub async fn delete(pool: &PgPool, actor: &AuthContext, project_id: Uuid) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Delete, ProjectLock::Update).await?;

    let project = Project::lock_by_id(&mut *tx, grant.project_id())
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))?;

    soft_delete::soft_delete(&mut *tx, SoftDeleteTable::Projects, project.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::ProjectDeleted,
            format!("Deleted project \"{}\"", project.name),
        )
        .project(project.id)
        .old_value(project.snapshot()),
    )
    .await?;

    tx.commit().await?;

    info!(project_id = %project.public_id, account_id = %actor.account_public_id, "Project deleted");

    Ok(())
}

/// Restores a soft-deleted project (admin only)
pub async fn restore(pool: &PgPool, actor: &AuthContext, project_id: Uuid) -> ServiceResult<Project> {
    require_admin(actor)?;

    let mut tx = pool.begin().await?;

    let deleted = Project::find_by_public_id(&mut *tx, project_id, DeletedFilter::Only)
        .await?
        .ok_or_else(|| ServiceError::not_found("Deleted project"))?;

    if !soft_delete::restore(&mut *tx, SoftDeleteTable::Projects, deleted.id).await? {
        return Err(ServiceError::not_found("Deleted project"));
    }

    let project = Project::find_by_id(&mut *tx, deleted.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::ProjectRestored,
            format!("Restored project \"{}\"", project.name),
        )
        .project(project.id),
    )
    .await?;

    tx.commit().await?;

    info!(project_id = %project.public_id, "Project restored");

    Ok(project)
}

/// Audit trail of a project, newest first
pub async fn activity(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    filter: &ActivityFilter,
    page: PageRequest,
) -> ServiceResult<Page<ActivityLog>> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;
    Ok(ActivityLog::list_for_project(pool, grant.project_id(), filter, page).await?)
}

pub async fn get_settings(pool: &PgPool, actor: &AuthContext, project_id: Uuid) -> ServiceResult<ProjectSettings> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;

    ProjectSettings::find(pool, grant.project_id())
        .await?
        .ok_or_else(|| ServiceError::not_found("Project settings"))
}

pub async fn update_settings(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    data: UpdateProjectSettings,
) -> ServiceResult<ProjectSettings> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Update).await?;

    let before = ProjectSettings::find(&mut *tx, grant.project_id())
        .await?
        .ok_or_else(|| ServiceError::not_found("Project settings"))?;

    let after = ProjectSettings::update(&mut *tx, grant.project_id(), data)
        .await?
        .ok_or_else(|| ServiceError::not_found("Project settings"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(actor.account_id, ActivityType::ProjectUpdated, "Updated project settings")
            .project(grant.project_id())
            .change(settings_snapshot(&before), settings_snapshot(&after)),
    )
    .await?;

    tx.commit().await?;

    Ok(after)
}

fn settings_snapshot(settings: &ProjectSettings) -> serde_json::Value {
    json!({
        "defaultTaskPriority": settings.default_task_priority,
        "allowMemberTaskCreation": settings.allow_member_task_creation,
        "notifyOnTaskAssignment": settings.notify_on_task_assignment,
    })
}

pub(crate) fn require_admin(actor: &AuthContext) -> ServiceResult<()> {
    if actor.is_admin {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Administrator role required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dates() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1);
        let end = NaiveDate::from_ymd_opt(2025, 2, 1);

        assert!(check_dates(start, start).is_ok());
        assert!(check_dates(start, None).is_ok());
        assert!(matches!(check_dates(start, end), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_require_admin() {
        let mut actor = AuthContext {
            account_id: 1,
            account_public_id: Uuid::new_v4(),
            is_admin: false,
        };
        assert!(matches!(require_admin(&actor), Err(ServiceError::Forbidden(_))));

        actor.is_admin = true;
        assert!(require_admin(&actor).is_ok());
    }
}
