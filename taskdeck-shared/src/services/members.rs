/// Project membership operations
///
/// Members are addressed by their account's public id. The creator's
/// membership is fixed: it cannot be removed or demoted. Granting or revoking
/// the Owner role requires the delete tier; other changes require manage.
/// A member may always leave a project on their own. Membership changes
/// hold the project row `FOR UPDATE`, so they run one at a time per project.

use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{conflict_on, ServiceError, ServiceResult};
use crate::auth::authorization::{authorize_project, authorize_project_locked, AccessLevel, ProjectLock};
use crate::auth::middleware::AuthContext;
use crate::db::pagination::{Page, PageRequest};
use crate::db::soft_delete::DeletedFilter;
use crate::models::account::Account;
use crate::models::activity_log::{ActivityLog, ActivityType, NewActivity};
use crate::models::notification::{NewNotification, Notification, NotificationType};
use crate::models::project::Project;
use crate::models::project_member::{
    MemberRole, MemberView, ProjectMember, ACTIVE_MEMBERSHIP_CONSTRAINT,
};

fn member_view(member: &ProjectMember, account: &Account) -> MemberView {
    MemberView {
        public_id: member.public_id,
        account_id: account.public_id,
        email: account.email.clone(),
        first_name: account.first_name.clone(),
        last_name: account.last_name.clone(),
        role: member.role,
        joined_at: member.joined_at,
    }
}

async fn find_account(pool: &PgPool, account_id: Uuid) -> ServiceResult<Account> {
    Account::find_by_public_id(pool, account_id, DeletedFilter::Exclude)
        .await?
        .ok_or_else(|| ServiceError::not_found("Account"))
}

pub async fn list(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    page: PageRequest,
) -> ServiceResult<Page<MemberView>> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;
    Ok(ProjectMember::list_active(pool, grant.project_id(), page).await?)
}

pub async fn add(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    account_id: Uuid,
    role: MemberRole,
) -> ServiceResult<MemberView> {
    let account = find_account(pool, account_id).await?;

    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Update).await?;

    if !grant.can_assign_role(None, role) {
        return Err(ServiceError::forbidden("Only the project owner can grant the Owner role"));
    }

    let project = Project::lock_by_id(&mut *tx, grant.project_id())
        .await?
        .ok_or_else(|| ServiceError::not_found("Project"))?;

    let member = ProjectMember::add(&mut *tx, project.id, account.id, role)
        .await
        .map_err(conflict_on(
            ACTIVE_MEMBERSHIP_CONSTRAINT,
            "Account is already a member of this project",
        ))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::MemberAdded,
            format!("Added {} as {}", account.full_name(), role.as_str()),
        )
        .project(project.id)
        .new_value(json!({ "accountId": account.public_id, "role": role })),
    )
    .await?;

    Notification::create(
        &mut *tx,
        NewNotification {
            recipient_id: account.id,
            initiator_id: Some(actor.account_id),
            kind: NotificationType::AddedToProject,
            message: format!("You were added to \"{}\" as {}", project.name, role.as_str()),
            task_id: None,
            project_id: Some(project.id),
        },
    )
    .await?;

    tx.commit().await?;

    info!(project_id = %project.public_id, account_id = %account.public_id, role = role.as_str(), "Member added");

    Ok(member_view(&member, &account))
}

pub async fn update_role(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    account_id: Uuid,
    role: MemberRole,
) -> ServiceResult<MemberView> {
    let account = find_account(pool, account_id).await?;

    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Update).await?;

    if grant.is_creator(account.id) {
        return Err(ServiceError::forbidden("The project creator's role cannot be changed"));
    }

    let member = ProjectMember::lock_active(&mut *tx, grant.project_id(), account.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Member"))?;

    if !grant.can_assign_role(Some(member.role), role) {
        return Err(ServiceError::forbidden(
            "Only the project owner can grant or revoke the Owner role",
        ));
    }

    if member.role == role {
        return Ok(member_view(&member, &account));
    }

    let updated = ProjectMember::update_role(&mut *tx, member.id, role)
        .await?
        .ok_or_else(|| ServiceError::not_found("Member"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::MemberRoleChanged,
            format!(
                "Changed {}'s role from {} to {}",
                account.full_name(),
                member.role.as_str(),
                role.as_str()
            ),
        )
        .project(grant.project_id())
        .change(
            json!({ "accountId": account.public_id, "role": member.role }),
            json!({ "accountId": account.public_id, "role": role }),
        ),
    )
    .await?;

    Notification::create(
        &mut *tx,
        NewNotification {
            recipient_id: account.id,
            initiator_id: Some(actor.account_id),
            kind: NotificationType::RoleChanged,
            message: format!("Your project role is now {}", role.as_str()),
            task_id: None,
            project_id: Some(grant.project_id()),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(member_view(&updated, &account))
}

/// Removes a member; members may also remove themselves
pub async fn remove(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    account_id: Uuid,
) -> ServiceResult<()> {
    let leaving_self = account_id == actor.account_public_id;
    let level = if leaving_self {
        AccessLevel::View
    } else {
        AccessLevel::Manage
    };
    let account = find_account(pool, account_id).await?;

    let mut tx = pool.begin().await?;

    let grant = authorize_project_locked(&mut tx, actor, project_id, level, ProjectLock::Update).await?;

    if grant.is_creator(account.id) {
        return Err(ServiceError::forbidden("The project creator cannot be removed"));
    }

    let member = ProjectMember::lock_active(&mut *tx, grant.project_id(), account.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Member"))?;

    if !leaving_self && member.role == MemberRole::Owner && !grant.can_delete() {
        return Err(ServiceError::forbidden("Only the project owner can remove an owner"));
    }

    ProjectMember::leave(&mut *tx, member.id).await?;

    let description = if leaving_self {
        format!("{} left the project", account.full_name())
    } else {
        format!("Removed {} from the project", account.full_name())
    };

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(actor.account_id, ActivityType::MemberRemoved, description)
            .project(grant.project_id())
            .old_value(json!({ "accountId": account.public_id, "role": member.role })),
    )
    .await?;

    Notification::create(
        &mut *tx,
        NewNotification {
            recipient_id: account.id,
            initiator_id: Some(actor.account_id),
            kind: NotificationType::RemovedFromProject,
            message: "You were removed from a project".to_string(),
            task_id: None,
            project_id: Some(grant.project_id()),
        },
    )
    .await?;

    tx.commit().await?;

    info!(project_id = %grant.project_public_id(), account_id = %account.public_id, "Member removed");

    Ok(())
}
