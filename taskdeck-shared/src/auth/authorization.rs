/// Project authorization gate
///
/// Every project-scoped operation is checked here before anything is read or
/// written. The gate loads a [`ProjectAccess`] snapshot (the project's
/// status, visibility and creator plus the actor's active membership, in one
/// joined query) and evaluates it against an [`AccessLevel`] with the pure
/// function [`evaluate`].
///
/// # Permission Model
///
/// Global admins bypass every check. For everyone else:
///
/// | Level       | Who passes                                                   |
/// |-------------|--------------------------------------------------------------|
/// | `Access`    | Public: anyone. Private: creator. Team: creator or member    |
/// | `View`      | `Access`, or any active member                               |
/// | `Manage`    | Creator, active Owner or Manager                             |
/// | `Delete`    | Creator, active Owner                                        |
/// | `Unarchive` | Same as `Delete`, and allowed while the project is archived  |
///
/// An archived project rejects every level but `Unarchive` with
/// [`AuthzError::ProjectArchived`]. A missing or soft-deleted project is
/// [`AuthzError::NotFound`] regardless of level.
///
/// A successful check yields a [`ProjectGrant`], which carries the internal
/// project id. Services take the id from the grant, so a query can only
/// target a project that passed the gate.
///
/// Reads use [`authorize_project`] on the pool. Writes call
/// [`authorize_project_locked`] on their own transaction, which keeps the
/// project and membership rows locked until commit.
///
/// # Example
///
/// ```no_run
/// use taskdeck_shared::auth::authorization::{authorize_project, AccessLevel};
/// use taskdeck_shared::auth::middleware::AuthContext;
/// use uuid::Uuid;
///
/// # async fn example(pool: sqlx::PgPool, actor: AuthContext, project: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let grant = authorize_project(&pool, &actor, project, AccessLevel::Manage).await?;
/// println!("managing project {}", grant.project_id());
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::project::{ProjectStatus, ProjectVisibility};
use crate::models::project_member::MemberRole;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Project (or resource) is absent or soft-deleted
    #[error("Project not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("Project is archived")]
    ProjectArchived,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Role of an account in a project, with the creator as implicit Owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EffectiveRole {
    Owner,
    Manager,
    Member,
    None,
}

impl EffectiveRole {
    pub fn can_manage(&self) -> bool {
        matches!(self, EffectiveRole::Owner | EffectiveRole::Manager)
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, EffectiveRole::Owner)
    }
}

impl From<MemberRole> for EffectiveRole {
    fn from(role: MemberRole) -> Self {
        match role {
            MemberRole::Owner => EffectiveRole::Owner,
            MemberRole::Manager => EffectiveRole::Manager,
            MemberRole::Member => EffectiveRole::Member,
        }
    }
}

/// Result of role resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRole {
    pub role: EffectiveRole,

    /// True for the creator and for active members
    pub active: bool,

    pub is_creator: bool,
}

/// Gate input: project facts plus the actor's membership
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ProjectAccess {
    pub project_id: i64,
    pub project_public_id: Uuid,
    pub status: ProjectStatus,
    pub visibility: ProjectVisibility,
    pub created_by: i64,

    /// Actor's active membership role, if any
    pub member_role: Option<MemberRole>,
}

impl ProjectAccess {
    /// Loads the snapshot for a live project by public id
    pub async fn load<'e, E>(
        executor: E,
        project_public_id: Uuid,
        account_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectAccess>(
            r#"
            SELECT p.id AS project_id, p.public_id AS project_public_id, p.status, p.visibility,
                   p.created_by, m.role AS member_role
            FROM projects p
            LEFT JOIN project_members m
                   ON m.project_id = p.id AND m.account_id = $2 AND m.left_at IS NULL
            WHERE p.public_id = $1 AND p.deleted_at IS NULL
            "#,
        )
        .bind(project_public_id)
        .bind(account_id)
        .fetch_optional(executor)
        .await
    }

    /// Loads the snapshot for a live project by internal id
    pub async fn load_by_id<'e, E>(
        executor: E,
        project_id: i64,
        account_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectAccess>(
            r#"
            SELECT p.id AS project_id, p.public_id AS project_public_id, p.status, p.visibility,
                   p.created_by, m.role AS member_role
            FROM projects p
            LEFT JOIN project_members m
                   ON m.project_id = p.id AND m.account_id = $2 AND m.left_at IS NULL
            WHERE p.id = $1 AND p.deleted_at IS NULL
            "#,
        )
        .bind(project_id)
        .bind(account_id)
        .fetch_optional(executor)
        .await
    }

    /// Loads the snapshot inside a transaction and locks what it read
    ///
    /// The project row is locked with `lock`, and the actor's membership row
    /// (if any) `FOR SHARE`. The role is re-read under that lock, so a
    /// concurrent archive, delete or demotion either commits before this
    /// read or waits for the caller's transaction to finish.
    pub async fn load_locked(
        conn: &mut PgConnection,
        project_public_id: Uuid,
        account_id: i64,
        lock: ProjectLock,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = match lock {
            ProjectLock::Share => LOAD_LOCKED_SHARE,
            ProjectLock::Update => LOAD_LOCKED_UPDATE,
        };

        let Some(mut access) = sqlx::query_as::<_, ProjectAccess>(sql)
            .bind(project_public_id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        access.member_role = sqlx::query_scalar::<_, MemberRole>(
            r#"
            SELECT role FROM project_members
            WHERE project_id = $1 AND account_id = $2 AND left_at IS NULL
            FOR SHARE
            "#,
        )
        .bind(access.project_id)
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(Some(access))
    }

    /// Role of `account_id`, assuming the snapshot was loaded for that account
    pub fn resolve_role(&self, account_id: i64) -> ResolvedRole {
        if self.created_by == account_id {
            return ResolvedRole {
                role: EffectiveRole::Owner,
                active: true,
                is_creator: true,
            };
        }

        match self.member_role {
            Some(role) => ResolvedRole {
                role: role.into(),
                active: true,
                is_creator: false,
            },
            None => ResolvedRole {
                role: EffectiveRole::None,
                active: false,
                is_creator: false,
            },
        }
    }
}

const LOAD_LOCKED_SHARE: &str = r#"
    SELECT p.id AS project_id, p.public_id AS project_public_id, p.status, p.visibility,
           p.created_by, NULL::member_role AS member_role
    FROM projects p
    WHERE p.public_id = $1 AND p.deleted_at IS NULL
    FOR SHARE OF p
"#;

const LOAD_LOCKED_UPDATE: &str = r#"
    SELECT p.id AS project_id, p.public_id AS project_public_id, p.status, p.visibility,
           p.created_by, NULL::member_role AS member_role
    FROM projects p
    WHERE p.public_id = $1 AND p.deleted_at IS NULL
    FOR UPDATE OF p
"#;

/// Lock taken on the project row by [`authorize_project_locked`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectLock {
    /// Writes to the project's tasks, members, labels or comments
    Share,

    /// Writes to the project row itself
    Update,
}

/// Required permission tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Visibility read check
    Access,

    /// Read of project content: `Access` or active membership
    View,

    Manage,

    Delete,

    /// Delete tier that ignores the archive freeze
    Unarchive,
}

/// Decides whether `actor` holds `level` on the project described by `access`
pub fn evaluate(access: &ProjectAccess, actor: &AuthContext, level: AccessLevel) -> Result<(), AuthzError> {
    if actor.is_admin {
        return Ok(());
    }

    if access.status == ProjectStatus::Archived && level != AccessLevel::Unarchive {
        return Err(AuthzError::ProjectArchived);
    }

    let resolved = access.resolve_role(actor.account_id);

    let allowed = match level {
        AccessLevel::Access => visibility_allows(access, &resolved),
        AccessLevel::View => visibility_allows(access, &resolved) || resolved.active,
        AccessLevel::Manage => resolved.role.can_manage(),
        AccessLevel::Delete | AccessLevel::Unarchive => resolved.role.can_delete(),
    };

    if allowed {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(denial_message(level).to_string()))
    }
}

fn visibility_allows(access: &ProjectAccess, resolved: &ResolvedRole) -> bool {
    match access.visibility {
        ProjectVisibility::Public => true,
        ProjectVisibility::Private => resolved.is_creator,
        ProjectVisibility::Team => resolved.is_creator || resolved.active,
    }
}

fn denial_message(level: AccessLevel) -> &'static str {
    match level {
        AccessLevel::Access | AccessLevel::View => "You do not have access to this project",
        AccessLevel::Manage => "You do not have permission to manage this project",
        AccessLevel::Delete => "Only the project owner can perform this action",
        AccessLevel::Unarchive => "Only the project owner can unarchive this project",
    }
}

pub fn can_access(access: &ProjectAccess, actor: &AuthContext) -> bool {
    evaluate(access, actor, AccessLevel::Access).is_ok()
}

pub fn can_view(access: &ProjectAccess, actor: &AuthContext) -> bool {
    evaluate(access, actor, AccessLevel::View).is_ok()
}

pub fn can_manage(access: &ProjectAccess, actor: &AuthContext) -> bool {
    evaluate(access, actor, AccessLevel::Manage).is_ok()
}

pub fn can_delete(access: &ProjectAccess, actor: &AuthContext) -> bool {
    evaluate(access, actor, AccessLevel::Delete).is_ok()
}

/// Proof that an actor passed the gate for one project
///
/// Finer per-resource rules (assignee, author) are answered by its methods.
#[derive(Debug, Clone)]
pub struct ProjectGrant {
    access: ProjectAccess,
    actor: AuthContext,
    level: AccessLevel,
}

impl ProjectGrant {
    /// Internal id of the authorized project
    pub fn project_id(&self) -> i64 {
        self.access.project_id
    }

    pub fn project_public_id(&self) -> Uuid {
        self.access.project_public_id
    }

    pub fn level(&self) -> AccessLevel {
        self.level
    }

    pub fn access(&self) -> &ProjectAccess {
        &self.access
    }

    pub fn actor(&self) -> &AuthContext {
        &self.actor
    }

    pub fn role(&self) -> ResolvedRole {
        self.access.resolve_role(self.actor.account_id)
    }

    pub fn can_manage(&self) -> bool {
        can_manage(&self.access, &self.actor)
    }

    pub fn can_delete(&self) -> bool {
        can_delete(&self.access, &self.actor)
    }

    pub fn is_actor(&self, account_id: i64) -> bool {
        self.actor.account_id == account_id
    }

    pub fn is_creator(&self, account_id: i64) -> bool {
        self.access.created_by == account_id
    }

    /// Manage tier, or being the task's assignee
    pub fn can_change_task_status(&self, assignee_id: Option<i64>) -> bool {
        self.can_manage() || assignee_id == Some(self.actor.account_id)
    }

    /// Comment author, or manage tier
    pub fn can_delete_comment(&self, author_id: i64) -> bool {
        self.is_actor(author_id) || self.can_manage()
    }

    /// Only the author edits a comment
    pub fn can_edit_comment(&self, author_id: i64) -> bool {
        self.is_actor(author_id)
    }

    /// Assignee of the task, or manage tier
    pub fn can_log_time(&self, assignee_id: Option<i64>) -> bool {
        assignee_id == Some(self.actor.account_id) || self.can_manage()
    }

    /// Log author, or manage tier
    pub fn can_delete_time_log(&self, log_account_id: i64) -> bool {
        self.is_actor(log_account_id) || self.can_manage()
    }

    /// Granting or revoking the Owner role needs the delete tier
    pub fn can_assign_role(&self, from: Option<MemberRole>, to: MemberRole) -> bool {
        if from == Some(MemberRole::Owner) || to == MemberRole::Owner {
            self.can_delete()
        } else {
            self.can_manage()
        }
    }
}

/// Runs the gate for a project by public id
///
/// # Errors
///
/// [`AuthzError::NotFound`] for a missing or deleted project, otherwise the
/// result of [`evaluate`].
pub async fn authorize_project<'e, E>(
    executor: E,
    actor: &AuthContext,
    project_public_id: Uuid,
    level: AccessLevel,
) -> Result<ProjectGrant, AuthzError>
where
    E: PgExecutor<'e>,
{
    let access = ProjectAccess::load(executor, project_public_id, actor.account_id)
        .await?
        .ok_or(AuthzError::NotFound)?;

    grant(access, actor, level)
}

/// Runs the gate inside a mutation's transaction
///
/// Same decision as [`authorize_project`], but the rows it reads stay
/// locked until the transaction ends. Every write path uses this so the
/// archive freeze and role checks hold at commit time.
pub async fn authorize_project_locked(
    conn: &mut PgConnection,
    actor: &AuthContext,
    project_public_id: Uuid,
    level: AccessLevel,
    lock: ProjectLock,
) -> Result<ProjectGrant, AuthzError> {
    let access = ProjectAccess::load_locked(conn, project_public_id, actor.account_id, lock)
        .await?
        .ok_or(AuthzError::NotFound)?;

    grant(access, actor, level)
}

/// Evaluates an already loaded snapshot into a grant
pub fn grant(access: ProjectAccess, actor: &AuthContext, level: AccessLevel) -> Result<ProjectGrant, AuthzError> {
    if let Err(e) = evaluate(&access, actor, level) {
        tracing::debug!(
            account_id = %actor.account_public_id,
            project_id = %access.project_public_id,
            ?level,
            error = %e,
            "Authorization denied"
        );
        return Err(e);
    }

    Ok(ProjectGrant {
        access,
        actor: actor.clone(),
        level,
    })
}

/// Role of an account in a project
///
/// Returns `None` when the project is missing or deleted.
pub async fn resolve_role<'e, E>(
    executor: E,
    account_id: i64,
    project_id: i64,
) -> Result<Option<ResolvedRole>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    Ok(ProjectAccess::load_by_id(executor, project_id, account_id)
        .await?
        .map(|access| access.resolve_role(account_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATOR: i64 = 1;
    const OTHER: i64 = 2;

    fn project(visibility: ProjectVisibility, status: ProjectStatus, member_role: Option<MemberRole>) -> ProjectAccess {
        ProjectAccess {
            project_id: 10,
            project_public_id: Uuid::new_v4(),
            status,
            visibility,
            created_by: CREATOR,
            member_role,
        }
    }

    fn actor(account_id: i64, is_admin: bool) -> AuthContext {
        AuthContext {
            account_id,
            account_public_id: Uuid::new_v4(),
            is_admin,
        }
    }

    #[test]
    fn test_private_project_is_creator_only() {
        let access = project(ProjectVisibility::Private, ProjectStatus::Active, None);

        assert!(can_access(&access, &actor(CREATOR, false)));
        assert!(!can_access(&access, &actor(OTHER, false)));
        assert!(matches!(
            evaluate(&access, &actor(OTHER, false), AccessLevel::Access),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn test_private_project_member_can_view_but_not_access() {
        let access = project(
            ProjectVisibility::Private,
            ProjectStatus::Active,
            Some(MemberRole::Member),
        );
        let member = actor(OTHER, false);

        assert!(!can_access(&access, &member));
        assert!(can_view(&access, &member));
        assert!(!can_manage(&access, &member));
    }

    #[test]
    fn test_public_project_is_readable_by_anyone() {
        let access = project(ProjectVisibility::Public, ProjectStatus::Active, None);
        let stranger = actor(OTHER, false);

        assert!(can_access(&access, &stranger));
        assert!(can_view(&access, &stranger));
        assert!(!can_manage(&access, &stranger));
        assert!(!can_delete(&access, &stranger));
    }

    #[test]
    fn test_team_project_needs_membership() {
        let outsider = project(ProjectVisibility::Team, ProjectStatus::Active, None);
        assert!(!can_access(&outsider, &actor(OTHER, false)));
        assert!(can_access(&outsider, &actor(CREATOR, false)));

        let member = project(
            ProjectVisibility::Team,
            ProjectStatus::Active,
            Some(MemberRole::Member),
        );
        assert!(can_access(&member, &actor(OTHER, false)));
    }

    #[test]
    fn test_manage_and_delete_tiers() {
        let manager = project(
            ProjectVisibility::Team,
            ProjectStatus::Active,
            Some(MemberRole::Manager),
        );
        assert!(can_manage(&manager, &actor(OTHER, false)));
        assert!(!can_delete(&manager, &actor(OTHER, false)));

        let owner = project(
            ProjectVisibility::Team,
            ProjectStatus::Active,
            Some(MemberRole::Owner),
        );
        assert!(can_manage(&owner, &actor(OTHER, false)));
        assert!(can_delete(&owner, &actor(OTHER, false)));

        let creator = project(ProjectVisibility::Private, ProjectStatus::Active, None);
        assert!(can_manage(&creator, &actor(CREATOR, false)));
        assert!(can_delete(&creator, &actor(CREATOR, false)));
    }

    #[test]
    fn test_archived_project_is_frozen_for_non_admins() {
        for role in [None, Some(MemberRole::Member), Some(MemberRole::Owner)] {
            let access = project(ProjectVisibility::Public, ProjectStatus::Archived, role);

            for account in [CREATOR, OTHER] {
                let actor = actor(account, false);
                assert!(!can_access(&access, &actor));
                assert!(!can_manage(&access, &actor));
                assert!(!can_delete(&access, &actor));
                assert!(matches!(
                    evaluate(&access, &actor, AccessLevel::View),
                    Err(AuthzError::ProjectArchived)
                ));
            }
        }
    }

    #[test]
    fn test_unarchive_ignores_freeze_at_delete_tier() {
        let access = project(
            ProjectVisibility::Team,
            ProjectStatus::Archived,
            Some(MemberRole::Manager),
        );

        assert!(evaluate(&access, &actor(CREATOR, false), AccessLevel::Unarchive).is_ok());
        assert!(matches!(
            evaluate(&access, &actor(OTHER, false), AccessLevel::Unarchive),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_bypasses_everything() {
        let admin = actor(99, true);

        for status in [ProjectStatus::Active, ProjectStatus::Archived] {
            let access = project(ProjectVisibility::Private, status, None);
            for level in [
                AccessLevel::Access,
                AccessLevel::View,
                AccessLevel::Manage,
                AccessLevel::Delete,
                AccessLevel::Unarchive,
            ] {
                assert!(evaluate(&access, &admin, level).is_ok());
            }
        }
    }

    #[test]
    fn test_completed_and_on_hold_are_not_frozen() {
        for status in [ProjectStatus::Completed, ProjectStatus::OnHold] {
            let access = project(ProjectVisibility::Private, status, None);
            assert!(can_manage(&access, &actor(CREATOR, false)));
        }
    }

    #[test]
    fn test_resolve_role() {
        let access = project(
            ProjectVisibility::Team,
            ProjectStatus::Active,
            Some(MemberRole::Manager),
        );

        let creator = access.resolve_role(CREATOR);
        assert_eq!(creator.role, EffectiveRole::Owner);
        assert!(creator.is_creator);
        assert!(creator.active);

        let manager = access.resolve_role(OTHER);
        assert_eq!(manager.role, EffectiveRole::Manager);
        assert!(manager.active);
        assert!(!manager.is_creator);

        let none = project(ProjectVisibility::Team, ProjectStatus::Active, None).resolve_role(OTHER);
        assert_eq!(none.role, EffectiveRole::None);
        assert!(!none.active);
    }

    #[test]
    fn test_grant_resource_rules() {
        let member_access = project(
            ProjectVisibility::Team,
            ProjectStatus::Active,
            Some(MemberRole::Member),
        );
        let member = grant(member_access, &actor(OTHER, false), AccessLevel::View).unwrap();

        assert_eq!(member.project_id(), 10);
        assert!(member.can_change_task_status(Some(OTHER)));
        assert!(!member.can_change_task_status(Some(CREATOR)));
        assert!(!member.can_change_task_status(None));

        assert!(member.can_edit_comment(OTHER));
        assert!(!member.can_edit_comment(CREATOR));
        assert!(member.can_delete_comment(OTHER));
        assert!(!member.can_delete_comment(CREATOR));

        assert!(member.can_log_time(Some(OTHER)));
        assert!(!member.can_log_time(None));
        assert!(member.can_delete_time_log(OTHER));
        assert!(!member.can_delete_time_log(CREATOR));
    }

    #[test]
    fn test_grant_manager_rules() {
        let access = project(
            ProjectVisibility::Team,
            ProjectStatus::Active,
            Some(MemberRole::Manager),
        );
        let manager = grant(access, &actor(OTHER, false), AccessLevel::Manage).unwrap();

        assert!(manager.can_change_task_status(None));
        assert!(manager.can_delete_comment(CREATOR));
        assert!(!manager.can_edit_comment(CREATOR));
        assert!(manager.can_log_time(None));

        assert!(manager.can_assign_role(Some(MemberRole::Member), MemberRole::Manager));
        assert!(!manager.can_assign_role(Some(MemberRole::Member), MemberRole::Owner));
        assert!(!manager.can_assign_role(Some(MemberRole::Owner), MemberRole::Member));
        assert!(!manager.can_assign_role(None, MemberRole::Owner));
    }

    #[test]
    fn test_grant_is_refused_below_level() {
        let access = project(
            ProjectVisibility::Team,
            ProjectStatus::Active,
            Some(MemberRole::Member),
        );
        assert!(matches!(
            grant(access, &actor(OTHER, false), AccessLevel::Manage),
            Err(AuthzError::Forbidden(_))
        ));
    }
}
