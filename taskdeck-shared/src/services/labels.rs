/// Label operations; every change needs the manage tier

use serde_json::json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::tasks::load_task;
use super::{conflict_on, ServiceError, ServiceResult};
use crate::auth::authorization::{
    authorize_project, authorize_project_locked, AccessLevel, ProjectGrant, ProjectLock,
};
use crate::auth::middleware::AuthContext;
use crate::db::soft_delete::{self, SoftDeleteTable};
use crate::models::activity_log::{ActivityLog, ActivityType, NewActivity};
use crate::models::label::{is_valid_color, Label, LABEL_NAME_CONSTRAINT};

async fn load_label<'e, E>(executor: E, grant: &ProjectGrant, label_id: Uuid) -> ServiceResult<Label>
where
    E: PgExecutor<'e>,
{
    Label::find_in_project(executor, grant.project_id(), label_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Label"))
}

pub async fn list(pool: &PgPool, actor: &AuthContext, project_id: Uuid) -> ServiceResult<Vec<Label>> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;
    Ok(Label::list_for_project(pool, grant.project_id()).await?)
}

pub async fn create(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    name: &str,
    color: &str,
) -> ServiceResult<Label> {
    if name.trim().is_empty() {
        return Err(ServiceError::field("name", "Name is required"));
    }
    if !is_valid_color(color) {
        return Err(ServiceError::field("color", "Color must look like #RRGGBB"));
    }

    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Share).await?;

    let label = Label::create(&mut *tx, grant.project_id(), name, color)
        .await
        .map_err(conflict_on(
            LABEL_NAME_CONSTRAINT,
            "A label with this name already exists in the project",
        ))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::LabelCreated,
            format!("Created label \"{}\"", label.name),
        )
        .project(grant.project_id())
        .new_value(json!({ "labelId": label.public_id, "name": label.name, "color": label.color })),
    )
    .await?;

    tx.commit().await?;

    Ok(label)
}

pub async fn delete(pool: &PgPool, actor: &AuthContext, project_id: Uuid, label_id: Uuid) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Share).await?;
    let label = load_label(&mut *tx, &grant, label_id).await?;

    soft_delete::soft_delete(&mut *tx, SoftDeleteTable::Labels, label.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Label"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::LabelDeleted,
            format!("Deleted label \"{}\"", label.name),
        )
        .project(grant.project_id())
        .old_value(json!({ "labelId": label.public_id, "name": label.name })),
    )
    .await?;

    tx.commit().await?;

    Ok(())
}

/// Attaches a label to a task; attaching twice is a no-op
pub async fn attach(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    label_id: Uuid,
) -> ServiceResult<Vec<Label>> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;
    let label = load_label(&mut *tx, &grant, label_id).await?;

    if Label::attach(&mut *tx, task.id, label.id).await? {
        ActivityLog::record(
            &mut *tx,
            NewActivity::new(
                actor.account_id,
                ActivityType::LabelAttached,
                format!("Labelled \"{}\" with \"{}\"", task.title, label.name),
            )
            .project(task.project_id)
            .task(task.id)
            .new_value(json!({ "labelId": label.public_id })),
        )
        .await?;
    }

    let labels = Label::list_for_task(&mut *tx, task.id).await?;

    tx.commit().await?;

    Ok(labels)
}

pub async fn detach(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    label_id: Uuid,
) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::Manage, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;
    let label = load_label(&mut *tx, &grant, label_id).await?;

    if !Label::detach(&mut *tx, task.id, label.id).await? {
        return Err(ServiceError::NotFound(
            "Label is not attached to this task".to_string(),
        ));
    }

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::LabelDetached,
            format!("Removed label \"{}\" from \"{}\"", label.name, task.title),
        )
        .project(task.project_id)
        .task(task.id)
        .old_value(json!({ "labelId": label.public_id })),
    )
    .await?;

    tx.commit().await?;

    Ok(())
}
