/// Comment operations
///
/// Anyone who can view the project may comment. Only the author edits a
/// comment; the author or a manager may delete it. Mentioned accounts must
/// themselves be able to view the project, and each gets a mention row and
/// a notification.

use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::tasks::load_task;
use super::{ServiceError, ServiceResult};
use crate::auth::authorization::{
    authorize_project, authorize_project_locked, can_view, AccessLevel, ProjectAccess, ProjectLock,
};
use crate::auth::middleware::AuthContext;
use crate::db::pagination::{Page, PageRequest};
use crate::db::soft_delete::{self, SoftDeleteTable};
use crate::models::account::Account;
use crate::models::activity_log::{ActivityLog, ActivityType, NewActivity};
use crate::models::comment::{Comment, CommentAttachment, CreateComment, NewAttachment};
use crate::models::mention::Mention;
use crate::models::notification::{NewNotification, Notification, NotificationType};

/// Most accounts a single comment may mention
pub const MAX_MENTIONS: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub content: String,
    pub parent_comment_id: Option<Uuid>,
    pub mentions: Vec<Uuid>,
    pub attachments: Vec<NewAttachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub attachments: Vec<CommentAttachment>,
}

async fn with_attachments(conn: &mut PgConnection, comments: Vec<Comment>) -> ServiceResult<Vec<CommentView>> {
    let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
    let mut by_comment: HashMap<i64, Vec<CommentAttachment>> = HashMap::new();

    for attachment in CommentAttachment::list_for_comments(conn, &ids).await? {
        by_comment.entry(attachment.comment_id).or_default().push(attachment);
    }

    Ok(comments
        .into_iter()
        .map(|comment| CommentView {
            attachments: by_comment.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect())
}

pub async fn list(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    page: PageRequest,
) -> ServiceResult<Page<CommentView>> {
    let grant = authorize_project(pool, actor, project_id, AccessLevel::View).await?;
    let task = load_task(pool, &grant, task_id).await?;

    let comments = Comment::list_for_task(pool, task.id, page).await?;
    let meta = comments.meta;

    let mut conn = pool.acquire().await?;
    let items = with_attachments(&mut conn, comments.items).await?;

    Ok(Page { items, meta })
}

/// Accounts among `mentions` that can view the project, minus the author
async fn resolve_mentions(
    conn: &mut PgConnection,
    project_id: i64,
    author_id: i64,
    mentions: &[Uuid],
) -> ServiceResult<Vec<Account>> {
    if mentions.len() > MAX_MENTIONS {
        return Err(ServiceError::field(
            "mentions",
            format!("A comment can mention at most {} accounts", MAX_MENTIONS),
        ));
    }

    let accounts = Account::find_many_by_public_ids(&mut *conn, mentions).await?;
    let mut unique: Vec<&Uuid> = mentions.iter().collect();
    unique.sort();
    unique.dedup();
    if accounts.len() != unique.len() {
        return Err(ServiceError::field("mentions", "Mentioned account does not exist"));
    }

    let mut resolved = Vec::with_capacity(accounts.len());
    for account in accounts {
        if account.id == author_id {
            continue;
        }

        let visible = ProjectAccess::load_by_id(&mut *conn, project_id, account.id)
            .await?
            .map(|access| can_view(&access, &AuthContext::from_account(&account)))
            .unwrap_or(false);

        if !visible {
            return Err(ServiceError::field(
                "mentions",
                format!("{} cannot see this project", account.full_name()),
            ));
        }
        resolved.push(account);
    }

    Ok(resolved)
}

pub async fn create(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    data: NewComment,
) -> ServiceResult<CommentView> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::View, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    let parent_id = match data.parent_comment_id {
        Some(parent) => {
            let parent = Comment::find_in_task(&mut *tx, task.id, parent)
                .await?
                .ok_or_else(|| ServiceError::field("parentCommentId", "Parent comment not found"))?;
            if parent.is_reply() {
                return Err(ServiceError::field(
                    "parentCommentId",
                    "Replies to replies are not allowed",
                ));
            }
            Some(parent.id)
        }
        None => None,
    };

    let mentioned = resolve_mentions(&mut tx, grant.project_id(), actor.account_id, &data.mentions).await?;

    let comment = Comment::create(
        &mut *tx,
        CreateComment {
            task_id: task.id,
            author_id: actor.account_id,
            parent_comment_id: parent_id,
            content: data.content.trim().to_string(),
        },
    )
    .await?;

    let mut attachments = Vec::with_capacity(data.attachments.len());
    for attachment in data.attachments {
        attachments.push(CommentAttachment::add(&mut *tx, comment.id, attachment).await?);
    }

    let mentioned_ids: Vec<i64> = mentioned.iter().map(|a| a.id).collect();
    Mention::create_many(&mut *tx, comment.id, &mentioned_ids).await?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::CommentAdded,
            format!("Commented on \"{}\"", task.title),
        )
        .project(task.project_id)
        .task(task.id)
        .new_value(json!({ "commentId": comment.public_id, "content": comment.content })),
    )
    .await?;

    for account in &mentioned {
        Notification::create(
            &mut *tx,
            NewNotification {
                recipient_id: account.id,
                initiator_id: Some(actor.account_id),
                kind: NotificationType::Mentioned,
                message: format!("You were mentioned on \"{}\"", task.title),
                task_id: Some(task.id),
                project_id: Some(task.project_id),
            },
        )
        .await?;
    }

    let mut watchers = vec![task.created_by];
    watchers.extend(task.assignee_id);
    watchers.dedup();
    for watcher in watchers {
        if mentioned_ids.contains(&watcher) {
            continue;
        }
        Notification::create(
            &mut *tx,
            NewNotification {
                recipient_id: watcher,
                initiator_id: Some(actor.account_id),
                kind: NotificationType::CommentAdded,
                message: format!("New comment on \"{}\"", task.title),
                task_id: Some(task.id),
                project_id: Some(task.project_id),
            },
        )
        .await?;
    }

    tx.commit().await?;

    Ok(CommentView { comment, attachments })
}

pub async fn update(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    comment_id: Uuid,
    content: String,
) -> ServiceResult<CommentView> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::View, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    let before = Comment::lock_in_task(&mut *tx, task.id, comment_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment"))?;

    if !grant.can_edit_comment(before.author_id) {
        return Err(ServiceError::forbidden("Only the author can edit this comment"));
    }

    let after = Comment::update_content(&mut *tx, before.id, content.trim())
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::CommentUpdated,
            format!("Edited a comment on \"{}\"", task.title),
        )
        .project(task.project_id)
        .task(task.id)
        .change(
            json!({ "commentId": before.public_id, "content": before.content }),
            json!({ "commentId": after.public_id, "content": after.content }),
        ),
    )
    .await?;

    let mut views = with_attachments(&mut tx, vec![after]).await?;

    tx.commit().await?;

    views
        .pop()
        .ok_or_else(|| ServiceError::Internal("comment vanished after update".to_string()))
}

pub async fn delete(
    pool: &PgPool,
    actor: &AuthContext,
    project_id: Uuid,
    task_id: Uuid,
    comment_id: Uuid,
) -> ServiceResult<()> {
    let mut tx = pool.begin().await?;

    let grant =
        authorize_project_locked(&mut tx, actor, project_id, AccessLevel::View, ProjectLock::Share).await?;
    let task = load_task(&mut *tx, &grant, task_id).await?;

    let comment = Comment::lock_in_task(&mut *tx, task.id, comment_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment"))?;

    if !grant.can_delete_comment(comment.author_id) {
        return Err(ServiceError::forbidden(
            "Only the author or a project manager can delete this comment",
        ));
    }

    soft_delete::soft_delete(&mut *tx, SoftDeleteTable::Comments, comment.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment"))?;

    ActivityLog::record(
        &mut *tx,
        NewActivity::new(
            actor.account_id,
            ActivityType::CommentDeleted,
            format!("Deleted a comment on \"{}\"", task.title),
        )
        .project(task.project_id)
        .task(task.id)
        .old_value(json!({ "commentId": comment.public_id, "content": comment.content })),
    )
    .await?;

    tx.commit().await?;

    Ok(())
}
