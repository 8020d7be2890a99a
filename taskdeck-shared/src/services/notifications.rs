/// Notification inbox of the current account

use sqlx::PgPool;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::auth::middleware::AuthContext;
use crate::db::pagination::{Page, PageRequest};
use crate::models::notification::{Notification, NotificationFilter};

pub async fn list(
    pool: &PgPool,
    actor: &AuthContext,
    filter: NotificationFilter,
    page: PageRequest,
) -> ServiceResult<Page<Notification>> {
    Ok(Notification::list_for_recipient(pool, actor.account_id, filter, page).await?)
}

pub async fn unread_count(pool: &PgPool, actor: &AuthContext) -> ServiceResult<i64> {
    Ok(Notification::unread_count(pool, actor.account_id).await?)
}

pub async fn mark_read(pool: &PgPool, actor: &AuthContext, notification_id: Uuid) -> ServiceResult<Notification> {
    Notification::mark_read(pool, actor.account_id, notification_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Notification"))
}

/// Returns how many notifications changed
pub async fn mark_all_read(pool: &PgPool, actor: &AuthContext) -> ServiceResult<u64> {
    Ok(Notification::mark_all_read(pool, actor.account_id).await?)
}

pub async fn archive(pool: &PgPool, actor: &AuthContext, notification_id: Uuid) -> ServiceResult<Notification> {
    Notification::archive(pool, actor.account_id, notification_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Notification"))
}
