/// Mention inbox: only the mentioned account may list or mark its mentions

use sqlx::PgPool;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::auth::middleware::AuthContext;
use crate::db::pagination::{Page, PageRequest};
use crate::models::mention::{Mention, MentionView};

pub async fn list(
    pool: &PgPool,
    actor: &AuthContext,
    unread_only: bool,
    page: PageRequest,
) -> ServiceResult<Page<MentionView>> {
    Ok(Mention::list_for_account(pool, actor.account_id, unread_only, page).await?)
}

pub async fn mark_read(pool: &PgPool, actor: &AuthContext, mention_id: Uuid) -> ServiceResult<MentionView> {
    let mention = Mention::find_by_public_id(pool, mention_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Mention"))?;

    if mention.account_id != actor.account_id {
        return Err(ServiceError::forbidden("This mention belongs to another account"));
    }

    Mention::mark_read(pool, mention.id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Mention"))
}
