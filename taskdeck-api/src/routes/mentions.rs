/// Mentions of the current account

use axum::extract::State;
use serde::Deserialize;
use taskdeck_shared::auth::middleware::AuthContext;
use taskdeck_shared::db::pagination::PageRequest;
use taskdeck_shared::models::mention::MentionView;
use taskdeck_shared::services::mentions;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::pagination::Paginated;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionQuery {
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageRequest>,
    Query(query): Query<MentionQuery>,
) -> ApiResult<Paginated<MentionView>> {
    Ok(Paginated(
        mentions::list(&state.db, &auth, query.unread_only, page).await?,
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(mention_id): Path<Uuid>,
) -> ApiResult<Json<MentionView>> {
    Ok(Json(mentions::mark_read(&state.db, &auth, mention_id).await?))
}
