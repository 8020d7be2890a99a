/// Notification inbox of the current account

use axum::extract::State;
use serde::Serialize;
use taskdeck_shared::auth::middleware::AuthContext;
use taskdeck_shared::db::pagination::PageRequest;
use taskdeck_shared::models::notification::{Notification, NotificationFilter};
use taskdeck_shared::services::notifications;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::pagination::Paginated;

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageRequest>,
    Query(filter): Query<NotificationFilter>,
) -> ApiResult<Paginated<Notification>> {
    Ok(Paginated(
        notifications::list(&state.db, &auth, filter, page).await?,
    ))
}

pub async fn unread_count(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<CountResponse>> {
    let count = notifications::unread_count(&state.db, &auth).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(
        notifications::mark_read(&state.db, &auth, notification_id).await?,
    ))
}

pub async fn mark_all_read(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<UpdatedResponse>> {
    let updated = notifications::mark_all_read(&state.db, &auth).await?;
    Ok(Json(UpdatedResponse { updated }))
}

pub async fn archive(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(
        notifications::archive(&state.db, &auth, notification_id).await?,
    ))
}
