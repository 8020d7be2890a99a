/// Time-log endpoints under `/api/project/:id/task/:task_id/time-log`
///
/// Hours are computed from the interval; clients never send them.

use axum::{
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use taskdeck_shared::auth::middleware::AuthContext;
use taskdeck_shared::db::pagination::PageRequest;
use taskdeck_shared::models::time_log::TimeLog;
use taskdeck_shared::services::time_logs::{self, NewTimeLog};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{validate_request, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::Paginated;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTimeLogRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Paginated<TimeLog>> {
    Ok(Paginated(
        time_logs::list(&state.db, &auth, project_id, task_id, page).await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateTimeLogRequest>,
) -> ApiResult<(StatusCode, Json<TimeLog>)> {
    validate_request(&req)?;

    let log = time_logs::create(
        &state.db,
        &auth,
        project_id,
        task_id,
        NewTimeLog {
            start_time: req.start_time,
            end_time: req.end_time,
            description: req.description,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id, time_log_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    time_logs::delete(&state.db, &auth, project_id, task_id, time_log_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
