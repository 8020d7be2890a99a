/// Label endpoints: project labels and their attachment to tasks

use axum::{
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use taskdeck_shared::auth::middleware::AuthContext;
use taskdeck_shared::models::label::Label;
use taskdeck_shared::services::labels;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{validate_request, ApiResult};
use crate::extract::{Json, Path};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLabelRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: String,

    pub color: String,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Label>>> {
    Ok(Json(labels::list(&state.db, &auth, project_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateLabelRequest>,
) -> ApiResult<(StatusCode, Json<Label>)> {
    validate_request(&req)?;

    let label = labels::create(&state.db, &auth, project_id, &req.name, req.color.trim()).await?;
    Ok((StatusCode::CREATED, Json(label)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, label_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    labels::delete(&state.db, &auth, project_id, label_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the task's labels after attaching
pub async fn attach(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id, label_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<Json<Vec<Label>>> {
    Ok(Json(
        labels::attach(&state.db, &auth, project_id, task_id, label_id).await?,
    ))
}

pub async fn detach(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id, label_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    labels::detach(&state.db, &auth, project_id, task_id, label_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
