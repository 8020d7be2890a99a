/// Task endpoints under `/api/project/:id/task`

use axum::{
    extract::State,
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use taskdeck_shared::auth::middleware::AuthContext;
use taskdeck_shared::db::pagination::PageRequest;
use taskdeck_shared::models::task::{Task, TaskFilter, TaskPriority, TaskStatus, UpdateTask};
use taskdeck_shared::services::tasks::{self, NewTask, TaskDetails};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{validate_request, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::Paginated;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,

    #[validate(length(max = 10000, message = "Description must be at most 10000 characters"))]
    pub description: Option<String>,

    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 10000, message = "Description must be at most 10000 characters"))]
    pub description: Option<String>,

    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,

    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: TaskStatus,
}

/// `assigneeId: null` unassigns
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub assignee_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Paginated<Task>> {
    Ok(Paginated(tasks::list(&state.db, &auth, project_id, &filter, page).await?))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<TaskDetails>> {
    Ok(Json(tasks::get(&state.db, &auth, project_id, task_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    validate_request(&req)?;

    let task = tasks::create(
        &state.db,
        &auth,
        project_id,
        NewTask {
            title: req.title,
            description: req.description,
            priority: req.priority,
            assignee_id: req.assignee_id,
            due_date: req.due_date,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    validate_request(&req)?;

    let changes = UpdateTask {
        title: req.title.map(|title| title.trim().to_string()),
        description: req.description,
        priority: req.priority,
        due_date: req.due_date,
        progress: req.progress,
    };

    Ok(Json(tasks::update(&state.db, &auth, project_id, task_id, changes).await?))
}

pub async fn change_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ChangeStatusRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(
        tasks::change_status(&state.db, &auth, project_id, task_id, req.status).await?,
    ))
}

pub async fn assign(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(
        tasks::assign(&state.db, &auth, project_id, task_id, req.assignee_id).await?,
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    tasks::delete(&state.db, &auth, project_id, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
