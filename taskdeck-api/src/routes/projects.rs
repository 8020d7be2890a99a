/// Project endpoints
///
/// Listing, reading, editing, status changes, archive/unarchive, soft delete
/// and admin restore, plus per-project settings, role lookup and the
/// activity trail.

use axum::{
    extract::State,
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use taskdeck_shared::auth::authorization::ResolvedRole;
use taskdeck_shared::auth::middleware::AuthContext;
use taskdeck_shared::db::pagination::PageRequest;
use taskdeck_shared::models::activity_log::{ActivityFilter, ActivityLog};
use taskdeck_shared::models::project::{Project, ProjectFilter, ProjectStatus, ProjectVisibility, UpdateProject};
use taskdeck_shared::models::project_settings::{ProjectSettings, UpdateProjectSettings};
use taskdeck_shared::models::task::TaskPriority;
use taskdeck_shared::services::projects::{self, NewProject};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{validate_request, ApiError, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::Paginated;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub visibility: Option<ProjectVisibility>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Name must be 1 to 200 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub visibility: Option<ProjectVisibility>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: ProjectStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub default_task_priority: Option<TaskPriority>,
    pub allow_member_task_creation: Option<bool>,
    pub notify_on_task_assignment: Option<bool>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageRequest>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Paginated<Project>> {
    Ok(Paginated(projects::list(&state.db, &auth, &filter, page).await?))
}

pub async fn list_deleted(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageRequest>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Paginated<Project>> {
    Ok(Paginated(projects::list_deleted(&state.db, &auth, &filter, page).await?))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(projects::get(&state.db, &auth, project_id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    validate_request(&req)?;

    let project = projects::create(
        &state.db,
        &auth,
        NewProject {
            name: req.name,
            description: req.description,
            visibility: req.visibility,
            start_date: req.start_date,
            end_date: req.end_date,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    validate_request(&req)?;

    let changes = UpdateProject {
        name: req.name.map(|name| name.trim().to_string()),
        description: req.description,
        visibility: req.visibility,
        start_date: req.start_date,
        end_date: req.end_date,
    };

    Ok(Json(projects::update(&state.db, &auth, req.id, changes).await?))
}

pub async fn change_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> ApiResult<Json<Project>> {
    Ok(Json(projects::change_status(&state.db, &auth, project_id, req.status).await?))
}

pub async fn unarchive(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(projects::unarchive(&state.db, &auth, project_id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    projects::delete(&state.db, &auth, project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(projects::restore(&state.db, &auth, project_id).await?))
}

pub async fn role(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ResolvedRole>> {
    Ok(Json(projects::role(&state.db, &auth, project_id).await?))
}

pub async fn get_settings(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<ProjectSettings>> {
    Ok(Json(projects::get_settings(&state.db, &auth, project_id).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Json(req): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<ProjectSettings>> {
    if req.default_task_priority.is_none()
        && req.allow_member_task_creation.is_none()
        && req.notify_on_task_assignment.is_none()
    {
        return Err(ApiError::BadRequest("No settings to update".to_string()));
    }

    let settings = projects::update_settings(
        &state.db,
        &auth,
        project_id,
        UpdateProjectSettings {
            default_task_priority: req.default_task_priority,
            allow_member_task_creation: req.allow_member_task_creation,
            notify_on_task_assignment: req.notify_on_task_assignment,
        },
    )
    .await?;

    Ok(Json(settings))
}

pub async fn activity(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<ActivityFilter>,
) -> ApiResult<Paginated<ActivityLog>> {
    Ok(Paginated(
        projects::activity(&state.db, &auth, project_id, &filter, page).await?,
    ))
}
