/// Project membership endpoints
///
/// Members are addressed by account id: `/api/project/:id/member/:account_id`.

use axum::{
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use taskdeck_shared::auth::middleware::AuthContext;
use taskdeck_shared::db::pagination::PageRequest;
use taskdeck_shared::models::project_member::{MemberRole, MemberView};
use taskdeck_shared::services::members;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiResult;
use crate::extract::{Json, Path, Query};
use crate::pagination::Paginated;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub account_id: Uuid,

    #[serde(default = "default_role")]
    pub role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: MemberRole,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Paginated<MemberView>> {
    Ok(Paginated(members::list(&state.db, &auth, project_id, page).await?))
}

pub async fn add(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(project_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberView>)> {
    let member = members::add(&state.db, &auth, project_id, req.account_id, req.role).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, account_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<MemberView>> {
    Ok(Json(
        members::update_role(&state.db, &auth, project_id, account_id, req.role).await?,
    ))
}

/// Removes a member; a member may remove itself (leave)
pub async fn remove(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, account_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    members::remove(&state.db, &auth, project_id, account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
