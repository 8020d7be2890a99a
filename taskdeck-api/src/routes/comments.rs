/// Comment endpoints under `/api/project/:id/task/:task_id/comment`
///
/// A comment may carry mentions (account ids) and attachment metadata. Files
/// themselves are stored elsewhere; only their URL and description are kept.

use axum::{
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use taskdeck_shared::auth::middleware::AuthContext;
use taskdeck_shared::db::pagination::PageRequest;
use taskdeck_shared::models::comment::NewAttachment;
use taskdeck_shared::services::comments::{self, CommentView, NewComment};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::{validate_request, ApiResult};
use crate::extract::{Json, Path, Query};
use crate::pagination::Paginated;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRequest {
    #[validate(length(min = 1, max = 255, message = "File name must be 1 to 255 characters"))]
    pub file_name: String,

    #[validate(url(message = "Attachment URL is invalid"))]
    pub url: String,

    #[validate(length(min = 1, max = 100, message = "Content type is required"))]
    pub content_type: String,

    #[validate(range(min = 0, message = "Size must not be negative"))]
    pub size_bytes: i64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Content must be 1 to 5000 characters"))]
    pub content: String,

    pub parent_comment_id: Option<Uuid>,

    /// Account ids to mention
    #[serde(default)]
    pub mentions: Vec<Uuid>,

    #[serde(default)]
    #[validate(nested)]
    pub attachments: Vec<AttachmentRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Content must be 1 to 5000 characters"))]
    pub content: String,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Query(page): Query<PageRequest>,
) -> ApiResult<Paginated<CommentView>> {
    Ok(Paginated(
        comments::list(&state.db, &auth, project_id, task_id, page).await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentView>)> {
    validate_request(&req)?;

    let data = NewComment {
        content: req.content,
        parent_comment_id: req.parent_comment_id,
        mentions: req.mentions,
        attachments: req
            .attachments
            .into_iter()
            .map(|a| NewAttachment {
                file_name: a.file_name,
                url: a.url,
                content_type: a.content_type,
                size_bytes: a.size_bytes,
            })
            .collect(),
    };

    let comment = comments::create(&state.db, &auth, project_id, task_id, data).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<UpdateCommentRequest>,
) -> ApiResult<Json<CommentView>> {
    validate_request(&req)?;

    Ok(Json(
        comments::update(&state.db, &auth, project_id, task_id, comment_id, req.content).await?,
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((project_id, task_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    comments::delete(&state.db, &auth, project_id, task_id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
