/// Request extractors that reject with the API error envelope
///
/// axum's own `Json`, `Path` and `Query` answer malformed input with a plain
/// text body. These wrappers run the same extraction and convert the
/// rejection into [`ApiError::BadRequest`].

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::ApiError;

/// JSON body extractor and response
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Path parameter extractor
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

/// Query string extractor
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use taskdeck_shared::db::pagination::PageRequest;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn by_id(Path(id): Path<Uuid>, Query(page): Query<PageRequest>) -> Json<String> {
        Json(format!("{id}:{}", page.page))
    }

    async fn call(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = Router::new()
            .route("/item/:id", get(by_id))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_valid_extraction() {
        let id = Uuid::new_v4();
        let (status, body) = call(&format!("/item/{id}?page=3")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{id}:3"));
    }

    #[tokio::test]
    async fn test_bad_path_is_enveloped_400() {
        let (status, body) = call("/item/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_bad_query_is_enveloped_400() {
        let (status, body) = call(&format!("/item/{}?page=first", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }
}
