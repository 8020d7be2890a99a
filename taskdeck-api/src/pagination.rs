/// Paginated list responses
///
/// The body holds only the items; page metadata goes into the `X-Pagination`
/// header as JSON: `{"pageSize":10,"currentPage":1,"totalCount":42,"totalPage":5}`.

use axum::{
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use taskdeck_shared::db::pagination::{Page, PageMeta};

use crate::error::{ApiError, ApiResult};

pub const PAGINATION_HEADER: &str = "x-pagination";

/// JSON list of `page.items` with the metadata header attached
pub struct Paginated<T>(pub Page<T>);

fn header_value(meta: &PageMeta) -> ApiResult<HeaderValue> {
    let json = serde_json::to_string(meta)
        .map_err(|e| ApiError::Internal(format!("Failed to encode pagination header: {}", e)))?;

    HeaderValue::from_str(&json)
        .map_err(|e| ApiError::Internal(format!("Invalid pagination header: {}", e)))
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        let Page { items, meta } = self.0;

        match header_value(&meta) {
            Ok(value) => {
                let mut response = Json(items).into_response();
                response
                    .headers_mut()
                    .insert(HeaderName::from_static(PAGINATION_HEADER), value);
                response
            }
            Err(e) => e.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_shared::db::pagination::PageRequest;

    #[tokio::test]
    async fn test_header_and_body() {
        let page = Page::new(vec!["a", "b"], PageRequest::new(2, 2), 5);
        let response = Paginated(page).into_response();

        let header = response.headers().get("X-Pagination").unwrap().to_str().unwrap();
        let meta: serde_json::Value = serde_json::from_str(header).unwrap();
        assert_eq!(meta["pageSize"], 2);
        assert_eq!(meta["currentPage"], 2);
        assert_eq!(meta["totalCount"], 5);
        assert_eq!(meta["totalPage"], 3);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!(["a", "b"]));
    }
}
