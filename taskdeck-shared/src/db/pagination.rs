/// Pagination primitives shared by every list query
///
/// List endpoints return only the page's items in the body; the page metadata
/// travels out-of-band in the `X-Pagination` response header (see the API
/// crate), serialized from [`PageMeta`].

use serde::{Deserialize, Serialize};

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Upper bound on the requested page size
pub const MAX_PAGE_SIZE: i64 = 100;

/// Highest page number honoured; larger values are treated as this page
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Page requested by the client (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: i64,

    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    /// Clamps out-of-range values instead of rejecting them
    ///
    /// The page is capped so `offset` can never overflow.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.clamp(1, MAX_PAGE),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// SQL `LIMIT`
    pub fn limit(&self) -> i64 {
        self.normalized().page_size
    }

    /// SQL `OFFSET`
    pub fn offset(&self) -> i64 {
        let page = self.normalized();
        (page.page - 1).saturating_mul(page.page_size)
    }
}

/// Metadata describing one page of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page_size: i64,
    pub current_page: i64,
    pub total_count: i64,
    pub total_page: i64,
}

impl PageMeta {
    pub fn new(request: PageRequest, total_count: i64) -> Self {
        let request = request.normalized();
        let total_page = if total_count <= 0 {
            0
        } else {
            (total_count + request.page_size - 1) / request.page_size
        };

        Self {
            page_size: request.page_size,
            current_page: request.page,
            total_count,
            total_page,
        }
    }
}

/// One page of items plus its metadata
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: i64) -> Self {
        Self {
            items,
            meta: PageMeta::new(request, total_count),
        }
    }

    /// Converts the items while keeping the metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let page = PageRequest::new(3, 20);
        assert_eq!(page.limit(), 20);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let page = PageRequest::new(0, 1000);
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = PageRequest::new(-4, 0);
        assert_eq!(page.normalized(), PageRequest::new(1, 1));
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let page = PageRequest::new(i64::MAX, MAX_PAGE_SIZE);
        assert_eq!(page.normalized().page, MAX_PAGE);
        assert_eq!(page.offset(), (MAX_PAGE - 1) * MAX_PAGE_SIZE);

        let page: PageRequest =
            serde_json::from_str(r#"{"page":9223372036854775807,"pageSize":100}"#).unwrap();
        assert!(page.offset() > 0);
        assert_eq!(PageMeta::new(page, 5).current_page, MAX_PAGE);
    }

    #[test]
    fn test_total_page_rounds_up() {
        let meta = PageMeta::new(PageRequest::new(1, 10), 21);
        assert_eq!(meta.total_page, 3);
        assert_eq!(meta.total_count, 21);
        assert_eq!(meta.current_page, 1);

        let meta = PageMeta::new(PageRequest::new(1, 10), 20);
        assert_eq!(meta.total_page, 2);
    }

    #[test]
    fn test_empty_list_has_zero_pages() {
        let meta = PageMeta::new(PageRequest::default(), 0);
        assert_eq!(meta.total_page, 0);
        assert_eq!(meta.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_meta_serializes_camel_case() {
        let meta = PageMeta::new(PageRequest::new(2, 5), 12);
        let json = serde_json::to_value(meta).unwrap();
        assert_eq!(json["pageSize"], 5);
        assert_eq!(json["currentPage"], 2);
        assert_eq!(json["totalCount"], 12);
        assert_eq!(json["totalPage"], 3);
    }

    #[test]
    fn test_page_request_defaults_from_query() {
        let page: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(page, PageRequest::default());

        let page: PageRequest = serde_json::from_str(r#"{"page":4,"pageSize":25}"#).unwrap();
        assert_eq!(page, PageRequest::new(4, 25));
    }
}
