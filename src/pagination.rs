//! Page-window arithmetic shared by every listing endpoint.

use serde::Serialize;

/// Page returned when the caller does not ask for one.
pub const DEFAULT_PAGE: u32 = 1;
/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 10;
/// Hard cap on page size.
pub const MAX_LIMIT: u32 = 100;

/// Resolve raw `page`/`limit` query values into a usable window:
/// absent values take the defaults, zero clamps to 1, and `limit` is
/// capped at [`MAX_LIMIT`].
pub fn window(page: Option<u32>, limit: Option<u32>) -> PageWindow {
    let page = page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    PageWindow { page, limit }
}

/// A resolved window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    /// Number of records to skip before this window starts.
    pub fn offset(self) -> u64 {
        (u64::from(self.page) - 1) * u64::from(self.limit)
    }

    /// Build the meta block for this window over `total` matching
    /// records.
    pub fn meta(self, total: u64) -> PageMeta {
        let total_pages = total.div_ceil(u64::from(self.limit));
        PageMeta {
            total_count: total,
            total_pages,
            current_page: self.page,
            has_next: u64::from(self.page) < total_pages,
            has_prev: self.page > 1,
        }
    }
}

/// Pagination block attached to listing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total_count: u64,
    pub total_pages: u64,
    pub current_page: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_defaults() {
        let w = window(None, None);
        assert_eq!(w, PageWindow { page: 1, limit: 10 });
        assert_eq!(w.offset(), 0);
    }

    #[test]
    fn test_window_clamps_zero_and_caps_limit() {
        assert_eq!(window(Some(0), Some(0)), PageWindow { page: 1, limit: 1 });
        assert_eq!(
            window(Some(2), Some(1000)),
            PageWindow {
                page: 2,
                limit: 100
            }
        );
    }

    #[test]
    fn test_offset() {
        assert_eq!(window(Some(3), Some(10)).offset(), 20);
        assert_eq!(window(Some(1), Some(25)).offset(), 0);
    }

    #[test]
    fn test_meta_last_partial_page() {
        // 25 records at 10 per page: page 3 holds the final 5.
        let meta = window(Some(3), Some(10)).meta(25);
        assert_eq!(meta.total_count, 25);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.current_page, 3);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn test_meta_middle_page() {
        let meta = window(Some(2), Some(10)).meta(25);
        assert!(meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn test_meta_exact_multiple() {
        let meta = window(Some(2), Some(10)).meta(20);
        assert_eq!(meta.total_pages, 2);
        assert!(!meta.has_next);
    }

    #[test]
    fn test_meta_empty_set() {
        let meta = window(None, None).meta(0);
        assert_eq!(meta.total_count, 0);
        assert_eq!(meta.total_pages, 0);
        assert_eq!(meta.current_page, 1);
        assert!(!meta.has_next);
        assert!(!meta.has_prev);
    }

    #[test]
    fn test_meta_page_past_end() {
        let meta = window(Some(9), Some(10)).meta(25);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
    }

    #[test]
    fn test_meta_serializes_camel_case() {
        let meta = window(Some(1), Some(10)).meta(3);
        let value = serde_json::to_value(meta).unwrap();
        assert_eq!(value["totalCount"], 3);
        assert_eq!(value["totalPages"], 1);
        assert_eq!(value["currentPage"], 1);
        assert_eq!(value["hasNext"], false);
        assert_eq!(value["hasPrev"], false);
    }
}
