//! Pagination utilities for history listings
//!
//! History is paged by offset (`skip`) and page size (`limit`), newest first.

use serde::Deserialize;

/// Page size used when the caller gives none
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest page a caller may request
pub const MAX_LIMIT: i64 = 100;

/// Raw `?skip=&limit=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Sanitized offset/limit pair for SQL `LIMIT`/`OFFSET`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

/// Clamp requested paging into valid bounds
///
/// Negative `skip` becomes 0; `limit` defaults to [`DEFAULT_LIMIT`] and is
/// clamped to `[1, MAX_LIMIT]`.
///
/// # Examples
/// ```
/// use camel_api::pagination::{calculate_page, HistoryQuery};
///
/// let p = calculate_page(HistoryQuery { skip: Some(20), limit: None });
/// assert_eq!(p.offset, 20);
/// assert_eq!(p.limit, 10);
///
/// // Out-of-range values get clamped
/// let p = calculate_page(HistoryQuery { skip: Some(-5), limit: Some(1000) });
/// assert_eq!(p.offset, 0);
/// assert_eq!(p.limit, 100);
/// ```
pub fn calculate_page(query: HistoryQuery) -> Page {
    let offset = query.skip.unwrap_or(0).max(0);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    Page { offset, limit }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(skip: Option<i64>, limit: Option<i64>) -> Page {
        calculate_page(HistoryQuery { skip, limit })
    }

    #[test]
    fn test_page_defaults() {
        assert_eq!(page(None, None), Page { offset: 0, limit: 10 });
    }

    #[test]
    fn test_page_passthrough() {
        assert_eq!(page(Some(30), Some(25)), Page { offset: 30, limit: 25 });
    }

    #[test]
    fn test_page_negative_skip() {
        assert_eq!(page(Some(-1), None).offset, 0);
    }

    #[test]
    fn test_page_limit_low() {
        assert_eq!(page(None, Some(0)).limit, 1);
        assert_eq!(page(None, Some(-7)).limit, 1);
    }

    #[test]
    fn test_page_limit_high() {
        assert_eq!(page(None, Some(101)).limit, MAX_LIMIT);
    }
}
