//! Paged file preview models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use shared::pagination::DEFAULT_PAGE_SIZE;

/// Query parameters for the preview endpoint.
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct PreviewQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: usize,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 1_000, message = "Page size must be between 1 and 1000"))]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// One page of a stored CSV, with pagination metadata.
///
/// Rows are objects keyed by column name so the shape survives the
/// union-of-columns output of enrichment unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct FilePreview {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
    pub row_count: usize,
    pub current_page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub can_load_all: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::pagination::MAX_PAGE_SIZE;

    #[test]
    fn test_query_defaults() {
        let query: PreviewQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_query_rejects_page_zero() {
        let query = PreviewQuery {
            page: 0,
            page_size: 100,
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_query_rejects_oversized_page() {
        let query = PreviewQuery {
            page: 1,
            page_size: MAX_PAGE_SIZE + 1,
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_query_accepts_bounds() {
        let query = PreviewQuery {
            page: 1,
            page_size: MAX_PAGE_SIZE,
        };
        assert!(query.validate().is_ok());
    }
}
