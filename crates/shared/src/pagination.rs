//! Page-number pagination utilities.

use serde::Deserialize;

/// Default number of rows per preview page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Hard cap on rows per preview page.
pub const MAX_PAGE_SIZE: usize = 1_000;

/// Pagination query parameters with 1-indexed page numbers.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageParams {
    /// Zero-based index of the first row on this page.
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1)).saturating_mul(self.page_size)
    }
}

/// Total number of pages needed for `row_count` rows.
///
/// Zero rows yield zero pages, matching the preview contract.
pub fn total_pages(row_count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    row_count.div_ceil(page_size)
}
