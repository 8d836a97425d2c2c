//! Page request and page result for paginated execution.

use serde::Serialize;

/// Which page to fetch. Both numbers are clamped to at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self { page, page_size }.clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.max(1),
        }
    }

    pub fn limit(&self) -> u64 {
        self.page_size.max(1)
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1) * self.limit()
    }
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub current_page: u64,
    pub page_size: u64,
    pub total_entries: u64,
    pub total_pages: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub(crate) fn new(rows: Vec<T>, request: PageRequest, total_entries: u64) -> Self {
        let request = request.clamped();
        let total_pages = total_entries.div_ceil(request.page_size);
        Self {
            rows,
            current_page: request.page,
            page_size: request.page_size,
            total_entries,
            total_pages,
            has_more: request.page < total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            rows: self.rows.into_iter().map(f).collect(),
            current_page: self.current_page,
            page_size: self.page_size,
            total_entries: self.total_entries,
            total_pages: self.total_pages,
            has_more: self.has_more,
        }
    }
}
