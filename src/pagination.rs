//! This modules defines the common functionality for paging data.

use crate::transaction::Window;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The number of items per page when a request does not specify a
    /// usable page size.
    pub default_page_size: u64,
    /// The largest page size a request may ask for. Larger requests are
    /// clamped to this value.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// A page as requested by a caller. Any field may be missing or out of
/// range, see [PageRequest::resolve].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// The 1-based page number.
    pub page: Option<u64>,
    /// The number of items per page.
    pub page_size: Option<u64>,
}

impl PageRequest {
    /// Request page `page` with `page_size` items per page.
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// Turn the request into a concrete page.
    ///
    /// A missing or zero page number becomes page 1. A missing or zero page
    /// size becomes `config.default_page_size`, and page sizes above
    /// `config.max_page_size` are clamped.
    pub fn resolve(&self, config: &PaginationConfig) -> Page {
        let number = match self.page {
            Some(page) if page > 0 => page,
            _ => 1,
        };

        let size = match self.page_size {
            Some(size) if size > 0 => size.min(config.max_page_size),
            _ => config.default_page_size,
        };

        Page { number, size }
    }
}

/// A resolved page: a 1-based page number and a page size of at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// The 1-based page number.
    pub number: u64,
    /// The number of items per page.
    pub size: u64,
}

impl Page {
    /// The number of items that come before this page. Page zero is treated
    /// like the first page.
    pub fn offset(&self) -> u64 {
        self.number.saturating_sub(1).saturating_mul(self.size)
    }

    /// The slice of a result set covered by this page.
    pub fn window(&self) -> Window {
        Window {
            offset: self.offset(),
            limit: Some(self.size),
        }
    }
}
