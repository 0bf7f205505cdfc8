//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies built from them.

use serde::{Deserialize, Serialize};

/// Inbound webhook payloads and the audit log
pub mod notification;
/// Payment intents
pub mod payment;
/// Wallets, credit log and top-ups
pub mod wallet;

/// Largest page size accepted by list endpoints.
pub const MAX_PAGE_LIMIT: u32 = 100;
const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Page selection for list endpoints (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Clamp raw query values into a valid page.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Query string accepted by paginated history endpoints.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl From<PageQuery> for Page {
    fn from(query: PageQuery) -> Self {
        Page::new(query.page, query.limit)
    }
}

/// One page of results plus totals.
///
/// # JSON Example
///
/// ```json
/// { "data": [], "total": 0, "page": 1, "limit": 20, "total_pages": 0 }
/// ```
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        let limit = i64::from(page.limit);
        Self {
            data,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: (total + limit - 1) / limit,
        }
    }

    /// Convert every item, keeping the totals.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}
