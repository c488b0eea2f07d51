/// Page requests and page metadata for list endpoints.

use serde::{Deserialize, Serialize};

/// Largest page a caller may ask for
pub const MAX_LIMIT: i64 = 100;

/// Requested page, 1-based
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: i64,

    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageRequest {
    /// Clamps out-of-range values instead of rejecting them
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Row offset for `OFFSET`
    pub fn offset(&self) -> i64 {
        let page = self.normalized();
        (page.page - 1).saturating_mul(page.limit)
    }

    /// Row count for `LIMIT`
    pub fn limit(&self) -> i64 {
        self.normalized().limit
    }
}

/// Pagination metadata returned alongside a page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total_rows: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(request: PageRequest, total_rows: i64) -> Self {
        let request = request.normalized();
        let total_pages = if total_rows == 0 {
            0
        } else {
            (total_rows + request.limit - 1) / request.limit
        };

        Self {
            page: request.page,
            limit: request.limit,
            total_rows,
            total_pages,
        }
    }
}

/// One page of rows plus its metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_rows: i64) -> Self {
        Self {
            items,
            meta: PageMeta::new(request, total_rows),
        }
    }
}

/// Turns an optional filter into an `ILIKE` pattern matching the prefix
pub fn prefix_pattern(filter: Option<&str>) -> Option<String> {
    filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| format!("{}%", escape_like(f)))
}

/// Turns an optional filter into an `ILIKE` pattern matching anywhere
pub fn contains_pattern(filter: Option<&str>) -> Option<String> {
    filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| format!("%{}%", escape_like(f)))
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
