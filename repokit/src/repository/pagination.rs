//! Page parameters and paged results
//!
//! # Example
//!
//! ```rust
//! use repokit::repository::{OrderDirection, PageParam};
//!
//! let page = PageParam::new(2, 10).order_by("create_at", OrderDirection::Descending);
//! assert_eq!(page.pagination().offset, 10);
//! assert_eq!(page.order_clause(), Some("create_at desc"));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::naming::is_identifier;

/// Direction for ordering results
///
/// # Example
///
/// ```rust
/// use repokit::repository::OrderDirection;
///
/// assert_eq!(format!("{}", OrderDirection::Ascending), "asc");
/// assert_eq!(format!("{}", OrderDirection::Descending), "desc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    #[serde(rename = "asc", alias = "ascending")]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    #[serde(rename = "desc", alias = "descending")]
    Descending,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Offset and limit for one query
///
/// # Example
///
/// ```rust
/// use repokit::repository::Pagination;
///
/// let page3 = Pagination::page(3, 20);
/// assert_eq!(page3.offset, 40);
/// assert_eq!(page3.limit, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create new pagination parameters
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Pagination for a 1-indexed page number; page 0 is treated as page 1
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let offset = page_number.saturating_sub(1).saturating_mul(page_size);
        Self {
            offset,
            limit: page_size,
        }
    }
}

/// Caller-facing page request
///
/// `order_by` is a raw ORDER BY clause such as `"create_at desc, id"`; it is
/// checked to contain only column names and directions before use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParam {
    /// 1-indexed page number
    pub page_no: u64,
    /// Rows per page
    pub page_size: u64,
    /// ORDER BY clause, empty for none
    #[serde(default)]
    pub order_by: String,
}

impl PageParam {
    /// Request a page with no ordering
    pub fn new(page_no: u64, page_size: u64) -> Self {
        Self {
            page_no,
            page_size,
            order_by: String::new(),
        }
    }

    /// Append an ordering term
    #[must_use]
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        if !self.order_by.is_empty() {
            self.order_by.push_str(", ");
        }
        self.order_by.push_str(&format!("{} {}", column, direction));
        self
    }

    /// Replace the ordering with a raw clause
    #[must_use]
    pub fn order_by_raw(mut self, clause: impl Into<String>) -> Self {
        self.order_by = clause.into();
        self
    }

    /// Offset and limit for this page
    pub fn pagination(&self) -> Pagination {
        Pagination::page(self.page_no, self.page_size)
    }

    /// Trimmed ORDER BY clause, `None` when empty
    pub fn order_clause(&self) -> Option<&str> {
        let clause = self.order_by.trim();
        (!clause.is_empty()).then_some(clause)
    }
}

/// One page of records and the total number of matching rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    /// Rows of the requested page
    pub records: Vec<T>,
    /// Total matching rows across all pages
    pub total: u64,
}

impl<T> Paged<T> {
    /// Number of pages for the given page size
    pub fn page_count(&self, page_size: u64) -> u64 {
        if page_size == 0 {
            return 0;
        }
        self.total.div_ceil(page_size)
    }
}

/// Check that an ORDER BY clause holds only `column [asc|desc]` terms
pub fn is_valid_order_clause(clause: &str) -> bool {
    clause.split(',').all(|term| {
        let mut parts = term.split_whitespace();
        let column_ok = parts.next().is_some_and(is_identifier);
        let direction_ok = parts.next().map_or(true, |d| {
            d.eq_ignore_ascii_case("asc") || d.eq_ignore_ascii_case("desc")
        });
        column_ok && direction_ok && parts.next().is_none()
    })
}
