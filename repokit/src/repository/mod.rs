//! Generic repository layer
//!
//! [`BaseRepo`] provides create, read, update and delete operations for any
//! [`Record`](crate::schema::Record) on a MySQL pool:
//!
//! - **Writes**: single and batched inserts, updates by record, primary key
//!   or condition map, physical and soft deletes
//! - **Reads**: probe-record and condition-map selects that always exclude
//!   soft-deleted rows, single-row reads that reject ambiguous matches
//! - **Pagination**: [`PageParam`] / [`Paged`] listings with a total count
//! - **Transactions**: every operation takes a
//!   [`DbContext`](crate::transaction::DbContext) and joins its transaction
//!
//! # Example
//!
//! ```rust,ignore
//! use repokit::prelude::*;
//!
//! let users: BaseRepo<User> = ds.repository();
//! let ctx = DbContext::new();
//!
//! let mut alice = User { user_name: "alice".into(), ..Default::default() };
//! users.insert(&ctx, &mut alice).await?;
//!
//! let page = users
//!     .list_page(&ctx, &Query::new().eq("status", 1), Some(&PageParam::new(1, 20)))
//!     .await?;
//! println!("{} of {}", page.records.len(), page.total);
//! ```

mod base;
mod error;
mod filter;
mod pagination;
mod sql;

pub use base::BaseRepo;
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use filter::{ColumnMap, FilterCondition, FilterOperator, FilterValue, Query, RawPredicate};
pub use pagination::{is_valid_order_clause, OrderDirection, PageParam, Paged, Pagination};

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;
