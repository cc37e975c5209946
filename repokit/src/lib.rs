//! # repokit
//!
//! Generic data-access layer for MySQL-backed services.
//!
//! ## Features
//!
//! - **Generic repository**: CRUD, soft delete, map updates and pagination for any [`Record`](schema::Record)
//! - **Transaction scopes**: one context value threads a transaction through nested calls
//! - **Connection pooling**: MySQL (sqlx) and Redis (deadpool-redis) with retry on startup
//! - **Distributed locks**: token-guarded Redis locks with release and extend
//! - **Configuration**: figment layering of defaults, TOML files and `REPOKIT_` environment variables
//! - **Structured logging**: JSON tracing subscriber driven by the configured log level
//!
//! ## Example
//!
//! ```rust,no_run
//! use repokit::prelude::*;
//!
//! # #[derive(Debug, Clone, Default, sqlx::FromRow)]
//! # struct User { id: u64, user_name: String, #[sqlx(flatten)] base: BaseInfo }
//! # impl Record for User {
//! #     fn table_name() -> &'static str { "users" }
//! #     fn fields() -> &'static [FieldDef] {
//! #         const FIELDS: &[FieldDef] = &[
//! #             FieldDef::Column(Column::new("ID").primary_key()),
//! #             FieldDef::Column(Column::new("UserName")),
//! #             FieldDef::Embedded(BaseInfo::FIELDS),
//! #         ];
//! #         FIELDS
//! #     }
//! #     fn values(&self) -> Vec<(&'static str, FilterValue)> {
//! #         let mut v = vec![("id", self.id.into()), ("user_name", self.user_name.clone().into())];
//! #         v.extend(self.base.values());
//! #         v
//! #     }
//! #     fn set_last_insert_id(&mut self, id: u64) { self.id = id; }
//! # }
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!
//!     let ds = DataSource::builder().config(config).build().await?;
//!     let users = ds.repository::<User>();
//!     let ctx = DbContext::new();
//!
//!     let mut alice = User {
//!         user_name: "alice".to_string(),
//!         ..User::default()
//!     };
//!     users.insert(&ctx, &mut alice).await?;
//!
//!     let page = users
//!         .list_page(
//!             &ctx,
//!             &Query::new().eq("user_name", "alice"),
//!             Some(&PageParam::new(1, 20).order_by("id", OrderDirection::Descending)),
//!         )
//!         .await?;
//!     println!("{} of {}", page.records.len(), page.total);
//!
//!     ds.close().await;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "cache")]
pub mod cache;
pub mod config;
pub mod data;
pub mod database;
pub mod error;
#[cfg(feature = "cache")]
pub mod lock;
pub mod naming;
pub mod observability;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod soft_delete;
pub mod transaction;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, LockConfig, RedisConfig, RegistryConfig};
    pub use crate::data::{DataSource, DataSourceBuilder};
    pub use crate::error::{DatabaseError, DatabaseErrorKind, DatabaseOperation, Error, Result};
    pub use crate::observability::init_tracing;
    pub use crate::registry::{Discovery, ServiceInstance, StaticDiscovery};
    pub use crate::repository::{
        BaseRepo, ColumnMap, FilterCondition, FilterOperator, FilterValue, OrderDirection,
        PageParam, Paged, Query, RepositoryError, RepositoryErrorKind, RepositoryOperation,
        RepositoryResult,
    };
    pub use crate::schema::{Column, FieldDef, Record, Schema};
    pub use crate::soft_delete::{BaseInfo, SoftDelete};
    pub use crate::transaction::{run_in_transaction, DbContext, Transactional};

    #[cfg(feature = "cache")]
    pub use crate::cache::RedisPool;

    #[cfg(feature = "cache")]
    pub use crate::lock::{LockGuard, LockManager};

    pub use async_trait::async_trait;
    pub use chrono::NaiveDateTime;
    pub use tokio;
    pub use tracing::{debug, error, info, instrument, warn};
}
