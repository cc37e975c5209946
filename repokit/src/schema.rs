//! Record metadata
//!
//! A [`Record`] describes how a Rust struct maps onto a table: its table name,
//! a static list of field definitions and a way to read the current field
//! values. Field definitions may embed other definition lists, which is how a
//! shared [`BaseInfo`](crate::soft_delete::BaseInfo) block is reused across
//! records.
//!
//! # Example
//!
//! ```rust
//! use repokit::prelude::*;
//!
//! #[derive(Debug, Clone, Default, sqlx::FromRow)]
//! struct User {
//!     id: u64,
//!     user_name: String,
//!     #[sqlx(flatten)]
//!     base: BaseInfo,
//! }
//!
//! impl Record for User {
//!     fn table_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn fields() -> &'static [FieldDef] {
//!         const FIELDS: &[FieldDef] = &[
//!             FieldDef::Column(Column::new("ID").primary_key()),
//!             FieldDef::Column(Column::new("UserName")),
//!             FieldDef::Embedded(BaseInfo::FIELDS),
//!         ];
//!         FIELDS
//!     }
//!
//!     fn values(&self) -> Vec<(&'static str, FilterValue)> {
//!         let mut values = vec![
//!             ("id", self.id.into()),
//!             ("user_name", self.user_name.clone().into()),
//!         ];
//!         values.extend(self.base.values());
//!         values
//!     }
//!
//!     fn set_last_insert_id(&mut self, id: u64) {
//!         self.id = id;
//!     }
//! }
//!
//! let schema = Schema::of::<User>();
//! assert_eq!(schema.primary_key, "id");
//! assert_eq!(schema.auto_time_columns, vec!["create_at", "update_at"]);
//! ```

use std::fmt;

use crate::naming::camel_to_snake;
use crate::repository::{ColumnMap, FilterValue};

/// One persisted field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Field name as written on the struct (any case)
    pub field: &'static str,
    /// Explicit column name, overriding the derived one
    pub column: Option<&'static str>,
    /// Marked as the primary key
    pub primary_key: bool,
    /// Filled by the database on insert
    pub auto_create_time: bool,
    /// Filled by the database on insert and update
    pub auto_update_time: bool,
}

impl Column {
    /// Describe a field; its column name is derived with [`camel_to_snake`]
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            column: None,
            primary_key: false,
            auto_create_time: false,
            auto_update_time: false,
        }
    }

    /// Use an explicit column name
    pub const fn with_column(self, column: &'static str) -> Self {
        Self {
            column: Some(column),
            ..self
        }
    }

    /// Mark as primary key
    pub const fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }

    /// Mark as database-managed creation time
    pub const fn auto_create_time(self) -> Self {
        Self {
            auto_create_time: true,
            ..self
        }
    }

    /// Mark as database-managed update time
    pub const fn auto_update_time(self) -> Self {
        Self {
            auto_update_time: true,
            ..self
        }
    }

    /// Column name in the database
    pub fn column_name(&self) -> String {
        match self.column {
            Some(name) => name.to_string(),
            None => camel_to_snake(self.field),
        }
    }

    /// Whether the database owns this column's value
    pub fn is_auto_time(&self) -> bool {
        self.auto_create_time || self.auto_update_time
    }
}

/// A field definition: a column or an embedded group of definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDef {
    /// A single column
    Column(Column),
    /// Fields of an embedded struct, searched recursively
    Embedded(&'static [FieldDef]),
}

/// A struct persisted through [`BaseRepo`](crate::repository::BaseRepo)
pub trait Record: Send + Sync + Unpin + fmt::Debug + 'static {
    /// Table the record lives in
    fn table_name() -> &'static str;

    /// Static field definitions
    fn fields() -> &'static [FieldDef];

    /// Current field values keyed by field or column name
    ///
    /// Keys are resolved with [`Schema::column_for`] before use.
    fn values(&self) -> Vec<(&'static str, FilterValue)>;

    /// Name used in logs and error messages
    fn entity_name() -> &'static str {
        short_type_name::<Self>()
    }

    /// Column holding the soft-delete flag
    fn soft_delete_column() -> &'static str {
        "deleted"
    }

    /// Receive the generated key after an insert
    fn set_last_insert_id(&mut self, _id: u64) {}
}

/// Resolved metadata for one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Entity name for logs and errors
    pub entity: &'static str,
    /// Table name
    pub table: &'static str,
    /// Primary key column, empty when none could be resolved
    pub primary_key: String,
    /// Columns whose values the database manages
    pub auto_time_columns: Vec<String>,
    /// Soft-delete flag column
    pub soft_delete_column: &'static str,
    /// Snake-cased field name paired with its column, for fields whose
    /// column name differs
    pub field_columns: Vec<(String, String)>,
}

impl Schema {
    /// Resolve the metadata of `T`
    pub fn of<T: Record>() -> Self {
        let fields = T::fields();
        Self {
            entity: T::entity_name(),
            table: T::table_name(),
            primary_key: resolve_primary_key(fields),
            auto_time_columns: auto_time_columns(fields),
            soft_delete_column: T::soft_delete_column(),
            field_columns: field_columns(fields),
        }
    }

    /// Whether `column` is database-managed
    pub fn is_auto_time(&self, column: &str) -> bool {
        self.auto_time_columns.iter().any(|c| c == column)
    }

    /// Column addressed by a caller-supplied key
    ///
    /// The key is snake-cased first. A key naming a field with an explicit
    /// column resolves to that column; anything else is taken as a column.
    pub fn column_for(&self, key: &str) -> String {
        let normalized = camel_to_snake(key);
        self.field_columns
            .iter()
            .find(|(field, _)| *field == normalized)
            .map(|(_, column)| column.clone())
            .unwrap_or(normalized)
    }

    /// Re-key a map by column; on duplicate columns the later entry wins
    pub fn resolve(&self, map: &ColumnMap) -> ColumnMap {
        map.iter()
            .map(|(key, value)| (self.column_for(key), value.clone()))
            .collect()
    }
}

/// Find the primary key column
///
/// An explicitly marked column wins, searching depth-first through embedded
/// groups. Failing that, any column named `id` at any depth gives `"id"`.
/// Returns an empty string when neither exists.
pub fn resolve_primary_key(fields: &[FieldDef]) -> String {
    if let Some(column) = find_marked_primary_key(fields) {
        return column;
    }
    if has_id_column(fields) {
        return "id".to_string();
    }
    String::new()
}

fn find_marked_primary_key(fields: &[FieldDef]) -> Option<String> {
    for field in fields {
        match field {
            FieldDef::Embedded(inner) => {
                if let Some(column) = find_marked_primary_key(inner) {
                    return Some(column);
                }
            }
            FieldDef::Column(column) if column.primary_key => {
                return Some(column.column_name());
            }
            FieldDef::Column(_) => {}
        }
    }
    None
}

fn has_id_column(fields: &[FieldDef]) -> bool {
    fields.iter().any(|field| match field {
        FieldDef::Embedded(inner) => has_id_column(inner),
        FieldDef::Column(column) => column.column_name() == "id",
    })
}

/// Column names of every auto-managed time field, embedded ones included
pub fn auto_time_columns(fields: &[FieldDef]) -> Vec<String> {
    columns(fields)
        .into_iter()
        .filter(Column::is_auto_time)
        .map(|c| c.column_name())
        .collect()
}

/// Field-to-column pairs for columns declared under another name
pub fn field_columns(fields: &[FieldDef]) -> Vec<(String, String)> {
    columns(fields)
        .into_iter()
        .filter_map(|c| {
            let field = camel_to_snake(c.field);
            let column = c.column_name();
            (field != column).then_some((field, column))
        })
        .collect()
}

/// Flatten the definitions into their columns, in declaration order
pub fn columns(fields: &[FieldDef]) -> Vec<Column> {
    let mut out = Vec::new();
    for field in fields {
        match field {
            FieldDef::Column(column) => out.push(*column),
            FieldDef::Embedded(inner) => out.extend(columns(inner)),
        }
    }
    out
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soft_delete::BaseInfo;

    const AUDIT: &[FieldDef] = &[
        FieldDef::Column(Column::new("Code").primary_key()),
        FieldDef::Column(Column::new("Operator")),
    ];

    #[derive(Debug)]
    struct Ledger;

    impl Record for Ledger {
        fn table_name() -> &'static str {
            "ledgers"
        }

        fn fields() -> &'static [FieldDef] {
            const FIELDS: &[FieldDef] = &[
                FieldDef::Column(Column::new("ID")),
                FieldDef::Embedded(AUDIT),
                FieldDef::Embedded(BaseInfo::FIELDS),
            ];
            FIELDS
        }

        fn values(&self) -> Vec<(&'static str, FilterValue)> {
            Vec::new()
        }
    }

    #[test]
    fn test_column_name_derivation() {
        assert_eq!(Column::new("UserName").column_name(), "user_name");
        assert_eq!(Column::new("ID").column_name(), "id");
        assert_eq!(
            Column::new("Name").with_column("display_name").column_name(),
            "display_name"
        );
    }

    #[test]
    fn test_embedded_marked_key_beats_outer_id() {
        let fields = [
            FieldDef::Column(Column::new("ID")),
            FieldDef::Embedded(AUDIT),
        ];
        assert_eq!(resolve_primary_key(&fields), "code");
    }

    #[test]
    fn test_outer_marked_key_wins() {
        let fields = [
            FieldDef::Column(Column::new("Serial").primary_key()),
            FieldDef::Column(Column::new("ID")),
        ];
        assert_eq!(resolve_primary_key(&fields), "serial");
    }

    #[test]
    fn test_id_fallback() {
        let fields = [
            FieldDef::Column(Column::new("Name")),
            FieldDef::Column(Column::new("ID")),
        ];
        assert_eq!(resolve_primary_key(&fields), "id");
    }

    #[test]
    fn test_nested_id_fallback() {
        const INNER: &[FieldDef] = &[FieldDef::Column(Column::new("Id"))];
        let fields = [
            FieldDef::Column(Column::new("Name")),
            FieldDef::Embedded(INNER),
        ];
        assert_eq!(resolve_primary_key(&fields), "id");
    }

    #[test]
    fn test_no_primary_key() {
        let fields = [
            FieldDef::Column(Column::new("Name")),
            FieldDef::Embedded(BaseInfo::FIELDS),
        ];
        assert_eq!(resolve_primary_key(&fields), "");
    }

    #[test]
    fn test_auto_time_columns_include_embedded() {
        let fields = [
            FieldDef::Column(Column::new("ID")),
            FieldDef::Column(Column::new("PublishedAt").auto_create_time()),
            FieldDef::Embedded(BaseInfo::FIELDS),
        ];
        assert_eq!(
            auto_time_columns(&fields),
            vec!["published_at", "create_at", "update_at"]
        );
    }

    #[test]
    fn test_columns_flatten_in_order() {
        let names: Vec<_> = columns(Ledger::fields())
            .iter()
            .map(Column::column_name)
            .collect();
        assert_eq!(
            names,
            vec!["id", "code", "operator", "create_at", "update_at", "deleted"]
        );
    }

    #[test]
    fn test_schema_of_record() {
        let schema = Schema::of::<Ledger>();
        assert_eq!(schema.entity, "Ledger");
        assert_eq!(schema.table, "ledgers");
        assert_eq!(schema.primary_key, "code");
        assert_eq!(schema.soft_delete_column, "deleted");
        assert!(schema.is_auto_time("update_at"));
        assert!(!schema.is_auto_time("deleted"));
        assert!(schema.field_columns.is_empty());
    }

    #[test]
    fn test_column_for_follows_overrides() {
        const STAMPED: &[FieldDef] = &[FieldDef::Column(
            Column::new("CreatedTime").with_column("ctime").auto_create_time(),
        )];
        let fields = [
            FieldDef::Column(Column::new("ID").primary_key()),
            FieldDef::Column(Column::new("Name").with_column("display_name")),
            FieldDef::Embedded(STAMPED),
        ];
        let pairs = field_columns(&fields);
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), "display_name".to_string()),
                ("created_time".to_string(), "ctime".to_string()),
            ]
        );

        let schema = Schema {
            entity: "Event",
            table: "events",
            primary_key: resolve_primary_key(&fields),
            auto_time_columns: auto_time_columns(&fields),
            soft_delete_column: "deleted",
            field_columns: pairs,
        };
        assert_eq!(schema.column_for("CreatedTime"), "ctime");
        assert_eq!(schema.column_for("createdTime"), "ctime");
        assert_eq!(schema.column_for("ctime"), "ctime");
        assert_eq!(schema.column_for("Name"), "display_name");
        assert_eq!(schema.column_for("userId"), "user_id");
        assert!(schema.is_auto_time(&schema.column_for("CreatedTime")));

        let resolved = schema.resolve(
            &ColumnMap::new()
                .with("name", "a")
                .with("display_name", "b")
                .with("ID", 3_i64),
        );
        let keys: Vec<_> = resolved.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["display_name", "id"]);
        assert_eq!(resolved.get("display_name"), Some(&FilterValue::from("b")));
    }
}
