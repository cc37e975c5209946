//! Statement construction
//!
//! Turns schemas, condition maps and queries into `QueryBuilder<MySql>`
//! statements. Values are always bound; identifiers are validated and
//! backtick-quoted before they are interpolated.

use sqlx::{MySql, QueryBuilder};

use super::filter::{ColumnMap, FilterCondition, FilterOperator, FilterValue, Query, RawPredicate};
use super::pagination::{is_valid_order_clause, PageParam};
use crate::naming::is_identifier;
use crate::schema::Schema;
use crate::soft_delete::SoftDelete;

pub(crate) type Builder = QueryBuilder<'static, MySql>;

/// A statement that cannot be built from the given input
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InvalidQuery(pub String);

fn quote(identifier: &str) -> Result<String, InvalidQuery> {
    if !is_identifier(identifier) {
        return Err(InvalidQuery(format!("invalid identifier `{}`", identifier)));
    }
    Ok(identifier
        .split('.')
        .map(|part| format!("`{}`", part))
        .collect::<Vec<_>>()
        .join("."))
}

fn is_empty_list(value: &FilterValue) -> bool {
    match value {
        FilterValue::StringList(list) => list.is_empty(),
        FilterValue::IntegerList(list) => list.is_empty(),
        FilterValue::UnsignedList(list) => list.is_empty(),
        _ => false,
    }
}

/// Bind one value; lists become `(?, ?, ...)` and an empty list `(NULL)`
fn push_value(qb: &mut Builder, value: &FilterValue) {
    match value {
        FilterValue::String(s) => {
            qb.push_bind(s.clone());
        }
        FilterValue::Integer(n) => {
            qb.push_bind(*n);
        }
        FilterValue::Unsigned(n) => {
            qb.push_bind(*n);
        }
        FilterValue::Float(n) => {
            qb.push_bind(*n);
        }
        FilterValue::Boolean(b) => {
            qb.push_bind(*b);
        }
        FilterValue::DateTime(dt) => {
            qb.push_bind(*dt);
        }
        FilterValue::StringList(list) if list.is_empty() => {
            qb.push("(NULL)");
        }
        FilterValue::IntegerList(list) if list.is_empty() => {
            qb.push("(NULL)");
        }
        FilterValue::UnsignedList(list) if list.is_empty() => {
            qb.push("(NULL)");
        }
        FilterValue::StringList(list) => {
            let mut separated = qb.separated(", ");
            separated.push_unseparated("(");
            for item in list {
                separated.push_bind(item.clone());
            }
            separated.push_unseparated(")");
        }
        FilterValue::IntegerList(list) => {
            let mut separated = qb.separated(", ");
            separated.push_unseparated("(");
            for item in list {
                separated.push_bind(*item);
            }
            separated.push_unseparated(")");
        }
        FilterValue::UnsignedList(list) => {
            let mut separated = qb.separated(", ");
            separated.push_unseparated("(");
            for item in list {
                separated.push_bind(*item);
            }
            separated.push_unseparated(")");
        }
        FilterValue::Null => {
            qb.push("NULL");
        }
    }
}

/// Render `column op value`
///
/// An empty column name or an empty IN list renders an always-false
/// predicate so the statement matches nothing.
fn push_predicate(
    qb: &mut Builder,
    column: &str,
    operator: FilterOperator,
    value: &FilterValue,
) -> Result<(), InvalidQuery> {
    if column.is_empty() {
        qb.push("1 = 0");
        return Ok(());
    }
    let col = quote(column)?;

    match (operator, value) {
        (FilterOperator::IsNull, _) | (FilterOperator::Equal, FilterValue::Null) => {
            qb.push(format!("{} IS NULL", col));
        }
        (FilterOperator::IsNotNull, _) | (FilterOperator::NotEqual, FilterValue::Null) => {
            qb.push(format!("{} IS NOT NULL", col));
        }
        (FilterOperator::Equal | FilterOperator::In, v) if v.is_list() => {
            if is_empty_list(v) {
                qb.push("1 = 0");
            } else {
                qb.push(format!("{} IN ", col));
                push_value(qb, v);
            }
        }
        (FilterOperator::NotEqual, v) if v.is_list() => {
            if is_empty_list(v) {
                qb.push("1 = 1");
            } else {
                qb.push(format!("{} NOT IN ", col));
                push_value(qb, v);
            }
        }
        (FilterOperator::In, v) => {
            qb.push(format!("{} IN (", col));
            push_value(qb, v);
            qb.push(")");
        }
        (op, FilterValue::Null) => {
            return Err(InvalidQuery(format!("operator {} on `{}` needs a value", op, column)));
        }
        (op, v) if v.is_list() => {
            return Err(InvalidQuery(format!(
                "operator {} on `{}` does not accept a list",
                op, column
            )));
        }
        (op, v) => {
            qb.push(format!("{} {} ", col, op));
            push_value(qb, v);
        }
    }
    Ok(())
}

/// Splice a raw predicate, expanding each `?` to its bound argument
fn push_raw(qb: &mut Builder, raw: &RawPredicate) -> Result<(), InvalidQuery> {
    let placeholders = raw.sql.matches('?').count();
    if placeholders != raw.args.len() {
        return Err(InvalidQuery(format!(
            "raw predicate `{}` has {} placeholders but {} arguments",
            raw.sql,
            placeholders,
            raw.args.len()
        )));
    }

    let mut pieces = raw.sql.split('?');
    qb.push("(");
    if let Some(first) = pieces.next() {
        qb.push(first);
    }
    for (piece, arg) in pieces.zip(raw.args.iter()) {
        push_value(qb, arg);
        qb.push(piece);
    }
    qb.push(")");
    Ok(())
}

struct Where {
    started: bool,
}

impl Where {
    fn new() -> Self {
        Self { started: false }
    }

    fn next(&mut self, qb: &mut Builder) {
        qb.push(if self.started { " AND " } else { " WHERE " });
        self.started = true;
    }
}

/// Append the WHERE clause, keys resolved to columns through `schema`
///
/// With `visible_only` soft-deleted rows are excluded.
fn push_where(
    qb: &mut Builder,
    schema: &Schema,
    query: &Query,
    visible_only: bool,
) -> Result<(), InvalidQuery> {
    let mut clause = Where::new();

    if visible_only {
        clause.next(qb);
        qb.push(format!("{} != ", quote(schema.soft_delete_column)?));
        qb.push_bind(SoftDelete::Deleted.value());
    }

    for (column, value) in schema.resolve(&query.equals).iter() {
        clause.next(qb);
        push_predicate(qb, column, FilterOperator::Equal, value)?;
    }

    for FilterCondition {
        field,
        operator,
        value,
    } in &query.conditions
    {
        clause.next(qb);
        push_predicate(qb, &schema.column_for(field), *operator, value)?;
    }

    for raw in query.raw.iter().filter(|r| !r.sql.trim().is_empty()) {
        clause.next(qb);
        push_raw(qb, raw)?;
    }

    Ok(())
}

/// `SELECT * ... [ORDER BY ..] [LIMIT .. OFFSET ..]` over visible rows
pub(crate) fn select(
    schema: &Schema,
    query: &Query,
    page: Option<&PageParam>,
) -> Result<Builder, InvalidQuery> {
    let mut qb = Builder::new(format!("SELECT * FROM {}", quote(schema.table)?));
    push_where(&mut qb, schema, query, true)?;

    if let Some(page) = page {
        if let Some(clause) = page.order_clause() {
            if !is_valid_order_clause(clause) {
                return Err(InvalidQuery(format!("invalid order clause `{}`", clause)));
            }
            qb.push(" ORDER BY ");
            qb.push(clause);
        }
        let pagination = page.pagination();
        qb.push(format!(
            " LIMIT {} OFFSET {}",
            pagination.limit, pagination.offset
        ));
    }

    Ok(qb)
}

/// `SELECT COUNT(*)` over visible rows
pub(crate) fn count(schema: &Schema, query: &Query) -> Result<Builder, InvalidQuery> {
    let mut qb = Builder::new(format!("SELECT COUNT(*) FROM {}", quote(schema.table)?));
    push_where(&mut qb, schema, query, true)?;
    Ok(qb)
}

/// Single-row INSERT of the given columns
pub(crate) fn insert(
    schema: &Schema,
    row: &[(String, FilterValue)],
) -> Result<Builder, InvalidQuery> {
    let columns: Vec<String> = row.iter().map(|(c, _)| c.clone()).collect();
    let mut qb = insert_head(schema, &columns)?;
    push_row(&mut qb, &columns, row);
    Ok(qb)
}

/// Multi-row INSERT; columns absent from a row are sent as DEFAULT
pub(crate) fn insert_many(
    schema: &Schema,
    rows: &[Vec<(String, FilterValue)>],
) -> Result<Builder, InvalidQuery> {
    let mut columns: Vec<String> = Vec::new();
    for (column, _) in rows.iter().flatten() {
        if !columns.contains(column) {
            columns.push(column.clone());
        }
    }

    let mut qb = insert_head(schema, &columns)?;
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_row(&mut qb, &columns, row);
    }
    Ok(qb)
}

fn insert_head(schema: &Schema, columns: &[String]) -> Result<Builder, InvalidQuery> {
    let quoted = columns
        .iter()
        .map(|c| quote(c))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Builder::new(format!(
        "INSERT INTO {} ({}) VALUES ",
        quote(schema.table)?,
        quoted.join(", ")
    )))
}

fn push_row(qb: &mut Builder, columns: &[String], row: &[(String, FilterValue)]) {
    qb.push("(");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        match row.iter().find(|(c, _)| c == column) {
            Some((_, value)) => push_value(qb, value),
            None => {
                qb.push("DEFAULT");
            }
        }
    }
    qb.push(")");
}

/// Physical DELETE; an empty condition is rejected
pub(crate) fn delete(schema: &Schema, condition: &ColumnMap) -> Result<Builder, InvalidQuery> {
    if condition.is_empty() {
        return Err(InvalidQuery("delete condition is empty".to_string()));
    }
    let mut qb = Builder::new(format!("DELETE FROM {}", quote(schema.table)?));
    push_where(&mut qb, schema, &Query::from(condition.clone()), false)?;
    Ok(qb)
}

/// UPDATE ... SET; empty conditions and empty assignments are rejected
pub(crate) fn update(
    schema: &Schema,
    condition: &ColumnMap,
    assignments: &ColumnMap,
) -> Result<Builder, InvalidQuery> {
    if condition.is_empty() {
        return Err(InvalidQuery("update condition is empty".to_string()));
    }
    if assignments.is_empty() {
        return Err(InvalidQuery("nothing to update".to_string()));
    }

    let mut qb = Builder::new(format!("UPDATE {} SET ", quote(schema.table)?));
    for (i, (column, value)) in assignments.iter().enumerate() {
        if value.is_list() {
            return Err(InvalidQuery(format!("cannot assign a list to `{}`", column)));
        }
        if i > 0 {
            qb.push(", ");
        }
        qb.push(format!("{} = ", quote(column)?));
        push_value(&mut qb, value);
    }
    push_where(&mut qb, schema, &Query::from(condition.clone()), false)?;
    Ok(qb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Schema {
        Schema {
            entity: "User",
            table: "users",
            primary_key: "id".to_string(),
            auto_time_columns: vec!["create_at".to_string(), "update_at".to_string()],
            soft_delete_column: "deleted",
            field_columns: vec![("signup_time".to_string(), "ctime".to_string())],
        }
    }

    #[test]
    fn test_select_all_excludes_soft_deleted() {
        let qb = select(&users(), &Query::new(), None).unwrap();
        assert_eq!(qb.sql(), "SELECT * FROM `users` WHERE `deleted` != ?");
    }

    #[test]
    fn test_select_by_map_keeps_zero_values() {
        let query = Query::from(ColumnMap::new().with("userName", "alice").with("age", 0_i64));
        let qb = select(&users(), &query, None).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT * FROM `users` WHERE `deleted` != ? AND `user_name` = ? AND `age` = ?"
        );
    }

    #[test]
    fn test_null_and_list_conditions() {
        let query = Query::new()
            .eq("removedAt", FilterValue::Null)
            .eq("id", vec![1_i64, 2, 3]);
        let qb = select(&users(), &query, None).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT * FROM `users` WHERE `deleted` != ? AND `removed_at` IS NULL AND `id` IN (?, ?, ?)"
        );
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let query = Query::new().eq("id", Vec::<i64>::new());
        let qb = select(&users(), &query, None).unwrap();
        assert_eq!(qb.sql(), "SELECT * FROM `users` WHERE `deleted` != ? AND 1 = 0");
    }

    #[test]
    fn test_empty_column_matches_nothing() {
        let qb = delete(&users(), &ColumnMap::new().with("", 5_i64)).unwrap();
        assert_eq!(qb.sql(), "DELETE FROM `users` WHERE 1 = 0");
    }

    #[test]
    fn test_operator_conditions() {
        let query = Query::new()
            .filter(FilterCondition::gte("loginCount", 3_i64))
            .filter(FilterCondition::like("email", "%@example.com"))
            .filter(FilterCondition::is_not_null("lastLogin"))
            .filter(FilterCondition::ne("status", vec!["banned"]));
        let qb = count(&users(), &query).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM `users` WHERE `deleted` != ? AND `login_count` >= ? \
             AND `email` LIKE ? AND `last_login` IS NOT NULL AND `status` NOT IN (?)"
        );
    }

    #[test]
    fn test_invalid_identifier_is_rejected() {
        let query = Query::new().eq("id = 1 OR 1", 1_i64);
        let Err(err) = select(&users(), &query, None) else {
            panic!("injected column name was accepted");
        };
        assert!(err.0.contains("invalid identifier"));
    }

    #[test]
    fn test_raw_predicate_expands_lists() {
        let query = Query::new()
            .eq("status", 1_i64)
            .raw("created_by IN ? AND score > ?", vec![vec![7_i64, 8].into(), 10_i64.into()]);
        let qb = select(&users(), &query, None).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT * FROM `users` WHERE `deleted` != ? AND `status` = ? \
             AND (created_by IN (?, ?) AND score > ?)"
        );
    }

    #[test]
    fn test_raw_placeholder_mismatch() {
        let query = Query::new().raw("a = ? AND b = ?", vec![1_i64.into()]);
        let Err(err) = select(&users(), &query, None) else {
            panic!("placeholder count mismatch was accepted");
        };
        assert!(err.0.contains("2 placeholders but 1 arguments"));
    }

    #[test]
    fn test_blank_raw_predicate_is_skipped() {
        let query = Query::new().raw("  ", vec![]);
        let qb = select(&users(), &query, None).unwrap();
        assert_eq!(qb.sql(), "SELECT * FROM `users` WHERE `deleted` != ?");
    }

    #[test]
    fn test_paged_select() {
        let page = PageParam::new(2, 10).order_by_raw("create_at desc, id");
        let qb = select(&users(), &Query::new(), Some(&page)).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT * FROM `users` WHERE `deleted` != ? ORDER BY create_at desc, id LIMIT 10 OFFSET 10"
        );
    }

    #[test]
    fn test_invalid_order_clause() {
        let page = PageParam::new(1, 10).order_by_raw("id; DELETE FROM users");
        assert!(select(&users(), &Query::new(), Some(&page)).is_err());
    }

    #[test]
    fn test_insert() {
        let row = vec![
            ("user_name".to_string(), FilterValue::from("alice")),
            ("age".to_string(), FilterValue::from(30_i64)),
        ];
        let qb = insert(&users(), &row).unwrap();
        assert_eq!(
            qb.sql(),
            "INSERT INTO `users` (`user_name`, `age`) VALUES (?, ?)"
        );
    }

    #[test]
    fn test_insert_many_fills_missing_with_default() {
        let rows = vec![
            vec![("user_name".to_string(), FilterValue::from("a"))],
            vec![
                ("user_name".to_string(), FilterValue::from("b")),
                ("deleted".to_string(), FilterValue::from(1_i64)),
            ],
        ];
        let qb = insert_many(&users(), &rows).unwrap();
        assert_eq!(
            qb.sql(),
            "INSERT INTO `users` (`user_name`, `deleted`) VALUES (?, DEFAULT), (?, ?)"
        );
    }

    #[test]
    fn test_update() {
        let condition = ColumnMap::new().with("id", 9_u64);
        let assignments = ColumnMap::new()
            .with("user_name", "bob")
            .with("nickname", FilterValue::Null);
        let qb = update(&users(), &condition, &assignments).unwrap();
        assert_eq!(
            qb.sql(),
            "UPDATE `users` SET `user_name` = ?, `nickname` = NULL WHERE `id` = ?"
        );
    }

    #[test]
    fn test_unconditional_writes_are_rejected() {
        let assignments = ColumnMap::new().with("user_name", "bob");
        assert!(update(&users(), &ColumnMap::new(), &assignments).is_err());
        assert!(delete(&users(), &ColumnMap::new()).is_err());
    }

    #[test]
    fn test_list_assignment_is_rejected() {
        let condition = ColumnMap::new().with("id", 9_u64);
        let assignments = ColumnMap::new().with("tags", vec!["a", "b"]);
        let Err(err) = update(&users(), &condition, &assignments) else {
            panic!("list assignment was accepted");
        };
        assert!(err.0.contains("cannot assign a list"));
    }

    #[test]
    fn test_unsigned_list_condition() {
        let query = Query::new().eq("id", vec![1_u64, u64::MAX]);
        let qb = select(&users(), &query, None).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT * FROM `users` WHERE `deleted` != ? AND `id` IN (?, ?)"
        );

        let empty = Query::new().eq("id", Vec::<u64>::new());
        let qb = count(&users(), &empty).unwrap();
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM `users` WHERE `deleted` != ? AND 1 = 0");
    }

    #[test]
    fn test_conditions_use_declared_columns() {
        let query = Query::new()
            .eq("SignupTime", FilterValue::Null)
            .filter(FilterCondition::gte("signupTime", 5_i64));
        let qb = select(&users(), &query, None).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT * FROM `users` WHERE `deleted` != ? AND `ctime` IS NULL AND `ctime` >= ?"
        );

        let qb = delete(&users(), &ColumnMap::new().with("signup_time", 1_i64)).unwrap();
        assert_eq!(qb.sql(), "DELETE FROM `users` WHERE `ctime` = ?");
    }
}
