//! Condition maps, filter values and pre-built queries
//!
//! [`ColumnMap`] is the typed replacement for a string-keyed condition or update
//! map: an ordered list of `(key, value)` pairs whose keys may be written in
//! camelCase or snake_case. [`Query`] combines equality conditions, operator
//! conditions and raw SQL fragments for paginated listings.
//!
//! # Example
//!
//! ```rust
//! use repokit::repository::{ColumnMap, FilterCondition, FilterValue, Query};
//!
//! // Zero values are real conditions here, unlike record-based filtering
//! let condition = ColumnMap::new()
//!     .with("userName", "alice")
//!     .with("age", 0_i64);
//!
//! let query = Query::from(condition)
//!     .filter(FilterCondition::gte("score", 10_i64))
//!     .raw("created_by IN ?", vec![FilterValue::from(vec![1_i64, 2, 3])]);
//! ```

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;

/// Comparison operators for filter conditions
///
/// # Example
///
/// ```rust
/// use repokit::repository::FilterOperator;
///
/// assert_eq!(format!("{}", FilterOperator::Equal), "=");
/// assert_eq!(format!("{}", FilterOperator::Like), "LIKE");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Pattern matching (LIKE)
    Like,
    /// Value is in a list (IN)
    In,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
            Self::In => write!(f, "IN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// A value that can be bound into a condition, an assignment or an insert
///
/// # Example
///
/// ```rust
/// use repokit::repository::FilterValue;
///
/// let string_val: FilterValue = "active".into();
/// let int_val: FilterValue = 42_i64.into();
/// let missing: FilterValue = Option::<i64>::None.into();
/// assert!(missing.is_zero());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// Signed integer value
    Integer(i64),
    /// Unsigned integer value (`BIGINT UNSIGNED` keys)
    Unsigned(u64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Date and time without zone (`DATETIME` / `TIMESTAMP`)
    DateTime(NaiveDateTime),
    /// List of string values (rendered as IN)
    StringList(Vec<String>),
    /// List of integer values (rendered as IN)
    IntegerList(Vec<i64>),
    /// List of unsigned values (rendered as IN)
    UnsignedList(Vec<u64>),
    /// SQL NULL
    Null,
}

impl FilterValue {
    /// Whether this is the zero value of its type
    ///
    /// Record-based filtering and updates skip zero values; map-based
    /// operations keep them.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::Integer(n) => *n == 0,
            Self::Unsigned(n) => *n == 0,
            Self::Float(n) => *n == 0.0,
            Self::Boolean(b) => !*b,
            Self::DateTime(dt) => *dt == NaiveDateTime::default(),
            Self::StringList(list) => list.is_empty(),
            Self::IntegerList(list) => list.is_empty(),
            Self::UnsignedList(list) => list.is_empty(),
            Self::Null => true,
        }
    }

    /// Whether this value is a list
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Self::StringList(_) | Self::IntegerList(_) | Self::UnsignedList(_)
        )
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for FilterValue {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<i8> for FilterValue {
    fn from(n: i8) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<u64> for FilterValue {
    fn from(n: u64) -> Self {
        Self::Unsigned(n)
    }
}

impl From<u32> for FilterValue {
    fn from(n: u32) -> Self {
        Self::Unsigned(u64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<NaiveDateTime> for FilterValue {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(list: Vec<String>) -> Self {
        Self::StringList(list)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(list: Vec<&str>) -> Self {
        Self::StringList(list.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(list: Vec<i64>) -> Self {
        Self::IntegerList(list)
    }
}

impl From<Vec<u64>> for FilterValue {
    fn from(list: Vec<u64>) -> Self {
        Self::UnsignedList(list)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A single operator condition
///
/// # Example
///
/// ```rust
/// use repokit::repository::FilterCondition;
///
/// let age_filter = FilterCondition::gte("age", 18_i64);
/// let name_filter = FilterCondition::like("name", "%smith%");
/// let deleted_filter = FilterCondition::is_null("removed_at");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The field name to filter on (camelCase or snake_case)
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter (field = value)
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value.into())
    }

    /// Create a not-equal filter (field != value)
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::NotEqual, value.into())
    }

    /// Create a greater-than filter (field > value)
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value.into())
    }

    /// Create a greater-than-or-equal filter (field >= value)
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value.into())
    }

    /// Create a less-than filter (field < value)
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, value.into())
    }

    /// Create a less-than-or-equal filter (field <= value)
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value.into())
    }

    /// Create a LIKE pattern filter
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Like, FilterValue::String(pattern.into()))
    }

    /// Create an IN list filter
    pub fn is_in(field: impl Into<String>, values: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::In, values.into())
    }

    /// Create an IS NULL filter
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, FilterValue::Null)
    }

    /// Create an IS NOT NULL filter
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, FilterValue::Null)
    }
}

/// Ordered key/value map used for equality conditions and update data
///
/// Inserting an existing key replaces its value in place. Keys are kept as
/// given; the repository resolves them to columns with
/// [`Schema::resolve`](crate::schema::Schema::resolve).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    entries: Vec<(String, FilterValue)>,
}

impl ColumnMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the previous value for the key
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Option<FilterValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Get the value for a key
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Whether the map holds the key
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keep only the entries for which `f` returns true
    pub fn retain(&mut self, mut f: impl FnMut(&str, &FilterValue) -> bool) {
        self.entries.retain(|(k, v)| f(k, v));
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for ColumnMap
where
    K: Into<String>,
    V: Into<FilterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ColumnMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl From<HashMap<String, FilterValue>> for ColumnMap {
    /// Keys are sorted so the generated SQL is stable
    fn from(map: HashMap<String, FilterValue>) -> Self {
        let mut entries: Vec<_> = map.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().collect()
    }
}

impl IntoIterator for ColumnMap {
    type Item = (String, FilterValue);
    type IntoIter = std::vec::IntoIter<(String, FilterValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A raw SQL predicate with `?` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct RawPredicate {
    /// SQL text, one `?` per argument
    pub sql: String,
    /// Bound arguments; list values expand to `(?, ?, ...)`
    pub args: Vec<FilterValue>,
}

/// A pre-built query for paginated listings
///
/// All parts are joined with `AND`. The repository adds the soft-delete
/// predicate itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub(crate) equals: ColumnMap,
    pub(crate) conditions: Vec<FilterCondition>,
    pub(crate) raw: Vec<RawPredicate>,
}

impl Query {
    /// Create a query matching every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition
    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.equals.insert(key, value);
        self
    }

    /// Add an operator condition
    #[must_use]
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a raw predicate with `?` placeholders
    #[must_use]
    pub fn raw(mut self, sql: impl Into<String>, args: Vec<FilterValue>) -> Self {
        self.raw.push(RawPredicate {
            sql: sql.into(),
            args,
        });
        self
    }

    /// Equality conditions of this query
    pub fn equals(&self) -> &ColumnMap {
        &self.equals
    }

    /// Whether the query carries no predicate at all
    pub fn is_unfiltered(&self) -> bool {
        self.equals.is_empty() && self.conditions.is_empty() && self.raw.is_empty()
    }
}

impl From<ColumnMap> for Query {
    fn from(equals: ColumnMap) -> Self {
        Self {
            equals,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_operator_display() {
        assert_eq!(format!("{}", FilterOperator::Equal), "=");
        assert_eq!(format!("{}", FilterOperator::NotEqual), "!=");
        assert_eq!(format!("{}", FilterOperator::GreaterThanOrEqual), ">=");
        assert_eq!(format!("{}", FilterOperator::In), "IN");
        assert_eq!(format!("{}", FilterOperator::IsNotNull), "IS NOT NULL");
    }

    #[test]
    fn test_zero_values() {
        assert!(FilterValue::from("").is_zero());
        assert!(FilterValue::from(0_i64).is_zero());
        assert!(FilterValue::from(0_u64).is_zero());
        assert!(FilterValue::from(false).is_zero());
        assert!(FilterValue::from(Option::<String>::None).is_zero());
        assert!(FilterValue::from(NaiveDateTime::default()).is_zero());
        assert!(!FilterValue::from("x").is_zero());
        assert!(!FilterValue::from(-1_i64).is_zero());
        assert!(!FilterValue::from(true).is_zero());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(FilterValue::from(Some(5_i64)), FilterValue::Integer(5));
        assert_eq!(FilterValue::from(Option::<i64>::None), FilterValue::Null);
    }

    #[test]
    fn test_list_values() {
        let value: FilterValue = vec!["a", "b"].into();
        assert_eq!(
            value,
            FilterValue::StringList(vec!["a".to_string(), "b".to_string()])
        );
        assert!(value.is_list());
        assert!(!FilterValue::from(1_i64).is_list());
    }

    #[test]
    fn test_unsigned_list() {
        let ids: FilterValue = vec![7_u64, u64::MAX].into();
        assert_eq!(ids, FilterValue::UnsignedList(vec![7, u64::MAX]));
        assert!(ids.is_list());
        assert!(!ids.is_zero());
        assert!(FilterValue::from(Vec::<u64>::new()).is_zero());
    }

    #[test]
    fn test_column_map_insert_replaces() {
        let mut map = ColumnMap::new().with("name", "a").with("age", 3_i64);
        let previous = map.insert("name", "b");
        assert_eq!(previous, Some(FilterValue::from("a")));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("name"), Some(&FilterValue::from("b")));
    }

    #[test]
    fn test_column_map_remove() {
        let mut map = ColumnMap::new().with("name", "a").with("age", 3_i64);
        assert_eq!(map.remove("age"), Some(FilterValue::Integer(3)));
        assert!(!map.contains_key("age"));
        assert_eq!(map.remove("age"), None);
    }

    #[test]
    fn test_from_hash_map_is_sorted() {
        let mut raw = HashMap::new();
        raw.insert("b".to_string(), FilterValue::from(2_i64));
        raw.insert("a".to_string(), FilterValue::from(1_i64));
        let map = ColumnMap::from(raw);
        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new()
            .eq("status", 1_i64)
            .filter(FilterCondition::gt("age", 18_i64))
            .raw("name LIKE ?", vec!["a%".into()]);
        assert_eq!(query.equals().len(), 1);
        assert_eq!(query.conditions.len(), 1);
        assert_eq!(query.raw.len(), 1);
        assert!(!query.is_unfiltered());
        assert!(Query::new().is_unfiltered());
    }
}
