//! Soft-delete flag and the shared bookkeeping columns
//!
//! Rows are never hidden by removing them; the `deleted` column is set to
//! [`SoftDelete::Deleted`] instead and every read excludes those rows.

use chrono::NaiveDateTime;

use crate::repository::FilterValue;
use crate::schema::{Column, FieldDef};

/// Soft-delete state stored as a `TINYINT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[repr(i8)]
pub enum SoftDelete {
    /// Visible row
    #[default]
    Normal = 1,
    /// Soft-deleted row
    Deleted = 2,
}

impl SoftDelete {
    /// Stored value
    pub const fn value(self) -> i8 {
        self as i8
    }
}

impl From<SoftDelete> for FilterValue {
    fn from(flag: SoftDelete) -> Self {
        FilterValue::Integer(i64::from(flag.value()))
    }
}

/// Creation time, update time and soft-delete flag
///
/// Embed it in a record with `#[sqlx(flatten)]` and list
/// [`BaseInfo::FIELDS`] as an embedded field group. The time columns are
/// database-managed: inserts leave them out when unset and updates never
/// write them.
///
/// `deleted` is `None` until the row has been read, so probe records do not
/// filter on it and inserts fall back to the column default.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct BaseInfo {
    /// Set by the database on insert
    pub create_at: Option<NaiveDateTime>,
    /// Set by the database on insert and update
    pub update_at: Option<NaiveDateTime>,
    /// Soft-delete flag
    pub deleted: Option<SoftDelete>,
}

impl BaseInfo {
    /// Field definitions to embed in a record's field list
    pub const FIELDS: &'static [FieldDef] = &[
        FieldDef::Column(Column::new("CreateAt").auto_create_time()),
        FieldDef::Column(Column::new("UpdateAt").auto_update_time()),
        FieldDef::Column(Column::new("Deleted")),
    ];

    /// Current values keyed by column
    pub fn values(&self) -> Vec<(&'static str, FilterValue)> {
        vec![
            ("create_at", self.create_at.into()),
            ("update_at", self.update_at.into()),
            ("deleted", self.deleted.into()),
        ]
    }

    /// Whether the row has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted == Some(SoftDelete::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert_eq!(SoftDelete::Normal.value(), 1);
        assert_eq!(SoftDelete::Deleted.value(), 2);
        assert_eq!(SoftDelete::default(), SoftDelete::Normal);
        assert_eq!(FilterValue::from(SoftDelete::Deleted), FilterValue::Integer(2));
    }

    #[test]
    fn test_unset_base_info_is_all_zero() {
        let base = BaseInfo::default();
        assert!(base.values().iter().all(|(_, v)| v.is_zero()));
        assert!(!base.is_deleted());
    }

    #[test]
    fn test_deleted_row() {
        let base = BaseInfo {
            deleted: Some(SoftDelete::Deleted),
            ..BaseInfo::default()
        };
        assert!(base.is_deleted());
    }
}
