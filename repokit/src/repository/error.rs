//! Repository error types
//!
//! Every failure coming out of [`BaseRepo`](super::BaseRepo) carries the
//! entity it was working on, the operation and the parameters involved.
//!
//! # Example
//!
//! ```rust
//! use repokit::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
//!
//! let error = RepositoryError::ambiguous(RepositoryOperation::SelectOneByMap, 3)
//!     .with_entity("User")
//!     .with_context("condition: {user_name: \"alice\"}");
//! assert_eq!(error.kind, RepositoryErrorKind::AmbiguousResult);
//! ```

use std::fmt;

use crate::error::{DatabaseError, DatabaseErrorKind};

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Inserting one record
    Insert,
    /// Inserting records in batches
    BatchInsert,
    /// Physical delete by primary key
    DeleteByPk,
    /// Physical delete by condition map
    DeleteByMap,
    /// Setting the soft-delete flag
    SoftDelete,
    /// Clearing the soft-delete flag
    Restore,
    /// Updating non-zero fields by primary key
    UpdateByPk,
    /// Updating with a map by primary key
    UpdateByPkWithMap,
    /// Updating with a map by condition map
    UpdateByMap,
    /// Selecting by probe record
    Select,
    /// Selecting every visible row
    SelectAll,
    /// Selecting by primary key or key list
    SelectByPk,
    /// Selecting one row by primary key
    SelectOneByPk,
    /// Selecting by condition map
    SelectByMap,
    /// Selecting one row by probe record
    SelectOne,
    /// Selecting one row by condition map
    SelectOneByMap,
    /// Counting rows
    Count,
    /// Paginated listing with a pre-built query
    ListPage,
    /// Paginated listing with a raw predicate
    PageSelect,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::BatchInsert => "batch_insert",
            Self::DeleteByPk => "delete_by_pk",
            Self::DeleteByMap => "delete_by_map",
            Self::SoftDelete => "soft_delete",
            Self::Restore => "restore",
            Self::UpdateByPk => "update_by_pk",
            Self::UpdateByPkWithMap => "update_by_pk_with_map",
            Self::UpdateByMap => "update_by_map",
            Self::Select => "select",
            Self::SelectAll => "select_all",
            Self::SelectByPk => "select_by_pk",
            Self::SelectOneByPk => "select_one_by_pk",
            Self::SelectByMap => "select_by_map",
            Self::SelectOne => "select_one",
            Self::SelectOneByMap => "select_one_by_map",
            Self::Count => "count",
            Self::ListPage => "list_page",
            Self::PageSelect => "page_select",
        };
        f.write_str(name)
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// A single-row read matched more than one row
    AmbiguousResult,
    /// Database constraint violation
    ConstraintViolation,
    /// Rejected before reaching the database
    ValidationFailed,
    /// Failed to connect to database
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Row could not be decoded into the record
    DecodeFailed,
    /// Transaction begin, commit or rollback failed
    TransactionFailed,
    /// Underlying database error
    DatabaseError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousResult => write!(f, "ambiguous_result"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DecodeFailed => write!(f, "decode_failed"),
            Self::TransactionFailed => write!(f, "transaction_failed"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error
///
/// Displays as
/// `Repository {kind} error during {operation} of {entity}: {message} [{context}]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The entity involved (e.g., "User", "Order")
    pub entity_type: Option<String>,
    /// Parameters of the failed call
    pub context: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            context: None,
        }
    }

    /// A single-row read matched `count` rows
    pub fn ambiguous(operation: RepositoryOperation, count: usize) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::AmbiguousResult,
            format!("expected at most one row, found {}", count),
        )
    }

    /// The call was rejected before reaching the database
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Set the entity involved
    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Attach the parameters of the failed call
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Repository {} error during {}", self.kind, self.operation)?;
        if let Some(ref entity) = self.entity_type {
            write!(f, " of {}", entity)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(ref context) = self.context {
            write!(f, " [{}]", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        let kind = match err.kind {
            DatabaseErrorKind::ConnectionFailed | DatabaseErrorKind::PoolExhausted => {
                RepositoryErrorKind::ConnectionFailed
            }
            DatabaseErrorKind::Timeout => RepositoryErrorKind::Timeout,
            DatabaseErrorKind::ConstraintViolation => RepositoryErrorKind::ConstraintViolation,
            DatabaseErrorKind::TypeConversion => RepositoryErrorKind::DecodeFailed,
            DatabaseErrorKind::TransactionFailed => RepositoryErrorKind::TransactionFailed,
            DatabaseErrorKind::Other => RepositoryErrorKind::Other,
            DatabaseErrorKind::NotFound
            | DatabaseErrorKind::QueryFailed
            | DatabaseErrorKind::Configuration => RepositoryErrorKind::DatabaseError,
        };
        let message = match err.context {
            Some(ref context) => format!("{} ({})", err.message, context),
            None => err.message.clone(),
        };
        // Operation is filled in by the caller
        Self::new(RepositoryOperation::Select, kind, message)
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseOperation;

    #[test]
    fn test_repository_operation_display() {
        assert_eq!(format!("{}", RepositoryOperation::Insert), "insert");
        assert_eq!(format!("{}", RepositoryOperation::BatchInsert), "batch_insert");
        assert_eq!(
            format!("{}", RepositoryOperation::UpdateByPkWithMap),
            "update_by_pk_with_map"
        );
        assert_eq!(
            format!("{}", RepositoryOperation::SelectOneByMap),
            "select_one_by_map"
        );
        assert_eq!(format!("{}", RepositoryOperation::PageSelect), "page_select");
    }

    #[test]
    fn test_display_with_entity_and_context() {
        let error = RepositoryError::ambiguous(RepositoryOperation::SelectOne, 2)
            .with_entity("User")
            .with_context("param: User { id: 0 }");
        assert_eq!(
            error.to_string(),
            "Repository ambiguous_result error during select_one of User: \
             expected at most one row, found 2 [param: User { id: 0 }]"
        );
    }

    #[test]
    fn test_display_without_entity() {
        let error = RepositoryError::validation_failed(
            RepositoryOperation::UpdateByMap,
            "update condition is empty",
        );
        assert_eq!(
            error.to_string(),
            "Repository validation_failed error during update_by_map: update condition is empty"
        );
    }

    #[test]
    fn test_constraint_violation_mapping() {
        let db = DatabaseError::new(
            DatabaseOperation::Query,
            DatabaseErrorKind::ConstraintViolation,
            "Duplicate entry 'alice' for key 'user_name'",
        );
        let error = RepositoryError::from(db).with_operation(RepositoryOperation::Insert);
        assert_eq!(error.kind, RepositoryErrorKind::ConstraintViolation);
        assert_eq!(error.operation, RepositoryOperation::Insert);
        assert!(!error.is_retriable());
    }

    #[test]
    fn test_pool_errors_are_retriable() {
        let error = RepositoryError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(error.kind, RepositoryErrorKind::ConnectionFailed);
        assert!(error.is_retriable());
    }

    #[test]
    fn test_deadlock_is_retriable() {
        let error = RepositoryError::from(DatabaseError::server(1213, "Deadlock found"))
            .with_operation(RepositoryOperation::UpdateByMap);
        assert_eq!(error.kind, RepositoryErrorKind::Timeout);
        assert!(error.is_retriable());
    }

    #[test]
    fn test_database_context_is_kept() {
        let db = DatabaseError::transaction_failed("commit failed").add_context("deadlock");
        let error = RepositoryError::from(db);
        assert_eq!(error.kind, RepositoryErrorKind::TransactionFailed);
        assert_eq!(error.message, "commit failed (deadlock)");
    }
}
