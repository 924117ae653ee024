use std::time::Duration;

use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::domain::TransferRuleError;

/// Errors surfaced by the ledger store, the transaction executor and the
/// transfer orchestrator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Conflict in {operation}: {source}")]
    Conflict {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Commit failed: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("tx error: {source}, rb error: {rollback}")]
    Rollback {
        source: Box<StoreError>,
        rollback: sqlx::Error,
    },

    #[error("Transaction cancelled")]
    Cancelled,

    #[error("Transaction timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Classify a raw sqlx error raised while running `operation`.
    pub fn from_sqlx(operation: &'static str, err: sqlx::Error) -> Self {
        let (kind, message) = match &err {
            sqlx::Error::RowNotFound => {
                return StoreError::not_found(entity_of(operation), format!("no row for {operation}"));
            }
            sqlx::Error::Database(db_err) => (Some(db_err.kind()), db_err.message().to_string()),
            _ => (None, String::new()),
        };

        match kind {
            Some(ErrorKind::ForeignKeyViolation) => {
                StoreError::not_found("account", format!("referenced by {operation}"))
            }
            Some(ErrorKind::CheckViolation | ErrorKind::NotNullViolation) => {
                StoreError::Validation(format!("{operation}: {message}"))
            }
            _ if is_conflict(&err) => StoreError::Conflict {
                operation,
                source: err,
            },
            _ => StoreError::Database {
                operation,
                source: err,
            },
        }
    }

    /// True when the whole transfer can safely be attempted again from the top.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Conflict { .. } => true,
            StoreError::Commit(err) => is_conflict(err),
            StoreError::Rollback { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, StoreError::Cancelled | StoreError::TimedOut(_))
    }
}

impl From<TransferRuleError> for StoreError {
    fn from(err: TransferRuleError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

/// The table an operation name like `get_account` works on.
fn entity_of(operation: &str) -> &'static str {
    if operation.contains("account") {
        "account"
    } else if operation.contains("entr") {
        "entry"
    } else if operation.contains("transfer") {
        "transfer"
    } else {
        "row"
    }
}

fn is_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| is_conflict_code(&code)),
        _ => false,
    }
}

/// SQLite reports extended result codes; the low byte is the primary code.
/// SQLITE_BUSY = 5, SQLITE_LOCKED = 6. PostgreSQL codes are kept for
/// serialization failures and detected deadlocks.
fn is_conflict_code(code: &str) -> bool {
    if matches!(code, "40001" | "40P01") {
        return true;
    }
    match code.parse::<i32>() {
        Ok(extended) => matches!(extended & 0xff, 5 | 6),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_codes() {
        assert!(is_conflict_code("5")); // SQLITE_BUSY
        assert!(is_conflict_code("517")); // SQLITE_BUSY_SNAPSHOT
        assert!(is_conflict_code("6")); // SQLITE_LOCKED
        assert!(is_conflict_code("40P01"));
        assert!(is_conflict_code("40001"));
        assert!(!is_conflict_code("787")); // SQLITE_CONSTRAINT_FOREIGNKEY
        assert!(!is_conflict_code("23505"));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = StoreError::from_sqlx("get_account", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::NotFound { entity: "account", .. }));
        assert_eq!(err.to_string(), "account not found: no row for get_account");

        let err = StoreError::from_sqlx("list_entries", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::NotFound { entity: "entry", .. }));
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = StoreError::from_sqlx("begin", sqlx::Error::PoolTimedOut);
        assert!(matches!(
            err,
            StoreError::Database {
                operation: "begin",
                source: sqlx::Error::PoolTimedOut
            }
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rollback_error_reports_both_causes() {
        let err = StoreError::Rollback {
            source: Box::new(StoreError::not_found("account", 999)),
            rollback: sqlx::Error::PoolClosed,
        };

        let message = err.to_string();
        assert!(message.contains("account not found: 999"), "{message}");
        assert!(message.contains("rb error"), "{message}");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rule_errors_become_validation() {
        let err: StoreError = TransferRuleError::SelfTransfer(3).into();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_cancellation_kinds() {
        assert!(StoreError::Cancelled.is_cancellation());
        assert!(StoreError::TimedOut(Duration::from_millis(5)).is_cancellation());
        assert!(!StoreError::Validation("x".into()).is_cancellation());
    }
}
