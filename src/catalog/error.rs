//! Error types for gazette catalog operations.

use std::fmt;

use thiserror::Error;

/// Structured classification for catalog/database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// `SQLite` returned busy/locked under concurrent access.
    BusyOrLocked,
    /// Constraint failure (unique/foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Filesystem or transport IO failure.
    Io,
    /// Unclassified database failure.
    Other,
}

impl DbErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::Io => "io",
            Self::Other => "other",
        };
        write!(f, "{label}")
    }
}

fn classify_database_error(database_error: &(dyn sqlx::error::DatabaseError + 'static)) -> DbErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return DbErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return DbErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("database is busy")
    {
        return DbErrorKind::BusyOrLocked;
    }
    if message.contains("constraint failed") {
        return DbErrorKind::ConstraintViolation;
    }

    DbErrorKind::Other
}

/// Errors that can occur during catalog operations.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        /// Typed classification used for failure handling.
        kind: DbErrorKind,
        /// Human-readable database error text.
        message: String,
    },

    /// A row could not be built from the record.
    #[error("incomplete gazette row: missing {field}")]
    Incomplete { field: &'static str },
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl CatalogError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<DbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Incomplete { .. } => None,
        }
    }

    /// Returns true when this error is a constraint violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        self.database_kind() == Some(DbErrorKind::ConstraintViolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_database_message() {
        let err = CatalogError::Database {
            kind: DbErrorKind::Other,
            message: "connection failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("database error"));
        assert!(msg.contains("other"));
        assert!(msg.contains("connection failed"));
    }

    #[test]
    fn test_catalog_error_constraint_flag() {
        let err = CatalogError::Database {
            kind: DbErrorKind::ConstraintViolation,
            message: "UNIQUE constraint failed: gazettes.file_checksum, gazettes.file_path".to_string(),
        };
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_pool_closed_is_classified() {
        assert_eq!(
            DbErrorKind::from_sqlx(&sqlx::Error::PoolClosed),
            DbErrorKind::PoolClosed
        );
    }

    #[test]
    fn test_incomplete_row_has_no_database_kind() {
        let err = CatalogError::Incomplete { field: "scraped_at" };
        assert_eq!(err.database_kind(), None);
        assert!(err.to_string().contains("scraped_at"));
    }
}
