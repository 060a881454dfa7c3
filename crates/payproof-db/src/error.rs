//! # Database Errors
//!
//! What can go wrong below the repositories, sorted so the engine can tell
//! a business refusal from a broken database.
//!
//! ```text
//! sqlx::Error ──────────────► DbError ─────────────────► EngineError
//!   "UNIQUE constraint          UniqueViolation { field }    (receipt insert turns
//!    failed: t.col"                                           this into Duplicate)
//!   "FOREIGN KEY ..."           ForeignKeyViolation          (→ OrderNotFound)
//!   PoolTimedOut                PoolExhausted                retryable
//!   PoolClosed / io             ConnectionFailed             retryable
//!   "database is locked"        Busy                         retryable
//!
//! CoreError (inside a tx) ───► Domain(..) ─────────────────► Core(..)
//! ```

use payproof_core::CoreError;
use thiserror::Error;

/// Failure of a repository call.
#[derive(Debug, Error)]
pub enum DbError {
    /// A row the caller named does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index refused the write.
    ///
    /// ## When This Occurs
    /// Two uploads of the same receipt text race past the fingerprint
    /// pre-check; the loser lands here with `field = "receipts.fingerprint"`.
    #[error("{field} already holds '{value}'")]
    UniqueViolation { field: String, value: String },

    /// A row pointed at an order that isn't stored.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A business rule refused the unit of work; nothing was committed.
    ///
    /// ## When This Occurs
    /// - Second decision on an already confirmed/rejected receipt
    /// - Shipping an order that is not fully paid
    /// - Duplicate receipt fingerprint
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// The database file could not be opened, or the pool is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected a statement for a reason not classified above.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// No connection became free within the acquire timeout.
    #[error("No database connection available")]
    PoolExhausted,

    /// Another connection held the write lock past the busy timeout.
    ///
    /// ## When This Occurs
    /// Heavy write contention on one database file (SQLITE_BUSY or
    /// SQLITE_LOCKED). Nothing was committed; the call can be retried.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Invariant broken inside a repository (should not happen).
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns true for a UNIQUE violation on the given `table.column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field == column)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "?"),

            sqlx::Error::Database(db_err) => classify(db_err.message()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),

            other => DbError::Internal(other.to_string()),
        }
    }
}

/// Sorts a SQLite error message into a variant.
///
/// SQLite reports constraints as `UNIQUE constraint failed: <table>.<column>`
/// and `FOREIGN KEY constraint failed`.
fn classify(message: &str) -> DbError {
    if let Some(field) = message.strip_prefix("UNIQUE constraint failed: ") {
        return DbError::UniqueViolation {
            field: field.trim().to_string(),
            value: "?".to_string(),
        };
    }
    if message.starts_with("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: message.to_string(),
        };
    }
    if message.starts_with("database is locked")
        || message.starts_with("database table is locked")
        || message.starts_with("database is busy")
    {
        return DbError::Busy(message.to_string());
    }
    DbError::QueryFailed(message.to_string())
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_messages_are_classified() {
        let err = classify("UNIQUE constraint failed: receipts.fingerprint");
        assert!(err.is_unique_violation_on("receipts.fingerprint"));
        assert!(!err.is_unique_violation_on("orders.order_number"));

        assert!(matches!(
            classify("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
        assert!(matches!(classify("no such table: x"), DbError::QueryFailed(_)));
        assert!(matches!(classify("database is locked"), DbError::Busy(_)));
        assert!(matches!(
            classify("database table is locked: receipts"),
            DbError::Busy(_)
        ));
    }

    #[test]
    fn test_unique_violation_matching() {
        let err = DbError::UniqueViolation {
            field: "receipts.fingerprint".to_string(),
            value: "abc".to_string(),
        };
        assert!(err.is_unique_violation_on("receipts.fingerprint"));
        assert!(!err.is_unique_violation_on("orders.order_number"));
        assert!(!DbError::PoolExhausted.is_unique_violation_on("receipts.fingerprint"));
    }

    #[test]
    fn test_domain_errors_pass_through_display() {
        let err: DbError = CoreError::OrderNotFound("1042".to_string()).into();
        assert_eq!(err.to_string(), "Order not found: 1042");
    }
}
