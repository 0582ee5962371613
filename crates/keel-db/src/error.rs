//! # Database Error Types
//!
//! Every failure here ends up as `SyncError::Persistence` in the engine,
//! where it is logged and retried on the next pass. The split below only
//! matters for logs and for [`DbError::is_transient`].
//!
//! ```text
//! sqlx::Error::PoolTimedOut                → PoolExhausted   (transient)
//! sqlx::Error::PoolClosed                  → Closed
//! sqlx::Error::Database "database is locked"/"busy" → Busy   (transient)
//! sqlx::Error::Database (anything else)    → QueryFailed
//! sqlx::Error::Io                          → ConnectionFailed (transient)
//! sqlx::Error::ColumnDecode                → CorruptRow
//! MigrateError                             → MigrationFailed
//! ```

use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The file could not be opened or the disk failed underneath us.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected the statement.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Another connection or process holds the write lock.
    #[error("Database busy: {0}")]
    Busy(String),

    /// A stored row could not be decoded into a pending upload.
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: String, reason: String },

    /// Every connection is in use.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// [`Database::close`](crate::Database::close) was called.
    #[error("Database is closed")]
    Closed,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Returns true if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::Busy(_) | DbError::PoolExhausted | DbError::ConnectionFailed(_)
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("database is locked") || msg.contains("busy") {
                    DbError::Busy(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::Closed,
            sqlx::Error::Io(io) => DbError::ConnectionFailed(io.to_string()),
            sqlx::Error::ColumnDecode { index, source } => DbError::CorruptRow {
                table: "pending_uploads".to_string(),
                reason: format!("column {}: {}", index, source),
            },
            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted));
        assert!(err.is_transient());

        let err: DbError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, DbError::Closed));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk I/O error");
        let err: DbError = sqlx::Error::Io(io).into();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_display() {
        let err = DbError::CorruptRow {
            table: "pending_uploads".into(),
            reason: "bad timestamp".into(),
        };
        assert_eq!(err.to_string(), "Corrupt row in pending_uploads: bad timestamp");
    }
}
