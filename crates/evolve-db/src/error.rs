//! Error types for evolve-db

use evolve_sql::SqlError;
use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Transaction control error (D003)
    #[error("[D003] Transaction error: {0}")]
    TransactionError(String),

    /// No driver could open the connection (D004)
    #[error("[D004] Unsupported or undetectable database dialect for connection '{connection}' (tried: {tried})")]
    UnsupportedDialect { connection: String, tried: String },

    /// Mutex poisoned (D005)
    #[error("[D005] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Metadata row could not be decoded (D006)
    #[error("[D006] Invalid metadata row: {0}")]
    InvalidMetadata(String),

    /// Statement splitting or lint failure
    #[error(transparent)]
    Sql(#[from] SqlError),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::ExecutionError(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Configuration(_) => {
                DbError::ConnectionError(err.to_string())
            }
            other => DbError::ExecutionError(other.to_string()),
        }
    }
}
