//! Error types for evolve-engine

use evolve_core::{CoreError, TransactionMode, Version};
use evolve_db::DbError;
use std::time::Duration;
use thiserror::Error;

/// Category of a failure, for callers that branch on how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or options; never retried
    Configuration,
    /// Scripts drifted from the applied history; fixable with Repair
    Validation,
    /// Unsafe DDL found at lint level `error`
    SqlLint,
    /// A statement or database call failed
    Execution,
    /// The database could not be reached or identified
    Connection,
    /// The run was interrupted through its cancel handle
    Cancelled,
}

/// Engine error type
#[derive(Error, Debug)]
pub enum EvolveError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    /// EV001: Erase requested while disabled
    #[error("[EV001] Erase is disabled by configuration (is_erase_disabled)")]
    EraseDisabled,

    /// EV002: Start version conflicts with the recorded history
    #[error("[EV002] Invalid start version: {message}")]
    StartVersion { message: String },

    /// EV003: An applied migration has no script anymore
    #[error("[EV003] Validation failed: script for applied migration {name} (version {version}) not found")]
    MissingScript { name: String, version: Version },

    /// EV004: A script below the last applied version was never run
    #[error("[EV004] Validation failed: migration {name} (version {version}) was not applied but {last} was; enable out_of_order to run it")]
    NotApplied {
        name: String,
        version: Version,
        last: Version,
    },

    /// EV005: A statement of a script failed
    #[error("[EV005] Migration {name} failed after {}ms: {source}", elapsed.as_millis())]
    Execution {
        name: String,
        elapsed: Duration,
        source: DbError,
    },

    /// EV006: Repeatable migrations kept failing across retries
    #[error("[EV006] {count} repeatable migration(s) still failing after retries: {names}")]
    RepeatableFailures { count: usize, names: String },

    /// EV007: Script cannot run inside the run-wide transaction
    #[error("[EV007] Migration {name} disables transactions, which {mode} does not allow")]
    TransactionDisabled { name: String, mode: TransactionMode },

    /// EV008: Lock polling exhausted its attempts
    #[error("[EV008] Could not acquire the {lock} after {attempts} attempt(s)")]
    LockTimeout { lock: &'static str, attempts: u32 },

    /// EV009: Cancelled through the cancel handle
    #[error("[EV009] Cancelled while waiting for the {lock}")]
    Cancelled { lock: &'static str },
}

impl EvolveError {
    /// Map the error to its recovery category
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvolveError::Core(e) if e.is_validation() => ErrorKind::Validation,
            EvolveError::Core(_) => ErrorKind::Configuration,
            EvolveError::Db(DbError::Sql(_)) => ErrorKind::SqlLint,
            EvolveError::Db(DbError::ConnectionError(_) | DbError::UnsupportedDialect { .. }) => {
                ErrorKind::Connection
            }
            EvolveError::Db(_) => ErrorKind::Execution,
            EvolveError::EraseDisabled
            | EvolveError::StartVersion { .. }
            | EvolveError::TransactionDisabled { .. } => ErrorKind::Configuration,
            EvolveError::MissingScript { .. } | EvolveError::NotApplied { .. } => {
                ErrorKind::Validation
            }
            EvolveError::Execution { .. }
            | EvolveError::RepeatableFailures { .. }
            | EvolveError::LockTimeout { .. } => ErrorKind::Execution,
            EvolveError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// Result type alias for EvolveError
pub type EvolveResult<T> = Result<T, EvolveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use evolve_sql::SqlError;

    #[test]
    fn test_kinds() {
        let mismatch = EvolveError::from(CoreError::ChecksumMismatch {
            name: "V1__a.sql".into(),
            expected: "a".into(),
            found: "b".into(),
        });
        assert_eq!(mismatch.kind(), ErrorKind::Validation);

        let bad_version = EvolveError::from(CoreError::InvalidVersion { value: "x".into() });
        assert_eq!(bad_version.kind(), ErrorKind::Configuration);

        let lint = EvolveError::from(DbError::Sql(SqlError::LintFailed { issues: vec![] }));
        assert_eq!(lint.kind(), ErrorKind::SqlLint);

        let conn = EvolveError::from(DbError::ConnectionError("refused".into()));
        assert_eq!(conn.kind(), ErrorKind::Connection);

        assert_eq!(EvolveError::EraseDisabled.kind(), ErrorKind::Configuration);
        assert_eq!(
            EvolveError::Cancelled { lock: "application lock" }.kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn test_execution_message() {
        let err = EvolveError::Execution {
            name: "V2__users.sql".into(),
            elapsed: Duration::from_millis(42),
            source: DbError::ExecutionError("syntax error".into()),
        };
        let message = err.to_string();
        assert!(message.contains("V2__users.sql"));
        assert!(message.contains("42ms"));
        assert!(message.contains("syntax error"));
    }
}
