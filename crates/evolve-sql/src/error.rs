//! Error types for evolve-sql

use crate::lint::LintIssue;
use thiserror::Error;

/// SQL preparation errors
#[derive(Error, Debug)]
pub enum SqlError {
    /// Lint found unguarded DDL at error level (S001)
    #[error("[S001] SQL lint failed with {} issue(s):\n{}", issues.len(), format_issues(issues))]
    LintFailed { issues: Vec<LintIssue> },
}

fn format_issues(issues: &[LintIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("  line {}: {}", i.line_number + 1, i.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;
