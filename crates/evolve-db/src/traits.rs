//! Database trait definition

use crate::error::DbResult;
use crate::metadata::MetadataStore;
use async_trait::async_trait;
use evolve_core::{Dialect, LintLevel};
use evolve_sql::{Placeholders, SplitStrategy, SqlStatement, SqlStatementBuilder};
use std::time::Duration;

/// Database facade used by the migration engine.
///
/// One value wraps one open connection. The connection stays open for the
/// lifetime of the value so session-scoped locks are not released early.
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Dialect of this connection
    fn dialect(&self) -> Dialect;

    /// Server version string; also used to probe a fresh connection
    async fn server_version(&self) -> DbResult<String>;

    /// Schema unqualified names resolve to
    async fn current_schema(&self) -> DbResult<String>;

    async fn schema_exists(&self, schema: &str) -> DbResult<bool>;

    /// Whether the schema holds no tables, views, sequences or routines
    async fn schema_is_empty(&self, schema: &str) -> DbResult<bool>;

    async fn create_schema(&self, schema: &str) -> DbResult<()>;

    /// Drop the schema and everything in it
    async fn drop_schema(&self, schema: &str) -> DbResult<()>;

    /// Drop every object in the schema, keeping the schema itself
    async fn erase_schema(&self, schema: &str) -> DbResult<()>;

    /// Try to take the database-wide advisory lock without waiting
    async fn try_acquire_application_lock(&self) -> DbResult<bool>;

    async fn release_application_lock(&self) -> DbResult<bool>;

    /// Apply a timeout to every following statement
    async fn set_command_timeout(&self, timeout: Duration) -> DbResult<()>;

    /// Execute SQL that returns no rows
    async fn execute(&self, sql: &str) -> DbResult<()>;

    async fn begin_transaction(&self) -> DbResult<()>;

    async fn commit(&self) -> DbResult<()>;

    async fn rollback(&self) -> DbResult<()>;

    /// Whether a transaction opened through this value is still open
    fn in_transaction(&self) -> bool;

    /// Metadata store for `schema.table`, sharing this connection
    fn metadata_table(&self, schema: &str, table: &str) -> MetadataStore;

    /// Split a script into statements the way this dialect executes them.
    fn split_statements(
        &self,
        content: &str,
        placeholders: &Placeholders,
        lint: LintLevel,
        batch_delimiter: Option<&str>,
        split_on_terminator: bool,
    ) -> DbResult<Vec<SqlStatement>> {
        let strategy =
            SplitStrategy::for_dialect(self.dialect(), batch_delimiter, split_on_terminator);
        let statements = SqlStatementBuilder::new(strategy)
            .with_lint(lint)
            .split(content, placeholders)?;
        Ok(statements)
    }
}
