//! DuckDB database backend implementation
//!
//! DuckDB is embedded and single-process, so the application and metadata
//! table locks are no-ops that always succeed.

use crate::error::{DbError, DbResult};
use crate::ident::{qualified, quote_ident, quote_literal};
use crate::metadata::{MetadataStore, MetadataTable, MigrationMetadata, NewMetadata};
use crate::traits::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use evolve_core::Dialect;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Connection string prefix accepted in front of a DuckDB path
pub const CONNECTION_PREFIX: &str = "duckdb:";

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Arc<Mutex<Connection>>,
    in_transaction: AtomicBool,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self::from_connection(conn))
    }

    /// Create from a connection string: `:memory:`, a file path, or either
    /// prefixed with `duckdb:`
    pub fn new(connection_string: &str) -> DbResult<Self> {
        let path = strip_prefix(connection_string);
        if path.is_empty() || path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    /// Open another connection to the same database instance.
    pub fn try_clone(&self) -> DbResult<Self> {
        let conn = self.lock()?.try_clone()?;
        Ok(Self::from_connection(conn))
    }

    /// Whether a connection string looks like a DuckDB database
    pub fn accepts(connection_string: &str) -> bool {
        let s = connection_string.trim();
        s.to_ascii_lowercase().starts_with(CONNECTION_PREFIX)
            || s == ":memory:"
            || (!s.contains("://") && !s.contains('='))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            in_transaction: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }

    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(format!("{e}: {sql}")))
    }

    fn query_string(&self, sql: &str) -> DbResult<String> {
        let conn = self.lock()?;
        let value: String = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(value)
    }

    fn count(&self, sql: &str, schema: &str) -> DbResult<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(sql, params![schema], |row| row.get(0))?;
        Ok(count)
    }

    fn names(&self, sql: &str, schema: &str) -> DbResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![schema], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn lock(conn: &Mutex<Connection>) -> DbResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| DbError::MutexPoisoned(e.to_string()))
}

fn strip_prefix(connection_string: &str) -> &str {
    let s = connection_string.trim();
    if s.len() >= CONNECTION_PREFIX.len()
        && s[..CONNECTION_PREFIX.len()].eq_ignore_ascii_case(CONNECTION_PREFIX)
    {
        s[CONNECTION_PREFIX.len()..].trim_start_matches("//")
    } else {
        s
    }
}

#[async_trait]
impl Database for DuckDbBackend {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    async fn server_version(&self) -> DbResult<String> {
        self.query_string(Dialect::DuckDb.version_query())
    }

    async fn current_schema(&self) -> DbResult<String> {
        self.query_string("SELECT current_schema()")
    }

    async fn schema_exists(&self, schema: &str) -> DbResult<bool> {
        let count = self.count(
            "SELECT COUNT(*) FROM information_schema.schemata \
             WHERE catalog_name = current_database() AND schema_name = ?",
            schema,
        )?;
        Ok(count > 0)
    }

    async fn schema_is_empty(&self, schema: &str) -> DbResult<bool> {
        let relations = self.count(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_catalog = current_database() AND table_schema = ?",
            schema,
        )?;
        let sequences = self.count(
            "SELECT COUNT(*) FROM duckdb_sequences() \
             WHERE database_name = current_database() AND schema_name = ?",
            schema,
        )?;
        let macros = self.count(
            "SELECT COUNT(*) FROM duckdb_functions() \
             WHERE database_name = current_database() AND schema_name = ? AND NOT internal",
            schema,
        )?;
        let types = self.count(
            "SELECT COUNT(*) FROM duckdb_types() \
             WHERE database_name = current_database() AND schema_name = ? AND NOT internal",
            schema,
        )?;
        Ok(relations + sequences + macros + types == 0)
    }

    async fn create_schema(&self, schema: &str) -> DbResult<()> {
        self.execute_batch_sync(&format!("CREATE SCHEMA {}", quote_ident(schema)))
    }

    async fn drop_schema(&self, schema: &str) -> DbResult<()> {
        self.execute_batch_sync(&format!("DROP SCHEMA {} CASCADE", quote_ident(schema)))
    }

    async fn erase_schema(&self, schema: &str) -> DbResult<()> {
        let views = self.names(
            "SELECT view_name FROM duckdb_views() \
             WHERE database_name = current_database() AND schema_name = ? AND NOT internal",
            schema,
        )?;
        let tables = self.names(
            "SELECT table_name FROM duckdb_tables() \
             WHERE database_name = current_database() AND schema_name = ?",
            schema,
        )?;
        let sequences = self.names(
            "SELECT sequence_name FROM duckdb_sequences() \
             WHERE database_name = current_database() AND schema_name = ?",
            schema,
        )?;
        let macros = self.names(
            "SELECT DISTINCT function_name || '|' || function_type FROM duckdb_functions() \
             WHERE database_name = current_database() AND schema_name = ? AND NOT internal",
            schema,
        )?;
        let types = self.names(
            "SELECT type_name FROM duckdb_types() \
             WHERE database_name = current_database() AND schema_name = ? AND NOT internal",
            schema,
        )?;

        let mut statements = Vec::new();
        for view in views {
            statements.push(format!("DROP VIEW IF EXISTS {}", qualified(schema, &view)));
        }
        for table in tables {
            statements.push(format!("DROP TABLE IF EXISTS {}", qualified(schema, &table)));
        }
        for sequence in sequences {
            statements.push(format!(
                "DROP SEQUENCE IF EXISTS {}",
                qualified(schema, &sequence)
            ));
        }
        for entry in macros {
            let (name, kind) = entry.split_once('|').unwrap_or((entry.as_str(), "macro"));
            let keyword = if kind == "table_macro" {
                "MACRO TABLE"
            } else {
                "MACRO"
            };
            statements.push(format!(
                "DROP {keyword} IF EXISTS {}",
                qualified(schema, name)
            ));
        }
        // Types last, once no table column uses them.
        for name in types {
            statements.push(format!("DROP TYPE IF EXISTS {}", qualified(schema, &name)));
        }

        for sql in statements {
            log::debug!("{sql}");
            self.execute_batch_sync(&sql)?;
        }
        Ok(())
    }

    async fn try_acquire_application_lock(&self) -> DbResult<bool> {
        Ok(true)
    }

    async fn release_application_lock(&self) -> DbResult<bool> {
        Ok(true)
    }

    async fn set_command_timeout(&self, timeout: Duration) -> DbResult<()> {
        log::debug!(
            "DuckDB does not support statement timeouts; ignoring {}s",
            timeout.as_secs()
        );
        Ok(())
    }

    async fn execute(&self, sql: &str) -> DbResult<()> {
        self.execute_batch_sync(sql)
    }

    async fn begin_transaction(&self) -> DbResult<()> {
        self.lock()?
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))?;
        self.in_transaction.store(true, Ordering::Release);
        Ok(())
    }

    async fn commit(&self) -> DbResult<()> {
        let result = self.lock()?.execute_batch("COMMIT");
        self.in_transaction.store(false, Ordering::Release);
        result.map_err(|e| DbError::TransactionError(format!("COMMIT failed: {e}")))
    }

    async fn rollback(&self) -> DbResult<()> {
        let result = self.lock()?.execute_batch("ROLLBACK");
        self.in_transaction.store(false, Ordering::Release);
        result.map_err(|e| DbError::TransactionError(format!("ROLLBACK failed: {e}")))
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::Acquire)
    }

    fn metadata_table(&self, schema: &str, table: &str) -> MetadataStore {
        MetadataStore::new(Box::new(DuckDbMetadataTable {
            conn: Arc::clone(&self.conn),
            schema: schema.to_string(),
            table: table.to_string(),
        }))
    }
}

/// Metadata table stored in a DuckDB schema; ids come from a sequence.
struct DuckDbMetadataTable {
    conn: Arc<Mutex<Connection>>,
    schema: String,
    table: String,
}

impl DuckDbMetadataTable {
    fn table_ref(&self) -> String {
        qualified(&self.schema, &self.table)
    }

    fn sequence_ref(&self) -> String {
        qualified(&self.schema, &self.sequence_name())
    }

    fn sequence_name(&self) -> String {
        format!("{}_id_seq", self.table)
    }
}

#[async_trait]
impl MetadataTable for DuckDbMetadataTable {
    fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    async fn exists(&self) -> DbResult<bool> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_catalog = current_database() AND table_schema = ? AND table_name = ?",
            params![self.schema, self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn create(&self) -> DbResult<()> {
        // nextval() takes the sequence name as a string literal
        let sequence_literal = quote_literal(&format!("{}.{}", self.schema, self.sequence_name()));
        let sql = format!(
            "CREATE SEQUENCE IF NOT EXISTS {seq};
CREATE TABLE IF NOT EXISTS {table} (
    id BIGINT PRIMARY KEY DEFAULT nextval({seq_literal}),
    type SMALLINT NOT NULL,
    version VARCHAR(50),
    description VARCHAR(200) NOT NULL,
    name VARCHAR(1000) NOT NULL,
    checksum VARCHAR(32),
    installed_by VARCHAR(100) NOT NULL,
    installed_on TIMESTAMP NOT NULL,
    success BOOLEAN NOT NULL
);",
            seq = self.sequence_ref(),
            table = self.table_ref(),
            seq_literal = sequence_literal,
        );
        lock(&self.conn)?
            .execute_batch(&sql)
            .map_err(|e| DbError::ExecutionError(format!("create metadata table failed: {e}")))
    }

    async fn try_lock(&self) -> DbResult<bool> {
        Ok(true)
    }

    async fn release_lock(&self) -> DbResult<bool> {
        Ok(true)
    }

    async fn insert(&self, row: &NewMetadata) -> DbResult<()> {
        let installed_on = Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        let sql = format!(
            "INSERT INTO {} (type, version, description, name, checksum, installed_by, installed_on, success) \
             VALUES (?, ?, ?, ?, ?, '', CAST(? AS TIMESTAMP), ?)",
            self.table_ref()
        );
        lock(&self.conn)?.execute(
            &sql,
            params![
                row.kind.as_i16(),
                row.version,
                row.description,
                row.name,
                row.checksum,
                installed_on,
                row.success
            ],
        )?;
        Ok(())
    }

    async fn update_checksum(&self, id: i64, checksum: &str) -> DbResult<()> {
        let sql = format!("UPDATE {} SET checksum = ? WHERE id = ?", self.table_ref());
        lock(&self.conn)?.execute(&sql, params![checksum, id])?;
        Ok(())
    }

    async fn select_all(&self) -> DbResult<Vec<MigrationMetadata>> {
        let sql = format!(
            "SELECT id, CAST(type AS SMALLINT), version, description, name, checksum, \
             installed_by, epoch_ms(installed_on), success FROM {} ORDER BY id",
            self.table_ref()
        );
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i16>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, bool>(8)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(
                |(id, kind, version, description, name, checksum, by, millis, success)| {
                    let installed_on = DateTime::<Utc>::from_timestamp_millis(millis)
                        .ok_or_else(|| {
                            DbError::InvalidMetadata(format!("row {id}: bad timestamp {millis}"))
                        })?;
                    MigrationMetadata::from_columns(
                        id,
                        kind,
                        version,
                        description,
                        name,
                        checksum,
                        by,
                        installed_on,
                        success,
                    )
                },
            )
            .collect()
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
