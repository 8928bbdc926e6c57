//! Configuration types and parsing for evolve.yml

use crate::error::{CoreError, CoreResult};
use crate::migration::NamingConvention;
use crate::version::Version;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Engine configuration, loaded from YAML and/or built from CLI flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvolveConfig {
    /// Command run by `Evolve::execute`
    #[serde(default)]
    pub command: Command,

    /// Connection string of the target database
    #[serde(default)]
    pub connection_string: Option<String>,

    /// Database dialect; detected from the connection when absent
    #[serde(default)]
    pub dialect: Option<Dialect>,

    /// Directories scanned recursively for scripts
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,

    /// Managed schemas; empty means the connection's current schema
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Schema holding the metadata table (first managed schema by default)
    #[serde(default)]
    pub metadata_table_schema: Option<String>,

    /// Name of the metadata table
    #[serde(default = "default_metadata_table_name")]
    pub metadata_table_name: String,

    #[serde(default = "default_migration_prefix")]
    pub sql_migration_prefix: String,

    #[serde(default = "default_repeatable_prefix")]
    pub sql_repeatable_migration_prefix: String,

    #[serde(default = "default_separator")]
    pub sql_migration_separator: String,

    #[serde(default = "default_suffix")]
    pub sql_migration_suffix: String,

    /// Encoding of script files
    #[serde(default)]
    pub encoding: Encoding,

    #[serde(default = "default_placeholder_prefix")]
    pub placeholder_prefix: String,

    #[serde(default = "default_placeholder_suffix")]
    pub placeholder_suffix: String,

    /// Placeholder values keyed by name, substituted in declaration order
    #[serde(default)]
    pub placeholders: IndexMap<String, String>,

    /// Per-statement timeout in seconds
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,

    /// Highest version to apply (unbounded when absent)
    #[serde(default)]
    pub target_version: Option<Version>,

    /// Versions below this one are considered already applied
    #[serde(default)]
    pub start_version: Option<Version>,

    /// Run scripts with a lower version than the last applied one
    #[serde(default)]
    pub out_of_order: bool,

    /// Refuse to run Erase
    #[serde(default)]
    pub is_erase_disabled: bool,

    /// Erase managed schemas instead of failing on a validation error
    #[serde(default)]
    pub must_erase_on_validation_error: bool,

    /// Serialize concurrent runs through database locks
    #[serde(default = "default_true")]
    pub enable_cluster_mode: bool,

    /// Seconds between lock acquisition attempts
    #[serde(default = "default_lock_poll_interval")]
    pub lock_poll_interval_secs: u64,

    /// Give up after this many lock attempts (unbounded when absent)
    #[serde(default)]
    pub lock_max_attempts: Option<u32>,

    #[serde(default)]
    pub transaction_mode: TransactionMode,

    /// Re-run failing repeatable scripts while the error count decreases
    #[serde(default)]
    pub retry_repeatable_migrations_until_no_error: bool,

    /// Record pending versioned scripts as applied without running them
    #[serde(default)]
    pub skip_next_migrations: bool,

    #[serde(default)]
    pub sql_lint_level: LintLevel,

    /// Statement batch delimiter; the dialect default when absent
    #[serde(default)]
    pub batch_delimiter: Option<String>,

    /// End statements at each line-final `;` instead of sending the whole
    /// script as one batch. A `;` at the end of a line inside a string
    /// literal or comment also ends the statement.
    #[serde(default)]
    pub split_on_terminator: bool,
}

/// Command selected for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Log and exit
    #[default]
    DoNothing,
    Migrate,
    Repair,
    Erase,
    Info,
    Validate,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::DoNothing => "do_nothing",
            Command::Migrate => "migrate",
            Command::Repair => "repair",
            Command::Erase => "erase",
            Command::Info => "info",
            Command::Validate => "validate",
        };
        f.write_str(name)
    }
}

/// Transaction scope of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    /// Commit after each successful script
    #[default]
    CommitEach,
    /// Commit once after every script ran, roll everything back on failure
    CommitAll,
    /// Always roll back at the end (preview)
    RollbackAll,
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionMode::CommitEach => "commit_each",
            TransactionMode::CommitAll => "commit_all",
            TransactionMode::RollbackAll => "rollback_all",
        };
        f.write_str(name)
    }
}

impl FromStr for TransactionMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "commit_each" | "commiteach" => Ok(TransactionMode::CommitEach),
            "commit_all" | "commitall" => Ok(TransactionMode::CommitAll),
            "rollback_all" | "rollbackall" => Ok(TransactionMode::RollbackAll),
            _ => Err(CoreError::ConfigInvalid {
                message: format!(
                    "Unknown transaction mode '{s}'. Valid modes: commit_each, commit_all, rollback_all"
                ),
            }),
        }
    }
}

/// Severity of unsafe-DDL lint findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    #[default]
    Off,
    Warning,
    Error,
}

impl FromStr for LintLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LintLevel::Off),
            "warning" | "warn" => Ok(LintLevel::Warning),
            "error" => Ok(LintLevel::Error),
            _ => Err(CoreError::ConfigInvalid {
                message: format!("Unknown lint level '{s}'. Valid levels: off, warning, error"),
            }),
        }
    }
}

/// Encoding of script files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin1", alias = "iso-8859-1")]
    Latin1,
}

impl Encoding {
    /// Decode file bytes, stripping a UTF-8 byte order mark.
    pub fn decode(&self, path: &Path, bytes: &[u8]) -> CoreResult<String> {
        match self {
            Encoding::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).map_err(|_| CoreError::Encoding {
                    path: path.display().to_string(),
                    encoding: self.to_string(),
                })
            }
            // Latin-1 maps every byte to the code point of the same value
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "utf-8"),
            Encoding::Latin1 => write!(f, "latin1"),
        }
    }
}

impl FromStr for Encoding {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            _ => Err(CoreError::ConfigInvalid {
                message: format!("Unknown encoding '{s}'. Valid encodings: utf-8, latin1"),
            }),
        }
    }
}

/// Supported database dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// DuckDB (embedded)
    DuckDb,
    /// PostgreSQL
    #[serde(alias = "postgres")]
    PostgreSql,
}

impl Dialect {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::DuckDb => "duckdb",
            Dialect::PostgreSql => "postgresql",
        }
    }

    /// Whether CREATE/DROP statements can be rolled back
    pub fn supports_ddl_transactions(&self) -> bool {
        match self {
            Dialect::DuckDb | Dialect::PostgreSql => true,
        }
    }

    /// Batch delimiter used when none is configured
    pub fn default_batch_delimiter(&self) -> Option<&'static str> {
        None
    }

    /// Query returning the server version, used to probe a connection
    pub fn version_query(&self) -> &'static str {
        match self {
            Dialect::DuckDb => "SELECT version()",
            Dialect::PostgreSql => "SELECT current_setting('server_version')",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "duckdb" => Ok(Dialect::DuckDb),
            "postgresql" | "postgres" | "pg" => Ok(Dialect::PostgreSql),
            _ => Err(CoreError::ConfigInvalid {
                message: format!("Unknown dialect '{s}'. Valid dialects: duckdb, postgresql"),
            }),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_locations() -> Vec<String> {
    vec!["Sql_Scripts".to_string()]
}

fn default_metadata_table_name() -> String {
    "changelog".to_string()
}

fn default_migration_prefix() -> String {
    "V".to_string()
}

fn default_repeatable_prefix() -> String {
    "R".to_string()
}

fn default_separator() -> String {
    "__".to_string()
}

fn default_suffix() -> String {
    ".sql".to_string()
}

fn default_placeholder_prefix() -> String {
    "${".to_string()
}

fn default_placeholder_suffix() -> String {
    "}".to_string()
}

fn default_lock_poll_interval() -> u64 {
    3
}

impl Default for EvolveConfig {
    fn default() -> Self {
        Self {
            command: Command::default(),
            connection_string: None,
            dialect: None,
            locations: default_locations(),
            schemas: Vec::new(),
            metadata_table_schema: None,
            metadata_table_name: default_metadata_table_name(),
            sql_migration_prefix: default_migration_prefix(),
            sql_repeatable_migration_prefix: default_repeatable_prefix(),
            sql_migration_separator: default_separator(),
            sql_migration_suffix: default_suffix(),
            encoding: Encoding::default(),
            placeholder_prefix: default_placeholder_prefix(),
            placeholder_suffix: default_placeholder_suffix(),
            placeholders: IndexMap::new(),
            command_timeout_secs: None,
            target_version: None,
            start_version: None,
            out_of_order: false,
            is_erase_disabled: false,
            must_erase_on_validation_error: false,
            enable_cluster_mode: true,
            lock_poll_interval_secs: default_lock_poll_interval(),
            lock_max_attempts: None,
            transaction_mode: TransactionMode::default(),
            retry_repeatable_migrations_until_no_error: false,
            skip_next_migrations: false,
            sql_lint_level: LintLevel::default(),
            batch_delimiter: None,
            split_on_terminator: false,
        }
    }
}

impl EvolveConfig {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: EvolveConfig =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                message: format!("{}: {e}", path.display()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        let required = [
            ("sql_migration_prefix", &self.sql_migration_prefix),
            (
                "sql_repeatable_migration_prefix",
                &self.sql_repeatable_migration_prefix,
            ),
            ("sql_migration_separator", &self.sql_migration_separator),
            ("metadata_table_name", &self.metadata_table_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(invalid(format!("{field} cannot be empty")));
            }
        }

        if self
            .sql_migration_prefix
            .eq_ignore_ascii_case(&self.sql_repeatable_migration_prefix)
        {
            return Err(invalid(format!(
                "Versioned and repeatable migration prefixes must differ (both are '{}')",
                self.sql_migration_prefix
            )));
        }

        if self.locations.is_empty() {
            return Err(invalid("At least one script location must be specified".into()));
        }

        if let (Some(start), Some(target)) = (&self.start_version, &self.target_version) {
            if start > target {
                return Err(invalid(format!(
                    "start_version {start} is greater than target_version {target}"
                )));
            }
        }

        if self.lock_poll_interval_secs == 0 {
            return Err(invalid("lock_poll_interval_secs must be at least 1".into()));
        }

        if self.split_on_terminator && self.batch_delimiter.is_some() {
            return Err(invalid(
                "split_on_terminator and batch_delimiter cannot both be set".into(),
            ));
        }

        Ok(())
    }

    /// Naming convention of versioned scripts
    pub fn versioned_naming(&self) -> NamingConvention {
        NamingConvention::new(
            &self.sql_migration_prefix,
            &self.sql_migration_separator,
            &self.sql_migration_suffix,
        )
    }

    /// Naming convention of repeatable scripts
    pub fn repeatable_naming(&self) -> NamingConvention {
        NamingConvention::new(
            &self.sql_repeatable_migration_prefix,
            &self.sql_migration_separator,
            &self.sql_migration_suffix,
        )
    }

    /// Placeholder tokens (`${key}`) mapped to their values, in declaration order
    pub fn placeholder_tokens(&self) -> IndexMap<String, String> {
        self.placeholders
            .iter()
            .map(|(key, value)| {
                (
                    format!("{}{key}{}", self.placeholder_prefix, self.placeholder_suffix),
                    value.clone(),
                )
            })
            .collect()
    }

    /// Parse a `key:value` placeholder definition
    pub fn parse_placeholder(definition: &str) -> CoreResult<(String, String)> {
        match definition.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(invalid(format!(
                "Placeholder '{definition}' must be of the form key:value"
            ))),
        }
    }

    /// Script locations resolved against `root`
    pub fn locations_absolute(&self, root: &Path) -> Vec<PathBuf> {
        self.locations.iter().map(|l| root.join(l)).collect()
    }
}

fn invalid(message: String) -> CoreError {
    CoreError::ConfigInvalid { message }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
