//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Evolve - database schema migrations from plain SQL scripts
#[derive(Parser, Debug)]
#[command(name = "evolve")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Apply pending versioned migrations, then changed repeatable ones
    Migrate,

    /// Drop schemas Evolve created and empty the ones it found empty
    Erase,

    /// Realign recorded checksums with the current scripts
    Repair,

    /// Show applied migrations and pending scripts
    Info(InfoArgs),

    /// Check applied migrations against the scripts
    Validate,
}

/// Arguments for the info command
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,
}

/// Report output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Global arguments available to all commands.
///
/// Every option left unset keeps the value from `--config`, or the
/// built-in default when no config file is given.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// YAML configuration file
    #[arg(long, global = true, env = "EVOLVE_CONFIG")]
    pub config: Option<String>,

    /// Database connection string
    #[arg(short = 'c', long, global = true, env = "EVOLVE_CONNECTION_STRING")]
    pub connection_string: Option<String>,

    /// Database dialect (duckdb, postgresql); detected when omitted
    #[arg(long, global = true)]
    pub dialect: Option<String>,

    /// Script location (repeatable)
    #[arg(short = 'l', long = "location", global = true)]
    pub locations: Vec<String>,

    /// Managed schema (repeatable)
    #[arg(short = 's', long = "schema", global = true)]
    pub schemas: Vec<String>,

    /// Schema of the metadata table
    #[arg(long, global = true)]
    pub metadata_table_schema: Option<String>,

    /// Name of the metadata table
    #[arg(long = "metadata-table", global = true)]
    pub metadata_table_name: Option<String>,

    /// Highest version to migrate to
    #[arg(long, global = true)]
    pub target_version: Option<String>,

    /// Ignore versioned scripts below this version
    #[arg(long, global = true)]
    pub start_version: Option<String>,

    /// Allow scripts older than the last applied version
    #[arg(long, global = true)]
    pub out_of_order: bool,

    /// Refuse to run erase
    #[arg(long, global = true)]
    pub erase_disabled: bool,

    /// Erase and migrate from scratch when validation fails
    #[arg(long, global = true)]
    pub erase_on_validation_error: bool,

    /// Placeholder prefix
    #[arg(long, global = true)]
    pub placeholder_prefix: Option<String>,

    /// Placeholder suffix
    #[arg(long, global = true)]
    pub placeholder_suffix: Option<String>,

    /// Placeholder as key:value (repeatable)
    #[arg(long = "placeholder", global = true)]
    pub placeholders: Vec<String>,

    /// Statement timeout in seconds
    #[arg(long = "command-timeout", global = true)]
    pub command_timeout_secs: Option<u64>,

    /// Script file encoding (utf-8, latin1)
    #[arg(long, global = true)]
    pub encoding: Option<String>,

    /// Do not take the application and metadata locks
    #[arg(long, global = true)]
    pub disable_cluster_mode: bool,

    /// Transaction mode (commit_each, commit_all, rollback_all)
    #[arg(long, global = true)]
    pub transaction_mode: Option<String>,

    /// Unsafe DDL lint level (off, warning, error)
    #[arg(long, global = true)]
    pub lint_level: Option<String>,

    /// Retry failed repeatable migrations while the failure count drops
    #[arg(long, global = true)]
    pub retry_repeatable: bool,

    /// Record pending versioned migrations as applied without running them
    #[arg(long, global = true)]
    pub skip_next_migrations: bool,

    /// End statements at each line-final `;` instead of running whole scripts
    #[arg(long, global = true)]
    pub split_on_terminator: bool,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
