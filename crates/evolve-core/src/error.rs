//! Error types for evolve-core

use thiserror::Error;

/// Core error type for Evolve
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Version string does not match the dotted numeric format
    #[error("[E004] Invalid version '{value}': expected digits separated by '.' or '_' (e.g. 1.2.3)")]
    InvalidVersion { value: String },

    /// E005: Script name does not follow the naming convention
    #[error("[E005] Invalid migration name '{name}': {reason}")]
    InvalidMigrationName { name: String, reason: String },

    /// E006: Two or more scripts share a version or a name
    #[error("[E006] Duplicate migration(s) found: {keys}")]
    DuplicateMigration { keys: String },

    /// E007: Circular dependency between repeatable migrations
    #[error("[E007] Circular dependency detected between repeatable migrations: {cycle}")]
    CircularDependency { cycle: String },

    /// E008: A repeatable migration depends on a script that was not loaded
    #[error("[E008] Repeatable migration '{migration}' depends on unknown migration '{dependency}'")]
    UnknownDependency {
        migration: String,
        dependency: String,
    },

    /// E009: Script content no longer matches the checksum recorded when it ran
    #[error("[E009] Validation failed: invalid checksum for migration {name} (expected {expected}, found {found})")]
    ChecksumMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// E010: Script file could not be decoded with the configured encoding
    #[error("[E010] Cannot decode '{path}' as {encoding}")]
    Encoding { path: String, encoding: String },

    /// E011: IO error
    #[error("[E011] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E012: IO error with file path context
    #[error("[E012] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E013: YAML parse error
    #[error("[E013] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl CoreError {
    /// Whether the error signals drift between scripts and applied history,
    /// as opposed to a configuration problem.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::ChecksumMismatch { .. })
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
