//! evolve-core - Core library for Evolve
//!
//! This crate provides versions, the migration script model, checksums,
//! per-script directives, the repeatable-migration dependency resolver,
//! configuration parsing and migration loaders used across all Evolve
//! components.

pub mod checksum;
pub mod config;
pub mod dependency;
pub mod directive;
pub mod error;
pub mod loader;
pub mod migration;
pub mod version;

pub use checksum::compute_checksum;
pub use config::{Command, Dialect, Encoding, EvolveConfig, LintLevel, TransactionMode};
pub use dependency::sort_with_dependencies;
pub use directive::Directives;
pub use error::{CoreError, CoreResult};
pub use loader::{EmbeddedMigrationLoader, FileMigrationLoader, MigrationLoader};
pub use migration::{check_duplicates, MigrationKind, MigrationScript, NamingConvention};
pub use version::Version;
