//! Command results

use evolve_core::{MigrationScript, Version};
use evolve_db::MigrationMetadata;
use serde::Serialize;
use std::time::Duration;

/// Outcome of `Migrate`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrateReport {
    /// Scripts executed, versioned and repeatable
    pub applied: usize,
    /// Versioned scripts recorded without running (`skip_next_migrations`)
    pub skipped: usize,
    pub elapsed: Duration,
}

/// Outcome of `Repair`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Checksums rewritten
    pub repaired: usize,
}

/// Outcome of `Erase`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EraseReport {
    pub dropped: Vec<String>,
    pub erased: Vec<String>,
    /// Schemas Evolve did not create and did not find empty
    pub skipped: Vec<String>,
}

/// A script `Migrate` would run next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMigration {
    pub version: Option<Version>,
    pub name: String,
    pub description: String,
}

impl From<&MigrationScript> for PendingMigration {
    fn from(script: &MigrationScript) -> Self {
        Self {
            version: script.version().cloned(),
            name: script.name().to_string(),
            description: script.description().to_string(),
        }
    }
}

/// Outcome of `Info`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfoReport {
    /// Metadata rows in insertion order; empty when no table exists
    pub rows: Vec<MigrationMetadata>,
    pub pending: Vec<PendingMigration>,
}

/// Outcome of `Validate`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidateReport {
    /// Applied migrations whose checksum matched
    pub validated: usize,
    /// Scripts not applied yet
    pub pending: usize,
}

/// Result of `Evolve::execute`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandReport {
    DoNothing,
    Migrate(MigrateReport),
    Repair(RepairReport),
    Erase(EraseReport),
    Info(InfoReport),
    Validate(ValidateReport),
}
