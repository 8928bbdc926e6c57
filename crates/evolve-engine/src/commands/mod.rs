//! Command bodies and the selection logic they share

pub(crate) mod erase;
pub(crate) mod info;
pub(crate) mod migrate;
pub(crate) mod repair;
pub(crate) mod validate;

use crate::error::{EvolveError, EvolveResult};
use crate::session::Session;
use evolve_core::{MigrationScript, Version};
use evolve_db::{MetadataType, MigrationMetadata};
use std::collections::HashSet;

/// How the validation pass treats drift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValidationMode {
    /// Fail on any mismatch
    Check,
    /// Rewrite mismatched checksums
    Repair,
}

#[derive(Debug, Default)]
pub(crate) struct Validation {
    pub(crate) validated: usize,
    pub(crate) repaired: usize,
}

/// Check every applied versioned migration at or above the start version
/// against its script, and every script below the last applied version
/// against the history.
pub(crate) async fn validate_applied(
    session: &Session<'_>,
    scripts: &[MigrationScript],
    mode: ValidationMode,
) -> EvolveResult<Validation> {
    let metadata = &session.metadata;
    let applied = metadata.get_all_migration_metadata().await?;
    let Some(last) = last_applied_version(&applied) else {
        return Ok(Validation::default());
    };
    let start = metadata.find_start_version().await?;
    let mut outcome = Validation::default();

    for row in &applied {
        let Some(version) = row.version.as_ref().filter(|v| **v >= start) else {
            continue;
        };
        let script = scripts
            .iter()
            .find(|s| s.version() == Some(version))
            .ok_or_else(|| EvolveError::MissingScript {
                name: row.name.clone(),
                version: version.clone(),
            })?;

        let expected = row.checksum.as_deref().unwrap_or_default();
        match script.validate_checksum(expected) {
            Ok(()) => outcome.validated += 1,
            Err(e) if mode == ValidationMode::Repair => {
                log::info!("{e}; updating the recorded checksum");
                metadata.update_checksum(row.id, script.checksum()).await?;
                outcome.repaired += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !session.evolve.config().out_of_order {
        let applied_versions = applied_versions(&applied);
        if let Some(script) = scripts.iter().find(|s| {
            s.version().is_some_and(|v| {
                *v >= start && v < last && !applied_versions.contains(v)
            })
        }) {
            return Err(EvolveError::NotApplied {
                name: script.name().to_string(),
                version: script.version().cloned().unwrap_or_else(Version::min),
                last: last.clone(),
            });
        }
    }

    Ok(outcome)
}

fn is_applied_migration(row: &MigrationMetadata) -> bool {
    row.kind == MetadataType::Migration && row.success
}

fn applied_versions(rows: &[MigrationMetadata]) -> HashSet<&Version> {
    rows.iter()
        .filter(|r| is_applied_migration(r))
        .filter_map(|r| r.version.as_ref())
        .collect()
}

/// Version of the most recently recorded successful migration, by `id`.
/// After an out-of-order run this can be lower than the highest version.
pub(crate) fn last_applied_version(rows: &[MigrationMetadata]) -> Option<&Version> {
    rows.iter()
        .filter(|r| is_applied_migration(r) && r.version.is_some())
        .max_by_key(|r| r.id)
        .and_then(|r| r.version.as_ref())
}

/// Start version recorded in `rows`
pub(crate) fn recorded_start_version(rows: &[MigrationMetadata]) -> Version {
    rows.iter()
        .rev()
        .find(|r| r.kind == MetadataType::StartVersion)
        .and_then(|r| r.version.clone())
        .unwrap_or_else(Version::min)
}

/// Versioned scripts `Migrate` would run, ascending: above the last applied
/// version (or below it too with out-of-order), at or above `start`, at or
/// below `target`, and never run successfully.
pub(crate) fn pending_versioned<'s>(
    scripts: &'s [MigrationScript],
    rows: &[MigrationMetadata],
    start: &Version,
    target: Option<&Version>,
    out_of_order: bool,
) -> Vec<&'s MigrationScript> {
    let applied = applied_versions(rows);
    let last = last_applied_version(rows);
    scripts
        .iter()
        .filter(|s| {
            let Some(version) = s.version() else {
                return false;
            };
            version >= start
                && target.map_or(true, |t| version <= t)
                && !applied.contains(version)
                && (out_of_order || last.map_or(true, |l| version > l))
        })
        .collect()
}

/// Repeatable scripts whose checksum differs from their latest successful
/// run, or that always re-run. Keeps the dependency order of `scripts`.
pub(crate) fn pending_repeatable<'s>(
    scripts: &'s [MigrationScript],
    rows: &[MigrationMetadata],
) -> Vec<&'s MigrationScript> {
    scripts
        .iter()
        .filter(|script| {
            if script.must_repeat_always() {
                return true;
            }
            let latest = rows
                .iter()
                .filter(|r| {
                    r.kind == MetadataType::RepeatableMigration
                        && r.success
                        && r.name == script.name()
                })
                .max_by_key(|r| (r.installed_on, r.id));
            match latest {
                Some(row) => script
                    .validate_checksum(row.checksum.as_deref().unwrap_or_default())
                    .is_err(),
                None => true,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;
