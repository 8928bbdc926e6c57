//! Migrate command

use super::{pending_repeatable, pending_versioned, validate_applied, ValidationMode};
use crate::commands::erase::erase_schemas;
use crate::error::{ErrorKind, EvolveError, EvolveResult};
use crate::executor::ScriptRunner;
use crate::report::MigrateReport;
use crate::session::Session;
use evolve_core::{EvolveConfig, MigrationScript, TransactionMode};
use std::time::Instant;

pub(crate) async fn run(session: &Session<'_>) -> EvolveResult<MigrateReport> {
    let started = Instant::now();
    let evolve = session.evolve;
    let config = evolve.config();
    let scripts = evolve.load_scripts()?;

    validate_or_erase(session, &scripts.versioned).await?;

    let mut report = MigrateReport::default();
    if scripts.versioned.is_empty() && scripts.repeatable.is_empty() {
        log::info!("No migration script found");
        report.elapsed = started.elapsed();
        return Ok(report);
    }

    let metadata = &session.metadata;
    let start = metadata.find_start_version().await?;
    let applied = metadata.get_all_migration_metadata().await?;
    let versioned = pending_versioned(
        &scripts.versioned,
        &applied,
        &start,
        config.target_version.as_ref(),
        config.out_of_order,
    );
    let repeatable_rows = metadata.get_all_repeatable_migration_metadata().await?;
    let repeatable = pending_repeatable(&scripts.repeatable, &repeatable_rows);

    let runner = evolve.runner(metadata);
    let mut executed: Vec<&MigrationScript> = Vec::new();
    if !config.skip_next_migrations {
        executed.extend(&versioned);
    }
    executed.extend(&repeatable);
    runner.begin(&executed).await?;

    let result = apply(&runner, config, &versioned, &repeatable, &mut report).await;
    let finished = runner.finish(result.is_ok()).await;
    if let (Err(_), Err(e)) = (&result, &finished) {
        log::warn!("Failed to end the run transaction: {e}");
    }
    result?;
    finished?;

    report.elapsed = started.elapsed();
    if report.applied == 0 && report.skipped == 0 {
        log::info!("Database is up to date. No migration needed");
    } else {
        log::info!(
            "Applied {} migration(s) in {}ms",
            report.applied,
            report.elapsed.as_millis()
        );
    }
    Ok(report)
}

/// Validation pass; with `must_erase_on_validation_error` a validation
/// failure erases the managed schemas and starts over from scratch.
async fn validate_or_erase(
    session: &Session<'_>,
    scripts: &[MigrationScript],
) -> EvolveResult<()> {
    let evolve = session.evolve;
    let config = evolve.config();
    match validate_applied(session, scripts, ValidationMode::Check).await {
        Err(e) if e.kind() == ErrorKind::Validation && config.must_erase_on_validation_error => {
            if config.is_erase_disabled {
                log::error!("Cannot erase on validation error: erase is disabled");
                return Err(e);
            }
            log::warn!("{e}");
            log::warn!("Erasing the database (must_erase_on_validation_error)");
            erase_schemas(session).await?;
            evolve.manage_schemas(session).await?;
            evolve.apply_start_version(&session.metadata).await
        }
        other => other.map(|_| ()),
    }
}

async fn apply(
    runner: &ScriptRunner<'_>,
    config: &EvolveConfig,
    versioned: &[&MigrationScript],
    repeatable: &[&MigrationScript],
    report: &mut MigrateReport,
) -> EvolveResult<()> {
    for script in versioned {
        if config.skip_next_migrations {
            runner.mark_applied(script).await?;
            report.skipped += 1;
        } else {
            runner.run(script).await?;
            report.applied += 1;
        }
    }

    let retry = config.retry_repeatable_migrations_until_no_error
        && config.transaction_mode == TransactionMode::CommitEach;
    report.applied += if retry {
        run_repeatable_until_no_error(runner, repeatable).await?
    } else {
        for script in repeatable {
            runner.run(script).await?;
        }
        repeatable.len()
    };
    Ok(())
}

/// Re-run the failed repeatable scripts while each pass fails fewer of them.
async fn run_repeatable_until_no_error(
    runner: &ScriptRunner<'_>,
    scripts: &[&MigrationScript],
) -> EvolveResult<usize> {
    let mut remaining = scripts.to_vec();
    let mut previous_failures: Option<usize> = None;
    let mut applied = 0;

    loop {
        let mut failed = Vec::new();
        for script in remaining {
            match runner.run(script).await {
                Ok(()) => applied += 1,
                Err(e @ EvolveError::Execution { .. }) => {
                    log::warn!("{e}");
                    failed.push(script);
                }
                Err(e) => return Err(e),
            }
        }

        if failed.is_empty() {
            return Ok(applied);
        }
        if previous_failures.is_some_and(|previous| failed.len() >= previous) {
            return Err(EvolveError::RepeatableFailures {
                count: failed.len(),
                names: failed
                    .iter()
                    .map(|s| s.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        log::info!("Retrying {} failed repeatable migration(s)", failed.len());
        previous_failures = Some(failed.len());
        remaining = failed;
    }
}
