//! Info command

use super::{pending_repeatable, pending_versioned, recorded_start_version};
use crate::error::EvolveResult;
use crate::report::{InfoReport, PendingMigration};
use crate::session::Session;
use evolve_db::{DbResult, MigrationMetadata};

pub(crate) async fn run(session: &Session<'_>) -> EvolveResult<InfoReport> {
    let evolve = session.evolve;
    let config = evolve.config();

    let rows = match read_rows(session).await {
        Ok(rows) => rows,
        Err(e) => {
            log::warn!("No metadata found: {e}");
            Vec::new()
        }
    };

    let scripts = evolve.load_scripts()?;
    let start = recorded_start_version(&rows);
    let mut pending: Vec<PendingMigration> = pending_versioned(
        &scripts.versioned,
        &rows,
        &start,
        config.target_version.as_ref(),
        config.out_of_order,
    )
    .into_iter()
    .map(PendingMigration::from)
    .collect();
    pending.extend(
        pending_repeatable(&scripts.repeatable, &rows)
            .into_iter()
            .map(PendingMigration::from),
    );

    Ok(InfoReport { rows, pending })
}

/// All metadata rows, without creating the table when it is absent.
async fn read_rows(session: &Session<'_>) -> DbResult<Vec<MigrationMetadata>> {
    if !session.metadata.is_exists().await? {
        log::info!("No metadata found in {}", session.metadata.qualified_name());
        return Ok(Vec::new());
    }
    session.metadata.get_all().await
}
