//! Validate command

use super::{pending_repeatable, pending_versioned, validate_applied, ValidationMode};
use crate::error::EvolveResult;
use crate::report::ValidateReport;
use crate::session::Session;

pub(crate) async fn run(session: &Session<'_>) -> EvolveResult<ValidateReport> {
    let evolve = session.evolve;
    let config = evolve.config();
    let metadata = &session.metadata;
    let scripts = evolve.load_scripts()?;
    let validation = validate_applied(session, &scripts.versioned, ValidationMode::Check).await?;

    let start = metadata.find_start_version().await?;
    let applied = metadata.get_all_migration_metadata().await?;
    let repeatable_rows = metadata.get_all_repeatable_migration_metadata().await?;
    let pending = pending_versioned(
        &scripts.versioned,
        &applied,
        &start,
        config.target_version.as_ref(),
        config.out_of_order,
    )
    .len()
        + pending_repeatable(&scripts.repeatable, &repeatable_rows).len();

    log::info!(
        "Validated {} applied migration(s); {pending} pending",
        validation.validated
    );
    Ok(ValidateReport {
        validated: validation.validated,
        pending,
    })
}
