//! Repair command

use super::{validate_applied, ValidationMode};
use crate::error::EvolveResult;
use crate::report::RepairReport;
use crate::session::Session;

pub(crate) async fn run(session: &Session<'_>) -> EvolveResult<RepairReport> {
    let scripts = session.evolve.load_scripts()?;
    let validation = validate_applied(session, &scripts.versioned, ValidationMode::Repair).await?;

    if validation.repaired == 0 {
        log::info!("Metadata validation successful: nothing to repair");
    } else {
        log::info!("Repaired {} checksum(s)", validation.repaired);
    }
    Ok(RepairReport {
        repaired: validation.repaired,
    })
}
