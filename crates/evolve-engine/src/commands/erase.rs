//! Erase command

use crate::error::{EvolveError, EvolveResult};
use crate::report::EraseReport;
use crate::session::Session;
use evolve_db::MetadataType;

pub(crate) async fn run(session: &Session<'_>) -> EvolveResult<EraseReport> {
    if session.evolve.config().is_erase_disabled {
        return Err(EvolveError::EraseDisabled);
    }
    let report = erase_schemas(session).await?;
    log::info!(
        "Erase complete: {} dropped, {} erased, {} skipped",
        report.dropped.len(),
        report.erased.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Drop or empty every managed schema in reverse order, according to the
/// markers recorded when Evolve first saw it. Markers are read once up
/// front because erasing the metadata schema removes the table.
pub(crate) async fn erase_schemas(session: &Session<'_>) -> EvolveResult<EraseReport> {
    let db = session.evolve.database();
    let metadata = &session.metadata;

    let rows = if metadata.is_exists().await? {
        metadata.get_all().await?
    } else {
        log::info!("No metadata found in {}", metadata.qualified_name());
        Vec::new()
    };
    let marked = |kind: MetadataType, schema: &str| {
        rows.iter()
            .any(|r| r.kind == kind && r.name.eq_ignore_ascii_case(schema))
    };

    let wrap = db.dialect().supports_ddl_transactions() && !db.in_transaction();
    if wrap {
        db.begin_transaction().await?;
    }

    let mut report = EraseReport::default();
    let mut result = Ok(());
    for schema in session.schemas.iter().rev() {
        if marked(MetadataType::NewSchema, schema) {
            log::info!("Dropping schema {schema}");
            if let Err(e) = db.drop_schema(schema).await {
                result = Err(e);
                break;
            }
            report.dropped.push(schema.clone());
        } else if marked(MetadataType::EmptySchema, schema) {
            log::info!("Erasing schema {schema}");
            if let Err(e) = db.erase_schema(schema).await {
                result = Err(e);
                break;
            }
            report.erased.push(schema.clone());
        } else {
            log::warn!(
                "Cannot erase schema {schema}: it was not empty when Evolve first started migrations"
            );
            report.skipped.push(schema.clone());
        }
    }

    if wrap {
        match &result {
            Ok(()) => db.commit().await?,
            Err(_) => {
                if let Err(e) = db.rollback().await {
                    log::warn!("Rollback of erase failed: {e}");
                }
            }
        }
    }
    result?;

    metadata.reset();
    Ok(report)
}
