//! Report printing

use anyhow::Result;
use evolve_engine::{CommandReport, InfoReport, PendingMigration};
use evolve_db::{MetadataType, MigrationMetadata};

use crate::cli::OutputFormat;

/// Print the outcome of a command to stdout.
pub(crate) fn print_report(report: &CommandReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    match report {
        CommandReport::DoNothing => {}
        CommandReport::Migrate(m) => {
            if m.skipped > 0 {
                println!(
                    "Migrated: {} applied, {} marked as applied ({}ms)",
                    m.applied,
                    m.skipped,
                    m.elapsed.as_millis()
                );
            } else {
                println!("Migrated: {} applied ({}ms)", m.applied, m.elapsed.as_millis());
            }
        }
        CommandReport::Repair(r) => println!("Repaired {} checksum(s)", r.repaired),
        CommandReport::Erase(e) => {
            for schema in &e.dropped {
                println!("  Dropped: {schema}");
            }
            for schema in &e.erased {
                println!("  Erased: {schema}");
            }
            for schema in &e.skipped {
                println!("  Skipped: {schema}");
            }
        }
        CommandReport::Info(info) => print_info(info),
        CommandReport::Validate(v) => println!(
            "Validated {} applied migration(s), {} pending",
            v.validated, v.pending
        ),
    }
    Ok(())
}

fn print_info(info: &InfoReport) {
    if info.rows.is_empty() {
        println!("No migration history found");
    } else {
        print_table(
            &["ID", "TYPE", "VERSION", "NAME", "INSTALLED ON", "BY", "STATUS"],
            &history_rows(&info.rows),
        );
    }

    println!();
    if info.pending.is_empty() {
        println!("No pending migrations");
    } else {
        println!("Pending:");
        print_table(&["VERSION", "NAME", "DESCRIPTION"], &pending_rows(&info.pending));
    }
}

fn history_rows(rows: &[MigrationMetadata]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| {
            vec![
                r.id.to_string(),
                type_label(r.kind).to_string(),
                r.version.as_ref().map(|v| v.to_string()).unwrap_or_default(),
                r.name.clone(),
                r.installed_on.format("%Y-%m-%d %H:%M:%S").to_string(),
                r.installed_by.clone(),
                if r.success { "success" } else { "failed" }.to_string(),
            ]
        })
        .collect()
}

fn pending_rows(pending: &[PendingMigration]) -> Vec<Vec<String>> {
    pending
        .iter()
        .map(|p| {
            vec![
                p.version.as_ref().map(|v| v.to_string()).unwrap_or_default(),
                p.name.clone(),
                p.description.clone(),
            ]
        })
        .collect()
}

fn type_label(kind: MetadataType) -> &'static str {
    match kind {
        MetadataType::Migration => "versioned",
        MetadataType::RepeatableMigration => "repeatable",
        MetadataType::NewSchema => "new schema",
        MetadataType::EmptySchema => "empty schema",
        MetadataType::StartVersion => "start version",
    }
}

/// Column widths: the widest of the header and every cell.
fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

fn format_row(cells: impl Iterator<Item = impl AsRef<str>>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, &w)| format!("{:<width$}", cell.as_ref(), width = w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Print a left-aligned table with a dashed separator under the header.
fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);
    println!("{}", format_row(headers.iter(), &widths));
    println!("{}", format_row(widths.iter().map(|&w| "-".repeat(w)), &widths));
    for row in rows {
        println!("{}", format_row(row.iter(), &widths));
    }
}
