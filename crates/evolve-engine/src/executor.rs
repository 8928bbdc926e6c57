//! Script execution under the configured transaction mode
//!
//! `CommitEach` opens a transaction per run of transactional statements
//! and commits it together with the script's metadata row. `CommitAll` and
//! `RollbackAll` hold one transaction around the whole run and end it in
//! [`ScriptRunner::finish`]. A failed attempt always leaves a failed
//! metadata row behind, written after the rollback so it survives.

use crate::error::{EvolveError, EvolveResult};
use evolve_core::{LintLevel, MigrationScript, TransactionMode};
use evolve_db::{Database, MetadataStore};
use evolve_sql::{Placeholders, SqlStatement};
use std::time::Instant;

pub(crate) struct ScriptRunner<'a> {
    db: &'a dyn Database,
    metadata: &'a MetadataStore,
    placeholders: Placeholders,
    lint: LintLevel,
    delimiter: Option<String>,
    split_on_terminator: bool,
    mode: TransactionMode,
}

impl<'a> ScriptRunner<'a> {
    pub(crate) fn new(
        db: &'a dyn Database,
        metadata: &'a MetadataStore,
        placeholders: Placeholders,
        lint: LintLevel,
        delimiter: Option<String>,
        split_on_terminator: bool,
        mode: TransactionMode,
    ) -> Self {
        Self {
            db,
            metadata,
            placeholders,
            lint,
            delimiter,
            split_on_terminator,
            mode,
        }
    }

    fn holds_run_transaction(&self) -> bool {
        self.mode != TransactionMode::CommitEach
    }

    fn split(&self, script: &MigrationScript) -> EvolveResult<Vec<SqlStatement>> {
        let mut statements = self.db.split_statements(
            script.content(),
            &self.placeholders,
            self.lint,
            self.delimiter.as_deref(),
            self.split_on_terminator,
        )?;
        if script.is_transaction_disabled() {
            for statement in &mut statements {
                statement.must_execute_in_transaction = false;
            }
        }
        Ok(statements)
    }

    /// Check `scripts` against the mode and open the run-wide transaction.
    pub(crate) async fn begin(&self, scripts: &[&MigrationScript]) -> EvolveResult<()> {
        if !self.holds_run_transaction() || scripts.is_empty() {
            return Ok(());
        }

        let transactional = self.db.dialect().supports_ddl_transactions();
        for script in scripts {
            let statements = self.split(script)?;
            if !transactional || statements.iter().any(|s| !s.must_execute_in_transaction) {
                return Err(EvolveError::TransactionDisabled {
                    name: script.name().to_string(),
                    mode: self.mode,
                });
            }
        }

        self.db.begin_transaction().await?;
        Ok(())
    }

    /// End the run-wide transaction: commit for `CommitAll`, roll back for
    /// `RollbackAll` and whenever the run failed.
    pub(crate) async fn finish(&self, success: bool) -> EvolveResult<()> {
        if !self.db.in_transaction() {
            return Ok(());
        }
        match self.mode {
            TransactionMode::CommitAll if success => {
                self.db.commit().await?;
            }
            TransactionMode::RollbackAll if success => {
                self.db.rollback().await?;
                log::info!("All changes rolled back (rollback_all)");
            }
            _ => self.db.rollback().await?,
        }
        Ok(())
    }

    /// Execute one script and record the attempt.
    pub(crate) async fn run(&self, script: &MigrationScript) -> EvolveResult<()> {
        let start = Instant::now();
        let statements = self.split(script)?;
        let transactional =
            !self.holds_run_transaction() && self.db.dialect().supports_ddl_transactions();

        log::info!("Executing {}", script.name());

        for statement in &statements {
            if transactional {
                if statement.must_execute_in_transaction {
                    if !self.db.in_transaction() {
                        self.db.begin_transaction().await?;
                    }
                } else if self.db.in_transaction() {
                    self.db.commit().await?;
                }
            }

            if let Err(source) = self.db.execute(&statement.sql).await {
                log::debug!(
                    "{} failed at line {}: {source}",
                    script.name(),
                    statement.line_number + 1
                );
                if self.db.in_transaction() {
                    if let Err(e) = self.db.rollback().await {
                        log::warn!("Rollback of {} failed: {e}", script.name());
                    }
                }
                self.metadata.save_migration(script, false).await?;
                return Err(EvolveError::Execution {
                    name: script.name().to_string(),
                    elapsed: start.elapsed(),
                    source,
                });
            }
        }

        self.metadata.save_migration(script, true).await?;
        if transactional && self.db.in_transaction() {
            self.db.commit().await?;
        }

        log::info!(
            "Successfully applied {} in {}ms",
            script.name(),
            start.elapsed().as_millis()
        );
        Ok(())
    }

    /// Record `script` as applied without executing it.
    pub(crate) async fn mark_applied(&self, script: &MigrationScript) -> EvolveResult<()> {
        self.metadata.save_migration(script, true).await?;
        log::info!("Marked {} as applied without executing it", script.name());
        Ok(())
    }
}
