//! The `Evolve` orchestrator

use crate::commands;
use crate::error::EvolveResult;
use crate::executor::ScriptRunner;
use crate::lock::{CancelHandle, LockPolicy};
use crate::report::{
    CommandReport, EraseReport, InfoReport, MigrateReport, RepairReport, ValidateReport,
};
use evolve_core::{
    sort_with_dependencies, Command, CoreError, EvolveConfig, FileMigrationLoader,
    MigrationLoader, MigrationScript,
};
use evolve_db::{Database, DriverRegistry, MetadataStore};
use evolve_sql::Placeholders;
use std::path::PathBuf;
use std::time::Duration;

/// Scripts of one run: versioned ordered by version, repeatable ordered by
/// declared dependencies.
pub(crate) struct Scripts {
    pub(crate) versioned: Vec<MigrationScript>,
    pub(crate) repeatable: Vec<MigrationScript>,
}

/// Migration engine bound to one open connection.
///
/// The connection stays open for the lifetime of the value, so
/// session-scoped advisory locks are never dropped mid-command.
pub struct Evolve {
    config: EvolveConfig,
    db: Box<dyn Database>,
    loader: Box<dyn MigrationLoader>,
    cancel: CancelHandle,
}

impl Evolve {
    /// Create an engine over an already opened database.
    pub fn new(
        config: EvolveConfig,
        db: Box<dyn Database>,
        loader: Box<dyn MigrationLoader>,
    ) -> EvolveResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            db,
            loader,
            cancel: CancelHandle::new(),
        })
    }

    /// Open `config.connection_string` through `registry`, detecting the
    /// dialect unless one is configured, and load scripts from
    /// `config.locations`.
    pub async fn connect(config: EvolveConfig, registry: &DriverRegistry) -> EvolveResult<Self> {
        config.validate()?;
        let connection_string = config
            .connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| CoreError::ConfigInvalid {
                message: "connection_string is required".to_string(),
            })?;

        let db = registry.connect(connection_string, config.dialect).await?;
        let loader = FileMigrationLoader::new(
            config.locations.iter().map(PathBuf::from).collect(),
            config.encoding,
        );
        Self::new(config, db, Box::new(loader))
    }

    pub fn config(&self) -> &EvolveConfig {
        &self.config
    }

    pub fn database(&self) -> &dyn Database {
        self.db.as_ref()
    }

    /// Handle that interrupts lock waits of this engine
    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    /// Run the configured command.
    pub async fn execute(&self) -> EvolveResult<CommandReport> {
        let report = match self.config.command {
            Command::DoNothing => {
                log::info!("Evolve command is do_nothing; nothing to execute");
                CommandReport::DoNothing
            }
            Command::Migrate => CommandReport::Migrate(self.migrate().await?),
            Command::Repair => CommandReport::Repair(self.repair().await?),
            Command::Erase => CommandReport::Erase(self.erase().await?),
            Command::Info => CommandReport::Info(self.info().await?),
            Command::Validate => CommandReport::Validate(self.validate().await?),
        };
        Ok(report)
    }

    /// Apply pending versioned migrations, then changed repeatable ones.
    pub async fn migrate(&self) -> EvolveResult<MigrateReport> {
        let session = self.open(Command::Migrate).await?;
        let result = commands::migrate::run(&session).await;
        session.release().await;
        result
    }

    /// Realign recorded checksums with the current scripts.
    pub async fn repair(&self) -> EvolveResult<RepairReport> {
        let session = self.open(Command::Repair).await?;
        let result = commands::repair::run(&session).await;
        session.release().await;
        result
    }

    /// Drop schemas Evolve created and empty the ones it found empty.
    pub async fn erase(&self) -> EvolveResult<EraseReport> {
        let session = self.open(Command::Erase).await?;
        let result = commands::erase::run(&session).await;
        session.release().await;
        result
    }

    /// Read the metadata history and list pending scripts.
    pub async fn info(&self) -> EvolveResult<InfoReport> {
        let session = self.open(Command::Info).await?;
        let result = commands::info::run(&session).await;
        session.release().await;
        result
    }

    /// Check applied migrations against the scripts without changing anything.
    pub async fn validate(&self) -> EvolveResult<ValidateReport> {
        let session = self.open(Command::Validate).await?;
        let result = commands::validate::run(&session).await;
        session.release().await;
        result
    }

    pub(crate) fn lock_policy(&self) -> LockPolicy {
        LockPolicy::new(
            Duration::from_secs(self.config.lock_poll_interval_secs),
            self.config.lock_max_attempts,
        )
    }

    pub(crate) fn load_scripts(&self) -> EvolveResult<Scripts> {
        let versioned = self
            .loader
            .versioned_migrations(&self.config.versioned_naming())?;
        let repeatable = sort_with_dependencies(
            self.loader
                .repeatable_migrations(&self.config.repeatable_naming())?,
        )?;
        log::debug!(
            "Loaded {} versioned and {} repeatable script(s)",
            versioned.len(),
            repeatable.len()
        );
        Ok(Scripts {
            versioned,
            repeatable,
        })
    }

    pub(crate) fn runner<'a>(&'a self, metadata: &'a MetadataStore) -> ScriptRunner<'a> {
        ScriptRunner::new(
            self.db.as_ref(),
            metadata,
            Placeholders::from(self.config.placeholder_tokens()),
            self.config.sql_lint_level,
            self.config.batch_delimiter.clone(),
            self.config.split_on_terminator,
            self.config.transaction_mode,
        )
    }
}
