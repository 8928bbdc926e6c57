//! Command envelope: connection probe, two-phase cluster lock, schema
//! management and start version, then guaranteed lock release.

use crate::error::{EvolveError, EvolveResult};
use crate::evolve::Evolve;
use crate::lock::{wait_for_lock, APPLICATION_LOCK, METADATA_LOCK};
use evolve_core::{Command, Version};
use evolve_db::{MetadataStore, MetadataType};
use std::time::Duration;

/// Name of the start version marker row
const START_VERSION_MARKER: &str = "Start version";

/// State held between opening and releasing the envelope of one command.
pub(crate) struct Session<'a> {
    pub(crate) evolve: &'a Evolve,
    pub(crate) metadata: MetadataStore,
    /// Managed schemas, metadata schema first
    pub(crate) schemas: Vec<String>,
    application_locked: bool,
    metadata_locked: bool,
}

impl Session<'_> {
    /// Release whatever locks were taken. Failures are logged so they do
    /// not hide the command's own result.
    pub(crate) async fn release(self) {
        if self.metadata_locked {
            match self.metadata.release_lock().await {
                Ok(true) => {}
                Ok(false) => log::warn!("The {METADATA_LOCK} was not held at release"),
                Err(e) => log::warn!("Failed to release the {METADATA_LOCK}: {e}"),
            }
        }
        if self.application_locked {
            match self.evolve.database().release_application_lock().await {
                Ok(true) => {}
                Ok(false) => log::warn!("The {APPLICATION_LOCK} was not held at release"),
                Err(e) => log::warn!("Failed to release the {APPLICATION_LOCK}: {e}"),
            }
        }
    }
}

impl Evolve {
    /// Run envelope steps up to the command body. On failure every lock
    /// taken so far is released before returning.
    pub(crate) async fn open(&self, command: Command) -> EvolveResult<Session<'_>> {
        let db = self.database();
        let version = db.server_version().await?;
        log::info!("Evolve connected to {} {version}", db.dialect());

        if let Some(secs) = self.config().command_timeout_secs {
            db.set_command_timeout(Duration::from_secs(secs)).await?;
        }

        let (metadata_schema, schemas) = self.managed_schemas().await?;
        let metadata = db.metadata_table(&metadata_schema, &self.config().metadata_table_name);
        log::debug!("Metadata table: {}", metadata.qualified_name());

        let mut session = Session {
            evolve: self,
            metadata,
            schemas,
            application_locked: false,
            metadata_locked: false,
        };

        if let Err(e) = self.prepare(&mut session, command).await {
            session.release().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn prepare(&self, session: &mut Session<'_>, command: Command) -> EvolveResult<()> {
        let config = self.config();
        let db = self.database();
        let manages_schemas = matches!(
            command,
            Command::Migrate | Command::Repair | Command::Validate
        );

        if config.enable_cluster_mode {
            wait_for_lock(
                APPLICATION_LOCK,
                self.lock_policy(),
                self.cancel_handle(),
                || db.try_acquire_application_lock(),
            )
            .await?;
            session.application_locked = true;
        }

        if manages_schemas {
            self.manage_schemas(session).await?;
        }

        if config.enable_cluster_mode && (manages_schemas || session.metadata.is_exists().await?) {
            let metadata = &session.metadata;
            wait_for_lock(
                METADATA_LOCK,
                self.lock_policy(),
                self.cancel_handle(),
                || metadata.try_lock(),
            )
            .await?;
            session.metadata_locked = true;
        }

        if !matches!(command, Command::Erase | Command::Info) {
            self.apply_start_version(&session.metadata).await?;
        }
        Ok(())
    }

    /// Configured schemas (or the current one) with the metadata schema
    /// moved to the front, since markers are written there.
    async fn managed_schemas(&self) -> EvolveResult<(String, Vec<String>)> {
        let config = self.config();
        let mut schemas = if config.schemas.is_empty() {
            vec![self.database().current_schema().await?]
        } else {
            config.schemas.clone()
        };

        let metadata_schema = match &config.metadata_table_schema {
            Some(schema) => schema.clone(),
            None => schemas.first().cloned().unwrap_or_default(),
        };
        schemas.retain(|s| s != &metadata_schema);
        schemas.insert(0, metadata_schema.clone());
        Ok((metadata_schema, schemas))
    }

    /// Create missing schemas and record which schemas Evolve may later
    /// drop (created) or erase (found empty). Each schema is marked once.
    pub(crate) async fn manage_schemas(&self, session: &Session<'_>) -> EvolveResult<()> {
        let db = self.database();
        for schema in &session.schemas {
            if !db.schema_exists(schema).await? {
                log::info!("Schema {schema} does not exist; creating it");
                db.create_schema(schema).await?;
                session
                    .metadata
                    .save(
                        MetadataType::NewSchema,
                        "0",
                        &format!("Create new schema: {schema}"),
                        schema,
                    )
                    .await?;
            } else if db.schema_is_empty(schema).await?
                && !session.metadata.has_schema_marker(schema).await?
            {
                log::info!("Schema {schema} is empty");
                session
                    .metadata
                    .save(
                        MetadataType::EmptySchema,
                        "0",
                        &format!("Empty schema found: {schema}"),
                        schema,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Record the configured start version the first time it is set.
    pub(crate) async fn apply_start_version(&self, metadata: &MetadataStore) -> EvolveResult<()> {
        let Some(start) = &self.config().start_version else {
            return Ok(());
        };
        if *start == Version::min() {
            return Ok(());
        }

        match metadata.find_start_version_marker().await? {
            Some(current) if current == *start => return Ok(()),
            Some(current) => {
                return Err(EvolveError::StartVersion {
                    message: format!(
                        "the database is already flagged with start version {current}; cannot change it to {start}"
                    ),
                })
            }
            None => {}
        }

        if !metadata.get_all_migration_metadata().await?.is_empty() {
            return Err(EvolveError::StartVersion {
                message: format!(
                    "cannot set start version {start} once migrations have been applied"
                ),
            });
        }

        log::info!("Skipping migrations below version {start}");
        metadata
            .save(
                MetadataType::StartVersion,
                &start.to_string(),
                &format!("Skip migrations until version {start} excluded"),
                START_VERSION_MARKER,
            )
            .await?;
        Ok(())
    }
}
