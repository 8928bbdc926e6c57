//! Metadata store: the in-database history of migration attempts.
//!
//! Rows are append-only except for checksum updates issued by Repair, and
//! are always read in insertion (`id`) order. Besides migrations the table
//! records bookkeeping markers: schemas Evolve created (droppable on
//! Erase), schemas found empty (erasable but not droppable) and the start
//! version.

use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evolve_core::{MigrationScript, Version};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

const MAX_DESCRIPTION_LEN: usize = 200;
const MAX_NAME_LEN: usize = 1000;

/// Kind of a metadata row. The numeric values are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataType {
    Migration = 0,
    NewSchema = 1,
    EmptySchema = 2,
    RepeatableMigration = 3,
    StartVersion = 4,
}

impl MetadataType {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(value: i16) -> DbResult<Self> {
        match value {
            0 => Ok(MetadataType::Migration),
            1 => Ok(MetadataType::NewSchema),
            2 => Ok(MetadataType::EmptySchema),
            3 => Ok(MetadataType::RepeatableMigration),
            4 => Ok(MetadataType::StartVersion),
            other => Err(DbError::InvalidMetadata(format!(
                "unknown metadata type {other}"
            ))),
        }
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetadataType::Migration => "Migration",
            MetadataType::NewSchema => "NewSchema",
            MetadataType::EmptySchema => "EmptySchema",
            MetadataType::RepeatableMigration => "RepeatableMigration",
            MetadataType::StartVersion => "StartVersion",
        };
        f.write_str(name)
    }
}

/// One persisted metadata row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationMetadata {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: MetadataType,
    pub version: Option<Version>,
    pub description: String,
    pub name: String,
    pub checksum: Option<String>,
    pub installed_by: String,
    pub installed_on: DateTime<Utc>,
    pub success: bool,
}

impl MigrationMetadata {
    /// Build a row from raw column values as stored by a backend.
    #[allow(clippy::too_many_arguments)]
    pub fn from_columns(
        id: i64,
        kind: i16,
        version: Option<String>,
        description: String,
        name: String,
        checksum: Option<String>,
        installed_by: String,
        installed_on: DateTime<Utc>,
        success: bool,
    ) -> DbResult<Self> {
        let version = version
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                Version::parse(&v).map_err(|e| {
                    DbError::InvalidMetadata(format!("row {id}: {e}"))
                })
            })
            .transpose()?;
        Ok(Self {
            id,
            kind: MetadataType::from_i16(kind)?,
            version,
            description,
            name,
            checksum,
            installed_by,
            installed_on,
            success,
        })
    }
}

/// A row to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMetadata {
    pub kind: MetadataType,
    pub version: Option<String>,
    pub description: String,
    pub name: String,
    pub checksum: Option<String>,
    pub success: bool,
}

/// Per-dialect access to the physical metadata table.
#[async_trait]
pub trait MetadataTable: Send + Sync {
    /// `schema.table` for logging
    fn qualified_name(&self) -> String;

    async fn exists(&self) -> DbResult<bool>;

    /// Create the table (and its id generator) if absent.
    async fn create(&self) -> DbResult<()>;

    /// Try to take the table lock without waiting.
    async fn try_lock(&self) -> DbResult<bool>;

    async fn release_lock(&self) -> DbResult<bool>;

    async fn insert(&self, row: &NewMetadata) -> DbResult<()>;

    async fn update_checksum(&self, id: i64, checksum: &str) -> DbResult<()>;

    /// Every row, ordered by `id`.
    async fn select_all(&self) -> DbResult<Vec<MigrationMetadata>>;
}

/// Metadata store over one backend table.
///
/// The table is created lazily before any read or write, except for
/// releasing the lock.
pub struct MetadataStore {
    table: Box<dyn MetadataTable>,
    created: AtomicBool,
}

impl MetadataStore {
    pub fn new(table: Box<dyn MetadataTable>) -> Self {
        Self {
            table,
            created: AtomicBool::new(false),
        }
    }

    pub fn qualified_name(&self) -> String {
        self.table.qualified_name()
    }

    /// Whether the table exists, without creating it.
    pub async fn is_exists(&self) -> DbResult<bool> {
        if self.created.load(Ordering::Acquire) {
            return Ok(true);
        }
        self.table.exists().await
    }

    /// Create the table if absent; returns whether it was created.
    pub async fn create_if_not_exists(&self) -> DbResult<bool> {
        if self.created.load(Ordering::Acquire) {
            return Ok(false);
        }
        let created = if self.table.exists().await? {
            false
        } else {
            log::debug!("Creating metadata table {}", self.qualified_name());
            self.table.create().await?;
            true
        };
        self.created.store(true, Ordering::Release);
        Ok(created)
    }

    /// Forget that the table was created, e.g. after its schema was erased.
    pub fn reset(&self) {
        self.created.store(false, Ordering::Release);
    }

    pub async fn try_lock(&self) -> DbResult<bool> {
        self.create_if_not_exists().await?;
        self.table.try_lock().await
    }

    pub async fn release_lock(&self) -> DbResult<bool> {
        self.table.release_lock().await
    }

    /// Record an attempt to run `script`.
    pub async fn save_migration(&self, script: &MigrationScript, success: bool) -> DbResult<()> {
        self.create_if_not_exists().await?;
        let kind = if script.is_repeatable() {
            MetadataType::RepeatableMigration
        } else {
            MetadataType::Migration
        };
        self.table
            .insert(&NewMetadata {
                kind,
                version: script.version().map(|v| v.to_string()),
                description: truncate(script.description(), MAX_DESCRIPTION_LEN),
                name: truncate(script.name(), MAX_NAME_LEN),
                checksum: Some(script.checksum().to_string()),
                success,
            })
            .await
    }

    /// Record a bookkeeping marker (no checksum).
    pub async fn save(
        &self,
        kind: MetadataType,
        version: &str,
        description: &str,
        name: &str,
    ) -> DbResult<()> {
        self.create_if_not_exists().await?;
        self.table
            .insert(&NewMetadata {
                kind,
                version: Some(version.to_string()),
                description: truncate(description, MAX_DESCRIPTION_LEN),
                name: truncate(name, MAX_NAME_LEN),
                checksum: None,
                success: true,
            })
            .await
    }

    pub async fn update_checksum(&self, id: i64, checksum: &str) -> DbResult<()> {
        self.create_if_not_exists().await?;
        self.table.update_checksum(id, checksum).await
    }

    /// Every row in insertion order.
    pub async fn get_all(&self) -> DbResult<Vec<MigrationMetadata>> {
        self.create_if_not_exists().await?;
        let mut rows = self.table.select_all().await?;
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    /// Successful versioned migration rows.
    pub async fn get_all_migration_metadata(&self) -> DbResult<Vec<MigrationMetadata>> {
        self.rows_of(MetadataType::Migration).await
    }

    /// Successful repeatable migration rows.
    pub async fn get_all_repeatable_migration_metadata(
        &self,
    ) -> DbResult<Vec<MigrationMetadata>> {
        self.rows_of(MetadataType::RepeatableMigration).await
    }

    async fn rows_of(&self, kind: MetadataType) -> DbResult<Vec<MigrationMetadata>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.kind == kind && r.success)
            .collect())
    }

    /// Version of the most recent start version marker.
    pub async fn find_start_version_marker(&self) -> DbResult<Option<Version>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .rev()
            .find(|r| r.kind == MetadataType::StartVersion)
            .and_then(|r| r.version))
    }

    /// Start version, or the smallest version when none was recorded.
    pub async fn find_start_version(&self) -> DbResult<Version> {
        Ok(self
            .find_start_version_marker()
            .await?
            .unwrap_or_else(Version::min))
    }

    /// Whether Evolve created `schema`.
    pub async fn can_drop_schema(&self, schema: &str) -> DbResult<bool> {
        self.has_marker(MetadataType::NewSchema, schema).await
    }

    /// Whether `schema` existed but was empty when Evolve first saw it.
    pub async fn can_erase_schema(&self, schema: &str) -> DbResult<bool> {
        self.has_marker(MetadataType::EmptySchema, schema).await
    }

    /// Whether either schema marker exists for `schema`.
    pub async fn has_schema_marker(&self, schema: &str) -> DbResult<bool> {
        Ok(self.can_drop_schema(schema).await? || self.can_erase_schema(schema).await?)
    }

    async fn has_marker(&self, kind: MetadataType, schema: &str) -> DbResult<bool> {
        Ok(self
            .get_all()
            .await?
            .iter()
            .any(|r| r.kind == kind && r.name.eq_ignore_ascii_case(schema)))
    }
}

/// Truncate to `max` characters, ending with `...` when shortened.
pub(crate) fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let kept: String = value.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
#[path = "metadata_test.rs"]
mod tests;
