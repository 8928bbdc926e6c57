//! Migration loaders: where scripts come from.

use crate::config::Encoding;
use crate::error::{CoreError, CoreResult};
use crate::migration::{check_duplicates, MigrationScript, NamingConvention};
use std::path::{Path, PathBuf};

/// Source of migration scripts.
///
/// Both methods return duplicate-checked scripts; versioned scripts are
/// sorted by version and repeatable scripts by name.
pub trait MigrationLoader: Send + Sync {
    fn versioned_migrations(&self, naming: &NamingConvention) -> CoreResult<Vec<MigrationScript>>;

    fn repeatable_migrations(
        &self,
        naming: &NamingConvention,
    ) -> CoreResult<Vec<MigrationScript>>;
}

/// Loads scripts from directories on disk, recursively.
#[derive(Debug, Clone)]
pub struct FileMigrationLoader {
    locations: Vec<PathBuf>,
    encoding: Encoding,
}

impl FileMigrationLoader {
    pub fn new(locations: Vec<PathBuf>, encoding: Encoding) -> Self {
        Self {
            locations,
            encoding,
        }
    }

    fn load(&self, naming: &NamingConvention, versioned: bool) -> CoreResult<Vec<MigrationScript>> {
        let mut files = Vec::new();
        for location in &self.locations {
            if !location.is_dir() {
                log::warn!(
                    "Script location {} does not exist or is not a directory",
                    location.display()
                );
                continue;
            }
            discover_recursive(location, naming, &mut files)?;
        }

        let mut scripts = Vec::with_capacity(files.len());
        for path in files {
            let bytes = std::fs::read(&path).map_err(|e| CoreError::IoWithPath {
                path: path.display().to_string(),
                source: e,
            })?;
            let content = self.encoding.decode(&path, &bytes)?;
            let name = file_name(&path);
            let script = if versioned {
                MigrationScript::versioned(name, content, naming)?
            } else {
                MigrationScript::repeatable(name, content, naming)?
            };
            scripts.push(script.with_raw_bytes(bytes));
        }

        finish(scripts, versioned)
    }
}

impl MigrationLoader for FileMigrationLoader {
    fn versioned_migrations(&self, naming: &NamingConvention) -> CoreResult<Vec<MigrationScript>> {
        self.load(naming, true)
    }

    fn repeatable_migrations(
        &self,
        naming: &NamingConvention,
    ) -> CoreResult<Vec<MigrationScript>> {
        self.load(naming, false)
    }
}

/// Loads scripts compiled into the binary, e.g. with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedMigrationLoader {
    scripts: Vec<(String, String)>,
}

impl EmbeddedMigrationLoader {
    pub fn new<N, C>(scripts: impl IntoIterator<Item = (N, C)>) -> Self
    where
        N: Into<String>,
        C: Into<String>,
    {
        Self {
            scripts: scripts
                .into_iter()
                .map(|(n, c)| (n.into(), c.into()))
                .collect(),
        }
    }

    /// Add one script.
    pub fn with_script(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.scripts.push((name.into(), content.into()));
        self
    }

    fn load(&self, naming: &NamingConvention, versioned: bool) -> CoreResult<Vec<MigrationScript>> {
        let scripts = self
            .scripts
            .iter()
            // Embedded names may carry a path or namespace
            .map(|(name, content)| (base_name(name), content))
            .filter(|(name, _)| naming.matches(name))
            .map(|(name, content)| {
                let content = content.strip_prefix('\u{feff}').unwrap_or(content);
                if versioned {
                    MigrationScript::versioned(name, content, naming)
                } else {
                    MigrationScript::repeatable(name, content, naming)
                }
            })
            .collect::<CoreResult<Vec<_>>>()?;

        finish(scripts, versioned)
    }
}

impl MigrationLoader for EmbeddedMigrationLoader {
    fn versioned_migrations(&self, naming: &NamingConvention) -> CoreResult<Vec<MigrationScript>> {
        self.load(naming, true)
    }

    fn repeatable_migrations(
        &self,
        naming: &NamingConvention,
    ) -> CoreResult<Vec<MigrationScript>> {
        self.load(naming, false)
    }
}

fn finish(mut scripts: Vec<MigrationScript>, versioned: bool) -> CoreResult<Vec<MigrationScript>> {
    check_duplicates(&scripts)?;
    if versioned {
        scripts.sort_by(|a, b| a.version().cmp(&b.version()));
    } else {
        scripts.sort_by(|a, b| a.name().cmp(b.name()));
    }
    Ok(scripts)
}

fn discover_recursive(
    dir: &Path,
    naming: &NamingConvention,
    files: &mut Vec<PathBuf>,
) -> CoreResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| CoreError::IoWithPath {
        path: dir.display().to_string(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| CoreError::IoWithPath {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() {
            discover_recursive(&path, naming, files)?;
            continue;
        }
        if naming.matches(&file_name(&path)) {
            files.push(path);
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
