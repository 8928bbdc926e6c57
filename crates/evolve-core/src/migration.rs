//! Migration script model.
//!
//! A script is either *versioned* (`V1_3_1__Add_users.sql`, applied once)
//! or *repeatable* (`R__Users_view.sql`, re-applied whenever its content
//! changes). Scripts are built fresh from the loader output on every run.

use crate::checksum::{compute_checksum, compute_raw_checksum};
use crate::directive::Directives;
use crate::error::{CoreError, CoreResult};
use crate::version::Version;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// File naming convention used to extract versions and descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConvention {
    pub prefix: String,
    pub separator: String,
    pub suffix: String,
}

impl NamingConvention {
    pub fn new(
        prefix: impl Into<String>,
        separator: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            suffix: suffix.into(),
        }
    }

    /// Whether a file name looks like a script of this convention.
    pub fn matches(&self, file_name: &str) -> bool {
        starts_with_ignore_case(file_name, &self.prefix)
            && ends_with_ignore_case(file_name, &self.suffix)
    }
}

/// Versioned or repeatable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationKind {
    Versioned(Version),
    Repeatable,
}

/// Identity of a script within its kind: the version for versioned
/// scripts, the name for repeatable ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationKey {
    Version(Version),
    Name(String),
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationKey::Version(v) => write!(f, "version {v}"),
            MigrationKey::Name(n) => write!(f, "name {n}"),
        }
    }
}

/// One loaded migration script.
#[derive(Debug, Clone)]
pub struct MigrationScript {
    kind: MigrationKind,
    name: String,
    description: String,
    content: String,
    raw: Option<Vec<u8>>,
    suffix: String,
    directives: Directives,
    checksum: OnceLock<String>,
}

impl MigrationScript {
    /// Build a versioned script from its file name, e.g.
    /// `V1_3_1__Migration_description.sql` -> version `1.3.1`,
    /// description `Migration description`.
    pub fn versioned(
        name: impl Into<String>,
        content: impl Into<String>,
        naming: &NamingConvention,
    ) -> CoreResult<Self> {
        let name = name.into();
        let (version_part, description) = split_name(&name, naming)?;
        if version_part.is_empty() {
            return Err(invalid_name(&name, "version is empty"));
        }
        let version = Version::parse(version_part).map_err(|_| {
            invalid_name(&name, &format!("'{version_part}' is not a valid version"))
        })?;
        Ok(Self::build(
            MigrationKind::Versioned(version),
            name,
            description,
            content.into(),
            naming,
        ))
    }

    /// Build a repeatable script from its file name, e.g.
    /// `R__Create_views.sql` -> description `Create views`.
    pub fn repeatable(
        name: impl Into<String>,
        content: impl Into<String>,
        naming: &NamingConvention,
    ) -> CoreResult<Self> {
        let name = name.into();
        let (_, description) = split_name(&name, naming)?;
        Ok(Self::build(
            MigrationKind::Repeatable,
            name,
            description,
            content.into(),
            naming,
        ))
    }

    fn build(
        kind: MigrationKind,
        name: String,
        description: String,
        content: String,
        naming: &NamingConvention,
    ) -> Self {
        let mut directives = Directives::parse(&content);
        if matches!(kind, MigrationKind::Versioned(_))
            && (directives.repeat_always || !directives.dependencies.is_empty())
        {
            log::warn!(
                "Migration {name}: repeatable-only directives are ignored on versioned scripts"
            );
            directives.repeat_always = false;
            directives.dependencies.clear();
        }

        Self {
            kind,
            name,
            description,
            content,
            raw: None,
            suffix: naming.suffix.clone(),
            directives,
            checksum: OnceLock::new(),
        }
    }

    /// Attach the undecoded file bytes, used by the legacy checksum fallback.
    pub fn with_raw_bytes(mut self, raw: Vec<u8>) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn kind(&self) -> &MigrationKind {
        &self.kind
    }

    /// Version of a versioned script, `None` for repeatable ones.
    pub fn version(&self) -> Option<&Version> {
        match &self.kind {
            MigrationKind::Versioned(v) => Some(v),
            MigrationKind::Repeatable => None,
        }
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self.kind, MigrationKind::Repeatable)
    }

    /// Full script file name; the join key against the metadata table.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn directives(&self) -> &Directives {
        &self.directives
    }

    /// Run outside of any transaction (`evolve-tx-off`).
    pub fn is_transaction_disabled(&self) -> bool {
        self.directives.tx_off
    }

    /// Re-run on every migrate (`evolve-repeat-always`).
    pub fn must_repeat_always(&self) -> bool {
        self.directives.repeat_always
    }

    /// Repeatable scripts this one must run after.
    pub fn dependencies(&self) -> &[String] {
        &self.directives.dependencies
    }

    /// Identity key within its kind.
    pub fn key(&self) -> MigrationKey {
        match &self.kind {
            MigrationKind::Versioned(v) => MigrationKey::Version(v.clone()),
            MigrationKind::Repeatable => MigrationKey::Name(self.name.clone()),
        }
    }

    /// File name with spaces replaced by underscores; dependency lookup key.
    pub fn identity_key(&self) -> String {
        normalize_identity(&self.name)
    }

    /// [`identity_key`](Self::identity_key) without the script suffix.
    pub fn stem_key(&self) -> String {
        let key = self.identity_key();
        if ends_with_ignore_case(&key, &self.suffix) && !self.suffix.is_empty() {
            key[..key.len() - self.suffix.len()].to_string()
        } else {
            key
        }
    }

    /// MD5 of the content with line endings normalized, computed once.
    pub fn checksum(&self) -> &str {
        self.checksum.get_or_init(|| compute_checksum(&self.content))
    }

    /// Fail with a validation error when `expected` matches neither the
    /// normalized checksum nor the legacy checksum of the raw bytes.
    pub fn validate_checksum(&self, expected: &str) -> CoreResult<()> {
        if self.checksum().eq_ignore_ascii_case(expected) {
            return Ok(());
        }

        let legacy = match &self.raw {
            Some(raw) => compute_raw_checksum(raw),
            None => compute_raw_checksum(self.content.as_bytes()),
        };
        if legacy.eq_ignore_ascii_case(expected) {
            log::debug!("Migration {} matched its legacy checksum", self.name);
            return Ok(());
        }

        Err(CoreError::ChecksumMismatch {
            name: self.name.clone(),
            expected: expected.to_string(),
            found: self.checksum().to_string(),
        })
    }
}

impl fmt::Display for MigrationScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Fail when two scripts share an identity key, listing every duplicate.
pub fn check_duplicates(scripts: &[MigrationScript]) -> CoreResult<()> {
    let mut groups: BTreeMap<MigrationKey, Vec<&str>> = BTreeMap::new();
    for script in scripts {
        groups.entry(script.key()).or_default().push(script.name());
    }

    let duplicates: Vec<String> = groups
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(key, names)| format!("{key} ({})", names.join(", ")))
        .collect();

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(CoreError::DuplicateMigration {
            keys: duplicates.join("; "),
        })
    }
}

pub(crate) fn normalize_identity(name: &str) -> String {
    name.trim().replace(' ', "_")
}

/// Split `<prefix><version><separator><description><suffix>` into the
/// version segment and a human description.
fn split_name<'a>(name: &'a str, naming: &NamingConvention) -> CoreResult<(&'a str, String)> {
    if !starts_with_ignore_case(name, &naming.prefix) {
        return Err(invalid_name(
            name,
            &format!("must start with '{}'", naming.prefix),
        ));
    }

    let mut body = &name[naming.prefix.len()..];
    if !naming.suffix.is_empty() && ends_with_ignore_case(body, &naming.suffix) {
        body = &body[..body.len() - naming.suffix.len()];
    }

    let Some(pos) = body.find(&naming.separator) else {
        return Err(invalid_name(
            name,
            &format!("separator '{}' not found", naming.separator),
        ));
    };

    let version = &body[..pos];
    let description = body[pos + naming.separator.len()..].replace('_', " ");
    let description = description.trim();
    if description.is_empty() {
        return Err(invalid_name(name, "description is empty"));
    }

    Ok((version, description.to_string()))
}

fn invalid_name(name: &str, reason: &str) -> CoreError {
    CoreError::InvalidMigrationName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.is_char_boundary(s.len() - suffix.len())
        && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
