//! Resolve the engine configuration from `--config` and command-line flags

use anyhow::{Context, Result};
use evolve_core::{Command, CoreError, EvolveConfig, Version};
use std::path::Path;
use std::str::FromStr;

use crate::cli::{Commands, GlobalArgs};

impl Commands {
    pub(crate) fn command(&self) -> Command {
        match self {
            Commands::Migrate => Command::Migrate,
            Commands::Erase => Command::Erase,
            Commands::Repair => Command::Repair,
            Commands::Info(_) => Command::Info,
            Commands::Validate => Command::Validate,
        }
    }
}

/// Build the configuration for `command`: the `--config` file (or the
/// defaults) with every flag given on the command line applied on top.
pub(crate) fn resolve_config(global: &GlobalArgs, command: Command) -> Result<EvolveConfig> {
    let mut config = match &global.config {
        Some(path) => EvolveConfig::load(Path::new(path))?,
        None => EvolveConfig::default(),
    };
    config.command = command;
    apply_overrides(&mut config, global)?;
    config.validate()?;

    if config.connection_string.is_none() {
        return Err(CoreError::ConfigInvalid {
            message: "A connection string is required (--connection-string or connection_string in --config)".to_string(),
        }
        .into());
    }
    Ok(config)
}

fn apply_overrides(config: &mut EvolveConfig, global: &GlobalArgs) -> Result<()> {
    if let Some(connection) = &global.connection_string {
        config.connection_string = Some(connection.clone());
    }
    if let Some(dialect) = &global.dialect {
        config.dialect = Some(parse(dialect)?);
    }
    if !global.locations.is_empty() {
        config.locations = global.locations.clone();
    }
    if !global.schemas.is_empty() {
        config.schemas = global.schemas.clone();
    }
    if let Some(schema) = &global.metadata_table_schema {
        config.metadata_table_schema = Some(schema.clone());
    }
    if let Some(table) = &global.metadata_table_name {
        config.metadata_table_name = table.clone();
    }
    if let Some(version) = &global.target_version {
        config.target_version = Some(Version::parse(version)?);
    }
    if let Some(version) = &global.start_version {
        config.start_version = Some(Version::parse(version)?);
    }
    if let Some(prefix) = &global.placeholder_prefix {
        config.placeholder_prefix = prefix.clone();
    }
    if let Some(suffix) = &global.placeholder_suffix {
        config.placeholder_suffix = suffix.clone();
    }
    for definition in &global.placeholders {
        let (key, value) = EvolveConfig::parse_placeholder(definition)?;
        config.placeholders.insert(key, value);
    }
    if let Some(secs) = global.command_timeout_secs {
        config.command_timeout_secs = Some(secs);
    }
    if let Some(encoding) = &global.encoding {
        config.encoding = parse(encoding)?;
    }
    if let Some(mode) = &global.transaction_mode {
        config.transaction_mode = parse(mode)?;
    }
    if let Some(level) = &global.lint_level {
        config.sql_lint_level = parse(level)?;
    }

    // Switches only ever turn a behavior on (or cluster mode off).
    config.out_of_order |= global.out_of_order;
    config.is_erase_disabled |= global.erase_disabled;
    config.must_erase_on_validation_error |= global.erase_on_validation_error;
    config.retry_repeatable_migrations_until_no_error |= global.retry_repeatable;
    config.skip_next_migrations |= global.skip_next_migrations;
    config.split_on_terminator |= global.split_on_terminator;
    if global.disable_cluster_mode {
        config.enable_cluster_mode = false;
    }
    Ok(())
}

fn parse<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(value).with_context(|| format!("Invalid option value '{value}'"))
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
