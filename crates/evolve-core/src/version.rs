//! Migration versions.
//!
//! A version is an ordered list of non-negative integers written as
//! `1.2.3` (or `1_2_3` in file names). Versions compare component by
//! component; when one list is a strict prefix of the other, the shorter
//! version is the smaller one, so `1 < 1.0 < 1.0.1`.

use crate::error::{CoreError, CoreResult};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

static VERSION_RE: OnceLock<Regex> = OnceLock::new();

fn version_regex() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(r"^[0-9]+(\.[0-9]+)*$").expect("valid regex"))
}

/// A parsed, immutable migration version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// The smallest possible version, `0`.
    pub fn min() -> Version {
        Version { parts: vec![0] }
    }

    /// Parse a version string, normalizing underscores to dots first.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let normalized = text.trim().replace('_', ".");
        if !version_regex().is_match(&normalized) {
            return Err(CoreError::InvalidVersion {
                value: text.to_string(),
            });
        }

        let parts = normalized
            .split('.')
            .map(|p| {
                p.parse::<u64>().map_err(|_| CoreError::InvalidVersion {
                    value: text.to_string(),
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(Self { parts })
    }

    /// Numeric components of the version.
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Compare two versions, shorter prefix first.
    pub fn compare(a: &Version, b: &Version) -> Ordering {
        for (x, y) in a.parts.iter().zip(b.parts.iter()) {
            match x.cmp(y) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.parts.len().cmp(&b.parts.len())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        Version::compare(self, other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&text)
    }
}

impl FromStr for Version {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accept bare YAML numbers (`start_version: 2`) as well as strings.
        let value = serde_yaml::Value::deserialize(deserializer)?;
        let text = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected a version string, found {other:?}"
                )))
            }
        };
        Version::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "version_test.rs"]
mod tests;
