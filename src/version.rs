//! Schema versioning utilities
//!
//! Contract versions are dotted `major.minor[.patch...]` strings. Only the
//! first two components take part in comparisons; anything after them is
//! carried verbatim in [`SchemaVersion::raw`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{ContractError, Result};

/// Version stamped on every contract that does not set one explicitly
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0";

/// A parsed contract schema version
#[derive(Debug, Clone)]
pub struct SchemaVersion {
    pub major: u64,
    pub minor: u64,
    /// Trimmed input, including any components past `minor`
    pub raw: String,
}

impl SchemaVersion {
    /// Parse a version string such as `"1.0"` or `" 2.3.1 "`.
    pub fn parse(version_str: &str) -> Result<Self> {
        let raw = version_str.trim();
        let mut parts = raw.split('.');

        let (major, minor) = match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => (major, minor),
            _ => {
                return Err(ContractError::InvalidVersion {
                    raw: raw.to_string(),
                    reason: "expected at least major.minor".to_string(),
                })
            }
        };

        Ok(Self {
            major: parse_component(raw, "major", major)?,
            minor: parse_component(raw, "minor", minor)?,
            raw: raw.to_string(),
        })
    }

    /// Whether a payload stamped with `self` can be read by a reader built
    /// against `reader`. Minor drift is additive and always tolerated.
    pub fn is_compatible_with(&self, reader: &SchemaVersion) -> bool {
        self.major == reader.major
    }

    /// Get the `major.minor` form without trailing components
    pub fn short_string(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

fn parse_component(raw: &str, name: &str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| ContractError::InvalidVersion {
        raw: raw.to_string(),
        reason: format!("{} component {:?} is not an integer", name, value),
    })
}

/// Decide whether `wire_version` payloads are readable by a `reader_version`
/// consumer. Fails only when either string does not parse.
pub fn is_compatible(wire_version: &str, reader_version: &str) -> Result<bool> {
    let wire = SchemaVersion::parse(wire_version)?;
    let reader = SchemaVersion::parse(reader_version)?;
    Ok(wire.is_compatible_with(&reader))
}

/// Like [`is_compatible`], but turns a major mismatch into an error.
pub fn check_compatible(wire_version: &str, reader_version: &str) -> Result<()> {
    if is_compatible(wire_version, reader_version)? {
        Ok(())
    } else {
        tracing::warn!(
            wire = wire_version,
            reader = reader_version,
            "payload from another major version"
        );
        Err(ContractError::IncompatibleVersion {
            wire: wire_version.trim().to_string(),
            reader: reader_version.trim().to_string(),
        })
    }
}

impl FromStr for SchemaVersion {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor) == (other.major, other.minor)
    }
}

impl Eq for SchemaVersion {}

impl Hash for SchemaVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}
