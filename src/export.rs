//! Catalog export
//!
//! Writes the contract catalog, identifier tables and topic registry as JSON
//! files with a manifest and a `checksums.sha256` listing.
//!
//! ```text
//! <out>/
//! ├── contracts/
//! │   ├── CheckResult.json
//! │   └── ...
//! ├── ids.json
//! ├── topics.json
//! ├── manifest.json
//! └── checksums.sha256
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::checksum::Checksum;
use crate::codec;
use crate::error::Result;
use crate::ids::{AuthReasonCode, StableId};
use crate::registry;
use crate::version::DEFAULT_SCHEMA_VERSION;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CHECKSUMS_FILE: &str = "checksums.sha256";

/// One exported file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Path relative to the export root, `/`-separated
    pub path: String,
    pub checksum: Checksum,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportStats {
    pub contracts: usize,
    pub event_contracts: usize,
    pub identifiers: usize,
    pub topics: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<ExportEntry>,
    /// Checksum over every file checksum, in `files` order
    pub manifest_checksum: Checksum,
    pub stats: ExportStats,
}

impl ExportManifest {
    fn new(files: Vec<ExportEntry>, stats: ExportStats, created_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            created_at,
            manifest_checksum: combined_checksum(&files),
            files,
            stats,
        }
    }
}

fn combined_checksum(files: &[ExportEntry]) -> Checksum {
    let combined = files
        .iter()
        .map(|f| f.checksum.as_str())
        .collect::<Vec<_>>()
        .join(",");
    Checksum::from_text(&combined)
}

fn write_json(root: &Path, relative: &str, value: &serde_json::Value) -> Result<ExportEntry> {
    let content = serde_json::to_string_pretty(&codec::canonicalize(value.clone()))? + "\n";
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &content)?;
    tracing::debug!(path = relative, "exported");
    Ok(ExportEntry {
        path: relative.to_string(),
        checksum: Checksum::from_text(&content),
    })
}

/// Export the catalog under `root`
pub fn export_catalog(root: &Path, include_checksums: bool, created_at: DateTime<Utc>) -> Result<ExportManifest> {
    fs::create_dir_all(root)?;
    let mut files = Vec::new();

    for descriptor in registry::contracts() {
        let relative = format!("contracts/{}.json", descriptor.name);
        files.push(write_json(root, &relative, &serde_json::to_value(descriptor)?)?);
    }

    let identifiers: Vec<serde_json::Value> = StableId::all()
        .map(|id| json!({"id": id.as_str(), "family": id.family(), "description": id.description()}))
        .collect();
    let reason_codes: Vec<serde_json::Value> = AuthReasonCode::ALL
        .iter()
        .map(|code| json!({"code": code.as_str(), "permits": code.permits()}))
        .collect();
    files.push(write_json(
        root,
        "ids.json",
        &json!({"checks": identifiers, "auth_reason_codes": reason_codes}),
    )?);

    let topics: BTreeMap<&str, &str> = registry::topics().collect();
    files.push(write_json(root, "topics.json", &serde_json::to_value(&topics)?)?);

    let stats = ExportStats {
        contracts: registry::contracts().len(),
        event_contracts: registry::contracts().iter().filter(|d| d.event_type.is_some()).count(),
        identifiers: identifiers.len(),
        topics: topics.len(),
    };
    let manifest = ExportManifest::new(files, stats, created_at);
    fs::write(root.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)? + "\n")?;

    if include_checksums {
        let listing: String = manifest
            .files
            .iter()
            .map(|f| format!("{}  {}\n", f.checksum, f.path))
            .collect();
        fs::write(root.join(CHECKSUMS_FILE), listing)?;
    }

    tracing::info!(
        root = %root.display(),
        files = manifest.files.len(),
        checksum = %manifest.manifest_checksum,
        "catalog exported"
    );
    Ok(manifest)
}

/// Re-hash every file listed in the export's manifest; returns the paths that
/// no longer match. The manifest itself is listed when its entries no longer
/// add up to `manifest_checksum`.
pub fn verify_export(root: &Path) -> Result<Vec<String>> {
    let manifest: ExportManifest = serde_json::from_str(&fs::read_to_string(root.join(MANIFEST_FILE))?)?;
    let mut mismatched = Vec::new();
    if combined_checksum(&manifest.files) != manifest.manifest_checksum {
        tracing::warn!(root = %root.display(), "manifest entries do not match manifest_checksum");
        mismatched.push(MANIFEST_FILE.to_string());
    }
    for entry in &manifest.files {
        let matches = match fs::read_to_string(root.join(&entry.path)) {
            Ok(content) => entry.checksum.verify(&content),
            Err(_) => false,
        };
        if !matches {
            mismatched.push(entry.path.clone());
        }
    }
    Ok(mismatched)
}
