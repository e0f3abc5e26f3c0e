//! Configuration for the contract tools
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (contracts.toml)
//! - Environment variables (CONTRACTS__*)
//!
//! ## Example config file (contracts.toml):
//! ```toml
//! [codec]
//! strict_decode = false
//! output_format = "pretty"
//!
//! [compatibility]
//! reader_version = "1.0"
//! reject_incompatible = true
//!
//! [export]
//! output_dir = "contracts-export"
//! include_checksums = true
//! ```

use config_crate::{Config, ConfigError, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::codec::{DecodeMode, Decoder};
use crate::error::Result;
use crate::version::{SchemaVersion, DEFAULT_SCHEMA_VERSION};

/// Main configuration for the contract tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    #[serde(default)]
    pub codec: CodecConfig,

    #[serde(default)]
    pub compatibility: CompatibilityConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Reject unknown fields even for contracts that allow them
    #[serde(default)]
    pub strict_decode: bool,

    /// Layout of JSON written by the tools
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    /// Schema version this reader was built against
    #[serde(default = "default_reader_version")]
    pub reader_version: String,

    /// Fail payloads on another major line; when false they are logged and decoded
    #[serde(default = "default_true")]
    pub reject_incompatible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Write checksums.sha256 next to the exported files
    #[serde(default = "default_true")]
    pub include_checksums: bool,
}

fn default_true() -> bool {
    true
}

fn default_reader_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("contracts-export")
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            strict_decode: false,
            output_format: OutputFormat::Pretty,
        }
    }
}

impl Default for CompatibilityConfig {
    fn default() -> Self {
        Self {
            reader_version: default_reader_version(),
            reject_incompatible: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            include_checksums: true,
        }
    }
}

impl ContractsConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        Self::load_layered(config_path, None)
    }

    /// `env` replaces the process environment when set
    fn load_layered(
        config_path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["contracts.toml", ".contracts.toml", "config/contracts.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "pipeline", "contracts") {
            let xdg_config = config_dir.config_dir().join("contracts.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // CONTRACTS__CODEC__STRICT_DECODE=true etc. Values stay strings so
        // READER_VERSION=1.10 is not read as a float.
        builder = builder.add_source(
            Environment::with_prefix("CONTRACTS")
                .prefix_separator("__")
                .separator("__")
                .source(env),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Parsed `[compatibility].reader_version`
    pub fn reader_version(&self) -> Result<SchemaVersion> {
        SchemaVersion::parse(&self.compatibility.reader_version)
    }

    /// Decoder honouring the `[codec]` and `[compatibility]` sections
    pub fn decoder(&self) -> Result<Decoder> {
        let mode = if self.codec.strict_decode {
            DecodeMode::Strict
        } else {
            DecodeMode::Declared
        };
        let reader = self.reader_version()?;
        let decoder = Decoder::new().with_mode(mode);
        Ok(if self.compatibility.reject_incompatible {
            decoder.require_compatible(reader)
        } else {
            decoder.warn_incompatible(reader)
        })
    }

    /// Check settings that deserialize fine but cannot be used
    pub fn validate(&self) -> Result<()> {
        self.reader_version().map(|_| ())
    }
}
