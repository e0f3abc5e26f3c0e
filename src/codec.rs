//! JSON and YAML codec for contracts
//!
//! Encoding always goes through a canonical `serde_json::Value` whose object
//! keys are sorted ascending at every depth, so equal values produce
//! byte-identical JSON across calls and processes. That output is what
//! [`Checksum::of`](crate::checksum::Checksum::of) hashes.
//!
//! Decoding parses text into an untyped value first, sorts the top-level keys
//! into declared and unknown per [`Contract::FIELDS`], applies the contract's
//! [`ExtraPolicy`], and only then runs typed decoding and sealing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use similar::TextDiff;

use crate::error::{ContractError, Result};
use crate::schema::{Contract, ExtraPolicy, Sealed};
use crate::version::{check_compatible, SchemaVersion, DEFAULT_SCHEMA_VERSION};

/// Text form of an encoded contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Json,
    Yaml,
}

impl WireFormat {
    /// Guess the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(WireFormat::Json),
            "yaml" | "yml" => Some(WireFormat::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFormat::Json => f.write_str("json"),
            WireFormat::Yaml => f.write_str("yaml"),
        }
    }
}

/// How unknown top-level fields are treated during decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Follow each contract's own [`ExtraPolicy`]
    #[default]
    Declared,
    /// Treat every contract as `forbid`
    Strict,
}

/// Rebuild `value` with object keys inserted in ascending order at every level.
///
/// Rebuilding (rather than relying on the map type) keeps the ordering even
/// when another crate in the graph switches `serde_json` to insertion order.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries: Vec<(String, Value)> = object.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key, canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Canonical untyped form of a contract (declared and extra fields merged)
pub fn to_canonical_value<T: Contract>(contract: &T) -> Result<Value> {
    Ok(canonicalize(serde_json::to_value(contract)?))
}

/// Compact JSON with sorted keys
pub fn encode_json<T: Contract>(contract: &T) -> Result<String> {
    Ok(serde_json::to_string(&to_canonical_value(contract)?)?)
}

/// Indented JSON with sorted keys, for files meant to be read by people
pub fn encode_json_pretty<T: Contract>(contract: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_canonical_value(contract)?)?)
}

/// YAML rendition of the same canonical value
pub fn encode_yaml<T: Contract>(contract: &T) -> Result<String> {
    Ok(serde_yaml::to_string(&to_canonical_value(contract)?)?)
}

pub fn encode<T: Contract>(contract: &T, format: WireFormat) -> Result<String> {
    match format {
        WireFormat::Json => encode_json(contract),
        WireFormat::Yaml => encode_yaml(contract),
    }
}

/// Parse text into an untyped value without applying any contract
pub fn parse_value(text: &str, format: WireFormat) -> Result<Value> {
    match format {
        WireFormat::Json => Ok(serde_json::from_str(text)?),
        WireFormat::Yaml => Ok(serde_yaml::from_str(text)?),
    }
}

/// Configurable decoder
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    mode: DecodeMode,
    reader_version: Option<SchemaVersion>,
    reject_incompatible: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject unknown fields regardless of contract policy
    pub fn strict(mut self) -> Self {
        self.mode = DecodeMode::Strict;
        self
    }

    pub fn with_mode(mut self, mode: DecodeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fail payloads whose `schema_version` is on another major line
    pub fn require_compatible(mut self, reader_version: SchemaVersion) -> Self {
        self.reader_version = Some(reader_version);
        self.reject_incompatible = true;
        self
    }

    /// Log payloads on another major line and decode them anyway
    pub fn warn_incompatible(mut self, reader_version: SchemaVersion) -> Self {
        self.reader_version = Some(reader_version);
        self.reject_incompatible = false;
        self
    }

    pub fn mode(&self) -> DecodeMode {
        self.mode
    }

    pub fn reader_version(&self) -> Option<&SchemaVersion> {
        self.reader_version.as_ref()
    }

    pub fn rejects_incompatible(&self) -> bool {
        self.reader_version.is_some() && self.reject_incompatible
    }

    pub fn decode_json<T: Contract>(&self, text: &str) -> Result<Sealed<T>> {
        self.decode_value(parse_value(text, WireFormat::Json)?)
    }

    pub fn decode_yaml<T: Contract>(&self, text: &str) -> Result<Sealed<T>> {
        self.decode_value(parse_value(text, WireFormat::Yaml)?)
    }

    pub fn decode<T: Contract>(&self, text: &str, format: WireFormat) -> Result<Sealed<T>> {
        self.decode_value(parse_value(text, format)?)
    }

    /// Decode an already-parsed payload
    pub fn decode_value<T: Contract>(&self, value: Value) -> Result<Sealed<T>> {
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(ContractError::validation(
                    T::NAME,
                    format!("expected an object, found {}", kind_of(&other)),
                ))
            }
        };

        let unknown: Vec<&String> = object.keys().filter(|key| !T::declares(key)).collect();
        if let Some(first) = unknown.first() {
            if T::POLICY == ExtraPolicy::Forbid || self.mode == DecodeMode::Strict {
                return Err(ContractError::UnknownField {
                    contract: T::NAME,
                    field: (*first).clone(),
                });
            }
            tracing::debug!(
                contract = T::NAME,
                fields = ?unknown,
                "retaining unknown fields"
            );
        }

        if let Some(reader) = &self.reader_version {
            // an absent version decodes as the default, so gate on that
            let wire = match object.get("schema_version") {
                Some(Value::String(wire)) => Some(wire.as_str()),
                None => Some(DEFAULT_SCHEMA_VERSION),
                Some(_) => None,
            };
            if let Some(wire) = wire {
                tracing::debug!(contract = T::NAME, wire = %wire, reader = %reader, "checking schema version");
                if let Err(err) = check_compatible(wire, &reader.raw) {
                    let mismatch = matches!(err, ContractError::IncompatibleVersion { .. });
                    if self.reject_incompatible || !mismatch {
                        return Err(err);
                    }
                }
            }
        }

        let contract: T = serde_json::from_value(Value::Object(object))
            .map_err(|e| ContractError::validation(T::NAME, e.to_string()))?;

        if self.mode == DecodeMode::Strict {
            for bag in contract.extra_bags() {
                if let Some(field) = bag.extra.keys().next() {
                    return Err(ContractError::UnknownField {
                        contract: bag.record,
                        field: field.clone(),
                    });
                }
            }
        }
        Sealed::new(contract)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode JSON with each contract's declared policy
pub fn decode_json<T: Contract>(text: &str) -> Result<Sealed<T>> {
    Decoder::new().decode_json(text)
}

/// Decode YAML with each contract's declared policy
pub fn decode_yaml<T: Contract>(text: &str) -> Result<Sealed<T>> {
    Decoder::new().decode_yaml(text)
}

pub fn decode<T: Contract>(text: &str, format: WireFormat) -> Result<Sealed<T>> {
    Decoder::new().decode(text, format)
}

/// Unified diff between the pretty canonical forms of two contracts.
///
/// Returns an empty string when both encode identically.
pub fn diff_canonical<T: Contract>(old: &T, new: &T) -> Result<String> {
    diff_values(&to_canonical_value(old)?, &to_canonical_value(new)?)
}

/// [`diff_canonical`] over untyped values; both sides are canonicalized first.
pub fn diff_values(old: &Value, new: &Value) -> Result<String> {
    let old_text = serde_json::to_string_pretty(&canonicalize(old.clone()))? + "\n";
    let new_text = serde_json::to_string_pretty(&canonicalize(new.clone()))? + "\n";
    if old_text == new_text {
        return Ok(String::new());
    }
    let diff = TextDiff::from_lines(&old_text, &new_text);
    Ok(diff
        .unified_diff()
        .context_radius(3)
        .header("old", "new")
        .to_string())
}
