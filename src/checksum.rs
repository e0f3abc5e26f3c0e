//! Content checksums over canonical encodings

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec;
use crate::error::Result;
use crate::schema::Contract;

/// SHA256 checksum, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a string
    pub fn from_text(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Compute checksum from a JSON value after sorting its keys
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let canonical = serde_json::to_string(&codec::canonicalize(value.clone()))?;
        Ok(Self::from_text(&canonical))
    }

    /// Checksum of a contract's canonical JSON encoding
    pub fn of<T: Contract>(contract: &T) -> Result<Self> {
        Ok(Self::from_text(&codec::encode_json(contract)?))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that content matches this checksum
    pub fn verify(&self, content: &str) -> bool {
        Self::from_text(content) == *self
    }

    /// Verify that a contract still hashes to this checksum
    pub fn verify_contract<T: Contract>(&self, contract: &T) -> Result<bool> {
        Ok(Self::of(contract)? == *self)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Checksum {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
