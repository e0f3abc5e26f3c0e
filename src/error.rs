//! Error types for the contract layer

use thiserror::Error;

/// Result type for contract operations
pub type Result<T> = std::result::Result<T, ContractError>;

/// Contract construction, decoding and compatibility errors
#[derive(Error, Debug)]
pub enum ContractError {
    /// A required field is missing, a bound is violated, an enumerated value
    /// is outside its closed set, or a cross-field rule does not hold.
    #[error("{contract} validation failed: {message}")]
    Validation {
        contract: &'static str,
        message: String,
    },

    #[error("{contract} does not declare field `{field}`")]
    UnknownField {
        contract: &'static str,
        field: String,
    },

    #[error("Invalid schema version {raw:?}: {reason}")]
    InvalidVersion { raw: String, reason: String },

    #[error("Incompatible schema version: wire {wire}, reader {reader}")]
    IncompatibleVersion { wire: String, reader: String },

    #[error("{contract}: illegal status transition {from} -> {to}")]
    InvalidTransition {
        contract: &'static str,
        from: String,
        to: String,
    },

    #[error("Unknown contract: {0}")]
    UnknownContract(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ContractError {
    pub(crate) fn validation(contract: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            contract,
            message: message.into(),
        }
    }

    /// Whether this error rejects the payload itself (as opposed to I/O or
    /// lookup failures around it).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ContractError::Validation { .. }
                | ContractError::UnknownField { .. }
                | ContractError::InvalidVersion { .. }
                | ContractError::IncompatibleVersion { .. }
                | ContractError::InvalidTransition { .. }
        )
    }
}
