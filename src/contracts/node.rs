//! Inner request/response envelope between an adapter and a unit of work

use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Result};
use crate::schema::{default_schema_version, require_non_empty, Contract, ExtraBag, ExtraFields, ExtraPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOperationRequest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub request_id: String,
    /// Target node, e.g. `ticket-enricher`
    pub node: String,
    pub operation: String,
    #[serde(default)]
    pub input: serde_json::Value,
    /// Positive when present
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl NodeOperationRequest {
    pub fn new(request_id: impl Into<String>, node: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            schema_version: default_schema_version(),
            request_id: request_id.into(),
            node: node.into(),
            operation: operation.into(),
            input: serde_json::Value::Null,
            timeout_ms: None,
            correlation_id: None,
            extra: ExtraFields::new(),
        }
    }
}

impl Contract for NodeOperationRequest {
    const NAME: &'static str = "NodeOperationRequest";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "request_id",
        "node",
        "operation",
        "input",
        "timeout_ms",
        "correlation_id",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "request_id", &self.request_id)?;
        require_non_empty(Self::NAME, "node", &self.node)?;
        require_non_empty(Self::NAME, "operation", &self.operation)?;
        if self.timeout_ms == Some(0) {
            return Err(ContractError::validation(Self::NAME, "timeout_ms must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeOperationStatus {
    Success,
    Error,
    Skipped,
}

/// One error reported by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl NodeError {
    pub const FIELDS: &'static [&'static str] = &["code", "message", "retryable", "details"];

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: false,
            details: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    fn validate(&self) -> Result<()> {
        require_non_empty("NodeError", "code", &self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOperationResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub request_id: String,
    pub status: NodeOperationStatus,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub errors: Vec<NodeError>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl NodeOperationResult {
    pub fn success(request: &NodeOperationRequest, output: serde_json::Value) -> Self {
        Self {
            output,
            ..Self::with_status(request, NodeOperationStatus::Success)
        }
    }

    pub fn failure(request: &NodeOperationRequest, errors: Vec<NodeError>) -> Self {
        Self {
            errors,
            ..Self::with_status(request, NodeOperationStatus::Error)
        }
    }

    pub fn skipped(request: &NodeOperationRequest) -> Self {
        Self::with_status(request, NodeOperationStatus::Skipped)
    }

    fn with_status(request: &NodeOperationRequest, status: NodeOperationStatus) -> Self {
        Self {
            schema_version: default_schema_version(),
            request_id: request.request_id.clone(),
            status,
            output: serde_json::Value::Null,
            errors: Vec::new(),
            duration_ms: None,
            extra: ExtraFields::new(),
        }
    }

    /// Every reported error can be retried
    pub fn is_retryable(&self) -> bool {
        self.status == NodeOperationStatus::Error && self.errors.iter().all(|e| e.retryable)
    }
}

impl Contract for NodeOperationResult {
    const NAME: &'static str = "NodeOperationResult";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "request_id",
        "status",
        "output",
        "errors",
        "duration_ms",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn extra_bags(&self) -> Vec<ExtraBag<'_>> {
        let mut bags = vec![ExtraBag::new(Self::NAME, Self::FIELDS, &self.extra)];
        bags.extend(
            self.errors
                .iter()
                .map(|e| ExtraBag::new("NodeError", NodeError::FIELDS, &e.extra)),
        );
        bags
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "request_id", &self.request_id)?;
        for error in &self.errors {
            error.validate()?;
        }
        if self.status == NodeOperationStatus::Error && self.errors.is_empty() {
            return Err(ContractError::validation(
                Self::NAME,
                "error status requires at least one NodeError",
            ));
        }
        Ok(())
    }
}
