//! Delegation and enrichment contracts
//!
//! These cross process boundaries between independently deployed agents, so
//! every one of them rejects undeclared fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Result};
use crate::schema::{
    default_schema_version, require_non_empty, require_unit_interval, Contract, ExtraPolicy,
};

/// Ask for a task to be handed to another agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelegationRequest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub task_id: String,
    pub requested_by: String,
    /// Capability the delegate must have, e.g. `code-review`
    pub capability: String,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
    pub requested_at: DateTime<Utc>,
}

impl DelegationRequest {
    pub fn new(
        task_id: impl Into<String>,
        requested_by: impl Into<String>,
        capability: impl Into<String>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            task_id: task_id.into(),
            requested_by: requested_by.into(),
            capability: capability.into(),
            context: BTreeMap::new(),
            requested_at,
        }
    }
}

impl Contract for DelegationRequest {
    const NAME: &'static str = "DelegationRequest";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "task_id",
        "requested_by",
        "capability",
        "context",
        "requested_at",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "task_id", &self.task_id)?;
        require_non_empty(Self::NAME, "requested_by", &self.requested_by)?;
        require_non_empty(Self::NAME, "capability", &self.capability)
    }
}

/// Routing decision for a delegation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelegationDecision {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub task_id: String,
    /// `None` keeps the task with the requester
    #[serde(default)]
    pub delegate_to: Option<String>,
    /// 0.0..=1.0
    pub delegation_confidence: f64,
    #[serde(default)]
    pub rationale: Option<String>,
}

impl DelegationDecision {
    pub fn delegate(task_id: impl Into<String>, delegate_to: impl Into<String>, confidence: f64) -> Self {
        Self {
            schema_version: default_schema_version(),
            task_id: task_id.into(),
            delegate_to: Some(delegate_to.into()),
            delegation_confidence: confidence,
            rationale: None,
        }
    }

    pub fn retain(task_id: impl Into<String>, confidence: f64) -> Self {
        Self {
            schema_version: default_schema_version(),
            task_id: task_id.into(),
            delegate_to: None,
            delegation_confidence: confidence,
            rationale: None,
        }
    }

    pub fn is_delegated(&self) -> bool {
        self.delegate_to.is_some()
    }
}

impl Contract for DelegationDecision {
    const NAME: &'static str = "DelegationDecision";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "task_id",
        "delegate_to",
        "delegation_confidence",
        "rationale",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "task_id", &self.task_id)?;
        require_unit_interval(Self::NAME, "delegation_confidence", self.delegation_confidence)?;
        if let Some(target) = &self.delegate_to {
            require_non_empty(Self::NAME, "delegate_to", target)?;
        }
        Ok(())
    }
}

/// Ask a source to fill in fields of a work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentRequest {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub item_id: String,
    /// Enrichment source, e.g. `linear`, `github`
    pub source: String,
    pub fields: Vec<String>,
}

impl EnrichmentRequest {
    pub fn new(item_id: impl Into<String>, source: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            schema_version: default_schema_version(),
            item_id: item_id.into(),
            source: source.into(),
            fields,
        }
    }
}

impl Contract for EnrichmentRequest {
    const NAME: &'static str = "EnrichmentRequest";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &["schema_version", "item_id", "source", "fields"];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "item_id", &self.item_id)?;
        require_non_empty(Self::NAME, "source", &self.source)?;
        if self.fields.is_empty() {
            return Err(ContractError::validation(Self::NAME, "fields must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub item_id: String,
    pub source: String,
    /// Requested field → enriched value
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
    /// Requested fields the source could not fill
    #[serde(default)]
    pub missing: Vec<String>,
    /// 0.0..=1.0
    pub confidence: f64,
    pub enriched_at: DateTime<Utc>,
}

impl EnrichmentResult {
    pub fn new(request: &EnrichmentRequest, confidence: f64, enriched_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: default_schema_version(),
            item_id: request.item_id.clone(),
            source: request.source.clone(),
            values: BTreeMap::new(),
            missing: request.fields.clone(),
            confidence,
            enriched_at,
        }
    }

    /// Fill one requested field
    pub fn with_value(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        let field = field.into();
        self.missing.retain(|m| *m != field);
        self.values.insert(field, value);
        self
    }
}

impl Contract for EnrichmentResult {
    const NAME: &'static str = "EnrichmentResult";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "item_id",
        "source",
        "values",
        "missing",
        "confidence",
        "enriched_at",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "item_id", &self.item_id)?;
        require_non_empty(Self::NAME, "source", &self.source)?;
        require_unit_interval(Self::NAME, "confidence", self.confidence)?;
        if let Some(both) = self.missing.iter().find(|m| self.values.contains_key(*m)) {
            return Err(ContractError::validation(
                Self::NAME,
                format!("{} is listed as both enriched and missing", both),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_json, decode_yaml, encode_json, encode_yaml};
    use crate::schema::Sealed;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 20, 16, 45, 0).unwrap()
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(DelegationDecision::delegate("t-1", "reviewer", 0.0).seal().is_ok());
        assert!(DelegationDecision::delegate("t-1", "reviewer", 1.0).seal().is_ok());
        assert!(DelegationDecision::delegate("t-1", "reviewer", 1.01).seal().is_err());
        assert!(DelegationDecision::retain("t-1", -0.2).seal().is_err());
        assert!(DelegationDecision::retain("t-1", f64::INFINITY).seal().is_err());
    }

    #[test]
    fn test_decision_forbids_unknown_fields() {
        let text = r#"{"task_id":"t-1","delegation_confidence":0.8,"priority":"high"}"#;
        assert!(matches!(
            decode_json::<DelegationDecision>(text),
            Err(ContractError::UnknownField { contract: "DelegationDecision", .. })
        ));
    }

    #[test]
    fn test_decision_float_round_trip() {
        let decision = DelegationDecision::delegate("t-1", "reviewer", 0.1 + 0.2).seal().unwrap();
        let via_json: Sealed<DelegationDecision> = decode_json(&encode_json(&*decision).unwrap()).unwrap();
        let via_yaml: Sealed<DelegationDecision> = decode_yaml(&encode_yaml(&*decision).unwrap()).unwrap();
        assert_eq!(via_json, decision);
        assert_eq!(via_yaml, decision);
    }

    #[test]
    fn test_enrichment_tracks_missing_fields() {
        let request = EnrichmentRequest::new(
            "ENG-42",
            "linear",
            vec!["priority".to_string(), "estimate".to_string()],
        )
        .seal()
        .unwrap();

        let result = EnrichmentResult::new(&request, 0.9, at())
            .with_value("priority", json!(2))
            .seal()
            .unwrap();
        assert_eq!(result.missing, vec!["estimate"]);
        assert_eq!(result.values["priority"], json!(2));

        let mut conflicting = (*result).clone();
        conflicting.missing.push("priority".to_string());
        assert!(conflicting.seal().is_err());
    }

    #[test]
    fn test_enrichment_request_needs_fields() {
        assert!(EnrichmentRequest::new("ENG-42", "linear", vec![]).seal().is_err());
    }

    #[test]
    fn test_delegation_request_round_trip() {
        let mut request = DelegationRequest::new("t-9", "planner", "code-review", at());
        request.context.insert("repo".to_string(), json!("acme/api"));
        let sealed = request.seal().unwrap();
        let back: Sealed<DelegationRequest> = decode_yaml(&encode_yaml(&*sealed).unwrap()).unwrap();
        assert_eq!(back, sealed);
    }
}
