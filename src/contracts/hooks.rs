//! Outer request/response envelope between an external trigger and an adapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Result};
use crate::schema::{default_schema_version, require_non_empty, Contract, ExtraPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookInvocation {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub invocation_id: String,
    /// Hook name as configured by the trigger, e.g. `pre-push`
    pub hook: String,
    /// Event that fired the hook, e.g. `git.hook`
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub invoked_at: DateTime<Utc>,
}

impl HookInvocation {
    pub fn new(
        invocation_id: impl Into<String>,
        hook: impl Into<String>,
        event_type: impl Into<String>,
        invoked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            invocation_id: invocation_id.into(),
            hook: hook.into(),
            event_type: event_type.into(),
            payload: serde_json::Value::Null,
            correlation_id: None,
            invoked_at,
        }
    }
}

impl Contract for HookInvocation {
    const NAME: &'static str = "HookInvocation";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "invocation_id",
        "hook",
        "event_type",
        "payload",
        "correlation_id",
        "invoked_at",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "invocation_id", &self.invocation_id)?;
        require_non_empty(Self::NAME, "hook", &self.hook)?;
        require_non_empty(Self::NAME, "event_type", &self.event_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookDecision {
    Allow,
    Block,
    Modify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookInvocationResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub invocation_id: String,
    pub decision: HookDecision,
    /// Required for `block`
    #[serde(default)]
    pub reason: Option<String>,
    /// Required for `modify`; replaces the invocation payload downstream
    #[serde(default)]
    pub modified_payload: Option<serde_json::Value>,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl HookInvocationResult {
    pub fn allow(invocation: &HookInvocation) -> Self {
        Self::with_decision(invocation, HookDecision::Allow)
    }

    pub fn block(invocation: &HookInvocation, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::with_decision(invocation, HookDecision::Block)
        }
    }

    pub fn modify(invocation: &HookInvocation, payload: serde_json::Value) -> Self {
        Self {
            modified_payload: Some(payload),
            ..Self::with_decision(invocation, HookDecision::Modify)
        }
    }

    fn with_decision(invocation: &HookInvocation, decision: HookDecision) -> Self {
        Self {
            schema_version: default_schema_version(),
            invocation_id: invocation.invocation_id.clone(),
            decision,
            reason: None,
            modified_payload: None,
            messages: Vec::new(),
        }
    }
}

impl Contract for HookInvocationResult {
    const NAME: &'static str = "HookInvocationResult";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "invocation_id",
        "decision",
        "reason",
        "modified_payload",
        "messages",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "invocation_id", &self.invocation_id)?;
        match self.decision {
            HookDecision::Block if self.reason.as_deref().map_or(true, |r| r.trim().is_empty()) => {
                Err(ContractError::validation(Self::NAME, "block decisions must carry a reason"))
            }
            HookDecision::Modify if self.modified_payload.is_none() => Err(ContractError::validation(
                Self::NAME,
                "modify decisions must carry modified_payload",
            )),
            HookDecision::Allow | HookDecision::Block if self.modified_payload.is_some() => {
                Err(ContractError::validation(
                    Self::NAME,
                    "modified_payload is only valid with a modify decision",
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_json, encode_json};
    use crate::schema::Sealed;
    use chrono::TimeZone;
    use serde_json::json;

    fn invocation() -> HookInvocation {
        let at = Utc.with_ymd_and_hms(2026, 5, 2, 9, 30, 0).unwrap();
        let mut inv = HookInvocation::new("inv-1", "pre-push", "git.hook", at);
        inv.payload = json!({"ref": "refs/heads/main"});
        inv
    }

    #[test]
    fn test_invocation_forbids_unknown_fields() {
        let mut value = serde_json::to_value(invocation()).unwrap();
        value["trace"] = json!("abc");
        let text = serde_json::to_string(&value).unwrap();
        assert!(matches!(
            decode_json::<HookInvocation>(&text),
            Err(crate::ContractError::UnknownField { .. })
        ));
        // serde's own guard applies outside the codec too
        assert!(serde_json::from_value::<HookInvocation>(value).is_err());
    }

    #[test]
    fn test_invocation_round_trip() {
        let inv = invocation().seal().unwrap();
        let back: Sealed<HookInvocation> = decode_json(&encode_json(&*inv).unwrap()).unwrap();
        assert_eq!(back, inv);
    }

    #[test]
    fn test_result_decision_requirements() {
        let inv = invocation();
        assert!(HookInvocationResult::allow(&inv).seal().is_ok());
        assert!(HookInvocationResult::block(&inv, "protected branch").seal().is_ok());
        assert!(HookInvocationResult::block(&inv, "  ").seal().is_err());
        assert!(HookInvocationResult::modify(&inv, json!({"ref": "refs/heads/release"}))
            .seal()
            .is_ok());

        let mut bare_modify = HookInvocationResult::allow(&inv);
        bare_modify.decision = HookDecision::Modify;
        assert!(bare_modify.seal().is_err());

        let mut stray = HookInvocationResult::allow(&inv);
        stray.modified_payload = Some(json!({}));
        assert!(stray.seal().is_err());
    }

    #[test]
    fn test_decision_closed_set() {
        let text = r#"{"invocation_id":"inv-1","decision":"defer"}"#;
        assert!(decode_json::<HookInvocationResult>(text).is_err());
    }
}
