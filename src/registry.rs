//! Static registries
//!
//! Both tables are built once on first use and never change afterwards.
//! The topic registry routes event types to bus topics; the contract catalog
//! lets tools decode a payload when the contract is only known by name.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use serde_json::Value;

use crate::codec::{self, Decoder};
use crate::contracts::auth::WorkAuthorization;
use crate::contracts::checks::{CheckResult, CheckStatus, RrhResult, Severity, Verdict};
use crate::contracts::delegation::{
    DelegationDecision, DelegationRequest, EnrichmentRequest, EnrichmentResult,
};
use crate::contracts::events::{
    EventContract, EventEnvelope, GitHookEvent, GitHubPRStatusEvent, LinearSnapshotEvent,
};
use crate::contracts::hooks::{HookInvocation, HookInvocationResult};
use crate::contracts::node::{NodeOperationRequest, NodeOperationResult};
use crate::contracts::run::{Checkpoint, RunContext};
use crate::contracts::validation::{
    ValidationPlan, ValidationResult, ValidationRun, ValidationVerdict,
};
use crate::error::{ContractError, Result};
use crate::ids::ContractCheck;
use crate::schema::{Contract, ExtraPolicy};

static TOPICS: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        (GitHookEvent::EVENT_TYPE, "pipeline.git.hooks"),
        (LinearSnapshotEvent::EVENT_TYPE, "pipeline.linear.snapshots"),
        (GitHubPRStatusEvent::EVENT_TYPE, "pipeline.github.pr-status"),
    ])
});

/// Bus topic for an event type
pub fn topic_for(event_type: &str) -> Option<&'static str> {
    TOPICS.get(event_type).copied()
}

/// Every `(event_type, topic)` pair, ordered by event type
pub fn topics() -> impl Iterator<Item = (&'static str, &'static str)> {
    TOPICS.iter().map(|(event_type, topic)| (*event_type, *topic))
}

/// Catalog entry for one contract
#[derive(Debug, Clone, Serialize)]
pub struct ContractDescriptor {
    pub name: &'static str,
    pub policy: ExtraPolicy,
    pub fields: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<&'static str>,
    #[serde(skip)]
    check: fn(&Decoder, Value) -> Result<Value>,
}

impl ContractDescriptor {
    fn of<T: Contract>() -> Self {
        Self {
            name: T::NAME,
            policy: T::POLICY,
            fields: T::FIELDS,
            event_type: None,
            partition_key: None,
            check: check_as::<T>,
        }
    }

    fn of_event<E: EventContract>() -> Self {
        Self {
            event_type: Some(E::EVENT_TYPE),
            partition_key: Some(E::PARTITION_KEY_FIELD),
            ..Self::of::<E>()
        }
    }

    /// Decode `payload` as this contract and return its canonical form
    pub fn check(&self, decoder: &Decoder, payload: Value) -> Result<Value> {
        (self.check)(decoder, payload)
    }

    /// Run [`check`](Self::check) and report the outcome as a check result
    pub fn check_payload(&self, decoder: &Decoder, payload: Value) -> CheckResult {
        match self.check(decoder, payload) {
            Ok(_) => CheckResult::new(ContractCheck::PayloadConforms.as_str(), "contract", CheckStatus::Pass)
                .with_severity(Severity::Critical),
            Err(err) => {
                let failed = ContractCheck::for_error(&err);
                CheckResult::new(failed.as_str(), "contract", CheckStatus::Fail)
                    .with_severity(Severity::Critical)
                    .with_message(err.to_string())
            }
        }
    }
}

fn check_as<T: Contract>(decoder: &Decoder, payload: Value) -> Result<Value> {
    let sealed = decoder.decode_value::<T>(payload)?;
    codec::to_canonical_value(sealed.as_inner())
}

static CATALOG: LazyLock<Vec<ContractDescriptor>> = LazyLock::new(|| {
    vec![
        ContractDescriptor::of::<CheckResult>(),
        ContractDescriptor::of::<Verdict>(),
        ContractDescriptor::of::<RrhResult>(),
        ContractDescriptor::of::<RunContext>(),
        ContractDescriptor::of::<Checkpoint>(),
        ContractDescriptor::of::<HookInvocation>(),
        ContractDescriptor::of::<HookInvocationResult>(),
        ContractDescriptor::of::<NodeOperationRequest>(),
        ContractDescriptor::of::<NodeOperationResult>(),
        ContractDescriptor::of::<WorkAuthorization>(),
        ContractDescriptor::of::<ValidationPlan>(),
        ContractDescriptor::of::<ValidationRun>(),
        ContractDescriptor::of::<ValidationResult>(),
        ContractDescriptor::of::<ValidationVerdict>(),
        ContractDescriptor::of::<DelegationRequest>(),
        ContractDescriptor::of::<DelegationDecision>(),
        ContractDescriptor::of::<EnrichmentRequest>(),
        ContractDescriptor::of::<EnrichmentResult>(),
        ContractDescriptor::of_event::<GitHookEvent>(),
        ContractDescriptor::of_event::<LinearSnapshotEvent>(),
        ContractDescriptor::of_event::<GitHubPRStatusEvent>(),
        ContractDescriptor::of::<EventEnvelope>(),
    ]
});

/// All catalogued contracts in declaration order
pub fn contracts() -> &'static [ContractDescriptor] {
    &CATALOG
}

/// Find a contract by name (ASCII case-insensitive)
pub fn lookup(name: &str) -> Result<&'static ContractDescriptor> {
    CATALOG
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ContractError::UnknownContract(name.to_string()))
}

/// Contract names resembling `query`, best match first
pub fn suggest(query: &str, limit: usize) -> Vec<&'static str> {
    let matcher = SkimMatcherV2::default().ignore_case();
    let mut scored: Vec<(i64, &'static str)> = CATALOG
        .iter()
        .filter_map(|d| matcher.fuzzy_match(d.name, query).map(|score| (score, d.name)))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(limit).map(|(_, name)| name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn test_every_event_type_has_a_topic() {
        for event_type in [
            GitHookEvent::EVENT_TYPE,
            LinearSnapshotEvent::EVENT_TYPE,
            GitHubPRStatusEvent::EVENT_TYPE,
        ] {
            assert!(topic_for(event_type).is_some(), "{} is unrouted", event_type);
        }
        assert_eq!(topic_for("svn.hook"), None);
        assert_eq!(topics().count(), 3);
    }

    #[test]
    fn test_topics_are_distinct() {
        let unique: HashSet<_> = topics().map(|(_, topic)| topic).collect();
        assert_eq!(unique.len(), topics().count());
    }

    #[test]
    fn test_catalog_names_are_unique() {
        let unique: HashSet<_> = contracts().iter().map(|d| d.name).collect();
        assert_eq!(unique.len(), contracts().len());
    }

    #[test]
    fn test_every_contract_declares_schema_version() {
        for descriptor in contracts() {
            assert!(
                descriptor.fields.contains(&"schema_version"),
                "{} has no schema_version",
                descriptor.name
            );
        }
    }

    #[test]
    fn test_event_descriptors_name_their_partition_key() {
        let snapshot = lookup("LinearSnapshotEvent").unwrap();
        assert_eq!(snapshot.partition_key, Some("snapshot_id"));
        assert_eq!(snapshot.event_type, Some("linear.snapshot"));
        assert!(snapshot.fields.contains(&"snapshot_id"));

        assert_eq!(lookup("CheckResult").unwrap().partition_key, None);
    }

    #[test]
    fn test_lookup_and_suggest() {
        assert_eq!(lookup("rrhresult").unwrap().name, "RRHResult");
        assert!(matches!(lookup("Verdikt"), Err(ContractError::UnknownContract(_))));

        let suggestions = suggest("chkpt", 3);
        assert_eq!(suggestions.first(), Some(&"Checkpoint"));
        assert!(suggest("zzzzqqq", 3).is_empty());
    }

    #[test]
    fn test_check_payload_reports_stable_ids() {
        let decoder = Decoder::new();
        let verdict = lookup("Verdict").unwrap();

        let ok = verdict.check_payload(&decoder, json!({"status": "PASS", "score": 90}));
        assert_eq!(ok.status, CheckStatus::Pass);
        assert_eq!(ok.check_id, "CHECK-0001");

        let out_of_range = verdict.check_payload(&decoder, json!({"status": "PASS", "score": 140}));
        assert_eq!(out_of_range.status, CheckStatus::Fail);
        assert_eq!(out_of_range.check_id, "CHECK-0005");

        let hook = lookup("HookInvocationResult").unwrap();
        let extra = hook.check_payload(
            &decoder,
            json!({"invocation_id": "i-1", "decision": "allow", "note": "x"}),
        );
        assert_eq!(extra.check_id, "CHECK-0004");
    }

    #[test]
    fn test_check_returns_canonical_value() {
        let value = lookup("Verdict")
            .unwrap()
            .check(&Decoder::new(), json!({"summary": "ok", "status": "PASS"}))
            .unwrap();
        assert_eq!(value["schema_version"], json!("1.0"));
        assert_eq!(value["score"], json!(0));
    }
}
