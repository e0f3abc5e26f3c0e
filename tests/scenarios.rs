//! End-to-end contract scenarios
//!
//! Producer/consumer flows: RRH aggregation, snapshot retries, forward
//! compatibility, version gating and sealed updates.

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use pipeline_contracts::contracts::checks::{CheckResult, CheckStatus, RrhResult, Severity, Verdict, VerdictStatus};
use pipeline_contracts::contracts::events::{EventEnvelope, LinearSnapshotEvent};
use pipeline_contracts::contracts::hooks::HookInvocationResult;
use pipeline_contracts::contracts::run::RunContext;
use pipeline_contracts::contracts::validation::{
    PlannedCheck, ValidationPlan, ValidationResult, ValidationRun, ValidationRunStatus, ValidationVerdict,
};
use pipeline_contracts::ids::{ContractCheck, RrhCheck};
use pipeline_contracts::{
    decode_json, decode_yaml, encode_json, is_compatible, registry, ContractError, ContractsConfig,
    Contract, Decoder, SchemaVersion, Sealed,
};

fn fixture(name: &str) -> String {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "fixtures", name].iter().collect();
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e))
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, 10, minute, 0).unwrap()
}

// =============================================================================
// RRH aggregation
// =============================================================================

#[test]
fn test_rrh_aggregation_preserves_checks_in_order() {
    let checks = vec![
        CheckResult::new(RrhCheck::Lint.as_str(), "rrh", CheckStatus::Pass),
        CheckResult::new(RrhCheck::TypeCheck.as_str(), "rrh", CheckStatus::Pass),
        CheckResult::new(RrhCheck::TestSuite.as_str(), "rrh", CheckStatus::Fail)
            .with_severity(Severity::Critical)
            .with_message("3 tests failed"),
    ];
    let verdict = Verdict::new(VerdictStatus::Fail)
        .with_score(40)
        .with_block_reason("Tests failed");

    let result = RrhResult::new("9fceb02", checks.clone(), verdict).seal().unwrap();

    assert_eq!(result.checks, checks);
    assert_eq!(result.verdict.status, VerdictStatus::Fail);
    assert_eq!(result.verdict.score, 40);
    assert_eq!(result.verdict.block_reasons, vec!["Tests failed"]);
    assert!(!result.is_promotable());

    let blocking: Vec<&str> = result.blocking_failures().map(|c| c.check_id.as_str()).collect();
    assert_eq!(blocking, vec!["RRH-0001"]);

    let back: Sealed<RrhResult> = decode_json(&encode_json(&*result).unwrap()).unwrap();
    assert_eq!(back, result);
}

#[test]
fn test_rrh_fixture_keeps_future_fields() {
    let result: Sealed<RrhResult> = decode_yaml(&fixture("rrh_result.yaml")).unwrap();
    assert_eq!(result.schema_version, "1.3");
    assert_eq!(result.checks.len(), 3);
    assert_eq!(result.checks[2].status, CheckStatus::Fail);
    assert_eq!(result.verdict.status, VerdictStatus::Fail);
    assert_eq!(result.extra["pipeline_stage"], json!("release"));
    assert_eq!(result.failed_checks().count(), 1);
}

// =============================================================================
// Event partition keys
// =============================================================================

#[test]
fn test_snapshot_retry_is_the_same_logical_event() {
    let first: Sealed<LinearSnapshotEvent> = decode_json(&fixture("linear_snapshot.json")).unwrap();
    let retry = first
        .amend(|e| e.captured_at = e.captured_at + Duration::seconds(30))
        .unwrap();

    assert!(first.same_snapshot(&retry));
    assert_ne!(first.captured_at, retry.captured_at);

    let a = EventEnvelope::wrap(&first).unwrap();
    let b = EventEnvelope::wrap(&retry).unwrap();
    assert_eq!(a.partition_key, "5b0f2c1e-8d7a-4c39-9a51-2f6d0e4b7c13");
    assert_eq!(a.partition_key, b.partition_key);
    assert_eq!(a.topic, b.topic);
}

#[test]
fn test_event_contracts_reject_drift() {
    let mut payload: serde_json::Value = serde_json::from_str(&fixture("linear_snapshot.json")).unwrap();
    payload["cycle"] = json!(12);
    assert!(matches!(
        decode_json::<LinearSnapshotEvent>(&payload.to_string()),
        Err(ContractError::UnknownField { .. })
    ));
}

// =============================================================================
// Forward compatibility
// =============================================================================

#[test]
fn test_unknown_field_tolerated_by_allow_policy() {
    let text = fixture("check_result_future.json");

    let check: Sealed<CheckResult> = decode_json(&text).unwrap();
    assert_eq!(check.extra_fields().unwrap()["unknown_field"], json!("ok"));
    assert_eq!(check.check_id, "X");

    assert!(matches!(
        Decoder::new().strict().decode_json::<CheckResult>(&text),
        Err(ContractError::UnknownField { .. })
    ));
}

#[test]
fn test_forbid_policy_reported_with_stable_id() {
    let payload: serde_json::Value = serde_json::from_str(&fixture("hook_result_drift.json")).unwrap();
    let report = registry::lookup("HookInvocationResult")
        .unwrap()
        .check_payload(&Decoder::new(), payload);
    assert_eq!(report.status, CheckStatus::Fail);
    assert_eq!(report.check_id, ContractCheck::NoUndeclaredFields.as_str());
    assert!(report.message.unwrap().contains("latency_ms"));

    assert!(decode_json::<HookInvocationResult>(&fixture("hook_result_drift.json")).is_err());
}

// =============================================================================
// Version compatibility
// =============================================================================

#[test]
fn test_compatibility_table() {
    assert!(is_compatible("1.0", "1.0").unwrap());
    assert!(is_compatible("1.1", "1.0").unwrap());
    assert!(is_compatible("1.0", "1.5").unwrap());
    assert!(!is_compatible("2.0", "1.0").unwrap());
    assert!(!is_compatible("1.0", "2.0").unwrap());
    assert!(is_compatible("1.0", "banana").is_err());
}

#[test]
fn test_version_parsing() {
    assert!(SchemaVersion::parse("1").is_err());
    assert!(SchemaVersion::parse("a.b").is_err());

    let version = SchemaVersion::parse("  2.3  ").unwrap();
    assert_eq!((version.major, version.minor), (2, 3));
    assert_eq!(version.raw, "2.3");
}

#[test]
fn test_configured_reader_rejects_next_major() {
    let decoder = ContractsConfig::default().decoder().unwrap();
    let text = fixture("verdict_v2.json");

    assert!(matches!(
        decoder.decode_json::<Verdict>(&text),
        Err(ContractError::IncompatibleVersion { .. })
    ));
    // a reader that opted out of the gate still decodes it
    let verdict: Sealed<Verdict> = decode_json(&text).unwrap();
    assert_eq!(verdict.schema_version, "2.0");
}

// =============================================================================
// Sealed instances and bounds
// =============================================================================

#[test]
fn test_updates_build_new_instances() {
    let verdict = Verdict::new(VerdictStatus::Pass).seal().unwrap();
    let failed = verdict.with_field("status", json!("FAIL")).unwrap();

    assert_eq!(verdict.status, VerdictStatus::Pass);
    assert_eq!(failed.status, VerdictStatus::Fail);

    assert!(verdict.with_field("score", json!(101)).is_err());
    assert_eq!(verdict.score, 0);
}

#[test]
fn test_score_bounds() {
    for (score, ok) in [(-1, false), (0, true), (100, true), (101, false)] {
        let result = Verdict::new(VerdictStatus::Pass).with_score(score).seal();
        assert_eq!(result.is_ok(), ok, "score {}", score);
    }
}

#[test]
fn test_retry_is_a_new_run_context() {
    let first = RunContext::new("run-7", "build", at(0)).seal().unwrap();
    let second = first.next_attempt(at(5)).seal().unwrap();
    assert_eq!(first.attempt, 1);
    assert_eq!(second.attempt, 2);
    assert_eq!(second.run_id, first.run_id);

    assert!(first.amend(|ctx| ctx.attempt = 0).is_err());
}

// =============================================================================
// Validation cycle
// =============================================================================

#[test]
fn test_validation_cycle_blocks_on_missing_required_check() {
    let plan = ValidationPlan::new(
        "plan-9",
        "9fceb02",
        vec![
            PlannedCheck::required("RRH-0001", "rrh"),
            PlannedCheck::required("RRH-0006", "rrh"),
            PlannedCheck::optional("CHECK-MEAS-004", "meas"),
        ],
        at(0),
    )
    .seal()
    .unwrap();

    let pending = ValidationRun::pending("vrun-9", &plan).seal().unwrap();
    assert!(matches!(
        pending.transition(ValidationRunStatus::Completed, at(1)),
        Err(ContractError::InvalidTransition { .. })
    ));

    let done = pending
        .transition(ValidationRunStatus::Running, at(1))
        .and_then(|run| run.record(ValidationResult::new("RRH-0001", CheckStatus::Pass)))
        .and_then(|run| run.record(ValidationResult::new("CHECK-MEAS-004", CheckStatus::Fail)))
        .and_then(|run| run.transition(ValidationRunStatus::Completed, at(7)))
        .unwrap();
    assert_eq!(pending.status, ValidationRunStatus::Pending);

    let verdict = ValidationVerdict::from_run(&plan, &done).unwrap().seal().unwrap();
    assert!(!verdict.passed);
    assert_eq!(verdict.blocking_failures, vec!["RRH-0006"]);
}
