//! Check results, verdicts and release readiness handshake (RRH) results

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Result};
use crate::ids::StableId;
use crate::schema::{default_schema_version, require_non_empty, Contract, ExtraBag, ExtraFields, ExtraPolicy};

/// Outcome of one discrete check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    #[default]
    Major,
    Minor,
    Nit,
}

impl Severity {
    /// Critical and major failures block promotion
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Major)
    }
}

/// Aggregate outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Quarantine,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::Pass => f.write_str("PASS"),
            VerdictStatus::Fail => f.write_str("FAIL"),
            VerdictStatus::Quarantine => f.write_str("QUARANTINE"),
        }
    }
}

/// Outcome of one lint, test or schema check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Usually a published [`StableId`] token, but free-form ids are accepted
    pub check_id: String,
    /// Check family, e.g. `rrh`, `lint`, `test`
    pub domain: String,
    pub status: CheckStatus,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl CheckResult {
    pub fn new(check_id: impl Into<String>, domain: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            schema_version: default_schema_version(),
            check_id: check_id.into(),
            domain: domain.into(),
            status,
            severity: Severity::default(),
            message: None,
            duration_ms: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Resolve `check_id` against the published identifier tables
    pub fn stable_id(&self) -> Option<StableId> {
        StableId::parse(&self.check_id).ok()
    }

    pub fn is_blocking_failure(&self) -> bool {
        self.status == CheckStatus::Fail && self.severity.is_blocking()
    }
}

impl Contract for CheckResult {
    const NAME: &'static str = "CheckResult";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "check_id",
        "domain",
        "status",
        "severity",
        "message",
        "duration_ms",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "check_id", &self.check_id)?;
        require_non_empty(Self::NAME, "domain", &self.domain)
    }
}

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

/// Aggregated outcome over many check results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub status: VerdictStatus,
    /// 0..=100
    #[serde(default)]
    pub score: i32,
    /// Ordered, most important first
    #[serde(default)]
    pub block_reasons: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Verdict {
    pub fn new(status: VerdictStatus) -> Self {
        Self {
            schema_version: default_schema_version(),
            status,
            score: MIN_SCORE,
            block_reasons: Vec::new(),
            summary: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn with_score(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    pub fn with_block_reason(mut self, reason: impl Into<String>) -> Self {
        self.block_reasons.push(reason.into());
        self
    }

    pub fn is_blocked(&self) -> bool {
        self.status != VerdictStatus::Pass
    }
}

impl Contract for Verdict {
    const NAME: &'static str = "Verdict";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] =
        &["schema_version", "status", "score", "block_reasons", "summary"];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.score) {
            return Err(ContractError::validation(
                Self::NAME,
                format!("score must be within [{}, {}], got {}", MIN_SCORE, MAX_SCORE, self.score),
            ));
        }
        if self.block_reasons.iter().any(|r| r.trim().is_empty()) {
            return Err(ContractError::validation(Self::NAME, "block_reasons must not contain blank entries"));
        }
        Ok(())
    }
}

/// Release readiness handshake result: the checks in run order plus the verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrhResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Candidate under evaluation (commit, tag or build id)
    pub candidate: String,
    #[serde(default)]
    pub checks: Vec<CheckResult>,
    pub verdict: Verdict,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl RrhResult {
    pub fn new(candidate: impl Into<String>, checks: Vec<CheckResult>, verdict: Verdict) -> Self {
        Self {
            schema_version: default_schema_version(),
            candidate: candidate.into(),
            checks,
            verdict,
            extra: ExtraFields::new(),
        }
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Fail)
    }

    /// Failed checks of critical or major severity, in run order
    pub fn blocking_failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| c.is_blocking_failure())
    }

    pub fn is_promotable(&self) -> bool {
        self.verdict.status == VerdictStatus::Pass
    }
}

impl Contract for RrhResult {
    const NAME: &'static str = "RRHResult";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &["schema_version", "candidate", "checks", "verdict"];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn extra_bags(&self) -> Vec<ExtraBag<'_>> {
        let mut bags = vec![ExtraBag::new(Self::NAME, Self::FIELDS, &self.extra)];
        bags.extend(self.checks.iter().flat_map(|c| c.extra_bags()));
        bags.extend(self.verdict.extra_bags());
        bags
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "candidate", &self.candidate)?;
        for check in &self.checks {
            check.validate()?;
        }
        self.verdict.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_json, encode_json};
    use crate::ids::RrhCheck;
    use crate::schema::Sealed;
    use serde_json::json;

    #[test]
    fn test_check_result_defaults() {
        let check: Sealed<CheckResult> =
            decode_json(r#"{"check_id":"X","domain":"rrh","status":"pass"}"#).unwrap();
        assert_eq!(check.schema_version, "1.0");
        assert_eq!(check.severity, Severity::Major);
        assert_eq!(check.message, None);
        assert_eq!(check.duration_ms, None);
        assert!(check.extra.is_empty());
    }

    #[test]
    fn test_check_result_closed_sets() {
        assert!(decode_json::<CheckResult>(r#"{"check_id":"X","domain":"rrh","status":"passed"}"#).is_err());
        assert!(decode_json::<CheckResult>(
            r#"{"check_id":"X","domain":"rrh","status":"pass","severity":"blocker"}"#
        )
        .is_err());
        assert!(decode_json::<CheckResult>(
            r#"{"check_id":"X","domain":"rrh","status":"pass","duration_ms":-5}"#
        )
        .is_err());
        assert!(decode_json::<CheckResult>(r#"{"domain":"rrh","status":"pass"}"#).is_err());
    }

    #[test]
    fn test_extras_cannot_shadow_declared_fields() {
        let mut check = CheckResult::new("RRH-0001", "rrh", CheckStatus::Pass);
        check.extra.insert("status".to_string(), json!("fail"));
        assert!(matches!(
            check.clone().seal(),
            Err(ContractError::Validation { contract: "CheckResult", .. })
        ));

        let nested = RrhResult::new("9fceb02", vec![check], Verdict::new(VerdictStatus::Pass));
        assert!(nested.seal().is_err());

        let mut verdict = Verdict::new(VerdictStatus::Pass);
        verdict.extra.insert("score".to_string(), json!(100));
        assert!(matches!(
            RrhResult::new("9fceb02", vec![], verdict).seal(),
            Err(ContractError::Validation { contract: "Verdict", .. })
        ));
    }

    #[test]
    fn test_check_result_requires_ids() {
        assert!(CheckResult::new("", "rrh", CheckStatus::Pass).seal().is_err());
        assert!(CheckResult::new("X", " ", CheckStatus::Pass).seal().is_err());
    }

    #[test]
    fn test_check_result_stable_id() {
        let check = CheckResult::new(RrhCheck::Lint.as_str(), "rrh", CheckStatus::Pass);
        assert_eq!(check.stable_id(), Some(StableId::Rrh(RrhCheck::Lint)));
        assert_eq!(CheckResult::new("X", "rrh", CheckStatus::Pass).stable_id(), None);
    }

    #[test]
    fn test_verdict_score_bounds() {
        assert!(Verdict::new(VerdictStatus::Pass).with_score(-1).seal().is_err());
        assert!(Verdict::new(VerdictStatus::Pass).with_score(101).seal().is_err());
        assert!(Verdict::new(VerdictStatus::Pass).with_score(0).seal().is_ok());
        assert!(Verdict::new(VerdictStatus::Pass).with_score(100).seal().is_ok());
        assert!(decode_json::<Verdict>(r#"{"status":"PASS","score":101}"#).is_err());
    }

    #[test]
    fn test_verdict_status_tokens() {
        let verdict = Verdict::new(VerdictStatus::Quarantine);
        assert!(encode_json(&verdict).unwrap().contains(r#""status":"QUARANTINE""#));
        assert!(decode_json::<Verdict>(r#"{"status":"pass"}"#).is_err());
    }

    #[test]
    fn test_sealed_verdict_update_is_a_new_instance() {
        let verdict = Verdict::new(VerdictStatus::Pass).seal().unwrap();

        let failed = verdict.with_field("status", json!("FAIL")).unwrap();
        assert_eq!(failed.status, VerdictStatus::Fail);
        assert_eq!(verdict.status, VerdictStatus::Pass);

        assert!(verdict.with_field("score", json!(500)).is_err());
        assert_eq!(verdict.score, 0);
    }

    #[test]
    fn test_rrh_validates_nested_contracts() {
        let bad_check = CheckResult::new("", "rrh", CheckStatus::Fail);
        let result = RrhResult::new("abc123", vec![bad_check], Verdict::new(VerdictStatus::Fail));
        assert!(result.seal().is_err());

        let bad_verdict = Verdict::new(VerdictStatus::Fail).with_score(120);
        assert!(RrhResult::new("abc123", vec![], bad_verdict).seal().is_err());
    }
}
