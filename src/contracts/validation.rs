//! Plan / execute / aggregate cycle for a batch of checks against a candidate
//!
//! A [`ValidationPlan`] names the checks to run. A [`ValidationRun`] records
//! their execution and moves through `pending → running → {completed, failed}`.
//! [`ValidationVerdict::from_run`] folds the two into a pass/block decision.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contracts::checks::{CheckStatus, Severity};
use crate::error::{ContractError, Result};
use crate::schema::{default_schema_version, require_non_empty, Contract, ExtraBag, ExtraFields, ExtraPolicy};

fn default_required() -> bool {
    true
}

/// One check a plan intends to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCheck {
    pub check_id: String,
    pub domain: String,
    /// Optional checks never block
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl PlannedCheck {
    pub const FIELDS: &'static [&'static str] = &["check_id", "domain", "required", "timeout_ms"];

    pub fn required(check_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            check_id: check_id.into(),
            domain: domain.into(),
            required: true,
            timeout_ms: None,
            extra: ExtraFields::new(),
        }
    }

    pub fn optional(check_id: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(check_id, domain)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPlan {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub plan_id: String,
    /// Commit, branch or artifact being validated
    pub candidate: String,
    pub checks: Vec<PlannedCheck>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ValidationPlan {
    pub fn new(
        plan_id: impl Into<String>,
        candidate: impl Into<String>,
        checks: Vec<PlannedCheck>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            plan_id: plan_id.into(),
            candidate: candidate.into(),
            checks,
            created_at,
            extra: ExtraFields::new(),
        }
    }

    pub fn required_checks(&self) -> impl Iterator<Item = &PlannedCheck> {
        self.checks.iter().filter(|c| c.required)
    }
}

impl Contract for ValidationPlan {
    const NAME: &'static str = "ValidationPlan";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] =
        &["schema_version", "plan_id", "candidate", "checks", "created_at"];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn extra_bags(&self) -> Vec<ExtraBag<'_>> {
        let mut bags = vec![ExtraBag::new(Self::NAME, Self::FIELDS, &self.extra)];
        bags.extend(
            self.checks
                .iter()
                .map(|c| ExtraBag::new("PlannedCheck", PlannedCheck::FIELDS, &c.extra)),
        );
        bags
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "plan_id", &self.plan_id)?;
        require_non_empty(Self::NAME, "candidate", &self.candidate)?;
        if self.checks.is_empty() {
            return Err(ContractError::validation(Self::NAME, "a plan needs at least one check"));
        }
        let mut seen = HashSet::new();
        for check in &self.checks {
            require_non_empty(Self::NAME, "checks[].check_id", &check.check_id)?;
            if !seen.insert(check.check_id.as_str()) {
                return Err(ContractError::validation(
                    Self::NAME,
                    format!("duplicate check_id {}", check.check_id),
                ));
            }
            if check.timeout_ms == Some(0) {
                return Err(ContractError::validation(Self::NAME, "checks[].timeout_ms must be > 0"));
            }
        }
        Ok(())
    }
}

/// Outcome of one planned check within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub check_id: String,
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

impl ValidationResult {
    pub fn new(check_id: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            schema_version: default_schema_version(),
            check_id: check_id.into(),
            status,
            severity: Severity::default(),
            message: None,
            duration_ms: None,
            extra: ExtraFields::new(),
        }
    }
}

impl Contract for ValidationResult {
    const NAME: &'static str = "ValidationResult";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "check_id",
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
        require_non_empty(Self::NAME, "check_id", &self.check_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ValidationRunStatus {
    pub fn can_transition_to(&self, next: ValidationRunStatus) -> bool {
        use ValidationRunStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Running, Completed) | (Running, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ValidationRunStatus::Completed | ValidationRunStatus::Failed)
    }
}

impl fmt::Display for ValidationRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationRunStatus::Pending => "pending",
            ValidationRunStatus::Running => "running",
            ValidationRunStatus::Completed => "completed",
            ValidationRunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Execution record for one plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRun {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub run_id: String,
    pub plan_id: String,
    pub status: ValidationRunStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: Vec<ValidationResult>,
    /// Set when the run itself broke, as opposed to a check failing
    #[serde(default)]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ValidationRun {
    pub fn pending(run_id: impl Into<String>, plan: &ValidationPlan) -> Self {
        Self {
            schema_version: default_schema_version(),
            run_id: run_id.into(),
            plan_id: plan.plan_id.clone(),
            status: ValidationRunStatus::Pending,
            started_at: None,
            finished_at: None,
            results: Vec::new(),
            error: None,
            extra: ExtraFields::new(),
        }
    }

    /// Move to `next`, stamping `at` as the start or finish time.
    ///
    /// Returns a new run; illegal moves fail with `InvalidTransition`.
    pub fn transition(&self, next: ValidationRunStatus, at: DateTime<Utc>) -> Result<Self> {
        if !self.status.can_transition_to(next) {
            return Err(ContractError::InvalidTransition {
                contract: Self::NAME,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let mut run = self.clone();
        run.status = next;
        match next {
            ValidationRunStatus::Running => run.started_at = Some(at),
            _ => run.finished_at = Some(at),
        }
        run.validate()?;
        Ok(run)
    }

    /// Add a result while the run is in flight
    pub fn record(&self, result: ValidationResult) -> Result<Self> {
        if self.status != ValidationRunStatus::Running {
            return Err(ContractError::validation(
                Self::NAME,
                format!("cannot record results while {}", self.status),
            ));
        }
        let mut run = self.clone();
        run.results.push(result);
        run.validate()?;
        Ok(run)
    }

    pub fn result_for(&self, check_id: &str) -> Option<&ValidationResult> {
        self.results.iter().rev().find(|r| r.check_id == check_id)
    }
}

impl Contract for ValidationRun {
    const NAME: &'static str = "ValidationRun";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "run_id",
        "plan_id",
        "status",
        "started_at",
        "finished_at",
        "results",
        "error",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn extra_bags(&self) -> Vec<ExtraBag<'_>> {
        let mut bags = vec![ExtraBag::new(Self::NAME, Self::FIELDS, &self.extra)];
        bags.extend(self.results.iter().flat_map(|r| r.extra_bags()));
        bags
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "run_id", &self.run_id)?;
        require_non_empty(Self::NAME, "plan_id", &self.plan_id)?;
        for result in &self.results {
            result.validate()?;
        }

        match self.status {
            ValidationRunStatus::Pending => {
                if self.started_at.is_some() || !self.results.is_empty() {
                    return Err(ContractError::validation(
                        Self::NAME,
                        "pending runs have no start time and no results",
                    ));
                }
            }
            ValidationRunStatus::Running => {
                if self.started_at.is_none() {
                    return Err(ContractError::validation(Self::NAME, "running runs need started_at"));
                }
            }
            ValidationRunStatus::Completed | ValidationRunStatus::Failed => {
                if self.started_at.is_none() || self.finished_at.is_none() {
                    return Err(ContractError::validation(
                        Self::NAME,
                        "finished runs need started_at and finished_at",
                    ));
                }
            }
        }

        if let (Some(start), Some(end)) = (self.started_at, self.finished_at) {
            if end < start {
                return Err(ContractError::validation(Self::NAME, "finished_at precedes started_at"));
            }
        }
        Ok(())
    }
}

/// Aggregate decision over a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub plan_id: String,
    pub run_id: String,
    pub passed: bool,
    /// Required checks that failed or never reported, in plan order
    #[serde(default)]
    pub blocking_failures: Vec<String>,
    /// Count of results per status
    #[serde(default)]
    pub tally: BTreeMap<String, u32>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl ValidationVerdict {
    /// Fold a run into a verdict. The run must belong to `plan` and be terminal.
    pub fn from_run(plan: &ValidationPlan, run: &ValidationRun) -> Result<Self> {
        if run.plan_id != plan.plan_id {
            return Err(ContractError::validation(
                Self::NAME,
                format!("run {} belongs to plan {}, not {}", run.run_id, run.plan_id, plan.plan_id),
            ));
        }
        if !run.status.is_terminal() {
            return Err(ContractError::validation(
                Self::NAME,
                format!("run {} is still {}", run.run_id, run.status),
            ));
        }

        let blocking_failures: Vec<String> = plan
            .required_checks()
            .filter(|planned| {
                run.result_for(&planned.check_id)
                    .map_or(true, |r| r.status != CheckStatus::Pass)
            })
            .map(|planned| planned.check_id.clone())
            .collect();

        let mut tally = BTreeMap::new();
        for result in &run.results {
            let key = serde_json::to_value(result.status)?
                .as_str()
                .unwrap_or_default()
                .to_string();
            *tally.entry(key).or_insert(0) += 1;
        }

        let passed = run.status == ValidationRunStatus::Completed && blocking_failures.is_empty();
        let summary = if passed {
            format!("{} required checks passed", plan.required_checks().count())
        } else if run.status == ValidationRunStatus::Failed {
            format!("run {} failed before completing", run.run_id)
        } else {
            format!("{} required checks blocking", blocking_failures.len())
        };

        Ok(Self {
            schema_version: default_schema_version(),
            plan_id: plan.plan_id.clone(),
            run_id: run.run_id.clone(),
            passed,
            blocking_failures,
            tally,
            summary: Some(summary),
            extra: ExtraFields::new(),
        })
    }
}

impl Contract for ValidationVerdict {
    const NAME: &'static str = "ValidationVerdict";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "plan_id",
        "run_id",
        "passed",
        "blocking_failures",
        "tally",
        "summary",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "plan_id", &self.plan_id)?;
        require_non_empty(Self::NAME, "run_id", &self.run_id)?;
        if self.passed && !self.blocking_failures.is_empty() {
            return Err(ContractError::validation(
                Self::NAME,
                "a passing verdict cannot list blocking failures",
            ));
        }
        Ok(())
    }
}
