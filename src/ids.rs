//! Stable identifier tables
//!
//! Check and rule identifiers referenced from [`CheckResult::check_id`] and
//! [`WorkAuthorization::reason_code`]. A published token never changes
//! meaning. The tables are append-only: new behaviour gets a new token and
//! retired tokens are never reused within a major version.
//!
//! [`CheckResult::check_id`]: crate::contracts::checks::CheckResult::check_id
//! [`WorkAuthorization::reason_code`]: crate::contracts::auth::WorkAuthorization::reason_code

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ContractError;

static RRH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RRH-[0-9]{4}$").expect("valid RRH pattern"));
static MEASUREMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CHECK-MEAS-[0-9]{3}$").expect("valid CHECK-MEAS pattern"));
static CONTRACT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CHECK-[0-9]{4}$").expect("valid CHECK pattern"));

/// Release readiness handshake checks (`RRH-xxxx`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RrhCheck {
    #[serde(rename = "RRH-0001")]
    TestSuite,
    #[serde(rename = "RRH-0002")]
    Lint,
    #[serde(rename = "RRH-0003")]
    TypeCheck,
    #[serde(rename = "RRH-0004")]
    SchemaContracts,
    #[serde(rename = "RRH-0005")]
    Coverage,
    #[serde(rename = "RRH-0006")]
    SecurityScan,
    #[serde(rename = "RRH-0007")]
    BuildArtifacts,
    #[serde(rename = "RRH-0008")]
    Changelog,
}

impl RrhCheck {
    /// Publication order; append new checks at the end
    pub const ALL: &'static [RrhCheck] = &[
        RrhCheck::TestSuite,
        RrhCheck::Lint,
        RrhCheck::TypeCheck,
        RrhCheck::SchemaContracts,
        RrhCheck::Coverage,
        RrhCheck::SecurityScan,
        RrhCheck::BuildArtifacts,
        RrhCheck::Changelog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RrhCheck::TestSuite => "RRH-0001",
            RrhCheck::Lint => "RRH-0002",
            RrhCheck::TypeCheck => "RRH-0003",
            RrhCheck::SchemaContracts => "RRH-0004",
            RrhCheck::Coverage => "RRH-0005",
            RrhCheck::SecurityScan => "RRH-0006",
            RrhCheck::BuildArtifacts => "RRH-0007",
            RrhCheck::Changelog => "RRH-0008",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RrhCheck::TestSuite => "Test suite passes",
            RrhCheck::Lint => "Linters report no errors",
            RrhCheck::TypeCheck => "Type checker passes",
            RrhCheck::SchemaContracts => "Wire contracts decode against reader schemas",
            RrhCheck::Coverage => "Coverage meets the configured floor",
            RrhCheck::SecurityScan => "Dependency and secret scans are clean",
            RrhCheck::BuildArtifacts => "Release artifacts build reproducibly",
            RrhCheck::Changelog => "Changelog entry present",
        }
    }
}

/// Measurement checks (`CHECK-MEAS-xxx`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeasurementCheck {
    #[serde(rename = "CHECK-MEAS-001")]
    CoverageDelta,
    #[serde(rename = "CHECK-MEAS-002")]
    BuildDuration,
    #[serde(rename = "CHECK-MEAS-003")]
    ArtifactSize,
    #[serde(rename = "CHECK-MEAS-004")]
    FlakeRate,
    #[serde(rename = "CHECK-MEAS-005")]
    LatencyRegression,
}

impl MeasurementCheck {
    pub const ALL: &'static [MeasurementCheck] = &[
        MeasurementCheck::CoverageDelta,
        MeasurementCheck::BuildDuration,
        MeasurementCheck::ArtifactSize,
        MeasurementCheck::FlakeRate,
        MeasurementCheck::LatencyRegression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementCheck::CoverageDelta => "CHECK-MEAS-001",
            MeasurementCheck::BuildDuration => "CHECK-MEAS-002",
            MeasurementCheck::ArtifactSize => "CHECK-MEAS-003",
            MeasurementCheck::FlakeRate => "CHECK-MEAS-004",
            MeasurementCheck::LatencyRegression => "CHECK-MEAS-005",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MeasurementCheck::CoverageDelta => "Line coverage change against the base branch",
            MeasurementCheck::BuildDuration => "Wall-clock build time",
            MeasurementCheck::ArtifactSize => "Size of the primary release artifact",
            MeasurementCheck::FlakeRate => "Share of tests that passed only on retry",
            MeasurementCheck::LatencyRegression => "p95 latency change on the benchmark suite",
        }
    }
}

/// Contract conformance checks (`CHECK-xxxx`), reported by payload validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContractCheck {
    #[serde(rename = "CHECK-0001")]
    PayloadConforms,
    #[serde(rename = "CHECK-0002")]
    SchemaVersionValid,
    #[serde(rename = "CHECK-0003")]
    SchemaVersionCompatible,
    #[serde(rename = "CHECK-0004")]
    NoUndeclaredFields,
    #[serde(rename = "CHECK-0005")]
    FieldConstraints,
    #[serde(rename = "CHECK-0006")]
    StatusTransition,
}

impl ContractCheck {
    pub const ALL: &'static [ContractCheck] = &[
        ContractCheck::PayloadConforms,
        ContractCheck::SchemaVersionValid,
        ContractCheck::SchemaVersionCompatible,
        ContractCheck::NoUndeclaredFields,
        ContractCheck::FieldConstraints,
        ContractCheck::StatusTransition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractCheck::PayloadConforms => "CHECK-0001",
            ContractCheck::SchemaVersionValid => "CHECK-0002",
            ContractCheck::SchemaVersionCompatible => "CHECK-0003",
            ContractCheck::NoUndeclaredFields => "CHECK-0004",
            ContractCheck::FieldConstraints => "CHECK-0005",
            ContractCheck::StatusTransition => "CHECK-0006",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ContractCheck::PayloadConforms => "Payload decodes and validates",
            ContractCheck::SchemaVersionValid => "schema_version parses as major.minor",
            ContractCheck::SchemaVersionCompatible => "schema_version is on the reader's major line",
            ContractCheck::NoUndeclaredFields => "No undeclared fields under a forbid policy",
            ContractCheck::FieldConstraints => "Required, bounded and enumerated fields hold",
            ContractCheck::StatusTransition => "Status follows the declared state machine",
        }
    }

    /// The check a rejected payload failed
    pub fn for_error(error: &ContractError) -> Self {
        match error {
            ContractError::InvalidVersion { .. } => ContractCheck::SchemaVersionValid,
            ContractError::IncompatibleVersion { .. } => ContractCheck::SchemaVersionCompatible,
            ContractError::UnknownField { .. } => ContractCheck::NoUndeclaredFields,
            ContractError::InvalidTransition { .. } => ContractCheck::StatusTransition,
            ContractError::Validation { .. } => ContractCheck::FieldConstraints,
            _ => ContractCheck::PayloadConforms,
        }
    }
}

/// Reason codes for [`WorkAuthorization`](crate::contracts::auth::WorkAuthorization)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthReasonCode {
    PolicySatisfied,
    PreApproved,
    BudgetExceeded,
    ScopeViolation,
    MissingApproval,
    RiskThresholdExceeded,
    ManualReviewRequired,
    UnknownWorkItem,
}

impl AuthReasonCode {
    pub const ALL: &'static [AuthReasonCode] = &[
        AuthReasonCode::PolicySatisfied,
        AuthReasonCode::PreApproved,
        AuthReasonCode::BudgetExceeded,
        AuthReasonCode::ScopeViolation,
        AuthReasonCode::MissingApproval,
        AuthReasonCode::RiskThresholdExceeded,
        AuthReasonCode::ManualReviewRequired,
        AuthReasonCode::UnknownWorkItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthReasonCode::PolicySatisfied => "policy_satisfied",
            AuthReasonCode::PreApproved => "pre_approved",
            AuthReasonCode::BudgetExceeded => "budget_exceeded",
            AuthReasonCode::ScopeViolation => "scope_violation",
            AuthReasonCode::MissingApproval => "missing_approval",
            AuthReasonCode::RiskThresholdExceeded => "risk_threshold_exceeded",
            AuthReasonCode::ManualReviewRequired => "manual_review_required",
            AuthReasonCode::UnknownWorkItem => "unknown_work_item",
        }
    }

    /// Whether the code justifies an `allow` decision
    pub fn permits(&self) -> bool {
        matches!(self, AuthReasonCode::PolicySatisfied | AuthReasonCode::PreApproved)
    }
}

/// `Display` and `FromStr` over a table's published tokens
macro_rules! token_table {
    ($($table:ident),+ $(,)?) => {$(
        impl fmt::Display for $table {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $table {
            type Err = ContractError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL.iter().copied().find(|id| id.as_str() == s).ok_or_else(|| {
                    ContractError::validation(stringify!($table), format!("unknown token {:?}", s))
                })
            }
        }
    )+};
}

token_table!(RrhCheck, MeasurementCheck, ContractCheck, AuthReasonCode);

/// Family a check or rule token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdFamily {
    Rrh,
    Measurement,
    Contract,
}

impl IdFamily {
    /// Classify a token by shape alone; published or not
    pub fn of(token: &str) -> Option<Self> {
        if RRH_PATTERN.is_match(token) {
            Some(IdFamily::Rrh)
        } else if MEASUREMENT_PATTERN.is_match(token) {
            Some(IdFamily::Measurement)
        } else if CONTRACT_PATTERN.is_match(token) {
            Some(IdFamily::Contract)
        } else {
            None
        }
    }
}

/// Any published check or rule identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StableId {
    Rrh(RrhCheck),
    Measurement(MeasurementCheck),
    Contract(ContractCheck),
}

impl StableId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StableId::Rrh(id) => id.as_str(),
            StableId::Measurement(id) => id.as_str(),
            StableId::Contract(id) => id.as_str(),
        }
    }

    pub fn family(&self) -> IdFamily {
        match self {
            StableId::Rrh(_) => IdFamily::Rrh,
            StableId::Measurement(_) => IdFamily::Measurement,
            StableId::Contract(_) => IdFamily::Contract,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StableId::Rrh(id) => id.description(),
            StableId::Measurement(id) => id.description(),
            StableId::Contract(id) => id.description(),
        }
    }

    /// Every published identifier, family by family in publication order
    pub fn all() -> impl Iterator<Item = StableId> {
        RrhCheck::ALL
            .iter()
            .copied()
            .map(StableId::Rrh)
            .chain(MeasurementCheck::ALL.iter().copied().map(StableId::Measurement))
            .chain(ContractCheck::ALL.iter().copied().map(StableId::Contract))
    }

    /// Resolve a published token; malformed and unpublished tokens fail
    pub fn parse(token: &str) -> Result<Self, ContractError> {
        let family = IdFamily::of(token).ok_or_else(|| {
            ContractError::validation("StableId", format!("malformed identifier {:?}", token))
        })?;
        Self::all()
            .find(|id| id.family() == family && id.as_str() == token)
            .ok_or_else(|| {
                ContractError::validation("StableId", format!("unpublished identifier {:?}", token))
            })
    }
}

impl FromStr for StableId {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RrhCheck> for StableId {
    fn from(id: RrhCheck) -> Self {
        StableId::Rrh(id)
    }
}

impl From<MeasurementCheck> for StableId {
    fn from(id: MeasurementCheck) -> Self {
        StableId::Measurement(id)
    }
}

impl From<ContractCheck> for StableId {
    fn from(id: ContractCheck) -> Self {
        StableId::Contract(id)
    }
}
