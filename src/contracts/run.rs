//! Run context and resume checkpoints

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Result};
use crate::schema::{default_schema_version, require_non_empty, Contract, ExtraFields, ExtraPolicy};

fn default_attempt() -> u32 {
    1
}

/// Per-snapshot state of one pipeline run.
///
/// A retry is a new `RunContext` with `attempt` incremented, never an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub run_id: String,
    /// Pipeline phase the snapshot was taken in
    pub phase: String,
    /// Starts at 1
    #[serde(default = "default_attempt")]
    pub attempt: u32,
    /// Logical artifact name → location
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    #[serde(default)]
    pub work_item_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, phase: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: default_schema_version(),
            run_id: run_id.into(),
            phase: phase.into(),
            attempt: default_attempt(),
            artifacts: BTreeMap::new(),
            work_item_id: None,
            started_at,
            extra: ExtraFields::new(),
        }
    }

    pub fn with_artifact(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.artifacts.insert(name.into(), location.into());
        self
    }

    pub fn artifact(&self, name: &str) -> Option<&str> {
        self.artifacts.get(name).map(String::as_str)
    }

    /// Context for the next attempt of the same run
    pub fn next_attempt(&self, started_at: DateTime<Utc>) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            started_at,
            ..self.clone()
        }
    }
}

impl Contract for RunContext {
    const NAME: &'static str = "RunContext";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "run_id",
        "phase",
        "attempt",
        "artifacts",
        "work_item_id",
        "started_at",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "run_id", &self.run_id)?;
        require_non_empty(Self::NAME, "phase", &self.phase)?;
        if self.attempt < 1 {
            return Err(ContractError::validation(Self::NAME, "attempt must be >= 1"));
        }
        if self.artifacts.keys().any(|k| k.trim().is_empty()) {
            return Err(ContractError::validation(Self::NAME, "artifact names must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Completed,
    InProgress,
    Failed,
    Blocked,
}

impl CheckpointStatus {
    /// A run can resume from this checkpoint without operator action
    pub fn is_resumable(&self) -> bool {
        matches!(self, CheckpointStatus::Completed | CheckpointStatus::InProgress)
    }
}

/// Point-in-time snapshot a run can resume from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub checkpoint_id: String,
    pub run_id: String,
    pub phase: String,
    pub status: CheckpointStatus,
    /// Monotonic within a run
    #[serde(default)]
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    /// Required when `status` is `failed`
    #[serde(default)]
    pub error: Option<String>,
    /// Required when `status` is `blocked`
    #[serde(default)]
    pub blocked_reason: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Checkpoint {
    pub fn new(
        checkpoint_id: impl Into<String>,
        run: &RunContext,
        status: CheckpointStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            checkpoint_id: checkpoint_id.into(),
            run_id: run.run_id.clone(),
            phase: run.phase.clone(),
            status,
            sequence: 0,
            created_at,
            artifacts: run.artifacts.clone(),
            error: None,
            blocked_reason: None,
            extra: ExtraFields::new(),
        }
    }

    /// Whether `self` was taken after `other` within the same run
    pub fn supersedes(&self, other: &Checkpoint) -> bool {
        self.run_id == other.run_id && self.sequence > other.sequence
    }
}

impl Contract for Checkpoint {
    const NAME: &'static str = "Checkpoint";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "checkpoint_id",
        "run_id",
        "phase",
        "status",
        "sequence",
        "created_at",
        "artifacts",
        "error",
        "blocked_reason",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "checkpoint_id", &self.checkpoint_id)?;
        require_non_empty(Self::NAME, "run_id", &self.run_id)?;
        require_non_empty(Self::NAME, "phase", &self.phase)?;
        match self.status {
            CheckpointStatus::Failed if self.error.is_none() => Err(ContractError::validation(
                Self::NAME,
                "failed checkpoints must carry an error",
            )),
            CheckpointStatus::Blocked if self.blocked_reason.is_none() => Err(ContractError::validation(
                Self::NAME,
                "blocked checkpoints must carry a blocked_reason",
            )),
            _ => Ok(()),
        }
    }
}
