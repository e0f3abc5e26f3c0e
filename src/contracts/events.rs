//! Append-only event contracts for the pipeline message bus
//!
//! Every event names a partition-key field. Producers must reuse the same key
//! when retrying the same logical event; the schema only checks that one is
//! present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{ContractError, Result};
use crate::registry;
use crate::schema::{default_schema_version, require_non_empty, Contract, ExtraPolicy, Sealed};

/// An event contract routed through the bus
pub trait EventContract: Contract {
    /// Key into the topic registry
    const EVENT_TYPE: &'static str;
    /// Name of the partition-key field
    const PARTITION_KEY_FIELD: &'static str;

    fn partition_key(&self) -> &str;

    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Mint a fresh partition key (UUIDv4)
pub fn new_partition_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitHookKind {
    PreCommit,
    CommitMsg,
    PrePush,
    PostCommit,
    PostMerge,
    PostCheckout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitHookEvent {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Partition key
    pub event_id: String,
    pub hook: GitHookKind,
    pub repository: String,
    #[serde(default)]
    pub ref_name: Option<String>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub changed_files: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

impl GitHookEvent {
    pub fn new(hook: GitHookKind, repository: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: default_schema_version(),
            event_id: new_partition_key(),
            hook,
            repository: repository.into(),
            ref_name: None,
            commit_sha: None,
            changed_files: Vec::new(),
            occurred_at,
        }
    }
}

impl Contract for GitHookEvent {
    const NAME: &'static str = "GitHookEvent";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "event_id",
        "hook",
        "repository",
        "ref_name",
        "commit_sha",
        "changed_files",
        "occurred_at",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "event_id", &self.event_id)?;
        require_non_empty(Self::NAME, "repository", &self.repository)?;
        if let Some(sha) = &self.commit_sha {
            if sha.len() < 7 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ContractError::validation(
                    Self::NAME,
                    format!("commit_sha {:?} is not a hex object id", sha),
                ));
            }
        }
        Ok(())
    }
}

impl EventContract for GitHookEvent {
    const EVENT_TYPE: &'static str = "git.hook";
    const PARTITION_KEY_FIELD: &'static str = "event_id";

    fn partition_key(&self) -> &str {
        &self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// State of one issue at snapshot time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearIssueSnapshot {
    pub id: String,
    /// Human key, e.g. `ENG-42`
    pub identifier: String,
    pub title: String,
    pub state: String,
    /// 0 (none) to 4 (low), as Linear numbers them
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// One poll cycle's view of a Linear team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearSnapshotEvent {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Partition key, shared by every retry of the same poll cycle
    pub snapshot_id: String,
    pub team_key: String,
    #[serde(default)]
    pub issues: Vec<LinearIssueSnapshot>,
    pub captured_at: DateTime<Utc>,
}

impl LinearSnapshotEvent {
    pub fn new(
        snapshot_id: impl Into<String>,
        team_key: impl Into<String>,
        issues: Vec<LinearIssueSnapshot>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            snapshot_id: snapshot_id.into(),
            team_key: team_key.into(),
            issues,
            captured_at,
        }
    }

    /// Same logical snapshot: every declared field matches except `captured_at`
    pub fn same_snapshot(&self, other: &LinearSnapshotEvent) -> bool {
        self.schema_version == other.schema_version
            && self.snapshot_id == other.snapshot_id
            && self.team_key == other.team_key
            && self.issues == other.issues
    }
}

impl Contract for LinearSnapshotEvent {
    const NAME: &'static str = "LinearSnapshotEvent";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] =
        &["schema_version", "snapshot_id", "team_key", "issues", "captured_at"];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "snapshot_id", &self.snapshot_id)?;
        require_non_empty(Self::NAME, "team_key", &self.team_key)?;
        for issue in &self.issues {
            require_non_empty(Self::NAME, "issues[].id", &issue.id)?;
            require_non_empty(Self::NAME, "issues[].identifier", &issue.identifier)?;
            if issue.priority > 4 {
                return Err(ContractError::validation(
                    Self::NAME,
                    format!("{} has priority {}, expected 0..=4", issue.identifier, issue.priority),
                ));
            }
        }
        Ok(())
    }
}

impl EventContract for LinearSnapshotEvent {
    const EVENT_TYPE: &'static str = "linear.snapshot";
    const PARTITION_KEY_FIELD: &'static str = "snapshot_id";

    fn partition_key(&self) -> &str {
        &self.snapshot_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

/// Combined CI state of the head commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitCheckState {
    Pending,
    Success,
    Failure,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubPRStatusEvent {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Partition key
    pub event_id: String,
    /// `owner/name`
    pub repository: String,
    pub pr_number: u64,
    pub head_sha: String,
    pub state: PullRequestState,
    pub checks_state: CommitCheckState,
    #[serde(default)]
    pub mergeable: Option<bool>,
    pub observed_at: DateTime<Utc>,
}

impl Contract for GitHubPRStatusEvent {
    const NAME: &'static str = "GitHubPRStatusEvent";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "event_id",
        "repository",
        "pr_number",
        "head_sha",
        "state",
        "checks_state",
        "mergeable",
        "observed_at",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "event_id", &self.event_id)?;
        require_non_empty(Self::NAME, "head_sha", &self.head_sha)?;
        match self.repository.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => {
                return Err(ContractError::validation(
                    Self::NAME,
                    format!("repository {:?} is not owner/name", self.repository),
                ))
            }
        }
        if self.pr_number == 0 {
            return Err(ContractError::validation(Self::NAME, "pr_number must be >= 1"));
        }
        Ok(())
    }
}

impl EventContract for GitHubPRStatusEvent {
    const EVENT_TYPE: &'static str = "github.pr_status";
    const PARTITION_KEY_FIELD: &'static str = "event_id";

    fn partition_key(&self) -> &str {
        &self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Bus message wrapping one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventEnvelope {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub event_type: String,
    pub topic: String,
    pub partition_key: String,
    /// Canonical encoding of the wrapped event
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Wrap an event, resolving its topic from the registry
    pub fn wrap<E: EventContract>(event: &Sealed<E>) -> Result<Sealed<Self>> {
        let topic = registry::topic_for(E::EVENT_TYPE)
            .ok_or_else(|| ContractError::UnknownEventType(E::EVENT_TYPE.to_string()))?;
        Self {
            schema_version: default_schema_version(),
            event_type: E::EVENT_TYPE.to_string(),
            topic: topic.to_string(),
            partition_key: event.partition_key().to_string(),
            payload: codec::to_canonical_value(event.as_inner())?,
            occurred_at: event.occurred_at(),
        }
        .seal()
    }

    /// Decode the payload as `E`, refusing envelopes of another event type
    pub fn open<E: EventContract>(&self) -> Result<Sealed<E>> {
        if self.event_type != E::EVENT_TYPE {
            return Err(ContractError::validation(
                Self::NAME,
                format!("envelope carries {}, not {}", self.event_type, E::EVENT_TYPE),
            ));
        }
        let event: Sealed<E> = codec::Decoder::new().decode_value(self.payload.clone())?;
        if event.partition_key() != self.partition_key {
            return Err(ContractError::validation(
                Self::NAME,
                "partition_key does not match the wrapped event",
            ));
        }
        Ok(event)
    }
}

impl Contract for EventEnvelope {
    const NAME: &'static str = "EventEnvelope";
    const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "event_type",
        "topic",
        "partition_key",
        "payload",
        "occurred_at",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "partition_key", &self.partition_key)?;
        match registry::topic_for(&self.event_type) {
            None => Err(ContractError::UnknownEventType(self.event_type.clone())),
            Some(topic) if topic != self.topic => Err(ContractError::validation(
                Self::NAME,
                format!("{} is routed to {}, not {}", self.event_type, topic, self.topic),
            )),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_json, encode_json};
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 14, minute, 0).unwrap()
    }

    fn issue() -> LinearIssueSnapshot {
        LinearIssueSnapshot {
            id: "a1b2".to_string(),
            identifier: "ENG-42".to_string(),
            title: "Flaky checkout test".to_string(),
            state: "In Progress".to_string(),
            priority: 2,
            assignee: Some("dana".to_string()),
            labels: vec!["bug".to_string()],
            updated_at: at(0),
        }
    }

    fn pr_event() -> GitHubPRStatusEvent {
        GitHubPRStatusEvent {
            schema_version: default_schema_version(),
            event_id: new_partition_key(),
            repository: "acme/api".to_string(),
            pr_number: 318,
            head_sha: "9fceb02d0ae598e95dc970b74767f19372d61af8".to_string(),
            state: PullRequestState::Open,
            checks_state: CommitCheckState::Pending,
            mergeable: None,
            observed_at: at(5),
        }
    }

    #[test]
    fn test_partition_keys_are_uuid_v4() {
        let key = new_partition_key();
        let parsed = uuid::Uuid::parse_str(&key).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_ne!(key, new_partition_key());
    }

    #[test]
    fn test_events_require_partition_key() {
        let mut event = GitHookEvent::new(GitHookKind::PrePush, "acme/api", at(1));
        event.event_id = String::new();
        assert!(event.seal().is_err());

        let snapshot = LinearSnapshotEvent::new("", "ENG", vec![], at(1));
        assert!(snapshot.seal().is_err());
    }

    #[test]
    fn test_git_hook_kind_tokens() {
        let event = GitHookEvent::new(GitHookKind::PostMerge, "acme/api", at(1));
        assert!(encode_json(&event).unwrap().contains(r#""hook":"post-merge""#));
    }

    #[test]
    fn test_commit_sha_shape() {
        let mut event = GitHookEvent::new(GitHookKind::PreCommit, "acme/api", at(1));
        event.commit_sha = Some("zzz".to_string());
        assert!(event.clone().seal().is_err());
        event.commit_sha = Some("9fceb02".to_string());
        assert!(event.seal().is_ok());
    }

    #[test]
    fn test_same_snapshot_ignores_capture_time() {
        let first = LinearSnapshotEvent::new("snap-1", "ENG", vec![issue()], at(0)).seal().unwrap();
        let retry = LinearSnapshotEvent::new("snap-1", "ENG", vec![issue()], at(3)).seal().unwrap();
        assert!(first.same_snapshot(&retry));
        assert_ne!(first, retry);

        let mut changed = issue();
        changed.state = "Done".to_string();
        let other = LinearSnapshotEvent::new("snap-1", "ENG", vec![changed], at(0));
        assert!(!first.same_snapshot(&other));
    }

    #[test]
    fn test_issue_priority_bounds() {
        let mut bad = issue();
        bad.priority = 7;
        assert!(LinearSnapshotEvent::new("snap-1", "ENG", vec![bad], at(0)).seal().is_err());
    }

    #[test]
    fn test_nested_issue_forbids_unknown_fields() {
        let text = r#"{
            "snapshot_id": "snap-1",
            "team_key": "ENG",
            "captured_at": "2026-08-03T14:00:00Z",
            "issues": [{
                "id": "a1b2", "identifier": "ENG-42", "title": "t", "state": "Todo",
                "updated_at": "2026-08-03T14:00:00Z", "estimate": 3
            }]
        }"#;
        assert!(decode_json::<LinearSnapshotEvent>(text).is_err());
    }

    #[test]
    fn test_pr_repository_shape() {
        assert!(pr_event().seal().is_ok());
        let mut bad = pr_event();
        bad.repository = "api".to_string();
        assert!(bad.seal().is_err());
        let mut zero = pr_event();
        zero.pr_number = 0;
        assert!(zero.seal().is_err());
    }

    #[test]
    fn test_envelope_wrap_and_open() {
        let event = pr_event().seal().unwrap();
        let envelope = EventEnvelope::wrap(&event).unwrap();
        assert_eq!(envelope.event_type, "github.pr_status");
        assert_eq!(envelope.topic, registry::topic_for("github.pr_status").unwrap());
        assert_eq!(envelope.partition_key, event.event_id);
        assert_eq!(envelope.occurred_at, at(5));

        let text = encode_json(&*envelope).unwrap();
        let received: Sealed<EventEnvelope> = decode_json(&text).unwrap();
        let opened: Sealed<GitHubPRStatusEvent> = received.open().unwrap();
        assert_eq!(opened, event);

        assert!(received.open::<GitHookEvent>().is_err());
    }

    #[test]
    fn test_envelope_rejects_misrouted_topics() {
        let event = GitHookEvent::new(GitHookKind::PrePush, "acme/api", at(2)).seal().unwrap();
        let envelope = EventEnvelope::wrap(&event).unwrap();

        assert!(envelope.amend(|e| e.topic = "somewhere.else".to_string()).is_err());
        assert!(matches!(
            envelope.amend(|e| e.event_type = "svn.hook".to_string()),
            Err(ContractError::UnknownEventType(_))
        ));
    }

    #[test]
    fn test_envelope_partition_key_must_match_payload() {
        let event = GitHookEvent::new(GitHookKind::PrePush, "acme/api", at(2)).seal().unwrap();
        let tampered = EventEnvelope::wrap(&event)
            .unwrap()
            .amend(|e| e.partition_key = "other".to_string())
            .unwrap();
        assert!(tampered.open::<GitHookEvent>().is_err());
    }
}
