//! Work authorization decisions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ContractError, Result};
use crate::ids::AuthReasonCode;
use crate::schema::{default_schema_version, require_non_empty, Contract, ExtraFields, ExtraPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthDecision {
    Allow,
    Deny,
    Escalate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkAuthorization {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub work_item_id: String,
    pub decision: AuthDecision,
    pub reason_code: AuthReasonCode,
    #[serde(default)]
    pub rationale: Option<String>,
    /// Policy or principal that made the decision
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    /// Must be later than `decided_at`
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl WorkAuthorization {
    pub fn new(
        work_item_id: impl Into<String>,
        decision: AuthDecision,
        reason_code: AuthReasonCode,
        decided_by: impl Into<String>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: default_schema_version(),
            work_item_id: work_item_id.into(),
            decision,
            reason_code,
            rationale: None,
            decided_by: decided_by.into(),
            decided_at,
            expires_at: None,
            extra: ExtraFields::new(),
        }
    }

    /// Allowed and not expired at `now`
    pub fn permits_at(&self, now: DateTime<Utc>) -> bool {
        self.decision == AuthDecision::Allow && self.expires_at.map_or(true, |exp| now < exp)
    }
}

impl Contract for WorkAuthorization {
    const NAME: &'static str = "WorkAuthorization";
    const POLICY: ExtraPolicy = ExtraPolicy::Allow;
    const FIELDS: &'static [&'static str] = &[
        "schema_version",
        "work_item_id",
        "decision",
        "reason_code",
        "rationale",
        "decided_by",
        "decided_at",
        "expires_at",
    ];

    fn schema_version(&self) -> &str {
        &self.schema_version
    }

    fn extra_fields(&self) -> Option<&ExtraFields> {
        Some(&self.extra)
    }

    fn validate(&self) -> Result<()> {
        require_non_empty(Self::NAME, "work_item_id", &self.work_item_id)?;
        require_non_empty(Self::NAME, "decided_by", &self.decided_by)?;

        let allows = self.decision == AuthDecision::Allow;
        if allows != self.reason_code.permits() {
            return Err(ContractError::validation(
                Self::NAME,
                format!(
                    "reason_code {} does not fit a {:?} decision",
                    self.reason_code.as_str(),
                    self.decision
                ),
            ));
        }

        if let Some(expires_at) = self.expires_at {
            if expires_at <= self.decided_at {
                return Err(ContractError::validation(Self::NAME, "expires_at must be after decided_at"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_json, encode_json};
    use crate::schema::Sealed;
    use chrono::{Duration, TimeZone};

    fn decided_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 14, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_reason_must_match_decision() {
        let ok = WorkAuthorization::new(
            "ENG-7",
            AuthDecision::Allow,
            AuthReasonCode::PolicySatisfied,
            "policy:default",
            decided_at(),
        );
        assert!(ok.seal().is_ok());

        let mismatched = WorkAuthorization::new(
            "ENG-7",
            AuthDecision::Allow,
            AuthReasonCode::BudgetExceeded,
            "policy:default",
            decided_at(),
        );
        assert!(mismatched.seal().is_err());

        let escalated = WorkAuthorization::new(
            "ENG-7",
            AuthDecision::Escalate,
            AuthReasonCode::RiskThresholdExceeded,
            "policy:risk",
            decided_at(),
        );
        assert!(escalated.seal().is_ok());
    }

    #[test]
    fn test_expiry() {
        let mut auth = WorkAuthorization::new(
            "ENG-7",
            AuthDecision::Allow,
            AuthReasonCode::PreApproved,
            "alice",
            decided_at(),
        );
        auth.expires_at = Some(decided_at());
        assert!(auth.clone().seal().is_err());

        auth.expires_at = Some(decided_at() + Duration::hours(1));
        let sealed = auth.seal().unwrap();
        assert!(sealed.permits_at(decided_at() + Duration::minutes(30)));
        assert!(!sealed.permits_at(decided_at() + Duration::hours(2)));
    }

    #[test]
    fn test_unknown_reason_code_rejected() {
        let text = r#"{"work_item_id":"ENG-7","decision":"deny","reason_code":"because","decided_by":"x","decided_at":"2026-07-14T08:00:00Z"}"#;
        assert!(decode_json::<WorkAuthorization>(text).is_err());
    }

    #[test]
    fn test_round_trip() {
        let auth = WorkAuthorization::new(
            "ENG-7",
            AuthDecision::Deny,
            AuthReasonCode::ScopeViolation,
            "policy:scope",
            decided_at(),
        )
        .seal()
        .unwrap();
        let text = encode_json(&*auth).unwrap();
        assert!(text.contains(r#""reason_code":"scope_violation""#));
        let back: Sealed<WorkAuthorization> = decode_json(&text).unwrap();
        assert_eq!(back, auth);
    }
}
