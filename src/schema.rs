//! Contract traits and the sealed (frozen) instance wrapper

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ContractError, Result};
use crate::version::{SchemaVersion, DEFAULT_SCHEMA_VERSION};

/// Unknown fields retained by an `allow`-policy contract, keyed by name
pub type ExtraFields = BTreeMap<String, serde_json::Value>;

/// What a contract does with fields it does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPolicy {
    /// Reject undeclared fields; used for machine-to-machine contracts
    Forbid,
    /// Keep undeclared fields in an extra bag; used for contracts expected to evolve
    Allow,
}

impl fmt::Display for ExtraPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraPolicy::Forbid => f.write_str("forbid"),
            ExtraPolicy::Allow => f.write_str("allow"),
        }
    }
}

/// An extra bag found somewhere in a contract instance, with the fields the
/// record holding it declares
#[derive(Debug, Clone, Copy)]
pub struct ExtraBag<'a> {
    pub record: &'static str,
    pub declared: &'static [&'static str],
    pub extra: &'a ExtraFields,
}

impl<'a> ExtraBag<'a> {
    pub fn new(record: &'static str, declared: &'static [&'static str], extra: &'a ExtraFields) -> Self {
        Self { record, declared, extra }
    }

    /// First retained key that collides with a declared field
    pub fn shadowed(&self) -> Option<&'a str> {
        let declared = self.declared;
        self.extra
            .keys()
            .map(String::as_str)
            .find(|key| declared.contains(key))
    }
}

/// A versioned wire contract.
///
/// Implementors are plain serde structs. `FIELDS` lists every declared
/// top-level key (including `schema_version`) so the codec can tell declared
/// keys from unknown ones before typed decoding.
pub trait Contract: Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug {
    const NAME: &'static str;
    const POLICY: ExtraPolicy;
    const FIELDS: &'static [&'static str];

    fn schema_version(&self) -> &str;

    /// Retained unknown fields; `None` for `forbid` contracts
    fn extra_fields(&self) -> Option<&ExtraFields> {
        None
    }

    /// This record's extra bag followed by those of nested records.
    ///
    /// Contracts that embed `allow` records override this to include them.
    fn extra_bags(&self) -> Vec<ExtraBag<'_>> {
        self.extra_fields()
            .map(|extra| ExtraBag::new(Self::NAME, Self::FIELDS, extra))
            .into_iter()
            .collect()
    }

    /// Bounds and cross-field rules beyond what the type system enforces
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Validate and freeze
    fn seal(self) -> Result<Sealed<Self>> {
        Sealed::new(self)
    }

    fn declares(field: &str) -> bool {
        Self::FIELDS.contains(&field)
    }
}

/// A validated contract instance that can no longer change.
///
/// Only shared access is exposed, so field assignment does not compile:
///
/// ```compile_fail
/// use pipeline_contracts::contracts::checks::{Verdict, VerdictStatus};
/// use pipeline_contracts::Contract;
///
/// let verdict = Verdict::new(VerdictStatus::Pass).seal().unwrap();
/// verdict.status = VerdictStatus::Fail;
/// ```
///
/// Updates go through [`Sealed::amend`] or [`Sealed::with_field`], which
/// build a new instance and leave the original as it was.
#[derive(Debug, Clone, PartialEq)]
pub struct Sealed<T: Contract>(T);

impl<T: Contract> Sealed<T> {
    /// Check the schema version and contract rules, then freeze.
    ///
    /// Extra bags may not carry declared names; encoding would let the extra
    /// value overwrite the typed field.
    pub fn new(value: T) -> Result<Self> {
        SchemaVersion::parse(value.schema_version())?;
        for bag in value.extra_bags() {
            if let Some(key) = bag.shadowed() {
                return Err(ContractError::validation(
                    bag.record,
                    format!("extra field {:?} shadows a declared field", key),
                ));
            }
        }
        value.validate()?;
        Ok(Self(value))
    }

    /// Copy the value, let `f` edit the copy, and seal the result.
    pub fn amend(&self, f: impl FnOnce(&mut T)) -> Result<Self> {
        let mut draft = self.0.clone();
        f(&mut draft);
        Self::new(draft)
    }

    /// Build a new instance with one top-level field replaced.
    ///
    /// Undeclared names are rejected for `forbid` contracts and land in the
    /// extra bag for `allow` contracts.
    pub fn with_field(&self, field: &str, value: serde_json::Value) -> Result<Self> {
        if !T::declares(field) && T::POLICY == ExtraPolicy::Forbid {
            return Err(ContractError::UnknownField {
                contract: T::NAME,
                field: field.to_string(),
            });
        }

        let mut object = match serde_json::to_value(&self.0)? {
            serde_json::Value::Object(object) => object,
            _ => {
                return Err(ContractError::validation(
                    T::NAME,
                    "contract does not serialize to an object",
                ))
            }
        };
        object.insert(field.to_string(), value);

        let draft: T = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| ContractError::validation(T::NAME, e.to_string()))?;
        Self::new(draft)
    }

    pub fn as_inner(&self) -> &T {
        &self.0
    }

    /// Give up the seal; the returned value must be sealed again to travel.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Contract> Deref for Sealed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Contract> AsRef<T> for Sealed<T> {
    fn as_ref(&self) -> &T {
        &self.0
    }
}

impl<T: Contract> Serialize for Sealed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Contract> Deserialize<'de> for Sealed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = T::deserialize(deserializer)?;
        Sealed::new(value).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

pub(crate) fn require_non_empty(contract: &'static str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ContractError::validation(
            contract,
            format!("{} must not be empty", field),
        ));
    }
    Ok(())
}

pub(crate) fn require_unit_interval(contract: &'static str, field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ContractError::validation(
            contract,
            format!("{} must be within [0.0, 1.0], got {}", field, value),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Probe {
        #[serde(default = "default_schema_version")]
        schema_version: String,
        level: u8,
    }

    impl Contract for Probe {
        const NAME: &'static str = "Probe";
        const POLICY: ExtraPolicy = ExtraPolicy::Forbid;
        const FIELDS: &'static [&'static str] = &["schema_version", "level"];

        fn schema_version(&self) -> &str {
            &self.schema_version
        }

        fn validate(&self) -> Result<()> {
            if self.level > 3 {
                return Err(ContractError::validation(Self::NAME, "level must be <= 3"));
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Loose {
        #[serde(default = "default_schema_version")]
        schema_version: String,
        level: u8,
        #[serde(flatten)]
        extra: ExtraFields,
    }

    impl Contract for Loose {
        const NAME: &'static str = "Loose";
        const POLICY: ExtraPolicy = ExtraPolicy::Allow;
        const FIELDS: &'static [&'static str] = &["schema_version", "level"];

        fn schema_version(&self) -> &str {
            &self.schema_version
        }

        fn extra_fields(&self) -> Option<&ExtraFields> {
            Some(&self.extra)
        }
    }

    fn loose(level: u8) -> Loose {
        Loose {
            schema_version: default_schema_version(),
            level,
            extra: ExtraFields::new(),
        }
    }

    fn probe(level: u8) -> Probe {
        Probe {
            schema_version: default_schema_version(),
            level,
        }
    }

    #[test]
    fn test_seal_runs_validation() {
        assert!(probe(3).seal().is_ok());
        assert!(matches!(
            probe(4).seal(),
            Err(ContractError::Validation { contract: "Probe", .. })
        ));
    }

    #[test]
    fn test_seal_rejects_bad_version() {
        let mut p = probe(1);
        p.schema_version = "one".to_string();
        assert!(matches!(p.seal(), Err(ContractError::InvalidVersion { .. })));
    }

    #[test]
    fn test_amend_leaves_original_untouched() {
        let sealed = probe(1).seal().unwrap();
        let bumped = sealed.amend(|p| p.level = 2).unwrap();
        assert_eq!(sealed.level, 1);
        assert_eq!(bumped.level, 2);

        assert!(sealed.amend(|p| p.level = 9).is_err());
        assert_eq!(sealed.level, 1);
    }

    #[test]
    fn test_with_field_forbid_policy() {
        let sealed = probe(1).seal().unwrap();
        assert_eq!(sealed.with_field("level", json!(3)).unwrap().level, 3);
        assert!(matches!(
            sealed.with_field("colour", json!("red")),
            Err(ContractError::UnknownField { .. })
        ));
        assert!(sealed.with_field("level", json!("high")).is_err());
    }

    #[test]
    fn test_seal_rejects_extras_shadowing_declared_fields() {
        let mut value = loose(1);
        value.extra.insert("level".to_string(), json!(3));
        assert!(matches!(
            value.seal(),
            Err(ContractError::Validation { contract: "Loose", .. })
        ));

        let mut value = loose(1);
        value.extra.insert("colour".to_string(), json!("red"));
        let sealed = value.seal().unwrap();
        assert!(sealed.amend(|v| {
            v.extra.insert("schema_version".to_string(), json!("9.0"));
        })
        .is_err());
    }

    #[test]
    fn test_with_field_allow_policy() {
        let sealed = loose(1).seal().unwrap();
        let updated = sealed.with_field("level", json!(2)).unwrap();
        assert_eq!(updated.level, 2);
        assert!(updated.extra.is_empty());

        let tagged = sealed.with_field("colour", json!("red")).unwrap();
        assert_eq!(tagged.extra["colour"], json!("red"));
        assert_eq!(tagged.extra_bags().len(), 1);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Sealed<Probe> = serde_json::from_value(json!({"level": 2})).unwrap();
        assert_eq!(ok.schema_version, "1.0");
        assert!(serde_json::from_value::<Sealed<Probe>>(json!({"level": 5})).is_err());
    }

    #[test]
    fn test_require_unit_interval() {
        assert!(require_unit_interval("X", "c", 0.0).is_ok());
        assert!(require_unit_interval("X", "c", 1.0).is_ok());
        assert!(require_unit_interval("X", "c", -0.01).is_err());
        assert!(require_unit_interval("X", "c", f64::NAN).is_err());
    }
}
