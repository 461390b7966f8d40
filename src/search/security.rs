//! Named required-predicate policies.

use crate::search::request::PredicateMap;
use crate::search::SearchError;
use crate::value::Presence;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// A policy requiring certain predicate keys to carry a real value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityPolicy {
    name: String,
    required: Vec<String>,
}

impl SecurityPolicy {
    pub fn new<I, T>(name: impl Into<String>, required: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let name = name.into();
        let required: Vec<String> = required.into_iter().map(Into::into).collect();
        if name.trim().is_empty() {
            return Err(SearchError::configuration("security policy requires a name"));
        }
        if required.is_empty() {
            return Err(SearchError::configuration(format!(
                "security policy '{name}' must require at least one predicate"
            )));
        }
        Ok(Self { name, required })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    fn require(&self, key: &str, predicates: &PredicateMap) -> Validation<(), NonEmptyVec<String>> {
        match predicates.get(key).map(|v| v.presence()) {
            Some(Presence::Value(_)) | Some(Presence::False) => Validation::success(()),
            Some(Presence::Absent) | None => Validation::fail(key.to_string()),
        }
    }

    /// Check every required key against the top-level predicates.
    /// All missing keys are reported together.
    pub fn check(&self, predicates: &PredicateMap) -> Result<(), SearchError> {
        let checks: Vec<_> = self
            .required
            .iter()
            .map(|key| self.require(key, predicates))
            .collect();

        match Validation::all_vec(checks) {
            Validation::Success(_) => Ok(()),
            Validation::Failure(missing) => Err(SearchError::SecurityViolation {
                policy: self.name.clone(),
                missing: missing.into_vec(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn predicates(pairs: &[(&str, Value)]) -> PredicateMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn every_missing_key_is_reported() {
        let policy = SecurityPolicy::new("tenant_scope", ["tenant_id_eq", "status_eq"]).unwrap();

        let err = policy.check(&predicates(&[])).unwrap_err();
        assert_eq!(
            err,
            SearchError::SecurityViolation {
                policy: "tenant_scope".into(),
                missing: vec!["tenant_id_eq".into(), "status_eq".into()],
            }
        );

        let err = policy
            .check(&predicates(&[("tenant_id_eq", Value::Int(4)), ("status_eq", Value::from(""))]))
            .unwrap_err();
        assert_eq!(
            err,
            SearchError::SecurityViolation {
                policy: "tenant_scope".into(),
                missing: vec!["status_eq".into()],
            }
        );
    }

    #[test]
    fn false_satisfies_a_requirement() {
        let policy = SecurityPolicy::new("visible_only", ["archived_eq"]).unwrap();
        assert!(policy
            .check(&predicates(&[("archived_eq", Value::Bool(false))]))
            .is_ok());
    }

    #[test]
    fn empty_policies_are_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            SecurityPolicy::new("nothing", empty),
            Err(SearchError::Configuration { .. })
        ));
    }
}
