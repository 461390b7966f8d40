//! Predicate compiler: one `(key, value)` pair to one condition, or a skip.

use crate::search::registry::FieldRegistry;
use crate::search::request::PredicateMap;
use crate::search::SearchError;
use crate::store::Condition;
use crate::value::Value;
use chrono::{DateTime, Utc};

/// Compiles predicates against a registry at a fixed point in time.
pub struct PredicateCompiler<'a> {
    registry: &'a FieldRegistry,
    now: DateTime<Utc>,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(registry: &'a FieldRegistry, now: DateTime<Utc>) -> Self {
        Self { registry, now }
    }

    /// Compile one predicate.
    ///
    /// Blank values (nil, empty text, empty collections) yield `Ok(None)`
    /// unless the operator is a flag operator. `false` is never blank.
    pub fn compile(&self, key: &str, value: &Value) -> Result<Option<Condition>, SearchError> {
        let entry = self.registry.predicate(key);
        let is_flag = entry.is_some_and(|e| e.is_flag());
        if value.is_blank() && !is_flag {
            return Ok(None);
        }

        let entry = entry.ok_or_else(|| SearchError::InvalidPredicate {
            key: key.to_string(),
            available: self.registry.predicate_keys(),
        })?;
        entry.produce(value, self.now).map(Some)
    }

    /// Compile every predicate in a map into one conjunction.
    /// `Ok(None)` when every predicate was skipped.
    pub fn compile_all(&self, predicates: &PredicateMap) -> Result<Option<Condition>, SearchError> {
        let mut conditions = Vec::new();
        for (key, value) in predicates {
            if let Some(condition) = self.compile(key, value)? {
                conditions.push(condition);
            }
        }
        Ok(Condition::all(conditions))
    }
}
