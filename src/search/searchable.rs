//! Frozen search definition for one record type and its builder.

use crate::search::config::SearchConfig;
use crate::search::field::Operator;
use crate::search::predicate::PredicateCompiler;
use crate::search::registry::FieldRegistry;
use crate::search::security::SecurityPolicy;
use crate::search::SearchError;
use crate::store::{Condition, RecordSchema};
use crate::value::Value;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Declared predicates, sort keys, policies and limits for a record type.
///
/// Built once through [`SearchableBuilder`] and immutable afterwards, so it
/// can be shared across threads without locking.
#[derive(Debug)]
pub struct Searchable {
    pub(crate) registry: FieldRegistry,
    pub(crate) policies: BTreeMap<String, SecurityPolicy>,
    pub(crate) default_order: Vec<String>,
    pub(crate) config: SearchConfig,
}

impl Searchable {
    pub fn builder(schema: Arc<dyn RecordSchema>) -> SearchableBuilder {
        SearchableBuilder {
            registry: FieldRegistry::new(schema),
            policies: BTreeMap::new(),
            default_order: Vec::new(),
            config: SearchConfig::default(),
        }
    }

    pub fn table(&self) -> &str {
        self.registry.table()
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn declared_fields(&self) -> Vec<&str> {
        self.registry.declared_fields()
    }

    pub fn operators_for(&self, field: &str) -> Option<&'static [Operator]> {
        self.registry.operators_for(field)
    }

    pub fn is_predicate_key(&self, key: &str) -> bool {
        self.registry.is_declared_predicate_key(key)
    }

    pub fn is_sort_key(&self, key: &str) -> bool {
        self.registry.is_sort_key(key)
    }

    pub fn predicate_keys(&self) -> Vec<String> {
        self.registry.predicate_keys()
    }

    pub fn sort_keys(&self) -> Vec<String> {
        self.registry.sort_keys()
    }

    pub fn security_policies(&self) -> Vec<&str> {
        self.policies.keys().map(String::as_str).collect()
    }

    pub fn default_order(&self) -> &[String] {
        &self.default_order
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Compile a single predicate against the current time.
    pub fn compile(&self, key: &str, value: &Value) -> Result<Option<Condition>, SearchError> {
        PredicateCompiler::new(&self.registry, Utc::now()).compile(key, value)
    }
}

/// Accumulates declarations; `build` validates them and freezes the result.
pub struct SearchableBuilder {
    registry: FieldRegistry,
    policies: BTreeMap<String, SecurityPolicy>,
    default_order: Vec<String>,
    config: SearchConfig,
}

impl SearchableBuilder {
    /// Declare filterable fields.
    pub fn predicates<I, T>(mut self, fields: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for field in fields {
            self.registry.declare(field.as_ref())?;
        }
        Ok(self)
    }

    /// Declare sortable fields.
    pub fn sort<I, T>(mut self, fields: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for field in fields {
            self.registry.declare_sortable(field.as_ref())?;
        }
        Ok(self)
    }

    pub fn composite<F>(mut self, name: &str, builder: F) -> Result<Self, SearchError>
    where
        F: Fn(&Value) -> Result<Condition, SearchError> + Send + Sync + 'static,
    {
        self.registry.register_composite(name, builder)?;
        Ok(self)
    }

    pub fn security<I, T>(mut self, name: &str, required: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        if self.policies.contains_key(name) {
            return Err(SearchError::configuration(format!(
                "security policy '{name}' is already defined"
            )));
        }
        let policy = SecurityPolicy::new(name, required)?;
        self.policies.insert(name.to_string(), policy);
        Ok(self)
    }

    pub fn default_order<I, T>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.default_order = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Searchable, SearchError> {
        self.config.validate()?;

        for policy in self.policies.values() {
            let undeclared: Vec<&str> = policy
                .required()
                .iter()
                .map(String::as_str)
                .filter(|key| !self.registry.is_declared_predicate_key(key))
                .collect();
            if !undeclared.is_empty() {
                return Err(SearchError::configuration(format!(
                    "security policy '{}' requires undeclared predicates: {}",
                    policy.name(),
                    undeclared.join(", ")
                )));
            }
        }

        if let Some(key) = self
            .default_order
            .iter()
            .find(|key| !self.registry.is_sort_key(key))
        {
            return Err(SearchError::InvalidOrder {
                key: key.clone(),
                available: self.registry.sort_keys(),
            });
        }

        Ok(Searchable {
            registry: self.registry,
            policies: self.policies,
            default_order: self.default_order,
            config: self.config,
        })
    }
}
