//! Per-record-type registry of filterable and sortable fields.
//!
//! Declaring a field expands it into one predicate entry per operator its
//! semantic type supports. Entries live in a lookup table keyed by the full
//! `field_operator` key, so field names containing underscores resolve
//! without guessing where the operator suffix begins.

use crate::search::field::{FieldDescriptor, Operator};
use crate::search::SearchError;
use crate::store::{Condition, NullsOrder, Order, RecordSchema, SemanticType};
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Produces the condition for one predicate key given the caller's value.
pub type ConditionProducer =
    Arc<dyn Fn(&Value, DateTime<Utc>) -> Result<Condition, SearchError> + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
pub enum PredicateKind {
    Field { field: String, operator: Operator },
    Composite,
}

/// One callable predicate in the registry.
#[derive(Clone)]
pub struct PredicateEntry {
    key: String,
    kind: PredicateKind,
    producer: ConditionProducer,
}

impl PredicateEntry {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &PredicateKind {
        &self.kind
    }

    pub fn operator(&self) -> Option<Operator> {
        match &self.kind {
            PredicateKind::Field { operator, .. } => Some(*operator),
            PredicateKind::Composite => None,
        }
    }

    pub fn is_flag(&self) -> bool {
        self.operator().is_some_and(|op| op.is_flag())
    }

    pub fn produce(&self, value: &Value, now: DateTime<Utc>) -> Result<Condition, SearchError> {
        (self.producer)(value, now)
    }
}

impl fmt::Debug for PredicateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateEntry")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Declared fields, predicates and sort keys for one record type.
pub struct FieldRegistry {
    schema: Arc<dyn RecordSchema>,
    fields: BTreeMap<String, FieldDescriptor>,
    predicates: BTreeMap<String, PredicateEntry>,
    sortable: BTreeMap<String, SemanticType>,
    sort_keys: BTreeMap<String, Order>,
}

impl FieldRegistry {
    pub fn new(schema: Arc<dyn RecordSchema>) -> Self {
        Self {
            schema,
            fields: BTreeMap::new(),
            predicates: BTreeMap::new(),
            sortable: BTreeMap::new(),
            sort_keys: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &str {
        self.schema.table_name()
    }

    fn column_type(&self, field: &str) -> Result<SemanticType, SearchError> {
        self.schema
            .column_type(field)
            .ok_or_else(|| SearchError::UnknownField {
                table: self.table().to_string(),
                field: field.to_string(),
            })
    }

    /// Declare a filterable field. Declaring the same field twice is a no-op.
    pub fn declare(&mut self, field: &str) -> Result<&FieldDescriptor, SearchError> {
        let semantic_type = self.column_type(field)?;
        if !self.fields.contains_key(field) {
            let descriptor = FieldDescriptor::new(field, semantic_type);
            let mut entries = Vec::new();
            for (key, operator) in descriptor.predicate_keys() {
                if self.predicates.contains_key(&key) {
                    return Err(SearchError::configuration(format!(
                        "predicate '{key}' generated for field '{field}' is already registered"
                    )));
                }
                entries.push(field_entry(key, field, semantic_type, operator));
            }
            self.predicates
                .extend(entries.into_iter().map(|e| (e.key.clone(), e)));
            self.fields.insert(field.to_string(), descriptor);
        }
        Ok(&self.fields[field])
    }

    /// Declare a sortable field and generate its sort keys.
    pub fn declare_sortable(&mut self, field: &str) -> Result<(), SearchError> {
        let semantic_type = self.column_type(field)?;
        self.sortable.insert(field.to_string(), semantic_type);

        let mut keys = vec![
            (format!("{field}_asc"), Order::asc(field)),
            (format!("{field}_desc"), Order::desc(field)),
        ];
        if semantic_type == SemanticType::Text {
            keys.push((format!("{field}_asc_i"), Order::asc(field).case_insensitive()));
            keys.push((format!("{field}_desc_i"), Order::desc(field).case_insensitive()));
        }
        if semantic_type.is_numeric() || semantic_type == SemanticType::Temporal {
            for (suffix, nulls) in [("first", NullsOrder::First), ("last", NullsOrder::Last)] {
                keys.push((
                    format!("{field}_asc_nulls_{suffix}"),
                    Order::asc(field).nulls(nulls),
                ));
                keys.push((
                    format!("{field}_desc_nulls_{suffix}"),
                    Order::desc(field).nulls(nulls),
                ));
            }
        }
        self.sort_keys.extend(keys);
        Ok(())
    }

    /// Attach a named, caller-built condition as a first-class predicate.
    pub fn register_composite<F>(&mut self, name: &str, builder: F) -> Result<(), SearchError>
    where
        F: Fn(&Value) -> Result<Condition, SearchError> + Send + Sync + 'static,
    {
        if name.trim().is_empty() {
            return Err(SearchError::configuration(
                "composite predicate requires a name",
            ));
        }
        if self.predicates.contains_key(name) {
            return Err(SearchError::configuration(format!(
                "predicate '{name}' is already registered"
            )));
        }
        self.predicates.insert(
            name.to_string(),
            PredicateEntry {
                key: name.to_string(),
                kind: PredicateKind::Composite,
                producer: Arc::new(move |value, _now| builder(value)),
            },
        );
        Ok(())
    }

    pub fn is_declared(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields.get(field)
    }

    pub fn declared_fields(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn operators_for(&self, field: &str) -> Option<&'static [Operator]> {
        self.fields.get(field).map(FieldDescriptor::operators)
    }

    pub fn is_declared_predicate_key(&self, key: &str) -> bool {
        self.predicates.contains_key(key)
    }

    pub fn predicate(&self, key: &str) -> Option<&PredicateEntry> {
        self.predicates.get(key)
    }

    pub fn predicate_keys(&self) -> Vec<String> {
        self.predicates.keys().cloned().collect()
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable.contains_key(field)
    }

    pub fn is_sort_key(&self, key: &str) -> bool {
        self.sort_keys.contains_key(key)
    }

    pub fn sort_order(&self, key: &str) -> Option<&Order> {
        self.sort_keys.get(key)
    }

    pub fn sort_keys(&self) -> Vec<String> {
        self.sort_keys.keys().cloned().collect()
    }
}

impl fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("table", &self.table())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("sortable", &self.sortable.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn field_entry(
    key: String,
    field: &str,
    semantic_type: SemanticType,
    operator: Operator,
) -> PredicateEntry {
    let field = field.to_string();
    let error_key = key.clone();
    PredicateEntry {
        key,
        kind: PredicateKind::Field {
            field: field.clone(),
            operator,
        },
        producer: Arc::new(move |value, now| {
            operator
                .condition(&field, semantic_type, value, now)
                .map_err(|mismatch| SearchError::InvalidValue {
                    key: error_key.clone(),
                    expected: mismatch.expected,
                    actual: mismatch.actual,
                })
        }),
    }
}
