//! Column introspection consumed from the record store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic type of a column, which decides the operators it supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Temporal,
    Array,
    Document,
}

impl SemanticType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Temporal => "temporal",
            Self::Array => "array",
            Self::Document => "document",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }
}

/// Column existence and type lookup for one record type.
pub trait RecordSchema: Send + Sync {
    fn table_name(&self) -> &str;

    fn column_type(&self, column: &str) -> Option<SemanticType>;

    fn column_names(&self) -> Vec<String>;

    fn has_column(&self, column: &str) -> bool {
        self.column_type(column).is_some()
    }
}

/// Static schema description, for stores without live introspection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    table: String,
    columns: BTreeMap<String, SemanticType>,
}

impl TableSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: BTreeMap::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, semantic_type: SemanticType) -> Self {
        self.columns.insert(name.into(), semantic_type);
        self
    }
}

impl RecordSchema for TableSchema {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn column_type(&self, column: &str) -> Option<SemanticType> {
        self.columns.get(column).copied()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }
}
