//! Structured error metadata for telemetry integrations.
//!
//! Every error surfaced by this crate carries a machine-readable category
//! and a context map of the offending identifiers, so hosts never need to
//! parse error messages.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Machine-readable error category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Complexity,
    InvalidPredicate,
    InvalidOrder,
    InvalidSecurity,
    InvalidPagination,
    InvalidTransition,
    CheckFailed,
    ValidationFailed,
    MissingMethod,
    Callback,
    Persistence,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Complexity => "complexity",
            Self::InvalidPredicate => "invalid_predicate",
            Self::InvalidOrder => "invalid_order",
            Self::InvalidSecurity => "invalid_security",
            Self::InvalidPagination => "invalid_pagination",
            Self::InvalidTransition => "invalid_transition",
            Self::CheckFailed => "check_failed",
            Self::ValidationFailed => "validation_failed",
            Self::MissingMethod => "missing_method",
            Self::Callback => "callback",
            Self::Persistence => "persistence",
        }
    }
}

/// Serializable snapshot of an error for observability pipelines.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorReport {
    pub category: ErrorCategory,
    pub message: String,
    pub context: BTreeMap<String, JsonValue>,
}

impl ErrorReport {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    /// Attach a context entry, returning the report.
    pub fn with(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Look up a context entry.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.context.get(key)
    }
}

/// Errors that can describe themselves as an [`ErrorReport`].
pub trait Reportable: std::error::Error {
    fn category(&self) -> ErrorCategory;

    fn report(&self) -> ErrorReport;
}
