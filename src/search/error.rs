//! Errors surfaced while declaring searchable fields or assembling a search.

use crate::report::{ErrorCategory, ErrorReport, Reportable};
use thiserror::Error;

const EXHAUSTION_NOTE: &str = "this bound protects against resource exhaustion";

/// Errors that can occur when configuring or running a search.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    #[error("Unknown search option(s): {}. {hint}", .unknown.join(", "))]
    UnknownOptions { unknown: Vec<String>, hint: String },

    #[error("Search parameters must be explicitly permitted before use (received keys: {})", .keys.join(", "))]
    UnpermittedParameters { keys: Vec<String> },

    #[error("Field '{field}' does not exist on '{table}'")]
    UnknownField { table: String, field: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid value for '{key}': expected {expected}, got {actual}")]
    InvalidValue {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Query too complex: {count} predicates exceeds the maximum of {max}")]
    TooManyPredicates { count: usize, max: usize },

    #[error("Query too complex: {count} OR conditions exceeds the maximum of {max}")]
    TooManyOrConditions { count: usize, max: usize },

    #[error("Invalid predicate '{key}'. Available predicates: {}", .available.join(", "))]
    InvalidPredicate { key: String, available: Vec<String> },

    #[error("Invalid order '{key}'. Available sort keys: {}", .available.join(", "))]
    InvalidOrder { key: String, available: Vec<String> },

    #[error("Unknown security policy '{policy}'. Available policies: {}", .available.join(", "))]
    UnknownSecurity { policy: String, available: Vec<String> },

    #[error("Security policy '{policy}' requires non-blank values for: {}", .missing.join(", "))]
    SecurityViolation { policy: String, missing: Vec<String> },

    #[error("Invalid page {value}: must be between 1 and {max} ({})", EXHAUSTION_NOTE)]
    InvalidPage { value: i64, max: u64 },

    #[error("Invalid per_page {value}: must be a positive integer ({})", EXHAUSTION_NOTE)]
    InvalidPerPage { value: i64 },
}

impl SearchError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        SearchError::Configuration {
            message: message.into(),
        }
    }

    /// The key or field the error is about, when there is one.
    pub fn offending_key(&self) -> Option<&str> {
        match self {
            SearchError::UnknownField { field, .. } => Some(field),
            SearchError::InvalidValue { key, .. }
            | SearchError::InvalidPredicate { key, .. }
            | SearchError::InvalidOrder { key, .. } => Some(key),
            SearchError::UnknownSecurity { policy, .. }
            | SearchError::SecurityViolation { policy, .. } => Some(policy),
            _ => None,
        }
    }
}

impl Reportable for SearchError {
    fn category(&self) -> ErrorCategory {
        match self {
            SearchError::UnknownOptions { .. }
            | SearchError::UnpermittedParameters { .. }
            | SearchError::UnknownField { .. }
            | SearchError::Configuration { .. }
            | SearchError::InvalidValue { .. } => ErrorCategory::Configuration,
            SearchError::TooManyPredicates { .. } | SearchError::TooManyOrConditions { .. } => {
                ErrorCategory::Complexity
            }
            SearchError::InvalidPredicate { .. } => ErrorCategory::InvalidPredicate,
            SearchError::InvalidOrder { .. } => ErrorCategory::InvalidOrder,
            SearchError::UnknownSecurity { .. } | SearchError::SecurityViolation { .. } => {
                ErrorCategory::InvalidSecurity
            }
            SearchError::InvalidPage { .. } | SearchError::InvalidPerPage { .. } => {
                ErrorCategory::InvalidPagination
            }
        }
    }

    fn report(&self) -> ErrorReport {
        let report = ErrorReport::new(self.category(), self.to_string());
        match self {
            SearchError::UnknownOptions { unknown, hint } => {
                report.with("unknown", unknown.clone()).with("hint", hint.as_str())
            }
            SearchError::UnpermittedParameters { keys } => report.with("keys", keys.clone()),
            SearchError::UnknownField { table, field } => report
                .with("table", table.as_str())
                .with("field", field.as_str()),
            SearchError::Configuration { .. } => report,
            SearchError::InvalidValue {
                key,
                expected,
                actual,
            } => report
                .with("key", key.as_str())
                .with("expected", expected.as_str())
                .with("actual", actual.as_str()),
            SearchError::TooManyPredicates { count, max }
            | SearchError::TooManyOrConditions { count, max } => {
                report.with("count", *count).with("limit", *max)
            }
            SearchError::InvalidPredicate { key, available }
            | SearchError::InvalidOrder { key, available } => report
                .with("key", key.as_str())
                .with("available", available.clone()),
            SearchError::UnknownSecurity { policy, available } => report
                .with("policy", policy.as_str())
                .with("available", available.clone()),
            SearchError::SecurityViolation { policy, missing } => report
                .with("policy", policy.as_str())
                .with("missing", missing.clone()),
            SearchError::InvalidPage { value, max } => report
                .with("parameter", "page")
                .with("value", *value)
                .with("limit", *max),
            SearchError::InvalidPerPage { value } => {
                report.with("parameter", "per_page").with("value", *value)
            }
        }
    }
}
