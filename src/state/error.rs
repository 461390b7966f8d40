//! Errors for declaring state machines and running transitions.

use crate::report::{ErrorCategory, ErrorReport, Reportable};
use crate::state::history::TransitionRecord;
use crate::state::state::BoxError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors that can occur when building a state machine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) before .build()")]
    MissingInitialState,

    #[error("Exactly one initial state is allowed, found: {}", .states.join(", "))]
    MultipleInitialStates { states: Vec<String> },

    #[error("No transitions defined. Add at least one transition")]
    NoTransitions,

    #[error("Transition event name must not be empty")]
    MissingEventName,

    #[error("Transition '{event}' has no source state. Call .from(states)")]
    MissingFromState { event: String },

    #[error("Transition '{event}' has no target state. Call .to(state)")]
    MissingToState { event: String },

    #[error("Transition '{event}' references undeclared state '{state}'")]
    UndeclaredState { event: String, state: String },

    #[error("Transition '{event}' is declared more than once")]
    DuplicateEvent { event: String },

    #[error("Transitions table name must not be empty")]
    MissingTableName,
}

impl Reportable for BuildError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }

    fn report(&self) -> ErrorReport {
        let report = ErrorReport::new(self.category(), self.to_string());
        match self {
            BuildError::MultipleInitialStates { states } => report.with("states", states.clone()),
            BuildError::MissingFromState { event }
            | BuildError::MissingToState { event }
            | BuildError::DuplicateEvent { event } => report.with("event", event.as_str()),
            BuildError::UndeclaredState { event, state } => report
                .with("event", event.as_str())
                .with("state", state.as_str()),
            BuildError::MissingInitialState
            | BuildError::NoTransitions
            | BuildError::MissingEventName
            | BuildError::MissingTableName => report,
        }
    }
}

/// A structured error recorded by a transition validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Whether a missing guard target was a method or a status predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    Predicate,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKind::Method => f.write_str("method"),
            MemberKind::Predicate => f.write_str("predicate"),
        }
    }
}

/// Errors that can occur when attempting a transition.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Unknown event '{event}'. Available events: {}", .available.join(", "))]
    UnknownEvent { event: String, available: Vec<String> },

    #[error("Cannot transition from '{from}' to '{to}' via '{event}'")]
    InvalidTransition {
        event: String,
        from: String,
        to: String,
    },

    #[error("Check failed for '{event}' ({from} -> {to}): {guard} returned false")]
    CheckFailed {
        event: String,
        from: String,
        to: String,
        guard: String,
    },

    #[error("Guard for '{event}' raised: {source}")]
    GuardRaised {
        event: String,
        #[source]
        source: BoxError,
    },

    #[error("Guard for '{event}' references undefined {kind} '{name}'")]
    MissingMember {
        event: String,
        kind: MemberKind,
        name: String,
    },

    #[error("Validation failed for '{event}': {}", join_errors(.errors))]
    ValidationFailed {
        event: String,
        errors: Vec<FieldError>,
    },

    #[error("Before callback for '{event}' failed: {source}")]
    BeforeCallback {
        event: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to persist '{event}' transition: {source}")]
    Persistence {
        event: String,
        #[source]
        source: BoxError,
    },

    /// The transition is committed; only a side effect failed.
    #[error("After callback for '{}' failed: {source}", .record.event)]
    AfterCallback {
        record: Box<TransitionRecord>,
        #[source]
        source: BoxError,
    },
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl TransitionError {
    pub fn event(&self) -> &str {
        match self {
            TransitionError::UnknownEvent { event, .. }
            | TransitionError::InvalidTransition { event, .. }
            | TransitionError::CheckFailed { event, .. }
            | TransitionError::GuardRaised { event, .. }
            | TransitionError::MissingMember { event, .. }
            | TransitionError::ValidationFailed { event, .. }
            | TransitionError::BeforeCallback { event, .. }
            | TransitionError::Persistence { event, .. } => event,
            TransitionError::AfterCallback { record, .. } => &record.event,
        }
    }

    /// True when the state change was committed despite the error.
    pub fn is_committed(&self) -> bool {
        matches!(self, TransitionError::AfterCallback { .. })
    }
}

impl Reportable for TransitionError {
    fn category(&self) -> ErrorCategory {
        match self {
            TransitionError::UnknownEvent { .. } | TransitionError::InvalidTransition { .. } => {
                ErrorCategory::InvalidTransition
            }
            TransitionError::CheckFailed { .. } | TransitionError::GuardRaised { .. } => {
                ErrorCategory::CheckFailed
            }
            TransitionError::MissingMember { .. } => ErrorCategory::MissingMethod,
            TransitionError::ValidationFailed { .. } => ErrorCategory::ValidationFailed,
            TransitionError::BeforeCallback { .. } | TransitionError::AfterCallback { .. } => {
                ErrorCategory::Callback
            }
            TransitionError::Persistence { .. } => ErrorCategory::Persistence,
        }
    }

    fn report(&self) -> ErrorReport {
        let report =
            ErrorReport::new(self.category(), self.to_string()).with("event", self.event());
        match self {
            TransitionError::UnknownEvent { available, .. } => {
                report.with("available", available.clone())
            }
            TransitionError::InvalidTransition { from, to, .. } => report
                .with("from", from.as_str())
                .with("to", to.as_str()),
            TransitionError::CheckFailed { from, to, guard, .. } => report
                .with("from", from.as_str())
                .with("to", to.as_str())
                .with("guard", guard.as_str()),
            TransitionError::MissingMember { kind, name, .. } => report
                .with("kind", kind.to_string())
                .with("name", name.as_str()),
            TransitionError::ValidationFailed { errors, .. } => report.with(
                "errors",
                serde_json::to_value(errors).unwrap_or(serde_json::Value::Null),
            ),
            TransitionError::AfterCallback { record, .. } => report
                .with("from", record.from_state.as_str())
                .with("to", record.to_state.as_str())
                .with("committed", true),
            TransitionError::GuardRaised { .. }
            | TransitionError::BeforeCallback { .. }
            | TransitionError::Persistence { .. } => report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_states_and_event() {
        let err = TransitionError::InvalidTransition {
            event: "publish".into(),
            from: "published".into(),
            to: "published".into(),
        };
        let message = err.to_string();
        assert!(message.contains("publish"));
        assert!(message.contains("'published'"));
        assert_eq!(err.category(), ErrorCategory::InvalidTransition);
        assert_eq!(err.report().get("from").unwrap(), "published");
    }

    #[test]
    fn validation_errors_are_listed() {
        let err = TransitionError::ValidationFailed {
            event: "publish".into(),
            errors: vec![
                FieldError::new("title", "can't be blank"),
                FieldError::new("body", "is too short"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Validation failed for 'publish': title can't be blank, body is too short"
        );
        assert_eq!(err.report().get("errors").unwrap()[1]["field"], "body");
    }

    #[test]
    fn guard_errors_keep_their_source() {
        let source: BoxError = "database unavailable".into();
        let err = TransitionError::GuardRaised {
            event: "publish".into(),
            source,
        };
        let inner = std::error::Error::source(&err).unwrap();
        assert_eq!(inner.to_string(), "database unavailable");
    }

    #[test]
    fn build_errors_are_configuration_errors() {
        let err = BuildError::UndeclaredState {
            event: "archive".into(),
            state: "archived".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.report().get("state").unwrap(), "archived");
    }
}
