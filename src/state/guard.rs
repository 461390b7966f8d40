//! Transition guards.
//!
//! A guard is one of three variants: an inline block evaluated against the
//! record, the name of a guard method the record exposes, or the name of a
//! boolean status predicate. All three resolve through [`GuardSpec::resolve`].

use crate::state::error::MemberKind;
use crate::state::state::{BoxError, Stateable};
use std::fmt;
use std::sync::Arc;

type GuardBlock<R> = Arc<dyn Fn(&R) -> Result<bool, BoxError> + Send + Sync>;

/// A guard declared on a transition.
pub enum GuardSpec<R> {
    Block(GuardBlock<R>),
    Method(String),
    Predicate(String),
}

/// Why a guard could not produce a boolean.
#[derive(Debug)]
pub enum GuardFailure {
    /// The guard itself returned an error.
    Raised(BoxError),
    /// The named method or predicate does not exist on the record.
    Missing { kind: MemberKind, name: String },
}

impl<R: Stateable> GuardSpec<R> {
    pub fn block<F>(check: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        GuardSpec::Block(Arc::new(move |record| Ok(check(record))))
    }

    pub fn fallible<F>(check: F) -> Self
    where
        F: Fn(&R) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        GuardSpec::Block(Arc::new(check))
    }

    pub fn method(name: impl Into<String>) -> Self {
        GuardSpec::Method(name.into())
    }

    pub fn predicate(name: impl Into<String>) -> Self {
        GuardSpec::Predicate(name.into())
    }

    pub fn resolve(&self, record: &R) -> Result<bool, GuardFailure> {
        match self {
            GuardSpec::Block(check) => check(record).map_err(GuardFailure::Raised),
            GuardSpec::Method(name) => match record.guard_method(name) {
                Some(result) => result.map_err(GuardFailure::Raised),
                None => Err(GuardFailure::Missing {
                    kind: MemberKind::Method,
                    name: name.clone(),
                }),
            },
            GuardSpec::Predicate(name) => record.status(name).ok_or_else(|| GuardFailure::Missing {
                kind: MemberKind::Predicate,
                name: name.clone(),
            }),
        }
    }

    /// Short label used in errors and logs.
    pub fn describe(&self) -> String {
        match self {
            GuardSpec::Block(_) => "guard block".to_string(),
            GuardSpec::Method(name) => format!("guard method '{name}'"),
            GuardSpec::Predicate(name) => format!("predicate '{name}'"),
        }
    }
}

impl<R> Clone for GuardSpec<R> {
    fn clone(&self) -> Self {
        match self {
            GuardSpec::Block(check) => GuardSpec::Block(Arc::clone(check)),
            GuardSpec::Method(name) => GuardSpec::Method(name.clone()),
            GuardSpec::Predicate(name) => GuardSpec::Predicate(name.clone()),
        }
    }
}

impl<R> fmt::Debug for GuardSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardSpec::Block(_) => f.write_str("Block(..)"),
            GuardSpec::Method(name) => f.debug_tuple("Method").field(name).finish(),
            GuardSpec::Predicate(name) => f.debug_tuple("Predicate").field(name).finish(),
        }
    }
}
