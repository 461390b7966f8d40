//! Once-only configuration of a record type.
//!
//! A record type's [`Searchable`](crate::search::Searchable) or
//! [`StateMachine`](crate::state::StateMachine) is declared once and frozen.
//! Defining it a second time is rejected and the first definition stays
//! in force.

use crate::report::{ErrorCategory, ErrorReport, Reportable};
use std::sync::OnceLock;
use thiserror::Error;

/// Errors from [`Definition::define`].
#[derive(Debug, Error)]
pub enum DefinitionError<E: std::error::Error + 'static> {
    #[error("'{name}' is already configured; configuration cannot be applied twice")]
    AlreadyDefined { name: String },

    #[error(transparent)]
    Build(#[from] E),
}

impl<E: Reportable + 'static> Reportable for DefinitionError<E> {
    fn category(&self) -> ErrorCategory {
        match self {
            DefinitionError::AlreadyDefined { .. } => ErrorCategory::Configuration,
            DefinitionError::Build(inner) => inner.category(),
        }
    }

    fn report(&self) -> ErrorReport {
        match self {
            DefinitionError::AlreadyDefined { name } => {
                ErrorReport::new(self.category(), self.to_string()).with("name", name.as_str())
            }
            DefinitionError::Build(inner) => inner.report(),
        }
    }
}

/// A named cell holding one frozen definition.
///
/// # Example
///
/// ```rust
/// use concernkit::definition::{Definition, DefinitionError};
/// use concernkit::search::{Searchable, SearchError};
/// use concernkit::store::{SemanticType, TableSchema};
/// use std::sync::Arc;
///
/// static ARTICLE_SEARCH: Definition<Searchable> = Definition::new("Article");
///
/// let schema = Arc::new(TableSchema::new("articles").column("title", SemanticType::Text));
/// let searchable = ARTICLE_SEARCH.define(|| {
///     Searchable::builder(schema.clone()).predicates(["title"])?.build()
/// })?;
/// assert!(searchable.is_predicate_key("title_cont"));
///
/// let again = ARTICLE_SEARCH.define(|| Searchable::builder(schema.clone()).build());
/// assert!(matches!(again, Err(DefinitionError::AlreadyDefined { .. })));
/// # Ok::<(), DefinitionError<SearchError>>(())
/// ```
#[derive(Debug)]
pub struct Definition<T> {
    name: &'static str,
    cell: OnceLock<T>,
}

impl<T> Definition<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build and store the definition. Fails if one is already stored,
    /// without running `build`.
    pub fn define<E, F>(&self, build: F) -> Result<&T, DefinitionError<E>>
    where
        E: std::error::Error + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        if self.cell.get().is_some() {
            return Err(self.already_defined());
        }
        let value = build()?;
        if self.cell.set(value).is_err() {
            return Err(self.already_defined());
        }
        self.cell.get().ok_or_else(|| self.already_defined())
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_defined(&self) -> bool {
        self.cell.get().is_some()
    }

    fn already_defined<E: std::error::Error + 'static>(&self) -> DefinitionError<E> {
        DefinitionError::AlreadyDefined {
            name: self.name.to_string(),
        }
    }
}
