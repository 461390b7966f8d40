//! Concernkit: composable behaviors for persistent record types.
//!
//! Two subsystems share a common error-reporting contract:
//!
//! - **Search** ([`search`]): declared fields expand into `field_operator`
//!   predicates. Caller input is compiled into a [`store::Query`] under
//!   complexity, security-policy and pagination limits.
//! - **State** ([`state`]): a frozen transition table with guards,
//!   validations and callbacks. Committed transitions are recorded in
//!   per-table history models.
//!
//! Every error implements [`Reportable`] so hosts can forward a structured
//! [`ErrorReport`] (category tag, offending identifiers, alternatives) to
//! telemetry without parsing messages.
//!
//! # Example
//!
//! ```rust
//! use concernkit::search::{SearchOptions, Searchable};
//! use concernkit::store::{MemoryStore, SemanticType, TableSchema};
//! use concernkit::Value;
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let schema = TableSchema::new("articles").column("title", SemanticType::Text);
//! let searchable = Searchable::builder(Arc::new(schema))
//!     .predicates(["title"])?
//!     .build()?;
//!
//! let row = |title: &str| BTreeMap::from([("title".to_string(), Value::from(title))]);
//! let store = MemoryStore::with_rows("articles", vec![row("Ruby on Rails"), row("Python")]);
//!
//! let predicates = BTreeMap::from([("title_cont".to_string(), Value::from("Ruby"))]);
//! let query = searchable.search(predicates, &SearchOptions::new())?;
//! let found = store.fetch(&query);
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0]["title"], Value::from("Ruby on Rails"));
//! # Ok::<(), concernkit::search::SearchError>(())
//! ```

pub mod definition;
pub mod report;
pub mod search;
pub mod serialize;
pub mod state;
pub mod store;
pub mod value;

pub use definition::{Definition, DefinitionError};
pub use report::{ErrorCategory, ErrorReport, Reportable};
pub use search::{SearchError, SearchOptions, Searchable};
pub use serialize::SerializeOptions;
pub use state::{State, StateMachine, Stateable, TransitionError, TransitionOptions};
pub use value::{Presence, Value};
