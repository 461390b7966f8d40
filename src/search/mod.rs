//! Searchable records: declared predicates compiled into validated queries.
//!
//! A [`Searchable`] is declared once per record type:
//!
//! ```rust
//! use concernkit::search::{Searchable, SearchOptions};
//! use concernkit::store::{SemanticType, TableSchema};
//! use concernkit::Value;
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let schema = TableSchema::new("articles")
//!     .column("title", SemanticType::Text)
//!     .column("view_count", SemanticType::Integer);
//!
//! let searchable = Searchable::builder(Arc::new(schema))
//!     .predicates(["title", "view_count"])?
//!     .sort(["title"])?
//!     .build()?;
//!
//! let mut predicates = BTreeMap::new();
//! predicates.insert("title_cont".to_string(), Value::from("Ruby"));
//! let query = searchable.search(predicates, &SearchOptions::new().orders(["title_asc"]))?;
//! assert_eq!(query.orders().len(), 1);
//! # Ok::<(), concernkit::search::SearchError>(())
//! ```

mod assembler;
pub mod config;
pub mod error;
pub mod field;
pub mod predicate;
pub mod registry;
pub mod request;
pub mod searchable;
pub mod security;

pub use config::SearchConfig;
pub use error::SearchError;
pub use field::{FieldDescriptor, Operator};
pub use predicate::PredicateCompiler;
pub use registry::{FieldRegistry, PredicateEntry, PredicateKind};
pub use request::{Pagination, Params, PredicateMap, SearchInput, SearchOptions, SearchRequest};
pub use searchable::{Searchable, SearchableBuilder};
pub use security::SecurityPolicy;
