//! Capabilities consumed from the record store.
//!
//! The search engine only needs column introspection ([`RecordSchema`]),
//! read access to record fields ([`Record`]) and a chainable query handle
//! ([`Query`]) built from [`Condition`] trees. [`MemoryStore`] materializes
//! queries in memory and serves as the reference store.

mod condition;
mod memory;
mod query;
mod schema;

pub use condition::{escape_like, like_match, ArrayMatch, Comparison, Condition, KeyMatch};
pub use memory::MemoryStore;
pub use query::{Direction, NullsOrder, Order, Query};
pub use schema::{RecordSchema, SemanticType, TableSchema};

use crate::value::Value;
use std::collections::BTreeMap;

/// Read access to a record's fields. Missing fields read as [`Value::Null`].
pub trait Record {
    fn field(&self, name: &str) -> Value;
}

impl Record for BTreeMap<String, Value> {
    fn field(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Null)
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn field(&self, name: &str) -> Value {
        (**self).field(name)
    }
}
