//! In-memory record store that materializes a [`Query`].

use crate::store::{Query, Record};
use tracing::debug;

/// Rows of one table held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore<R> {
    table: String,
    rows: Vec<R>,
}

impl<R: Record> MemoryStore<R> {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(table: impl Into<String>, rows: Vec<R>) -> Self {
        Self {
            table: table.into(),
            rows,
        }
    }

    pub fn insert(&mut self, row: R) {
        self.rows.push(row);
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Run the query: filter, stable-sort, then apply offset and limit.
    ///
    /// Eager-load directives are opaque to this store and ignored.
    pub fn fetch(&self, query: &Query) -> Vec<&R> {
        let mut matched: Vec<&R> = self
            .rows
            .iter()
            .filter(|row| query.matches(*row))
            .collect();
        matched.sort_by(|a, b| query.compare(*a, *b));

        let offset = query.offset_value().unwrap_or(0) as usize;
        let limit = query.limit_value().map_or(usize::MAX, |l| l as usize);
        let rows: Vec<&R> = matched.into_iter().skip(offset).take(limit).collect();

        debug!(
            table = %self.table,
            returned = rows.len(),
            includes = ?query.includes_values(),
            "materialized query"
        );
        rows
    }

    /// Number of rows matching the query's conditions, ignoring pagination.
    pub fn count(&self, query: &Query) -> usize {
        self.rows.iter().filter(|row| query.matches(*row)).count()
    }
}
