//! Per-table history models and the registry that creates them.
//!
//! A [`HistoryModel`] is created lazily the first time a table is used and
//! exactly once per table name, even when many threads ask for the same
//! table at the same time. Reads after creation take only a read lock.

use crate::state::engine::TransitionStore;
use crate::state::history::{HistoryQuery, TransitionHistory, TransitionRecord};
use crate::state::state::{BoxError, Stateable};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

/// In-memory history table.
#[derive(Debug)]
pub struct HistoryModel {
    table: String,
    id: Uuid,
    rows: RwLock<Vec<TransitionRecord>>,
}

impl HistoryModel {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            id: Uuid::new_v4(),
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Identity of this model instance.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn insert(&self, row: TransitionRecord) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn query(&self, query: &HistoryQuery) -> Vec<TransitionRecord> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        query.apply(rows.iter()).into_iter().cloned().collect()
    }

    /// All transitions of one owner as a path.
    pub fn history_for(&self, owner_type: &str, owner_id: &str) -> TransitionHistory {
        TransitionHistory::new(self.query(&HistoryQuery::new().for_owner(owner_type, owner_id)))
    }
}

impl<R: Stateable> TransitionStore<R> for HistoryModel {
    fn commit(&self, _record: &R, transition: &TransitionRecord) -> Result<(), BoxError> {
        self.insert(transition.clone());
        Ok(())
    }
}

/// Creates and caches one [`HistoryModel`] per table name.
///
/// Owned by the host's composition root and shared by reference or `Arc`.
#[derive(Debug, Default)]
pub struct HistoryRegistry {
    models: RwLock<HashMap<String, Arc<HistoryModel>>>,
    creation: Mutex<()>,
    created: AtomicUsize,
}

impl HistoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The model for `table`, created on first use.
    pub fn model_for(&self, table: &str) -> Arc<HistoryModel> {
        if let Some(model) = self.lookup(table) {
            return model;
        }

        let _guard = self.creation.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = self.lookup(table) {
            return model;
        }

        let model = Arc::new(HistoryModel::new(table));
        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string(), Arc::clone(&model));
        self.created.fetch_add(1, Ordering::SeqCst);
        debug!(table, model_id = %model.id(), "created history model");
        model
    }

    pub fn get(&self, table: &str) -> Option<Arc<HistoryModel>> {
        self.lookup(table)
    }

    /// Number of models created over the registry's lifetime.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tables.sort();
        tables
    }

    fn lookup(&self, table: &str) -> Option<Arc<HistoryModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
    }
}
