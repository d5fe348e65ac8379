use std::{
    collections::HashMap,
    sync::{Arc, RwLock}
};

use crate::{
    shape::{self, ShapeError, SqlDialect, StatementShape},
    statement::{Statement, StatementId}
};

/// Outcome of analyzing one statement, shared between stages
pub type ShapeResult = Arc<Result<StatementShape, ShapeError>>;

/// Bounded cache of statement shapes keyed by statement identity
pub struct ShapeCache {
    entries:  RwLock<HashMap<StatementId, ShapeResult>>,
    dialect:  SqlDialect,
    max_size: usize
}

impl ShapeCache {
    pub fn new(dialect: SqlDialect, max_size: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(max_size.min(1024))),
            dialect,
            max_size
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn get(&self, id: &StatementId) -> Option<ShapeResult> {
        self.entries.read().ok()?.get(id).cloned()
    }

    /// Cached shape, analyzing the statement on first use
    pub fn get_or_analyze(&self, statement: &Statement) -> ShapeResult {
        if let Some(hit) = self.get(statement.id()) {
            return hit;
        }
        let result = Arc::new(shape::analyze(statement, self.dialect));
        self.insert(statement.id().clone(), Arc::clone(&result));
        result
    }

    fn insert(&self, id: StatementId, result: ShapeResult) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        // Simple eviction: clear half when full
        if entries.len() >= self.max_size {
            let keys: Vec<_> = entries
                .keys()
                .take((self.max_size / 2).max(1))
                .cloned()
                .collect();
            for key in keys {
                entries.remove(&key);
            }
        }
        entries.insert(id, result);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ShapeCache {
    fn default() -> Self {
        Self::new(SqlDialect::default(), 4096)
    }
}
