//! Engine Registry
//!
//! Holds the connected engine handles for the lifetime of the process.
//! Iteration always follows `BackendKind` order (DuckDB, PostgreSQL, SQLite),
//! which is the order fixtures are loaded in.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::traits::DataEngine;
use crate::engine::types::BackendKind;

/// Registry of live engine handles keyed by backend
#[derive(Default)]
pub struct EngineRegistry {
    engines: BTreeMap<BackendKind, Arc<dyn DataEngine>>,
}

impl EngineRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle under its own `kind()`, replacing any previous one
    pub fn register(&mut self, engine: Arc<dyn DataEngine>) {
        self.engines.insert(engine.kind(), engine);
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn DataEngine>> {
        self.engines.get(&kind).cloned()
    }

    /// Like `get`, but a missing engine is an error naming it
    pub fn require(&self, kind: BackendKind) -> EngineResult<Arc<dyn DataEngine>> {
        self.get(kind).ok_or_else(|| {
            EngineError::internal(format!(
                "{kind} is not enabled; add it to --engines to use it"
            ))
        })
    }

    /// Handles in load order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn DataEngine>> {
        self.engines.values()
    }

    pub fn kinds(&self) -> Vec<BackendKind> {
        self.engines.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Closes every session; used once on the way out
    pub async fn close_all(&self) {
        for engine in self.engines.values() {
            engine.close().await;
            tracing::debug!(engine = %engine.kind(), "session closed");
        }
    }
}
