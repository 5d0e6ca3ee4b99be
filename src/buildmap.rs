//! Build map: module path to precompiled envelope
//!
//! Populated only during build-mode loads, read during the write phase,
//! and dropped with the plugin instance. Entries are last-write-wins.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::engine::Precompiled;

#[derive(Debug, Default)]
pub struct BuildMap {
    entries: Mutex<HashMap<String, Precompiled>>,
}

impl BuildMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an envelope under a module path, replacing any previous entry
    pub fn insert(&self, module: &str, envelope: Precompiled) {
        debug!(%module, "BuildMap::insert: called");
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(module.to_string(), envelope);
        } else {
            debug!(%module, "BuildMap::insert: failed to acquire lock");
        }
    }

    pub fn get(&self, module: &str) -> Option<Precompiled> {
        self.entries.lock().ok()?.get(module).cloned()
    }

    pub fn contains(&self, module: &str) -> bool {
        self.get(module).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Module paths recorded so far, sorted
    pub fn modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = self
            .entries
            .lock()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        modules.sort();
        modules
    }
}
