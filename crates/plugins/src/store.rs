//! Key-value accessors handed to modules through the engine.
//!
//! Persistence is the embedder's concern; the engine only needs `get` and
//! `set`, and always receives an explicit implementation.

use std::{collections::HashMap, sync::RwLock};

use serde_json::Value;

/// Key-value state shared between modules.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`. Returns `false` if the write was refused.
    fn set(&self, key: &str, value: Value) -> bool;
}

/// Process-local store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry, for diagnostics.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value) -> bool {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        true
    }
}
