//! The set of client snippets the current composition needs.

use std::sync::RwLock;

/// Snippet every composition injects, whatever modules load.
pub const BASELINE_SNIPPET: &str = "track";

/// Ordered, duplicate-free, grow-only list of required snippet names.
///
/// Names keep their first-insertion order; baseline entries come first.
pub struct SnippetRegistry {
    names: RwLock<Vec<String>>,
}

impl SnippetRegistry {
    /// Create a registry seeded with `baseline`, in order, without duplicates.
    pub fn new<I, S>(baseline: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self {
            names: RwLock::new(Vec::new()),
        };
        for name in baseline {
            registry.require(&name.into());
        }
        registry
    }

    /// Mark `name` as required. Returns `true` if it was not required before.
    pub fn require(&self, name: &str) -> bool {
        let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
        if names.iter().any(|n| n == name) {
            return false;
        }
        names.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|n| n == name)
    }

    /// Snapshot of the required names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.names.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.names.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SnippetRegistry {
    fn default() -> Self {
        Self::new([BASELINE_SNIPPET])
    }
}
