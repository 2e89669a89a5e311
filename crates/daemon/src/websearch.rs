//! Process-wide websearch visibility policy.
//!
//! In a combined multi-provider view, generic web-search suggestions would
//! drown local results. Past a configured result count they are hidden
//! unless the query starts with a prefix that explicitly names a websearch
//! entry. The prefix map is populated during provider setup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

pub struct WebsearchPolicy {
    max_global_items: AtomicUsize,
    prefixes: RwLock<HashMap<String, String>>,
}

impl WebsearchPolicy {
    pub fn new(max_global_items: usize) -> Self {
        Self {
            max_global_items: AtomicUsize::new(max_global_items),
            prefixes: RwLock::new(HashMap::new()),
        }
    }

    /// Result count above which generic websearch items are hidden.
    pub fn max_global_items(&self) -> usize {
        self.max_global_items.load(Ordering::Relaxed)
    }

    pub fn set_max_global_items(&self, value: usize) {
        self.max_global_items.store(value, Ordering::Relaxed);
    }

    /// Map a trigger prefix (say `"g "`) to the websearch entry it names.
    pub fn register_prefix(&self, prefix: impl Into<String>, entry: impl Into<String>) {
        match self.prefixes.write() {
            Ok(mut prefixes) => {
                prefixes.insert(prefix.into(), entry.into());
            }
            Err(_) => log::warn!("websearch prefix map lock poisoned"),
        }
    }

    /// Entry name for a registered prefix that `query` starts with.
    pub fn prefix_for(&self, query: &str) -> Option<String> {
        let prefixes = self.prefixes.read().ok()?;
        prefixes
            .iter()
            .find(|(prefix, _)| query.starts_with(prefix.as_str()))
            .map(|(_, entry)| entry.clone())
    }
}
