//! Session-scoped record of items already admitted for processing.

use feedscout_core::DedupKey;
use std::collections::HashSet;

/// Set of dedup keys seen during one crawl session.
///
/// The store is not synchronized; concurrent item tasks share it behind a
/// lock and call [`DedupStore::admit`], which checks and marks in one step.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashSet<DedupKey>,
}

impl DedupStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the key was already marked.
    #[must_use]
    pub fn seen(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    /// Mark a key as processed.
    pub fn mark(&mut self, key: DedupKey) {
        self.seen.insert(key);
    }

    /// Mark the key and report whether it was new.
    ///
    /// Returns `false` when the key had already been admitted.
    pub fn admit(&mut self, key: DedupKey) -> bool {
        self.seen.insert(key)
    }

    /// Forget every key.
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether no key has been marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
