use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Concurrent map from a protocol-specific lookup key to published challenge material.
///
/// Clones share the same entries, so the copy handed to a listener observes every
/// [`put`](Self::put) made through the copy kept by the responder as soon as the call returns.
/// Lookups take a shared lock and never block each other; writers take the lock exclusively
/// for the duration of a single map update.
#[derive(Debug)]
pub struct ChallengeStore<V> {
    entries: Arc<RwLock<HashMap<String, V>>>,
}

impl<V> ChallengeStore<V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish `value` under `key`, replacing anything previously published there.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.entries.write().insert(key.into(), value);
    }

    /// Withdraw whatever is published under `key`. Withdrawing an absent key does nothing.
    pub fn delete(&self, key: &str) -> Option<V> {
        self.entries.write().remove(key)
    }

    /// Number of currently published entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is currently published.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone> ChallengeStore<V> {
    /// The value currently published under `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.read().get(key).cloned()
    }
}

impl<V> Default for ChallengeStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for ChallengeStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}
