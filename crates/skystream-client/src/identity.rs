//! Account id → handle cache fed by identity events.
//!
//! Last write wins. Entries are never evicted: memory grows with the number
//! of distinct accounts observed and is reclaimed only when the client is
//! dropped. Entries survive reconnects.

use std::collections::HashMap;

use dashmap::DashMap;

/// Concurrent DID → handle map.
#[derive(Debug, Default)]
pub struct HandleCache {
    handles: DashMap<String, String>,
}

impl HandleCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current handle for `did`, returning the previous one.
    pub fn insert(&self, did: impl Into<String>, handle: impl Into<String>) -> Option<String> {
        self.handles.insert(did.into(), handle.into())
    }

    /// Current handle for `did`.
    pub fn get(&self, did: &str) -> Option<String> {
        self.handles.get(did).map(|entry| entry.value().clone())
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.handles
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of cached accounts.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let cache = HandleCache::new();
        assert!(cache.insert("did:plc:a", "alice.example").is_none());
        assert_eq!(cache.get("did:plc:a").as_deref(), Some("alice.example"));
        assert!(cache.get("did:plc:b").is_none());
    }

    #[test]
    fn last_write_wins() {
        let cache = HandleCache::new();
        let _ = cache.insert("did:plc:a", "old.example");
        let previous = cache.insert("did:plc:a", "new.example");
        assert_eq!(previous.as_deref(), Some("old.example"));
        assert_eq!(cache.get("did:plc:a").as_deref(), Some("new.example"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let cache = HandleCache::new();
        let _ = cache.insert("did:plc:a", "alice.example");
        let snapshot = cache.snapshot();
        let _ = cache.insert("did:plc:b", "bob.example");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["did:plc:a"], "alice.example");
        assert_eq!(cache.len(), 2);
    }
}
