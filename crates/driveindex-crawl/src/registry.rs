//! Registry of folders currently being listed.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use tokio::time::Instant;

/// A folder listing in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Browse URL of the folder.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Index of the worker listing it.
    pub worker: usize,
    /// When the listing started.
    pub started_at: Instant,
}

/// Folders being listed, keyed by provider id.
///
/// A folder id is registered by at most one worker at a time.
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    entries: Mutex<BTreeMap<String, InFlight>>,
}

impl ProgressRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a folder. Returns `false` if it is already registered.
    pub fn register(&self, key: impl Into<String>, entry: InFlight) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = key.into();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, entry);
        true
    }

    /// Remove a folder, returning its entry.
    pub fn deregister(&self, key: &str) -> Option<InFlight> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Register a folder for the lifetime of the returned guard.
    pub fn track(&self, key: impl Into<String>, entry: InFlight) -> Option<Registration<'_>> {
        let key = key.into();
        self.register(key.clone(), entry).then_some(Registration {
            registry: self,
            key,
        })
    }

    /// Copy of every entry, ordered by key.
    pub fn snapshot(&self) -> Vec<(String, InFlight)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Check if a folder is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Number of folders registered.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deregisters its folder when dropped.
#[derive(Debug)]
pub struct Registration<'a> {
    registry: &'a ProgressRegistry,
    key: String,
}

impl Registration<'_> {
    /// Registered key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.deregister(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(worker: usize) -> InFlight {
        InFlight {
            url: format!("u/{worker}"),
            name: "folder".to_string(),
            worker,
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_register_is_exclusive() {
        let registry = ProgressRegistry::new();
        assert!(registry.register("a", entry(0)));
        assert!(!registry.register("a", entry(1)));
        assert_eq!(registry.deregister("a").unwrap().worker, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_registration_guard() {
        let registry = ProgressRegistry::new();
        {
            let guard = registry.track("b", entry(0)).unwrap();
            assert_eq!(guard.key(), "b");
            assert!(registry.contains("b"));
            assert!(registry.track("b", entry(1)).is_none());
        }
        assert!(!registry.contains("b"));
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted() {
        let registry = ProgressRegistry::new();
        registry.register("z", entry(0));
        registry.register("a", entry(1));
        let keys: Vec<_> = registry.snapshot().into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "z"]);
    }
}
