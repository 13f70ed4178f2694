//! Per-anchor scoped storage
//!
//! Each anchor (a position in the live document) owns a small key/value
//! table. Entries are written once, on first successful resolution at that
//! anchor, and disappear with the anchor.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::DirectoryError;
use crate::value::Value;

/// Identifies a position in the live document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u64);

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Two-level map: anchor, then key.
#[derive(Debug, Default)]
pub struct ScopedDirectory {
    anchors: RwLock<HashMap<AnchorId, IndexMap<String, Value>>>,
}

impl ScopedDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value stored at an anchor
    pub fn get(&self, anchor: AnchorId, key: &str) -> Option<Value> {
        self.anchors.read().get(&anchor)?.get(key).cloned()
    }

    /// Whether an anchor has an entry for `key`
    pub fn contains(&self, anchor: AnchorId, key: &str) -> bool {
        self.anchors
            .read()
            .get(&anchor)
            .is_some_and(|entries| entries.contains_key(key))
    }

    /// Store a value under an anchor.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::DuplicateKey` if the anchor already has an
    /// entry for `key`; the existing entry is left untouched.
    pub fn put(
        &self,
        anchor: AnchorId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), DirectoryError> {
        let key = key.into();
        let mut anchors = self.anchors.write();
        let entries = anchors.entry(anchor).or_default();
        if entries.contains_key(&key) {
            return Err(DirectoryError::DuplicateKey { anchor, key });
        }
        trace!(%anchor, key = %key, "directory entry created");
        entries.insert(key, value);
        Ok(())
    }

    /// Discard everything stored at an anchor, returning how many entries
    /// were dropped.
    pub fn remove_anchor(&self, anchor: AnchorId) -> usize {
        let removed = self
            .anchors
            .write()
            .remove(&anchor)
            .map_or(0, |entries| entries.len());
        debug!(%anchor, removed, "anchor removed from directory");
        removed
    }

    /// Keys stored at an anchor, in insertion order
    pub fn keys(&self, anchor: AnchorId) -> Vec<String> {
        self.anchors
            .read()
            .get(&anchor)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of entries across all anchors
    pub fn len(&self) -> usize {
        self.anchors.read().values().map(IndexMap::len).sum()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every anchor
    pub fn clear(&self) {
        self.anchors.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_then_get() {
        let dir = ScopedDirectory::new();
        dir.put(AnchorId(1), "k", Value::Int(1)).unwrap();
        assert_eq!(dir.get(AnchorId(1), "k"), Some(Value::Int(1)));
        assert_eq!(dir.get(AnchorId(2), "k"), None);
    }

    #[test]
    fn test_duplicate_key_keeps_first_value() {
        let dir = ScopedDirectory::new();
        dir.put(AnchorId(1), "k", Value::string("v1")).unwrap();
        let err = dir.put(AnchorId(1), "k", Value::string("v2")).unwrap_err();
        assert_eq!(
            err,
            DirectoryError::DuplicateKey {
                anchor: AnchorId(1),
                key: "k".into()
            }
        );
        assert_eq!(dir.get(AnchorId(1), "k"), Some(Value::string("v1")));
    }

    #[test]
    fn test_same_key_under_different_anchors() {
        let dir = ScopedDirectory::new();
        dir.put(AnchorId(1), "k", Value::Int(1)).unwrap();
        dir.put(AnchorId(2), "k", Value::Int(2)).unwrap();
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn test_remove_anchor_discards_entries() {
        let dir = ScopedDirectory::new();
        dir.put(AnchorId(1), "a", Value::Int(1)).unwrap();
        dir.put(AnchorId(1), "b", Value::Int(2)).unwrap();
        dir.put(AnchorId(2), "a", Value::Int(3)).unwrap();
        assert_eq!(dir.remove_anchor(AnchorId(1)), 2);
        assert!(!dir.contains(AnchorId(1), "a"));
        assert_eq!(dir.keys(AnchorId(2)), vec!["a".to_string()]);
        assert_eq!(dir.remove_anchor(AnchorId(1)), 0);
    }
}
