use super::hash::Hash;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Handle on a key/value storage snapshot used as execution context.
///
/// The root is the commitment the snapshot was loaded for. Clones share the same underlying
/// entries, so writes performed by the runtime during execution are visible to whoever persists
/// the resulting state afterwards.
#[derive(Debug, Clone)]
pub struct TrieState {
    root: Hash,
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl TrieState {
    pub fn new(root: Hash) -> Self {
        Self::with_entries(root, BTreeMap::new())
    }

    pub fn with_entries(root: Hash, entries: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            root,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn root(&self) -> Hash {
        self.root
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn put(&self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn delete(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both handles point at the same snapshot.
    pub fn shares_snapshot(&self, other: &TrieState) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}
