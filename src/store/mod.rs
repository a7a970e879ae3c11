//! Ordered key/value storage.
//!
//! ## Components
//!
//! - [`KvStore`]: the byte-addressed, lexicographically ordered store the
//!   engine runs on
//! - [`MemStore`]: `BTreeMap`-backed committed state
//! - [`CacheStore`]: write overlay over any store; a handler runs against
//!   a cache and its writes are applied only if it succeeds
//!
//! Values are encoded with `bincode` through [`get_value`] / [`set_value`].
//!
//! ## Example
//!
//! ```
//! use wagerbook::store::{CacheStore, KvStore, MemStore};
//!
//! let mut committed = MemStore::new();
//! committed.set(b"a".to_vec(), b"1".to_vec());
//!
//! let mut cache = CacheStore::new(&committed);
//! cache.set(b"b".to_vec(), b"2".to_vec());
//! assert!(committed.get(b"b").is_none());
//!
//! let writes = cache.into_writes();
//! committed.apply(writes);
//! assert_eq!(committed.get(b"b"), Some(b"2".to_vec()));
//! ```

pub mod keys;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Pending writes of a [`CacheStore`]; `None` marks a deletion.
pub type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Byte-addressed store ordered by key.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Entries under `prefix` in key order, skipping the first `offset` and
    /// returning at most `limit`. Only the returned entries are copied.
    fn prefix_iter_limit(&self, prefix: &[u8], offset: usize, limit: usize) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Number of entries under `prefix`.
    fn prefix_count(&self, prefix: &[u8]) -> usize;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// SHA-256 over every entry in key order, each key and value prefixed
    /// with its big-endian `u32` length.
    fn state_root(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (key, value) in self.prefix_iter(&[]) {
            hasher.update((key.len() as u32).to_be_bytes());
            hasher.update(&key);
            hasher.update((value.len() as u32).to_be_bytes());
            hasher.update(&value);
        }
        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        root
    }
}

// ============================================================================
// MemStore
// ============================================================================

/// Committed in-memory state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the writes collected by a cache overlay.
    pub fn apply(&mut self, writes: WriteSet) {
        for (key, value) in writes {
            match value {
                Some(value) => {
                    self.data.insert(key, value);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
    }

    fn prefix_range<'a>(&'a self, prefix: &'a [u8]) -> impl Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)> + 'a {
        self.data
            .range(prefix.to_vec()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.data.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.data.remove(key);
    }

    fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.prefix_range(prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn prefix_iter_limit(&self, prefix: &[u8], offset: usize, limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.prefix_range(prefix)
            .skip(offset)
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn prefix_count(&self, prefix: &[u8]) -> usize {
        self.prefix_range(prefix).count()
    }
}

// ============================================================================
// CacheStore
// ============================================================================

/// Write overlay over a parent store.
///
/// Reads see the overlay first, then the parent. Nothing reaches the
/// parent until the caller applies [`CacheStore::into_writes`].
pub struct CacheStore<'a> {
    parent: &'a dyn KvStore,
    writes: WriteSet,
}

impl<'a> CacheStore<'a> {
    pub fn new(parent: &'a dyn KvStore) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    pub fn into_writes(self) -> WriteSet {
        self.writes
    }

    /// Number of keys touched so far.
    pub fn dirty_count(&self) -> usize {
        self.writes.len()
    }

    fn overlay<'b>(&'b self, prefix: &'b [u8]) -> impl Iterator<Item = (&'b Vec<u8>, &'b Option<Vec<u8>>)> + 'b {
        self.writes
            .range(prefix.to_vec()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn prefix_iter(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.prefix_iter(prefix).into_iter().collect();
        for (key, value) in self.overlay(prefix) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter().collect()
    }

    /// Merges the overlay with the parent a page at a time. Deletions in
    /// the overlay hide parent entries, so the parent may be read past
    /// `offset + limit`, but never beyond the first page that fills the
    /// request.
    fn prefix_iter_limit(&self, prefix: &[u8], offset: usize, limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        if limit == 0 {
            return out;
        }

        let page = offset.saturating_add(limit);
        let mut overlay = self.overlay(prefix).peekable();
        let mut parent_read = 0usize;
        let mut parent_done = false;
        let mut parent = Vec::new().into_iter().peekable();
        let mut skipped = 0usize;

        loop {
            if parent.peek().is_none() && !parent_done {
                let next = self.parent.prefix_iter_limit(prefix, parent_read, page);
                parent_done = next.len() < page;
                parent_read += next.len();
                parent = next.into_iter().peekable();
            }

            let from_overlay = match (overlay.peek(), parent.peek()) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some((ok, _)), Some((pk, _))) => *ok <= pk,
            };

            let entry = if from_overlay {
                let (key, value) = match overlay.next() {
                    Some(item) => item,
                    None => break,
                };
                // overlay shadows the parent entry with the same key
                if parent.peek().map_or(false, |(pk, _)| pk == key) {
                    parent.next();
                }
                value.as_ref().map(|v| (key.clone(), v.clone()))
            } else {
                parent.next()
            };

            if let Some(entry) = entry {
                if skipped < offset {
                    skipped += 1;
                    continue;
                }
                out.push(entry);
                if out.len() == limit {
                    break;
                }
            }
        }
        out
    }

    fn prefix_count(&self, prefix: &[u8]) -> usize {
        let mut count = self.parent.prefix_count(prefix);
        for (key, value) in self.overlay(prefix) {
            match (value.is_some(), self.parent.has(key)) {
                (true, false) => count += 1,
                (false, true) => count -= 1,
                _ => {}
            }
        }
        count
    }
}

// ============================================================================
// Typed access
// ============================================================================

/// Apply a write set to any store (used to fold a nested cache into its parent).
pub fn apply_writes(store: &mut dyn KvStore, writes: WriteSet) {
    for (key, value) in writes {
        match value {
            Some(value) => store.set(key, value),
            None => store.delete(&key),
        }
    }
}

/// Read and decode a value.
pub fn get_value<T: DeserializeOwned>(store: &dyn KvStore, key: &[u8]) -> Result<Option<T>> {
    match store.get(key) {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a value.
pub fn set_value<T: Serialize>(store: &mut dyn KvStore, key: Vec<u8>, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    store.set(key, bytes);
    Ok(())
}

/// Decode every value under `prefix`, in key order.
pub fn values_with_prefix<T: DeserializeOwned>(store: &dyn KvStore, prefix: &[u8]) -> Result<Vec<T>> {
    store
        .prefix_iter(prefix)
        .into_iter()
        .map(|(_, bytes)| bincode::deserialize(&bytes).map_err(Into::into))
        .collect()
}

/// Decode at most `limit` values under `prefix` after skipping `offset`.
pub fn values_with_prefix_limit<T: DeserializeOwned>(
    store: &dyn KvStore,
    prefix: &[u8],
    offset: usize,
    limit: usize,
) -> Result<Vec<T>> {
    store
        .prefix_iter_limit(prefix, offset, limit)
        .into_iter()
        .map(|(_, bytes)| bincode::deserialize(&bytes).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_iter_is_ordered_and_bounded() {
        let mut store = MemStore::new();
        store.set(b"a/2".to_vec(), vec![2]);
        store.set(b"a/1".to_vec(), vec![1]);
        store.set(b"b/1".to_vec(), vec![3]);

        let items = store.prefix_iter(b"a/");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, b"a/1".to_vec());
        assert_eq!(items[1].0, b"a/2".to_vec());
        assert_eq!(store.prefix_iter(&[]).len(), 3);
    }

    #[test]
    fn test_cache_overlays_reads_and_deletes() {
        let mut parent = MemStore::new();
        parent.set(b"k/1".to_vec(), vec![1]);
        parent.set(b"k/2".to_vec(), vec![2]);

        let mut cache = CacheStore::new(&parent);
        cache.delete(b"k/1");
        cache.set(b"k/3".to_vec(), vec![3]);
        cache.set(b"k/2".to_vec(), vec![20]);

        assert!(cache.get(b"k/1").is_none());
        assert_eq!(cache.get(b"k/2"), Some(vec![20]));
        let keys: Vec<_> = cache.prefix_iter(b"k/").into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"k/2".to_vec(), b"k/3".to_vec()]);

        // parent untouched until applied
        assert_eq!(parent.get(b"k/1"), Some(vec![1]));
    }

    #[test]
    fn test_limited_scan_pages_in_key_order() {
        let mut store = MemStore::new();
        for i in 0..10u8 {
            store.set(vec![b'q', b'/', i], vec![i]);
        }
        store.set(b"r/0".to_vec(), vec![99]);

        let page = store.prefix_iter_limit(b"q/", 3, 4);
        let values: Vec<u8> = page.iter().map(|(_, v)| v[0]).collect();
        assert_eq!(values, vec![3, 4, 5, 6]);
        assert_eq!(store.prefix_iter_limit(b"q/", 8, 10).len(), 2);
        assert!(store.prefix_iter_limit(b"q/", 0, 0).is_empty());
        assert!(store.prefix_iter_limit(b"q/", 20, 5).is_empty());
        assert_eq!(store.prefix_count(b"q/"), 10);
        assert_eq!(store.prefix_count(b"s/"), 0);
    }

    #[test]
    fn test_limited_scan_through_cache_matches_full_scan() {
        let mut parent = MemStore::new();
        for i in 0..12u8 {
            parent.set(vec![b'q', b'/', i * 2], vec![i]);
        }

        let mut cache = CacheStore::new(&parent);
        // delete a run at the front so the first parent page is mostly hidden
        for i in 0..5u8 {
            cache.delete(&[b'q', b'/', i * 2]);
        }
        cache.set(vec![b'q', b'/', 3], vec![100]);
        cache.set(vec![b'q', b'/', 10], vec![110]);
        cache.set(vec![b'q', b'/', 31], vec![131]);
        cache.delete(&[b'q', b'/', 7]);

        let full = cache.prefix_iter(b"q/");
        assert_eq!(cache.prefix_count(b"q/"), full.len());
        for offset in 0..=full.len() + 1 {
            for limit in 0..=4 {
                let expected: Vec<_> = full.iter().skip(offset).take(limit).cloned().collect();
                assert_eq!(
                    cache.prefix_iter_limit(b"q/", offset, limit),
                    expected,
                    "offset {} limit {}",
                    offset,
                    limit
                );
            }
        }
    }

    #[test]
    fn test_dropped_cache_discards_writes() {
        let parent = MemStore::new();
        {
            let mut cache = CacheStore::new(&parent);
            cache.set(b"x".to_vec(), vec![1]);
            assert_eq!(cache.dirty_count(), 1);
        }
        assert!(parent.is_empty());
    }

    #[test]
    fn test_nested_cache_applies_to_outer() {
        let mut root = MemStore::new();
        let outer_writes = {
            let mut outer = CacheStore::new(&root);
            outer.set(b"a".to_vec(), vec![1]);
            let inner_writes = {
                let mut inner = CacheStore::new(&outer);
                inner.set(b"b".to_vec(), vec![2]);
                inner.into_writes()
            };
            apply_writes(&mut outer, inner_writes);
            outer.into_writes()
        };
        root.apply(outer_writes);
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn test_state_root_tracks_contents() {
        let mut a = MemStore::new();
        let mut b = MemStore::new();
        assert_eq!(a.state_root(), b.state_root());

        a.set(b"k".to_vec(), vec![1]);
        assert_ne!(a.state_root(), b.state_root());

        b.set(b"k".to_vec(), vec![1]);
        assert_eq!(a.state_root(), b.state_root());
    }

    #[test]
    fn test_typed_values() {
        let mut store = MemStore::new();
        set_value(&mut store, b"n/1".to_vec(), &42u64).unwrap();
        set_value(&mut store, b"n/2".to_vec(), &7u64).unwrap();
        assert_eq!(get_value::<u64>(&store, b"n/1").unwrap(), Some(42));
        assert_eq!(get_value::<u64>(&store, b"missing").unwrap(), None);
        assert_eq!(values_with_prefix::<u64>(&store, b"n/").unwrap(), vec![42, 7]);
        assert_eq!(values_with_prefix_limit::<u64>(&store, b"n/", 1, 5).unwrap(), vec![7]);
    }
}
