//! Concurrent key-value map with atomic compare-style operations.
//!
//! `ConcurrentMap` wraps a sharded `DashMap` and exposes the operations the
//! router registries are written against: `load_or_store` for lazy creation,
//! `remove_if` for pruning an entry only when it is still empty, and a
//! snapshot `range` that never holds a shard lock while the visitor runs.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Thread-safe map from `K` to `V`.
///
/// Reads return clones of the stored value, so `V` is usually cheap to clone
/// (an `Arc`, a name, a small set).
pub struct ConcurrentMap<K, V> {
    inner: DashMap<K, V>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Insert or overwrite the value for `key`.
    pub fn store(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Return a clone of the value for `key`, if present.
    pub fn load<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// Return the existing value for `key`, or store `value` if absent.
    ///
    /// The boolean is `true` when the key was already present (and `value`
    /// was discarded).
    pub fn load_or_store(&self, key: K, value: V) -> (V, bool) {
        match self.inner.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), true),
            Entry::Vacant(entry) => (entry.insert(value).value().clone(), false),
        }
    }

    /// Remove `key` and return the value it held.
    pub fn load_and_delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.remove(key).map(|(_, value)| value)
    }

    /// Remove `key` only if `predicate` holds for its current value.
    ///
    /// The predicate runs under the entry's shard lock, so no writer can slip
    /// in between the check and the removal. Returns whether the entry was
    /// removed.
    pub fn remove_if<Q>(&self, key: &Q, predicate: impl FnOnce(&V) -> bool) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .remove_if(key, |_, value| predicate(value))
            .is_some()
    }

    /// Like [`remove_if`](Self::remove_if), but the predicate may edit the
    /// value first. Edits are kept when the entry survives.
    pub fn remove_if_mut<Q>(&self, key: &Q, predicate: impl FnOnce(&mut V) -> bool) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .remove_if_mut(key, |_, value| predicate(value))
            .is_some()
    }

    /// Insert `init()` if `key` is absent, then apply `modify` to the value.
    ///
    /// Creation and modification happen under one shard lock, so a racing
    /// `remove_if` observes either no entry or the modified one.
    pub fn modify_or_insert<R>(
        &self,
        key: K,
        init: impl FnOnce() -> V,
        modify: impl FnOnce(&mut V) -> R,
    ) -> R {
        let mut entry = self.inner.entry(key).or_insert_with(init);
        modify(entry.value_mut())
    }

    /// Visit every entry until `visit` returns `false`.
    ///
    /// Iterates over a snapshot, so the visitor may call back into the map
    /// (including for the key it is visiting) without deadlocking. Entries
    /// added or removed during the walk may or may not be seen.
    pub fn range(&self, mut visit: impl FnMut(&K, &V) -> bool) {
        for (key, value) in self.snapshot() {
            if !visit(&key, &value) {
                break;
            }
        }
    }

    /// Clone every entry out of the map.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.inner
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Clone every key out of the map.
    pub fn keys(&self) -> Vec<K> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentMap")
            .field("len", &self.inner.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn store_and_load() {
        let map = ConcurrentMap::new();
        map.store("a".to_string(), 1);
        assert_eq!(map.load("a"), Some(1));
        assert_eq!(map.load("b"), None);

        map.store("a".to_string(), 5);
        assert_eq!(map.load("a"), Some(5));
    }

    #[test]
    fn load_or_store_keeps_existing_value() {
        let map = ConcurrentMap::new();
        map.store("a".to_string(), 1);

        let (value, loaded) = map.load_or_store("a".to_string(), 2);
        assert!(loaded);
        assert_eq!(value, 1);

        let (value, loaded) = map.load_or_store("b".to_string(), 2);
        assert!(!loaded);
        assert_eq!(value, 2);
        assert_eq!(map.load("b"), Some(2));
    }

    #[test]
    fn load_and_delete_removes_entry() {
        let map = ConcurrentMap::new();
        map.store("a".to_string(), 1);

        assert_eq!(map.load_and_delete("a"), Some(1));
        assert_eq!(map.load("a"), None);
        assert_eq!(map.load_and_delete("a"), None);
    }

    #[test]
    fn remove_if_respects_predicate() {
        let map = ConcurrentMap::new();
        map.store("b".to_string(), 2);

        assert!(!map.remove_if("b", |value| *value == 3));
        assert_eq!(map.load("b"), Some(2));

        assert!(map.remove_if("b", |value| *value == 2));
        assert_eq!(map.load("b"), None);

        assert!(!map.remove_if("missing", |_| true));
    }

    #[test]
    fn remove_if_mut_keeps_edits_on_surviving_entry() {
        let map: ConcurrentMap<String, HashSet<String>> = ConcurrentMap::new();
        map.modify_or_insert("g".to_string(), HashSet::new, |members| {
            members.insert("a".to_string());
            members.insert("b".to_string());
        });

        let removed = map.remove_if_mut("g", |members| {
            members.remove("a");
            members.is_empty()
        });
        assert!(!removed);
        assert_eq!(map.load("g").unwrap().len(), 1);

        let removed = map.remove_if_mut("g", |members| {
            members.remove("b");
            members.is_empty()
        });
        assert!(removed);
        assert!(!map.contains_key("g"));
    }

    #[test]
    fn range_stops_early_and_sums() {
        let map = ConcurrentMap::new();
        for i in 0..10 {
            map.store(i, i);
        }

        let mut sum = 0;
        map.range(|_, value| {
            sum += *value;
            true
        });
        assert_eq!(sum, 45);

        let mut visited = 0;
        map.range(|_, _| {
            visited += 1;
            visited < 3
        });
        assert_eq!(visited, 3);
    }

    #[test]
    fn range_visitor_may_write_back_into_map() {
        let map = ConcurrentMap::new();
        for i in 0..16 {
            map.store(i, i);
        }

        map.range(|key, value| {
            map.store(key + 100, *value);
            map.load_and_delete(key);
            true
        });

        assert_eq!(map.len(), 16);
        assert!(map.keys().iter().all(|key| *key >= 100));
    }

    #[test]
    fn len_and_clear() {
        let map = ConcurrentMap::new();
        assert!(map.is_empty());
        map.store("c".to_string(), 3);
        map.store("d".to_string(), 4);
        assert_eq!(map.len(), 2);

        map.clear();
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn concurrent_store_and_load() {
        const THREADS: usize = 16;
        const OPS: usize = 1000;

        let map = Arc::new(ConcurrentMap::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let map = Arc::clone(&map);
                std::thread::spawn(move || {
                    for j in 0..OPS {
                        let key = t * OPS + j;
                        map.store(key, key);
                        assert_eq!(map.load(&key), Some(key));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(map.len(), THREADS * OPS);
    }

    #[test]
    fn concurrent_load_or_store_has_one_winner() {
        let map = Arc::new(ConcurrentMap::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let map = Arc::clone(&map);
                std::thread::spawn(move || !map.load_or_store("only".to_string(), t).1)
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn debug_impl() {
        let map: ConcurrentMap<String, u8> = ConcurrentMap::new();
        let debug = format!("{map:?}");
        assert!(debug.contains("ConcurrentMap"));
        assert!(debug.contains("len"));
    }
}
