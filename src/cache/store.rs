//! Cache Store Module
//!
//! Keyed storage of captured query results with capture-order eviction.

use std::collections::HashMap;

use serde::Serialize;

use crate::cache::CacheEntry;

// == Cache Store ==
/// Map from query name to its most recently completed fetch.
///
/// Eviction ranks entries by capture time (insertion or refresh order), not
/// by access time: reading an entry never protects it from eviction.
#[derive(Debug)]
pub struct CacheStore<T> {
    /// Query name to entry
    entries: HashMap<String, CacheEntry<T>>,
    /// Next write sequence number
    next_seq: u64,
    /// Capacity before eviction
    max_entries: usize,
    /// Share of entries dropped on overflow
    eviction_fraction: f64,
}

impl<T> CacheStore<T> {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `max_entries` - Number of entries allowed before eviction runs
    /// * `eviction_fraction` - Share of entries removed when it does
    pub fn new(max_entries: usize, eviction_fraction: f64) -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            max_entries,
            eviction_fraction,
        }
    }

    // == Get ==
    /// Looks up an entry without touching counters.
    pub fn get(&self, name: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(name)
    }

    // == Insert ==
    /// Stores `data` captured at `timestamp`, replacing any previous entry,
    /// then evicts if the store grew past capacity.
    ///
    /// Returns the names of evicted entries.
    pub fn insert(&mut self, name: &str, data: T, timestamp: u64) -> Vec<String>
    where
        T: Serialize,
    {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.entries
            .insert(name.to_string(), CacheEntry::capture(data, timestamp, seq));
        self.evict_overflow()
    }

    // == Evict Overflow ==
    /// Removes the oldest-captured entries once `len > max_entries`.
    ///
    /// Drops `eviction_fraction` of the store, and always at least enough to
    /// get back under capacity.
    fn evict_overflow(&mut self) -> Vec<String> {
        let len = self.entries.len();
        if len <= self.max_entries {
            return Vec::new();
        }

        let by_fraction = (len as f64 * self.eviction_fraction).floor() as usize;
        let count = by_fraction.max(len - self.max_entries).min(len);

        let mut ranked: Vec<(u64, u64, &String)> = self
            .entries
            .iter()
            .map(|(name, entry)| (entry.timestamp, entry.seq, name))
            .collect();
        ranked.sort_unstable();

        let victims: Vec<String> = ranked
            .into_iter()
            .take(count)
            .map(|(_, _, name)| name.clone())
            .collect();

        for name in &victims {
            self.entries.remove(name);
        }
        victims
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Contains ==
    /// Returns true if an entry is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_new() {
        let store: CacheStore<String> = CacheStore::new(100, 0.2);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_insert_and_get() {
        let mut store = CacheStore::new(100, 0.2);

        store.insert("categories", vec!["chat", "image"], 1_000);
        let entry = store.get("categories").unwrap();

        assert_eq!(entry.data, vec!["chat", "image"]);
        assert_eq!(entry.timestamp, 1_000);
        assert_eq!(store.len(), 1);
        assert!(store.contains("categories"));
    }

    #[test]
    fn test_store_get_nonexistent() {
        let store: CacheStore<u32> = CacheStore::new(100, 0.2);
        assert!(store.get("nonexistent").is_none());
    }

    #[test]
    fn test_store_overwrite_replaces_timestamp() {
        let mut store = CacheStore::new(100, 0.2);

        store.insert("sites", 1u32, 1_000);
        store.insert("sites", 2u32, 2_000);

        let entry = store.get("sites").unwrap();
        assert_eq!(entry.data, 2);
        assert_eq!(entry.timestamp, 2_000);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_evicts_oldest_fraction() {
        let mut store = CacheStore::new(10, 0.2);
        for i in 0..10u64 {
            assert!(store.insert(&format!("q{}", i), i, 100 + i).is_empty());
        }

        // 11 entries -> floor(11 * 0.2) = 2 removed
        let evicted = store.insert("q10", 10, 200);

        assert_eq!(evicted, vec!["q0".to_string(), "q1".to_string()]);
        assert_eq!(store.len(), 9);
        assert!(!store.contains("q0"));
        assert!(!store.contains("q1"));
        assert!(store.contains("q2"));
        assert!(store.contains("q10"));
    }

    #[test]
    fn test_store_eviction_ignores_reads() {
        let mut store = CacheStore::new(2, 0.2);
        store.insert("a", 1u8, 1);
        store.insert("b", 2u8, 2);

        // Reading "a" does not protect it
        assert!(store.get("a").is_some());
        let evicted = store.insert("c", 3u8, 3);

        assert_eq!(evicted, vec!["a".to_string()]);
    }

    #[test]
    fn test_store_refresh_moves_entry_to_back_of_eviction_order() {
        let mut store = CacheStore::new(2, 0.2);
        store.insert("a", 1u8, 1);
        store.insert("b", 2u8, 2);
        store.insert("a", 10u8, 3);

        let evicted = store.insert("c", 3u8, 4);
        assert_eq!(evicted, vec!["b".to_string()]);
    }

    #[test]
    fn test_store_equal_timestamps_evict_in_write_order() {
        let mut store = CacheStore::new(3, 0.2);
        for name in ["x", "y", "z"] {
            store.insert(name, 0u8, 500);
        }

        let evicted = store.insert("w", 0u8, 500);
        assert_eq!(evicted, vec!["x".to_string()]);
    }

    #[test]
    fn test_store_small_capacity_always_gets_back_under_limit() {
        let mut store = CacheStore::new(1, 0.2);
        store.insert("a", 1u8, 1);
        store.insert("b", 2u8, 2);

        assert_eq!(store.len(), 1);
        assert!(store.contains("b"));
    }
}
