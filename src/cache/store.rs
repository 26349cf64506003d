//! Bounded entry store composed with the recency index.
//!
//! Every key in `entries` has exactly one live slot in `recency` and vice
//! versa; all mutation goes through this type so the two never diverge.

use std::collections::HashMap;

use tracing::debug;

use super::entry::CacheEntry;
use super::key::short_key;
use super::recency::{RecencyIndex, SlotId};

#[derive(Debug)]
pub struct EntryStore {
    entries: HashMap<String, (SlotId, CacheEntry)>,
    recency: RecencyIndex,
    max_size: usize,
}

impl EntryStore {
    /// `max_size` is clamped to at least 1 so eviction always makes room.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: HashMap::with_capacity(max_size.min(4096)),
            recency: RecencyIndex::with_capacity(max_size.min(4096)),
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key).map(|(_, entry)| entry)
    }

    /// Mark `key` as used now: moves it to the front and bumps its access count.
    pub fn touch(&mut self, key: &str, now: u64) -> Option<&CacheEntry> {
        let (slot, entry) = self.entries.get_mut(key)?;
        self.recency.touch(*slot);
        entry.touch(now);
        Some(entry)
    }

    /// Insert or overwrite `entry`, returning whatever was evicted to make room.
    ///
    /// Overwriting an existing key counts as a touch and never evicts.
    pub fn put(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        if let Some((slot, existing)) = self.entries.get_mut(&entry.key) {
            self.recency.touch(*slot);
            *existing = entry;
            return None;
        }
        let evicted = if self.entries.len() >= self.max_size {
            self.evict_one()
        } else {
            None
        };
        let slot = self.recency.push_front(entry.key.clone());
        self.entries.insert(entry.key.clone(), (slot, entry));
        evicted
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let (slot, entry) = self.entries.remove(key)?;
        self.recency.remove(slot);
        Some(entry)
    }

    /// Evict the least recently touched entry.
    pub fn evict_one(&mut self) -> Option<CacheEntry> {
        let key = self.recency.pop_back()?;
        let (_, entry) = self.entries.remove(&key)?;
        debug!(key = %short_key(&key), "Evicting LRU cache entry");
        Some(entry)
    }

    /// Change the capacity, evicting LRU entries until the new bound holds.
    pub fn set_max_size(&mut self, max_size: usize) -> Vec<CacheEntry> {
        self.max_size = max_size.max(1);
        let mut evicted = Vec::new();
        while self.entries.len() > self.max_size {
            match self.evict_one() {
                Some(entry) => evicted.push(entry),
                None => break,
            }
        }
        evicted
    }

    /// Entries from most to least recently touched.
    pub fn iter_recent(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        self.recency.iter().filter_map(|key| self.get(key))
    }

    /// Entries from least to most recently touched.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        let keys: Vec<&str> = self.recency.iter().collect();
        keys.into_iter().rev().filter_map(|key| self.get(key))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::{derive_key, Scope};

    fn entry(prompt: &str, now: u64) -> CacheEntry {
        let scope = Scope::new("openai", "gpt-4o");
        CacheEntry::new(
            derive_key(&scope, prompt),
            &scope,
            prompt.into(),
            format!("resp-{prompt}"),
            None,
            None,
            now,
        )
    }

    fn prompts(store: &EntryStore) -> Vec<String> {
        store.iter_recent().map(|e| e.prompt.clone()).collect()
    }

    #[test]
    fn test_put_and_get() {
        let mut store = EntryStore::new(3);
        let e = entry("a", 0);
        let key = e.key.clone();
        assert!(store.put(e).is_none());
        assert_eq!(store.get(&key).unwrap().response, "resp-a");
        assert!(store.contains(&key));
    }

    #[test]
    fn test_eviction_picks_least_recently_touched() {
        let mut store = EntryStore::new(3);
        let a = entry("a", 0);
        let a_key = a.key.clone();
        store.put(a);
        store.put(entry("b", 1));
        store.put(entry("c", 2));
        store.touch(&a_key, 3);
        let evicted = store.put(entry("d", 4)).unwrap();
        assert_eq!(evicted.prompt, "b");
        assert_eq!(store.len(), 3);
        assert_eq!(prompts(&store), vec!["d", "a", "c"]);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut store = EntryStore::new(2);
        store.put(entry("a", 0));
        store.put(entry("b", 1));
        assert!(store.put(entry("a", 2)).is_none());
        assert_eq!(store.len(), 2);
        assert_eq!(prompts(&store), vec!["a", "b"]);
    }

    #[test]
    fn test_touch_bumps_access_count() {
        let mut store = EntryStore::new(2);
        let e = entry("a", 0);
        let key = e.key.clone();
        store.put(e);
        store.touch(&key, 10);
        let touched = store.touch(&key, 20).unwrap();
        assert_eq!(touched.access_count, 3);
        assert_eq!(touched.last_accessed_at, 20);
        assert!(store.touch("missing", 30).is_none());
    }

    #[test]
    fn test_remove_keeps_recency_consistent() {
        let mut store = EntryStore::new(3);
        let b = entry("b", 1);
        let b_key = b.key.clone();
        store.put(entry("a", 0));
        store.put(b);
        store.put(entry("c", 2));
        assert!(store.remove(&b_key).is_some());
        assert!(store.remove(&b_key).is_none());
        assert_eq!(prompts(&store), vec!["c", "a"]);
        assert_eq!(store.evict_one().unwrap().prompt, "a");
    }

    #[test]
    fn test_never_exceeds_max_size() {
        let mut store = EntryStore::new(4);
        for i in 0..50 {
            store.put(entry(&format!("p{i}"), i));
            assert!(store.len() <= 4);
        }
        assert_eq!(prompts(&store), vec!["p49", "p48", "p47", "p46"]);
    }

    #[test]
    fn test_set_max_size_shrinks_lru_first() {
        let mut store = EntryStore::new(4);
        for p in ["a", "b", "c", "d"] {
            store.put(entry(p, 0));
        }
        let evicted: Vec<String> = store
            .set_max_size(2)
            .into_iter()
            .map(|e| e.prompt)
            .collect();
        assert_eq!(evicted, vec!["a", "b"]);
        assert_eq!(prompts(&store), vec!["d", "c"]);
    }

    #[test]
    fn test_iter_oldest_first() {
        let mut store = EntryStore::new(3);
        for p in ["a", "b", "c"] {
            store.put(entry(p, 0));
        }
        let order: Vec<&str> = store
            .iter_oldest_first()
            .map(|e| e.prompt.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_zero_max_size_clamped() {
        let mut store = EntryStore::new(0);
        assert_eq!(store.max_size(), 1);
        store.put(entry("a", 0));
        store.put(entry("b", 0));
        assert_eq!(store.len(), 1);
    }
}
