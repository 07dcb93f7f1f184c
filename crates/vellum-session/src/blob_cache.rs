//! Bounded cache of decrypted item content
//!
//! The ports only ever hold sealed bytes; plaintext lives here and in the
//! caller's hands. Entries are evicted oldest-first, a hit refreshes the
//! entry, and locking the session clears the whole cache. Evicted plaintext
//! is zeroized before the allocation is returned.

use std::collections::{HashMap, VecDeque};

use uuid::Uuid;
use zeroize::Zeroize;

type BlobKey = (Uuid, Uuid);

/// LRU over decrypted blobs, keyed by `(notebook, item)`.
#[derive(Debug)]
pub struct BlobCache {
    capacity: usize,
    queue: VecDeque<BlobKey>,
    arena: HashMap<BlobKey, Vec<u8>>,
}

impl BlobCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: VecDeque::new(),
            arena: HashMap::new(),
        }
    }

    /// Look up an item and mark it most recently used.
    pub fn get(&mut self, notebook: Uuid, item: Uuid) -> Option<Vec<u8>> {
        let key = (notebook, item);
        if !self.arena.contains_key(&key) {
            return None;
        }
        self.touch(key);
        self.arena.get(&key).cloned()
    }

    /// Insert or replace an item, evicting the oldest entries once the
    /// cache is over capacity. A zero-capacity cache stores nothing.
    pub fn insert(&mut self, notebook: Uuid, item: Uuid, bytes: Vec<u8>) {
        if self.capacity == 0 {
            return;
        }
        let key = (notebook, item);
        if let Some(mut previous) = self.arena.insert(key, bytes) {
            previous.zeroize();
            self.touch(key);
            return;
        }
        self.queue.push_back(key);
        while self.arena.len() > self.capacity {
            if let Some(oldest) = self.queue.pop_front() {
                if let Some(mut evicted) = self.arena.remove(&oldest) {
                    evicted.zeroize();
                }
            }
        }
    }

    pub fn remove(&mut self, notebook: Uuid, item: Uuid) {
        let key = (notebook, item);
        if let Some(mut dropped) = self.arena.remove(&key) {
            dropped.zeroize();
            self.queue.retain(|k| *k != key);
        }
    }

    /// Drop every entry belonging to one notebook.
    pub fn remove_notebook(&mut self, notebook: Uuid) {
        self.arena.retain(|(nb, _), bytes| {
            if *nb == notebook {
                bytes.zeroize();
                false
            } else {
                true
            }
        });
        self.queue.retain(|(nb, _)| *nb != notebook);
    }

    pub fn clear(&mut self) {
        for (_, mut bytes) in self.arena.drain() {
            bytes.zeroize();
        }
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    fn touch(&mut self, key: BlobKey) {
        self.queue.retain(|k| *k != key);
        self.queue.push_back(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u128) -> (Uuid, Uuid) {
        (Uuid::from_u128(1), Uuid::from_u128(n))
    }

    #[test]
    fn test_hit_and_miss() {
        let mut cache = BlobCache::new(4);
        let (nb, item) = ids(1);
        cache.insert(nb, item, b"plain".to_vec());

        assert_eq!(cache.get(nb, item), Some(b"plain".to_vec()));
        assert_eq!(cache.get(nb, Uuid::from_u128(99)), None);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut cache = BlobCache::new(2);
        let nb = Uuid::from_u128(1);
        for n in 1..=3u128 {
            cache.insert(nb, Uuid::from_u128(n), vec![n as u8]);
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(nb, Uuid::from_u128(1)), None, "oldest evicted");
        assert!(cache.get(nb, Uuid::from_u128(2)).is_some());
        assert!(cache.get(nb, Uuid::from_u128(3)).is_some());
    }

    #[test]
    fn test_access_refreshes_eviction_order() {
        let mut cache = BlobCache::new(2);
        let nb = Uuid::from_u128(1);
        cache.insert(nb, Uuid::from_u128(1), vec![1]);
        cache.insert(nb, Uuid::from_u128(2), vec![2]);

        // Touch 1 so 2 becomes the eviction candidate
        assert!(cache.get(nb, Uuid::from_u128(1)).is_some());
        cache.insert(nb, Uuid::from_u128(3), vec![3]);

        assert!(cache.get(nb, Uuid::from_u128(1)).is_some());
        assert_eq!(cache.get(nb, Uuid::from_u128(2)), None);
    }

    #[test]
    fn test_reinsert_replaces_and_refreshes() {
        let mut cache = BlobCache::new(2);
        let nb = Uuid::from_u128(1);
        cache.insert(nb, Uuid::from_u128(1), vec![1]);
        cache.insert(nb, Uuid::from_u128(2), vec![2]);
        cache.insert(nb, Uuid::from_u128(1), vec![9]);
        cache.insert(nb, Uuid::from_u128(3), vec![3]);

        assert_eq!(cache.get(nb, Uuid::from_u128(1)), Some(vec![9]));
        assert_eq!(cache.get(nb, Uuid::from_u128(2)), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_remove_notebook_is_selective() {
        let mut cache = BlobCache::new(8);
        let doomed = Uuid::from_u128(1);
        let kept = Uuid::from_u128(2);
        cache.insert(doomed, Uuid::from_u128(1), vec![1]);
        cache.insert(doomed, Uuid::from_u128(2), vec![2]);
        cache.insert(kept, Uuid::from_u128(1), vec![3]);

        cache.remove_notebook(doomed);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(kept, Uuid::from_u128(1)).is_some());
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut cache = BlobCache::new(4);
        cache.insert(Uuid::from_u128(1), Uuid::from_u128(1), vec![1]);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get(Uuid::from_u128(1), Uuid::from_u128(1)), None);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache = BlobCache::new(0);
        cache.insert(Uuid::from_u128(1), Uuid::from_u128(1), vec![1]);

        assert!(cache.is_empty());
        assert_eq!(cache.get(Uuid::from_u128(1), Uuid::from_u128(1)), None);
    }

    #[test]
    fn test_removed_entry_does_not_hold_queue_slot() {
        let mut cache = BlobCache::new(2);
        let nb = Uuid::from_u128(1);
        cache.insert(nb, Uuid::from_u128(1), vec![1]);
        cache.remove(nb, Uuid::from_u128(1));
        cache.insert(nb, Uuid::from_u128(2), vec![2]);
        cache.insert(nb, Uuid::from_u128(3), vec![3]);

        assert_eq!(cache.len(), 2, "removed key freed its slot");
        assert!(cache.get(nb, Uuid::from_u128(2)).is_some());
        assert!(cache.get(nb, Uuid::from_u128(3)).is_some());
    }
}
