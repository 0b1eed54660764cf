//! Bounded LRU map
//!
//! Entries are kept in recency order inside an `IndexMap`: the front is the least
//! recently used entry, a hit moves its entry to the back, eviction shifts off the front.

use std::hash::Hash;

use indexmap::{Equivalent, IndexMap};

pub struct LruCache<K, V> {
    map: IndexMap<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Look up and mark as most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let idx = self.map.get_index_of(key)?;
        let last = self.map.len() - 1;
        self.map.move_index(idx, last);
        self.map.get_index(last).map(|(_, v)| v)
    }

    /// Look up without touching recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.get(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.contains_key(key)
    }

    /// Insert as most recently used, evicting the least recently used entry when full.
    /// Returns the evicted entry.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(idx) = self.map.get_index_of(&key) {
            let last = self.map.len() - 1;
            self.map.move_index(idx, last);
            if let Some((_, slot)) = self.map.get_index_mut(last) {
                *slot = value;
            }
            return None;
        }

        let evicted = if self.map.len() >= self.capacity {
            self.map.shift_remove_index(0)
        } else {
            None
        };
        self.map.insert(key, value);
        evicted
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
