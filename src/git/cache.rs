use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::git::source::Metadata;

/// Cache of per-file metadata lookups.
pub type MetadataCache = BoundedCache<Option<Metadata>>;

struct Inner<V> {
    entries: HashMap<String, V>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    /// Bumped by every `invalidate_all`.
    epoch: u64,
}

/// A string-keyed cache holding at most `capacity` entries. When full, the
/// oldest insertion is evicted first.
pub struct BoundedCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                epoch: 0,
            }),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: V) {
        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, key, value);
    }

    fn insert_locked(&self, inner: &mut Inner<V>, key: &str, value: V) {
        if self.capacity == 0 {
            return;
        }
        if inner.entries.insert(key.to_string(), value).is_some() {
            return;
        }
        inner.order.push_back(key.to_string());
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    /// Return the cached value for `key`, or compute, store and return it.
    /// Errors are returned as-is and nothing is cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &str,
        load: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        let epoch = {
            let inner = self.inner.lock();
            if let Some(value) = inner.entries.get(key) {
                return Ok(value.clone());
            }
            inner.epoch
        };
        // Loading happens outside the lock. A value loaded across an
        // invalidation may be stale and is returned but not stored.
        let value = load()?;
        let mut inner = self.inner.lock();
        if inner.epoch == epoch {
            self.insert_locked(&mut inner, key, value.clone());
        }
        Ok(value)
    }

    pub fn invalidate_all(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.epoch = inner.epoch.wrapping_add(1);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest_first() {
        let cache = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_get_or_try_insert_with() {
        let cache: BoundedCache<u64> = BoundedCache::new(4);
        let loaded: Result<u64, String> = cache.get_or_try_insert_with("k", || Ok(7));
        assert_eq!(loaded, Ok(7));

        let cached: Result<u64, String> =
            cache.get_or_try_insert_with("k", || panic!("should be cached"));
        assert_eq!(cached, Ok(7));

        let failed: Result<u64, String> =
            cache.get_or_try_insert_with("e", || Err("boom".to_string()));
        assert!(failed.is_err());
        assert_eq!(cache.get("e"), None);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = BoundedCache::new(4);
        cache.insert("a", "x".to_string());
        cache.insert("b", "y".to_string());
        cache.invalidate_all();
        assert!(cache.is_empty());
        cache.insert("c", "z".to_string());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_load_across_invalidation_is_not_stored() {
        let cache: BoundedCache<u64> = BoundedCache::new(4);
        let loaded: Result<u64, String> = cache.get_or_try_insert_with("k", || {
            cache.invalidate_all();
            Ok(1)
        });
        assert_eq!(loaded, Ok(1));
        assert_eq!(cache.get("k"), None);

        let reloaded: Result<u64, String> = cache.get_or_try_insert_with("k", || Ok(2));
        assert_eq!(reloaded, Ok(2));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = BoundedCache::new(0);
        cache.insert("a", 1);
        assert!(cache.is_empty());
    }
}
