//! Bounded in-memory LRU cache.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use super::{Cache, CacheKey};

/// In-process cache holding at most `capacity` entries.
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, Arc<[u8]>>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("MemoryCache")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.entries.lock().get(key).map(|v| v.to_vec())
    }

    fn set(&self, key: &CacheKey, value: &[u8]) {
        self.entries.lock().put(key.clone(), Arc::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::simple("t", "a");
        assert_eq!(cache.get(&key), None);

        cache.set(&key, b"value");
        assert_eq!(cache.get(&key), Some(b"value".to_vec()));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = MemoryCache::new(2);
        let (a, b, c) = (
            CacheKey::simple("t", "a"),
            CacheKey::simple("t", "b"),
            CacheKey::simple("t", "c"),
        );
        cache.set(&a, b"1");
        cache.set(&b, b"2");
        // touch a, so b becomes the eviction candidate
        assert!(cache.get(&a).is_some());
        cache.set(&c, b"3");

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn test_zero_capacity_still_holds_one() {
        let cache = MemoryCache::new(0);
        let key = CacheKey::simple("t", "a");
        cache.set(&key, b"x");
        assert_eq!(cache.len(), 1);
    }
}
