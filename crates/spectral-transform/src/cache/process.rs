//! In-process keyed cache with at-most-one build per key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use regrid_common::{RegridError, Result};

use super::CacheStats;

type Slot<T> = Arc<Mutex<Option<Arc<T>>>>;

/// Keyed cache of shared values.
///
/// The map lock is held only to find a key's slot; builds serialise on the
/// slot, so concurrent callers for one key see a single build while other
/// keys proceed.
pub struct ProcessCache<K, T> {
    slots: Mutex<HashMap<K, Slot<T>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn lock<U>(mutex: &Mutex<U>) -> Result<MutexGuard<'_, U>> {
    mutex
        .lock()
        .map_err(|_| RegridError::resource_unavailable("cache lock poisoned"))
}

impl<K: Eq + Hash + Clone + std::fmt::Debug, T> ProcessCache<K, T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Value for `key`, building it with `build` on first request.
    ///
    /// A failed build leaves the slot empty for the next caller.
    pub fn get_or_try_insert(&self, key: &K, build: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        let slot = {
            let mut slots = lock(&self.slots)?;
            slots.entry(key.clone()).or_default().clone()
        };
        let mut value = lock(&slot)?;
        if let Some(v) = value.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(v.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(?key, "Process cache miss");
        let built = Arc::new(build()?);
        *value = Some(built.clone());
        Ok(built)
    }

    /// Value for `key` if already built.
    pub fn get(&self, key: &K) -> Option<Arc<T>> {
        let slot = lock(&self.slots).ok()?.get(key)?.clone();
        let value = lock(&slot).ok()?;
        value.clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut slots) = lock(&self.slots) {
            slots.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Debug, T> Default for ProcessCache<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_single_build_per_key() {
        let cache: ProcessCache<u32, String> = ProcessCache::new();
        let builds = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let v = cache
                        .get_or_try_insert(&7, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            Ok("seven".to_string())
                        })
                        .unwrap();
                    assert_eq!(*v, "seven");
                });
            }
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 7);
    }

    #[test]
    fn test_failed_build_is_retried() {
        let cache: ProcessCache<u32, u32> = ProcessCache::new();
        assert!(cache
            .get_or_try_insert(&1, || Err(RegridError::resource_unavailable("no")))
            .is_err());
        assert_eq!(*cache.get_or_try_insert(&1, || Ok(5)).unwrap(), 5);
        assert_eq!(cache.get(&1).as_deref(), Some(&5));
    }

    #[test]
    fn test_distinct_keys() {
        let cache: ProcessCache<(usize, String), usize> = ProcessCache::new();
        let a = cache.get_or_try_insert(&(21, "N16".into()), || Ok(21)).unwrap();
        let b = cache.get_or_try_insert(&(42, "N16".into()), || Ok(42)).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
