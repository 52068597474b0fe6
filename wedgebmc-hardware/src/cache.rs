//! Telemetry cache
//!
//! Short-lived memoization keyed by logical reading, so independent callers
//! polling the same sensor do not each pay for a console exchange.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    captured: Instant,
}

/// Per-key value with a capture time, expiring after a caller-given TTL
///
/// The map lock is never held while fetching, so a slow console exchange
/// does not block readers of other keys. Two concurrent misses on one key
/// may both fetch; the later result wins.
pub struct TelemetryCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TelemetryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value for `key` if it was captured less than `ttl` ago
    pub fn get(&self, key: &K, ttl: Duration) -> Option<V> {
        self.lock()
            .get(key)
            .filter(|entry| entry.captured.elapsed() < ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().insert(
            key,
            Entry {
                value,
                captured: Instant::now(),
            },
        );
    }

    /// Cached value, or the result of `fetch` which is then cached
    pub fn get_or_fetch<F>(&self, key: K, ttl: Duration, fetch: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key, ttl) {
            return value;
        }
        let value = fetch();
        self.insert(key, value.clone());
        value
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but a `None` from `fetch`
    /// is not cached.
    pub fn get_or_try_fetch<F>(&self, key: K, ttl: Duration, fetch: F) -> Option<V>
    where
        F: FnOnce() -> Option<V>,
    {
        if let Some(value) = self.get(&key, ttl) {
            return Some(value);
        }
        let value = fetch()?;
        self.insert(key, value.clone());
        Some(value)
    }

    pub fn invalidate(&self, key: &K) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<K, V> Default for TelemetryCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::thread;

    #[test]
    fn test_fetch_once_within_ttl_then_again_after() {
        let cache = TelemetryCache::new();
        let fetches = Cell::new(0);
        let ttl = Duration::from_millis(50);
        let fetch = || {
            fetches.set(fetches.get() + 1);
            fetches.get() * 100
        };

        assert_eq!(cache.get_or_fetch("psu1", ttl, fetch), 100);
        assert_eq!(cache.get_or_fetch("psu1", ttl, fetch), 100);
        assert_eq!(fetches.get(), 1);

        thread::sleep(Duration::from_millis(70));
        assert_eq!(cache.get_or_fetch("psu1", ttl, fetch), 200);
        assert_eq!(fetches.get(), 2);
    }

    #[test]
    fn test_keys_are_independent() {
        let cache = TelemetryCache::new();
        let ttl = Duration::from_secs(10);

        cache.insert(1u8, "a");
        cache.insert(2u8, "b");
        assert_eq!(cache.get(&1, ttl), Some("a"));
        assert_eq!(cache.get(&2, ttl), Some("b"));
        assert_eq!(cache.len(), 2);

        cache.invalidate(&1);
        assert_eq!(cache.get(&1, ttl), None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_try_fetch_is_not_cached() {
        let cache: TelemetryCache<&str, u32> = TelemetryCache::default();
        let ttl = Duration::from_secs(10);

        assert_eq!(cache.get_or_try_fetch("fan", ttl, || None), None);
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_try_fetch("fan", ttl, || Some(7)), Some(7));
        assert_eq!(cache.get_or_try_fetch("fan", ttl, || Some(8)), Some(7));
    }

    #[test]
    fn test_zero_ttl_always_fetches() {
        let cache = TelemetryCache::new();
        cache.insert("k", 1);
        assert_eq!(cache.get_or_fetch("k", Duration::ZERO, || 2), 2);
    }
}
