use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
}

/// A fresh value served from a [`TtlCache`], with how old it is.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<V> {
    pub value: V,
    pub age: TimeDelta,
    pub ttl: Duration,
}

/// Time-boxed map. Entries are served while `now - created_at <= ttl` and
/// evicted by the first lookup that finds them stale; there is no background sweep.
///
/// Each `get`/`put` holds the lock for the whole operation, so a reader never
/// observes a half-written entry. Concurrent misses on one key are not coalesced.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn put(&self, key: K, value: V, now: DateTime<Utc>) {
        self.entries.lock().insert(
            key,
            CacheEntry {
                value,
                created_at: now,
            },
        );
    }

    pub fn get(&self, key: &K, now: DateTime<Utc>) -> Option<CacheHit<V>> {
        let ttl = self.ttl;
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;

        // Entries stamped in the future (clock adjustments) count as brand new.
        let age = (now - entry.created_at).max(TimeDelta::zero());
        let max_age = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        if age <= max_age {
            return Some(CacheHit {
                value: entry.value.clone(),
                age,
                ttl,
            });
        }

        entries.remove(key);
        None
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Memoizes an async fetch behind a [`TtlCache`]. The cache key is derived
/// from the call arguments by an explicit `key_of` function.
pub struct Memoizer<A: ?Sized, K, V> {
    cache: TtlCache<K, V>,
    key_of: fn(&A) -> K,
    label: &'static str,
}

impl<A, K, V> Memoizer<A, K, V>
where
    A: ?Sized,
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(label: &'static str, ttl: Duration, key_of: fn(&A) -> K) -> Self {
        Self {
            cache: TtlCache::new(ttl),
            key_of,
            label,
        }
    }

    /// Returns the cached value for `args`, or runs `fetch` and caches its success.
    /// Failures are returned as-is and never cached.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, args: &A, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key = (self.key_of)(args);
        if let Some(hit) = self.cache.get(&key, Utc::now()) {
            debug!("{} cache hit (age {}s)", self.label, hit.age.num_seconds());
            return Ok(hit.value);
        }

        debug!("{} cache miss", self.label);
        let value = fetch().await?;
        self.cache.put(key, value.clone(), Utc::now());
        Ok(value)
    }

    pub fn cache(&self) -> &TtlCache<K, V> {
        &self.cache
    }
}
