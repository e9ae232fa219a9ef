//! Generic TTL cache (C10), shared by the metric feature provider (C2) and
//! the deployment detector (C4).
//!
//! Reads past expiry refetch rather than serving stale data (§3 invariants,
//! §8 testable properties). Writes are serialized behind a single mutex —
//! acceptable per §5's "eventually consistent across readers" policy.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `Some(value)` only if a fresh (non-expired) entry exists.
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: K, value: V) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub async fn invalidate(&self, key: &K) {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
    }

    /// Fetch a fresh value, computing and caching it on a miss.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }
        let value = fetch().await?;
        self.put(key, value.clone()).await;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_entry_is_served() {
        let cache: TtlCache<&str, i32> = TtlCache::new(Duration::from_secs(60));
        cache.put("a", 1).await;
        assert_eq!(cache.get(&"a").await, Some(1));
    }

    #[tokio::test]
    async fn expired_entry_is_not_served() {
        let cache: TtlCache<&str, i32> = TtlCache::new(Duration::from_millis(10));
        cache.put("a", 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get(&"a").await, None);
    }

    #[tokio::test]
    async fn invalidate_forces_a_miss() {
        let cache: TtlCache<&str, i32> = TtlCache::new(Duration::from_secs(60));
        cache.put("a", 1).await;
        cache.invalidate(&"a").await;
        assert_eq!(cache.get(&"a").await, None);
    }

    #[tokio::test]
    async fn get_or_fetch_caches_on_miss() {
        let cache: TtlCache<&str, i32> = TtlCache::new(Duration::from_secs(60));
        let calls = std::sync::atomic::AtomicU32::new(0);

        for _ in 0..3 {
            let result: Result<i32, ()> = cache
                .get_or_fetch("k", || async {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(result, Ok(42));
        }

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
