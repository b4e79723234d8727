//! In-memory TTL cache for group memberships.

use std::fmt;
use std::sync::atomic::{AtomicIsize, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use groupguard_core::error::{GroupsError, Result};
use groupguard_core::types::Entry;

/// Stored value plus the timer scheduled to expire it.
struct Slot {
    values: Vec<String>,
    /// Stamp of the `set` that wrote this slot
    generation: u64,
    expiry: Option<AbortHandle>,
}

impl Slot {
    fn cancel_expiry(&self) {
        if let Some(timer) = &self.expiry {
            timer.abort();
        }
    }
}

struct Inner {
    ttl: Duration,
    storage: DashMap<String, Slot>,
    /// Live key count, eventually consistent with `storage`
    size: AtomicIsize,
    generation: AtomicU64,
    expirations: AtomicU64,
    purges: AtomicU64,
}

impl Inner {
    fn remove(&self, key: &str) -> bool {
        match self.storage.remove(key) {
            Some((_, slot)) => {
                slot.cancel_expiry();
                self.size.fetch_sub(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Removes `key` only if it still holds the write that scheduled this timer.
    fn expire(&self, key: &str, generation: u64) {
        let removed = self
            .storage
            .remove_if(key, |_, slot| slot.generation == generation)
            .is_some();

        if removed {
            self.size.fetch_sub(1, Ordering::SeqCst);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            debug!(key, generation, "Cache entry expired");
        } else {
            trace!(key, generation, "Stale expiry ignored");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for slot in self.storage.iter() {
            slot.cancel_expiry();
        }
    }
}

/// Concurrent key → group list cache with self-expiring entries.
///
/// Cloning is cheap and every clone shares the same storage.
///
/// # Expiry
///
/// Each stored entry gets its own timer task on the ambient Tokio runtime.
/// Re-setting a key aborts the previous timer and starts a new one; purging a
/// key aborts its timer. A TTL of zero disables expiry entirely, and entries
/// then live until purged.
#[derive(Clone)]
pub struct TtlCache {
    inner: Arc<Inner>,
}

impl TtlCache {
    /// Creates an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                storage: DashMap::new(),
                size: AtomicIsize::new(0),
                generation: AtomicU64::new(0),
                expirations: AtomicU64::new(0),
                purges: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Looks up `keys`, returning a copy of each entry found.
    ///
    /// Found entries keep the order of `keys`; missing keys are skipped.
    pub fn get<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Entry> {
        keys.iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.inner
                    .storage
                    .get(key)
                    .map(|slot| Entry::new(key, slot.values.clone()))
            })
            .collect()
    }

    /// Stores `entries`, scheduling each one to expire after the TTL.
    ///
    /// Entries without values are skipped. The given entries are handed back
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`GroupsError::CacheWrite`] when a TTL is configured but there is no
    /// Tokio runtime to run the expiry timers. Nothing is stored in that case.
    pub fn set(&self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let runtime = if self.inner.ttl.is_zero() {
            None
        } else {
            let handle = Handle::try_current().map_err(|e| {
                GroupsError::CacheWrite(format!("no runtime to schedule expiry: {e}"))
            })?;
            Some(handle)
        };

        for entry in &entries {
            if !entry.has_values() {
                trace!(key = %entry.key, "Skipping entry without values");
                continue;
            }
            self.store(entry, runtime.as_ref());
        }

        Ok(entries)
    }

    /// Removes `keys` from the cache. Missing keys are ignored.
    pub fn purge<K: AsRef<str>>(&self, keys: &[K]) {
        for key in keys {
            let key = key.as_ref();
            if self.inner.remove(key) {
                self.inner.purges.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cache entry purged");
            }
        }
    }

    /// Purges every entry.
    pub fn clear(&self) {
        let keys: Vec<String> = self
            .inner
            .storage
            .iter()
            .map(|slot| slot.key().clone())
            .collect();
        self.purge(&keys);
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.size.load(Ordering::SeqCst).max(0) as usize
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            expirations: self.inner.expirations.load(Ordering::Relaxed),
            purges: self.inner.purges.load(Ordering::Relaxed),
            ttl_ms: u64::try_from(self.inner.ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn store(&self, entry: &Entry, runtime: Option<&Handle>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let slot = Slot {
            values: entry.values.clone(),
            generation,
            expiry: None,
        };

        match self.inner.storage.insert(entry.key.clone(), slot) {
            Some(previous) => previous.cancel_expiry(),
            None => {
                self.inner.size.fetch_add(1, Ordering::SeqCst);
            }
        }

        let Some(runtime) = runtime else {
            return;
        };

        let timer = self.schedule_expiry(runtime, entry.key.clone(), generation);
        match self.inner.storage.get_mut(&entry.key) {
            Some(mut slot) if slot.generation == generation => slot.expiry = Some(timer),
            // Overwritten or already gone: this timer has nothing left to expire.
            _ => timer.abort(),
        }
    }

    fn schedule_expiry(&self, runtime: &Handle, key: String, generation: u64) -> AbortHandle {
        let inner = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;

        runtime
            .spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Some(inner) = inner.upgrade() {
                    inner.expire(&key, generation);
                }
            })
            .abort_handle()
    }
}

impl fmt::Display for TtlCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TtlCache")
    }
}

impl fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.inner.ttl)
            .field("len", &self.len())
            .finish()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live entries
    pub entries: usize,
    /// Entries removed by their expiry timer
    pub expirations: u64,
    /// Entries removed by an explicit purge
    pub purges: u64,
    /// Configured TTL in milliseconds
    pub ttl_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, values: &[&str]) -> Entry {
        Entry::new(key, values.iter().map(|v| v.to_string()).collect())
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = TtlCache::new(Duration::from_secs(60));
        assert!(cache.get(&["nobody@example.com"]).is_empty());
    }

    #[tokio::test]
    async fn test_cache_set_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let stored = entry("a", &["g1", "g2"]);

        let returned = cache.set(vec![stored.clone()]).unwrap();
        assert_eq!(returned, vec![stored.clone()]);
        assert_eq!(cache.get(&["a"]), vec![stored]);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_skips_empty_values() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let returned = cache.set(vec![entry("a", &[])]).unwrap();

        assert_eq!(returned.len(), 1);
        assert!(cache.get(&["a"]).is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_get_preserves_key_order() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache
            .set(vec![entry("a", &["g1"]), entry("b", &["g2"]), entry("c", &["g3"])])
            .unwrap();

        let found = cache.get(&["c", "missing", "a"]);
        let keys: Vec<&str> = found.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_cache_returns_copies() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(vec![entry("a", &["g1"])]).unwrap();

        let mut found = cache.get(&["a"]);
        found[0].values.push("injected".into());

        assert_eq!(cache.get(&["a"]), vec![entry("a", &["g1"])]);
    }

    #[tokio::test]
    async fn test_cache_ttl_expiration() {
        let cache = TtlCache::new(Duration::from_millis(50));
        cache.set(vec![entry("a", &["g1"])]).unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get(&["a"]).is_empty());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_cache_refresh_not_removed_by_stale_timer() {
        let cache = TtlCache::new(Duration::from_millis(200));
        cache.set(vec![entry("a", &["old"])]).unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.set(vec![entry("a", &["new"])]).unwrap();

        // The first write's timer would have fired by now.
        tokio::time::sleep(Duration::from_millis(130)).await;
        assert_eq!(cache.get(&["a"]), vec![entry("a", &["new"])]);
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get(&["a"]).is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_cache_purge() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(vec![entry("a", &["g1"]), entry("b", &["g2"])]).unwrap();

        cache.purge(&["a"]);

        assert!(cache.get(&["a"]).is_empty());
        assert_eq!(cache.get(&["b"]).len(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().purges, 1);
    }

    #[tokio::test]
    async fn test_cache_purge_missing_key() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(vec![entry("a", &["g1"])]).unwrap();

        cache.purge(&["missing", "also-missing"]);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().purges, 0);
    }

    #[tokio::test]
    async fn test_cache_purge_then_reset_survives_old_timer() {
        let cache = TtlCache::new(Duration::from_millis(100));
        cache.set(vec![entry("a", &["g1"])]).unwrap();
        cache.purge(&["a"]);

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.set(vec![entry("a", &["g2"])]).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&["a"]), vec![entry("a", &["g2"])]);
    }

    #[tokio::test]
    async fn test_cache_purge_aborts_timer() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(vec![entry("a", &["g1"])]).unwrap();
        let timer = cache.inner.storage.get("a").unwrap().expiry.clone().unwrap();

        cache.purge(&["a"]);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(timer.is_finished());
    }

    #[tokio::test]
    async fn test_dropping_cache_aborts_pending_timers() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(vec![entry("a", &["g1"]), entry("b", &["g2"])]).unwrap();
        let timers: Vec<AbortHandle> = ["a", "b"]
            .iter()
            .map(|key| cache.inner.storage.get(*key).unwrap().expiry.clone().unwrap())
            .collect();
        assert!(timers.iter().all(|timer| !timer.is_finished()));

        drop(cache);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(timers.iter().all(AbortHandle::is_finished));
    }

    #[tokio::test]
    async fn test_live_clone_keeps_timers_running() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let other = cache.clone();
        cache.set(vec![entry("a", &["g1"])]).unwrap();
        let timer = cache.inner.storage.get("a").unwrap().expiry.clone().unwrap();

        drop(cache);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!timer.is_finished());
        assert_eq!(other.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set(vec![entry("a", &["g1"]), entry("b", &["g2"])]).unwrap();

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get(&["a", "b"]).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_set_distinct_keys() {
        use tokio::task::JoinSet;

        let cache = TtlCache::new(Duration::from_secs(60));
        let mut tasks = JoinSet::new();

        for i in 0..100 {
            let cache = cache.clone();
            tasks.spawn(async move {
                cache.set(vec![entry(&format!("user{i}"), &["g"])]).unwrap();
            });
        }

        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        let keys: Vec<String> = (0..100).map(|i| format!("user{i}")).collect();
        assert_eq!(cache.get(&keys).len(), 100);
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_zero_ttl_is_permanent_without_runtime() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.set(vec![entry("a", &["g1"])]).unwrap();

        assert_eq!(cache.get(&["a"]).len(), 1);
        cache.purge(&["a"]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_without_runtime_fails() {
        let cache = TtlCache::new(Duration::from_secs(1));
        let err = cache.set(vec![entry("a", &["g1"])]).unwrap_err();

        assert!(matches!(err, GroupsError::CacheWrite(_)));
        assert!(cache.get(&["a"]).is_empty());
    }

    #[test]
    fn test_cache_display_and_stats() {
        let cache = TtlCache::new(Duration::from_millis(1500));
        assert_eq!(cache.to_string(), "TtlCache");

        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.ttl_ms, 1500);
    }

    #[test]
    fn test_stats_ttl_saturates() {
        let cache = TtlCache::new(Duration::MAX);
        assert_eq!(cache.stats().ttl_ms, u64::MAX);
    }
}
