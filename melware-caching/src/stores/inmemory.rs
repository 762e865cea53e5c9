//! In-memory store with per-entry TTL and an optional sweeper task

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    cache::{CacheStore, Expiration},
    stats::{SharedStatsCollector, StatsCollector},
    CacheResult, CacheStats,
};

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

type EntryMap = Arc<RwLock<HashMap<String, StoredEntry>>>;

/// In-memory byte store.
///
/// Expired entries are dropped lazily on read. When built with a cleanup
/// interval a background task also sweeps them periodically; the task is
/// aborted when the store is dropped.
pub struct InMemoryStore {
    entries: EntryMap,
    default_ttl: Option<Duration>,
    stats: SharedStatsCollector,
    cleanup_task: Option<JoinHandle<()>>,
}

impl InMemoryStore {
    /// Create a store without a sweeper. `None` means `Expiration::Default`
    /// never expires.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            stats: Arc::new(StatsCollector::default()),
            cleanup_task: None,
        }
    }

    /// Create a store that sweeps expired entries every `cleanup_interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_cleanup(default_ttl: Option<Duration>, cleanup_interval: Duration) -> Self {
        let mut store = Self::new(default_ttl);
        store.cleanup_task = Some(spawn_cleanup_task(
            store.entries.clone(),
            store.stats.clone(),
            cleanup_interval,
        ));
        store
    }

    /// Drop every expired entry now, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries, &self.stats)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expires_at(&self, expiration: Expiration) -> Option<Instant> {
        let ttl = match expiration {
            Expiration::Default => self.default_ttl,
            Expiration::Never => None,
            Expiration::After(ttl) => Some(ttl),
        };
        // A deadline past what Instant can hold is treated as never
        ttl.and_then(|ttl| Instant::now().checked_add(ttl))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Drop for InMemoryStore {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
    }
}

fn purge(entries: &EntryMap, stats: &StatsCollector) -> usize {
    let now = Instant::now();
    let mut map = entries.write();
    let before = map.len();
    map.retain(|_, entry| !entry.is_expired(now));
    let removed = before - map.len();
    if removed > 0 {
        stats.record_expired(removed as u64);
    }
    removed
}

fn spawn_cleanup_task(entries: EntryMap, stats: SharedStatsCollector, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = purge(&entries, &stats);
            if removed > 0 {
                debug!("Swept {} expired cache entries", removed);
            }
        }
    })
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let result = match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                self.stats.record_expired(1);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        };

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Expiration) -> CacheResult<()> {
        let entry = StoredEntry {
            value,
            expires_at: self.expires_at(expiration),
        };
        self.entries.write().insert(key.to_string(), entry);
        self.stats.record_set();
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn stats(&self) -> Option<CacheStats> {
        Some(self.stats.snapshot(self.len()))
    }

    fn backend_name(&self) -> &'static str {
        "inmemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStoreExt;

    #[tokio::test]
    async fn test_basic_operations() {
        let store = InMemoryStore::new(None);

        store.set("key1", b"value1".to_vec(), Expiration::Default).await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some(b"value1".to_vec()));
        assert_eq!(store.get("key2").await.unwrap(), None);

        store.delete("key1").await.unwrap();
        assert_eq!(store.get("key1").await.unwrap(), None);

        // Deleting a missing key is fine
        store.delete("key1").await.unwrap();
    }

    #[tokio::test]
    async fn test_explicit_ttl() {
        let store = InMemoryStore::new(None);

        store
            .set("key1", b"value1".to_vec(), Duration::from_millis(50).into())
            .await
            .unwrap();
        assert!(store.contains_key("key1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_never_expires() {
        let store = InMemoryStore::new(Some(Duration::MAX));
        store.set("a", b"1".to_vec(), Expiration::Default).await.unwrap();
        store
            .set("b", b"2".to_vec(), Expiration::After(Duration::from_secs(u64::MAX)))
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("b").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn test_default_ttl_and_never() {
        let store = InMemoryStore::new(Some(Duration::from_millis(50)));

        store.set("short", b"a".to_vec(), Expiration::Default).await.unwrap();
        store.set("forever", b"b".to_vec(), Expiration::Never).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("forever").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_ttl() {
        let store = InMemoryStore::new(None);

        store
            .set("key", b"old".to_vec(), Duration::from_millis(20).into())
            .await
            .unwrap();
        store.set("key", b"new".to_vec(), Expiration::Never).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get("key").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryStore::new(None);
        store.set("a", b"1".to_vec(), Expiration::Never).await.unwrap();
        store.set("b", b"2".to_vec(), Expiration::Never).await.unwrap();
        assert_eq!(store.len(), 2);

        store.clear().await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryStore::new(None);
        store
            .set("gone", b"1".to_vec(), Duration::from_millis(10).into())
            .await
            .unwrap();
        store.set("kept", b"2".to_vec(), Expiration::Never).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().unwrap().expired, 1);
    }

    #[tokio::test]
    async fn test_cleanup_task_sweeps() {
        let store = InMemoryStore::with_cleanup(None, Duration::from_millis(20));
        store
            .set("gone", b"1".to_vec(), Duration::from_millis(10).into())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.entries.read().len(), 0);
        assert_eq!(store.stats().unwrap().expired, 1);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = InMemoryStore::new(None);
        let value = vec!["alpha".to_string(), "beta".to_string()];

        store.set_json("list", &value, Expiration::Never).await.unwrap();
        let loaded: Option<Vec<String>> = store.get_json("list").await.unwrap();
        assert_eq!(loaded, Some(value));

        store.set("broken", b"not json".to_vec(), Expiration::Never).await.unwrap();
        let err = store.get_json::<Vec<String>>("broken").await.unwrap_err();
        assert!(matches!(err, crate::CacheError::DeserializationError(_)));
    }

    #[tokio::test]
    async fn test_stats() {
        let store = InMemoryStore::new(None);

        store.set("key1", b"1".to_vec(), Expiration::Never).await.unwrap();
        store.set("key2", b"2".to_vec(), Expiration::Never).await.unwrap();

        store.get("key1").await.unwrap(); // Hit
        store.get("key2").await.unwrap(); // Hit
        store.get("key3").await.unwrap(); // Miss

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_gets, 3);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_sets, 2);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.hit_rate, 2.0 / 3.0);
    }
}
