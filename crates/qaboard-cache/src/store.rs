//! Snapshot cache using moka
//!
//! Stores the last payload read for each (collection, role) partition together
//! with the instant it was stored. Freshness is decided per read: the caller
//! passes the maximum age it accepts, so the same entry can be too old for a
//! primary read yet good enough for a fallback read with a larger ceiling.
//!
//! Entries older than the store-wide retention ceiling are evicted lazily when
//! read. A read that merely finds an entry older than its own `max_age` leaves
//! the entry in place for later fallback reads.

use crate::clock::{age, Clock, SystemClock};
use crate::key::{CacheKey, CollectionKind};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default namespace
pub const DEFAULT_NAMESPACE: &str = "qa";

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace every key lives under
    pub namespace: String,
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Age in seconds after which an entry is unusable even as a fallback
    pub retention_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_capacity: 64,
            retention_secs: 3_600,
        }
    }
}

impl CacheConfig {
    /// Retention ceiling
    #[inline]
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

/// One stored snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Partition
    pub key: CacheKey,
    /// Snapshot as received
    pub payload: Value,
    /// When it was written
    pub stored_at: DateTime<Utc>,
}

/// Role-partitioned snapshot store
#[derive(Debug, Clone)]
pub struct CacheStore {
    inner: Cache<CacheKey, Arc<CacheEntry>>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl CacheStore {
    /// Create store
    #[must_use]
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.retention())
                .build(),
            clock,
            config,
        }
    }

    /// Namespace
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Payload for `key` if it is younger than `max_age`
    pub async fn read(&self, key: &CacheKey, max_age: Duration) -> Option<Value> {
        let name = key.qualified(&self.config.namespace);
        let Some(entry) = self.inner.get(key).await else {
            debug!(key = %name, "cache miss");
            return None;
        };

        let entry_age = age(self.clock.now(), entry.stored_at);
        if entry_age >= self.config.retention() {
            debug!(key = %name, age_ms = millis(entry_age), "evicting entry past retention");
            self.inner.invalidate(key).await;
            return None;
        }
        if entry_age >= max_age {
            debug!(
                key = %name,
                age_ms = millis(entry_age),
                max_age_ms = millis(max_age),
                "cache entry too old for this read"
            );
            return None;
        }

        debug!(key = %name, age_ms = millis(entry_age), "cache hit");
        Some(entry.payload.clone())
    }

    /// Typed read; a payload of the wrong shape counts as absent
    pub async fn read_as<T: DeserializeOwned>(&self, key: &CacheKey, max_age: Duration) -> Option<T> {
        let payload = self.read(key, max_age).await?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(
                    key = %key.qualified(&self.config.namespace),
                    error = %e,
                    "cached payload has unexpected shape, treating as absent"
                );
                None
            }
        }
    }

    /// Overwrite the entry for `key`, stamped now
    pub async fn write(&self, key: CacheKey, payload: Value) {
        let entry = CacheEntry {
            key,
            payload,
            stored_at: self.clock.now(),
        };
        self.inner.insert(key, Arc::new(entry)).await;
    }

    /// Typed write; returns `false` if the value could not be serialized
    pub async fn write_as<T: Serialize>(&self, key: CacheKey, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(payload) => {
                self.write(key, payload).await;
                true
            }
            Err(e) => {
                warn!(key = %key.qualified(&self.config.namespace), error = %e, "failed to cache data");
                false
            }
        }
    }

    /// Evict one entry, or every entry in the namespace when `key` is `None`
    pub async fn evict(&self, key: Option<&CacheKey>) {
        match key {
            Some(key) => self.inner.invalidate(key).await,
            None => {
                for collection in CollectionKind::ALL {
                    self.evict_partitions(collection).await;
                }
                self.inner.invalidate_all();
            }
        }
    }

    /// Evict every role partition of a collection
    pub async fn evict_partitions(&self, collection: CollectionKind) {
        for key in CacheKey::partitions(collection) {
            self.inner.invalidate(&key).await;
        }
    }

    /// Raw entry regardless of age
    pub async fn entry(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.inner.get(key).await
    }

    /// Check if an entry exists regardless of age
    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.inner.get(key).await.is_some()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks().await;
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for CacheStore {
    /// Default configuration on the system clock
    fn default() -> Self {
        Self::new(CacheConfig::default(), Arc::new(SystemClock))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::key::ViewerRole;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const FRESH: Duration = Duration::from_secs(30);
    const FALLBACK: Duration = Duration::from_secs(300);

    fn store() -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (CacheStore::new(CacheConfig::default(), clock.clone()), clock)
    }

    fn questions(role: ViewerRole) -> CacheKey {
        CacheKey::new(CollectionKind::Questions, role)
    }

    #[tokio::test]
    async fn write_then_read_is_fresh() {
        let (cache, _clock) = store();
        let key = questions(ViewerRole::Public);

        cache.write(key, json!([{"id": "Q1"}])).await;

        assert_eq!(cache.read(&key, FRESH).await, Some(json!([{"id": "Q1"}])));
    }

    #[tokio::test]
    async fn read_past_max_age_is_absent_but_entry_survives() {
        let (cache, clock) = store();
        let key = questions(ViewerRole::Public);
        cache.write(key, json!(["v"])).await;

        clock.advance(Duration::from_secs(31));

        assert_eq!(cache.read(&key, FRESH).await, None);
        assert!(cache.contains(&key).await);
        assert_eq!(cache.read(&key, FALLBACK).await, Some(json!(["v"])));
    }

    #[tokio::test]
    async fn age_equal_to_max_age_is_expired() {
        let (cache, clock) = store();
        let key = questions(ViewerRole::Admin);
        cache.write(key, json!([])).await;

        clock.advance(FRESH);

        assert_eq!(cache.read(&key, FRESH).await, None);
    }

    #[tokio::test]
    async fn entries_past_retention_are_evicted_on_read() {
        let (cache, clock) = store();
        let key = questions(ViewerRole::Public);
        cache.write(key, json!(["old"])).await;

        clock.advance(Duration::from_secs(3_600));

        assert_eq!(cache.read(&key, Duration::from_secs(7_200)).await, None);
        assert!(!cache.contains(&key).await);
    }

    #[tokio::test]
    async fn writes_overwrite_and_restamp() {
        let (cache, clock) = store();
        let key = questions(ViewerRole::Public);
        cache.write(key, json!(["first"])).await;
        clock.advance(Duration::from_secs(20));
        cache.write(key, json!(["second"])).await;
        clock.advance(Duration::from_secs(20));

        assert_eq!(cache.read(&key, FRESH).await, Some(json!(["second"])));
        assert_eq!(cache.stats().await.entry_count, 1);
    }

    #[tokio::test]
    async fn roles_do_not_share_snapshots() {
        let (cache, _clock) = store();
        cache.write(questions(ViewerRole::Public), json!(["public"])).await;

        assert_eq!(cache.read(&questions(ViewerRole::Admin), FRESH).await, None);
    }

    #[tokio::test]
    async fn shape_mismatch_reads_as_absent() {
        let (cache, _clock) = store();
        let key = CacheKey::new(CollectionKind::Topics, ViewerRole::Public);
        cache.write(key, json!({"not": "a list"})).await;

        let typed: Option<Vec<String>> = cache.read_as(&key, FRESH).await;
        assert_eq!(typed, None);

        cache.write_as(key, &vec!["General".to_string()]).await;
        let typed: Option<Vec<String>> = cache.read_as(&key, FRESH).await;
        assert_eq!(typed, Some(vec!["General".to_string()]));
    }

    #[tokio::test]
    async fn evict_one_partition_or_everything() {
        let (cache, _clock) = store();
        let topics = CacheKey::new(CollectionKind::Topics, ViewerRole::Public);
        cache.write(questions(ViewerRole::Public), json!([])).await;
        cache.write(questions(ViewerRole::Admin), json!([])).await;
        cache.write(topics, json!([])).await;

        cache.evict_partitions(CollectionKind::Questions).await;
        assert!(!cache.contains(&questions(ViewerRole::Public)).await);
        assert!(!cache.contains(&questions(ViewerRole::Admin)).await);
        assert!(cache.contains(&topics).await);

        cache.evict(Some(&topics)).await;
        assert!(!cache.contains(&topics).await);

        cache.write(topics, json!([])).await;
        cache.evict(None).await;
        assert!(!cache.contains(&topics).await);
    }

    #[tokio::test]
    async fn default_store_uses_default_namespace() {
        let cache = CacheStore::default();
        assert_eq!(cache.namespace(), DEFAULT_NAMESPACE);
    }
}
