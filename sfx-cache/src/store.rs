//! TTL data cache.
//!
//! Holds raw fetch results (record lists, health snapshots), never tree
//! nodes. It is a peer of the node tree: nodes read and write it, and the
//! session orchestrating a refresh clears it independently.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sfx_core::config::DEFAULT_CACHE_TTL_MS;
use sfx_core::EntityKind;
use tokio::time::Instant;

use crate::key::CacheKey;
use crate::read::CacheRead;
use crate::stats::{CacheStats, Counters};

type Value = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) > ttl
    }
}

/// TTL-keyed memo store shared by every node of one explorer session.
///
/// Expiry is lazy: an entry older than the TTL is removed by the read that
/// finds it. [`DataCache::purge_expired`] evicts eagerly.
pub struct DataCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    counters: Counters,
    /// Bumped under the entries lock by every invalidation.
    generation: AtomicU64,
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_CACHE_TTL_MS))
    }
}

impl std::fmt::Debug for DataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish()
    }
}

impl DataCache {
    /// Empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            counters: Counters::default(),
            generation: AtomicU64::new(0),
        }
    }

    /// Configured entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entries lock for a write that removes data.
    fn entries_for_invalidation(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        let entries = self.entries();
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries
    }

    /// Live entry for `key`, evicting it first if it has expired.
    fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries();
        let entry = entries.get(key)?;
        if entry.is_expired(Instant::now(), self.ttl) {
            entries.remove(key);
            self.counters.expired(1);
            tracing::trace!(key, "cache entry expired");
            return None;
        }
        Some(entry.clone())
    }

    fn read<T>(&self, key: &str) -> Option<(Arc<T>, Instant)>
    where
        T: Any + Send + Sync,
    {
        let Some(entry) = self.live_entry(key) else {
            self.counters.miss();
            return None;
        };
        match entry.value.downcast::<T>() {
            Ok(value) => {
                self.counters.hit();
                Some((value, entry.stored_at))
            }
            Err(_) => {
                tracing::debug!(
                    key,
                    expected = std::any::type_name::<T>(),
                    "cache entry holds a different type"
                );
                self.counters.miss();
                None
            }
        }
    }

    /// Value stored under `key`, or `None` if absent, expired, or stored as
    /// a different type.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.read(key).map(|(value, _)| value)
    }

    /// Store `value` under `key`, replacing any previous entry and resetting
    /// its age.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.set_arc(key, Arc::new(value));
    }

    /// Like [`DataCache::set`] for a value that is already shared.
    pub fn set_arc<T>(&self, key: impl Into<String>, value: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        self.entries().insert(key.into(), entry);
    }

    /// Whether a live entry exists for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries_for_invalidation().remove(key).is_some();
        if removed {
            self.counters.invalidated(1);
        }
        removed
    }

    /// Drop every entry whose key starts with `prefix`. Returns the count.
    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        let removed = {
            let mut entries = self.entries_for_invalidation();
            let before = entries.len();
            entries.retain(|key, _| !key.starts_with(prefix));
            before - entries.len()
        };
        self.counters.invalidated(removed as u64);
        tracing::debug!(prefix, removed, "invalidated cache prefix");
        removed
    }

    /// Drop `key` itself and every key nested below it.
    pub fn invalidate_scope(&self, key: &CacheKey) -> usize {
        let exact = usize::from(self.invalidate(&key.to_string()));
        exact + self.invalidate_by_prefix(&key.scope())
    }

    /// Drop the scope of `key` plus every nested collection fetched below
    /// the same parent chain.
    ///
    /// `services:c:App` also evicts `partitions:c:App:*` and
    /// `replicas:c:App:*`.
    pub fn invalidate_subtree(&self, key: &CacheKey) -> usize {
        let nested: usize = key
            .kind()
            .descendants()
            .iter()
            .map(|kind| {
                let below = key.with_kind(*kind);
                self.invalidate_by_prefix(&below.scope())
            })
            .sum();
        self.invalidate_scope(key) + nested
    }

    /// Drop every entry belonging to one cluster.
    pub fn invalidate_cluster(&self, cluster: &str) -> usize {
        EntityKind::ALL
            .iter()
            .map(|kind| {
                let key = CacheKey::new(*kind, cluster);
                self.invalidate_scope(&key)
            })
            .sum()
    }

    /// Drop everything.
    pub fn clear(&self) {
        let removed = {
            let mut entries = self.entries_for_invalidation();
            let count = entries.len();
            entries.clear();
            count
        };
        self.counters.invalidated(removed as u64);
        tracing::debug!(removed, "cleared data cache");
    }

    /// Eagerly evict expired entries. Returns the count.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut entries = self.entries();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
            before - entries.len()
        };
        self.counters.expired(removed as u64);
        removed
    }

    /// Number of entries physically present (expired entries count until
    /// they are read or purged).
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// True when no entries are physically present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot plus the current entry count.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len() as u64)
    }

    /// Read-through lookup: serve a live entry, otherwise run `fetch` and
    /// store its result.
    ///
    /// Failures are returned to the caller and never cached. No lock is held
    /// while `fetch` runs, so another caller may populate the key meanwhile;
    /// the later write wins. A result whose fetch overlapped any
    /// invalidation is returned but not stored.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<CacheRead<Arc<T>>, E>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some((value, stored_at)) = self.read::<T>(key) {
            return Ok(CacheRead::from_cache(value, stored_at));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let value = Arc::new(fetch().await?);
        let entry = CacheEntry {
            value: Arc::clone(&value) as Value,
            stored_at: Instant::now(),
        };
        let mut entries = self.entries();
        if self.generation.load(Ordering::SeqCst) == generation {
            entries.insert(key.to_string(), entry);
        } else {
            tracing::debug!(key, "cache invalidated during fetch, result not stored");
        }
        drop(entries);
        Ok(CacheRead::from_fetch(value))
    }
}
