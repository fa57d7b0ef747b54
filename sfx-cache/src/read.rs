//! Cache read metadata.

use std::time::Duration;
use tokio::time::Instant;

/// Result of a read-through lookup, carrying where the value came from.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: Instant,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// Value served from the cache.
    pub fn from_cache(value: T, cached_at: Instant) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: true,
        }
    }

    /// Value just fetched from the remote collaborator.
    pub fn from_fetch(value: T) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            was_cache_hit: false,
        }
    }

    /// Take the value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Borrow the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the value was stored or fetched.
    pub fn cached_at(&self) -> Instant {
        self.cached_at
    }

    /// Time since the value was stored.
    pub fn staleness(&self) -> Duration {
        Instant::now().saturating_duration_since(self.cached_at)
    }

    /// Served from the cache.
    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    /// Fetched from the remote collaborator.
    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    /// Transform the value, keeping the read metadata.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_staleness_tracks_clock() {
        let read = CacheRead::from_cache("v", Instant::now());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(read.staleness(), Duration::from_secs(5));
        assert!(read.was_cache_hit());
    }

    #[tokio::test]
    async fn test_from_fetch_is_miss() {
        let read = CacheRead::from_fetch(42).map(|v| v.to_string());
        assert!(read.was_cache_miss());
        assert_eq!(read.into_value(), "42");
    }
}
