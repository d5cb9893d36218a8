//! Query cache for fetched lists.
//!
//! Results are stored under a [`QueryKey`] (path-like segments such as
//! `["boarding", "date", "2024-10-07"]`) and reused until they go stale or a
//! mutation invalidates their prefix.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::Result;

/// Identifies a cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Build a key from its segments.
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Whether this key starts with `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        prefix.len() <= self.0.len() && self.0.iter().zip(prefix).all(|(a, b)| a == b)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

struct Entry {
    value: Box<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

/// In-memory cache of query results with a fixed stale time.
pub struct QueryCache {
    entries: HashMap<QueryKey, Entry>,
    stale_after: Duration,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .field("stale_after", &self.stale_after)
            .finish()
    }
}

impl QueryCache {
    /// Create a cache whose entries go stale after `stale_after`.
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            stale_after,
        }
    }

    /// Return the fresh cached value for `key`, or run `fetch` and cache it.
    ///
    /// Failed fetches are not cached.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`.
    pub async fn get_or_fetch<T, F, Fut>(&mut self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get_fresh::<T>(&key) {
            trace!(key = %key, "Query cache hit");
            return Ok(value);
        }

        debug!(key = %key, "Query cache miss, fetching");
        let value = fetch().await?;
        self.entries.insert(
            key,
            Entry {
                value: Box::new(value.clone()),
                fetched_at: Instant::now(),
            },
        );
        Ok(value)
    }

    /// Cached value for `key` if present, fresh and of type `T`.
    #[must_use]
    pub fn get_fresh<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        let entry = self.entries.get(key)?;
        if entry.fetched_at.elapsed() >= self.stale_after {
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    /// Drop every entry whose key starts with `prefix`. Returns how many.
    pub fn invalidate(&mut self, prefix: &[&str]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(prefix = %prefix.join("/"), removed, "Invalidated cached queries");
        }
        removed
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached entries, fresh or stale.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::Error;

    fn key(segments: &[&str]) -> QueryKey {
        QueryKey::new(segments.iter().copied())
    }

    #[test]
    fn test_key_prefix() {
        let k = key(&["boarding", "date", "2024-10-07"]);
        assert!(k.starts_with(&["boarding"]));
        assert!(k.starts_with(&["boarding", "date"]));
        assert!(!k.starts_with(&["disembarking"]));
        assert!(!k.starts_with(&["boarding", "date", "2024-10-07", "x"]));
        assert_eq!(k.to_string(), "boarding/date/2024-10-07");
    }

    #[tokio::test]
    async fn test_second_fetch_hits_cache() {
        let calls = AtomicUsize::new(0);
        let mut cache = QueryCache::new(Duration::from_secs(60));

        for _ in 0..3 {
            let value: Vec<i64> = cache
                .get_or_fetch(key(&["plans"]), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let calls = AtomicUsize::new(0);
        let mut cache = QueryCache::new(Duration::from_secs(60));
        let fetch = || async {
            Ok::<_, Error>(calls.fetch_add(1, Ordering::SeqCst))
        };

        let first = cache
            .get_or_fetch(key(&["boarding", "date", "d"]), fetch)
            .await
            .unwrap();
        assert_eq!(cache.invalidate(&["boarding"]), 1);
        let second = cache
            .get_or_fetch(key(&["boarding", "date", "d"]), fetch)
            .await
            .unwrap();
        assert_eq!((first, second), (0, 1));
    }

    #[tokio::test]
    async fn test_invalidate_keeps_other_prefixes() {
        let mut cache = QueryCache::new(Duration::from_secs(60));
        cache
            .get_or_fetch(key(&["boarding", "x"]), || async { Ok(1u8) })
            .await
            .unwrap();
        cache
            .get_or_fetch(key(&["planning", "x"]), || async { Ok(2u8) })
            .await
            .unwrap();

        cache.invalidate(&["boarding"]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_fresh::<u8>(&key(&["planning", "x"])), Some(2));
    }

    #[tokio::test]
    async fn test_stale_entries_are_refetched() {
        let mut cache = QueryCache::new(Duration::ZERO);
        cache
            .get_or_fetch(key(&["k"]), || async { Ok(1u32) })
            .await
            .unwrap();
        assert!(cache.get_fresh::<u32>(&key(&["k"])).is_none());
        let value = cache
            .get_or_fetch(key(&["k"]), || async { Ok(2u32) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let mut cache = QueryCache::new(Duration::from_secs(60));
        let result: Result<u32> = cache
            .get_or_fetch(key(&["k"]), || async { Err(Error::api(500, "boom")) })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_wrong_type_is_a_miss() {
        let mut cache = QueryCache::new(Duration::from_secs(60));
        cache.entries.insert(
            key(&["k"]),
            Entry {
                value: Box::new(5u8),
                fetched_at: Instant::now(),
            },
        );
        assert!(cache.get_fresh::<String>(&key(&["k"])).is_none());
        cache.clear();
        assert!(cache.is_empty());
    }
}
