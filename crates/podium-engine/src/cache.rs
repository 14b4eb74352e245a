//! Read-through cache with enumerated-key invalidation.
//!
//! Every cacheable value lives under one of three namespaces
//! ([`CachePrefix`]), and every key the layer has ever written is
//! recorded in a per-namespace registry. Invalidation enumerates the
//! registry and deletes exactly those keys, so no backend pattern scan
//! (`KEYS`/`SCAN`) is ever issued.
//!
//! The layer is fail-open throughout: a cache that cannot be reached
//! degrades reads to the compute path and never fails a request.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use core::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use podium_types::PlayerId;

/// Errors surfaced by a cache backend.
///
/// These never escape the cache layer; they are logged and the layer
/// falls back to computing.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached or refused the operation.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A cached value could not be serialized or deserialized.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The closed set of cache namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CachePrefix {
    /// Paginated top-N pages.
    Top,
    /// Per-player rank views.
    Rank,
    /// The pre-serialized stream snapshot.
    Snapshot,
}

impl CachePrefix {
    /// Namespace segment used in rendered keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Rank => "rank",
            Self::Snapshot => "snapshot",
        }
    }
}

/// A structured cache key. Rendering is the only way to produce a key
/// string, which is what keeps the namespace closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
    /// One page of the leaderboard.
    Top {
        /// Page size.
        limit: u32,
        /// Entries skipped before the page.
        offset: u32,
    },
    /// One player's rank view.
    Rank(PlayerId),
    /// The broadcast snapshot.
    SnapshotAll,
}

impl CacheKey {
    /// The namespace this key belongs to.
    pub const fn prefix(self) -> CachePrefix {
        match self {
            Self::Top { .. } => CachePrefix::Top,
            Self::Rank(_) => CachePrefix::Rank,
            Self::SnapshotAll => CachePrefix::Snapshot,
        }
    }

    /// Render the backend key string.
    pub fn render(self) -> String {
        match self {
            Self::Top { limit, offset } => format!("top:{limit}:{offset}"),
            Self::Rank(player) => format!("rank:{player}"),
            Self::SnapshotAll => String::from("snapshot:all"),
        }
    }
}

impl core::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Per-namespace time-to-live configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    /// TTL for top-N pages.
    pub top: Duration,
    /// TTL for per-player rank views.
    pub rank: Duration,
    /// TTL for the stream snapshot.
    pub snapshot: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            top: Duration::from_secs(300),
            rank: Duration::from_secs(60),
            snapshot: Duration::from_secs(15),
        }
    }
}

impl CacheTtls {
    /// The TTL applied to keys in `prefix`.
    pub const fn for_prefix(&self, prefix: CachePrefix) -> Duration {
        match prefix {
            CachePrefix::Top => self.top,
            CachePrefix::Rank => self.rank,
            CachePrefix::Snapshot => self.snapshot,
        }
    }
}

/// Raw string-valued cache operations a backend must provide.
pub trait CacheBackend: Send + Sync + 'static {
    /// Fetch a value, `None` on miss or expiry.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CacheError>> + Send;

    /// Store a value with a TTL.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Remove a value. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Liveness probe.
    fn ping(&self) -> impl Future<Output = Result<(), CacheError>> + Send;
}

#[derive(Debug)]
struct CacheInner<B> {
    backend: B,
    ttls: CacheTtls,
    /// Every key written since the last invalidation, per namespace.
    registry: Mutex<HashMap<CachePrefix, BTreeSet<String>>>,
}

/// The read-through cache layer.
///
/// Cheap to clone; clones share the backend and the key registry, so an
/// invalidation spawned from one clone covers keys written through any
/// other.
#[derive(Debug)]
pub struct CacheLayer<B> {
    inner: Arc<CacheInner<B>>,
}

impl<B> Clone for CacheLayer<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CacheBackend> CacheLayer<B> {
    /// Wrap a backend with the given TTL policy.
    pub fn new(backend: B, ttls: CacheTtls) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                backend,
                ttls,
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Serve `key` from the cache, or run `compute`, cache its result,
    /// and return it.
    ///
    /// Cache failures on either side are logged and absorbed; the only
    /// error this returns is `compute`'s own.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: CacheKey, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let rendered = key.render();

        match self.inner.backend.get(&rendered).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!(key = %rendered, "cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    tracing::debug!(key = %rendered, error = %err, "cached value undecodable, recomputing");
                }
            },
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(key = %rendered, error = %err, "cache read failed, falling through");
            }
        }

        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(encoded) => {
                let ttl = self.inner.ttls.for_prefix(key.prefix());
                match self.inner.backend.set(&rendered, &encoded, ttl).await {
                    Ok(()) => self.remember(key.prefix(), rendered).await,
                    Err(err) => {
                        tracing::warn!(key = %rendered, error = %err, "cache write failed, serving computed value");
                    }
                }
            }
            Err(err) => {
                tracing::debug!(key = %rendered, error = %err, "value not cacheable");
            }
        }

        Ok(value)
    }

    /// Delete every key ever written under `prefix`.
    ///
    /// Enumerates the registry; never issues a backend scan. Delete
    /// failures are logged and skipped, leaving those keys to expire by
    /// TTL.
    pub async fn invalidate_prefix(&self, prefix: CachePrefix) {
        let keys = {
            let mut registry = self.inner.registry.lock().await;
            registry.remove(&prefix).unwrap_or_default()
        };

        let mut dropped = 0_usize;
        for key in &keys {
            match self.inner.backend.delete(key).await {
                Ok(()) => dropped = dropped.saturating_add(1),
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "cache delete failed, key left to expire");
                }
            }
        }
        tracing::debug!(
            prefix = prefix.as_str(),
            registered = keys.len(),
            dropped,
            "cache namespace invalidated"
        );
    }

    /// Liveness of the backend.
    pub async fn ping(&self) -> bool {
        self.inner.backend.ping().await.is_ok()
    }

    async fn remember(&self, prefix: CachePrefix, key: String) {
        let mut registry = self.inner.registry.lock().await;
        registry.entry(prefix).or_default().insert(key);
    }
}

/// An in-process [`CacheBackend`] with per-key expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    values: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CacheError>> + Send {
        async move {
            let mut values = self.values.lock().await;
            match values.get(key) {
                Some((_, Some(expiry))) if *expiry <= Instant::now() => {
                    values.remove(key);
                    Ok(None)
                }
                Some((value, _)) => Ok(Some(value.clone())),
                None => Ok(None),
            }
        }
    }

    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        async move {
            let expiry = Instant::now().checked_add(ttl);
            let mut values = self.values.lock().await;
            values.insert(key.to_owned(), (value.to_owned(), expiry));
            Ok(())
        }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>> + Send {
        async move {
            let mut values = self.values.lock().await;
            values.remove(key);
            Ok(())
        }
    }

    fn ping(&self) -> impl Future<Output = Result<(), CacheError>> + Send {
        async move { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_into_their_namespace() {
        let player = PlayerId::new();
        assert_eq!(CacheKey::Top { limit: 100, offset: 0 }.render(), "top:100:0");
        assert_eq!(CacheKey::Rank(player).render(), format!("rank:{player}"));
        assert_eq!(CacheKey::SnapshotAll.render(), "snapshot:all");

        assert_eq!(CacheKey::Top { limit: 1, offset: 2 }.prefix(), CachePrefix::Top);
        assert_eq!(CacheKey::Rank(player).prefix(), CachePrefix::Rank);
        assert_eq!(CacheKey::SnapshotAll.prefix(), CachePrefix::Snapshot);
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let layer = CacheLayer::new(MemoryCache::new(), CacheTtls::default());
        let key = CacheKey::Top { limit: 10, offset: 0 };

        let first: Result<u32, CacheError> = layer.get_or_compute(key, || async { Ok(7) }).await;
        assert!(matches!(first, Ok(7)));

        // Compute returning a different value proves the hit path.
        let second: Result<u32, CacheError> = layer.get_or_compute(key, || async { Ok(99) }).await;
        assert!(matches!(second, Ok(7)));
    }

    #[tokio::test]
    async fn invalidation_only_touches_its_namespace() {
        let layer = CacheLayer::new(MemoryCache::new(), CacheTtls::default());
        let top = CacheKey::Top { limit: 10, offset: 0 };
        let rank = CacheKey::Rank(PlayerId::new());

        let _: Result<u32, CacheError> = layer.get_or_compute(top, || async { Ok(1) }).await;
        let _: Result<u32, CacheError> = layer.get_or_compute(rank, || async { Ok(2) }).await;

        layer.invalidate_prefix(CachePrefix::Top).await;

        let top_after: Result<u32, CacheError> =
            layer.get_or_compute(top, || async { Ok(11) }).await;
        let rank_after: Result<u32, CacheError> =
            layer.get_or_compute(rank, || async { Ok(22) }).await;
        assert!(matches!(top_after, Ok(11)));
        assert!(matches!(rank_after, Ok(2)));
    }

    #[tokio::test]
    async fn expired_entries_miss() {
        let layer = CacheLayer::new(
            MemoryCache::new(),
            CacheTtls {
                top: Duration::ZERO,
                ..CacheTtls::default()
            },
        );
        let key = CacheKey::Top { limit: 10, offset: 0 };

        let _: Result<u32, CacheError> = layer.get_or_compute(key, || async { Ok(1) }).await;
        let after: Result<u32, CacheError> = layer.get_or_compute(key, || async { Ok(2) }).await;
        assert!(matches!(after, Ok(2)));
    }

    struct CountingCache {
        inner: MemoryCache,
        deletes: Arc<core::sync::atomic::AtomicUsize>,
    }

    impl CacheBackend for CountingCache {
        fn get(
            &self,
            key: &str,
        ) -> impl Future<Output = Result<Option<String>, CacheError>> + Send {
            self.inner.get(key)
        }

        fn set(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> impl Future<Output = Result<(), CacheError>> + Send {
            self.inner.set(key, value, ttl)
        }

        fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>> + Send {
            self.deletes
                .fetch_add(1, core::sync::atomic::Ordering::SeqCst);
            self.inner.delete(key)
        }

        fn ping(&self) -> impl Future<Output = Result<(), CacheError>> + Send {
            self.inner.ping()
        }
    }

    #[tokio::test]
    async fn repeated_invalidation_deletes_each_key_once() {
        let deletes = Arc::new(core::sync::atomic::AtomicUsize::new(0));
        let layer = CacheLayer::new(
            CountingCache {
                inner: MemoryCache::new(),
                deletes: Arc::clone(&deletes),
            },
            CacheTtls::default(),
        );
        let key = CacheKey::Top { limit: 10, offset: 0 };
        let _: Result<u32, CacheError> = layer.get_or_compute(key, || async { Ok(1) }).await;

        layer.invalidate_prefix(CachePrefix::Top).await;
        assert_eq!(deletes.load(core::sync::atomic::Ordering::SeqCst), 1);

        // The registry was drained; a second pass finds nothing to delete.
        layer.invalidate_prefix(CachePrefix::Top).await;
        assert_eq!(deletes.load(core::sync::atomic::Ordering::SeqCst), 1);

        let recomputed: Result<u32, CacheError> =
            layer.get_or_compute(key, || async { Ok(2) }).await;
        assert!(matches!(recomputed, Ok(2)));
    }

    struct DownCache;

    impl CacheBackend for DownCache {
        fn get(
            &self,
            _key: &str,
        ) -> impl Future<Output = Result<Option<String>, CacheError>> + Send {
            async { Err(CacheError::Backend(String::from("down"))) }
        }

        fn set(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> impl Future<Output = Result<(), CacheError>> + Send {
            async { Err(CacheError::Backend(String::from("down"))) }
        }

        fn delete(&self, _key: &str) -> impl Future<Output = Result<(), CacheError>> + Send {
            async { Err(CacheError::Backend(String::from("down"))) }
        }

        fn ping(&self) -> impl Future<Output = Result<(), CacheError>> + Send {
            async { Err(CacheError::Backend(String::from("down"))) }
        }
    }

    #[tokio::test]
    async fn unreachable_backend_fails_open() {
        let layer = CacheLayer::new(DownCache, CacheTtls::default());
        let key = CacheKey::SnapshotAll;

        let value: Result<u32, CacheError> = layer.get_or_compute(key, || async { Ok(42) }).await;
        assert!(matches!(value, Ok(42)));
        assert!(!layer.ping().await);
    }
}
