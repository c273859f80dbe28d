use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::store::CacheStore;

/// Cache-aside wrapper over a [`CacheStore`].
///
/// `get_or_put` checks the cache first, falls back to the authoritative
/// loader on miss and populates the cache afterwards. The store is
/// strictly an optimization: any backend or serialization failure is
/// logged and swallowed, and the loader's result is returned directly.
/// Loader errors, by contrast, always propagate.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get_or_put<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.store.get_raw(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!("Cache hit for key: {}", key);
                    return Ok(value);
                }
                Err(e) => {
                    // Stale shape from an older deployment; treat as a miss
                    warn!("Failed to deserialize cached value for {}: {}", key, e);
                }
            },
            Ok(None) => {
                debug!("Cache miss for key: {}", key);
            }
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", key, e);
            }
        }

        let value = loader().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.store.put_raw(key, &raw, ttl).await {
                    warn!("Cache populate failed for {}: {}", key, e);
                }
            }
            Err(e) => {
                warn!("Failed to serialize value for cache key {}: {}", key, e);
            }
        }

        Ok(value)
    }

    /// Evict a single key. Best-effort, errors are logged and swallowed.
    pub async fn evict(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!("Cache evict failed for {}: {}", key, e);
        }
    }

    /// Evict every key under a prefix. Best-effort.
    pub async fn evict_prefix(&self, prefix: &str) {
        match self.store.delete_prefix(prefix).await {
            Ok(removed) => debug!("Evicted {} keys under prefix: {}", removed, prefix),
            Err(e) => warn!("Cache prefix evict failed for {}: {}", prefix, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCacheStore;
    use crate::CacheError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("loader failed")]
    struct LoaderError;

    fn aside() -> CacheAside {
        CacheAside::new(Arc::new(MemoryCacheStore::new()))
    }

    #[tokio::test]
    async fn test_loader_called_once_within_ttl() {
        let cache = aside();
        let calls = AtomicU32::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..2 {
            let value: u32 = cache
                .get_or_put("item:1", ttl, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, LoaderError>(42) }
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loader_called_again_after_ttl() {
        let cache = aside();
        let calls = AtomicU32::new(0);
        let ttl = Duration::from_secs(60);

        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, LoaderError>(42u32) }
        };

        let _: u32 = cache.get_or_put("item:1", ttl, load).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        let _: u32 = cache.get_or_put("item:1", ttl, load).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_loader_error_propagates() {
        let cache = aside();

        let result: Result<u32, _> = cache
            .get_or_put("item:1", Duration::from_secs(60), || async {
                Err(LoaderError)
            })
            .await;

        assert!(result.is_err());
    }

    /// Backend that fails every operation.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get_raw(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn put_raw(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_broken_store_still_returns_loader_value() {
        let cache = CacheAside::new(Arc::new(BrokenStore));

        let value: u32 = cache
            .get_or_put("item:1", Duration::from_secs(60), || async {
                Ok::<_, LoaderError>(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);

        // Eviction on a broken store must not panic either
        cache.evict("item:1").await;
        cache.evict_prefix("items:list:").await;
    }

    #[tokio::test]
    async fn test_corrupt_entry_treated_as_miss() {
        let store = Arc::new(MemoryCacheStore::new());
        store
            .put_raw("item:1", "not json {", Duration::from_secs(60))
            .await
            .unwrap();

        let cache = CacheAside::new(store);
        let value: u32 = cache
            .get_or_put("item:1", Duration::from_secs(60), || async {
                Ok::<_, LoaderError>(9)
            })
            .await
            .unwrap();

        assert_eq!(value, 9);
    }

    #[tokio::test]
    async fn test_evict_forces_reload() {
        let cache = aside();
        let calls = AtomicU32::new(0);
        let ttl = Duration::from_secs(60);

        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, LoaderError>(1u32) }
        };

        let _: u32 = cache.get_or_put("item:1", ttl, load).await.unwrap();
        cache.evict("item:1").await;
        let _: u32 = cache.get_or_put("item:1", ttl, load).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
