use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::CacheError;

/// Pluggable key-value backend for the cache-aside layer. Values are
/// pre-serialized strings; TTL handling belongs to the backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn put_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

/// Redis-backed cache store
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Backend(format!("Failed to create Redis client: {}", e)))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Backend(format!("Failed to connect to Redis: {}", e)))?;

        info!("Redis cache store initialized");
        Ok(Self { conn })
    }

    /// Check if the backend is reachable (health check)
    pub async fn ping(&self) -> Result<(), CacheError> {
        let result: Result<String, redis::RedisError> = redis::cmd("PING")
            .query_async(&mut self.conn.clone())
            .await;

        result
            .map(|_| ())
            .map_err(|e| CacheError::Backend(format!("Redis ping failed: {}", e)))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value: Option<String> = self
            .conn
            .clone()
            .get(key)
            .await
            .map_err(|e| CacheError::Backend(format!("GET {} failed: {}", key, e)))?;
        Ok(value)
    }

    async fn put_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let _: () = self
            .conn
            .clone()
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| CacheError::Backend(format!("SETEX {} failed: {}", key, e)))?;
        debug!("Cached value for key: {} with TTL: {}s", key, ttl.as_secs());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let _: () = self
            .conn
            .clone()
            .del(key)
            .await
            .map_err(|e| CacheError::Backend(format!("DEL {} failed: {}", key, e)))?;
        debug!("Deleted cache key: {}", key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let pattern = format!("{}*", prefix);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::Backend(format!("SCAN {} failed: {}", pattern, e)))?;

            if !keys.is_empty() {
                let deleted: u64 = conn
                    .del(&keys)
                    .await
                    .map_err(|e| CacheError::Backend(format!("DEL failed: {}", e)))?;
                removed += deleted;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!("Deleted {} cache keys with prefix: {}", removed, prefix);
        Ok(removed)
    }
}

/// In-memory cache store with per-entry expiry. Used in tests and as a
/// fallback when no Redis is configured.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => {
                Ok(Some(value.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn put_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryCacheStore::new();

        store
            .put_raw("item:1", "value", Duration::from_secs(60))
            .await
            .unwrap();

        let value = store.get_raw("item:1").await.unwrap();
        assert_eq!(value.as_deref(), Some("value"));

        store.delete("item:1").await.unwrap();
        assert!(store.get_raw("item:1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_expiry() {
        let store = MemoryCacheStore::new();

        store
            .put_raw("item:1", "value", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(store.get_raw("item:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete_prefix() {
        let store = MemoryCacheStore::new();
        let ttl = Duration::from_secs(60);

        store.put_raw("items:list:page=0", "a", ttl).await.unwrap();
        store.put_raw("items:list:page=1", "b", ttl).await.unwrap();
        store.put_raw("item:42", "c", ttl).await.unwrap();

        let removed = store.delete_prefix("items:list:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get_raw("item:42").await.unwrap().is_some());
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_store_round_trip() {
        let store = RedisCacheStore::new("redis://localhost:6379")
            .await
            .expect("Failed to connect to Redis");

        store
            .put_raw("test:key", "value", Duration::from_secs(60))
            .await
            .unwrap();

        let value = store.get_raw("test:key").await.unwrap();
        assert_eq!(value.as_deref(), Some("value"));

        store.delete("test:key").await.unwrap();
        assert!(store.get_raw("test:key").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_ping() {
        let store = RedisCacheStore::new("redis://localhost:6379")
            .await
            .expect("Failed to connect to Redis");

        assert!(store.ping().await.is_ok());
    }
}
