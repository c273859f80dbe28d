use async_trait::async_trait;
use domain::CartEntry;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::CheckoutError;

/// Session-scoped cart. Keyed by session identity and injected into the
/// saga; contents are best-effort session state, not a reservation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartStore: Send + Sync {
    /// All entries as stored, including non-positive counts; callers
    /// decide how to treat those.
    async fn read_all(&self, session_id: &str) -> Result<Vec<CartEntry>, CheckoutError>;

    /// Add `count` of an item, accumulating with any existing entry.
    async fn add(&self, session_id: &str, item_id: Uuid, count: i64)
        -> Result<(), CheckoutError>;

    async fn remove(&self, session_id: &str, item_id: Uuid) -> Result<(), CheckoutError>;

    async fn clear(&self, session_id: &str) -> Result<(), CheckoutError>;
}

fn cart_key(session_id: &str) -> String {
    format!("cart:{}", session_id)
}

/// Redis-backed cart store: one hash per session, item id -> count
pub struct RedisCartStore {
    conn: ConnectionManager,
}

impl RedisCartStore {
    pub async fn new(redis_url: &str) -> Result<Self, CheckoutError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CheckoutError::SessionStore(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CheckoutError::SessionStore(e.to_string()))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl CartStore for RedisCartStore {
    async fn read_all(&self, session_id: &str) -> Result<Vec<CartEntry>, CheckoutError> {
        let raw: HashMap<String, i64> = self
            .conn
            .clone()
            .hgetall(cart_key(session_id))
            .await
            .map_err(|e| CheckoutError::SessionStore(e.to_string()))?;

        let mut entries = Vec::with_capacity(raw.len());
        for (field, count) in raw {
            let item_id = field
                .parse::<Uuid>()
                .map_err(|e| CheckoutError::SessionStore(e.to_string()))?;
            entries.push(CartEntry::new(item_id, count));
        }

        Ok(entries)
    }

    async fn add(
        &self,
        session_id: &str,
        item_id: Uuid,
        count: i64,
    ) -> Result<(), CheckoutError> {
        let _: i64 = self
            .conn
            .clone()
            .hincr(cart_key(session_id), item_id.to_string(), count)
            .await
            .map_err(|e| CheckoutError::SessionStore(e.to_string()))?;

        debug!("Cart {}: added {} x {}", session_id, count, item_id);
        Ok(())
    }

    async fn remove(&self, session_id: &str, item_id: Uuid) -> Result<(), CheckoutError> {
        let _: i64 = self
            .conn
            .clone()
            .hdel(cart_key(session_id), item_id.to_string())
            .await
            .map_err(|e| CheckoutError::SessionStore(e.to_string()))?;

        debug!("Cart {}: removed {}", session_id, item_id);
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), CheckoutError> {
        let _: i64 = self
            .conn
            .clone()
            .del(cart_key(session_id))
            .await
            .map_err(|e| CheckoutError::SessionStore(e.to_string()))?;

        debug!("Cart {}: cleared", session_id);
        Ok(())
    }
}

/// In-memory cart store for tests and local development
#[derive(Default)]
pub struct MemoryCartStore {
    carts: RwLock<HashMap<String, HashMap<Uuid, i64>>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn read_all(&self, session_id: &str) -> Result<Vec<CartEntry>, CheckoutError> {
        let carts = self.carts.read().await;
        Ok(carts
            .get(session_id)
            .map(|cart| {
                cart.iter()
                    .map(|(item_id, count)| CartEntry::new(*item_id, *count))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn add(
        &self,
        session_id: &str,
        item_id: Uuid,
        count: i64,
    ) -> Result<(), CheckoutError> {
        let mut carts = self.carts.write().await;
        *carts
            .entry(session_id.to_string())
            .or_default()
            .entry(item_id)
            .or_insert(0) += count;
        Ok(())
    }

    async fn remove(&self, session_id: &str, item_id: Uuid) -> Result<(), CheckoutError> {
        let mut carts = self.carts.write().await;
        if let Some(cart) = carts.get_mut(session_id) {
            cart.remove(&item_id);
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), CheckoutError> {
        self.carts.write().await.remove(session_id);
        Ok(())
    }
}
