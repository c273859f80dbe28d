use anyhow::Result;
use cache::{CacheAside, CacheStore, MemoryCacheStore, RedisCacheStore};
use common::config::{DatabaseConfig, PaymentServiceConfig, RedisConfig};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cart::{CartStore, MemoryCartStore, RedisCartStore};
use crate::catalog::{CachedCatalog, CatalogReader, PostgresCatalog};
use crate::health::{HealthHandle, HealthMonitor};
use crate::payment_client::{HttpPaymentClient, PaymentGateway, ResilientPaymentClient};
use crate::repository::PostgresOrderRepository;
use crate::saga::CheckoutSaga;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub saga: Arc<CheckoutSaga>,
    pub catalog: Arc<dyn CatalogReader>,
    pub cart: Arc<dyn CartStore>,
    pub health: HealthHandle,
}

impl AppState {
    /// Wire up the full dependency graph. A Redis outage at startup
    /// degrades cache and cart to in-memory stores instead of refusing
    /// to boot.
    pub async fn new() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url = DatabaseConfig::url_from_env();
        let redis_config = RedisConfig::from_env();
        let payment_config = PaymentServiceConfig::from_env();

        info!("Connecting to database: {}", database_url);
        let pool = PgPoolOptions::new()
            .max_connections(DatabaseConfig::default().max_connections)
            .connect(&database_url)
            .await?;

        let cache_store: Arc<dyn CacheStore> =
            match RedisCacheStore::new(&redis_config.url).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!("Redis unavailable ({}), caching in memory", e);
                    Arc::new(MemoryCacheStore::new())
                }
            };

        let catalog: Arc<dyn CatalogReader> = Arc::new(CachedCatalog::new(
            Arc::new(PostgresCatalog::new(pool.clone())),
            CacheAside::new(cache_store),
            Duration::from_secs(redis_config.item_ttl_seconds),
            Duration::from_secs(redis_config.page_ttl_seconds),
        ));

        let cart: Arc<dyn CartStore> = match RedisCartStore::new(&redis_config.url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!("Redis unavailable ({}), carts held in memory", e);
                Arc::new(MemoryCartStore::new())
            }
        };

        let orders = Arc::new(PostgresOrderRepository::new(pool));

        let payments: Arc<dyn PaymentGateway> = Arc::new(ResilientPaymentClient::new(
            Arc::new(HttpPaymentClient::new(&payment_config)?),
        ));

        // One probe loop per process; the handle doubles as the saga's
        // admission gate
        let health = HealthMonitor::spawn(payments.clone(), &payment_config);

        let saga = Arc::new(CheckoutSaga::new(
            catalog.clone(),
            cart.clone(),
            orders,
            payments,
            Arc::new(health.clone()),
        ));

        Ok(Self {
            saga,
            catalog,
            cart,
            health,
        })
    }
}
