use async_trait::async_trait;
use cache::{keys, CacheAside};
use domain::{Item, ItemPage, ItemQuery, SortBy};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::CheckoutError;

/// Read-only catalog contract. The saga depends on this for
/// authoritative pricing; the cart view and browse endpoints share it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Item>, CheckoutError>;

    async fn find_page(&self, query: &ItemQuery) -> Result<ItemPage, CheckoutError>;

    async fn find_image(&self, id: Uuid) -> Result<Option<Vec<u8>>, CheckoutError>;
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: Uuid,
    title: String,
    description: String,
    price: f64,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
        }
    }
}

/// PostgreSQL catalog source of truth
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogReader for PostgresCatalog {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Item>, CheckoutError> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, title, description, price FROM items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Item::from))
    }

    async fn find_page(&self, query: &ItemQuery) -> Result<ItemPage, CheckoutError> {
        let order_by = match query.sort {
            SortBy::Title => "title ASC",
            SortBy::PriceAsc => "price ASC",
            SortBy::PriceDesc => "price DESC",
        };
        let search = format!("%{}%", query.search.as_deref().unwrap_or(""));

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE title ILIKE $1")
                .bind(&search)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            r#"
            SELECT id, title, description, price
            FROM items
            WHERE title ILIKE $1
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            order_by
        ))
        .bind(&search)
        .bind(query.size as i64)
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(ItemPage {
            items: rows.into_iter().map(Item::from).collect(),
            page: query.page,
            size: query.size,
            total,
        })
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<Vec<u8>>, CheckoutError> {
        let image: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT image FROM item_images WHERE item_id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(image)
    }
}

/// Cache-aside decorator over any [`CatalogReader`]. A cache outage
/// degrades to direct reads, never to failures.
pub struct CachedCatalog {
    inner: Arc<dyn CatalogReader>,
    cache: CacheAside,
    item_ttl: Duration,
    page_ttl: Duration,
}

impl CachedCatalog {
    pub fn new(
        inner: Arc<dyn CatalogReader>,
        cache: CacheAside,
        item_ttl: Duration,
        page_ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            item_ttl,
            page_ttl,
        }
    }

    /// Drop every cache entry derived from this item, including all
    /// listing pages it may appear on. Called when catalog data changes.
    pub async fn invalidate_item(&self, id: Uuid) {
        self.cache.evict(&keys::item_key(id)).await;
        self.cache.evict(&keys::item_image_key(id)).await;
        self.cache.evict_prefix(keys::ITEM_PAGE_PREFIX).await;
    }
}

#[async_trait]
impl CatalogReader for CachedCatalog {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Item>, CheckoutError> {
        self.cache
            .get_or_put(&keys::item_key(id), self.item_ttl, || {
                self.inner.find_by_id(id)
            })
            .await
    }

    async fn find_page(&self, query: &ItemQuery) -> Result<ItemPage, CheckoutError> {
        let key = keys::item_page_key(
            query.search.as_deref(),
            query.sort.as_str(),
            query.page,
            query.size,
        );

        self.cache
            .get_or_put(&key, self.page_ttl, || self.inner.find_page(query))
            .await
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<Vec<u8>>, CheckoutError> {
        self.cache
            .get_or_put(&keys::item_image_key(id), self.item_ttl, || {
                self.inner.find_image(id)
            })
            .await
    }
}
