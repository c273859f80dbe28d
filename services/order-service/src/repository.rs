use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Order, OrderLineItem, OrderStatus};
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CheckoutError;

/// Local order persistence. `create_with_items` is the saga's durability
/// checkpoint: the order row and all line-item snapshots commit in one
/// transaction before the remote payment call is issued.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_with_items(
        &self,
        order: &Order,
        items: &[OrderLineItem],
    ) -> Result<(), CheckoutError>;

    async fn update_status(&self, order: &Order) -> Result<(), CheckoutError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, CheckoutError>;

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, CheckoutError>;

    async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItem>, CheckoutError>;
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_sum: f64,
    status: String,
    payment_ref: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CheckoutError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            total_sum: row.total_sum,
            status: OrderStatus::parse(&row.status)?,
            payment_ref: row.payment_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    title: String,
    unit_price: f64,
    count: i64,
}

impl From<OrderItemRow> for OrderLineItem {
    fn from(row: OrderItemRow) -> Self {
        OrderLineItem {
            id: row.id,
            order_id: row.order_id,
            title: row.title,
            unit_price: row.unit_price,
            count: row.count,
        }
    }
}

/// PostgreSQL implementation of the order repository
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn create_with_items(
        &self,
        order: &Order,
        items: &[OrderLineItem],
    ) -> Result<(), CheckoutError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, total_sum, status, payment_ref, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.total_sum)
        .bind(order.status.as_str())
        .bind(order.payment_ref)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, title, unit_price, count)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(&item.title)
            .bind(item.unit_price)
            .bind(item.count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            "Persisted order {} with {} line items, total {}",
            order.id,
            items.len(),
            order.total_sum
        );

        Ok(())
    }

    async fn update_status(&self, order: &Order) -> Result<(), CheckoutError> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_ref = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.payment_ref)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Order {} moved to {}", order.id, order.status.as_str());

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, CheckoutError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, total_sum, status, payment_ref, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, CheckoutError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, total_sum, status, payment_ref, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderLineItem>, CheckoutError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, title, unit_price, count
            FROM order_items
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderLineItem::from).collect())
    }
}
