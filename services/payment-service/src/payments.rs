use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Payment, PaymentStatus};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::PaymentApiError;
use crate::ledger::BalanceLedger;

/// Persistence for payment rows
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentApiError>;

    async fn update_status(&self, payment: &Payment) -> Result<(), PaymentApiError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, PaymentApiError>;
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    user_id: Uuid,
    amount: f64,
    description: String,
    status: String,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PaymentApiError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            amount: row.amount,
            description: row.description,
            status: PaymentStatus::parse(&row.status)?,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL implementation of the payment store
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentApiError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, user_id, amount, description,
                status, failure_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(&payment.description)
        .bind(payment.status.as_str())
        .bind(&payment.failure_reason)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(&self, payment: &Payment) -> Result<(), PaymentApiError> {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, failure_reason = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(payment.id)
        .bind(payment.status.as_str())
        .bind(&payment.failure_reason)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>, PaymentApiError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, order_id, user_id, amount, description,
                   status, failure_reason, created_at, updated_at
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Payment::try_from).transpose()
    }
}

/// Payment orchestration: create a durable PENDING attempt, then run the
/// balance deduction synchronously within the same logical operation, so
/// no payment is ever left unprocessed by the normal flow.
pub struct PaymentProcessor {
    store: Arc<dyn PaymentStore>,
    ledger: Arc<dyn BalanceLedger>,
}

impl PaymentProcessor {
    pub fn new(store: Arc<dyn PaymentStore>, ledger: Arc<dyn BalanceLedger>) -> Self {
        Self { store, ledger }
    }

    /// Create a payment and immediately attempt the deduction. The
    /// returned payment carries the terminal status: COMPLETED when the
    /// deduction succeeded, FAILED (with reason) otherwise. Deduction
    /// failure is reported in-band, not as an error.
    pub async fn create(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        amount: f64,
        description: String,
    ) -> Result<Payment, PaymentApiError> {
        let mut payment = Payment::create(order_id, user_id, amount, description)?;

        // Durable before any money moves
        self.store.insert(&payment).await?;
        info!(
            payment_id = %payment.id,
            order_id = %order_id,
            amount,
            "Payment created, attempting deduction"
        );

        match self.ledger.deduct(user_id, amount).await {
            Ok(true) => {
                payment.complete()?;
            }
            Ok(false) => {
                warn!(payment_id = %payment.id, "Deduction rejected: insufficient balance");
                payment.fail("insufficient balance".to_string())?;
            }
            Err(e) => {
                error!(payment_id = %payment.id, error = %e, "Deduction errored");
                payment.fail(e.to_string())?;
            }
        }

        self.store.update_status(&payment).await?;
        info!(
            payment_id = %payment.id,
            status = payment.status.as_str(),
            "Payment reconciled"
        );

        Ok(payment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Payment, PaymentApiError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(PaymentApiError::NotFound(id))
    }

    /// Cancel a payment. Only PENDING payments can be cancelled; the
    /// domain state machine rejects everything else.
    pub async fn cancel(&self, id: Uuid) -> Result<Payment, PaymentApiError> {
        let mut payment = self.get(id).await?;

        payment.cancel().map_err(|e| match e {
            domain::PaymentError::InvalidOperation { .. } => {
                PaymentApiError::InvalidOperation(e.to_string())
            }
            other => PaymentApiError::Domain(other),
        })?;

        self.store.update_status(&payment).await?;
        info!(payment_id = %payment.id, "Payment cancelled");

        Ok(payment)
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<f64, PaymentApiError> {
        self.ledger
            .get_balance(user_id)
            .await?
            .ok_or(PaymentApiError::UserNotFound(user_id))
    }
}
