use async_trait::async_trait;
use common::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use common::config::PaymentServiceConfig;
use common::retry::{retry_with_backoff, RetryPolicy};
use domain::Payment;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaymentClientError {
    #[error("Payment service timeout")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Circuit breaker is open")]
    CircuitOpen,

    #[error("Payment service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl PaymentClientError {
    /// Transient failures are safe to retry; a remote-reported error is
    /// terminal and must not be.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PaymentClientError::Timeout | PaymentClientError::Connection(_)
        )
    }
}

/// Typed client surface of the remote payment service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        amount: f64,
        description: &str,
    ) -> Result<Payment, PaymentClientError>;

    async fn get_payment(&self, id: Uuid) -> Result<Payment, PaymentClientError>;

    async fn cancel_payment(&self, id: Uuid) -> Result<Payment, PaymentClientError>;

    async fn check_health(&self) -> Result<(), PaymentClientError>;

    async fn get_balance(&self, user_id: Uuid) -> Result<f64, PaymentClientError>;
}

#[derive(Debug, Serialize)]
struct CreatePaymentRequest<'a> {
    order_id: Uuid,
    user_id: Uuid,
    amount: f64,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: f64,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: String,
}

/// Plain HTTP client for the payment service API
pub struct HttpPaymentClient {
    http: Client,
    base_url: String,
}

impl HttpPaymentClient {
    pub fn new(config: &PaymentServiceConfig) -> Result<Self, PaymentClientError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PaymentClientError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn map_send_error(e: reqwest::Error) -> PaymentClientError {
        if e.is_timeout() {
            PaymentClientError::Timeout
        } else {
            PaymentClientError::Connection(e.to_string())
        }
    }

    async fn parse_payment(response: reqwest::Response) -> Result<Payment, PaymentClientError> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<RemoteErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(PaymentClientError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Payment>()
            .await
            .map_err(|e| PaymentClientError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentClient {
    async fn create_payment(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        amount: f64,
        description: &str,
    ) -> Result<Payment, PaymentClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/payments", self.base_url))
            .json(&CreatePaymentRequest {
                order_id,
                user_id,
                amount,
                description,
            })
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::parse_payment(response).await
    }

    async fn get_payment(&self, id: Uuid) -> Result<Payment, PaymentClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/payments/{}", self.base_url, id))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::parse_payment(response).await
    }

    async fn cancel_payment(&self, id: Uuid) -> Result<Payment, PaymentClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/payments/{}/cancel", self.base_url, id))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        Self::parse_payment(response).await
    }

    async fn check_health(&self) -> Result<(), PaymentClientError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PaymentClientError::Remote {
                status: status.as_u16(),
                message: status.to_string(),
            })
        }
    }

    async fn get_balance(&self, user_id: Uuid) -> Result<f64, PaymentClientError> {
        let response = self
            .http
            .get(format!("{}/api/v1/users/{}/balance", self.base_url, user_id))
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<RemoteErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(PaymentClientError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<BalanceResponse>()
            .await
            .map(|b| b.balance)
            .map_err(|e| PaymentClientError::InvalidResponse(e.to_string()))
    }
}

/// Resilience decorator over any [`PaymentGateway`]: every call goes
/// through the circuit breaker (which also enforces the per-call
/// timeout), and `create_payment` alone is additionally retried with
/// exponential backoff on transient failures.
///
/// Retried creates are not deduplicated by an idempotency key; if a
/// create succeeds remotely but its response is lost, a retry can record
/// a second payment for the same order.
/// TODO: derive an idempotency key from the order id once the payment
/// service accepts one.
///
/// The health probe bypasses the breaker on purpose: the monitor must
/// keep observing the remote service while the circuit is open.
pub struct ResilientPaymentClient {
    inner: Arc<dyn PaymentGateway>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilientPaymentClient {
    pub fn new(inner: Arc<dyn PaymentGateway>) -> Self {
        Self::with_policy(
            inner,
            CircuitBreakerConfig::default(),
            RetryPolicy::default(),
        )
    }

    pub fn with_policy(
        inner: Arc<dyn PaymentGateway>,
        breaker_config: CircuitBreakerConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new("payment-service".to_string(), breaker_config),
            retry,
        }
    }

    fn flatten<T>(
        result: Result<T, CircuitBreakerError<PaymentClientError>>,
    ) -> Result<T, PaymentClientError> {
        result.map_err(|e| match e {
            CircuitBreakerError::Open => PaymentClientError::CircuitOpen,
            CircuitBreakerError::Timeout => PaymentClientError::Timeout,
            CircuitBreakerError::CallFailed(inner) => inner,
        })
    }
}

#[async_trait]
impl PaymentGateway for ResilientPaymentClient {
    async fn create_payment(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        amount: f64,
        description: &str,
    ) -> Result<Payment, PaymentClientError> {
        retry_with_backoff(
            &self.retry,
            "create_payment",
            |e: &PaymentClientError| e.is_transient(),
            || async move {
                Self::flatten(
                    self.breaker
                        .call(self.inner.create_payment(order_id, user_id, amount, description))
                        .await,
                )
            },
        )
        .await
    }

    async fn get_payment(&self, id: Uuid) -> Result<Payment, PaymentClientError> {
        Self::flatten(self.breaker.call(self.inner.get_payment(id)).await)
    }

    async fn cancel_payment(&self, id: Uuid) -> Result<Payment, PaymentClientError> {
        Self::flatten(self.breaker.call(self.inner.cancel_payment(id)).await)
    }

    async fn check_health(&self) -> Result<(), PaymentClientError> {
        self.inner.check_health().await
    }

    async fn get_balance(&self, user_id: Uuid) -> Result<f64, PaymentClientError> {
        Self::flatten(self.breaker.call(self.inner.get_balance(user_id)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::PaymentStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn completed_payment(order_id: Uuid, user_id: Uuid, amount: f64) -> Payment {
        let mut payment =
            Payment::create(order_id, user_id, amount, "Order payment".to_string()).unwrap();
        payment.complete().unwrap();
        payment
    }

    fn resilient(inner: MockPaymentGateway) -> ResilientPaymentClient {
        ResilientPaymentClient::new(Arc::new(inner))
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_retries_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let mut inner = MockPaymentGateway::new();
        inner.expect_create_payment().returning(move |o, u, a, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(PaymentClientError::Connection("refused".to_string()))
            } else {
                Ok(completed_payment(o, u, a))
            }
        });

        let payment = resilient(inner)
            .create_payment(Uuid::new_v4(), Uuid::new_v4(), 100.0, "order")
            .await
            .unwrap();

        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_gives_up_after_three_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let mut inner = MockPaymentGateway::new();
        inner.expect_create_payment().returning(move |_, _, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(PaymentClientError::Timeout)
        });

        let result = resilient(inner)
            .create_payment(Uuid::new_v4(), Uuid::new_v4(), 100.0, "order")
            .await;

        assert!(matches!(result, Err(PaymentClientError::Timeout)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_create_does_not_retry_remote_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let mut inner = MockPaymentGateway::new();
        inner.expect_create_payment().returning(move |_, _, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(PaymentClientError::Remote {
                status: 400,
                message: "insufficient balance".to_string(),
            })
        });

        let result = resilient(inner)
            .create_payment(Uuid::new_v4(), Uuid::new_v4(), 100.0, "order")
            .await;

        assert!(matches!(result, Err(PaymentClientError::Remote { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_fails_fast() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let mut inner = MockPaymentGateway::new();
        inner.expect_get_payment().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(PaymentClientError::Connection("refused".to_string()))
        });

        let client = resilient(inner);

        // Drive the breaker open with non-retried calls
        for _ in 0..5 {
            let _ = client.get_payment(Uuid::new_v4()).await;
        }

        let before = attempts.load(Ordering::SeqCst);
        let result = client.get_payment(Uuid::new_v4()).await;

        assert!(matches!(result, Err(PaymentClientError::CircuitOpen)));
        assert_eq!(attempts.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_health_probe_bypasses_breaker() {
        let mut inner = MockPaymentGateway::new();
        inner.expect_get_payment().returning(|_| {
            Err(PaymentClientError::Connection("refused".to_string()))
        });
        inner.expect_check_health().returning(|| Ok(()));

        let client = resilient(inner);
        for _ in 0..5 {
            let _ = client.get_payment(Uuid::new_v4()).await;
        }

        // Circuit is open, but the probe still reaches the service
        assert!(client.check_health().await.is_ok());
    }
}
