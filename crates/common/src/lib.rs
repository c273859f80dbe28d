pub mod circuit_breaker;
pub mod config;
pub mod retry;
pub mod telemetry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use config::{DatabaseConfig, PaymentServiceConfig, RedisConfig};
pub use retry::{retry_with_backoff, RetryPolicy};
