use anyhow::Result;
use common::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

use crate::ledger::PostgresLedger;
use crate::payments::{PaymentProcessor, PostgresPaymentStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<PaymentProcessor>,
}

impl AppState {
    /// Create a new application state
    pub async fn new() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url = DatabaseConfig::url_from_env();

        info!("Connecting to database: {}", database_url);
        let pool = PgPoolOptions::new()
            .max_connections(DatabaseConfig::default().max_connections)
            .connect(&database_url)
            .await?;

        let store = Arc::new(PostgresPaymentStore::new(pool.clone()));
        let ledger = Arc::new(PostgresLedger::new(pool));
        let processor = Arc::new(PaymentProcessor::new(store, ledger));

        Ok(Self { processor })
    }
}
