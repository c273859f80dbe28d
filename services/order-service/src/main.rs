use common::telemetry::{init_telemetry, TelemetryConfig};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

mod cart;
mod catalog;
mod error;
mod handlers;
mod health;
mod payment_client;
mod repository;
mod routes;
mod saga;
mod state;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    let telemetry_config = TelemetryConfig {
        service_name: "order-service".to_string(),
        log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
    };
    init_telemetry(telemetry_config)?;

    tracing::info!("Starting order service...");

    // Initialize application state
    let state = state::AppState::new().await?;
    let health = state.health.clone();

    // Build router with tracing layer
    let app = routes::build_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Order service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            e
        })?;

    // Stop the payment-service probe loop before exiting
    health.shutdown();
    tracing::info!("Order service stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
