//! Lumen API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use lumen_api::config::AppConfig;
use lumen_api::error::AppError;
use lumen_api::state::AppState;
use lumen_api::worker;
use lumen_event_store::{PgEventRepository, run_migrations};
use lumen_purchase::gateway::SandboxPaymentGateway;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Lumen API server");

    let config = AppConfig::from_env()?;

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    run_migrations(&pool)
        .await
        .map_err(|e| AppError::Migration(e.to_string()))?;

    // Build application state.
    let app_state = AppState::new(
        Arc::new(PgEventRepository::new(pool)),
        Arc::new(config.plans),
        Arc::new(SandboxPaymentGateway::new()),
        config.pricing,
        config.checkout,
    );

    let _sweeper = worker::spawn_sweeper(app_state.clone(), config.sweep_interval);

    let app = lumen_api::app(app_state);

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
