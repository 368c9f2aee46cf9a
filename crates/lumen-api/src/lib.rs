//! Lumen — HTTP API.
//!
//! The binary in `main.rs` wires configuration, the `PostgreSQL` event store
//! and the background worker around [`app`].

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod worker;

use state::AppState;

/// Builds the full router with its middleware.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/events", routes::events::router())
        .nest("/api/v1/orders", routes::orders::router())
        .nest("/api/v1/webhooks", routes::webhooks::router())
        .layer(TraceLayer::new_for_http())
        // TODO: Replace CorsLayer::permissive() with the organizer app's origin once it is deployed.
        .layer(CorsLayer::permissive())
        .with_state(state)
}
