//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use lumen_billing::PricingSettings;
use lumen_core::clock::Clock;
use lumen_core::retry::RetryPolicy;
use lumen_core::rng::DeterministicRng;
use lumen_purchase::application::command_handlers::CheckoutSettings;
use lumen_purchase::gateway::SandboxPaymentGateway;
use lumen_quota::domain::plans::InMemoryPlanCatalog;
use lumen_test_support::{InMemoryEventRepository, ManualClock, SequenceRng};
use tower::ServiceExt;

use lumen_api::state::AppState;

/// Everything a workflow test needs to drive and inspect the app.
pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<SandboxPaymentGateway>,
    pub repository: Arc<InMemoryEventRepository>,
}

impl TestApp {
    /// A fresh router over the shared state.
    pub fn router(&self) -> Router {
        lumen_api::app(self.state.clone())
    }
}

/// Fixed start time used across all integration tests.
fn start_time() -> chrono::DateTime<chrono::Utc> {
    chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap()
}

/// Build the full app over an in-memory event store, a manual clock and a
/// sandbox gateway that retries without delay.
pub fn build_test_app() -> TestApp {
    build_test_app_with_rng(SequenceRng::new(vec![]))
}

/// Build the full app with a custom `SequenceRng` for tests that need
/// distinct idempotency keys.
pub fn build_test_app_with_rng(rng: SequenceRng) -> TestApp {
    let clock = Arc::new(ManualClock::new(start_time()));
    let gateway = Arc::new(SandboxPaymentGateway::new());
    let repository = Arc::new(InMemoryEventRepository::new());
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(rng));

    let checkout = CheckoutSettings {
        gateway_retry: RetryPolicy::immediate(3),
        ..CheckoutSettings::default()
    };
    let state = AppState::new(
        repository.clone(),
        Arc::new(InMemoryPlanCatalog::with_defaults()),
        gateway.clone(),
        PricingSettings::default(),
        checkout,
    )
    .with_clock(clock.clone() as Arc<dyn Clock + Send + Sync>)
    .with_rng(rng)
    .with_apply_retry(RetryPolicy::immediate(2));

    TestApp {
        state,
        clock,
        gateway,
        repository,
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "POST", uri, body).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "PUT", uri, body).await
}

async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
