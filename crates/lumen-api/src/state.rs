//! Shared application state.

use std::sync::{Arc, Mutex};

use lumen_billing::PricingSettings;
use lumen_core::clock::{Clock, SystemClock};
use lumen_core::lock::KeyedLocks;
use lumen_core::repository::EventRepository;
use lumen_core::retry::RetryPolicy;
use lumen_core::rng::{DeterministicRng, SystemRng};
use lumen_purchase::application::command_handlers::CheckoutSettings;
use lumen_purchase::gateway::PaymentGateway;
use lumen_quota::domain::plans::PlanCatalog;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for deterministic time.
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// RNG used to derive payment idempotency keys.
    pub rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    /// Event repository for persistence.
    pub event_repository: Arc<dyn EventRepository>,
    /// Per-aggregate writer locks.
    pub locks: Arc<KeyedLocks>,
    /// Plans offered to organizers.
    pub catalog: Arc<dyn PlanCatalog>,
    /// Payment provider.
    pub gateway: Arc<dyn PaymentGateway>,
    /// Pricing and installment parameters.
    pub pricing: Arc<PricingSettings>,
    /// Payment window and gateway retry policy.
    pub checkout: CheckoutSettings,
    /// Backoff for re-applying capacity of paid orders.
    pub apply_retry: RetryPolicy,
}

impl AppState {
    /// Create new application state backed by the system clock and an
    /// OS-seeded RNG.
    #[must_use]
    pub fn new(
        event_repository: Arc<dyn EventRepository>,
        catalog: Arc<dyn PlanCatalog>,
        gateway: Arc<dyn PaymentGateway>,
        pricing: PricingSettings,
        checkout: CheckoutSettings,
    ) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            rng: Arc::new(Mutex::new(SystemRng::from_entropy())),
            event_repository,
            locks: Arc::new(KeyedLocks::new()),
            catalog,
            gateway,
            pricing: Arc::new(pricing),
            checkout,
            apply_retry: RetryPolicy {
                max_attempts: 8,
                ..RetryPolicy::default()
            },
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the RNG.
    #[must_use]
    pub fn with_rng(mut self, rng: Arc<Mutex<dyn DeterministicRng + Send>>) -> Self {
        self.rng = rng;
        self
    }

    /// Replaces the capacity re-application backoff.
    #[must_use]
    pub fn with_apply_retry(mut self, apply_retry: RetryPolicy) -> Self {
        self.apply_retry = apply_retry;
        self
    }
}
